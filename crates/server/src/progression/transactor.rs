//! The one place progression state changes.
//!
//! Every mutation runs the same steps: validate, pay, mutate the store,
//! invalidate the area cache, publish an event, then persist. Wall updates
//! are a separate step taken against a world handle.

use std::collections::HashSet;
use std::path::Path;

use chunklock_engine::world::World;
use chunklock_engine::world::WorldAccess;
use chunklock_engine::world::position::ChunkPos;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::access::AccessGate;
use super::area::{AreaDetector, PlayableArea};
use super::ledger::{CreditLedger, ProgressionLedger};
use super::mode::{Mode, ModeError};
use super::store::{STARTER_KIT, StarterItem, UnlockStateStore};
use crate::block;
use crate::border::{BoundaryWallManager, WallDelta};
use crate::config::ProgressionConfig;
use crate::event_bus::{HostEvent, ProgressionBus, ProgressionEvent};
use crate::persistence::ProgressFile;

/// Credits charged per unlock.
pub const UNLOCK_COST: u32 = 1;

/// JSON-friendly view of the core for debugging and admin tooling.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub mode: Mode,
    pub mode_locked: bool,
    pub barriers_enabled: bool,
    pub unlocked_chunks: usize,
    pub frontier_chunks: usize,
    /// Chunk count per playable area, largest first.
    pub area_sizes: Vec<usize>,
    pub wall_cells: usize,
    pub deferred_chunks: usize,
    pub players: usize,
    pub penalized_players: usize,
    pub dirty: bool,
}

pub struct UnlockTransactor {
    store: UnlockStateStore,
    ledger: ProgressionLedger,
    areas: AreaDetector,
    walls: BoundaryWallManager,
    config: ProgressionConfig,
    bus: ProgressionBus,
    file: Option<ProgressFile>,
    /// Actors currently under the locked-chunk penalty. Session state only.
    penalized: HashSet<Uuid>,
}

impl UnlockTransactor {
    pub fn new(config: ProgressionConfig) -> Self {
        Self::from_parts(UnlockStateStore::new(), ProgressionLedger::new(), config)
    }

    pub fn from_parts(
        store: UnlockStateStore,
        ledger: ProgressionLedger,
        config: ProgressionConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            areas: AreaDetector::new(),
            walls: BoundaryWallManager::with_batch_size(config.height, config.batch_size),
            config,
            bus: ProgressionBus::new(),
            file: None,
            penalized: HashSet::new(),
        }
    }

    /// Load `<world_dir>/chunklocked_data.nbt` (or start fresh) and save back
    /// to it after every committed change.
    pub fn open(world_dir: &Path, config: ProgressionConfig) -> Self {
        let file = ProgressFile::in_world(world_dir);
        let loaded = file.load_or_default();
        Self::from_parts(loaded.store, loaded.ledger, config).with_persistence(file)
    }

    pub fn with_persistence(mut self, file: ProgressFile) -> Self {
        self.file = Some(file);
        self
    }

    // -- Accessors --

    pub fn store(&self) -> &UnlockStateStore {
        &self.store
    }

    pub fn ledger(&self) -> &ProgressionLedger {
        &self.ledger
    }

    pub fn walls(&self) -> &BoundaryWallManager {
        &self.walls
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn bus(&self) -> &ProgressionBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressionEvent> {
        self.bus.subscribe()
    }

    pub fn gate(&self) -> AccessGate<'_> {
        AccessGate::new(self.store.unlocked())
    }

    pub fn can_access(&self, chunk: ChunkPos) -> bool {
        self.gate().can_access(chunk)
    }

    pub fn can_unlock(&self, chunk: ChunkPos) -> bool {
        self.gate().can_unlock(chunk)
    }

    // -- Unlocking --

    /// Spend one of `actor`'s credits to unlock `chunk`. Either everything
    /// happens or nothing does.
    pub fn try_unlock(&mut self, actor: Uuid, chunk: ChunkPos) -> bool {
        if self.store.is_unlocked(chunk) {
            tracing::debug!("Chunk {} already unlocked", chunk);
            return false;
        }
        if self.config.strict_adjacency && !self.gate().can_unlock(chunk) {
            tracing::debug!("Chunk {} is not adjacent to the unlocked area", chunk);
            return false;
        }
        if self.ledger.available_credits(actor) < UNLOCK_COST {
            tracing::debug!("Actor {} has no credits to unlock {}", actor, chunk);
            return false;
        }
        if let Err(e) = self.ledger.spend_credits(actor, UNLOCK_COST) {
            tracing::warn!("Unlock of {} aborted: {}", chunk, e);
            return false;
        }

        self.store.unlock(chunk);
        self.areas.invalidate();
        tracing::info!("Actor {} unlocked chunk {}", actor, chunk);
        self.bus.publish(ProgressionEvent::ChunkUnlocked {
            chunk,
            actor: Some(actor),
        });
        self.publish_credits(actor);
        self.mark_dirty_and_save();
        true
    }

    /// `try_unlock`, then rewall around the chunk on success.
    pub fn try_unlock_with_walls<W>(&mut self, world: &W, actor: Uuid, chunk: ChunkPos) -> bool
    where
        W: WorldAccess + ?Sized,
    {
        let unlocked = self.try_unlock(actor, chunk);
        if unlocked {
            self.update_walls_after_unlock(world, chunk);
        }
        unlocked
    }

    /// Unlock `actor`'s chunks in order, stopping at the first refusal.
    /// Chunks before the failure stay unlocked. Returns how many succeeded.
    pub fn try_unlock_many(&mut self, actor: Uuid, chunks: &[ChunkPos]) -> usize {
        let mut count = 0;
        for &chunk in chunks {
            if !self.try_unlock(actor, chunk) {
                break;
            }
            count += 1;
        }
        count
    }

    /// Administrative unlock: no credit, no adjacency check.
    pub fn force_unlock(&mut self, chunk: ChunkPos) -> bool {
        if !self.store.unlock(chunk) {
            return false;
        }
        self.areas.invalidate();
        tracing::info!("Force-unlocked chunk {}", chunk);
        self.bus
            .publish(ProgressionEvent::ChunkUnlocked { chunk, actor: None });
        self.mark_dirty_and_save();
        true
    }

    pub fn force_unlock_with_walls<W>(&mut self, world: &W, chunk: ChunkPos) -> bool
    where
        W: WorldAccess + ?Sized,
    {
        let unlocked = self.force_unlock(chunk);
        if unlocked {
            self.update_walls_after_unlock(world, chunk);
        }
        unlocked
    }

    /// Unlock every listed chunk not already unlocked; saves once.
    pub fn force_unlock_many(&mut self, chunks: &[ChunkPos]) -> usize {
        let mut count = 0;
        for &chunk in chunks {
            if self.store.unlock(chunk) {
                self.bus
                    .publish(ProgressionEvent::ChunkUnlocked { chunk, actor: None });
                count += 1;
            }
        }
        if count > 0 {
            self.areas.invalidate();
            tracing::info!("Force-unlocked {} chunks", count);
            self.mark_dirty_and_save();
        }
        count
    }

    // -- Locking --

    pub fn lock(&mut self, chunk: ChunkPos) -> bool {
        if !self.store.lock(chunk) {
            return false;
        }
        self.areas.invalidate();
        tracing::info!("Locked chunk {}", chunk);
        self.bus.publish(ProgressionEvent::ChunkLocked { chunk });
        self.mark_dirty_and_save();
        true
    }

    /// Same as `lock`; no credit is refunded either way.
    pub fn force_lock(&mut self, chunk: ChunkPos) -> bool {
        self.lock(chunk)
    }

    pub fn lock_with_walls<W>(&mut self, world: &W, chunk: ChunkPos) -> bool
    where
        W: WorldAccess + ?Sized,
    {
        let locked = self.lock(chunk);
        if locked {
            self.update_walls_after_lock(world, chunk);
        }
        locked
    }

    pub fn lock_many(&mut self, chunks: &[ChunkPos]) -> usize {
        let mut count = 0;
        for &chunk in chunks {
            if self.store.lock(chunk) {
                self.bus.publish(ProgressionEvent::ChunkLocked { chunk });
                count += 1;
            }
        }
        if count > 0 {
            self.areas.invalidate();
            tracing::info!("Locked {} chunks", count);
            self.mark_dirty_and_save();
        }
        count
    }

    /// Lock everything. Walls are left for the caller to clear or rebuild.
    pub fn clear_all(&mut self) -> usize {
        let count = self.store.clear_all();
        if count > 0 {
            self.areas.invalidate();
            tracing::info!("Cleared all {} unlocked chunks", count);
            self.bus.publish(ProgressionEvent::AllCleared { count });
            self.mark_dirty_and_save();
        }
        count
    }

    // -- Queries --

    pub fn calculate_frontier(&self) -> HashSet<ChunkPos> {
        self.gate().frontier()
    }

    /// Connected components of the unlocked set, from cache when current.
    pub fn calculate_global_areas(&mut self) -> &[PlayableArea] {
        self.areas.detect(self.store.unlocked())
    }

    pub fn area_containing(&mut self, chunk: ChunkPos) -> Option<&PlayableArea> {
        self.areas.detect(self.store.unlocked());
        self.areas.area_containing(chunk)
    }

    pub fn areas_adjacent_to(&mut self, chunk: ChunkPos) -> Vec<&PlayableArea> {
        self.areas.detect(self.store.unlocked());
        self.areas.areas_adjacent_to(chunk)
    }

    pub fn is_area_cache_valid(&self) -> bool {
        self.areas.is_cache_valid()
    }

    // -- Credits --

    pub fn available_credits(&self, actor: Uuid) -> u32 {
        self.ledger.available_credits(actor)
    }

    pub fn add_credits(&mut self, actor: Uuid, amount: u32) {
        if amount == 0 {
            return;
        }
        self.ledger.add_credits(actor, amount);
        self.publish_credits(actor);
        self.mark_dirty_and_save();
    }

    pub fn set_credits(&mut self, actor: Uuid, credits: u32) {
        self.ledger.set_credits(actor, credits);
        self.publish_credits(actor);
        self.mark_dirty_and_save();
    }

    /// Returns whether the milestone paid out (first completion only).
    pub fn record_milestone(&mut self, actor: Uuid, milestone: &str, reward: u32) -> bool {
        if !self.ledger.record_milestone(actor, milestone, reward) {
            return false;
        }
        tracing::info!(
            "Actor {} completed {} (+{} credits)",
            actor,
            milestone,
            reward
        );
        self.publish_credits(actor);
        self.mark_dirty_and_save();
        true
    }

    fn publish_credits(&self, actor: Uuid) {
        self.bus.publish(ProgressionEvent::CreditsChanged {
            actor,
            available: self.ledger.available_credits(actor),
        });
    }

    // -- Mode and starter kit --

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), ModeError> {
        self.store.set_mode(mode)?;
        tracing::info!("Mode set to {}", mode);
        self.bus.publish(ProgressionEvent::ModeSet { mode });
        self.mark_dirty_and_save();
        Ok(())
    }

    /// The kit to hand `actor`, once. `None` if the mode is off or the actor
    /// already got it.
    pub fn provision_starter_items(&mut self, actor: Uuid) -> Option<&'static [StarterItem]> {
        if !self.store.should_give_starter_items(actor) {
            return None;
        }
        self.store.mark_starter_items_given(actor);
        self.mark_dirty_and_save();
        Some(STARTER_KIT)
    }

    // -- Actor position --

    /// Standing in a locked chunk with nothing to spend.
    pub fn should_penalize(&self, actor: Uuid, chunk: ChunkPos) -> bool {
        !self.store.is_unlocked(chunk) && self.ledger.available_credits(actor) == 0
    }

    pub fn is_penalized(&self, actor: Uuid) -> bool {
        self.penalized.contains(&actor)
    }

    /// An actor arriving by portal in a locked chunk unlocks it if they can
    /// pay. Whatever happens, their penalty state is brought up to date.
    /// Returns whether anything changed.
    pub fn on_actor_entered_chunk<W>(
        &mut self,
        world: &W,
        actor: Uuid,
        chunk: ChunkPos,
        via_portal: bool,
    ) -> bool
    where
        W: WorldAccess + ?Sized,
    {
        let mut changed = false;
        if via_portal
            && !self.store.is_unlocked(chunk)
            && self.ledger.available_credits(actor) >= UNLOCK_COST
        {
            changed = self.try_unlock_with_walls(world, actor, chunk);
            if changed {
                tracing::info!("Actor {} unlocked {} on portal arrival", actor, chunk);
            }
        }
        changed | self.update_penalty(actor, chunk)
    }

    /// Publish a `PenaltyChanged` when `actor`'s state flips.
    fn update_penalty(&mut self, actor: Uuid, chunk: ChunkPos) -> bool {
        let active = self.should_penalize(actor, chunk);
        let flipped = if active {
            self.penalized.insert(actor)
        } else {
            self.penalized.remove(&actor)
        };
        if flipped {
            tracing::debug!(
                "Penalty {} for actor {} in {}",
                if active { "applies" } else { "lifted" },
                actor,
                chunk
            );
            self.bus.publish(ProgressionEvent::PenaltyChanged {
                actor,
                chunk,
                active,
            });
        }
        flipped
    }

    // -- Walls --

    pub fn update_walls_after_unlock<W>(&mut self, world: &W, chunk: ChunkPos) -> WallDelta
    where
        W: WorldAccess + ?Sized,
    {
        if !self.store.barriers_enabled() {
            return WallDelta::default();
        }
        let delta = self
            .walls
            .update_after_unlock(world, chunk, self.store.unlocked());
        self.publish_walls(chunk, delta);
        delta
    }

    pub fn update_walls_after_lock<W>(&mut self, world: &W, chunk: ChunkPos) -> WallDelta
    where
        W: WorldAccess + ?Sized,
    {
        if !self.store.barriers_enabled() {
            return WallDelta::default();
        }
        let delta = self
            .walls
            .update_after_lock(world, chunk, self.store.unlocked());
        self.publish_walls(chunk, delta);
        delta
    }

    fn publish_walls(&self, chunk: ChunkPos, delta: WallDelta) {
        if !delta.is_empty() {
            self.bus.publish(ProgressionEvent::WallsUpdated {
                chunk,
                placed: delta.placed,
                removed: delta.removed,
            });
        }
    }

    /// Build walls around the whole frontier. Run once at startup.
    pub fn initialize_walls<W>(&mut self, world: &W) -> usize
    where
        W: WorldAccess + Sync,
    {
        if !self.store.barriers_enabled() {
            tracing::info!("Barriers disabled, skipping wall build");
            return 0;
        }
        self.walls.rebuild(world, self.store.unlocked())
    }

    /// Toggle wall enforcement. Enabling rebuilds every wall; disabling
    /// removes them all.
    pub fn set_barriers_enabled<W>(&mut self, world: &W, enabled: bool) -> bool
    where
        W: WorldAccess + Sync,
    {
        if !self.store.set_barriers_enabled(enabled) {
            return false;
        }
        if enabled {
            self.walls.rebuild(world, self.store.unlocked());
        } else {
            self.walls.clear_all(world);
        }
        tracing::info!("Barriers {}", if enabled { "enabled" } else { "disabled" });
        self.bus.publish(ProgressionEvent::BarriersToggled { enabled });
        self.mark_dirty_and_save();
        true
    }

    // -- Host events --

    /// React to something the host reported. Returns whether any state or
    /// terrain changed.
    pub fn handle_host_event<W>(&mut self, world: &W, event: HostEvent) -> bool
    where
        W: WorldAccess + ?Sized,
    {
        match event {
            HostEvent::BlockDestroyed {
                pos,
                previous,
                was_wall,
            } => {
                if !self.store.barriers_enabled() {
                    return false;
                }
                let restored =
                    self.walls
                        .on_block_destroyed(world, pos, was_wall, self.store.unlocked());
                if restored {
                    tracing::debug!("Replaced broken {} at boundary", block::name(previous));
                    self.bus.publish(ProgressionEvent::WallRestored { pos });
                }
                restored
            }
            HostEvent::ChunkLoaded(loaded) => {
                if !self.store.barriers_enabled() {
                    return false;
                }
                let mut changed = false;
                for chunk in self.walls.lazy().on_chunk_loaded(loaded) {
                    let delta = self.walls.refresh(world, chunk, self.store.unlocked());
                    self.publish_walls(chunk, delta);
                    changed |= !delta.is_empty();
                }
                changed
            }
            HostEvent::MilestoneCompleted {
                actor,
                milestone,
                reward,
            } => self.record_milestone(actor, &milestone, reward),
            HostEvent::ActorEnteredChunk {
                actor,
                chunk,
                via_portal,
            } => self.on_actor_entered_chunk(world, actor, chunk, via_portal),
            HostEvent::ActorLeft(actor) => self.penalized.remove(&actor),
        }
    }

    /// Feed every chunk the world loaded since the last call through
    /// `handle_host_event`.
    pub fn sync_loaded_chunks(&mut self, world: &World) -> usize {
        let loaded = world.take_newly_loaded();
        let count = loaded.len();
        for chunk in loaded {
            self.handle_host_event(world, HostEvent::ChunkLoaded(chunk));
        }
        count
    }

    // -- Persistence --

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    /// Mark dirty and write through. A failed write is logged and the state
    /// stays dirty so the next save retries.
    fn mark_dirty_and_save(&mut self) {
        self.store.mark_dirty();
        self.save();
    }

    /// Write current state if a file is attached. Returns whether state is
    /// now clean on disk.
    pub fn save(&mut self) -> bool {
        let Some(file) = &self.file else {
            return false;
        };
        match file.save(&self.store, &self.ledger) {
            Ok(()) => {
                self.store.mark_clean();
                true
            }
            Err(e) => {
                tracing::error!("Failed to save progress: {:#}", e);
                false
            }
        }
    }

    pub fn debug_snapshot(&mut self) -> DebugSnapshot {
        let frontier_chunks = self.calculate_frontier().len();
        let mut area_sizes: Vec<usize> = self
            .calculate_global_areas()
            .iter()
            .map(|a| a.chunk_count())
            .collect();
        area_sizes.sort_unstable_by(|a, b| b.cmp(a));

        DebugSnapshot {
            mode: self.store.mode(),
            mode_locked: self.store.is_mode_locked(),
            barriers_enabled: self.store.barriers_enabled(),
            unlocked_chunks: self.store.unlocked_count(),
            frontier_chunks,
            area_sizes,
            wall_cells: self.walls.wall_count(),
            deferred_chunks: self.walls.lazy().pending_count(),
            players: self.ledger.player_count(),
            penalized_players: self.penalized.len(),
            dirty: self.store.is_dirty(),
        }
    }
}

impl Default for UnlockTransactor {
    fn default() -> Self {
        Self::new(ProgressionConfig::default())
    }
}
