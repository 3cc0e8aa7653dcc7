//! The single source of truth for which chunks are unlocked, plus the
//! world-wide flags saved alongside it (mode, barrier toggle, starter-kit
//! bookkeeping).

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chunklock_engine::world::position::ChunkPos;
use uuid::Uuid;

use super::mode::{Mode, ModeError};

/// One entry of the starter kit handed to an actor on first join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarterItem {
    pub item: &'static str,
    pub count: u32,
}

pub const STARTER_KIT: &[StarterItem] = &[
    StarterItem {
        item: "minecraft:oak_sapling",
        count: 3,
    },
    StarterItem {
        item: "minecraft:bone_meal",
        count: 10,
    },
];

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// A set of unlocked chunks with a generation counter that moves on every
/// mutation. Readers (the area cache) compare `(token, generation)` to tell
/// whether what they computed is still current.
///
/// Every set, clones included, gets its own token, so two sets never share a
/// `(token, generation)` pair.
#[derive(Debug)]
pub struct UnlockSet {
    chunks: HashSet<ChunkPos>,
    token: u64,
    generation: u64,
}

impl UnlockSet {
    pub fn new() -> Self {
        Self::with_chunks(HashSet::new(), 0)
    }

    fn with_chunks(chunks: HashSet<ChunkPos>, generation: u64) -> Self {
        Self {
            chunks,
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            generation,
        }
    }

    pub fn contains(&self, chunk: ChunkPos) -> bool {
        self.chunks.contains(&chunk)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.iter().copied()
    }

    pub fn as_set(&self) -> &HashSet<ChunkPos> {
        &self.chunks
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Identity of this set instance.
    pub fn token(&self) -> u64 {
        self.token
    }

    pub(crate) fn insert(&mut self, chunk: ChunkPos) -> bool {
        let added = self.chunks.insert(chunk);
        if added {
            self.generation += 1;
        }
        added
    }

    pub(crate) fn remove(&mut self, chunk: ChunkPos) -> bool {
        let removed = self.chunks.remove(&chunk);
        if removed {
            self.generation += 1;
        }
        removed
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.chunks.len();
        if count > 0 {
            self.chunks.clear();
            self.generation += 1;
        }
        count
    }
}

impl Clone for UnlockSet {
    fn clone(&self) -> Self {
        Self::with_chunks(self.chunks.clone(), self.generation)
    }
}

impl Default for UnlockSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<ChunkPos> for UnlockSet {
    fn from_iter<I: IntoIterator<Item = ChunkPos>>(iter: I) -> Self {
        let mut set = UnlockSet::new();
        for chunk in iter {
            set.insert(chunk);
        }
        set
    }
}

impl<'a> IntoIterator for &'a UnlockSet {
    type Item = &'a ChunkPos;
    type IntoIter = std::collections::hash_set::Iter<'a, ChunkPos>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

/// World-wide progression state. Mutated only through the transactor during
/// play and through the loader at startup.
#[derive(Debug, Clone)]
pub struct UnlockStateStore {
    unlocked: UnlockSet,
    mode: Mode,
    mode_locked: bool,
    barriers_enabled: bool,
    starter_items_given: HashSet<Uuid>,
    dirty: bool,
}

impl UnlockStateStore {
    pub fn new() -> Self {
        Self {
            unlocked: UnlockSet::new(),
            mode: Mode::Disabled,
            mode_locked: false,
            barriers_enabled: true,
            starter_items_given: HashSet::new(),
            dirty: false,
        }
    }

    // -- Unlocked set --

    pub fn unlocked(&self) -> &UnlockSet {
        &self.unlocked
    }

    pub fn is_unlocked(&self, chunk: ChunkPos) -> bool {
        self.unlocked.contains(chunk)
    }

    pub fn unlocked_count(&self) -> usize {
        self.unlocked.len()
    }

    pub fn generation(&self) -> u64 {
        self.unlocked.generation()
    }

    pub(crate) fn unlock(&mut self, chunk: ChunkPos) -> bool {
        let added = self.unlocked.insert(chunk);
        if added {
            self.dirty = true;
        }
        added
    }

    pub(crate) fn lock(&mut self, chunk: ChunkPos) -> bool {
        let removed = self.unlocked.remove(chunk);
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub(crate) fn clear_all(&mut self) -> usize {
        let count = self.unlocked.clear();
        if count > 0 {
            self.dirty = true;
        }
        count
    }

    // -- Mode --

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True once an active mode has been chosen (or loaded).
    pub fn is_mode_locked(&self) -> bool {
        self.mode_locked
    }

    /// Choose the mode. Choosing EASY or EXTREME succeeds once per world; any
    /// later call fails, even one naming the current mode. Choosing DISABLED
    /// is recorded but leaves the choice open, the same as after a reload.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), ModeError> {
        if self.mode_locked {
            return Err(ModeError::AlreadySet { current: self.mode });
        }
        self.mode = mode;
        self.mode_locked = mode.is_active();
        self.dirty = true;
        Ok(())
    }

    /// Loader entry point. Only an active mode freezes on load, so a world
    /// saved before anyone picked a mode can still pick one.
    pub(crate) fn restore_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.mode_locked = mode.is_active();
    }

    // -- Barrier toggle --

    pub fn barriers_enabled(&self) -> bool {
        self.barriers_enabled
    }

    /// Returns whether the flag changed.
    pub(crate) fn set_barriers_enabled(&mut self, enabled: bool) -> bool {
        if self.barriers_enabled == enabled {
            return false;
        }
        self.barriers_enabled = enabled;
        self.dirty = true;
        true
    }

    // -- Starter items --

    pub fn has_received_starter_items(&self, actor: Uuid) -> bool {
        self.starter_items_given.contains(&actor)
    }

    /// Marks dirty only the first time an actor is recorded.
    pub fn mark_starter_items_given(&mut self, actor: Uuid) -> bool {
        let added = self.starter_items_given.insert(actor);
        if added {
            self.dirty = true;
        }
        added
    }

    pub fn should_give_starter_items(&self, actor: Uuid) -> bool {
        self.mode.is_active() && !self.has_received_starter_items(actor)
    }

    pub fn starter_items_given(&self) -> impl Iterator<Item = &Uuid> {
        self.starter_items_given.iter()
    }

    pub fn starter_items_given_count(&self) -> usize {
        self.starter_items_given.len()
    }

    // -- Dirty flag --

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl Default for UnlockStateStore {
    fn default() -> Self {
        Self::new()
    }
}
