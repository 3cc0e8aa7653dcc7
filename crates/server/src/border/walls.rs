//! Boundary walls: columns of wall material on every face where a locked
//! chunk meets an unlocked one, always built inside the locked chunk.

use std::collections::HashSet;

use chunklock_engine::world::WorldAccess;
use chunklock_engine::world::position::{BlockPos, ChunkPos, Direction};
use dashmap::{DashMap, DashSet};
use rayon::prelude::*;

use super::batch::{self, MAX_BATCH_SIZE};
use super::lazy::LazyBoundaryLoader;
use crate::block;
use crate::config::WorldHeight;
use crate::progression::access::AccessGate;
use crate::progression::store::UnlockSet;

/// Cells written and cleared by one wall update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallDelta {
    pub placed: usize,
    pub removed: usize,
}

impl WallDelta {
    pub fn is_empty(&self) -> bool {
        self.placed == 0 && self.removed == 0
    }
}

impl std::ops::AddAssign for WallDelta {
    fn add_assign(&mut self, rhs: Self) {
        self.placed += rhs.placed;
        self.removed += rhs.removed;
    }
}

/// Tracks every wall cell it placed, keyed by the locked chunk that owns it.
///
/// All methods take `&self`; tracking lives in concurrent maps so a rebuild
/// can wall many chunks in parallel.
pub struct BoundaryWallManager {
    height: WorldHeight,
    batch_size: usize,
    chunk_walls: DashMap<ChunkPos, HashSet<BlockPos>>,
    all_walls: DashSet<BlockPos>,
    lazy: LazyBoundaryLoader,
}

impl BoundaryWallManager {
    pub fn new(height: WorldHeight) -> Self {
        Self::with_batch_size(height, MAX_BATCH_SIZE)
    }

    pub fn with_batch_size(height: WorldHeight, batch_size: usize) -> Self {
        Self {
            height,
            batch_size: batch_size.max(1),
            chunk_walls: DashMap::new(),
            all_walls: DashSet::new(),
            lazy: LazyBoundaryLoader::new(),
        }
    }

    pub fn height(&self) -> WorldHeight {
        self.height
    }

    pub fn lazy(&self) -> &LazyBoundaryLoader {
        &self.lazy
    }

    // -- Queries --

    pub fn wall_count(&self) -> usize {
        self.all_walls.len()
    }

    pub fn is_tracked(&self, pos: BlockPos) -> bool {
        self.all_walls.contains(&pos)
    }

    /// Tracked cells owned by `chunk`.
    pub fn walls_for(&self, chunk: ChunkPos) -> HashSet<BlockPos> {
        self.chunk_walls
            .get(&chunk)
            .map(|walls| walls.value().clone())
            .unwrap_or_default()
    }

    pub fn tracked_chunk_count(&self) -> usize {
        self.chunk_walls.len()
    }

    // -- Placement --

    /// Wall `locked` on each face whose neighbor is unlocked. The caller
    /// guarantees `locked` is resident and not in `unlocked`.
    pub fn place_walls<W>(&self, world: &W, locked: ChunkPos, unlocked: &UnlockSet) -> usize
    where
        W: WorldAccess + ?Sized,
    {
        let cells: Vec<BlockPos> = Direction::ALL
            .into_iter()
            .filter(|dir| locked.neighbor(*dir).is_some_and(|n| unlocked.contains(n)))
            .flat_map(|dir| self.face_cells(locked, dir))
            .collect();
        if cells.is_empty() {
            return 0;
        }

        let mut placed = 0;
        for batch in batch::split_into_batches(world, cells, self.batch_size) {
            let walled = batch.place();
            placed += walled.len();
            self.track(locked, walled);
        }
        tracing::debug!("Walled chunk {} ({} cells)", locked, placed);
        placed
    }

    /// Put wall material back at `pos` and track it under `owner`.
    pub fn restore_wall<W>(&self, world: &W, pos: BlockPos, owner: ChunkPos)
    where
        W: WorldAccess + ?Sized,
    {
        world.set_block(pos, block::barrier());
        self.track(owner, [pos]);
    }

    fn track(&self, owner: ChunkPos, cells: impl IntoIterator<Item = BlockPos>) {
        let mut entry = self.chunk_walls.entry(owner).or_default();
        for pos in cells {
            entry.insert(pos);
            self.all_walls.insert(pos);
        }
    }

    fn untrack(&self, pos: BlockPos) {
        if self.all_walls.remove(&pos).is_none() {
            return;
        }
        let owner = pos.chunk();
        // Reactive repairs may file a cell under the neighbor across the seam.
        for candidate in std::iter::once(owner).chain(owner.neighbors()) {
            if let Some(mut walls) = self.chunk_walls.get_mut(&candidate) {
                if walls.remove(&pos) {
                    break;
                }
            }
        }
    }

    // -- Removal --

    /// Clear every tracked wall owned by `chunk`, then sweep its four faces
    /// for untracked wall material left by earlier runs.
    pub fn remove_walls<W>(&self, world: &W, chunk: ChunkPos) -> usize
    where
        W: WorldAccess + ?Sized,
    {
        let mut removed = 0;
        if let Some((_, cells)) = self.chunk_walls.remove(&chunk) {
            for pos in &cells {
                self.all_walls.remove(pos);
            }
            removed += batch::remove_batch(world, cells);
        }
        removed += self.remove_stray_walls(world, chunk);
        removed
    }

    /// Sweep all four faces of `chunk` for wall material.
    pub fn remove_stray_walls<W>(&self, world: &W, chunk: ChunkPos) -> usize
    where
        W: WorldAccess + ?Sized,
    {
        Direction::ALL
            .into_iter()
            .map(|dir| self.clear_face(world, chunk, dir))
            .sum()
    }

    /// Sweep the face of `chunk` that touches `neighbor`. Non-adjacent pairs
    /// are ignored.
    pub fn remove_stray_walls_at_boundary<W>(
        &self,
        world: &W,
        chunk: ChunkPos,
        neighbor: ChunkPos,
    ) -> usize
    where
        W: WorldAccess + ?Sized,
    {
        match chunk.direction_to(&neighbor) {
            Some(dir) => self.clear_face(world, chunk, dir),
            None => 0,
        }
    }

    fn clear_face<W>(&self, world: &W, chunk: ChunkPos, dir: Direction) -> usize
    where
        W: WorldAccess + ?Sized,
    {
        let wall = block::barrier();
        let mut cleared = 0;
        for pos in self.face_cells(chunk, dir) {
            if world.get_block(pos) == wall {
                world.set_block(pos, block::AIR);
                self.untrack(pos);
                cleared += 1;
            }
        }
        cleared
    }

    /// Remove everything tracked and forget all deferred work.
    pub fn clear_all<W>(&self, world: &W) -> usize
    where
        W: WorldAccess + ?Sized,
    {
        let cells: Vec<BlockPos> = self.all_walls.iter().map(|p| *p).collect();
        let removed = batch::remove_batch(world, cells);
        self.clear_tracking();
        self.lazy.clear();
        tracing::info!("Cleared {} wall cells", removed);
        removed
    }

    /// Forget tracked walls without touching the world.
    pub fn clear_tracking(&self) {
        self.chunk_walls.clear();
        self.all_walls.clear();
    }

    // -- Updates --

    /// Rewall one locked chunk from scratch, or defer it if not resident.
    pub fn refresh<W>(&self, world: &W, locked: ChunkPos, unlocked: &UnlockSet) -> WallDelta
    where
        W: WorldAccess + ?Sized,
    {
        if unlocked.contains(locked) {
            self.lazy.forget(locked);
            return WallDelta::default();
        }
        if !world.is_chunk_loaded(locked) {
            self.lazy.defer(locked);
            tracing::debug!("Deferred walls for unloaded chunk {}", locked);
            return WallDelta::default();
        }
        let removed = self.remove_walls(world, locked);
        let placed = self.place_walls(world, locked, unlocked);
        WallDelta { placed, removed }
    }

    /// `chunk` just joined `unlocked`: tear down its walls and rewall its
    /// locked neighbors against it.
    pub fn update_after_unlock<W>(&self, world: &W, chunk: ChunkPos, unlocked: &UnlockSet) -> WallDelta
    where
        W: WorldAccess + ?Sized,
    {
        self.lazy.forget(chunk);
        let mut delta = WallDelta {
            placed: 0,
            removed: self.remove_walls(world, chunk),
        };
        for n in chunk.neighbors() {
            if !unlocked.contains(n) {
                delta += self.refresh(world, n, unlocked);
            }
        }
        delta
    }

    /// `chunk` just left `unlocked`: wall it against its unlocked neighbors
    /// and drop the faces its locked neighbors had built toward it.
    pub fn update_after_lock<W>(&self, world: &W, chunk: ChunkPos, unlocked: &UnlockSet) -> WallDelta
    where
        W: WorldAccess + ?Sized,
    {
        let mut delta = self.refresh(world, chunk, unlocked);
        for n in chunk.neighbors() {
            if !unlocked.contains(n) {
                delta += self.refresh(world, n, unlocked);
            }
        }
        delta
    }

    /// Clear everything, then wall the whole frontier in parallel. Frontier
    /// chunks that are not resident are deferred.
    pub fn rebuild<W>(&self, world: &W, unlocked: &UnlockSet) -> usize
    where
        W: WorldAccess + Sync,
    {
        self.clear_all(world);
        let (loaded, unloaded): (Vec<ChunkPos>, Vec<ChunkPos>) = AccessGate::new(unlocked)
            .frontier()
            .into_iter()
            .partition(|c| world.is_chunk_loaded(*c));
        for chunk in &unloaded {
            self.lazy.defer(*chunk);
        }

        let placed: usize = loaded
            .par_iter()
            .map(|chunk| self.place_walls(world, *chunk, unlocked))
            .sum();
        tracing::info!(
            "Rebuilt walls: {} cells around {} frontier chunks ({} deferred)",
            placed,
            loaded.len(),
            unloaded.len()
        );
        placed
    }

    // -- Reactive repair --

    /// Which locked chunk should own a wall at `pos`, if one belongs there.
    ///
    /// For a destroyed wall cell: the cell sits on a face between chunks of
    /// different state. For destroyed terrain: the cell is in a locked chunk
    /// on a face toward an unlocked one. Interior cells never need a wall.
    pub fn barrier_owner(&self, pos: BlockPos, was_wall: bool, unlocked: &UnlockSet) -> Option<ChunkPos> {
        if !self.height.contains(pos.y) {
            return None;
        }
        let current = pos.chunk();
        let current_unlocked = unlocked.contains(current);
        if !was_wall && current_unlocked {
            return None;
        }

        for dir in pos.chunk_edges() {
            let Some(neighbor) = current.neighbor(dir) else {
                continue;
            };
            let neighbor_unlocked = unlocked.contains(neighbor);
            if was_wall {
                if current_unlocked != neighbor_unlocked {
                    return Some(if current_unlocked { neighbor } else { current });
                }
            } else if neighbor_unlocked {
                return Some(current);
            }
        }
        None
    }

    pub fn should_have_barrier(&self, pos: BlockPos, was_wall: bool, unlocked: &UnlockSet) -> bool {
        self.barrier_owner(pos, was_wall, unlocked).is_some()
    }

    /// Host reports a broken block. Returns true if wall material was put back.
    pub fn on_block_destroyed<W>(
        &self,
        world: &W,
        pos: BlockPos,
        was_wall: bool,
        unlocked: &UnlockSet,
    ) -> bool
    where
        W: WorldAccess + ?Sized,
    {
        match self.barrier_owner(pos, was_wall, unlocked) {
            Some(owner) => {
                self.restore_wall(world, pos, owner);
                tracing::debug!(
                    "Restored wall at ({}, {}, {}) for chunk {}",
                    pos.x,
                    pos.y,
                    pos.z,
                    owner
                );
                true
            }
            None => {
                if was_wall {
                    self.untrack(pos);
                }
                false
            }
        }
    }

    /// Every cell of one face of `chunk` over the configured height.
    fn face_cells(&self, chunk: ChunkPos, dir: Direction) -> impl Iterator<Item = BlockPos> + '_ {
        let columns = chunk.edge_columns(dir);
        columns
            .into_iter()
            .flat_map(move |(x, z)| self.height.ys().map(move |y| BlockPos::new(x, y, z)))
    }
}
