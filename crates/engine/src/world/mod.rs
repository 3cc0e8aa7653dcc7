pub mod block;
pub mod chunk;
pub mod position;

use block::BlockId;
use chunk::Chunk;
use dashmap::{DashMap, DashSet};
use position::{BlockPos, ChunkPos};

/// Block-level access to a world, as seen by code that edits terrain it does
/// not own (boundary walls, reactive repairs).
///
/// Writes that target a cell already holding the requested block must be
/// harmless no-ops.
pub trait WorldAccess {
    fn get_block(&self, pos: BlockPos) -> BlockId;

    fn set_block(&self, pos: BlockPos, block: BlockId);

    /// Whether the chunk's data is resident. Edits to non-resident chunks are
    /// deferred by callers rather than forced.
    fn is_chunk_loaded(&self, pos: ChunkPos) -> bool;
}

/// The entire block world. Thread-safe, lock-sharded by chunk.
pub struct World {
    chunks: DashMap<ChunkPos, Chunk>,
    /// Chunks that have been modified since the last save.
    dirty: DashSet<ChunkPos>,
    /// Chunks that became resident since the last `take_newly_loaded` call.
    newly_loaded: DashSet<ChunkPos>,
}

impl World {
    pub fn new() -> Self {
        Self {
            chunks: DashMap::new(),
            dirty: DashSet::new(),
            newly_loaded: DashSet::new(),
        }
    }

    /// Read a block at an absolute position. Returns AIR for unloaded chunks.
    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        match self.chunks.get(&pos.chunk()) {
            Some(chunk) => chunk.get_block(pos.local()),
            None => BlockId::AIR,
        }
    }

    /// Write a block at an absolute position. Creates the chunk if needed and
    /// marks it dirty. Writing the block that is already there does nothing.
    ///
    /// Takes `&self` because `DashMap` provides interior mutability via
    /// per-shard locking.
    pub fn set_block(&self, pos: BlockPos, block: BlockId) {
        let chunk_pos = pos.chunk();
        if block.is_air() && !self.chunks.contains_key(&chunk_pos) {
            return;
        }
        let mut chunk = self.chunks.entry(chunk_pos).or_default();
        let local = pos.local();
        if chunk.get_block(local) == block {
            return;
        }
        chunk.set_block(local, block);
        drop(chunk);
        self.dirty.insert(chunk_pos);
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    /// Insert a chunk without marking it dirty (used for generation/loading).
    /// The position is queued for `take_newly_loaded`.
    pub fn insert_chunk(&self, pos: ChunkPos, chunk: Chunk) {
        self.chunks.insert(pos, chunk);
        self.newly_loaded.insert(pos);
    }

    /// Drop a chunk from memory. Returns whether it was resident.
    pub fn unload_chunk(&self, pos: ChunkPos) -> bool {
        self.newly_loaded.remove(&pos);
        let was_loaded = self.chunks.remove(&pos).is_some();
        if was_loaded && self.dirty.contains(&pos) {
            tracing::warn!("Unloaded chunk {} with unsaved changes", pos);
        }
        was_loaded
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Count blocks of one kind inside a single chunk (0 if not resident).
    pub fn count_in_chunk(&self, pos: ChunkPos, block: BlockId) -> usize {
        self.chunks.get(&pos).map_or(0, |chunk| chunk.count(block))
    }

    /// Drain and return all chunk positions modified since the last call.
    pub fn take_dirty_chunks(&self) -> Vec<ChunkPos> {
        drain(&self.dirty)
    }

    /// Drain and return all chunk positions that became resident since the
    /// last call.
    pub fn take_newly_loaded(&self) -> Vec<ChunkPos> {
        drain(&self.newly_loaded)
    }

    /// Number of chunks currently marked dirty.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }
}

// Collect then remove; a position re-inserted between the two steps is simply
// reported again next time.
fn drain(set: &DashSet<ChunkPos>) -> Vec<ChunkPos> {
    let taken: Vec<ChunkPos> = set.iter().map(|entry| *entry).collect();
    for pos in &taken {
        set.remove(pos);
    }
    taken
}

impl WorldAccess for World {
    fn get_block(&self, pos: BlockPos) -> BlockId {
        World::get_block(self, pos)
    }

    fn set_block(&self, pos: BlockPos, block: BlockId) {
        World::set_block(self, pos, block);
    }

    fn is_chunk_loaded(&self, pos: ChunkPos) -> bool {
        self.has_chunk(pos)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
