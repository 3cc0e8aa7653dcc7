//! Bounded groups of wall writes.
//!
//! Wall construction touches tens of thousands of cells per chunk face, so
//! writes are grouped into batches of at most `MAX_BATCH_SIZE` positions that
//! are applied one group at a time.

use std::collections::HashSet;
use std::time::Instant;

use chunklock_engine::world::WorldAccess;
use chunklock_engine::world::position::{BlockPos, ChunkPos};

use crate::block;
use crate::config::WorldHeight;

pub const MAX_BATCH_SIZE: usize = 256;

/// A set of cells to turn into wall material, bound to the world it writes to.
pub struct WallBatch<'w, W: ?Sized> {
    world: &'w W,
    positions: Vec<BlockPos>,
    capacity: usize,
    created_at: Instant,
}

impl<'w, W: WorldAccess + ?Sized> WallBatch<'w, W> {
    pub fn new(world: &'w W) -> Self {
        Self::with_capacity(world, MAX_BATCH_SIZE)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(world: &'w W, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            world,
            positions: Vec::with_capacity(capacity),
            capacity,
            created_at: Instant::now(),
        }
    }

    /// Returns false, leaving the batch unchanged, once it is full.
    pub fn add_position(&mut self, pos: BlockPos) -> bool {
        if self.is_full() {
            return false;
        }
        self.positions.push(pos);
        true
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.positions.len() >= self.capacity
    }

    pub fn positions(&self) -> &[BlockPos] {
        &self.positions
    }

    pub fn world(&self) -> &'w W {
        self.world
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn affected_chunks(&self) -> HashSet<ChunkPos> {
        self.positions.iter().map(|p| p.chunk()).collect()
    }

    /// Write wall material into every replaceable cell. Returns the cells
    /// that hold wall material afterwards, including ones that already did.
    /// Solid terrain is skipped.
    pub fn place(&self) -> Vec<BlockPos> {
        let wall = block::barrier();
        let mut walled = Vec::with_capacity(self.positions.len());
        for &pos in &self.positions {
            let current = self.world.get_block(pos);
            if current == wall {
                walled.push(pos);
            } else if block::is_replaceable(current) {
                self.world.set_block(pos, wall);
                walled.push(pos);
            }
        }
        tracing::trace!(
            "Placed batch: {}/{} walled in {:?}",
            walled.len(),
            self.positions.len(),
            self.created_at.elapsed()
        );
        walled
    }
}

/// Clear wall material from the given cells. Cells holding anything else are
/// left alone. Returns how many were cleared.
pub fn remove_batch<W, I>(world: &W, positions: I) -> usize
where
    W: WorldAccess + ?Sized,
    I: IntoIterator<Item = BlockPos>,
{
    let wall = block::barrier();
    let mut removed = 0;
    for pos in positions {
        if world.get_block(pos) == wall {
            world.set_block(pos, block::AIR);
            removed += 1;
        }
    }
    removed
}

/// Chunk a position list into batches of at most `capacity` cells each.
pub fn split_into_batches<'w, W>(
    world: &'w W,
    positions: impl IntoIterator<Item = BlockPos>,
    capacity: usize,
) -> Vec<WallBatch<'w, W>>
where
    W: WorldAccess + ?Sized,
{
    let mut batches = Vec::new();
    let mut current = WallBatch::with_capacity(world, capacity);
    for pos in positions {
        if !current.add_position(pos) {
            batches.push(std::mem::replace(
                &mut current,
                WallBatch::with_capacity(world, capacity),
            ));
            current.add_position(pos);
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Upper bound on cells touched when walling `chunks` chunks on two faces
/// each over the full height.
pub fn estimate_blocks_affected(chunks: usize, height: WorldHeight) -> usize {
    chunks * 2 * 16 * height.len()
}
