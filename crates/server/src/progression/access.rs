//! Read-only queries over the unlocked set: may an actor stand here, may a
//! chunk be unlocked next, and where is the frontier.

use std::collections::HashSet;

use chunklock_engine::world::position::ChunkPos;

use super::store::UnlockSet;

/// Borrowing view over an `UnlockSet`. Cheap to build per query.
#[derive(Debug, Clone, Copy)]
pub struct AccessGate<'a> {
    unlocked: &'a UnlockSet,
}

impl<'a> AccessGate<'a> {
    pub fn new(unlocked: &'a UnlockSet) -> Self {
        Self { unlocked }
    }

    pub fn can_access(&self, chunk: ChunkPos) -> bool {
        self.unlocked.contains(chunk)
    }

    /// Does any cardinal neighbor of `chunk` belong to the unlocked set?
    pub fn is_adjacent_to_unlocked(&self, chunk: ChunkPos) -> bool {
        chunk
            .neighbors()
            .into_iter()
            .any(|n| self.unlocked.contains(n))
    }

    /// Bootstrap: with nothing unlocked, any chunk may be unlocked. Otherwise
    /// the chunk must be locked and touch the unlocked set.
    pub fn can_unlock(&self, chunk: ChunkPos) -> bool {
        if self.unlocked.is_empty() {
            return true;
        }
        !self.unlocked.contains(chunk) && self.is_adjacent_to_unlocked(chunk)
    }

    /// Locked chunks sharing a face with at least one unlocked chunk.
    pub fn frontier(&self) -> HashSet<ChunkPos> {
        let mut frontier = HashSet::new();
        for chunk in self.unlocked.iter() {
            for n in chunk.neighbors() {
                if !self.unlocked.contains(n) {
                    frontier.insert(n);
                }
            }
        }
        frontier
    }
}
