//! Chunks whose walls could not be built because their data was not
//! resident. They wait here until the host reports a load nearby.

use chunklock_engine::world::position::ChunkPos;
use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct LazyBoundaryLoader {
    awaiting: DashSet<ChunkPos>,
}

impl LazyBoundaryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the chunk was already waiting.
    pub fn defer(&self, chunk: ChunkPos) -> bool {
        self.awaiting.insert(chunk)
    }

    pub fn is_awaiting(&self, chunk: ChunkPos) -> bool {
        self.awaiting.contains(&chunk)
    }

    pub fn pending_count(&self) -> usize {
        self.awaiting.len()
    }

    pub fn forget(&self, chunk: ChunkPos) -> bool {
        self.awaiting.remove(&chunk).is_some()
    }

    pub fn clear(&self) {
        self.awaiting.clear();
    }

    /// A chunk finished loading. Removes and returns every awaiting entry
    /// equal or adjacent to it; the caller builds their walls now.
    pub fn on_chunk_loaded(&self, loaded: ChunkPos) -> Vec<ChunkPos> {
        let mut ready = Vec::new();
        if self.awaiting.remove(&loaded).is_some() {
            ready.push(loaded);
        }
        for n in loaded.neighbors() {
            if self.awaiting.remove(&n).is_some() {
                ready.push(n);
            }
        }
        ready
    }
}
