//! Playable areas: the 4-connected components of the unlocked set.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use chunklock_engine::world::position::ChunkPos;

use super::store::UnlockSet;

/// One connected component of unlocked chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableArea {
    id: usize,
    chunks: HashSet<ChunkPos>,
    center: ChunkPos,
}

impl PlayableArea {
    /// Panics on an empty chunk set; areas are only built from BFS results.
    pub fn new(id: usize, chunks: HashSet<ChunkPos>) -> Self {
        assert!(!chunks.is_empty(), "playable area {id} has no chunks");
        let center = centroid(&chunks);
        Self { id, chunks, center }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn chunks(&self) -> &HashSet<ChunkPos> {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Integer mean of member coordinates, truncated toward zero.
    pub fn center(&self) -> ChunkPos {
        self.center
    }

    pub fn contains(&self, chunk: ChunkPos) -> bool {
        self.chunks.contains(&chunk)
    }

    /// True if any member shares a face with `chunk`.
    pub fn is_adjacent_to(&self, chunk: ChunkPos) -> bool {
        chunk.neighbors().iter().any(|n| self.chunks.contains(n))
    }
}

impl fmt::Display for PlayableArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "area #{} ({} chunks, center {})",
            self.id,
            self.chunks.len(),
            self.center
        )
    }
}

fn centroid(chunks: &HashSet<ChunkPos>) -> ChunkPos {
    let len = chunks.len() as i64;
    let (sx, sz) = chunks
        .iter()
        .fold((0i64, 0i64), |(sx, sz), c| (sx + c.x as i64, sz + c.z as i64));
    ChunkPos::new((sx / len) as i32, (sz / len) as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheState {
    Empty,
    Valid { token: u64, generation: u64 },
    Invalid,
}

/// Computes playable areas and caches the last result.
///
/// A cached result is reused only while it was computed from the same
/// unlocked set instance at the same generation. Anything else recomputes, so
/// a stale partition is never returned.
#[derive(Debug)]
pub struct AreaDetector {
    state: CacheState,
    areas: Vec<PlayableArea>,
    /// Chunk -> index into `areas`.
    members: HashMap<ChunkPos, usize>,
    next_id: usize,
}

impl AreaDetector {
    pub fn new() -> Self {
        Self {
            state: CacheState::Empty,
            areas: Vec::new(),
            members: HashMap::new(),
            next_id: 0,
        }
    }

    /// Partition `unlocked` into connected components.
    pub fn detect(&mut self, unlocked: &UnlockSet) -> &[PlayableArea] {
        if !self.matches(unlocked) {
            self.recompute(unlocked);
        }
        &self.areas
    }

    /// Drop the cached partition. Must follow every change to the set.
    pub fn invalidate(&mut self) {
        if self.state != CacheState::Empty {
            self.state = CacheState::Invalid;
        }
    }

    pub fn is_cache_valid(&self) -> bool {
        matches!(self.state, CacheState::Valid { .. })
    }

    pub fn cached_area_count(&self) -> usize {
        if self.is_cache_valid() {
            self.areas.len()
        } else {
            0
        }
    }

    /// Area holding `chunk`, from the last detection. `None` if the chunk is
    /// not unlocked or no valid partition is cached.
    pub fn area_containing(&self, chunk: ChunkPos) -> Option<&PlayableArea> {
        if !self.is_cache_valid() {
            return None;
        }
        self.members.get(&chunk).map(|&i| &self.areas[i])
    }

    /// Every distinct cached area with a member next to `chunk`. A chunk
    /// between two islands reports both.
    pub fn areas_adjacent_to(&self, chunk: ChunkPos) -> Vec<&PlayableArea> {
        if !self.is_cache_valid() {
            return Vec::new();
        }
        let mut seen = Vec::with_capacity(4);
        for n in chunk.neighbors() {
            if let Some(&i) = self.members.get(&n) {
                if !seen.contains(&i) {
                    seen.push(i);
                }
            }
        }
        seen.into_iter().map(|i| &self.areas[i]).collect()
    }

    fn matches(&self, unlocked: &UnlockSet) -> bool {
        self.state
            == CacheState::Valid {
                token: unlocked.token(),
                generation: unlocked.generation(),
            }
    }

    fn recompute(&mut self, unlocked: &UnlockSet) {
        self.areas.clear();
        self.members.clear();

        let mut queue = VecDeque::new();
        for start in unlocked.iter() {
            if self.members.contains_key(&start) {
                continue;
            }
            let index = self.areas.len();
            let mut component = HashSet::new();
            self.members.insert(start, index);
            queue.push_back(start);

            while let Some(chunk) = queue.pop_front() {
                component.insert(chunk);
                for n in chunk.neighbors() {
                    if unlocked.contains(n) && !self.members.contains_key(&n) {
                        self.members.insert(n, index);
                        queue.push_back(n);
                    }
                }
            }

            self.areas.push(PlayableArea::new(self.next_id, component));
            self.next_id += 1;
        }

        self.state = CacheState::Valid {
            token: unlocked.token(),
            generation: unlocked.generation(),
        };
        tracing::debug!(
            "Detected {} playable area(s) over {} chunks",
            self.areas.len(),
            unlocked.len()
        );
    }
}

impl Default for AreaDetector {
    fn default() -> Self {
        Self::new()
    }
}
