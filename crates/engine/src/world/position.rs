/// Number of blocks along each horizontal axis of a chunk column.
pub const CHUNK_WIDTH: i64 = 16;

/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }

    /// Position within the chunk (0..16 on x/z, unbounded y).
    pub const fn local(&self) -> LocalBlockPos {
        LocalBlockPos {
            x: (self.x & 0xF) as u8,
            y: self.y,
            z: (self.z & 0xF) as u8,
        }
    }

    /// The chunk edges this block sits on. Interior blocks return an empty vec;
    /// corner blocks return two directions.
    pub fn chunk_edges(&self) -> Vec<Direction> {
        let local = self.local();
        let mut edges = Vec::with_capacity(2);
        if local.z == 0 {
            edges.push(Direction::North);
        }
        if local.z == 15 {
            edges.push(Direction::South);
        }
        if local.x == 15 {
            edges.push(Direction::East);
        }
        if local.x == 0 {
            edges.push(Direction::West);
        }
        edges
    }
}

/// The four horizontal directions. North is -Z, east is +X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally, full height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self, y: i64) -> BlockPos {
        BlockPos::new((self.x as i64) << 4, y, (self.z as i64) << 4)
    }

    /// The chunk across `dir`, or `None` past the edge of the coordinate range.
    pub const fn neighbor(&self, dir: Direction) -> Option<ChunkPos> {
        let (dx, dz) = dir.offset();
        match (self.x.checked_add(dx), self.z.checked_add(dz)) {
            (Some(x), Some(z)) => Some(ChunkPos::new(x, z)),
            _ => None,
        }
    }

    /// The cardinal neighbors in N, S, E, W order. Chunks on the edge of the
    /// coordinate range have fewer than four.
    pub fn neighbors(&self) -> Vec<ChunkPos> {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.neighbor(dir))
            .collect()
    }

    /// True if `other` shares a face with this chunk (diagonals do not count).
    pub fn is_adjacent(&self, other: &ChunkPos) -> bool {
        let dx = (self.x as i64 - other.x as i64).abs();
        let dz = (self.z as i64 - other.z as i64).abs();
        dx + dz == 1
    }

    /// Direction from this chunk to an adjacent one.
    pub fn direction_to(&self, other: &ChunkPos) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|dir| self.neighbor(*dir) == Some(*other))
    }

    /// The 16 block columns `(x, z)` lying on the given face of this chunk,
    /// inside this chunk.
    pub fn edge_columns(&self, dir: Direction) -> [(i64, i64); 16] {
        let min_x = (self.x as i64) * CHUNK_WIDTH;
        let min_z = (self.z as i64) * CHUNK_WIDTH;
        let max_x = min_x + CHUNK_WIDTH - 1;
        let max_z = min_z + CHUNK_WIDTH - 1;
        std::array::from_fn(|i| {
            let i = i as i64;
            match dir {
                Direction::North => (min_x + i, min_z),
                Direction::South => (min_x + i, max_z),
                Direction::East => (max_x, min_z + i),
                Direction::West => (min_x, min_z + i),
            }
        })
    }
}

impl std::fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Block position local to a chunk (x, z in 0..16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalBlockPos {
    pub x: u8,
    pub y: i64,
    pub z: u8,
}

impl LocalBlockPos {
    pub const fn section_index(&self) -> i32 {
        (self.y >> 4) as i32
    }

    pub const fn section_local_y(&self) -> u8 {
        (self.y.rem_euclid(16)) as u8
    }
}
