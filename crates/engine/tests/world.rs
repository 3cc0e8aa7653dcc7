//! World substrate tests: coordinate math, sparse storage, residency tracking.
//! All block values are opaque `BlockId`s.

use chunklock_engine::world::block::BlockId;
use chunklock_engine::world::chunk::Chunk;
use chunklock_engine::world::position::{BlockPos, ChunkPos, Direction};
use chunklock_engine::world::{World, WorldAccess};

const STONE: BlockId = BlockId(1);
const MARKER: BlockId = BlockId(7);

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

#[test]
fn negative_blocks_map_to_negative_chunks() {
    assert_eq!(BlockPos::new(-1, 0, -1).chunk(), ChunkPos::new(-1, -1));
    assert_eq!(BlockPos::new(-16, 0, 15).chunk(), ChunkPos::new(-1, 0));
    assert_eq!(BlockPos::new(-17, 0, 16).chunk(), ChunkPos::new(-2, 1));

    let local = BlockPos::new(-1, 5, -16).local();
    assert_eq!((local.x, local.y, local.z), (15, 5, 0));
}

#[test]
fn neighbors_are_cardinal_only() {
    let c = ChunkPos::new(3, -2);
    let n = c.neighbors();
    assert_eq!(n[0], ChunkPos::new(3, -3));
    assert_eq!(n[1], ChunkPos::new(3, -1));
    assert_eq!(n[2], ChunkPos::new(4, -2));
    assert_eq!(n[3], ChunkPos::new(2, -2));

    for other in n {
        assert!(c.is_adjacent(&other));
    }
    assert!(!c.is_adjacent(&ChunkPos::new(4, -1)));
    assert!(!c.is_adjacent(&c));
}

#[test]
fn direction_to_round_trips_with_neighbor() {
    let c = ChunkPos::new(0, 0);
    for dir in Direction::ALL {
        let n = c.neighbor(dir).unwrap();
        assert_eq!(c.direction_to(&n), Some(dir));
        assert_eq!(n.neighbor(dir.opposite()), Some(c));
    }
    assert_eq!(c.direction_to(&ChunkPos::new(2, 0)), None);
}

#[test]
fn neighbors_stop_at_the_coordinate_range() {
    let east_edge = ChunkPos::new(i32::MAX, 0);
    assert_eq!(east_edge.neighbor(Direction::East), None);
    assert_eq!(
        east_edge.neighbors(),
        vec![
            ChunkPos::new(i32::MAX, -1),
            ChunkPos::new(i32::MAX, 1),
            ChunkPos::new(i32::MAX - 1, 0),
        ]
    );

    let corner = ChunkPos::new(i32::MIN, i32::MIN);
    assert_eq!(
        corner.neighbors(),
        vec![ChunkPos::new(i32::MIN, i32::MIN + 1), ChunkPos::new(i32::MIN + 1, i32::MIN)]
    );

    // The range does not wrap around.
    let west_edge = ChunkPos::new(i32::MIN, 0);
    assert!(!east_edge.is_adjacent(&west_edge));
    assert_eq!(east_edge.direction_to(&west_edge), None);
}

#[test]
fn edge_columns_stay_inside_the_chunk() {
    let c = ChunkPos::new(-1, 2);
    for dir in Direction::ALL {
        let cols = c.edge_columns(dir);
        for (x, z) in cols {
            let pos = BlockPos::new(x, 0, z);
            assert_eq!(pos.chunk(), c);
            assert!(pos.chunk_edges().contains(&dir), "{dir:?} column ({x}, {z})");
        }
    }
    assert_eq!(c.edge_columns(Direction::North)[0], (-16, 32));
    assert_eq!(c.edge_columns(Direction::East)[15], (-1, 47));
}

#[test]
fn interior_block_has_no_edges_and_corner_has_two() {
    assert!(BlockPos::new(5, 0, 5).chunk_edges().is_empty());
    let corner = BlockPos::new(0, 0, 15).chunk_edges();
    assert_eq!(corner.len(), 2);
    assert!(corner.contains(&Direction::South));
    assert!(corner.contains(&Direction::West));
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[test]
fn chunk_sections_are_sparse() {
    let mut chunk = Chunk::new();
    assert_eq!(chunk.section_count(), 0);

    chunk.fill_layers(-64..=-64, STONE);
    chunk.fill_layers(300..=300, STONE);
    assert_eq!(chunk.section_count(), 2);
    assert_eq!(chunk.count(STONE), 512);

    chunk.fill_layers(300..=300, BlockId::AIR);
    assert_eq!(chunk.section_count(), 1);
}

#[test]
fn unloaded_reads_are_air_and_air_writes_do_not_load() {
    let world = World::new();
    let pos = BlockPos::new(40, 10, 40);
    assert_eq!(world.get_block(pos), BlockId::AIR);

    world.set_block(pos, BlockId::AIR);
    assert!(!world.has_chunk(pos.chunk()));
    assert_eq!(world.dirty_count(), 0);
}

#[test]
fn same_block_write_is_a_no_op() {
    let world = World::new();
    let pos = BlockPos::new(1, 1, 1);
    world.set_block(pos, MARKER);
    assert_eq!(world.take_dirty_chunks(), vec![ChunkPos::new(0, 0)]);

    world.set_block(pos, MARKER);
    assert_eq!(world.dirty_count(), 0);
}

#[test]
fn newly_loaded_chunks_are_drained_once() {
    let world = World::new();
    world.insert_chunk(ChunkPos::new(0, 0), Chunk::new());
    world.insert_chunk(ChunkPos::new(1, 0), Chunk::new());

    let mut loaded = world.take_newly_loaded();
    loaded.sort();
    assert_eq!(loaded, vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0)]);
    assert!(world.take_newly_loaded().is_empty());
    // Loading is not a modification.
    assert_eq!(world.dirty_count(), 0);
}

#[test]
fn world_access_reports_residency() {
    let world = World::new();
    let access: &dyn WorldAccess = &world;
    assert!(!access.is_chunk_loaded(ChunkPos::new(0, 0)));

    world.insert_chunk(ChunkPos::new(0, 0), Chunk::new());
    assert!(access.is_chunk_loaded(ChunkPos::new(0, 0)));

    access.set_block(BlockPos::new(3, 70, 3), MARKER);
    assert_eq!(world.count_in_chunk(ChunkPos::new(0, 0), MARKER), 1);

    assert!(world.unload_chunk(ChunkPos::new(0, 0)));
    assert!(!access.is_chunk_loaded(ChunkPos::new(0, 0)));
}
