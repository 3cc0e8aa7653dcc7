//! Benchmark: sequential vs parallel boundary-wall rebuild.
//!
//! Unlocks a checkerboard of islands across a flat world so the frontier is
//! large, then walls it chunk-by-chunk and with the parallel rebuild.
//! Run with: `cargo run --release -p chunklock-server --example bench_walls`

use std::time::Instant;

use chunklock_engine::world::World;
use chunklock_engine::world::chunk::Chunk;
use chunklock_engine::world::position::ChunkPos;
use chunklock_server::block;
use chunklock_server::border::BoundaryWallManager;
use chunklock_server::border::batch::estimate_blocks_affected;
use chunklock_server::config::WorldHeight;
use chunklock_server::progression::{AccessGate, UnlockSet};

fn main() {
    let side = 24;
    let height = WorldHeight::OVERWORLD;

    // Every third chunk on both axes is an unlocked island.
    let unlocked: UnlockSet = (0..side)
        .flat_map(|x| (0..side).map(move |z| ChunkPos::new(x, z)))
        .filter(|c| c.x % 3 == 1 && c.z % 3 == 1)
        .collect();
    let frontier: Vec<ChunkPos> = AccessGate::new(&unlocked).frontier().into_iter().collect();

    println!("=== Chunklock: Wall Rebuild Benchmark ===\n");
    println!(
        "  {}x{} chunks, {} unlocked, {} on the frontier",
        side,
        side,
        unlocked.len(),
        frontier.len()
    );
    println!(
        "  upper bound: {} cells\n",
        estimate_blocks_affected(frontier.len(), height)
    );

    // --- Sequential ---
    let world_seq = build_world(side);
    let walls_seq = BoundaryWallManager::new(height);
    let t0 = Instant::now();
    let placed_seq: usize = frontier
        .iter()
        .map(|c| walls_seq.place_walls(&world_seq, *c, &unlocked))
        .sum();
    let dt_seq = t0.elapsed();
    println!("  Sequential: {:>8} cells in {:>8.2?}", placed_seq, dt_seq);

    // --- Parallel ---
    let world_par = build_world(side);
    let walls_par = BoundaryWallManager::new(height);
    let t0 = Instant::now();
    let placed_par = walls_par.rebuild(&world_par, &unlocked);
    let dt_par = t0.elapsed();
    println!("  Parallel:   {:>8} cells in {:>8.2?}", placed_par, dt_par);

    let speedup = dt_seq.as_secs_f64() / dt_par.as_secs_f64();
    println!("\n  Speedup: {:.2}x", speedup);

    // --- Verify identical ---
    let wall = block::barrier();
    let seq_count: usize = frontier
        .iter()
        .map(|c| world_seq.count_in_chunk(*c, wall))
        .sum();
    let par_count: usize = frontier
        .iter()
        .map(|c| world_par.count_in_chunk(*c, wall))
        .sum();

    if placed_seq == placed_par && seq_count == par_count {
        println!("  Results match ({} wall cells).", seq_count);
    } else {
        println!(
            "  MISMATCH: placed {} vs {}, in world {} vs {}",
            placed_seq, placed_par, seq_count, par_count
        );
    }
}

fn build_world(side: i32) -> World {
    let world = World::new();
    for cx in 0..side {
        for cz in 0..side {
            let mut chunk = Chunk::new();
            chunk.fill_layers(-64..=-64, block::BEDROCK);
            chunk.fill_layers(-63..=0, block::STONE);
            world.insert_chunk(ChunkPos::new(cx, cz), chunk);
        }
    }
    world
}
