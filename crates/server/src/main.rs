use std::time::Duration;

use chunklock_engine::world::World;
use chunklock_engine::world::chunk::Chunk;
use chunklock_engine::world::position::{BlockPos, ChunkPos};
use chunklock_server::block;
use chunklock_server::config::ServerConfig;
use chunklock_server::event_bus::{HostEvent, ProgressionEvent};
use chunklock_server::progression::{Mode, UnlockTransactor};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// How often newly resident chunks are handed to the wall loader.
const LOAD_SYNC_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let config = ServerConfig::from_args(&args);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if config.demo {
        run_demo(&config);
        return;
    }

    tracing::info!("Chunklock -- chunk progression server");

    // ── Generate base world, then load progression on top ───────────────
    let world = World::new();
    tracing::info!("Generating flat world...");
    generate_flat_world(&world, config.generate_radius);
    tracing::info!("Base world ready: {} chunks", world.chunk_count());

    let mut core = UnlockTransactor::open(&config.world_dir, config.progression());
    // Chunks generated above are already resident; nothing is deferred yet.
    world.take_newly_loaded();

    let placed = core.initialize_walls(&world);
    tracing::info!(
        "{} unlocked chunks, {} wall cells placed",
        core.store().unlocked_count(),
        placed
    );

    let mut events = core.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => tracing::warn!("Event log lagged by {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ── Main loop: load sync, autosave, shutdown ────────────────────────
    let mut autosave = tokio::time::interval(config.autosave_interval);
    autosave.tick().await; // first tick is immediate, skip it
    let mut load_sync = tokio::time::interval(LOAD_SYNC_INTERVAL);

    loop {
        tokio::select! {
            _ = load_sync.tick() => {
                core.sync_loaded_chunks(&world);
            }
            _ = autosave.tick() => {
                if core.is_dirty() {
                    tracing::info!("Autosaving...");
                    core.save();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
                break;
            }
        }
    }

    // ── Save on shutdown ────────────────────────────────────────────────
    tracing::info!("Saving progress before exit...");
    if core.save() {
        tracing::info!("Shutdown save complete");
    }
}

fn log_event(event: &ProgressionEvent) {
    match event {
        ProgressionEvent::ChunkUnlocked { chunk, actor } => match actor {
            Some(actor) => tracing::info!("[event] {} unlocked {}", actor, chunk),
            None => tracing::info!("[event] {} unlocked by admin", chunk),
        },
        ProgressionEvent::ChunkLocked { chunk } => tracing::info!("[event] {} locked", chunk),
        ProgressionEvent::PenaltyChanged {
            actor,
            chunk,
            active: true,
        } => tracing::warn!("[event] {} stranded in locked chunk {}", actor, chunk),
        other => tracing::debug!("[event] {:?}", other),
    }
}

/// Scripted walk through the whole progression loop on a small world.
fn run_demo(config: &ServerConfig) {
    tracing::info!("Chunklock -- progression demo");

    let world = World::new();
    generate_flat_world(&world, 4);
    world.take_newly_loaded();
    tracing::info!("World ready: {} chunks loaded", world.chunk_count());

    let mut core = UnlockTransactor::new(config.progression());
    let mut events = core.subscribe();
    let alex = Uuid::from_u128(0xA1E8);

    if let Err(e) = core.set_mode(Mode::Easy) {
        tracing::warn!("{}", e);
    }
    if let Some(kit) = core.provision_starter_items(alex) {
        for item in kit {
            tracing::info!("Starter kit: {} x{}", item.item, item.count);
        }
    }

    core.handle_host_event(
        &world,
        HostEvent::MilestoneCompleted {
            actor: alex,
            milestone: "story/root".into(),
            reward: 3,
        },
    );
    tracing::info!("Credits: {}", core.available_credits(alex));

    let origin = ChunkPos::new(0, 0);
    core.try_unlock_with_walls(&world, alex, origin);
    for chunk in [ChunkPos::new(1, 0), ChunkPos::new(0, 1), ChunkPos::new(1, 1)] {
        if !core.try_unlock_with_walls(&world, alex, chunk) {
            tracing::warn!("Could not unlock {} (credits: {})", chunk, core.available_credits(alex));
        }
    }

    // Out of credits and stepping past the edge: penalized until a reward
    // arrives, then a portal exit into the same chunk pays for it.
    let outside = ChunkPos::new(2, 0);
    core.on_actor_entered_chunk(&world, alex, outside, false);
    tracing::info!("Penalized in {}: {}", outside, core.is_penalized(alex));
    core.add_credits(alex, 1);
    core.on_actor_entered_chunk(&world, alex, outside, true);
    tracing::info!(
        "After portal arrival: unlocked={} penalized={}",
        core.can_access(outside),
        core.is_penalized(alex)
    );

    // Break a wall cell on the outer ring and watch it come back.
    let wall = BlockPos::new(-16 + 15, 70, 3);
    if world.get_block(wall) == block::barrier() {
        world.set_block(wall, block::AIR);
        let restored = core.handle_host_event(
            &world,
            HostEvent::BlockDestroyed {
                pos: wall,
                previous: block::barrier(),
                was_wall: true,
            },
        );
        tracing::info!("Wall at {:?} restored: {}", wall, restored);
    }

    let mut published = 0;
    while events.try_recv().is_ok() {
        published += 1;
    }
    tracing::info!("{} progression events published", published);

    match serde_json::to_string_pretty(&core.debug_snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Snapshot failed: {}", e),
    }
}

/// Flat terrain: bedrock floor, stone to y=60, dirt to y=63, grass at y=64.
fn generate_flat_world(world: &World, chunk_radius: i32) {
    for cx in -chunk_radius..chunk_radius {
        for cz in -chunk_radius..chunk_radius {
            let mut chunk = Chunk::new();
            chunk.fill_layers(-64..=-64, block::BEDROCK);
            chunk.fill_layers(-63..=60, block::STONE);
            chunk.fill_layers(61..=63, block::DIRT);
            chunk.fill_layers(64..=64, block::GRASS_BLOCK);
            world.insert_chunk(ChunkPos::new(cx, cz), chunk);
        }
    }
}
