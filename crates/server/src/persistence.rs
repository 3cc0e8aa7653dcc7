//! Progression persistence: one gzip-compressed NBT file per world,
//! `<world>/chunklocked_data.nbt`.
//!
//! Files written by every earlier layout version are still readable:
//!
//! | version | adds                                                   |
//! |---------|--------------------------------------------------------|
//! | 1       | per-player `UnlockedChunks`                            |
//! | 2       | `Credits`, `TotalAdvancements`, `RewardedAdvancements` |
//! | 3       | world-wide `GlobalUnlockedChunks`                      |
//! | 4       | `Mode`                                                 |
//! | 5       | `StarterItemsGiven`, `BarriersEnabled`                 |
//!
//! Saves always write the current version with every field.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chunklock_engine::world::position::ChunkPos;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progression::ledger::{PlayerProgress, ProgressionLedger};
use crate::progression::mode::Mode;
use crate::progression::store::UnlockStateStore;

pub const FILE_NAME: &str = "chunklocked_data.nbt";

/// Layout version written by `save`.
pub const DATA_VERSION: i32 = 5;

// ── NBT structs (serde) ─────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Default)]
struct ProgressNbt {
    #[serde(rename = "DataVersion", default)]
    data_version: i32,
    #[serde(rename = "Players", default)]
    players: HashMap<String, PlayerNbt>,
    #[serde(
        rename = "GlobalUnlockedChunks",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    global_unlocked_chunks: Option<Vec<ChunkNbt>>,
    #[serde(rename = "Mode", default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(rename = "StarterItemsGiven", default)]
    starter_items_given: Vec<String>,
    #[serde(
        rename = "BarriersEnabled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    barriers_enabled: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct PlayerNbt {
    #[serde(rename = "Credits", default)]
    credits: i32,
    #[serde(rename = "TotalAdvancements", default)]
    total_advancements: i32,
    #[serde(rename = "RewardedAdvancements", default)]
    rewarded_advancements: Vec<String>,
    /// Only present in version 1-2 files.
    #[serde(
        rename = "UnlockedChunks",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    unlocked_chunks: Vec<ChunkNbt>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ChunkNbt {
    x: i32,
    z: i32,
}

impl From<ChunkPos> for ChunkNbt {
    fn from(pos: ChunkPos) -> Self {
        Self { x: pos.x, z: pos.z }
    }
}

impl From<ChunkNbt> for ChunkPos {
    fn from(nbt: ChunkNbt) -> Self {
        ChunkPos::new(nbt.x, nbt.z)
    }
}

// ── Loaded state ────────────────────────────────────────────────────────────

/// Everything read back from a progress file.
#[derive(Debug, Default)]
pub struct LoadedProgress {
    pub store: UnlockStateStore,
    pub ledger: ProgressionLedger,
    /// Layout version found in the file (0 when starting fresh).
    pub version: i32,
}

// ── File handle ─────────────────────────────────────────────────────────────

/// Location of a world's progress file.
#[derive(Debug, Clone)]
pub struct ProgressFile {
    path: PathBuf,
}

impl ProgressFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<world_dir>/chunklocked_data.nbt`
    pub fn in_world(world_dir: &Path) -> Self {
        Self::new(world_dir.join(FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the full state. The file is replaced atomically via a sibling
    /// temp file.
    pub fn save(&self, store: &UnlockStateStore, ledger: &ProgressionLedger) -> Result<()> {
        let start = Instant::now();
        let nbt = to_nbt(store, ledger);
        let raw = fastnbt::to_bytes(&nbt).context("serializing progress NBT")?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish().context("compressing progress NBT")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("nbt.tmp");
        fs::write(&tmp, &compressed).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        tracing::info!(
            "Progress saved: {} unlocked chunks, {} players ({:.2?})",
            store.unlocked_count(),
            ledger.player_count(),
            start.elapsed(),
        );
        Ok(())
    }

    /// Read the file. `Ok(None)` if it does not exist.
    pub fn load(&self) -> Result<Option<LoadedProgress>> {
        if !self.exists() {
            return Ok(None);
        }
        let compressed =
            fs::read(&self.path).with_context(|| format!("reading {}", self.path.display()))?;
        let mut raw = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut raw)
            .with_context(|| format!("decompressing {}", self.path.display()))?;
        let nbt: ProgressNbt = fastnbt::from_bytes(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(from_nbt(nbt)))
    }

    /// Load, falling back to fresh state when the file is missing or
    /// unreadable. Never fails.
    pub fn load_or_default(&self) -> LoadedProgress {
        match self.load() {
            Ok(Some(loaded)) => {
                tracing::info!(
                    "Loaded progress from {} (version {}): {} unlocked chunks, {} players, mode {}",
                    self.path.display(),
                    loaded.version,
                    loaded.store.unlocked_count(),
                    loaded.ledger.player_count(),
                    loaded.store.mode(),
                );
                loaded
            }
            Ok(None) => {
                tracing::info!("No progress file at {}, starting fresh", self.path.display());
                LoadedProgress::default()
            }
            Err(e) => {
                tracing::error!("Failed to load progress, starting fresh: {:#}", e);
                LoadedProgress::default()
            }
        }
    }
}

// ── Conversion ──────────────────────────────────────────────────────────────

fn to_nbt(store: &UnlockStateStore, ledger: &ProgressionLedger) -> ProgressNbt {
    let players = ledger
        .iter()
        .map(|(actor, progress)| {
            let player = PlayerNbt {
                credits: i32::try_from(progress.credits).unwrap_or(i32::MAX),
                total_advancements: i32::try_from(progress.total_milestones).unwrap_or(i32::MAX),
                rewarded_advancements: progress.rewarded_milestones.iter().cloned().collect(),
                unlocked_chunks: Vec::new(),
            };
            (actor.to_string(), player)
        })
        .collect();

    let mut chunks: Vec<ChunkPos> = store.unlocked().iter().collect();
    chunks.sort();

    ProgressNbt {
        data_version: DATA_VERSION,
        players,
        global_unlocked_chunks: Some(chunks.into_iter().map(ChunkNbt::from).collect()),
        mode: Some(store.mode().as_str().to_owned()),
        starter_items_given: store.starter_items_given().map(|u| u.to_string()).collect(),
        barriers_enabled: Some(store.barriers_enabled()),
    }
}

fn from_nbt(nbt: ProgressNbt) -> LoadedProgress {
    if nbt.data_version > DATA_VERSION {
        tracing::warn!(
            "Progress file version {} is newer than supported {}; reading known fields",
            nbt.data_version,
            DATA_VERSION
        );
    }

    let mut store = UnlockStateStore::new();
    let mut ledger = ProgressionLedger::new();
    let mut legacy_chunks: HashSet<ChunkNbt> = HashSet::new();

    for (key, player) in nbt.players {
        legacy_chunks.extend(player.unlocked_chunks.iter().copied());
        let Ok(actor) = Uuid::parse_str(&key) else {
            tracing::warn!("Skipping player with invalid UUID {:?}", key);
            continue;
        };
        let rewarded: IndexSet<String> = player
            .rewarded_advancements
            .into_iter()
            .filter(|id| !id.is_empty())
            .collect();
        ledger.load_player(
            actor,
            PlayerProgress {
                credits: player.credits.max(0) as u32,
                total_milestones: player.total_advancements.max(0) as u32,
                rewarded_milestones: rewarded,
            },
        );
    }

    match nbt.global_unlocked_chunks {
        Some(chunks) => {
            for chunk in chunks {
                store.unlock(chunk.into());
            }
        }
        None => {
            for chunk in &legacy_chunks {
                store.unlock((*chunk).into());
            }
            if !legacy_chunks.is_empty() {
                tracing::info!(
                    "Migrated {} per-player chunk entries into the shared unlocked set",
                    legacy_chunks.len()
                );
            }
        }
    }

    match nbt.mode.as_deref() {
        Some(name) => match Mode::parse(name) {
            Some(mode) => store.restore_mode(mode),
            None => tracing::warn!("Unknown mode {:?} in progress file, using DISABLED", name),
        },
        None => store.restore_mode(Mode::Disabled),
    }

    store.set_barriers_enabled(nbt.barriers_enabled.unwrap_or(true));

    for key in &nbt.starter_items_given {
        match Uuid::parse_str(key) {
            Ok(actor) => {
                store.mark_starter_items_given(actor);
            }
            Err(_) => tracing::warn!("Skipping invalid starter-kit UUID {:?}", key),
        }
    }

    store.mark_clean();
    LoadedProgress {
        store,
        ledger,
        version: nbt.data_version,
    }
}
