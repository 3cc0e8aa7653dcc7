//! Progression event bus and inbound host events.
//!
//! Every committed state change publishes a [`ProgressionEvent`] on a shared
//! `tokio::sync::broadcast` channel so presentation layers (chat, sounds,
//! particles, map overlays) can react without the core knowing about them.
//! The host feeds world happenings back in as [`HostEvent`]s.

use chunklock_engine::world::block::BlockId;
use chunklock_engine::world::position::{BlockPos, ChunkPos};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::progression::mode::Mode;

/// Recommended capacity for the broadcast channel.
pub const BUS_CAPACITY: usize = 256;

/// Something the progression core just committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressionEvent {
    /// `actor` is `None` for administrative unlocks.
    ChunkUnlocked {
        chunk: ChunkPos,
        actor: Option<Uuid>,
    },
    ChunkLocked {
        chunk: ChunkPos,
    },
    AllCleared {
        count: usize,
    },
    CreditsChanged {
        actor: Uuid,
        available: u32,
    },
    ModeSet {
        mode: Mode,
    },
    WallsUpdated {
        chunk: ChunkPos,
        placed: usize,
        removed: usize,
    },
    WallRestored {
        pos: BlockPos,
    },
    BarriersToggled {
        enabled: bool,
    },
    /// `actor` started or stopped standing in a locked chunk with no credits.
    /// The host decides what the penalty looks like.
    PenaltyChanged {
        actor: Uuid,
        chunk: ChunkPos,
        active: bool,
    },
}

/// Things the host world reports to the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    /// A block was broken. `was_wall` tells whether it held wall material.
    BlockDestroyed {
        pos: BlockPos,
        previous: BlockId,
        was_wall: bool,
    },
    ChunkLoaded(ChunkPos),
    /// An actor completed a milestone worth `reward` credits.
    MilestoneCompleted {
        actor: Uuid,
        milestone: String,
        reward: u32,
    },
    /// An actor is standing in `chunk`. Hosts report this on arrival and
    /// periodically while the actor stays. `via_portal` marks arrival through
    /// a dimension portal.
    ActorEnteredChunk {
        actor: Uuid,
        chunk: ChunkPos,
        via_portal: bool,
    },
    /// The actor disconnected; drop any per-session state for it.
    ActorLeft(Uuid),
}

/// Sending half of the bus. Cloning shares the channel.
#[derive(Clone, Debug)]
pub struct ProgressionBus {
    tx: broadcast::Sender<ProgressionEvent>,
}

impl ProgressionBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressionEvent> {
        self.tx.subscribe()
    }

    /// Fire and forget; having no subscribers is fine.
    pub fn publish(&self, event: ProgressionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressionBus {
    fn default() -> Self {
        Self::new()
    }
}
