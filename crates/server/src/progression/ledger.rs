//! Per-actor credit balances and milestone bookkeeping.

use indexmap::{IndexMap, IndexSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("actor {actor} has {available} credit(s), needs {needed}")]
    InsufficientCredits {
        actor: Uuid,
        available: u32,
        needed: u32,
    },
}

/// What the unlock path needs from a credit source.
pub trait CreditLedger {
    fn available_credits(&self, actor: Uuid) -> u32;

    /// Deduct `amount`. Fails without changing anything when the balance is
    /// too small.
    fn spend_credits(&mut self, actor: Uuid, amount: u32) -> Result<(), LedgerError>;

    fn add_credits(&mut self, actor: Uuid, amount: u32);
}

/// Saved progress of one actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerProgress {
    pub credits: u32,
    /// Milestones completed, rewarded or not.
    pub total_milestones: u32,
    /// Milestone ids that already paid out.
    pub rewarded_milestones: IndexSet<String>,
}

/// In-memory ledger keyed by actor, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ProgressionLedger {
    players: IndexMap<Uuid, PlayerProgress>,
}

impl ProgressionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self, actor: Uuid) -> Option<&PlayerProgress> {
        self.players.get(&actor)
    }

    /// Replace an actor's record wholesale (used by the loader).
    pub fn load_player(&mut self, actor: Uuid, progress: PlayerProgress) {
        self.players.insert(actor, progress);
    }

    pub fn set_credits(&mut self, actor: Uuid, credits: u32) {
        self.players.entry(actor).or_default().credits = credits;
    }

    /// Count a completed milestone and pay `reward` credits the first time
    /// `milestone` is seen for this actor. Returns whether it paid.
    pub fn record_milestone(&mut self, actor: Uuid, milestone: &str, reward: u32) -> bool {
        let progress = self.players.entry(actor).or_default();
        if progress.rewarded_milestones.contains(milestone) {
            return false;
        }
        progress.rewarded_milestones.insert(milestone.to_owned());
        progress.total_milestones += 1;
        progress.credits = progress.credits.saturating_add(reward);
        true
    }

    pub fn actors(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.players.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &PlayerProgress)> {
        self.players.iter()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl CreditLedger for ProgressionLedger {
    fn available_credits(&self, actor: Uuid) -> u32 {
        self.players.get(&actor).map_or(0, |p| p.credits)
    }

    fn spend_credits(&mut self, actor: Uuid, amount: u32) -> Result<(), LedgerError> {
        let available = self.available_credits(actor);
        if available < amount {
            return Err(LedgerError::InsufficientCredits {
                actor,
                available,
                needed: amount,
            });
        }
        if amount > 0 {
            self.players.entry(actor).or_default().credits = available - amount;
        }
        Ok(())
    }

    fn add_credits(&mut self, actor: Uuid, amount: u32) {
        let progress = self.players.entry(actor).or_default();
        progress.credits = progress.credits.saturating_add(amount);
    }
}
