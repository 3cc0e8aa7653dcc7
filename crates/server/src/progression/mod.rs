//! Chunk progression: which chunks are open, who pays for the next one, and
//! how the open set splits into playable areas.

pub mod access;
pub mod area;
pub mod ledger;
pub mod mode;
pub mod store;
pub mod transactor;

pub use access::AccessGate;
pub use area::{AreaDetector, PlayableArea};
pub use ledger::{CreditLedger, LedgerError, PlayerProgress, ProgressionLedger};
pub use mode::{Mode, ModeError};
pub use store::{STARTER_KIT, StarterItem, UnlockSet, UnlockStateStore};
pub use transactor::{DebugSnapshot, UNLOCK_COST, UnlockTransactor};
