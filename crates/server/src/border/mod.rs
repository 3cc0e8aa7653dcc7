pub mod batch;
pub mod lazy;
pub mod walls;

pub use walls::{BoundaryWallManager, WallDelta};
