//! Voxel substrate shared by the progression server: positions, sparse chunk
//! storage, and a lock-sharded `World` that doubles as the world-write
//! collaborator for boundary walls.

pub mod world;
