//! Minecraft block ids used by the progression layer and the wall
//! material lookups.
//!
//! BlockId values are MC block state ids (from azalea-block), so they can be
//! used directly in protocol chunk data without any mapping layer.

use std::sync::LazyLock;

use azalea_block::BlockState;
use azalea_registry::builtin::BlockKind;
use chunklock_engine::world::block::BlockId;

// -- MC block state ids (from azalea-block for MC 1.21.11) --

pub const AIR: BlockId = BlockId(0);
pub const STONE: BlockId = BlockId(1);
pub const GRASS_BLOCK: BlockId = BlockId(9); // snowy=false
pub const DIRT: BlockId = BlockId(10);
pub const WATER: BlockId = BlockId(80); // level=0
pub const BEDROCK: BlockId = BlockId(85);

/// The wall material: vanilla `minecraft:barrier` in its default state.
static BARRIER: LazyLock<BlockId> = LazyLock::new(|| {
    let id = u32::from(BlockState::from(BlockKind::Barrier));
    BlockId(id as u16)
});

/// Block id placed along locked/unlocked chunk seams.
pub fn barrier() -> BlockId {
    *BARRIER
}

/// Is this the wall material?
pub fn is_wall(id: BlockId) -> bool {
    id == barrier()
}

/// Can a wall be written over this block? Air and fluids yes; solid terrain
/// is left alone and acts as a natural barrier.
pub fn is_replaceable(id: BlockId) -> bool {
    id == AIR || id == WATER
}

/// Is this block fully solid?
pub fn is_solid(id: BlockId) -> bool {
    !is_replaceable(id)
}

/// Short name for log lines.
pub fn name(id: BlockId) -> &'static str {
    match id {
        AIR => "air",
        STONE => "stone",
        GRASS_BLOCK => "grass_block",
        DIRT => "dirt",
        WATER => "water",
        BEDROCK => "bedrock",
        other if is_wall(other) => "barrier",
        _ => "unknown",
    }
}
