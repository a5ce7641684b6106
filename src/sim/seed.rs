//! Starting world layout
//!
//! Two vertically adjacent rooms, each ringed by wall entities, joined by a
//! two-cell gap in their shared boundary row.

use glam::Vec2;

use super::entity::Entity;
use super::world::{WorldError, WorldState};
use crate::consts::CHUNK_DIM;

/// Cells per room side
pub const SEED_ROOM: u32 = CHUNK_DIM as u32;

/// Columns left open in the shared boundary row
pub const SEED_GAP: [u32; 2] = [SEED_ROOM / 2 - 1, SEED_ROOM / 2];

/// Chunk coordinates of the upper room
pub const SEED_UPPER: (u32, u32) = (1, 1);
/// Chunk coordinates of the lower room
pub const SEED_LOWER: (u32, u32) = (1, 2);

/// Which boundary row of a room is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opening {
    Top,
    Bottom,
}

/// Populate the two seed rooms. Returns the number of walls placed.
pub fn generate_world(world: &mut WorldState) -> Result<usize, WorldError> {
    let upper = build_room(world, SEED_UPPER, Opening::Bottom)?;
    let lower = build_room(world, SEED_LOWER, Opening::Top)?;
    log::info!("Generated world: {} walls in {} chunks", upper + lower, world.chunk_count());
    Ok(upper + lower)
}

fn build_room(world: &mut WorldState, (x, y): (u32, u32), opening: Opening) -> Result<usize, WorldError> {
    let chunk = world.get_chunk(x, y, true);
    let last = SEED_ROOM - 1;
    let (open_row, closed_row) = match opening {
        Opening::Top => (0, last),
        Opening::Bottom => (last, 0),
    };
    let mut walls = 0;

    for row in 0..SEED_ROOM {
        for col in 0..SEED_ROOM {
            let side = col == 0 || col == last;
            let edge_of_gap = row == open_row && !SEED_GAP.contains(&col);
            if side || row == closed_row || edge_of_gap {
                let pos = Vec2::new(col as f32 + 0.5, row as f32 + 0.5);
                world.spawn_entity(chunk, Entity::wall(pos))?;
                walls += 1;
            }
        }
    }
    Ok(walls)
}
