//! Simulation module
//!
//! World map, movement and the fixed-tick update. Everything here is
//! deterministic:
//! - Fixed timestep only
//! - Stable iteration order (bucket, then chain, then list order)
//! - No rendering or platform dependencies beyond the input snapshot

pub mod entity;
pub mod movement;
pub mod seed;
pub mod state;
pub mod tick;
pub mod world;

pub use entity::{Entity, EntityRef};
pub use movement::{MoveReport, move_entity};
pub use seed::generate_world;
pub use state::{Console, GameMemory, GameState};
pub use tick::{UpdateStatus, player_acceleration, update};
pub use world::{ChunkRef, WorldChunk, WorldError, WorldState};
