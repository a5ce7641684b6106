//! proto - a chunked 2D world prototype
//!
//! Core modules:
//! - `memory`: Stack (bump) allocation with sub-stacks and local scopes
//! - `sim`: World map, swept collision movement, fixed-tick update
//! - `renderer`: Draw-order pass over an external canvas
//! - `platform`: Input snapshot and fixed-timestep clock
//! - `settings`: Startup configuration

pub mod memory;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod sprites;

pub use settings::{MemorySettings, Settings, SettingsError};

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (500 Hz)
    pub const SEC_PER_UPDATE: f32 = 1.0 / 500.0;
    /// Maximum updates per rendered frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 64;

    /// Side length of a chunk in world units
    pub const CHUNK_DIM: f32 = 11.0;
    /// Buckets in the chunk table
    pub const WORLD_HASH_SIZE: usize = 2048;

    /// Velocity kept per tick (5% drag)
    pub const DAMPING: f32 = 0.95;
    /// Minimum displacement for a wall test, and the flush gap left on contact
    pub const COLLISION_EPSILON: f32 = 0.001;
    /// Swept collision sub-steps per move
    pub const MAX_COLLISION_ITERATIONS: u32 = 4;

    /// Player acceleration while a direction is held (units/s²).
    /// One tick from rest must move further than `COLLISION_EPSILON`.
    pub const PLAYER_ACCEL: f32 = 500.0;
}
