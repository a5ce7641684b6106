//! Platform abstraction layer
//!
//! Handles the host-facing side of the simulation:
//! - Input snapshots and key bindings
//! - Fixed-timestep clock

pub mod input;
pub mod time;

pub use input::{Binding, Control, GameControl, GameInput, Key, KeyBindings};
pub use time::FixedStep;
