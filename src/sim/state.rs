//! Game state and memory layout
//!
//! The permanent stack holds everything that lives for the whole run; the
//! world's chunks and entities sit in a sub-stack carved from it. The
//! temporary stack is per-frame scratch.

use std::collections::VecDeque;

use glam::Vec2;

use super::entity::{Entity, EntityRef};
use super::seed::{SEED_UPPER, generate_world};
use super::world::{WorldError, WorldState};
use crate::memory::Stack;
use crate::settings::{MemorySettings, Settings};

/// Lines of console history kept
pub const CONSOLE_LINES: usize = 10;
/// Longest console line, in characters
pub const CONSOLE_LINE_LEN: usize = 127;

/// The two top-level stacks
#[derive(Debug)]
pub struct GameMemory {
    pub permanent: Stack,
    pub temporary: Stack,
}

impl GameMemory {
    pub fn new(settings: &MemorySettings) -> Self {
        Self {
            permanent: Stack::new(settings.permanent_bytes),
            temporary: Stack::new(settings.temporary_bytes),
        }
    }
}

/// Drop-down text console
#[derive(Debug, Clone, Default)]
pub struct Console {
    pub open: bool,
    lines: VecDeque<String>,
}

impl Console {
    pub fn toggle(&mut self) {
        self.open = !self.open;
        log::debug!("Console {}", if self.open { "opened" } else { "closed" });
    }

    /// Append a line, evicting the oldest once the history is full
    pub fn push_line(&mut self, line: &str) {
        if self.lines.len() == CONSOLE_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line.chars().take(CONSOLE_LINE_LEN).collect());
    }

    /// History, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Complete game state
#[derive(Debug)]
pub struct GameState {
    pub memory: GameMemory,
    pub world: WorldState,
    pub player: EntityRef,
    pub console: Console,
    /// Updates run since start
    pub time_ticks: u64,
    pub player_accel: f32,
    pub pixels_per_meter: f32,
}

impl GameState {
    /// Lay out memory, generate the seed rooms and spawn the player
    pub fn new(settings: &Settings) -> Result<Self, WorldError> {
        let mut memory = GameMemory::new(&settings.memory);
        let mut world = WorldState::new(memory.permanent.create_substack(settings.memory.world_bytes));

        generate_world(&mut world)?;
        let spawn_chunk = world.get_chunk(SEED_UPPER.0, SEED_UPPER.1, true);
        let player = world.spawn_entity(spawn_chunk, Entity::player(settings.player_spawn))?;

        log::info!(
            "Game started: player at {:?} in chunk {:?}, {} bytes of world memory free",
            settings.player_spawn,
            SEED_UPPER,
            world.stack().remaining()
        );

        Ok(Self {
            memory,
            world,
            player,
            console: Console::default(),
            time_ticks: 0,
            player_accel: settings.player_accel,
            pixels_per_meter: settings.pixels_per_meter,
        })
    }

    pub fn player(&self) -> Entity {
        self.world.entity(self.player)
    }

    /// Player position in world units
    pub fn player_world_position(&self) -> Option<Vec2> {
        let player = self.player();
        Some(self.world.world_position(player.chunk()?, player.pos))
    }
}
