//! proto entry point
//!
//! Headless driver: runs the fixed-step loop at the configured frame rate
//! against a scripted key sequence and logs what reaches the canvas.
//!
//! Usage: `proto [settings.json]`

use glam::Vec2;

use proto::Settings;
use proto::platform::{FixedStep, GameInput, Key, KeyBindings};
use proto::renderer::{Canvas, render};
use proto::sim::{GameState, UpdateStatus, update};
use proto::sprites::Animation;

/// Give up after this many frames if the script never quits
const MAX_FRAMES: u32 = 1200;

/// Key events as (frame, key, pressed): walk down through the gap, open the
/// console, type a line, close it and quit
const SCRIPT: &[(u32, Key, bool)] = &[
    (10, Key::S, true),
    (150, Key::S, false),
    (160, Key::Space, true),
    (161, Key::Space, false),
    (170, Key::Space, true),
    (171, Key::Space, false),
    (180, Key::D, true),
    (200, Key::D, false),
    (240, Key::Escape, true),
];

const CONSOLE_LINE: (u32, &str) = (165, "where am i");

/// Canvas that only tallies what it is asked to draw
#[derive(Default)]
struct LogCanvas {
    frames: u64,
    sprites: usize,
}

impl Canvas for LogCanvas {
    fn clear(&mut self) {
        self.sprites = 0;
    }

    fn draw_sprite(&mut self, _sprite: &Animation, _dst: Vec2) {
        self.sprites += 1;
    }

    fn present(&mut self) {
        self.frames += 1;
        log::trace!("Frame {}: {} sprites", self.frames, self.sprites);
    }
}

fn main() {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };
    log::info!(
        "{} starting ({}x{}, {} fps target)",
        settings.project_name,
        settings.screen_width,
        settings.screen_height,
        settings.goal_fps
    );

    let mut state = match GameState::new(&settings) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Failed to build the world: {e}");
            std::process::exit(1);
        }
    };

    let bindings = KeyBindings::default();
    let mut input = GameInput::default();
    let mut clock = FixedStep::default();
    let mut canvas = LogCanvas::default();
    let frame_dt = settings.frame_duration().as_secs_f32();

    'frames: for frame in 0..MAX_FRAMES {
        for &(at, key, pressed) in SCRIPT {
            if at == frame {
                input.handle_key(&bindings, key, pressed);
            }
        }
        if frame == CONSOLE_LINE.0 {
            input.text.push_str(CONSOLE_LINE.1);
        }

        for _ in 0..clock.advance(frame_dt) {
            if update(&mut state, &input) == UpdateStatus::Quit {
                break 'frames;
            }
            input.end_tick();
        }
        render(&mut state, &mut canvas, clock.alpha());
    }

    let player = state.player();
    let chunk = player.chunk().map(|chunk| state.world.chunk(chunk));
    log::info!(
        "Stopped after {} ticks and {} frames: player in chunk {:?} at {:?} (world {:?})",
        state.time_ticks,
        canvas.frames,
        chunk.map(|c| (c.x, c.y)),
        player.pos,
        state.player_world_position()
    );
    for line in state.console.lines() {
        log::info!("console> {line}");
    }
}
