//! Fixed-tick update
//!
//! One call advances the game by `SEC_PER_UPDATE`.

use glam::Vec2;

use super::movement::move_entity;
use super::state::GameState;
use super::world::WorldState;
use crate::consts::SEC_PER_UPDATE;
use crate::platform::GameInput;

/// Milliseconds of animation time per tick
const TICK_MS: u32 = (SEC_PER_UPDATE * 1000.0) as u32;

/// Whether the host should keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Running,
    Quit,
}

/// Run one simulation tick
pub fn update(state: &mut GameState, input: &GameInput) -> UpdateStatus {
    if input.quit {
        log::info!("Quit requested after {} ticks", state.time_ticks);
        return UpdateStatus::Quit;
    }
    state.time_ticks += 1;

    if input.action.was_pressed() {
        state.console.toggle();
    }

    let acc = if state.console.open {
        if !input.text.is_empty() {
            state.console.push_line(&input.text);
        }
        Vec2::ZERO
    } else {
        player_acceleration(input, state.player_accel)
    };

    move_entity(&mut state.world, state.player, acc);
    advance_animations(&mut state.world, TICK_MS);

    UpdateStatus::Running
}

/// Acceleration from the held direction controls. Diagonals are normalized.
pub fn player_acceleration(input: &GameInput, magnitude: f32) -> Vec2 {
    let mut dir = Vec2::ZERO;
    if input.move_left.is_held() {
        dir.x -= 1.0;
    }
    if input.move_right.is_held() {
        dir.x += 1.0;
    }
    if input.move_up.is_held() {
        dir.y -= 1.0;
    }
    if input.move_down.is_held() {
        dir.y += 1.0;
    }
    dir.normalize_or_zero() * magnitude
}

fn advance_animations(world: &mut WorldState, elapsed_ms: u32) {
    world.for_each_entity_mut(|_, ent| {
        if let Some(anim) = ent.animation() {
            let next = anim.advance(&mut ent.render_dt, elapsed_ms);
            ent.set_animation(next);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Key, KeyBindings};
    use crate::settings::Settings;
    use crate::sim::seed::{SEED_LOWER, SEED_UPPER};
    use crate::sprites::AnimationId;

    fn new_game() -> GameState {
        GameState::new(&Settings::default()).unwrap()
    }

    fn hold(keys: &[Key]) -> GameInput {
        let bindings = KeyBindings::default();
        let mut input = GameInput::default();
        for key in keys {
            input.handle_key(&bindings, *key, true);
        }
        input
    }

    fn run(state: &mut GameState, input: &mut GameInput, ticks: u32) {
        for _ in 0..ticks {
            assert_eq!(update(state, input), UpdateStatus::Running);
            input.end_tick();
        }
    }

    fn player_chunk(state: &GameState) -> (u32, u32) {
        let chunk = state.world.chunk(state.player().chunk().unwrap());
        (chunk.x, chunk.y)
    }

    #[test]
    fn test_acceleration_directions() {
        assert_eq!(player_acceleration(&GameInput::default(), 10.0), Vec2::ZERO);
        assert_eq!(player_acceleration(&hold(&[Key::D]), 10.0), Vec2::new(10.0, 0.0));
        assert_eq!(player_acceleration(&hold(&[Key::W]), 10.0), Vec2::new(0.0, -10.0));
        assert_eq!(player_acceleration(&hold(&[Key::A, Key::D]), 10.0), Vec2::ZERO);

        let diagonal = player_acceleration(&hold(&[Key::S, Key::D]), 10.0);
        assert!((diagonal.length() - 10.0).abs() < 1e-4);
        assert!(diagonal.x > 0.0 && diagonal.y > 0.0);
    }

    #[test]
    fn test_idle_player_stays_put() {
        let mut state = new_game();
        let mut input = GameInput::default();
        run(&mut state, &mut input, 100);
        assert_eq!(state.player().pos, Vec2::new(5.5, 5.5));
        assert_eq!(state.time_ticks, 100);
    }

    #[test]
    fn test_player_moves_right() {
        let mut state = new_game();
        let mut input = hold(&[Key::D]);
        run(&mut state, &mut input, 50);
        let player = state.player();
        assert!(player.pos.x > 5.5);
        assert!((player.pos.y - 5.5).abs() < 1e-6);
        assert!(player.vel.x > 0.0);
    }

    #[test]
    fn test_side_wall_blocks() {
        let mut state = new_game();
        let mut input = hold(&[Key::A]);
        run(&mut state, &mut input, 1000);

        // wall column 0 ends at x = 1.0, player half width is 0.3
        let player = state.player();
        assert!(player.pos.x >= 1.29, "penetrated wall: {}", player.pos.x);
        assert!(player.pos.x < 1.31);
        assert_eq!(player.vel.x, 0.0);
        assert_eq!(player_chunk(&state), SEED_UPPER);
    }

    #[test]
    fn test_player_walks_through_gap_into_lower_room() {
        let mut state = new_game();
        let mut input = hold(&[Key::S]);
        run(&mut state, &mut input, 1500);

        assert_eq!(player_chunk(&state), SEED_LOWER);
        // stopped by the lower room's bottom row, which starts at y = 10.0
        let player = state.player();
        assert!(player.pos.y > 9.7 && player.pos.y < 9.81, "y = {}", player.pos.y);

        let world = state.player_world_position().unwrap();
        assert!((world.y - (11.0 + player.pos.y)).abs() < 1e-4);

        let upper = state.world.find_chunk(SEED_UPPER.0, SEED_UPPER.1).unwrap();
        assert!(state.world.chunk_entities(upper).all(|e| e != state.player));
    }

    #[test]
    fn test_quit() {
        let mut state = new_game();
        let input = hold(&[Key::Escape]);
        assert_eq!(update(&mut state, &input), UpdateStatus::Quit);
        assert_eq!(state.time_ticks, 0);
    }

    #[test]
    fn test_console_captures_input() {
        let mut state = new_game();
        let bindings = KeyBindings::default();
        let mut input = hold(&[Key::Space, Key::D]);
        input.text.push_str("help");

        run(&mut state, &mut input, 10);
        assert!(state.console.open);
        assert_eq!(state.console.lines().collect::<Vec<_>>(), vec!["help"]);
        assert_eq!(state.player().pos, Vec2::new(5.5, 5.5));

        input.handle_key(&bindings, Key::Space, false);
        run(&mut state, &mut input, 1);
        input.handle_key(&bindings, Key::Space, true);
        run(&mut state, &mut input, 10);
        assert!(!state.console.open);
        assert!(state.player().pos.x > 5.5);
    }

    #[test]
    fn test_animations_advance() {
        let mut state = new_game();
        let mut input = GameInput::default();
        run(&mut state, &mut input, 49);
        assert_eq!(state.player().animation(), Some(AnimationId::CharacterStand0));
        run(&mut state, &mut input, 1);
        assert_eq!(state.player().animation(), Some(AnimationId::CharacterStand1));
    }
}
