//! Draw-order pass
//!
//! Builds one [`DrawItem`] per entity in the temporary stack, sorts them
//! back to front and hands the sprites to a host [`Canvas`]. The scratch list
//! is released when the frame ends.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::consts::SEC_PER_UPDATE;
use crate::sim::GameState;
use crate::sprites::{Animation, AnimationId};

/// Host drawing surface
pub trait Canvas {
    fn clear(&mut self);
    /// Draw one animation frame with its top left corner at `dst` (pixels)
    fn draw_sprite(&mut self, sprite: &Animation, dst: Vec2);
    fn present(&mut self);
}

/// Sprite queued for drawing
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawItem {
    /// Top left corner in pixels
    pub screen: Vec2,
    /// Sort key: world y of the entity's feet
    pub depth: f32,
    pub animation: u32,
}

/// Draw every entity, interpolated `alpha` of a tick ahead.
///
/// Returns the number of sprites drawn.
pub fn render(state: &mut GameState, canvas: &mut impl Canvas, alpha: f32) -> usize {
    let GameState {
        memory,
        world,
        pixels_per_meter,
        ..
    } = state;
    let ppm = *pixels_per_meter;

    let mut scratch = memory.temporary.local();
    let items = scratch.push_array::<DrawItem>(world.entity_count());

    scratch.with_slice_mut(items, |items| {
        for (item, (chunk, entity)) in items.iter_mut().zip(world.entities()) {
            let ent = world.entity(entity);
            let pos = world.world_position(chunk, ent.pos) + ent.vel * SEC_PER_UPDATE * alpha;
            *item = DrawItem {
                screen: (pos + ent.render_off) * ppm,
                depth: pos.y,
                animation: ent.animation().unwrap_or_default().raw(),
            };
        }
        items.sort_by(|a, b| a.depth.total_cmp(&b.depth));

        canvas.clear();
        let mut drawn = 0;
        for item in items.iter() {
            if let Some(anim) = AnimationId::from_raw(item.animation) {
                canvas.draw_sprite(anim.sprite(), item.screen);
                drawn += 1;
            }
        }
        canvas.present();
        drawn
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sprites::SpriteSheetId;

    #[derive(Default)]
    struct RecordingCanvas {
        cleared: u32,
        presented: u32,
        sprites: Vec<(SpriteSheetId, Vec2)>,
    }

    impl Canvas for RecordingCanvas {
        fn clear(&mut self) {
            self.cleared += 1;
            self.sprites.clear();
        }

        fn draw_sprite(&mut self, sprite: &Animation, dst: Vec2) {
            self.sprites.push((sprite.sheet, dst));
        }

        fn present(&mut self) {
            self.presented += 1;
        }
    }

    #[test]
    fn test_render_draws_every_entity() {
        let mut state = GameState::new(&Settings::default()).unwrap();
        let mut canvas = RecordingCanvas::default();

        let drawn = render(&mut state, &mut canvas, 0.0);
        assert_eq!(drawn, state.world.entity_count());
        assert_eq!(canvas.sprites.len(), drawn);
        assert_eq!((canvas.cleared, canvas.presented), (1, 1));

        let characters = canvas
            .sprites
            .iter()
            .filter(|(sheet, _)| *sheet == SpriteSheetId::Character)
            .count();
        assert_eq!(characters, 1);
    }

    #[test]
    fn test_player_sprite_position() {
        let mut state = GameState::new(&Settings::default()).unwrap();
        let mut canvas = RecordingCanvas::default();
        render(&mut state, &mut canvas, 0.0);

        let (_, dst) = canvas
            .sprites
            .iter()
            .find(|(sheet, _)| *sheet == SpriteSheetId::Character)
            .copied()
            .unwrap();
        // spawn (5.5, 5.5) plus render offset (-0.5, -1.4), at 100 px per meter
        assert!((dst - Vec2::new(500.0, 410.0)).length() < 1e-3);
    }

    #[test]
    fn test_back_to_front() {
        let mut state = GameState::new(&Settings::default()).unwrap();
        let mut canvas = RecordingCanvas::default();
        render(&mut state, &mut canvas, 0.0);

        // walls share one render offset, so their screen y follows depth
        let wall_ys: Vec<f32> = canvas
            .sprites
            .iter()
            .filter(|(sheet, _)| *sheet == SpriteSheetId::TileWall)
            .map(|(_, dst)| dst.y)
            .collect();
        assert!(wall_ys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_interpolates_velocity() {
        let mut state = GameState::new(&Settings::default()).unwrap();
        let player = state.player;
        state.world.update_entity(player, |ent| ent.vel = Vec2::new(10.0, 0.0));

        let mut canvas = RecordingCanvas::default();
        render(&mut state, &mut canvas, 0.5);
        let (_, dst) = canvas
            .sprites
            .iter()
            .find(|(sheet, _)| *sheet == SpriteSheetId::Character)
            .copied()
            .unwrap();
        // 10 m/s over half a 2 ms tick is 1 cm, or 1 px
        assert!((dst.x - 501.0).abs() < 1e-2);
    }

    #[test]
    fn test_scratch_is_released() {
        let mut state = GameState::new(&Settings::default()).unwrap();
        let mut canvas = RecordingCanvas::default();

        render(&mut state, &mut canvas, 0.0);
        render(&mut state, &mut canvas, 0.0);
        assert_eq!(state.memory.temporary.used(), 0);
        assert_eq!(state.memory.temporary.depth(), 0);
    }
}
