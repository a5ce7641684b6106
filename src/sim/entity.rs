//! Entity record
//!
//! Entities live in the world stack and are addressed by [`EntityRef`]
//! handles. The chunk back-reference and the list links are handles too,
//! stored raw so the record stays `Pod`.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::world::{ChunkRef, WorldChunk};
use crate::memory::{ArenaPtr, NIL};
use crate::sprites::AnimationId;

/// Handle to an entity in the world stack
pub type EntityRef = ArenaPtr<Entity>;

/// A movable or static occupant of the world
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Entity {
    chunk: u32,
    prev: u32,
    next: u32,
    /// Position relative to the owning chunk's origin
    pub pos: Vec2,
    pub vel: Vec2,
    /// Floor collision half-extent
    pub rad: Vec2,
    /// Height band box: offset from `pos` to the top left corner
    pub tl_point: Vec2,
    /// Height band box: offset from `pos` to the bottom right corner
    pub br_point: Vec2,
    /// Sprite anchor relative to `pos`, in world units
    pub render_off: Vec2,
    animation: u32,
    /// Milliseconds accumulated on the current animation frame
    pub render_dt: u32,
}

impl Entity {
    /// An unlinked entity at rest
    pub fn new(pos: Vec2, rad: Vec2, animation: AnimationId) -> Self {
        Self {
            chunk: NIL,
            prev: NIL,
            next: NIL,
            pos,
            vel: Vec2::ZERO,
            rad,
            tl_point: Vec2::ZERO,
            br_point: Vec2::ZERO,
            render_off: Vec2::ZERO,
            animation: animation.raw(),
            render_dt: 0,
        }
    }

    /// One-cell static wall occupying the cell around `pos`
    pub fn wall(pos: Vec2) -> Self {
        Self {
            tl_point: Vec2::new(0.5, 1.5),
            br_point: Vec2::new(0.5, 0.5),
            render_off: Vec2::new(-0.5, -1.5),
            ..Self::new(pos, Vec2::splat(0.5), AnimationId::TileWallStand0)
        }
    }

    /// The player character
    pub fn player(pos: Vec2) -> Self {
        Self {
            tl_point: Vec2::new(0.3, 1.2),
            br_point: Vec2::new(0.3, 0.1),
            render_off: Vec2::new(-0.5, -1.4),
            ..Self::new(pos, Vec2::new(0.3, 0.2), AnimationId::CharacterStand0)
        }
    }

    /// Chunk whose list currently holds this entity
    pub fn chunk(&self) -> Option<ChunkRef> {
        ArenaPtr::<WorldChunk>::from_raw(self.chunk)
    }

    pub fn prev(&self) -> Option<EntityRef> {
        ArenaPtr::from_raw(self.prev)
    }

    pub fn next(&self) -> Option<EntityRef> {
        ArenaPtr::from_raw(self.next)
    }

    /// `None` only if the raw tag was corrupted
    pub fn animation(&self) -> Option<AnimationId> {
        AnimationId::from_raw(self.animation)
    }

    pub fn set_animation(&mut self, animation: AnimationId) {
        self.animation = animation.raw();
    }

    pub(crate) fn set_chunk(&mut self, chunk: Option<ChunkRef>) {
        self.chunk = ArenaPtr::pack(chunk);
    }

    pub(crate) fn set_prev(&mut self, prev: Option<EntityRef>) {
        self.prev = ArenaPtr::pack(prev);
    }

    pub(crate) fn set_next(&mut self, next: Option<EntityRef>) {
        self.next = ArenaPtr::pack(next);
    }
}
