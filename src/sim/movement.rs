//! Entity movement with swept AABB collision
//!
//! One call integrates velocity for a single tick and then sweeps the
//! displacement against every other entity in the mover's chunk. Each
//! obstacle is expanded by the mover's extents (Minkowski sum) so the mover
//! can be treated as a point travelling along `dpos`. The earliest wall the
//! point crosses caps the step; the remaining displacement and the velocity
//! lose their component along that wall's normal and the sweep repeats, up to
//! `MAX_COLLISION_ITERATIONS` times.

use glam::Vec2;

use super::entity::EntityRef;
use super::world::{LAST_INSIDE, WorldState};
use crate::consts::*;

/// What happened during one [`move_entity`] call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveReport {
    /// Sub-steps that ran
    pub iterations: u32,
    /// Sub-steps that ended on a blocking wall
    pub collisions: u32,
    /// Normal of the last blocking wall
    pub last_normal: Option<Vec2>,
    /// The height band box crossed another entity's band.
    ///
    /// Detected only: band contacts do not block movement yet.
    pub height_band_contact: bool,
    /// The entity moved to another chunk
    pub migrated: bool,
}

/// Obstacle rectangle relative to the mover's position
#[derive(Debug, Clone, Copy, PartialEq)]
struct Aabb {
    min: Vec2,
    max: Vec2,
}

impl Aabb {
    /// Obstacle box grown by the mover's box, relative to the mover.
    ///
    /// Extents are distances from each box's position to its top left
    /// (`tl`) and bottom right (`br`) corners.
    fn minkowski(mover: Vec2, mover_tl: Vec2, mover_br: Vec2, other: Vec2, other_tl: Vec2, other_br: Vec2) -> Self {
        // the mover's top left extent grows the obstacle's bottom right edge:
        // a mover tall above its feet touches obstacles above it first
        Self {
            min: other - other_tl - mover_br - mover,
            max: other + other_br + mover_tl - mover,
        }
    }

    /// The four edges as walls: top, bottom, left, right
    fn walls(&self, dpos: Vec2) -> [Wall; 4] {
        [
            Wall::new(self.min.y, dpos.y, dpos.x, (self.min.x, self.max.x), Vec2::NEG_Y),
            Wall::new(self.max.y, dpos.y, dpos.x, (self.min.x, self.max.x), Vec2::Y),
            Wall::new(self.min.x, dpos.x, dpos.y, (self.min.y, self.max.y), Vec2::NEG_X),
            Wall::new(self.max.x, dpos.x, dpos.y, (self.min.y, self.max.y), Vec2::X),
        ]
    }
}

/// One edge of an expanded obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
struct Wall {
    /// Edge coordinate on the axis the wall blocks
    edge: f32,
    /// Displacement along the blocked axis
    along: f32,
    /// Displacement along the edge
    across: f32,
    /// Open interval the crossing must fall in, on the edge axis
    span: (f32, f32),
    normal: Vec2,
}

impl Wall {
    fn new(edge: f32, along: f32, across: f32, span: (f32, f32), normal: Vec2) -> Self {
        Self {
            edge,
            along,
            across,
            span,
            normal,
        }
    }

    /// Time fraction at which `dpos` crosses this wall, if it does
    fn crossing(&self) -> Option<f32> {
        if self.along.abs() <= COLLISION_EPSILON {
            return None;
        }
        let t = self.edge / self.along;
        let at = t * self.across;
        (t > 0.0 && self.span.0 < at && at < self.span.1).then_some(t)
    }
}

/// Earliest blocking wall found so far in a sub-step
#[derive(Debug, Clone, Copy, PartialEq)]
struct Contact {
    t: f32,
    normal: Vec2,
}

impl Contact {
    fn none() -> Self {
        Self {
            t: 1.0,
            normal: Vec2::ZERO,
        }
    }

    /// Take any wall of `rect` hit earlier than the current contact.
    /// Ties keep the wall scanned first.
    fn sweep(&mut self, rect: &Aabb, dpos: Vec2) {
        for wall in rect.walls(dpos) {
            if let Some(t) = wall.crossing() {
                if t < self.t {
                    self.t = (t - COLLISION_EPSILON).max(0.0);
                    self.normal = wall.normal;
                }
            }
        }
    }
}

/// Whether any wall of `rect` is crossed before `tmin`
fn probe(rect: &Aabb, dpos: Vec2, tmin: f32) -> bool {
    rect.walls(dpos)
        .iter()
        .any(|wall| wall.crossing().is_some_and(|t| t < tmin))
}

/// Remove the component of `v` along `normal`
#[inline]
fn slide(v: Vec2, normal: Vec2) -> Vec2 {
    v - v.dot(normal) * normal
}

/// Advance `entity` by one tick under acceleration `acc`.
///
/// Updates velocity and position, then relinks the entity if it crossed into
/// a neighbouring chunk (creating that chunk when needed).
pub fn move_entity(world: &mut WorldState, entity: EntityRef, acc: Vec2) -> MoveReport {
    let mut report = MoveReport::default();
    let mut ent = world.entity(entity);
    let Some(chunk) = ent.chunk() else {
        log::warn!("Cannot move {:?}: not linked into a chunk", entity);
        return report;
    };

    ent.vel = DAMPING * ent.vel + SEC_PER_UPDATE * acc;
    // position is committed only after collision has trimmed it
    let mut dpos = SEC_PER_UPDATE * ent.vel;

    let mut tleft = 1.0;
    while report.iterations < MAX_COLLISION_ITERATIONS && tleft > 0.0 {
        report.iterations += 1;
        let mut contact = Contact::none();

        for other_ref in world.chunk_entities(chunk) {
            if other_ref == entity {
                continue;
            }
            let other = world.entity(other_ref);

            let floor = Aabb::minkowski(ent.pos, ent.rad, ent.rad, other.pos, other.rad, other.rad);
            contact.sweep(&floor, dpos);

            // TODO: decide whether height band contacts block or only reorder drawing
            let band = Aabb::minkowski(
                ent.pos,
                ent.tl_point,
                ent.br_point,
                other.pos,
                other.tl_point,
                other.br_point,
            );
            if probe(&band, dpos, contact.t) {
                report.height_band_contact = true;
            }
        }

        ent.pos += contact.t * dpos;
        ent.vel = slide(ent.vel, contact.normal);
        dpos = slide(dpos, contact.normal);
        tleft -= contact.t;

        if contact.normal != Vec2::ZERO {
            report.collisions += 1;
            report.last_normal = Some(contact.normal);
        }
    }

    let mut pos = ent.pos;
    let target = match world.reconcile_position(chunk, &mut pos, true) {
        Some(target) => target,
        None => {
            log::debug!("{:?} stopped at the world edge", entity);
            pos = pos.clamp(Vec2::ZERO, Vec2::splat(LAST_INSIDE));
            chunk
        }
    };

    world.update_entity(entity, |e| {
        e.pos = pos;
        e.vel = ent.vel;
    });

    if target != chunk {
        if let Err(err) = world.remove_entity(Some(chunk), Some(entity)) {
            log::warn!("Failed to unlink {:?}: {}", entity, err);
        }
        if let Err(err) = world.add_entity(Some(target), Some(entity)) {
            log::warn!("Failed to link {:?}: {}", entity, err);
        }
        report.migrated = true;
        log::debug!("{:?} migrated to chunk {:?}", entity, target);
    }

    report
}
