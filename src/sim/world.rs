//! Chunked world map
//!
//! The world is a grid of `CHUNK_DIM`-sized chunks addressed by `(x, y)`
//! chunk coordinates starting at 1. Chunks are found through a fixed bucket
//! table with separate chaining and are created lazily. Each chunk owns a
//! doubly linked list of the entities standing in it.
//!
//! Chunk and entity records are stored in the world's own stack and never
//! freed.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use thiserror::Error;

use super::entity::{Entity, EntityRef};
use crate::consts::{CHUNK_DIM, WORLD_HASH_SIZE};
use crate::memory::{ArenaPtr, NIL, Stack};

/// Handle to a chunk in the world stack
pub type ChunkRef = ArenaPtr<WorldChunk>;

/// Largest local coordinate still inside a chunk
pub(crate) const LAST_INSIDE: f32 = CHUNK_DIM * (1.0 - f32::EPSILON);

/// Chunk list operations given a lookup miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("no chunk to operate on")]
    MissingChunk,
    #[error("no entity to operate on")]
    MissingEntity,
}

/// One grid cell of the world
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct WorldChunk {
    pub x: u32,
    pub y: u32,
    next: u32,
    head: u32,
    tail: u32,
}

impl WorldChunk {
    fn new(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            next: NIL,
            head: NIL,
            tail: NIL,
        }
    }

    /// Next chunk in the same bucket
    pub fn next(&self) -> Option<ChunkRef> {
        ArenaPtr::from_raw(self.next)
    }

    pub fn head(&self) -> Option<EntityRef> {
        ArenaPtr::from_raw(self.head)
    }

    pub fn tail(&self) -> Option<EntityRef> {
        ArenaPtr::from_raw(self.tail)
    }

    pub fn is_empty(&self) -> bool {
        self.head == NIL
    }
}

/// Bucket for a chunk coordinate pair
fn bucket(x: u32, y: u32) -> usize {
    (x.wrapping_add(y.wrapping_mul(31)) % WORLD_HASH_SIZE as u32) as usize
}

/// 0 and `u32::MAX` are reserved so stepping off either end never wraps
/// onto a real chunk
fn valid_coord(c: u32) -> bool {
    c != 0 && c != u32::MAX
}

/// The chunk table plus the stack all chunks and entities live in
pub struct WorldState {
    buckets: Box<[Option<ChunkRef>]>,
    stack: Stack,
    chunk_count: usize,
}

impl std::fmt::Debug for WorldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldState")
            .field("chunk_count", &self.chunk_count)
            .field("stack", &self.stack)
            .finish()
    }
}

impl WorldState {
    pub fn new(stack: Stack) -> Self {
        Self {
            buckets: vec![None; WORLD_HASH_SIZE].into_boxed_slice(),
            stack,
            chunk_count: 0,
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn chunk(&self, chunk: ChunkRef) -> WorldChunk {
        self.stack.get(chunk)
    }

    pub fn entity(&self, entity: EntityRef) -> Entity {
        self.stack.get(entity)
    }

    /// Edit an entity's physical and render state in place
    pub fn update_entity<R>(&mut self, entity: EntityRef, f: impl FnOnce(&mut Entity) -> R) -> R {
        self.stack.update(entity, f)
    }

    /// Look up an existing chunk
    pub fn find_chunk(&self, x: u32, y: u32) -> Option<ChunkRef> {
        if !valid_coord(x) || !valid_coord(y) {
            return None;
        }
        let mut cursor = self.buckets[bucket(x, y)];
        while let Some(chunk) = cursor {
            let record = self.chunk(chunk);
            if record.x == x && record.y == y {
                return Some(chunk);
            }
            cursor = record.next();
        }
        None
    }

    /// Look up a chunk, appending a new one to its bucket chain on a miss
    /// when `create` is set
    pub fn get_chunk(&mut self, x: u32, y: u32, create: bool) -> Option<ChunkRef> {
        if let Some(found) = self.find_chunk(x, y) {
            return Some(found);
        }
        if !create || !valid_coord(x) || !valid_coord(y) {
            return None;
        }

        let chunk = self.stack.push(&WorldChunk::new(x, y));
        let slot = bucket(x, y);
        match self.buckets[slot] {
            None => self.buckets[slot] = Some(chunk),
            Some(head) => {
                let mut last = head;
                while let Some(next) = self.chunk(last).next() {
                    last = next;
                }
                self.stack.update(last, |record| record.next = chunk.raw());
            }
        }
        self.chunk_count += 1;
        log::debug!("Created chunk ({}, {}) in bucket {}", x, y, slot);
        Some(chunk)
    }

    /// Append `entity` to the tail of `chunk`'s list
    pub fn add_entity(
        &mut self,
        chunk: Option<ChunkRef>,
        entity: Option<EntityRef>,
    ) -> Result<(), WorldError> {
        let chunk = chunk.ok_or(WorldError::MissingChunk)?;
        let entity = entity.ok_or(WorldError::MissingEntity)?;

        let mut record = self.chunk(chunk);
        let tail = record.tail();
        match tail {
            None => record.head = entity.raw(),
            Some(tail) => self.stack.update(tail, |ent| ent.set_next(Some(entity))),
        }
        record.tail = entity.raw();
        self.stack.set(chunk, &record);

        self.stack.update(entity, |ent| {
            ent.set_next(None);
            ent.set_prev(tail);
            ent.set_chunk(Some(chunk));
        });
        Ok(())
    }

    /// Unlink `entity` from `chunk`'s list
    ///
    /// The entity must currently be in that list; membership is not checked.
    pub fn remove_entity(
        &mut self,
        chunk: Option<ChunkRef>,
        entity: Option<EntityRef>,
    ) -> Result<(), WorldError> {
        let chunk = chunk.ok_or(WorldError::MissingChunk)?;
        let entity = entity.ok_or(WorldError::MissingEntity)?;

        let ent = self.entity(entity);
        let (prev, next) = (ent.prev(), ent.next());

        let mut record = self.chunk(chunk);
        if record.head == entity.raw() {
            record.head = ArenaPtr::pack(next);
        }
        if record.tail == entity.raw() {
            record.tail = ArenaPtr::pack(prev);
        }
        self.stack.set(chunk, &record);

        if let Some(prev) = prev {
            self.stack.update(prev, |p| p.set_next(next));
        }
        if let Some(next) = next {
            self.stack.update(next, |n| n.set_prev(prev));
        }
        self.stack.update(entity, |ent| {
            ent.set_prev(None);
            ent.set_next(None);
            ent.set_chunk(None);
        });
        Ok(())
    }

    /// Allocate `entity` in the world stack and link it into `chunk`
    pub fn spawn_entity(
        &mut self,
        chunk: Option<ChunkRef>,
        entity: Entity,
    ) -> Result<EntityRef, WorldError> {
        let chunk = chunk.ok_or(WorldError::MissingChunk)?;
        let handle = self.stack.push(&entity);
        self.add_entity(Some(chunk), Some(handle))?;
        Ok(handle)
    }

    /// Find the chunk a position that drifted out of `chunk` now belongs to
    ///
    /// Steps at most one chunk per axis and wraps `pos` back into
    /// `[0, CHUNK_DIM)`. Returns `chunk` itself when no boundary was crossed
    /// and `None` when the neighbour does not exist (or is reserved); `pos`
    /// is left untouched in that case.
    pub fn reconcile_position(
        &mut self,
        chunk: ChunkRef,
        pos: &mut Vec2,
        create: bool,
    ) -> Option<ChunkRef> {
        let record = self.chunk(chunk);
        let origin = [record.x, record.y];
        let mut coords = origin;
        let mut wrapped = *pos;

        for axis in 0..2 {
            if wrapped[axis] < 0.0 {
                coords[axis] = coords[axis].wrapping_sub(1);
                wrapped[axis] = (wrapped[axis] + CHUNK_DIM).min(LAST_INSIDE);
            } else if wrapped[axis] >= CHUNK_DIM {
                coords[axis] = coords[axis].wrapping_add(1);
                wrapped[axis] -= CHUNK_DIM;
            }
        }

        if coords == origin {
            return Some(chunk);
        }
        let target = self.get_chunk(coords[0], coords[1], create)?;
        *pos = wrapped;
        Some(target)
    }

    /// Position of a chunk-local point in world units
    ///
    /// Chunk (1, 1) starts at the world origin.
    pub fn world_position(&self, chunk: ChunkRef, local: Vec2) -> Vec2 {
        let record = self.chunk(chunk);
        let origin = Vec2::new((record.x - 1) as f32, (record.y - 1) as f32) * CHUNK_DIM;
        origin + local
    }

    /// Entities of one chunk, head to tail
    pub fn chunk_entities(&self, chunk: ChunkRef) -> ChunkEntities<'_> {
        ChunkEntities {
            world: self,
            cursor: self.chunk(chunk).head(),
        }
    }

    /// Every chunk, in bucket then chain order
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            world: self,
            slot: 0,
            cursor: None,
        }
    }

    /// Every entity with the chunk holding it
    pub fn entities(&self) -> impl Iterator<Item = (ChunkRef, EntityRef)> + '_ {
        self.chunks()
            .flat_map(move |chunk| self.chunk_entities(chunk).map(move |ent| (chunk, ent)))
    }

    pub fn entity_count(&self) -> usize {
        self.entities().count()
    }

    /// Run `f` on every entity. `f` must not relink entities.
    pub fn for_each_entity_mut(&mut self, mut f: impl FnMut(EntityRef, &mut Entity)) {
        for slot in 0..self.buckets.len() {
            let mut chunk_cursor = self.buckets[slot];
            while let Some(chunk) = chunk_cursor {
                let record = self.chunk(chunk);
                let mut cursor = record.head();
                while let Some(entity) = cursor {
                    cursor = self.stack.update(entity, |ent| {
                        f(entity, ent);
                        ent.next()
                    });
                }
                chunk_cursor = record.next();
            }
        }
    }
}

/// Iterator returned by [`WorldState::chunk_entities`]
pub struct ChunkEntities<'a> {
    world: &'a WorldState,
    cursor: Option<EntityRef>,
}

impl Iterator for ChunkEntities<'_> {
    type Item = EntityRef;

    fn next(&mut self) -> Option<EntityRef> {
        let current = self.cursor?;
        self.cursor = self.world.entity(current).next();
        Some(current)
    }
}

/// Iterator returned by [`WorldState::chunks`]
pub struct Chunks<'a> {
    world: &'a WorldState,
    slot: usize,
    cursor: Option<ChunkRef>,
}

impl Iterator for Chunks<'_> {
    type Item = ChunkRef;

    fn next(&mut self) -> Option<ChunkRef> {
        while self.cursor.is_none() {
            if self.slot >= self.world.buckets.len() {
                return None;
            }
            self.cursor = self.world.buckets[self.slot];
            self.slot += 1;
        }
        let current = self.cursor?;
        self.cursor = self.world.chunk(current).next();
        Some(current)
    }
}
