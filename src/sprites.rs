//! Sprite sheet and animation table
//!
//! Entities only store an [`AnimationId`] and an accumulated timer; the
//! frame layout lives here.

/// All sprite sheets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteSheetId {
    TileWall,
    Character,
}

/// Source rectangle on a sprite sheet, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// One animation frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    pub rect: SpriteRect,
    pub sheet: SpriteSheetId,
    /// Frame duration in milliseconds
    pub dt: u32,
    /// Position of this frame within its cycle
    pub index: u32,
    /// Frames in the cycle
    pub count: u8,
}

/// Tag stored on an entity, mapped to an [`Animation`]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnimationId {
    #[default]
    TileWallStand0 = 0,
    CharacterStand0 = 1,
    CharacterStand1 = 2,
    CharacterStand2 = 3,
}

const fn frame(x: i32, sheet: SpriteSheetId, dt: u32, index: u32, count: u8) -> Animation {
    Animation {
        rect: SpriteRect { x, y: 0, w: 32, h: 48 },
        sheet,
        dt,
        index,
        count,
    }
}

/// Animation table, indexed by `AnimationId as usize`
pub const SPRITES: [Animation; AnimationId::COUNT] = [
    frame(0, SpriteSheetId::TileWall, 1, 0, 1),
    frame(0, SpriteSheetId::Character, 100, 0, 3),
    frame(32, SpriteSheetId::Character, 100, 1, 3),
    frame(64, SpriteSheetId::Character, 100, 2, 3),
];

impl AnimationId {
    pub const COUNT: usize = 4;

    pub const ALL: [AnimationId; Self::COUNT] = [
        AnimationId::TileWallStand0,
        AnimationId::CharacterStand0,
        AnimationId::CharacterStand1,
        AnimationId::CharacterStand2,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn sprite(self) -> &'static Animation {
        &SPRITES[self as usize]
    }

    /// Accumulate `elapsed_ms` into `timer` and return the frame to show.
    ///
    /// When the timer passes the frame duration it is reset and the next
    /// frame of the cycle is returned. Single-frame animations never change.
    pub fn advance(self, timer: &mut u32, elapsed_ms: u32) -> AnimationId {
        let anim = self.sprite();
        *timer = timer.saturating_add(elapsed_ms);
        if anim.count <= 1 || *timer < anim.dt {
            return self;
        }
        *timer = 0;
        let first = self.raw() - anim.index;
        let next = (anim.index + 1) % u32::from(anim.count);
        Self::from_raw(first + next).unwrap_or(self)
    }
}
