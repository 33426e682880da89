//! Entities: Player, Enemy, Bullet, Chest.
//!
//! Each entity owns its complete per-tick state (position, speeds,
//! animation counters). There are no shared counters: the kinematics
//! functions in `kinematics.rs` are the only writers.

use serde::{Deserialize, Serialize};

use super::geom::Rect;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// -1 for left, +1 for right.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Facing::Left => -1,
            Facing::Right => 1,
        }
    }
}

/// Player animation families. Combined with `Facing` they select a sprite strip.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AnimState {
    Idle,
    Run,
    Jump,
    Attack,
}

/// Four independent button intents for one decision step.
/// Decoded once, then replayed across every frame-skip tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct GameAction {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub shoot: bool,
}

impl GameAction {
    pub const NOOP: GameAction = GameAction { left: false, right: false, jump: false, shoot: false };

    pub fn is_idle(&self) -> bool {
        !(self.left || self.right || self.jump || self.shoot)
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub rect: Rect,
    pub speed_x: i32,
    pub speed_y: i32,
    pub facing: Facing,
    pub anim: AnimState,
    /// Fractional sprite-frame counter.
    pub frame: f32,
    /// Set once a chest is touched; input is ignored from then on.
    pub frozen: bool,
    pub alive: bool,
    pub last_shot_ms: Option<u64>,
    pub last_stomp_ms: Option<u64>,
    pub bullets: Vec<Bullet>,
}

impl Player {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Player {
            rect: Rect::new(x, y, w, h),
            speed_x: 0,
            speed_y: 0,
            facing: Facing::Right,
            anim: AnimState::Idle,
            frame: 0.0,
            frozen: false,
            alive: true,
            last_shot_ms: None,
            last_stomp_ms: None,
            bullets: Vec::new(),
        }
    }

    /// Sprite selection: (family, direction, frame within strip).
    pub fn sprite(&self, frame_count: u32) -> (AnimState, Facing, usize) {
        (self.anim, self.facing, sprite_frame(self.frame, frame_count))
    }
}

#[derive(Clone, Debug)]
pub struct Enemy {
    pub id: usize,
    pub rect: Rect,
    pub speed_y: i32,
    pub facing: Facing,
    /// Recomputed from `rect.x` at the end of every update.
    pub chunk: i32,
    pub frame: f32,
}

impl Enemy {
    pub fn new(id: usize, x: i32, y: i32, size: i32, chunk: i32) -> Self {
        Enemy {
            id,
            rect: Rect::new(x, y, size, size),
            speed_y: 0,
            facing: Facing::Right,
            chunk,
            frame: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Bullet {
    pub rect: Rect,
    pub facing: Facing,
}

impl Bullet {
    pub fn new(x: i32, y: i32, w: i32, h: i32, facing: Facing) -> Self {
        Bullet { rect: Rect::new(x, y, w, h), facing }
    }
}

/// Chest lifecycle. Never moves backwards.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ChestState {
    Closed,
    Opening,
    Opened,
}

#[derive(Clone, Debug)]
pub struct Chest {
    pub id: usize,
    pub rect: Rect,
    pub chunk: i32,
    pub state: ChestState,
    /// Opening animation progress, in sprites.
    pub progress: f32,
}

impl Chest {
    pub fn new(id: usize, rect: Rect, chunk: i32) -> Self {
        Chest { id, rect, chunk, state: ChestState::Closed, progress: 0.0 }
    }

    pub fn is_opened(&self) -> bool {
        self.state == ChestState::Opened
    }

    /// Sprite index for the current opening progress.
    pub fn sprite(&self, sprite_count: u32) -> usize {
        (self.progress.max(0.0) as usize).min(sprite_count.saturating_sub(1) as usize)
    }
}

/// floor(counter) mod frame_count, tolerant of a zero-length strip.
#[inline]
pub fn sprite_frame(counter: f32, frame_count: u32) -> usize {
    if frame_count == 0 {
        return 0;
    }
    (counter.max(0.0).floor() as usize) % frame_count as usize
}
