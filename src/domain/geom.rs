//! Axis-aligned integer rectangles.
//!
//! Extents are half-open: a rect covers `x..x + w` and `y..y + h`.
//! Two rects collide when they overlap by at least one unit on both axes,
//! so rects that merely touch edges do not collide, and a rect with zero
//! width or height collides with nothing.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Rect { x, y, w, h }
    }

    #[inline]
    pub fn left(&self) -> i32 { self.x }

    #[inline]
    pub fn right(&self) -> i32 { self.x + self.w }

    #[inline]
    pub fn top(&self) -> i32 { self.y }

    #[inline]
    pub fn bottom(&self) -> i32 { self.y + self.h }

    #[inline]
    pub fn center_y(&self) -> i32 { self.y + self.h / 2 }

    /// Overlap test with half-open extents.
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.w > 0 && self.h > 0 && other.w > 0 && other.h > 0
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Same rect moved by (dx, dy).
    #[inline]
    pub fn shifted(&self, dx: i32, dy: i32) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Thin probe strip directly under this rect, used for ground queries.
    #[inline]
    pub fn base(&self) -> Rect {
        Rect::new(self.x, self.bottom(), self.w, 2)
    }
}
