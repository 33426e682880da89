//! Collision resolver: the single source of truth for block geometry queries.
//!
//! ## Architecture
//!
//! Static blocks are stored per chunk (fixed-width vertical strips of the
//! level). Every tick the world copies the blocks of the player's chunk and
//! its two neighbours into a flat *window*. All queries below run against
//! that window only; a block outside it does not exist for this tick.
//!
//! Three queries, all read-only except `bottom_collision_snap`, which
//! writes back into the probe it was handed:
//!
//!   - `ground_height`      : y at which a probe of a given height rests
//!   - `side_collision`     : is a block beside the probe, and on which side
//!   - `bottom_collision_snap`: stop an upward move at a ceiling
//!
//! ## Iteration order
//!
//! The window keeps chunk order (left chunk first) and, inside a chunk,
//! grid order (rows top-to-bottom, columns left-to-right). `ground_height`
//! reports the *last* colliding block in that order. With stacked blocks
//! this is the lowest one, not the nearest surface; callers tolerate it.

use super::geom::Rect;

/// Result of a side probe.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SideHit {
    /// A block overlaps on the left; leftward motion is blocked.
    LeftBlocked,
    /// A block overlaps on the right; rightward motion is blocked.
    RightBlocked,
    Clear,
}

impl SideHit {
    pub fn is_clear(self) -> bool {
        self == SideHit::Clear
    }
}

// ══════════════════════════════════════════════════════════════
// Window construction
// ══════════════════════════════════════════════════════════════

/// Fill `out` with the blocks of chunks `center-1 ..= center+1`.
/// Chunks that do not exist (negative or past the end) contribute nothing.
pub fn collect_window(chunks: &[Vec<Rect>], center: i32, out: &mut Vec<Rect>) {
    out.clear();
    for offset in -1..=1 {
        let idx = center + offset;
        if idx < 0 {
            continue;
        }
        if let Some(blocks) = chunks.get(idx as usize) {
            out.extend_from_slice(blocks);
        }
    }
}

/// Is `chunk` inside the window centred on `center`?
#[inline]
pub fn in_window(chunk: i32, center: i32) -> bool {
    (chunk - center).abs() <= 1
}

// ══════════════════════════════════════════════════════════════
// Queries
// ══════════════════════════════════════════════════════════════

/// Read-only view over this tick's active blocks.
#[derive(Clone, Copy, Debug)]
pub struct CollisionWindow<'a> {
    blocks: &'a [Rect],
}

impl<'a> CollisionWindow<'a> {
    pub fn new(blocks: &'a [Rect]) -> Self {
        CollisionWindow { blocks }
    }

    pub fn blocks(&self) -> &'a [Rect] {
        self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Resting y for a probe: `block.top - probe_height` of the last
    /// colliding block, or `None` when nothing intersects the probe.
    pub fn ground_height(&self, probe: &Rect, probe_height: i32) -> Option<i32> {
        let mut result = None;
        for block in self.blocks {
            if block.intersects(probe) {
                result = Some(block.top() - probe_height);
            }
        }
        result
    }

    /// Grounded means a non-negative resting height exists.
    pub fn has_ground(&self, probe: &Rect, probe_height: i32) -> bool {
        matches!(self.ground_height(probe, probe_height), Some(y) if y >= 0)
    }

    /// First overlapping block that is not purely beneath the probe decides.
    ///
    /// "Purely beneath" means `block.top >= probe.bottom - 1`; that one unit
    /// of slack lets an entity stand flush on a block while pressed against
    /// a wall. A block whose x equals the probe's x is neither left nor right
    /// and is skipped.
    pub fn side_collision(&self, probe: &Rect) -> SideHit {
        for block in self.blocks {
            if block.intersects(probe) && block.top() < probe.bottom() - 1 {
                if block.x > probe.x {
                    return SideHit::RightBlocked;
                } else if block.x < probe.x {
                    return SideHit::LeftBlocked;
                }
            }
        }
        SideHit::Clear
    }

    /// While moving up, a block whose vertical centre lies above the probe's
    /// top acts as a ceiling: upward speed is zeroed and the probe is placed
    /// just under the block. Returns true if a ceiling was hit.
    pub fn bottom_collision_snap(&self, probe: &mut Rect, speed_y: &mut i32) -> bool {
        let mut hit = false;
        for block in self.blocks {
            if *speed_y < 0 && block.intersects(probe) && block.center_y() < probe.top() {
                *speed_y = 0;
                probe.y = block.bottom();
                hit = true;
            }
        }
        hit
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
