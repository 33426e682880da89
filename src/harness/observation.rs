//! Observation vector builder.
//!
//! Sixteen `f32` features, every one clamped into its declared bounds:
//!
//! | slot | feature                                  | range   |
//! |------|------------------------------------------|---------|
//! | 0-1  | player x / level width, y / level height | [0, 1]  |
//! | 2-3  | vx / 12, vy / 20                         | [-1, 1] |
//! | 4    | grounded                                 | {0, 1}  |
//! | 5    | facing (-1 left, +1 right)               | [-1, 1] |
//! | 6-7  | nearest chest dx, dy (level-normalised)  | [-1, 1] |
//! | 8-9  | nearest enemy dx, dy (level-normalised)  | [-1, 1] |
//! | 10-13| profile-specific probes                  | [0, 1]  |
//! | 14   | max progress / level width               | [0, 1]  |
//! | 15   | decision steps / step budget             | [0, 1]  |
//!
//! Slots 10-13, balanced: hazard ahead (short), hazard ahead (mid), enemy
//! ahead, enemy behind. Legacy: enemy ahead within 300px, gap right ahead,
//! enemy near, safe-ground distance.
//!
//! Ground probes are 4×2 rects placed 4px under the player's feet and
//! queried against the current chunk window, same as the kinematics.

use crate::config::ObsProfile;
use crate::domain::geom::Rect;
use crate::sim::world::WorldState;

use super::session::EpisodeStatus;

pub const OBS_LEN: usize = 16;

pub type Observation = [f32; OBS_LEN];

pub const OBS_LOW: Observation = [
    0.0, 0.0, -1.0, -1.0, 0.0, -1.0, -1.0, -1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];
pub const OBS_HIGH: Observation = [1.0; OBS_LEN];

/// Slot of the short-range hazard flag (balanced profile).
pub const HAZARD_SHORT_SLOT: usize = 10;

const VX_NORM: f64 = 12.0;
const VY_NORM: f64 = 20.0;
const PROBE_STRIDE: i32 = 12;

const GAP_SHORT: (i32, i32) = (0, 90);
const GAP_MID: (i32, i32) = (90, 240);
const ENEMY_SHORT: f64 = 90.0;
const ENEMY_MID: f64 = 240.0;
const ENEMY_DY_TOLERANCE: f64 = 100.0;

const LEGACY_ENEMY_AHEAD: f64 = 300.0;
const LEGACY_NEAR_DX: f64 = 120.0;
const LEGACY_NEAR_DY: f64 = 100.0;
const LEGACY_GAP_DISTANCE: i32 = 12;
const LEGACY_SAFE_SCAN: i32 = 360;

// ══════════════════════════════════════════════════════════════
// Builder
// ══════════════════════════════════════════════════════════════

pub fn observe(
    world: &WorldState,
    profile: ObsProfile,
    status: &EpisodeStatus,
    max_episode_steps: u32,
) -> Observation {
    let (lw, lh) = world.level_size();
    let lw = (lw as f64).max(1.0);
    let lh = (lh as f64).max(1.0);
    let p = &world.player;
    let px = p.rect.x as f64;
    let py = p.rect.y as f64;
    let dir = p.facing.sign() as f64;

    let (chest_dx, chest_dy) = world.nearest_chest().map_or((0.0, 0.0), |c| {
        ((c.rect.x - p.rect.x) as f64, (c.rect.y - p.rect.y) as f64)
    });
    let nearest_enemy = world
        .nearest_enemy()
        .map(|e| ((e.rect.x - p.rect.x) as f64, (e.rect.y - p.rect.y) as f64));
    let (enemy_dx, enemy_dy) = nearest_enemy.unwrap_or((0.0, 0.0));

    let probes = match profile {
        ObsProfile::Balanced => {
            let bands = enemy_bands(world);
            let gap_short = gap_in_range(world, GAP_SHORT.0, GAP_SHORT.1);
            let gap_mid = gap_in_range(world, GAP_MID.0, GAP_MID.1);
            [
                flag(gap_short || bands.hazard_short),
                flag(gap_mid || bands.hazard_mid),
                flag(bands.ahead),
                flag(bands.behind),
            ]
        }
        ObsProfile::Legacy => {
            let enemy_ahead = nearest_enemy.is_some_and(|(dx, _)| {
                (dir > 0.0 && dx > 0.0 && dx < LEGACY_ENEMY_AHEAD)
                    || (dir < 0.0 && dx < 0.0 && dx > -LEGACY_ENEMY_AHEAD)
            });
            let enemy_near = nearest_enemy
                .is_some_and(|(dx, dy)| dx.abs() <= LEGACY_NEAR_DX && dy.abs() <= LEGACY_NEAR_DY);
            [
                flag(enemy_ahead),
                flag(gap_at(world, LEGACY_GAP_DISTANCE)),
                flag(enemy_near),
                safe_ground_distance(world),
            ]
        }
    };

    let obs = [
        px / lw,
        py / lh,
        p.speed_x as f64 / VX_NORM,
        p.speed_y as f64 / VY_NORM,
        if world.player_grounded() { 1.0 } else { 0.0 },
        dir,
        chest_dx / lw,
        chest_dy / lh,
        enemy_dx / lw,
        enemy_dy / lh,
        probes[0],
        probes[1],
        probes[2],
        probes[3],
        status.max_progress_x / lw,
        status.step_count as f64 / (max_episode_steps.max(1) as f64),
    ];

    let mut out = [0.0f32; OBS_LEN];
    for (i, v) in obs.iter().enumerate() {
        out[i] = v.clamp(OBS_LOW[i] as f64, OBS_HIGH[i] as f64) as f32;
    }
    out
}

#[inline]
fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

// ══════════════════════════════════════════════════════════════
// Ground probes
// ══════════════════════════════════════════════════════════════

/// 4×2 probe under the player's feet, `distance` px past its leading edge.
fn ground_probe(world: &WorldState, distance: i32) -> Rect {
    let r = world.player.rect;
    let x = r.x + world.player.facing.sign() * (r.w + distance);
    Rect::new(x, r.bottom() + 4, 4, 2)
}

fn gap_at(world: &WorldState, distance: i32) -> bool {
    !world.window().has_ground(&ground_probe(world, distance), 2)
}

/// Any gap at `min, min+12, …` up to the first stride past `max`.
fn gap_in_range(world: &WorldState, min: i32, max: i32) -> bool {
    let start = min.max(0);
    let end = max.max(start);
    (start..end + PROBE_STRIDE)
        .step_by(PROBE_STRIDE as usize)
        .any(|d| gap_at(world, d))
}

/// Distance to the first supported probe, as a fraction of the scan range.
fn safe_ground_distance(world: &WorldState) -> f64 {
    (0..LEGACY_SAFE_SCAN + PROBE_STRIDE)
        .step_by(PROBE_STRIDE as usize)
        .find(|d| !gap_at(world, *d))
        .map_or(1.0, |d| (d as f64 / LEGACY_SAFE_SCAN as f64).clamp(0.0, 1.0))
}

// ══════════════════════════════════════════════════════════════
// Enemy bands
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct EnemyBands {
    hazard_short: bool,
    hazard_mid: bool,
    ahead: bool,
    behind: bool,
}

/// Classify every live enemy within the vertical tolerance.
fn enemy_bands(world: &WorldState) -> EnemyBands {
    let p = &world.player.rect;
    let dir = world.player.facing.sign() as f64;
    let mut bands = EnemyBands::default();

    for e in &world.enemies {
        let dx = (e.rect.x - p.x) as f64;
        let dy = (e.rect.y - p.y) as f64;
        if dy.abs() > ENEMY_DY_TOLERANCE {
            continue;
        }
        let dist = dx.abs();
        if dx * dir > 0.0 {
            bands.ahead = true;
            if dist <= ENEMY_SHORT {
                bands.hazard_short = true;
            } else if dist <= ENEMY_MID {
                bands.hazard_mid = true;
            }
        } else if dist <= ENEMY_SHORT {
            bands.behind = true;
        }
    }
    bands
}
