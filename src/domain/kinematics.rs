//! Per-entity update rules.
//!
//! One function per entity kind, each advancing exactly one physics tick.
//! They read blocks only through a `CollisionWindow` and report what
//! happened through small outcome structs; turning outcomes into game
//! events is the stepper's job (`sim::step`).
//!
//! Time is the sim clock (`now_ms = tick * tick_ms`), never wall time.

use crate::config::PhysicsConfig;

use super::entity::{AnimState, Bullet, Chest, ChestState, Enemy, Facing, GameAction, Player};
use super::geom::Rect;
use super::physics::{in_window, CollisionWindow, SideHit};

// ══════════════════════════════════════════════════════════════
// Shared vertical rule (player + enemy)
// ══════════════════════════════════════════════════════════════

/// Gravity while airborne or rising, snap to ground when landing.
///
/// The ground probe is taken *before* moving, so a fast fall can end a
/// tick embedded in a block; the next tick's probe then snaps it out.
/// Downward speed saturates at `max_fall_speed`.
fn apply_vertical(
    rect: &mut Rect,
    speed_y: &mut i32,
    window: &CollisionWindow,
    cfg: &PhysicsConfig,
) {
    let ground = window.ground_height(&rect.base(), rect.h).filter(|y| *y >= 0);
    if *speed_y < 0 || ground.is_none() {
        rect.y = rect.y.saturating_add(*speed_y);
        *speed_y = speed_y.saturating_add(cfg.gravity).min(cfg.max_fall_speed);
    }
    if *speed_y >= 0 {
        if let Some(gy) = ground {
            rect.y = gy;
            *speed_y = 0;
        }
    }
}

#[inline]
fn advance_frame(frame: &mut f32, step: f32, frame_count: u32) {
    *frame += step;
    if *frame >= frame_count as f32 {
        *frame = 0.0;
    }
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerTick {
    pub jumped: bool,
    pub shot: bool,
    pub hit_ceiling: bool,
    /// Horizontal move was committed then rolled back.
    pub rolled_back: bool,
}

/// Advance the player one tick under `input`.
pub fn player_tick(
    player: &mut Player,
    window: &CollisionWindow,
    input: GameAction,
    cfg: &PhysicsConfig,
    now_ms: u64,
) -> PlayerTick {
    let mut out = PlayerTick::default();

    out.hit_ceiling = window.bottom_collision_snap(&mut player.rect, &mut player.speed_y);

    if player.frozen {
        player.speed_x = 0;
        player.speed_y = 0;
        advance_frame(&mut player.frame, cfg.player_anim_step, cfg.player_frame_count);
        return out;
    }

    let grounded = window.has_ground(&player.rect.base(), player.rect.h);
    let attacking = player
        .last_shot_ms
        .is_some_and(|t| now_ms <= t + cfg.shoot_cooldown_ms);

    // ── Idle pose ──
    player.speed_x = 0;
    if input.is_idle() && !attacking {
        player.anim = if grounded { AnimState::Idle } else { AnimState::Jump };
    }

    // ── Horizontal ──
    let mut dx = 0;
    if input.right {
        dx = cfg.player_speed;
        player.facing = Facing::Right;
    }
    if input.left && player.rect.x > 0 {
        dx = -cfg.player_speed;
        player.facing = Facing::Left;
    }
    let pre_x = player.rect.x;
    if dx != 0 {
        let candidate = player.rect.shifted(dx, 0);
        if window.side_collision(&candidate).is_clear() {
            player.rect.x = candidate.x;
            player.speed_x = dx;
            player.anim = AnimState::Run;
        }
    }

    // ── Jump ──
    if input.jump && grounded && player.speed_y == 0 {
        player.anim = AnimState::Jump;
        player.frame = 0.0;
        player.speed_y = cfg.jump_speed;
        out.jumped = true;
    }

    // ── Shoot ──
    let ready = player
        .last_shot_ms
        .map_or(true, |t| now_ms > t + cfg.shoot_cooldown_ms);
    if input.shoot && ready {
        player.frame = 3.0;
        player.anim = AnimState::Attack;
        player.bullets.push(spawn_bullet(player, cfg));
        player.last_shot_ms = Some(now_ms);
        out.shot = true;
    }

    advance_frame(&mut player.frame, cfg.player_anim_step, cfg.player_frame_count);

    // ── Vertical ──
    apply_vertical(&mut player.rect, &mut player.speed_y, window, cfg);

    // Never end a tick embedded beside a block after a horizontal commit.
    if player.rect.x != pre_x && !window.side_collision(&player.rect).is_clear() {
        player.rect.x = pre_x;
        player.speed_x = 0;
        out.rolled_back = true;
    }

    out
}

/// Bullet leaves from the muzzle side of the player rect.
fn spawn_bullet(player: &Player, cfg: &PhysicsConfig) -> Bullet {
    let r = player.rect;
    let y = r.y + r.h * 45 / 100;
    let x = match player.facing {
        Facing::Right => r.x + r.w * 8 / 10,
        Facing::Left => r.x + r.w * 2 / 10 - cfg.bullet_width,
    };
    Bullet::new(x, y, cfg.bullet_width, cfg.bullet_height, player.facing)
}

/// Outcome of player/enemy overlap resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactOutcome {
    /// Ids of enemies destroyed by a jump-stomp.
    pub stomped: Vec<usize>,
    pub lethal: bool,
}

/// Resolve every windowed enemy overlapping the player.
///
/// Falling onto an enemy stomps it and bounces the player. Any other
/// overlap is lethal, except within `stomp_grace_ms` of a stomp: after
/// the bounce the player is rising, so a second enemy touched in the same
/// tick would otherwise kill immediately.
pub fn resolve_enemy_contacts(
    player: &mut Player,
    enemies: &mut Vec<Enemy>,
    center_chunk: i32,
    cfg: &PhysicsConfig,
    now_ms: u64,
) -> ContactOutcome {
    let mut out = ContactOutcome::default();
    let mut i = 0;
    while i < enemies.len() {
        let e = &enemies[i];
        if !in_window(e.chunk, center_chunk) || !e.rect.intersects(&player.rect) {
            i += 1;
            continue;
        }
        if player.speed_y > 0 {
            player.speed_y = cfg.stomp_bounce;
            player.last_stomp_ms = Some(now_ms);
            out.stomped.push(e.id);
            enemies.remove(i);
            continue;
        }
        let in_grace = player
            .last_stomp_ms
            .is_some_and(|t| now_ms < t + cfg.stomp_grace_ms);
        if !in_grace {
            out.lethal = true;
            break;
        }
        i += 1;
    }
    out
}

// ══════════════════════════════════════════════════════════════
// Enemy
// ══════════════════════════════════════════════════════════════

/// Patrol, fall, re-chunk. Returns false once the enemy has left the world.
pub fn enemy_tick(enemy: &mut Enemy, window: &CollisionWindow, cfg: &PhysicsConfig) -> bool {
    match window.side_collision(&enemy.rect) {
        SideHit::RightBlocked => enemy.facing = Facing::Left,
        SideHit::LeftBlocked => enemy.facing = Facing::Right,
        SideHit::Clear => {}
    }
    enemy.rect.x += enemy.facing.sign() * cfg.enemy_speed;

    advance_frame(&mut enemy.frame, cfg.enemy_anim_step, cfg.enemy_frame_count);
    apply_vertical(&mut enemy.rect, &mut enemy.speed_y, window, cfg);

    enemy.chunk = cfg.chunk_of(enemy.rect.x);
    enemy.rect.y <= cfg.enemy_fall_limit_y
}

// ══════════════════════════════════════════════════════════════
// Bullet
// ══════════════════════════════════════════════════════════════

/// Why a bullet stopped existing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BulletEnd {
    HitBlock,
    OutOfRange,
}

/// Fly one tick. `player_x` bounds the travel range.
pub fn bullet_tick(
    bullet: &mut Bullet,
    window: &CollisionWindow,
    player_x: i32,
    cfg: &PhysicsConfig,
) -> Option<BulletEnd> {
    if !window.side_collision(&bullet.rect).is_clear() {
        return Some(BulletEnd::HitBlock);
    }
    bullet.rect.x += bullet.facing.sign() * cfg.bullet_speed;
    if bullet.rect.x > player_x + cfg.bullet_range_ahead
        || bullet.rect.x < player_x - cfg.bullet_range_behind
    {
        return Some(BulletEnd::OutOfRange);
    }
    None
}

// ══════════════════════════════════════════════════════════════
// Chest
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChestTick {
    /// Closed → Opening this tick.
    pub touched: bool,
    /// Opening → Opened this tick. Fires at most once per chest.
    pub opened: bool,
}

/// Closed → Opening on first player overlap; Opening → Opened once the
/// animation counter passes the last sprite. Opened is terminal and inert.
pub fn chest_tick(chest: &mut Chest, player_rect: &Rect, cfg: &PhysicsConfig) -> ChestTick {
    let mut out = ChestTick::default();
    match chest.state {
        ChestState::Opened => return out,
        ChestState::Closed => {
            if !player_rect.intersects(&chest.rect) {
                return out;
            }
            chest.state = ChestState::Opening;
            out.touched = true;
        }
        ChestState::Opening => {}
    }

    // Keeps opening even if the player no longer overlaps.
    chest.progress += cfg.chest_anim_step;
    if chest.progress > cfg.chest_sprite_count.saturating_sub(1) as f32 {
        chest.state = ChestState::Opened;
        out.opened = true;
    }
    out
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const BS: i32 = 60;

    fn block(col: i32, row: i32) -> Rect {
        Rect::new(col * BS, row * BS, BS, BS)
    }

    fn floor(row: i32, cols: std::ops::Range<i32>) -> Vec<Rect> {
        cols.map(|c| block(c, row)).collect()
    }

    fn cfg() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    fn standing_player(x: i32, floor_row: i32) -> Player {
        Player::new(x, floor_row * BS - 60, 40, 60)
    }

    const RIGHT: GameAction = GameAction { right: true, ..GameAction::NOOP };
    const LEFT: GameAction = GameAction { left: true, ..GameAction::NOOP };
    const JUMP: GameAction = GameAction { jump: true, ..GameAction::NOOP };
    const SHOOT: GameAction = GameAction { shoot: true, ..GameAction::NOOP };

    // ── Player: horizontal ──

    #[test]
    fn walks_right_on_flat_ground() {
        let blocks = floor(4, 0..10);
        let w = CollisionWindow::new(&blocks);
        let mut p = standing_player(120, 4);
        player_tick(&mut p, &w, RIGHT, &cfg(), 0);
        assert_eq!(p.rect.x, 128);
        assert_eq!(p.speed_x, 8);
        assert_eq!(p.rect.y, 180);
        assert_eq!(p.anim, AnimState::Run);
    }

    #[test]
    fn wall_stops_player_before_overlap() {
        let mut blocks = floor(4, 0..10);
        blocks.push(block(4, 3));
        let w = CollisionWindow::new(&blocks);
        let mut p = standing_player(180, 4);
        for t in 0..50 {
            player_tick(&mut p, &w, RIGHT, &cfg(), t * 33);
            assert!(p.rect.right() <= 240, "tunnelled at tick {t}: x={}", p.rect.x);
        }
        assert_eq!(p.speed_x, 0);
        assert_eq!(p.facing, Facing::Right);
    }

    #[test]
    fn left_edge_of_world_is_a_wall() {
        let blocks = floor(4, 0..10);
        let w = CollisionWindow::new(&blocks);
        let mut p = standing_player(0, 4);
        player_tick(&mut p, &w, LEFT, &cfg(), 0);
        assert_eq!(p.rect.x, 0);
    }

    // ── Player: vertical ──

    #[test]
    fn falls_then_lands() {
        let blocks = floor(4, 0..10);
        let w = CollisionWindow::new(&blocks);
        let mut p = Player::new(120, 50, 40, 60);
        let mut landed = false;
        for t in 0..100 {
            player_tick(&mut p, &w, GameAction::NOOP, &cfg(), t * 33);
            if p.speed_y == 0 && p.rect.y == 180 {
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert_eq!(p.anim, AnimState::Idle);
    }

    #[test]
    fn endless_fall_is_capped() {
        let w = CollisionWindow::new(&[]);
        let mut p = Player::new(5000, 50, 40, 60);
        let mut last_y = p.rect.y;
        for t in 0..100_000u64 {
            player_tick(&mut p, &w, GameAction::NOOP, &cfg(), t * 33);
            assert!(p.rect.y >= last_y);
            last_y = p.rect.y;
        }
        assert_eq!(p.speed_y, cfg().max_fall_speed);
        assert!(p.rect.y <= 50 + 60 * 100_000);
    }

    #[test]
    fn terminal_speed_still_lands() {
        let blocks = floor(40, 0..10);
        let w = CollisionWindow::new(&blocks);
        let mut p = Player::new(120, 7, 40, 60);
        p.speed_y = cfg().max_fall_speed;
        for t in 0..100 {
            player_tick(&mut p, &w, GameAction::NOOP, &cfg(), t * 33);
        }
        assert_eq!(p.rect.y, 40 * BS - 60);
        assert_eq!(p.speed_y, 0);
    }

    #[test]
    fn jump_requires_ground() {
        let blocks = floor(4, 0..10);
        let w = CollisionWindow::new(&blocks);
        let mut p = standing_player(120, 4);
        let t = player_tick(&mut p, &w, JUMP, &cfg(), 0);
        assert!(t.jumped);
        // Impulse applied then one tick of flight
        assert_eq!(p.rect.y, 180 - 10);
        assert_eq!(p.speed_y, -9);
        assert_eq!(p.anim, AnimState::Jump);

        // Mid-air: no double jump
        let t = player_tick(&mut p, &w, JUMP, &cfg(), 33);
        assert!(!t.jumped);
    }

    #[test]
    fn ceiling_cuts_jump() {
        let mut blocks = floor(4, 0..10);
        blocks.push(block(2, 2)); // y 120..180, flush with the player's head
        let w = CollisionWindow::new(&blocks);
        let mut p = standing_player(130, 4);
        let mut hit = false;
        for t in 0..30 {
            let out = player_tick(&mut p, &w, JUMP, &cfg(), t * 33);
            hit |= out.hit_ceiling;
            assert!(p.rect.y >= 160, "passed through ceiling: y={}", p.rect.y);
        }
        assert!(hit);
    }

    // ── Player: shoot ──

    #[test]
    fn shoot_respects_cooldown() {
        let blocks = floor(4, 0..10);
        let w = CollisionWindow::new(&blocks);
        let mut p = standing_player(120, 4);
        assert!(player_tick(&mut p, &w, SHOOT, &cfg(), 0).shot);
        assert!(!player_tick(&mut p, &w, SHOOT, &cfg(), 500).shot);
        assert!(!player_tick(&mut p, &w, SHOOT, &cfg(), 1000).shot);
        assert!(player_tick(&mut p, &w, SHOOT, &cfg(), 1001).shot);
        assert_eq!(p.bullets.len(), 2);
        let b = &p.bullets[0];
        assert_eq!(b.rect, Rect::new(120 + 32, 180 + 27, 10, 5));
        assert_eq!(b.facing, Facing::Right);
    }

    #[test]
    fn frozen_player_ignores_input() {
        let blocks = floor(4, 0..10);
        let w = CollisionWindow::new(&blocks);
        let mut p = standing_player(120, 4);
        p.frozen = true;
        let before = p.frame;
        player_tick(&mut p, &w, RIGHT, &cfg(), 0);
        assert_eq!(p.rect.x, 120);
        assert_eq!((p.speed_x, p.speed_y), (0, 0));
        assert!(p.frame > before);
    }

    // ── Enemy contacts ──

    fn enemy_at(id: usize, x: i32, y: i32) -> Enemy {
        Enemy::new(id, x, y, 40, 0)
    }

    #[test]
    fn falling_player_stomps() {
        let mut p = Player::new(120, 100, 40, 60);
        p.speed_y = 4;
        let mut enemies = vec![enemy_at(7, 125, 150)];
        let out = resolve_enemy_contacts(&mut p, &mut enemies, 0, &cfg(), 1000);
        assert_eq!(out.stomped, vec![7]);
        assert!(!out.lethal);
        assert!(enemies.is_empty());
        assert_eq!(p.speed_y, -5);
    }

    #[test]
    fn grounded_contact_is_lethal() {
        let mut p = Player::new(120, 180, 40, 60);
        let mut enemies = vec![enemy_at(1, 140, 200)];
        let out = resolve_enemy_contacts(&mut p, &mut enemies, 0, &cfg(), 1000);
        assert!(out.lethal);
        assert_eq!(enemies.len(), 1);
    }

    #[test]
    fn second_enemy_in_same_tick_is_graced() {
        let mut p = Player::new(120, 100, 40, 60);
        p.speed_y = 4;
        let mut enemies = vec![enemy_at(1, 120, 150), enemy_at(2, 130, 150)];
        let out = resolve_enemy_contacts(&mut p, &mut enemies, 0, &cfg(), 1000);
        assert_eq!(out.stomped, vec![1]);
        assert!(!out.lethal);
        assert_eq!(enemies.len(), 1);

        // Grace expires
        let out = resolve_enemy_contacts(&mut p, &mut enemies, 0, &cfg(), 1100);
        assert!(out.lethal);
    }

    #[test]
    fn enemies_outside_window_are_ignored() {
        let mut p = Player::new(120, 180, 40, 60);
        let mut e = enemy_at(1, 140, 200);
        e.chunk = 3;
        let mut enemies = vec![e];
        let out = resolve_enemy_contacts(&mut p, &mut enemies, 0, &cfg(), 0);
        assert!(!out.lethal);
    }

    // ── Enemy ──

    #[test]
    fn enemy_turns_at_wall() {
        let mut blocks = floor(4, 0..10);
        blocks.push(block(5, 3));
        let w = CollisionWindow::new(&blocks);
        let mut e = enemy_at(0, 240, 200);
        let mut turned = false;
        for _ in 0..40 {
            assert!(enemy_tick(&mut e, &w, &cfg()));
            if e.facing == Facing::Left {
                turned = true;
            }
            assert!(e.rect.x < 300 + 5);
        }
        assert!(turned);
    }

    #[test]
    fn enemy_falls_out_of_world() {
        let w = CollisionWindow::new(&[]);
        let mut e = enemy_at(0, 0, 990);
        let mut alive = true;
        for _ in 0..10 {
            alive = enemy_tick(&mut e, &w, &cfg());
            if !alive {
                break;
            }
        }
        assert!(!alive);
    }

    #[test]
    fn enemy_rechunks_while_walking() {
        let blocks = floor(4, 18..23);
        let w = CollisionWindow::new(&blocks);
        let mut e = enemy_at(0, 1195, 200);
        e.chunk = 0;
        enemy_tick(&mut e, &w, &cfg());
        assert_eq!(e.rect.x, 1200);
        assert_eq!(e.chunk, 1);
    }

    // ── Bullet ──

    #[test]
    fn bullet_dies_in_wall() {
        let blocks = vec![block(3, 3)];
        let w = CollisionWindow::new(&blocks);
        let mut b = Bullet::new(150, 200, 10, 5, Facing::Right);
        assert_eq!(bullet_tick(&mut b, &w, 100, &cfg()), None);
        assert_eq!(b.rect.x, 170);
        assert_eq!(bullet_tick(&mut b, &w, 100, &cfg()), None);
        assert_eq!(bullet_tick(&mut b, &w, 100, &cfg()), Some(BulletEnd::HitBlock));
    }

    #[test]
    fn bullet_range_is_bounded() {
        let w = CollisionWindow::new(&[]);
        let mut b = Bullet::new(100, 0, 10, 5, Facing::Right);
        let mut ticks = 0;
        while bullet_tick(&mut b, &w, 100, &cfg()).is_none() {
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(ticks, 61);

        let mut b = Bullet::new(100, 0, 10, 5, Facing::Left);
        assert_eq!(
            (0..60).find_map(|_| bullet_tick(&mut b, &w, 100, &cfg())),
            Some(BulletEnd::OutOfRange)
        );
    }

    // ── Chest ──

    #[test]
    fn chest_opens_once() {
        let mut c = Chest::new(0, Rect::new(300, 200, 60, 40), 0);
        let far = Rect::new(0, 0, 40, 60);
        let near = Rect::new(290, 180, 40, 60);

        assert_eq!(chest_tick(&mut c, &far, &cfg()), ChestTick::default());
        assert_eq!(c.state, ChestState::Closed);

        let first = chest_tick(&mut c, &near, &cfg());
        assert!(first.touched && !first.opened);

        let mut opened = 0;
        for _ in 0..100 {
            let t = chest_tick(&mut c, &far, &cfg());
            assert!(!t.touched);
            if t.opened {
                opened += 1;
            }
        }
        assert_eq!(opened, 1);
        assert!(c.is_opened());

        let frozen_progress = c.progress;
        assert_eq!(chest_tick(&mut c, &near, &cfg()), ChestTick::default());
        assert_eq!(c.progress, frozen_progress);
    }
}
