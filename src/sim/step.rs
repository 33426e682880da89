/// The step function: advances the world by one physics tick.
///
/// Processing order:
///   1. Chunk window (re-centred on the player)
///   2. Player kinematics, then player ↔ enemy contacts and the fall-out check
///   3. Bullets
///   4. Chests (windowed); an opened chest ends the stage
///   5. Enemies (windowed)
///   6. Bullet ↔ enemy hits (windowed)
///
/// One window per tick: everything windowed in steps 2-6 uses the chunk
/// the player stood in when the tick started.

use crate::domain::entity::GameAction;
use crate::domain::kinematics::{self, BulletEnd};
use crate::domain::physics::{in_window, CollisionWindow};
use super::event::{dispatch, GameEvent, GameListener};
use super::world::{Phase, WorldState};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, action: GameAction) -> Vec<GameEvent> {
    if world.phase != Phase::Playing { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    world.refresh_window();
    if resolve_player(world, action, &mut events) { return events; }
    resolve_bullets(world, &mut events);
    resolve_chests(world, &mut events);
    resolve_enemies(world, &mut events);
    resolve_bullet_hits(world, &mut events);

    events
}

/// `step`, then forward the events to `listener`.
pub fn step_with(
    world: &mut WorldState,
    action: GameAction,
    listener: &mut dyn GameListener,
) -> Vec<GameEvent> {
    let events = step(world, action);
    dispatch(&events, listener);
    events
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

/// Returns true if the player died this tick.
fn resolve_player(world: &mut WorldState, action: GameAction, events: &mut Vec<GameEvent>) -> bool {
    let now = world.now_ms();
    let center = world.window_chunk;
    let cfg = &world.physics;
    let window = CollisionWindow::new(&world.active_blocks);

    let out = kinematics::player_tick(&mut world.player, &window, action, cfg, now);
    if out.hit_ceiling { events.push(GameEvent::CeilingHit); }
    if out.jumped { events.push(GameEvent::PlayerJumped); }
    if out.shot { events.push(GameEvent::BulletFired); }

    let contact = kinematics::resolve_enemy_contacts(
        &mut world.player, &mut world.enemies, center, cfg, now,
    );
    for id in contact.stomped {
        log::debug!("enemy {id} killed by stomp");
        events.push(GameEvent::EnemyStomped { id });
    }

    let fell_out = world.player.rect.y > world.layout.height_px + cfg.fall_out_margin_y;
    if contact.lethal || fell_out {
        world.player.alive = false;
        world.phase = Phase::Dead;
        log::info!(
            "player killed at x={} y={} (tick {}, {})",
            world.player.rect.x, world.player.rect.y, world.tick,
            if fell_out { "fell out of the level" } else { "enemy contact" },
        );
        events.push(GameEvent::PlayerKilled);
        return true;
    }
    false
}

// ══════════════════════════════════════════════════════════════
// Bullets
// ══════════════════════════════════════════════════════════════

fn resolve_bullets(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let window = CollisionWindow::new(&world.active_blocks);
    let player_x = world.player.rect.x;
    let cfg = &world.physics;

    world.player.bullets.retain_mut(|b| {
        match kinematics::bullet_tick(b, &window, player_x, cfg) {
            None => true,
            Some(end) => {
                log::trace!("bullet destroyed at x={} ({end:?})", b.rect.x);
                events.push(GameEvent::BulletDestroyed { hit_block: end == BulletEnd::HitBlock });
                false
            }
        }
    });
}

// ══════════════════════════════════════════════════════════════
// Chests
// ══════════════════════════════════════════════════════════════

fn resolve_chests(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let center = world.window_chunk;
    let player_rect = world.player.rect;
    let mut won = false;

    for chest in world.chests.iter_mut().filter(|c| in_window(c.chunk, center)) {
        let out = kinematics::chest_tick(chest, &player_rect, &world.physics);
        if out.touched {
            log::info!("chest {} touched at tick {}", chest.id, world.tick);
            world.player.frozen = true;
            events.push(GameEvent::ChestTouched { id: chest.id, rect: chest.rect });
            if world.win_on_chest_touch { won = true; }
        }
        if out.opened {
            log::info!("chest {} opened at tick {}", chest.id, world.tick);
            events.push(GameEvent::ChestOpened { id: chest.id });
            won = true;
        }
    }

    // Phase leaves Playing here, so the win can only be reported once.
    if won {
        world.phase = Phase::Won;
        events.push(GameEvent::StageCleared);
    }
}

// ══════════════════════════════════════════════════════════════
// Enemies
// ══════════════════════════════════════════════════════════════

fn resolve_enemies(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let center = world.window_chunk;
    let window = CollisionWindow::new(&world.active_blocks);
    let cfg = &world.physics;

    world.enemies.retain_mut(|e| {
        if !in_window(e.chunk, center) { return true; }
        let alive = kinematics::enemy_tick(e, &window, cfg);
        if !alive {
            log::debug!("enemy {} fell out of the world", e.id);
            events.push(GameEvent::EnemyFellOut { id: e.id });
        }
        alive
    });
}

/// A bullet touching windowed enemies destroys itself and every one of them.
fn resolve_bullet_hits(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let center = world.window_chunk;
    let enemies = &mut world.enemies;

    world.player.bullets.retain(|b| {
        let before = enemies.len();
        enemies.retain(|e| {
            let hit = in_window(e.chunk, center) && e.rect.intersects(&b.rect);
            if hit {
                log::debug!("enemy {} killed by bullet", e.id);
                events.push(GameEvent::EnemyShot { id: e.id });
            }
            !hit
        });
        enemies.len() == before
    });
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
