/// WorldState: the complete snapshot of a running episode.
///
/// ## Layers
///
///   - `layout`: static blocks and spawn points, built once per level.
///     **Never mutated**; shared across worlds through an `Arc`.
///   - live entities: player, enemies, chests. Owned here, mutated only
///     by `sim::step`.
///   - `active_blocks`: this tick's chunk window, recomputed from scratch
///     at the start of every tick around the player's chunk.
///
/// ## Clock
///
/// `now_ms = tick * tick_ms`. Cooldowns and grace periods compare sim
/// times only, so two worlds fed the same inputs stay bit-identical.

use std::sync::Arc;

use crate::config::PhysicsConfig;
use crate::domain::entity::{Chest, Enemy, Player};
use crate::domain::geom::Rect;
use crate::domain::physics::{self, in_window, CollisionWindow};

use super::level::LevelLayout;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    Won,
    Dead,
}

#[derive(Clone, Debug)]
pub struct WorldState {
    pub layout: Arc<LevelLayout>,
    pub physics: PhysicsConfig,
    pub player: Player,
    pub enemies: Vec<Enemy>,
    pub chests: Vec<Chest>,
    /// Blocks of chunks `window_chunk - 1 ..= window_chunk + 1`.
    pub active_blocks: Vec<Rect>,
    pub window_chunk: i32,
    pub tick: u64,
    pub phase: Phase,
    /// Declare the win on first chest contact.
    pub win_on_chest_touch: bool,
}

impl WorldState {
    pub fn new(layout: Arc<LevelLayout>, physics: PhysicsConfig) -> Self {
        let mut world = WorldState {
            layout,
            player: spawn_player(&physics),
            physics,
            enemies: Vec::new(),
            chests: Vec::new(),
            active_blocks: Vec::new(),
            window_chunk: 0,
            tick: 0,
            phase: Phase::Playing,
            win_on_chest_touch: false,
        };
        world.respawn();
        world
    }

    /// Rebuild every live entity from the layout's spawn points.
    pub fn respawn(&mut self) {
        let cfg = &self.physics;
        self.player = spawn_player(cfg);
        self.enemies = self
            .layout
            .enemy_spawns
            .iter()
            .enumerate()
            .map(|(id, s)| Enemy::new(id, s.x, s.y, cfg.enemy_size, s.chunk))
            .collect();
        self.chests = self
            .layout
            .chest_spawns
            .iter()
            .enumerate()
            .map(|(id, s)| Chest::new(id, s.rect, s.chunk))
            .collect();
        self.tick = 0;
        self.phase = Phase::Playing;
        self.refresh_window();
    }

    /// Sim-clock time of the current tick.
    pub fn now_ms(&self) -> u64 {
        self.tick * self.physics.tick_ms
    }

    pub fn player_chunk(&self) -> i32 {
        self.physics.chunk_of(self.player.rect.x)
    }

    /// Re-centre the chunk window on the player.
    pub fn refresh_window(&mut self) {
        self.window_chunk = self.player_chunk();
        physics::collect_window(&self.layout.chunks, self.window_chunk, &mut self.active_blocks);
    }

    pub fn window(&self) -> CollisionWindow<'_> {
        CollisionWindow::new(&self.active_blocks)
    }

    pub fn is_over(&self) -> bool {
        self.phase != Phase::Playing
    }

    pub fn level_size(&self) -> (i32, i32) {
        (self.layout.width_px, self.layout.height_px)
    }

    /// Player resting on ground with no vertical motion.
    pub fn player_grounded(&self) -> bool {
        let p = &self.player;
        p.speed_y == 0 && self.window().has_ground(&p.rect.base(), p.rect.h)
    }

    pub fn active_enemies(&self) -> impl Iterator<Item = &Enemy> {
        let center = self.window_chunk;
        self.enemies.iter().filter(move |e| in_window(e.chunk, center))
    }

    /// Nearest chest by horizontal distance, windowed or not.
    pub fn nearest_chest(&self) -> Option<&Chest> {
        let px = self.player.rect.x;
        self.chests.iter().min_by_key(|c| (c.rect.x - px).abs())
    }

    /// Nearest live enemy by horizontal distance, windowed or not.
    pub fn nearest_enemy(&self) -> Option<&Enemy> {
        let px = self.player.rect.x;
        self.enemies.iter().min_by_key(|e| (e.rect.x - px).abs())
    }

    /// |dx| + |dy| from the player to the nearest chest; 0 without chests.
    pub fn goal_distance(&self) -> f64 {
        self.nearest_chest().map_or(0.0, |c| {
            let dx = (c.rect.x - self.player.rect.x) as f64;
            let dy = (c.rect.y - self.player.rect.y) as f64;
            dx.abs() + dy.abs()
        })
    }
}

fn spawn_player(cfg: &PhysicsConfig) -> Player {
    Player::new(cfg.player_spawn_x, cfg.player_spawn_y, cfg.player_width, cfg.player_height)
}
