/// Events emitted during a simulation step.
/// The harness and the terminal front end consume these; the core never
/// reaches back into its callers except through `GameListener`.

use crate::domain::geom::Rect;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    PlayerJumped,
    BulletFired,
    BulletDestroyed { hit_block: bool },
    EnemyStomped { id: usize },
    EnemyShot { id: usize },
    EnemyFellOut { id: usize },
    CeilingHit,
    ChestTouched { id: usize, rect: Rect },
    ChestOpened { id: usize },
    StageCleared,
    PlayerKilled,
}

impl GameEvent {
    /// Kills credited to the player (stomp or bullet).
    pub fn is_kill(&self) -> bool {
        matches!(self, GameEvent::EnemyStomped { .. } | GameEvent::EnemyShot { .. })
    }
}

/// Narrow outbound channel from the stepper to whoever owns the episode.
///
/// Every method has a no-op default, so a listener only implements the
/// notifications it cares about.
pub trait GameListener {
    /// A chest went Closed → Opening. The player is frozen from now on.
    fn on_chest_touch(&mut self, _chest_id: usize) {}
    /// Fires exactly once per world, when the episode is won.
    fn on_game_won(&mut self) {}
    fn on_player_death(&mut self) {}
    fn on_enemy_killed(&mut self, _enemy_id: usize) {}
}

/// Listener that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl GameListener for NoopListener {}

/// Forward a step's events to a listener, in emission order.
pub fn dispatch(events: &[GameEvent], listener: &mut dyn GameListener) {
    for ev in events {
        match ev {
            GameEvent::ChestTouched { id, .. } => listener.on_chest_touch(*id),
            GameEvent::StageCleared => listener.on_game_won(),
            GameEvent::PlayerKilled => listener.on_player_death(),
            GameEvent::EnemyStomped { id } | GameEvent::EnemyShot { id } => {
                listener.on_enemy_killed(*id)
            }
            _ => {}
        }
    }
}
