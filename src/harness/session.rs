//! Episode session: the reset/step contract over one world.
//!
//! One `Session` owns exactly one `WorldState` plus the shaping state for
//! the current episode. The built level layout is the only thing it may
//! share with other sessions (read-only, via `Arc`), so independent
//! sessions can run on separate threads without coordination.
//!
//! A decision step decodes one action id, replays the resulting buttons
//! for `frame_skip` ticks (stopping early when the world ends), then
//! observes and scores the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::config::{GameConfig, HarnessConfig, ObsProfile};
use crate::domain::entity::GameAction;
use crate::error::Result;
use crate::sim::event::GameListener;
use crate::sim::level::{LevelDef, LevelLayout};
use crate::sim::step::step_with;
use crate::sim::world::{Phase, WorldState};

use super::action::ActionPreset;
use super::observation::{observe, Observation, HAZARD_SHORT_SLOT};
use super::reward::{RewardBreakdown, RewardShaper, StepOutcome};

/// Seed used when `reset` is given none.
pub const DEFAULT_SEED: u64 = 0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStatus {
    pub is_win: bool,
    pub is_dead: bool,
    pub is_done: bool,
    pub step_count: u32,
    /// High-water mark of the player's x. Never decreases within an episode.
    pub max_progress_x: f64,
}

/// Auxiliary per-step information.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub killed_enemies: u32,
    pub is_win: bool,
    pub is_dead: bool,
    pub is_done: bool,
    pub step_count: u32,
    pub max_progress_x: f64,
    pub current_x: f64,
    pub current_y: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    pub goal_distance: f64,
    pub goal_delta: f64,
    pub checkpoint_index: i64,
    pub no_progress_steps: u32,
    pub is_runaway: bool,
    pub is_stagnation_truncated: bool,
    pub jump_taken: bool,
    pub jump_rate: f64,
    pub hazard_events: u32,
    pub hazard_reactions: u32,
    pub hazard_ignores: u32,
    pub hazard_camp_steps: u32,
    pub hazard_zone: Option<i64>,
    pub hazard_ignore_rate: f64,
    pub hazard_reaction_rate: f64,
    pub reward: RewardBreakdown,
}

#[derive(Clone, Debug)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Updates the episode status from world notifications.
struct StatusListener<'a> {
    status: &'a mut EpisodeStatus,
    kills: u32,
}

impl GameListener for StatusListener<'_> {
    fn on_game_won(&mut self) {
        self.status.is_win = true;
        self.status.is_done = true;
    }

    fn on_player_death(&mut self) {
        self.status.is_dead = true;
        self.status.is_done = true;
    }

    fn on_enemy_killed(&mut self, _enemy_id: usize) {
        self.kills += 1;
    }
}

pub struct Session {
    harness: HarnessConfig,
    preset: ActionPreset,
    profile: ObsProfile,
    world: WorldState,
    status: EpisodeStatus,
    shaper: RewardShaper,
    rng: Pcg32,
    level_path: Option<PathBuf>,
    terminated: bool,
    truncated: bool,
    last_info: StepInfo,
}

impl Session {
    /// Build a session over an already-built layout.
    pub fn new(config: &GameConfig, layout: Arc<LevelLayout>) -> Result<Self> {
        let preset: ActionPreset = config.harness.action_preset.parse()?;
        let profile: ObsProfile = config.harness.obs_profile.parse()?;
        let mut world = WorldState::new(layout, config.physics.clone());
        world.win_on_chest_touch = config.harness.win_on_chest_touch;

        let mut session = Session {
            harness: config.harness.clone(),
            preset,
            profile,
            world,
            status: EpisodeStatus::default(),
            shaper: RewardShaper::new(config.reward.clone(), profile == ObsProfile::Balanced),
            rng: Pcg32::seed_from_u64(DEFAULT_SEED),
            level_path: None,
            terminated: false,
            truncated: false,
            last_info: StepInfo::default(),
        };
        session.begin_episode();
        Ok(session)
    }

    /// Read and build a level file, then start a session on it.
    pub fn from_file(config: &GameConfig, path: &Path) -> Result<Self> {
        let layout = LevelDef::from_file(path)?.build(&config.physics);
        let mut session = Self::new(config, Arc::new(layout))?;
        session.level_path = Some(path.to_path_buf());
        Ok(session)
    }

    /// Start a new episode. A new `level` is read and built; otherwise the
    /// current layout is reused. `seed` reseeds the action sampler.
    pub fn reset(&mut self, level: Option<&Path>, seed: Option<u64>) -> Result<Observation> {
        if let Some(path) = level {
            let layout = LevelDef::from_file(path)?.build(&self.world.physics);
            self.world.layout = Arc::new(layout);
            self.level_path = Some(path.to_path_buf());
        }
        if let Some(seed) = seed {
            self.rng = Pcg32::seed_from_u64(seed);
        }
        self.world.respawn();
        Ok(self.begin_episode())
    }

    fn begin_episode(&mut self) -> Observation {
        self.status = EpisodeStatus {
            max_progress_x: self.world.player.rect.x as f64,
            ..EpisodeStatus::default()
        };
        self.terminated = false;
        self.truncated = false;
        self.last_info = StepInfo::default();
        let obs = self.observation();
        self.shaper.reset(
            self.world.player.rect.x as f64,
            self.world.goal_distance(),
            obs[HAZARD_SHORT_SLOT] >= 0.5,
        );
        obs
    }

    // ── Decision step ──

    /// Advance one decision step under discrete action `action_id`.
    pub fn step(&mut self, action_id: usize) -> StepResult {
        let action = self.preset.decode(action_id);
        self.step_action(action)
    }

    /// Advance one decision step with explicit buttons.
    pub fn step_action(&mut self, action: GameAction) -> StepResult {
        if self.status.is_done {
            log::warn!("step called after the episode ended; returning zero reward");
            return StepResult {
                observation: self.observation(),
                reward: 0.0,
                terminated: self.terminated,
                truncated: self.truncated,
                info: StepInfo { reward: RewardBreakdown::default(), ..self.last_info.clone() },
            };
        }

        let start_x = self.world.player.rect.x as f64;
        let start_y = self.world.player.rect.y as f64;

        let mut listener = StatusListener { status: &mut self.status, kills: 0 };
        for _ in 0..self.harness.frame_skip.max(1) {
            step_with(&mut self.world, action, &mut listener);
            if self.world.is_over() {
                break;
            }
        }
        let kills = listener.kills;

        self.status.step_count += 1;
        let current_x = self.world.player.rect.x as f64;
        let current_y = self.world.player.rect.y as f64;
        self.status.max_progress_x = self.status.max_progress_x.max(current_x);

        let obs = self.observation();
        let (lw, lh) = self.world.level_size();
        let goal_distance = self.world.goal_distance();
        let scored = self.shaper.score(&StepOutcome {
            jump_taken: action.jump,
            kills,
            current_x,
            current_y,
            delta_x: current_x - start_x,
            goal_distance,
            max_progress_x: self.status.max_progress_x,
            is_win: self.status.is_win,
            is_dead: self.status.is_dead,
            budget_exhausted: self.status.step_count >= self.harness.max_episode_steps,
            level_width: lw as f64,
            level_height: lh as f64,
            hazard_short_now: self.profile == ObsProfile::Balanced
                && obs[HAZARD_SHORT_SLOT] >= 0.5,
        });

        if scored.is_runaway {
            log::info!("runaway at ({current_x}, {current_y}); treating as death");
            self.world.phase = Phase::Dead;
            self.status.is_dead = true;
        }
        self.terminated = scored.terminated;
        self.truncated = scored.truncated;
        self.status.is_done = scored.terminated || scored.truncated;

        let hazard = self.shaper.hazard_stats();
        let info = StepInfo {
            killed_enemies: kills,
            is_win: self.status.is_win,
            is_dead: scored.is_dead,
            is_done: self.status.is_done,
            step_count: self.status.step_count,
            max_progress_x: self.status.max_progress_x,
            current_x,
            current_y,
            delta_x: current_x - start_x,
            delta_y: current_y - start_y,
            goal_distance,
            goal_delta: scored.goal_delta,
            checkpoint_index: self.shaper.checkpoint_index(),
            no_progress_steps: self.shaper.no_progress_steps(),
            is_runaway: scored.is_runaway,
            is_stagnation_truncated: scored.stagnation_truncated,
            jump_taken: action.jump,
            jump_rate: self.shaper.jump_rate(),
            hazard_events: hazard.events,
            hazard_reactions: hazard.reactions,
            hazard_ignores: hazard.ignores,
            hazard_camp_steps: hazard.camp_steps,
            hazard_zone: scored.hazard_zone,
            hazard_ignore_rate: hazard.ignore_rate(),
            hazard_reaction_rate: hazard.reaction_rate(),
            reward: scored.breakdown,
        };

        if self.status.is_done {
            log::info!(
                "episode over after {} steps: win={} dead={} truncated={} max_x={}",
                info.step_count, info.is_win, info.is_dead, self.truncated, info.max_progress_x,
            );
        }
        self.last_info = info.clone();

        StepResult {
            observation: obs,
            reward: scored.breakdown.total(),
            terminated: scored.terminated,
            truncated: scored.truncated,
            info,
        }
    }

    // ── Accessors ──

    pub fn observation(&self) -> Observation {
        observe(&self.world, self.profile, &self.status, self.harness.max_episode_steps)
    }

    /// Uniform random action id from the session's seeded generator.
    pub fn sample_action(&mut self) -> usize {
        self.rng.random_range(0..self.preset.action_count())
    }

    pub fn action_count(&self) -> usize {
        self.preset.action_count()
    }

    pub fn preset(&self) -> ActionPreset {
        self.preset
    }

    pub fn profile(&self) -> ObsProfile {
        self.profile
    }

    pub fn status(&self) -> &EpisodeStatus {
        &self.status
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn level_path(&self) -> Option<&Path> {
        self.level_path.as_deref()
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::domain::entity::{Enemy, Facing};
    use crate::sim::level::LevelDef;

    const NOOP: usize = 0;
    const RIGHT: usize = 2;

    fn session_with(cfg: &GameConfig, rows: &[&str]) -> Session {
        let layout = LevelDef::from_rows("t", rows).build(&cfg.physics);
        Session::new(cfg, Arc::new(layout)).unwrap()
    }

    fn session(rows: &[&str]) -> Session {
        session_with(&GameConfig::default(), rows)
    }

    fn run(s: &mut Session, action: usize, limit: usize) -> StepResult {
        let mut last = s.step(action);
        for _ in 1..limit {
            if last.terminated || last.truncated {
                break;
            }
            last = s.step(action);
        }
        last
    }

    #[test]
    fn walking_right_reaches_the_chest() {
        let mut s = session(&[
            "                                  ",
            "                                  ",
            "                                  ",
            "                                  ",
            "     C                            ",
            "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB",
        ]);
        let r = run(&mut s, RIGHT, 200);
        assert!(r.terminated && !r.truncated);
        assert!(r.info.is_win && !r.info.is_dead);
        let chest = s.world().chests[0].rect;
        assert!(r.info.max_progress_x + 40.0 > chest.x as f64);
        assert!(r.reward > 200.0);
    }

    #[test]
    fn two_row_level_walks_into_the_chest() {
        // Spawn y = 50 overlaps the ground row; the first tick snaps onto it.
        let mut s = session(&["     C", "BBBBBBBBBBBBBBBBBBBB"]);
        let chest = s.world().chests[0].rect;
        assert_eq!(chest.x, 300);
        assert_eq!(s.world().player.rect.x, 120);

        let r = run(&mut s, RIGHT, 100);
        assert!(r.terminated && !r.truncated);
        assert!(r.info.is_win && !r.info.is_dead);
        assert!(r.info.step_count < 100);
        assert_eq!(s.world().player.rect.y, 0);
        // Touching freezes the player, so the leading edge is what reaches the chest.
        let width = s.world().player.rect.w as f64;
        assert!(r.info.max_progress_x + width >= chest.x as f64);
    }

    #[test]
    fn wall_is_never_crossed() {
        let mut s = session(&[
            "                    ",
            "     B              ",
            "     B              ",
            "BBBBBBBBBBBBBBBBBBBB",
        ]);
        // The wall's left edge is at x = 300.
        for _ in 0..500 {
            let r = s.step(RIGHT);
            assert!(s.world().player.rect.right() <= 300, "x = {}", r.info.current_x);
            if r.truncated {
                break;
            }
        }
    }

    #[test]
    fn stomp_bounces_and_kills() {
        let mut s = session(&["", "", "", "BBBBBBBBBB"]);
        // Enemy walking left under the falling player.
        s.world.enemies = vec![Enemy { facing: Facing::Left, ..Enemy::new(0, 150, 140, 40, 0) }];
        let mut stomped = None;
        for _ in 0..20 {
            let r = s.step(NOOP);
            if r.info.killed_enemies > 0 {
                stomped = Some(r);
                break;
            }
        }
        let r = stomped.expect("no stomp");
        assert!(!r.terminated);
        assert!(s.world().enemies.is_empty());
        assert!(s.world().player.speed_y < 0);
        assert!(r.info.reward.kill_bonus >= 1.0);
    }

    #[test]
    fn ground_contact_is_fatal() {
        let mut s = session(&["", "", "   E    B", "BBBBBBBBBB"]);
        let r = run(&mut s, NOOP, 400);
        assert!(r.terminated && r.info.is_dead);
        assert!(s.status().is_dead && !s.status().is_win);
        assert!((r.info.reward.terminal + 130.0).abs() < 1e-9);
    }

    #[test]
    fn no_death_within_stomp_grace() {
        let mut s = session(&["", "", "", "BBBBBBBBBB"]);
        s.world.player.rect.y = 120;
        s.world.player.last_stomp_ms = Some(0);
        s.world.enemies = vec![Enemy::new(0, 140, 140, 40, 0)];
        // Both ticks of the first step land inside the grace window.
        let r = s.step(NOOP);
        assert!(!r.terminated);
        let r = run(&mut s, NOOP, 20);
        assert!(r.terminated && r.info.is_dead);
    }

    #[test]
    fn idling_truncates_on_stagnation() {
        let mut s = session(&["", "", "", "BBBBBBBBBB           C"]);
        let mut stagnation_hits = 0;
        let mut last = None;
        for _ in 0..300 {
            let r = s.step(NOOP);
            if r.info.reward.stagnation != 0.0 {
                stagnation_hits += 1;
            }
            let done = r.terminated || r.truncated;
            last = Some(r);
            if done {
                break;
            }
        }
        let r = last.unwrap();
        assert!(r.truncated && !r.terminated);
        assert!(r.info.is_stagnation_truncated);
        assert_eq!(stagnation_hits, 1);
        assert!(r.info.step_count >= 120 && r.info.step_count < 300);
        assert_eq!(r.info.no_progress_steps, 120);

        // Further steps are inert.
        let again = s.step(RIGHT);
        assert_eq!(again.reward, 0.0);
        assert!(again.truncated);
        assert_eq!(again.info.step_count, r.info.step_count);
    }

    #[test]
    fn falling_off_the_world_is_runaway() {
        let mut s = session(&["", "", "BB"]);
        let r = run(&mut s, RIGHT, 400);
        assert!(r.terminated && r.info.is_dead && r.info.is_runaway);
        assert_eq!(s.world().phase, Phase::Dead);
    }

    #[test]
    fn max_progress_never_decreases() {
        let mut s = session(&["", "", "", "BBBBBBBBBBBBBBBBBBBB"]);
        let mut best = s.status().max_progress_x;
        for i in 0..80 {
            let r = s.step(if i < 30 { RIGHT } else { 1 });
            assert!(r.info.max_progress_x >= best);
            best = r.info.max_progress_x;
        }
        assert!(best > s.world().player.rect.x as f64);
    }

    #[test]
    fn reset_restores_spawn_and_reseeds() {
        let mut s = session(&["", "", "", "BBBBBBBBBB"]);
        for _ in 0..10 {
            s.step(RIGHT);
        }
        s.reset(None, Some(7)).unwrap();
        assert_eq!(s.status().step_count, 0);
        assert_eq!(s.world().player.rect.x, 120);
        let a: Vec<usize> = (0..20).map(|_| s.sample_action()).collect();
        s.reset(None, Some(7)).unwrap();
        let b: Vec<usize> = (0..20).map(|_| s.sample_action()).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|id| *id < 5));
    }

    #[test]
    fn reset_with_missing_level_fails() {
        let mut s = session(&["BBB"]);
        let err = s.reset(Some(Path::new("/definitely/not/here.txt")), None);
        assert!(err.is_err());
    }

    #[test]
    fn bad_preset_is_rejected() {
        let mut cfg = GameConfig::default();
        cfg.harness.action_preset = "turbo".into();
        let layout = LevelDef::from_rows("t", &["BBB"]).build(&cfg.physics);
        assert!(Session::new(&cfg, Arc::new(layout)).is_err());
    }

    #[test]
    fn invalid_action_id_is_noop() {
        let mut a = session(&["", "", "", "BBBBBBBBBB"]);
        let mut b = session(&["", "", "", "BBBBBBBBBB"]);
        for _ in 0..10 {
            let ra = a.step(NOOP);
            let rb = b.step(99);
            assert_eq!(ra.observation, rb.observation);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn identical_scripts_replay_identically(
            script in proptest::collection::vec(0usize..9, 1..120),
        ) {
            let mut cfg = GameConfig::default();
            cfg.harness.action_preset = "full".into();
            let rows = [
                "                                        ",
                "                                        ",
                "                E            E        C ",
                "BBBBBBBBBBBB   BBBBBBBBBBBBBBBBBBBBBBBBB",
            ];
            let mut a = session_with(&cfg, &rows);
            let mut b = session_with(&cfg, &rows);
            for id in &script {
                let ra = a.step(*id);
                let rb = b.step(*id);
                prop_assert_eq!(ra.observation, rb.observation);
                prop_assert_eq!(ra.reward.to_bits(), rb.reward.to_bits());
                prop_assert_eq!(ra.terminated, rb.terminated);
                prop_assert_eq!(ra.truncated, rb.truncated);
            }
        }
    }
}
