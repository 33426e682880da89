//! Reward shaping.
//!
//! `RewardShaper` owns every piece of cross-step shaping state (stall
//! counter, checkpoint high-water mark, hazard bookkeeping) and turns one
//! decision step's outcome into a scalar plus a per-term breakdown.
//! It also decides the terminal outcome: runaway detection and stagnation
//! truncation live here because both are reward-driven rules.

use serde::{Deserialize, Serialize};

use crate::config::RewardConfig;

/// One decision step as seen by the shaper.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepOutcome {
    pub jump_taken: bool,
    pub kills: u32,
    pub current_x: f64,
    pub current_y: f64,
    pub delta_x: f64,
    pub goal_distance: f64,
    pub max_progress_x: f64,
    pub is_win: bool,
    pub is_dead: bool,
    /// Decision-step budget exhausted.
    pub budget_exhausted: bool,
    pub level_width: f64,
    pub level_height: f64,
    /// Short-range hazard flag of the observation produced by this step.
    pub hazard_short_now: bool,
}

/// Per-term reward, reported with every step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub goal_progress: f64,
    pub checkpoint: f64,
    pub time: f64,
    pub kill_bonus: f64,
    pub jump_in_place: f64,
    pub no_progress: f64,
    pub terminal: f64,
    pub stagnation: f64,
    pub hazard_response: f64,
    pub hazard_camp: f64,
}

impl RewardBreakdown {
    pub fn total(&self) -> f64 {
        self.goal_progress
            + self.checkpoint
            + self.time
            + self.kill_bonus
            + self.jump_in_place
            + self.no_progress
            + self.terminal
            + self.stagnation
            + self.hazard_response
            + self.hazard_camp
    }
}

/// Shaped result of one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Scored {
    pub breakdown: RewardBreakdown,
    pub terminated: bool,
    pub truncated: bool,
    /// Dead by contact or by runaway.
    pub is_dead: bool,
    pub is_runaway: bool,
    pub stagnation_truncated: bool,
    pub goal_delta: f64,
    /// Hazard zone evaluated this step, if a hazard was pending.
    pub hazard_zone: Option<i64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardStats {
    pub events: u32,
    pub reactions: u32,
    pub ignores: u32,
    pub camp_steps: u32,
}

impl HazardStats {
    pub fn ignore_rate(&self) -> f64 {
        self.ignores as f64 / self.events.max(1) as f64
    }

    pub fn reaction_rate(&self) -> f64 {
        self.reactions as f64 / self.events.max(1) as f64
    }
}

#[derive(Clone, Debug)]
pub struct RewardShaper {
    cfg: RewardConfig,
    hazard_shaping: bool,
    prev_goal_distance: f64,
    checkpoint: i64,
    no_progress_steps: u32,
    hazard_pending: bool,
    last_hazard_zone: Option<i64>,
    hazard: HazardStats,
    jump_actions: u32,
    steps: u32,
}

impl RewardShaper {
    /// `hazard_shaping` is on for the balanced observation profile only.
    pub fn new(cfg: RewardConfig, hazard_shaping: bool) -> Self {
        RewardShaper {
            cfg,
            hazard_shaping,
            prev_goal_distance: 0.0,
            checkpoint: 0,
            no_progress_steps: 0,
            hazard_pending: false,
            last_hazard_zone: None,
            hazard: HazardStats::default(),
            jump_actions: 0,
            steps: 0,
        }
    }

    /// Start a new episode from the spawn state.
    pub fn reset(&mut self, start_x: f64, goal_distance: f64, hazard_short: bool) {
        self.prev_goal_distance = goal_distance;
        self.checkpoint = self.checkpoint_of(start_x);
        self.no_progress_steps = 0;
        self.hazard_pending = self.hazard_shaping && hazard_short;
        self.last_hazard_zone = None;
        self.hazard = HazardStats::default();
        self.jump_actions = 0;
        self.steps = 0;
    }

    pub fn checkpoint_index(&self) -> i64 {
        self.checkpoint
    }

    pub fn no_progress_steps(&self) -> u32 {
        self.no_progress_steps
    }

    pub fn hazard_stats(&self) -> HazardStats {
        self.hazard
    }

    pub fn jump_rate(&self) -> f64 {
        self.jump_actions as f64 / self.steps.max(1) as f64
    }

    fn checkpoint_of(&self, x: f64) -> i64 {
        if self.cfg.checkpoint_spacing <= 0.0 {
            return 0;
        }
        (x / self.cfg.checkpoint_spacing).floor() as i64
    }

    pub fn score(&mut self, o: &StepOutcome) -> Scored {
        let cfg = &self.cfg;
        let mut b = RewardBreakdown::default();
        let mut out = Scored::default();

        self.steps += 1;
        if o.jump_taken {
            self.jump_actions += 1;
        }

        // ── Dense terms ──
        let goal_delta = self.prev_goal_distance - o.goal_distance;
        out.goal_delta = goal_delta;
        b.goal_progress = ((goal_delta / cfg.progress_scale).tanh() * cfg.progress_gain)
            .clamp(-cfg.progress_gain, cfg.progress_gain);
        b.time = cfg.time_penalty;
        b.kill_bonus = o.kills as f64 * cfg.kill_bonus;

        let cp = self.checkpoint_of(o.max_progress_x);
        let new_cps = (cp - self.checkpoint).max(0);
        if new_cps > 0 {
            b.checkpoint = new_cps as f64 * cfg.checkpoint_bonus;
            self.checkpoint = cp;
        }

        if o.jump_taken && o.delta_x.abs() <= cfg.jump_in_place_dx && !o.is_win {
            b.jump_in_place = cfg.jump_in_place_penalty;
        }

        // ── Stall tracking ──
        if goal_delta <= cfg.no_progress_delta {
            self.no_progress_steps += 1;
        } else {
            self.no_progress_steps = 0;
        }
        if self.no_progress_steps >= cfg.no_progress_hard_steps {
            b.no_progress = cfg.no_progress_hard_penalty;
        } else if self.no_progress_steps >= cfg.no_progress_soft_steps {
            b.no_progress = cfg.no_progress_soft_penalty;
        }

        // ── Terminal outcome ──
        let mut terminated = o.is_win || o.is_dead;
        let runaway = !terminated && self.is_runaway(o);
        if runaway {
            terminated = true;
            b.terminal += cfg.runaway_penalty;
        }
        let is_dead = o.is_dead || runaway;
        let stalled = self.no_progress_steps >= cfg.stagnation_steps;
        let truncated = !terminated && (o.budget_exhausted || stalled);
        let stagnation_truncated = truncated && stalled && !o.budget_exhausted;

        if o.is_win {
            b.terminal += cfg.win_reward;
        } else if is_dead {
            b.terminal += cfg.death_penalty;
        } else if truncated {
            b.terminal += cfg.truncation_penalty;
        }
        if stagnation_truncated {
            b.stagnation = cfg.stagnation_penalty;
        }

        // ── Hazard shaping ──
        if self.hazard_shaping {
            self.shape_hazard(o, goal_delta, is_dead, &mut b, &mut out);
        }

        self.prev_goal_distance = o.goal_distance;
        self.hazard_pending = self.hazard_shaping && o.hazard_short_now;

        out.breakdown = b;
        out.terminated = terminated;
        out.truncated = truncated;
        out.is_dead = is_dead;
        out.is_runaway = runaway;
        out.stagnation_truncated = stagnation_truncated;
        out
    }

    fn is_runaway(&self, o: &StepOutcome) -> bool {
        let cfg = &self.cfg;
        o.current_x < -(cfg.runaway_margin_x as f64)
            || o.current_x > o.level_width + cfg.runaway_margin_x as f64
            || o.current_y < -(cfg.runaway_margin_top as f64)
            || o.current_y > o.level_height + cfg.runaway_margin_bottom as f64
    }

    /// Reward a forward jump right after a short-range hazard was observed;
    /// penalise anything else. Each zone pays out at most once in a row.
    fn shape_hazard(
        &mut self,
        o: &StepOutcome,
        goal_delta: f64,
        is_dead: bool,
        b: &mut RewardBreakdown,
        out: &mut Scored,
    ) {
        let cfg = &self.cfg;
        if !self.hazard_pending {
            self.hazard.camp_steps = 0;
            return;
        }

        self.hazard.events += 1;
        let zone = (o.current_x.max(0.0) / cfg.hazard_zone_width).floor() as i64;
        out.hazard_zone = Some(zone);

        let forward = o.delta_x >= cfg.hazard_forward_dx && goal_delta > 0.0;
        let fresh_zone = self.last_hazard_zone != Some(zone);

        if o.jump_taken && forward && !is_dead && fresh_zone {
            self.hazard.reactions += 1;
            b.hazard_response += cfg.hazard_response_bonus;
            self.last_hazard_zone = Some(zone);
            self.hazard.camp_steps = self.hazard.camp_steps.saturating_sub(2);
            return;
        }

        self.hazard.ignores += 1;
        b.hazard_response += cfg.hazard_ignore_penalty;
        if o.delta_x.abs() <= 2.0 {
            self.hazard.camp_steps += 1;
        } else {
            self.hazard.camp_steps = self.hazard.camp_steps.saturating_sub(1);
        }
        if self.hazard.camp_steps >= cfg.hazard_camp_steps {
            b.hazard_camp += cfg.hazard_camp_penalty;
        }
        if o.delta_x < -2.0 {
            b.hazard_camp += cfg.hazard_backtrack_penalty;
        }
        if is_dead {
            b.hazard_response += cfg.hazard_ignore_death_penalty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaper(hazard: bool) -> RewardShaper {
        let mut s = RewardShaper::new(RewardConfig::default(), hazard);
        s.reset(120.0, 1000.0, false);
        s
    }

    fn outcome(goal_distance: f64) -> StepOutcome {
        StepOutcome {
            current_x: 200.0,
            current_y: 100.0,
            goal_distance,
            max_progress_x: 200.0,
            level_width: 2400.0,
            level_height: 480.0,
            ..StepOutcome::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn progress_is_bounded() {
        let mut s = shaper(false);
        let r = s.score(&outcome(990.0));
        assert!(approx(r.breakdown.goal_progress, (10.0f64 / 45.0).tanh() * 1.5));
        assert!(approx(r.breakdown.time, -0.01));

        let r = s.score(&outcome(-100_000.0));
        assert!(approx(r.breakdown.goal_progress, 1.5));
        let r = s.score(&outcome(100_000.0));
        assert!(approx(r.breakdown.goal_progress, -1.5));
    }

    #[test]
    fn checkpoints_pay_once() {
        let mut s = shaper(false);
        let mut o = outcome(1000.0);
        o.max_progress_x = 1300.0;
        let r = s.score(&o);
        assert!(approx(r.breakdown.checkpoint, 6.0));
        assert_eq!(s.checkpoint_index(), 2);
        let r = s.score(&o);
        assert_eq!(r.breakdown.checkpoint, 0.0);
    }

    #[test]
    fn kills_and_jump_in_place() {
        let mut cfg = RewardConfig::default();
        cfg.jump_in_place_penalty = -0.1;
        let mut s = RewardShaper::new(cfg, false);
        s.reset(120.0, 1000.0, false);
        let mut o = outcome(1000.0);
        o.kills = 2;
        o.jump_taken = true;
        o.delta_x = 3.0;
        let r = s.score(&o);
        assert!(approx(r.breakdown.kill_bonus, 2.0));
        assert!(approx(r.breakdown.jump_in_place, -0.1));
        assert!(approx(s.jump_rate(), 1.0));
    }

    #[test]
    fn stall_escalates_then_truncates_once() {
        let mut s = shaper(false);
        let o = outcome(1000.0);
        for i in 1..120u32 {
            let r = s.score(&o);
            assert!(!r.truncated, "truncated early at {i}");
            let expect = if i >= 90 { -0.15 } else { 0.0 };
            assert!(approx(r.breakdown.no_progress, expect));
            assert_eq!(r.breakdown.stagnation, 0.0);
        }
        let r = s.score(&o);
        assert!(r.truncated && r.stagnation_truncated && !r.terminated);
        assert!(approx(r.breakdown.stagnation, -20.0));
        assert!(approx(r.breakdown.terminal, -25.0));
    }

    #[test]
    fn progress_resets_the_stall() {
        let mut s = shaper(false);
        for _ in 0..50 {
            s.score(&outcome(1000.0));
        }
        assert_eq!(s.no_progress_steps(), 50);
        s.score(&outcome(980.0));
        assert_eq!(s.no_progress_steps(), 0);
    }

    #[test]
    fn terminal_outcomes_are_exclusive() {
        let mut s = shaper(false);
        let mut o = outcome(0.0);
        o.is_win = true;
        o.budget_exhausted = true;
        let r = s.score(&o);
        assert!(r.terminated && !r.truncated && !r.is_dead);
        assert!(approx(r.breakdown.terminal, 260.0));

        let mut s = shaper(false);
        let mut o = outcome(1000.0);
        o.is_dead = true;
        let r = s.score(&o);
        assert!(r.terminated && !r.truncated && r.is_dead);
        assert!(approx(r.breakdown.terminal, -130.0));

        let mut s = shaper(false);
        let mut o = outcome(1000.0);
        o.budget_exhausted = true;
        let r = s.score(&o);
        assert!(!r.terminated && r.truncated && !r.stagnation_truncated);
        assert!(approx(r.breakdown.terminal, -25.0));
    }

    #[test]
    fn runaway_counts_as_death() {
        let mut s = shaper(false);
        let mut o = outcome(1000.0);
        o.current_y = 480.0 + 301.0;
        let r = s.score(&o);
        assert!(r.is_runaway && r.is_dead && r.terminated);
        assert!(approx(r.breakdown.terminal, -250.0));

        let mut s = shaper(false);
        let mut o = outcome(1000.0);
        o.current_x = -121.0;
        assert!(s.score(&o).is_runaway);

        let mut s = shaper(false);
        let mut o = outcome(1000.0);
        o.current_x = -120.0;
        assert!(!s.score(&o).is_runaway);
    }

    #[test]
    fn hazard_jump_rewarded_once_per_zone() {
        let mut s = shaper(true);
        let mut o = outcome(990.0);
        o.hazard_short_now = true;
        s.score(&o); // hazard now pending

        let mut jump = outcome(980.0);
        jump.jump_taken = true;
        jump.delta_x = 16.0;
        jump.hazard_short_now = true;
        let r = s.score(&jump);
        assert!(approx(r.breakdown.hazard_response, 0.20));
        assert_eq!(r.hazard_zone, Some(1));

        // Same zone again: counted as an ignore
        jump.goal_distance = 970.0;
        let r = s.score(&jump);
        assert!(approx(r.breakdown.hazard_response, -0.03));
        let stats = s.hazard_stats();
        assert_eq!((stats.events, stats.reactions, stats.ignores), (2, 1, 1));
        assert!(approx(stats.reaction_rate(), 0.5));
    }

    #[test]
    fn hazard_ignored_into_death() {
        let mut s = shaper(true);
        s.reset(120.0, 1000.0, true);
        let mut o = outcome(1000.0);
        o.is_dead = true;
        let r = s.score(&o);
        assert!(approx(r.breakdown.hazard_response, -0.53));
    }

    #[test]
    fn legacy_profile_has_no_hazard_terms() {
        let mut s = shaper(false);
        s.reset(120.0, 1000.0, true);
        let mut o = outcome(1000.0);
        o.hazard_short_now = true;
        s.score(&o);
        let r = s.score(&o);
        assert_eq!(r.breakdown.hazard_response, 0.0);
        assert_eq!(r.hazard_zone, None);
        assert_eq!(s.hazard_stats(), HazardStats::default());
    }
}
