//! Headless evaluation: roll a policy through N seeded episodes and
//! aggregate what happened.
//!
//! Episode `i` is reset with seed `seed_start + i`, so two runs with the
//! same policy, level and config produce identical summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use crate::domain::entity::GameAction;
use crate::error::{Error, Result};

use super::action::ActionPreset;
use super::observation::{Observation, HAZARD_SHORT_SLOT};
use super::session::Session;

/// Width of one death-location bin, in pixels of max progress.
pub const DEATH_BIN_PX: f64 = 600.0;

const TOP_DEATH_BINS: usize = 10;

// ══════════════════════════════════════════════════════════════
// Policies
// ══════════════════════════════════════════════════════════════

/// Something that picks a discrete action id from an observation.
pub trait Policy {
    fn id(&self) -> &'static str;
    fn reset(&mut self, _seed: u64) {}
    fn next_action(&mut self, obs: &Observation) -> usize;
}

/// Uniform over the preset's ids.
pub struct RandomPolicy {
    action_count: usize,
    rng: Pcg32,
}

impl RandomPolicy {
    pub fn new(action_count: usize) -> Self {
        RandomPolicy { action_count: action_count.max(1), rng: Pcg32::seed_from_u64(0) }
    }
}

impl Policy for RandomPolicy {
    fn id(&self) -> &'static str {
        "random"
    }

    fn reset(&mut self, seed: u64) {
        self.rng = Pcg32::seed_from_u64(seed);
    }

    fn next_action(&mut self, _obs: &Observation) -> usize {
        self.rng.random_range(0..self.action_count)
    }
}

/// Run right; jump whenever the short-range hazard flag is up.
pub struct ForwardPolicy {
    run: usize,
    leap: usize,
}

impl ForwardPolicy {
    pub fn new(preset: ActionPreset) -> Self {
        let right = GameAction { right: true, ..GameAction::NOOP };
        let right_jump = GameAction { jump: true, ..right };
        let run = preset.index_of(right).unwrap_or(0);
        // The forward preset has no plain jump, but every preset has right+jump.
        let leap = preset.index_of(right_jump).unwrap_or(run);
        ForwardPolicy { run, leap }
    }
}

impl Policy for ForwardPolicy {
    fn id(&self) -> &'static str {
        "forward"
    }

    fn next_action(&mut self, obs: &Observation) -> usize {
        if obs[HAZARD_SHORT_SLOT] >= 0.5 { self.leap } else { self.run }
    }
}

/// Replays a fixed id sequence, cycling. An empty script is all no-ops.
pub struct ScriptedPolicy {
    script: Vec<usize>,
    cursor: usize,
}

impl ScriptedPolicy {
    pub fn new(script: Vec<usize>) -> Self {
        ScriptedPolicy { script, cursor: 0 }
    }
}

impl Policy for ScriptedPolicy {
    fn id(&self) -> &'static str {
        "scripted"
    }

    fn reset(&mut self, _seed: u64) {
        self.cursor = 0;
    }

    fn next_action(&mut self, _obs: &Observation) -> usize {
        if self.script.is_empty() {
            return 0;
        }
        let id = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        id
    }
}

/// Build a built-in policy by name (`random` or `forward`).
pub fn create_policy(name: &str, preset: ActionPreset) -> Option<Box<dyn Policy>> {
    match name {
        "random" => Some(Box::new(RandomPolicy::new(preset.action_count()))),
        "forward" => Some(Box::new(ForwardPolicy::new(preset))),
        _ => None,
    }
}

// ══════════════════════════════════════════════════════════════
// Metrics
// ══════════════════════════════════════════════════════════════

/// One finished episode. Written as a JSON line when a sink is given.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpisodeMetrics {
    pub episode: u32,
    pub seed: u64,
    pub policy: String,
    pub total_reward: f64,
    pub steps: u32,
    pub is_win: bool,
    pub is_dead: bool,
    pub is_truncated: bool,
    pub is_runaway: bool,
    pub is_stagnation_truncated: bool,
    pub max_progress_x: f64,
    pub final_x: f64,
    pub kills: u32,
    pub jump_rate: f64,
    pub hazard_ignore_rate: f64,
    pub hazard_reaction_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvalSummary {
    pub episodes: u32,
    pub wins: u32,
    pub deaths: u32,
    /// Episodes that ended neither won nor dead.
    pub truncations: u32,
    pub mean_reward: f64,
    pub mean_progress: f64,
    pub max_progress: f64,
    pub mean_length: f64,
    pub action_histogram: BTreeMap<usize, u64>,
    /// Deaths per `DEATH_BIN_PX` bin of max progress, keyed by bin index.
    pub death_bins: BTreeMap<i64, u32>,
}

impl EvalSummary {
    pub fn win_rate(&self) -> f64 {
        self.wins as f64 / self.episodes.max(1) as f64
    }

    /// Largest fraction of all decisions spent on a single action id.
    pub fn max_action_share(&self) -> f64 {
        let total: u64 = self.action_histogram.values().sum();
        self.action_histogram
            .values()
            .map(|&n| n as f64 / total.max(1) as f64)
            .fold(0.0, f64::max)
    }

    /// Most frequent death bins, ties broken by bin index.
    pub fn top_death_bins(&self) -> Vec<(i64, u32)> {
        let mut bins: Vec<(i64, u32)> = self.death_bins.iter().map(|(&b, &n)| (b, n)).collect();
        bins.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        bins.truncate(TOP_DEATH_BINS);
        bins
    }

    fn absorb(&mut self, m: &EpisodeMetrics) {
        self.episodes += 1;
        if m.is_win {
            self.wins += 1;
        }
        if m.is_dead {
            self.deaths += 1;
            let bin = (m.max_progress_x / DEATH_BIN_PX).floor() as i64;
            *self.death_bins.entry(bin).or_insert(0) += 1;
        }
        if !m.is_win && !m.is_dead {
            self.truncations += 1;
        }
        // Running means keep the summary valid after every episode.
        let n = self.episodes as f64;
        self.mean_reward += (m.total_reward - self.mean_reward) / n;
        self.mean_progress += (m.max_progress_x - self.mean_progress) / n;
        self.mean_length += (m.steps as f64 - self.mean_length) / n;
        self.max_progress = if self.episodes == 1 {
            m.max_progress_x
        } else {
            self.max_progress.max(m.max_progress_x)
        };
    }
}

impl fmt::Display for EvalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Episodes: {}", self.episodes)?;
        writeln!(
            f,
            "Win rate: {:.3} (wins={}, deaths={}, truncations={})",
            self.win_rate(), self.wins, self.deaths, self.truncations,
        )?;
        writeln!(
            f,
            "Reward mean: {:.2} | Progress mean/max: {:.1}/{:.1} | Episode length mean: {:.1}",
            self.mean_reward, self.mean_progress, self.max_progress, self.mean_length,
        )?;
        writeln!(f, "Action histogram: {:?}", self.action_histogram)?;
        writeln!(f, "Max action share: {:.3}", self.max_action_share())?;
        write!(f, "Top death bins ({DEATH_BIN_PX}px): {:?}", self.top_death_bins())
    }
}

// ══════════════════════════════════════════════════════════════
// Runner
// ══════════════════════════════════════════════════════════════

/// Play one episode to its end. Returns the metrics and the action ids taken.
pub fn run_episode(
    session: &mut Session,
    policy: &mut dyn Policy,
    episode: u32,
    seed: u64,
) -> Result<(EpisodeMetrics, Vec<usize>)> {
    let mut obs = session.reset(None, Some(seed))?;
    policy.reset(seed);

    let mut actions = Vec::new();
    let mut total_reward = 0.0;
    let mut kills = 0;
    loop {
        let id = policy.next_action(&obs);
        actions.push(id);
        let r = session.step(id);
        total_reward += r.reward;
        kills += r.info.killed_enemies;
        obs = r.observation;
        if r.terminated || r.truncated {
            let info = r.info;
            let metrics = EpisodeMetrics {
                episode,
                seed,
                policy: policy.id().to_string(),
                total_reward,
                steps: info.step_count,
                is_win: info.is_win,
                is_dead: info.is_dead,
                is_truncated: r.truncated,
                is_runaway: info.is_runaway,
                is_stagnation_truncated: info.is_stagnation_truncated,
                max_progress_x: info.max_progress_x,
                final_x: info.current_x,
                kills,
                jump_rate: info.jump_rate,
                hazard_ignore_rate: info.hazard_ignore_rate,
                hazard_reaction_rate: info.hazard_reaction_rate,
            };
            return Ok((metrics, actions));
        }
    }
}

/// Run `episodes` episodes, optionally streaming per-episode JSON lines.
pub fn evaluate(
    session: &mut Session,
    policy: &mut dyn Policy,
    episodes: u32,
    seed_start: u64,
    mut sink: Option<&mut dyn Write>,
) -> Result<EvalSummary> {
    let mut summary = EvalSummary::default();

    for episode in 0..episodes {
        let seed = seed_start + episode as u64;
        let (metrics, actions) = run_episode(session, policy, episode, seed)?;
        for id in actions {
            *summary.action_histogram.entry(id).or_insert(0) += 1;
        }
        log::debug!(
            "episode {episode} (seed {seed}): reward={:.2} steps={} win={} dead={}",
            metrics.total_reward, metrics.steps, metrics.is_win, metrics.is_dead,
        );
        if let Some(out) = sink.as_deref_mut() {
            serde_json::to_writer(&mut *out, &metrics)?;
            out.write_all(b"\n").map_err(|e| Error::Metrics(serde_json::Error::io(e)))?;
        }
        summary.absorb(&metrics);
    }

    log::info!(
        "evaluated {} episodes with {}: win rate {:.3}",
        summary.episodes, policy.id(), summary.win_rate(),
    );
    Ok(summary)
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
