//! External configuration loader.
//!
//! Reads `config.toml` from the executable's directory (or CWD).
//! Falls back to sensible defaults if the file is missing or incomplete.
//!
//! Every section carries `#[serde(default)]`, so a file that only sets
//! `[harness] frame_skip = 4` still yields a complete config.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Public Config Struct ──

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub harness: HarnessConfig,
    pub reward: RewardConfig,
    pub general: GeneralConfig,
}

/// Simulation constants. All distances are pixels, all speeds pixels/tick.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub block_size: i32,
    pub columns_per_chunk: i32,
    pub gravity: i32,
    /// Terminal downward speed. At most one block per tick keeps falls
    /// from skipping over a block.
    pub max_fall_speed: i32,
    /// The player dies once their top passes `level height + this`.
    pub fall_out_margin_y: i32,
    /// Sim-clock milliseconds per tick (33 ≈ 30 fps).
    pub tick_ms: u64,

    pub player_width: i32,
    pub player_height: i32,
    pub player_spawn_x: i32,
    pub player_spawn_y: i32,
    pub player_speed: i32,
    pub jump_speed: i32,
    pub stomp_bounce: i32,
    pub shoot_cooldown_ms: u64,
    pub stomp_grace_ms: u64,
    pub player_frame_count: u32,
    pub player_anim_step: f32,

    pub enemy_size: i32,
    pub enemy_speed: i32,
    pub enemy_fall_limit_y: i32,
    pub enemy_frame_count: u32,
    pub enemy_anim_step: f32,

    pub bullet_width: i32,
    pub bullet_height: i32,
    pub bullet_speed: i32,
    pub bullet_range_ahead: i32,
    pub bullet_range_behind: i32,

    pub chest_width: i32,
    pub chest_height: i32,
    pub chest_sprite_count: u32,
    pub chest_anim_step: f32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub frame_skip: u32,
    pub max_episode_steps: u32,
    pub action_preset: String,
    pub obs_profile: String,
    /// Declare the win on first chest contact instead of after the opening animation.
    pub win_on_chest_touch: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardConfig {
    pub progress_scale: f64,
    pub progress_gain: f64,
    pub time_penalty: f64,
    pub kill_bonus: f64,
    pub checkpoint_spacing: f64,
    pub checkpoint_bonus: f64,

    pub jump_in_place_dx: f64,
    pub jump_in_place_penalty: f64,

    pub no_progress_delta: f64,
    pub no_progress_soft_steps: u32,
    pub no_progress_hard_steps: u32,
    pub no_progress_soft_penalty: f64,
    pub no_progress_hard_penalty: f64,
    pub stagnation_steps: u32,
    pub stagnation_penalty: f64,

    pub win_reward: f64,
    pub death_penalty: f64,
    pub truncation_penalty: f64,
    pub runaway_penalty: f64,
    pub runaway_margin_x: i32,
    pub runaway_margin_top: i32,
    pub runaway_margin_bottom: i32,

    pub hazard_zone_width: f64,
    pub hazard_forward_dx: f64,
    pub hazard_response_bonus: f64,
    pub hazard_ignore_penalty: f64,
    pub hazard_ignore_death_penalty: f64,
    pub hazard_backtrack_penalty: f64,
    pub hazard_camp_penalty: f64,
    pub hazard_camp_steps: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub levels_dir: PathBuf,
    pub default_level: String,
}

// ── Defaults ──

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            block_size: 60,
            columns_per_chunk: 20,
            gravity: 1,
            max_fall_speed: 60,
            fall_out_margin_y: 600,
            tick_ms: 33,
            player_width: 40,
            player_height: 60,
            player_spawn_x: 120,
            player_spawn_y: 50,
            player_speed: 8,
            jump_speed: -10,
            stomp_bounce: -5,
            shoot_cooldown_ms: 1000,
            stomp_grace_ms: 100,
            player_frame_count: 7,
            player_anim_step: 0.3,
            enemy_size: 40,
            enemy_speed: 5,
            enemy_fall_limit_y: 1000,
            enemy_frame_count: 3,
            enemy_anim_step: 0.3,
            bullet_width: 10,
            bullet_height: 5,
            bullet_speed: 20,
            bullet_range_ahead: 1220,
            bullet_range_behind: 1000,
            chest_width: 60,
            chest_height: 40,
            chest_sprite_count: 10,
            chest_anim_step: 0.2,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            frame_skip: 2,
            max_episode_steps: 2500,
            action_preset: "simple".into(),
            obs_profile: "balanced".into(),
            win_on_chest_touch: false,
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            progress_scale: 45.0,
            progress_gain: 1.5,
            time_penalty: -0.01,
            kill_bonus: 1.0,
            checkpoint_spacing: 600.0,
            checkpoint_bonus: 3.0,
            jump_in_place_dx: 6.0,
            jump_in_place_penalty: 0.0,
            no_progress_delta: 1.0,
            no_progress_soft_steps: 90,
            no_progress_hard_steps: 140,
            no_progress_soft_penalty: -0.15,
            no_progress_hard_penalty: -0.35,
            stagnation_steps: 120,
            stagnation_penalty: -20.0,
            win_reward: 260.0,
            death_penalty: -130.0,
            truncation_penalty: -25.0,
            runaway_penalty: -120.0,
            runaway_margin_x: 120,
            runaway_margin_top: 240,
            runaway_margin_bottom: 300,
            hazard_zone_width: 120.0,
            hazard_forward_dx: 12.0,
            hazard_response_bonus: 0.20,
            hazard_ignore_penalty: -0.03,
            hazard_ignore_death_penalty: -0.5,
            hazard_backtrack_penalty: 0.0,
            hazard_camp_penalty: 0.0,
            hazard_camp_steps: 6,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            levels_dir: PathBuf::from("levels"),
            default_level: "level_easy.txt".into(),
        }
    }
}

// ── Derived values ──

impl PhysicsConfig {
    /// Grid columns per chunk, never below one.
    pub fn chunk_columns(&self) -> i32 {
        self.columns_per_chunk.max(1)
    }

    /// Width of one chunk in pixels.
    pub fn chunk_width_px(&self) -> i32 {
        (self.chunk_columns() * self.block_size).max(1)
    }

    /// Chunk index of a world x coordinate (floor division).
    pub fn chunk_of(&self, x: i32) -> i32 {
        x.div_euclid(self.chunk_width_px())
    }
}

/// Named observation layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObsProfile {
    Balanced,
    Legacy,
}

impl FromStr for ObsProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(ObsProfile::Balanced),
            "legacy" => Ok(ObsProfile::Legacy),
            _ => Err(Error::UnknownObsProfile(s.to_string())),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut cfg = load_toml(&search_dirs);

        // Resolve a relative levels directory against the search dirs
        if !cfg.general.levels_dir.is_absolute() {
            if let Some(found) = search_dirs
                .iter()
                .map(|d| d.join(&cfg.general.levels_dir))
                .find(|p| p.is_dir())
            {
                cfg.general.levels_dir = found;
            }
        }
        cfg
    }

    /// Parse a config from TOML text. Unknown keys are ignored.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Path of the default level inside the levels directory.
    pub fn default_level_path(&self) -> PathBuf {
        self.general.levels_dir.join(&self.general.default_level)
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> GameConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            return load_file(&path);
        }
    }
    GameConfig::default()
}

/// Read one config file, falling back to defaults on any failure.
pub fn load_file(path: &Path) -> GameConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => match GameConfig::from_toml_str(&text) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                log::warn!("config.toml parse error: {e}; using default settings");
                GameConfig::default()
            }
        },
        Err(e) => {
            log::warn!("could not read {}: {e}", path.display());
            GameConfig::default()
        }
    }
}
