/// Entry point: terminal play and headless policy evaluation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use pirate_run::config::{self, GameConfig};
use pirate_run::harness::eval::{create_policy, evaluate, Policy, ScriptedPolicy};
use pirate_run::harness::Session;
use pirate_run::sim::level::{embedded_level, LevelDef, LevelLayout};

const FALLBACK_LEVEL: &str = "tutorial";

#[derive(Parser, Debug)]
#[command(name = "pirate-run")]
#[command(about = "Chunked side-scrolling platformer with a headless episode harness")]
struct Cli {
    /// Config file to use instead of searching for config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play in the terminal
    Play {
        /// Level file (defaults to the configured level, then the built-in tutorial)
        level: Option<PathBuf>,
    },
    /// Roll a policy through seeded episodes and print a summary
    Eval {
        level: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        episodes: u32,
        #[arg(long, value_enum, default_value_t = PolicyKind::Forward)]
        policy: PolicyKind,
        /// Comma-separated action ids for the scripted policy
        #[arg(long)]
        script: Option<String>,
        #[arg(long, default_value_t = 0)]
        seed_start: u64,
        /// Override `[harness] action_preset`
        #[arg(long)]
        preset: Option<String>,
        /// Override `[harness] obs_profile`
        #[arg(long)]
        profile: Option<String>,
        /// Write one JSON line per episode here
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyKind {
    Random,
    Forward,
    Scripted,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_file(path),
        None => GameConfig::load(),
    };

    match cli.command {
        Commands::Play { level } => {
            let def = resolve_level(&config, level.as_deref())?;
            play(&config, Arc::new(def.build(&config.physics)))
        }
        Commands::Eval { level, episodes, policy, script, seed_start, preset, profile, metrics } => {
            if let Some(preset) = preset {
                config.harness.action_preset = preset;
            }
            if let Some(profile) = profile {
                config.harness.obs_profile = profile;
            }
            let def = resolve_level(&config, level.as_deref())?;
            let layout = Arc::new(def.build(&config.physics));
            let mut session = Session::new(&config, layout)?;

            let mut policy: Box<dyn Policy> = match policy {
                PolicyKind::Scripted => {
                    let text = script.ok_or_else(|| anyhow!("--policy scripted needs --script"))?;
                    Box::new(ScriptedPolicy::new(parse_script(&text)?))
                }
                PolicyKind::Random => create_policy("random", session.preset())
                    .ok_or_else(|| anyhow!("random policy unavailable"))?,
                PolicyKind::Forward => create_policy("forward", session.preset())
                    .ok_or_else(|| anyhow!("forward policy unavailable"))?,
            };

            let mut sink = match &metrics {
                Some(path) => Some(BufWriter::new(
                    File::create(path)
                        .with_context(|| format!("creating metrics file {}", path.display()))?,
                )),
                None => None,
            };
            let summary = evaluate(
                &mut session,
                policy.as_mut(),
                episodes,
                seed_start,
                sink.as_mut().map(|w| w as &mut dyn Write),
            )?;
            if let Some(mut w) = sink {
                w.flush()?;
            }

            println!("Level: {}", def.name);
            println!("Policy: {} ({} preset)", policy.id(), session.preset());
            println!("{summary}");
            Ok(())
        }
    }
}

/// Explicit path (must exist), then the configured default, then the built-in level.
fn resolve_level(config: &GameConfig, explicit: Option<&Path>) -> Result<LevelDef> {
    if let Some(path) = explicit {
        return Ok(LevelDef::from_file(path)?);
    }
    let default = config.default_level_path();
    if default.is_file() {
        return LevelDef::from_file(&default)
            .with_context(|| format!("loading default level {}", default.display()));
    }
    log::warn!("{} not found; using built-in level {FALLBACK_LEVEL:?}", default.display());
    embedded_level(FALLBACK_LEVEL).ok_or_else(|| anyhow!("missing built-in level {FALLBACK_LEVEL}"))
}

fn parse_script(text: &str) -> Result<Vec<usize>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("bad action id {s:?} in --script")))
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Terminal play
// ══════════════════════════════════════════════════════════════

#[cfg(feature = "tui")]
fn play(config: &GameConfig, layout: Arc<LevelLayout>) -> Result<()> {
    use crossterm::event::{KeyboardEnhancementFlags, PushKeyboardEnhancementFlags, PopKeyboardEnhancementFlags};
    use crossterm::{execute, terminal};
    use pirate_run::sim::world::WorldState;
    use pirate_run::ui::input::InputState;
    use pirate_run::ui::renderer::Renderer;

    let mut world = WorldState::new(layout, config.physics.clone());
    world.win_on_chest_touch = config.harness.win_on_chest_touch;

    let mut renderer = Renderer::new();
    renderer.init().context("terminal init failed")?;

    let mut kb = InputState::new();
    if terminal::supports_keyboard_enhancement().unwrap_or(false) {
        kb.honor_release = execute!(
            std::io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok();
    }

    let result = game_loop(&mut world, &mut renderer, &mut kb);

    if kb.honor_release {
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    result?;

    println!("Thanks for playing Pirate Run! Reached x = {}", world.player.rect.x);
    Ok(())
}

#[cfg(feature = "tui")]
fn game_loop(
    world: &mut pirate_run::sim::world::WorldState,
    renderer: &mut pirate_run::ui::renderer::Renderer,
    kb: &mut pirate_run::ui::input::InputState,
) -> Result<()> {
    use std::time::{Duration, Instant};

    use pirate_run::domain::entity::GameAction;
    use pirate_run::sim::step;
    use pirate_run::ui::input::Command;

    const FRAME_SLEEP: Duration = Duration::from_millis(5);

    let tick_rate = Duration::from_millis(world.physics.tick_ms.max(1));
    let mut last_tick = Instant::now();
    let mut kills = 0u32;
    // Edge-triggered shoot must survive until the next tick.
    let mut pending = GameAction::NOOP;

    loop {
        kb.drain_events();
        match kb.command() {
            Some(Command::Quit) => break,
            Some(Command::Restart) => {
                world.respawn();
                kills = 0;
            }
            None => {}
        }
        pending.shoot |= kb.action().shoot;

        if last_tick.elapsed() >= tick_rate {
            let action = GameAction { shoot: pending.shoot, ..kb.action() };
            pending = GameAction::NOOP;
            let events = step::step(world, action);
            kills += events.iter().filter(|e| e.is_kill()).count() as u32;
            last_tick = Instant::now();
        }

        renderer.render(world, kills)?;
        std::thread::sleep(FRAME_SLEEP);
    }
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn play(_config: &GameConfig, _layout: Arc<LevelLayout>) -> Result<()> {
    anyhow::bail!("this build has no terminal front end; rebuild with the `tui` feature")
}
