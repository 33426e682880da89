//! Pirate Run: a chunked side-scrolling platformer simulation with a
//! headless, frame-stepped episode harness for automated agents.
//!
//!   - `domain` : geometry, entities, collision queries, per-tick rules
//!   - `sim`    : level builder, world state, the tick stepper
//!   - `harness`: reset/step episodes, observations, rewards, evaluation
//!   - `ui`     : terminal front end (feature `tui`)

pub mod config;
pub mod domain;
pub mod error;
pub mod harness;
pub mod sim;
#[cfg(feature = "tui")]
pub mod ui;

pub use config::GameConfig;
pub use error::{Error, Result};
