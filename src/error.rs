//! Crate error type.
//!
//! Only construction-time failures are errors. Everything that can go wrong
//! inside a tick (empty chunk window, overlapping contacts, bad action ids)
//! is absorbed by the simulation rules instead.

use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    /// The level file could not be read. Fatal: no world can be built.
    LevelRead { path: PathBuf, source: io::Error },
    /// `action_preset` named a table that does not exist.
    UnknownActionPreset(String),
    /// `obs_profile` named a profile that does not exist.
    UnknownObsProfile(String),
    /// Per-episode metrics could not be written.
    Metrics(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LevelRead { path, source } => {
                write!(f, "could not read level {}: {source}", path.display())
            }
            Error::UnknownActionPreset(name) => {
                write!(f, "unknown action preset {name:?} (expected forward, simple or full)")
            }
            Error::UnknownObsProfile(name) => {
                write!(f, "unknown observation profile {name:?} (expected balanced or legacy)")
            }
            Error::Metrics(e) => write!(f, "could not write episode metrics: {e}"),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Metrics(e)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::LevelRead { source, .. } => Some(source),
            Error::Metrics(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
