//! Terminal front end for human play.

pub mod input;
pub mod renderer;
