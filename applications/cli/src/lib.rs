//! Spindle terminal player
//!
//! Wires the desktop audio output, the playback controller and an in-memory
//! catalog into a line-driven player. Commands arrive on stdin (`play 2`,
//! `seek 1:30`, `next`, ...) and are turned into dispatched actions.

pub mod commands;
pub mod config;
pub mod error;
pub mod runtime;

pub use config::CliConfig;
pub use error::{CliError, Result};
pub use runtime::{read_lines, Event, Flow, Player, StatusFormat};
