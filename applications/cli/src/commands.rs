//! Line commands typed at the player prompt
//!
//! A line is parsed into a [`Command`] without looking at player state; track
//! numbers (1-based, as printed by `list`) are resolved against the current
//! catalog only when the command is turned into an [`Action`].

use crate::error::{CliError, Result};
use spindle_core::{Step, Track};
use spindle_playback::Action;
use std::path::PathBuf;

/// Help text printed by the `help` command
pub const HELP: &str = "\
Commands:
  play [N]       play track N, or resume / play the selection
  pause          pause playback
  stop           stop playback
  seek SECONDS   jump to a position in the current track
  volume LEVEL   set volume (0-100)
  next | prev    skip to the neighbouring track
  select N       move the selection to track N
  add PATH...    add audio files to the catalog
  remove N       remove track N from the catalog
  unselect       clear the selection and unload
  list           show the catalog
  status         show what is playing
  help           show this text
  quit           exit";

/// One parsed prompt line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(Option<usize>),
    Pause,
    Stop,
    Seek(f64),
    Volume(u8),
    Skip(Step),
    Select(usize),
    Add(Vec<PathBuf>),
    Remove(usize),
    Unselect,
    List,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse a prompt line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "play" | "p" => match args.as_slice() {
                [] => Command::Play(None),
                [n] => Command::Play(Some(track_number("play", n)?)),
                _ => return Err(CliError::invalid("play", "expected at most one track number")),
            },
            "pause" => no_args("pause", &args, Command::Pause)?,
            "stop" | "s" => no_args("stop", &args, Command::Stop)?,
            "seek" => Command::Seek(seconds(single("seek", &args)?)?),
            "volume" | "vol" => Command::Volume(level(single("volume", &args)?)?),
            "next" | "n" => no_args("next", &args, Command::Skip(Step::Next))?,
            "prev" | "previous" => no_args("prev", &args, Command::Skip(Step::Previous))?,
            "select" => Command::Select(track_number("select", single("select", &args)?)?),
            "add" => {
                if args.is_empty() {
                    return Err(CliError::invalid("add", "expected at least one path"));
                }
                Command::Add(args.iter().map(PathBuf::from).collect())
            }
            "remove" | "rm" => Command::Remove(track_number("remove", single("remove", &args)?)?),
            "unselect" => no_args("unselect", &args, Command::Unselect)?,
            "list" | "ls" => no_args("list", &args, Command::List)?,
            "status" => no_args("status", &args, Command::Status)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CliError::UnknownCommand(name.to_string())),
        };
        Ok(Some(command))
    }

    /// Playback action for this command
    ///
    /// Returns `None` for commands the prompt answers itself (`list`,
    /// `status`, `help`, `quit`).
    pub fn to_action(&self, tracks: &[Track]) -> Result<Option<Action>> {
        let action = match self {
            Command::Play(None) => Action::Play(None),
            Command::Play(Some(n)) => Action::Play(Some(nth(tracks, *n)?)),
            Command::Pause => Action::Pause,
            Command::Stop => Action::Stop,
            Command::Seek(seconds) => Action::Seek(*seconds),
            Command::Volume(level) => Action::Volume(*level),
            Command::Skip(step) => Action::Skip(*step),
            Command::Select(n) => Action::SelectTrack(nth(tracks, *n)?),
            Command::Add(paths) => Action::AddTracks(paths.clone()),
            Command::Remove(n) => Action::RemoveTrack(nth(tracks, *n)?.id),
            Command::Unselect => Action::Unselect,
            Command::List | Command::Status | Command::Help | Command::Quit => return Ok(None),
        };
        Ok(Some(action))
    }
}

fn nth(tracks: &[Track], n: usize) -> Result<Track> {
    n.checked_sub(1)
        .and_then(|index| tracks.get(index))
        .cloned()
        .ok_or(CliError::NoSuchTrack(n, tracks.len()))
}

fn no_args(command: &'static str, args: &[&str], parsed: Command) -> Result<Command> {
    if args.is_empty() {
        Ok(parsed)
    } else {
        Err(CliError::invalid(command, "takes no arguments"))
    }
}

fn single<'a>(command: &'static str, args: &[&'a str]) -> Result<&'a str> {
    match args {
        [arg] => Ok(arg),
        _ => Err(CliError::invalid(command, "expected exactly one argument")),
    }
}

fn track_number(command: &'static str, arg: &str) -> Result<usize> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CliError::invalid(command, format!("`{arg}` is not a track number"))),
    }
}

/// Seconds as `90`, `90.5`, `m:ss` or `h:mm:ss`
fn seconds(arg: &str) -> Result<f64> {
    let parsed = match arg.rsplit_once(':') {
        Some((head, secs)) => {
            let minutes = match head.split_once(':') {
                Some((hours, minutes)) => hours
                    .parse::<u32>()
                    .ok()
                    .zip(minutes.parse::<u32>().ok())
                    .and_then(|(h, m)| h.checked_mul(60)?.checked_add(m)),
                None => head.parse::<u32>().ok(),
            };
            minutes
                .zip(secs.parse::<f64>().ok())
                .map(|(m, s)| f64::from(m) * 60.0 + s)
        }
        None => arg.parse::<f64>().ok(),
    };
    parsed
        .filter(|s| s.is_finite())
        .ok_or_else(|| CliError::invalid("seek", format!("`{arg}` is not a position")))
}

fn level(arg: &str) -> Result<u8> {
    match arg.parse::<u8>() {
        Ok(level) if level <= 100 => Ok(level),
        _ => Err(CliError::invalid("volume", format!("`{arg}` is not between 0 and 100"))),
    }
}
