//! Single-threaded player loop
//!
//! Everything that touches playback runs on the thread calling
//! [`Player::run`]. Three inputs are multiplexed with `select!`: completions
//! posted by the audio output, lines read from stdin by a helper thread, and
//! the poll tick. Each becomes exactly one dispatched action.

use crate::commands::{Command, HELP};
use anyhow::bail;
use crossbeam_channel::{never, select, tick, unbounded, Receiver};
use spindle_core::{PlaybackState, TrackId};
use spindle_playback::{
    Action, ActionDispatcher, OutputSignal, PlaybackController, PlaybackError, SignalReceiver,
    Snapshot,
};
use std::cell::{Ref, RefCell};
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::thread;
use tracing::{debug, info, warn};

/// One input to the loop
#[derive(Debug)]
pub enum Event {
    /// Completion from the audio output
    Signal(OutputSignal),
    /// Line typed at the prompt
    Line(String),
    /// Poll timer fired
    Tick,
}

/// Whether the loop keeps going after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Status output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFormat {
    #[default]
    Text,
    Json,
}

/// Controller plus the dispatcher feeding it
pub struct Player {
    controller: Rc<RefCell<PlaybackController>>,
    dispatcher: ActionDispatcher,
    format: StatusFormat,
}

impl Player {
    /// Wrap `controller` and register it with a fresh dispatcher
    pub fn new(
        controller: PlaybackController,
        format: StatusFormat,
    ) -> Result<Self, PlaybackError> {
        let controller = Rc::new(RefCell::new(controller));
        controller
            .borrow_mut()
            .add_change_listener(announce_track_changes());

        let dispatcher = ActionDispatcher::new();
        dispatcher.register(Rc::clone(&controller))?;

        Ok(Self {
            controller,
            dispatcher,
            format,
        })
    }

    /// Read access to the controller between events
    pub fn controller(&self) -> Ref<'_, PlaybackController> {
        self.controller.borrow()
    }

    /// Dispatch one action
    pub fn dispatch(&self, action: Action) -> Result<(), PlaybackError> {
        self.dispatcher.dispatch(action)
    }

    /// Nothing playing and nothing about to play
    pub fn is_idle(&self) -> bool {
        let controller = self.controller.borrow();
        controller.play_state() == PlaybackState::Stopped && !controller.is_loading()
    }

    /// Handle one event, writing user-facing output to `out`
    pub fn handle(&self, event: Event, out: &mut dyn Write) -> io::Result<Flow> {
        match event {
            Event::Signal(signal) => {
                let result = self.dispatch(Action::Output(signal));
                report(result, out)?;
            }
            Event::Tick => {
                if self.controller.borrow().poll_armed() {
                    let result = self.dispatch(Action::Tick);
                    report(result, out)?;
                }
            }
            Event::Line(line) => return self.handle_line(&line, out),
        }
        Ok(Flow::Continue)
    }

    fn handle_line(&self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                writeln!(out, "error: {e}")?;
                return Ok(Flow::Continue);
            }
        };

        let action = command.to_action(self.controller.borrow().tracks());
        match action {
            Ok(Some(action)) => {
                debug!(action = action.name(), "Command");
                let result = self.dispatch(action);
                report(result, out)?;
            }
            Ok(None) => match command {
                Command::List => self.print_list(out)?,
                Command::Status => self.print_status(out)?,
                Command::Help => writeln!(out, "{HELP}")?,
                Command::Quit => return Ok(Flow::Quit),
                _ => {}
            },
            Err(e) => writeln!(out, "error: {e}")?,
        }
        Ok(Flow::Continue)
    }

    /// Print the catalog, marking the loaded (`*`) and selected (`>`) tracks
    pub fn print_list(&self, out: &mut dyn Write) -> io::Result<()> {
        let controller = self.controller.borrow();
        if controller.tracks().is_empty() {
            return writeln!(out, "(catalog is empty, use `add PATH`)");
        }

        let loaded = controller.current().map(|t| &t.id);
        let selected = controller.selected().map(|t| &t.id);
        for (index, track) in controller.tracks().iter().enumerate() {
            let marker = if Some(&track.id) == loaded {
                '*'
            } else if Some(&track.id) == selected {
                '>'
            } else {
                ' '
            };
            write!(out, "{marker} {:>3}. {}", index + 1, track.title)?;
            if !track.artist.is_empty() {
                write!(out, " - {}", track.artist)?;
            }
            if track.duration_seconds() > 0.0 {
                write!(out, " [{}]", clock_time(track.duration_seconds()))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Print the current snapshot
    pub fn print_status(&self, out: &mut dyn Write) -> io::Result<()> {
        let snapshot = self.controller.borrow().snapshot();
        match self.format {
            StatusFormat::Json => {
                serde_json::to_writer(&mut *out, &snapshot)?;
                writeln!(out)
            }
            StatusFormat::Text => writeln!(out, "{}", status_line(&snapshot)),
        }
    }

    /// Run until `quit`, or until input is closed and playback has run out
    pub fn run(
        &self,
        signals: &SignalReceiver,
        commands: Receiver<String>,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        let ticker = tick(self.controller.borrow().poll_interval());
        let mut commands = commands;
        let mut input_closed = false;

        loop {
            let event = select! {
                recv(signals) -> signal => match signal {
                    Ok(signal) => Some(Event::Signal(signal)),
                    Err(_) => bail!("audio output stopped posting signals"),
                },
                recv(commands) -> line => line.ok().map(Event::Line),
                recv(ticker) -> _ => Some(Event::Tick),
            };

            match event {
                Some(event) => {
                    if self.handle(event, out)? == Flow::Quit {
                        break;
                    }
                    out.flush()?;
                }
                None => {
                    debug!("Input closed");
                    commands = never();
                    input_closed = true;
                }
            }

            if input_closed && self.is_idle() {
                info!("Nothing left to play");
                break;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("controller", &self.controller)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Forward lines from `input` on a helper thread
///
/// The returned channel disconnects at end of input.
pub fn read_lines<R>(input: R) -> io::Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("spindle-input".to_string())
        .spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

fn report(result: Result<(), PlaybackError>, out: &mut dyn Write) -> io::Result<()> {
    if let Err(e) = result {
        warn!(error = %e, "Action failed");
        writeln!(out, "error: {e}")?;
    }
    Ok(())
}

/// Logs each track as it starts playing
fn announce_track_changes() -> impl FnMut(&Snapshot) + 'static {
    let mut announced: Option<TrackId> = None;
    move |snapshot| {
        if snapshot.state != PlaybackState::Playing {
            return;
        }
        let Some(track) = &snapshot.current else {
            return;
        };
        if announced.as_ref() != Some(&track.id) {
            info!(id = %track.id, title = %track.title, "Now playing");
            announced = Some(track.id.clone());
        }
    }
}

fn status_line(snapshot: &Snapshot) -> String {
    let title = snapshot
        .current
        .as_ref()
        .map_or("-", |track| track.title.as_str());
    format!(
        "[{}] {} {}/{} vol {}",
        snapshot.state,
        title,
        clock_time(snapshot.position),
        clock_time(snapshot.duration),
        snapshot.volume
    )
}

/// Seconds as `m:ss`, or `h:mm:ss` from an hour up
fn clock_time(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let (hours, minutes, secs) = (total / 3_600, total % 3_600 / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_time_formats_minutes() {
        assert_eq!(clock_time(0.0), "0:00");
        assert_eq!(clock_time(59.9), "0:59");
        assert_eq!(clock_time(61.0), "1:01");
        assert_eq!(clock_time(3_599.0), "59:59");
        assert_eq!(clock_time(-3.0), "0:00");
    }

    #[test]
    fn clock_time_shows_hours_for_long_tracks() {
        assert_eq!(clock_time(3_600.0), "1:00:00");
        assert_eq!(clock_time(3_725.0), "1:02:05");
        assert_eq!(clock_time(36_000.0), "10:00:00");
    }

    #[test]
    fn status_line_without_track() {
        let snapshot = Snapshot {
            state: PlaybackState::Stopped,
            current: None,
            position: 0.0,
            duration: 0.0,
            volume: 100,
        };
        assert_eq!(status_line(&snapshot), "[stopped] - 0:00/0:00 vol 100");
    }

    #[test]
    fn read_lines_forwards_until_end_of_input() {
        let rx = read_lines(io::Cursor::new("play 1\nstatus\n")).unwrap();
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, vec!["play 1".to_string(), "status".to_string()]);
    }
}
