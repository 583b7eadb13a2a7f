/// Spindle - terminal music player
use anyhow::Context;
use clap::{Parser, Subcommand};
use spindle_audio_desktop::{decode::decode_bytes, CpalOutput};
use spindle_core::MemoryCatalog;
use spindle_cli::{read_lines, CliConfig, Player, StatusFormat};
use spindle_playback::{signal_channel, Action, PlaybackController, PlaybackEngine, SystemClock};
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spindle")]
#[command(about = "Spindle terminal music player", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./spindle.toml when present)
    #[arg(short, long, env = "SPINDLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the player and read commands from stdin (default)
    Play {
        /// Audio files added to the catalog after the configured library
        files: Vec<PathBuf>,

        /// Start playing the first track right away
        #[arg(short, long)]
        autoplay: bool,

        /// Initial volume (0-100), overriding the configuration
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: Option<u8>,

        /// Print `status` as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a file and print its format
    Probe {
        /// Audio file to decode
        file: PathBuf,

        /// Resample to this rate (Hz)
        #[arg(long)]
        rate: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spindle=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Play {
        files: Vec::new(),
        autoplay: false,
        volume: None,
        json: false,
    }) {
        Commands::Play {
            files,
            autoplay,
            volume,
            json,
        } => {
            if let Some(volume) = volume {
                config.playback.volume = volume;
            }
            config.validate()?;
            let format = if json {
                StatusFormat::Json
            } else {
                StatusFormat::Text
            };
            play(&config, files, autoplay, format)?;
        }
        Commands::Probe { file, rate } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let buffer = decode_bytes(bytes, rate)?;
            let format = buffer.format();
            println!(
                "{}: {} Hz, {} channel(s), {} frames, {:.2}s",
                file.display(),
                format.sample_rate.as_hz(),
                format.channels,
                buffer.frames(),
                buffer.duration_secs()
            );
        }
    }

    Ok(())
}

fn play(
    config: &CliConfig,
    files: Vec<PathBuf>,
    autoplay: bool,
    format: StatusFormat,
) -> anyhow::Result<()> {
    let (signals_tx, signals) = signal_channel();
    let output = CpalOutput::with_spectrum(signals_tx, &config.spectrum)
        .context("opening the audio output")?;
    tracing::info!(
        sample_rate = output.sample_rate(),
        channels = output.channels(),
        "Audio output ready"
    );

    let engine = PlaybackEngine::new(
        Box::new(output),
        Box::new(SystemClock::new()),
        &config.playback,
    )?;
    let controller = PlaybackController::new(
        engine,
        Box::new(MemoryCatalog::new()),
        &config.playback,
    );
    let player = Player::new(controller, format)?;

    player.dispatch(Action::InitCatalog)?;
    let paths: Vec<PathBuf> = config.library.iter().cloned().chain(files).collect();
    if !paths.is_empty() {
        // Unreadable entries are logged; the rest stay playable
        if let Err(e) = player.dispatch(Action::AddTracks(paths)) {
            tracing::warn!(error = %e, "Some tracks could not be added");
        }
    }
    if autoplay {
        player.dispatch(Action::Play(None))?;
    }

    println!("Type `help` for commands.");
    let commands = read_lines(BufReader::new(io::stdin()))?;
    let mut stdout = io::stdout();
    player.run(&signals, commands, &mut stdout)
}
