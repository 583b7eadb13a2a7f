/// Player configuration
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use spindle_audio_desktop::SpectrumConfig;
use spindle_playback::PlaybackConfig;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "spindle.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Files added to the catalog at startup
    #[serde(default)]
    pub library: Vec<PathBuf>,

    #[serde(default)]
    pub spectrum: SpectrumConfig,
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `spindle.toml` is read when
    /// present. `SPINDLE_` variables override the file, with `__` between
    /// nesting levels (`SPINDLE_PLAYBACK__VOLUME=40`) and `library` taking a
    /// comma separated list.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SPINDLE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("library")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.playback.volume > 100 {
            return Err(CliError::Config(format!(
                "playback.volume must be 0-100, got {}",
                self.playback.volume
            )));
        }

        if self.playback.poll_interval_ms == 0 {
            return Err(CliError::Config(
                "playback.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        self.spectrum
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = CliConfig::default();
        assert_eq!(config.playback.volume, 100);
        assert_eq!(config.spectrum.fft_size, 128);
        assert!(config.library.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_from_file() {
        let file = config_file(
            r#"
library = ["/music/a.flac", "/music/b.mp3"]

[playback]
volume = 40
poll_interval_ms = 250

[spectrum]
fft_size = 256
"#,
        );

        let config = CliConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.playback.volume, 40);
        assert_eq!(config.playback.poll_interval_ms, 250);
        assert_eq!(config.spectrum.fft_size, 256);
        assert_eq!(
            config.library,
            vec![PathBuf::from("/music/a.flac"), PathBuf::from("/music/b.mp3")]
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = config_file("[playback]\nvolume = 70\n");

        let config = CliConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.playback.volume, 70);
        assert_eq!(config.playback.poll_interval_ms, 1000);
        assert_eq!(config.spectrum, SpectrumConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn rejects_loud_volume() {
        let mut config = CliConfig::default();
        config.playback.volume = 150;
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let mut config = CliConfig::default();
        config.playback.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn rejects_bad_fft_size() {
        let mut config = CliConfig::default();
        config.spectrum.fft_size = 100;
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }
}
