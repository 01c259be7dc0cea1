use crate::{
    renderer::TextStyle,
    source::{ClockFormats, FormatProfile},
    spotify::Credentials,
};
use log::LevelFilter;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

const APP_DIR: &str = "pidash";
const PLACEHOLDER_PREFIX: &str = "YOUR_";
/// One refresh a day is the slowest that makes sense for a clock
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub display: DisplayConfig,
    pub clock: ClockConfig,
    pub log: LogConfig,
}

/// Spotify application credentials, as registered on the developer dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Defaults to `<cache dir>/pidash/token.json`
    pub token_cache: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Dashboard window size in terminal cells
    pub width: u16,
    pub height: u16,
    pub interval_secs: u64,
    pub window_title: String,
    pub default_cover: Option<PathBuf>,
    /// Where the cover being shown is downloaded. Defaults to `<cache dir>/pidash/covers`
    pub cover_cache: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub profile: FormatProfile,
    /// Replaces the profile's format strings when set
    pub formats: Option<ClockFormats>,
    pub style: TextStyle,
    pub title: String,
    pub box_width: Option<usize>,
    pub center: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Defaults to `<cache dir>/pidash/pidash.log`
    pub file: Option<PathBuf>,
    pub level: String,
    /// The log file is rotated once it grows past this size
    pub max_size_bytes: u64,
    /// Rotated files kept next to the log file
    pub keep_files: u32,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        SpotifyConfig {
            client_id: "YOUR_CLIENT_ID".to_string(),
            client_secret: "YOUR_CLIENT_SECRET".to_string(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
            token_cache: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 60,
            height: 20,
            interval_secs: 1,
            window_title: "Spotify TFT Player".to_string(),
            default_cover: Some(PathBuf::from("assets/default_cover.png")),
            cover_cache: None,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            profile: FormatProfile::default(),
            formats: None,
            style: TextStyle::default(),
            title: "RASPBERRY PI CLOCK".to_string(),
            box_width: None,
            center: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            file: None,
            level: "info".to_string(),
            max_size_bytes: 1024 * 1024,
            keep_files: 3,
        }
    }
}

impl Config {
    /// Reads `path`, or the first config file found in the usual places, or falls back to
    /// defaults when there is none. An explicit path that doesn't exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };
        match path {
            Some(path) => Config::from_file(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Config, ConfigError> {
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    /// Lets `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET` and `SPOTIFY_REDIRECT_URI` override the
    /// file. `lookup` is normally `std::env::var`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides = [
            ("SPOTIFY_CLIENT_ID", &mut self.spotify.client_id),
            ("SPOTIFY_CLIENT_SECRET", &mut self.spotify.client_secret),
            ("SPOTIFY_REDIRECT_URI", &mut self.spotify.redirect_uri),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key).filter(|value| !value.is_empty()) {
                *field = value;
            }
        }
    }

    /// Checks everything every command needs. Spotify credentials are only checked by the
    /// commands that talk to Spotify, see [`SpotifyConfig::credentials`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_INTERVAL_SECS).contains(&self.display.interval_secs) {
            return Err(ConfigError::Validation(format!(
                "display.interval_secs must be between 1 and {MAX_INTERVAL_SECS}, got {}",
                self.display.interval_secs
            )));
        }
        if self.display.width < 10 || self.display.height < 5 {
            return Err(ConfigError::Validation(format!(
                "display geometry {}x{} is too small (minimum 10x5)",
                self.display.width, self.display.height
            )));
        }
        if self.log.max_size_bytes == 0 || self.log.keep_files == 0 {
            return Err(ConfigError::Validation(
                "log.max_size_bytes and log.keep_files must be at least 1".to_string(),
            ));
        }
        self.clock
            .formats()
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        self.log.level_filter()?;
        Ok(())
    }
}

impl SpotifyConfig {
    /// The credentials, refusing the placeholders shipped in the default config
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() || value.starts_with(PLACEHOLDER_PREFIX) {
                return Err(ConfigError::Validation(format!(
                    "spotify.{name} is not set; add your Spotify app credentials to the config \
                     file or the SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET environment variables"
                )));
            }
        }
        Url::parse(&self.redirect_uri).map_err(|err| {
            ConfigError::Validation(format!(
                "spotify.redirect_uri {:?} is not a valid URL: {err}",
                self.redirect_uri
            ))
        })?;

        Ok(Credentials {
            client_id: self.client_id.trim().to_string(),
            client_secret: self.client_secret.trim().to_string(),
            redirect_uri: self.redirect_uri.clone(),
        })
    }

    pub fn token_cache_path(&self) -> PathBuf {
        self.token_cache
            .clone()
            .unwrap_or_else(|| app_cache_dir().join("token.json"))
    }
}

impl DisplayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cover_cache_dir(&self) -> PathBuf {
        self.cover_cache
            .clone()
            .unwrap_or_else(|| app_cache_dir().join("covers"))
    }
}

impl ClockConfig {
    pub fn formats(&self) -> ClockFormats {
        self.formats
            .clone()
            .unwrap_or_else(|| self.profile.formats())
    }
}

impl LogConfig {
    pub fn file_path(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| app_cache_dir().join("pidash.log"))
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level).map_err(|_| {
            ConfigError::Validation(format!("unknown log level {:?}", self.level))
        })
    }
}

/// `~/.config/pidash/config.yaml`, then `./pidash.yaml`
fn find_config_file() -> Option<PathBuf> {
    dirs_next::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.yaml"))
        .into_iter()
        .chain(Some(PathBuf::from("pidash.yaml")))
        .find(|path| path.exists())
}

fn app_cache_dir() -> PathBuf {
    dirs_next::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
