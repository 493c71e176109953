//! Global calnotify configuration.
//!
//! Values are layered: built-in defaults, then `~/.config/calnotify/config.toml`
//! (or the file passed on the command line), then `CALNOTIFY__SECTION__KEY`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::channel::OverflowPolicy;
use crate::error::{ConfigError, ConfigResult};

static DEFAULT_DATABASE_PATH: &str = "~/.local/share/calnotify/calnotify.db";
static DEFAULT_BIND: &str = "127.0.0.1:4096";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub dispatcher: DispatcherConfig,
    pub channel: ChannelConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    /// SQLite file; `~` is expanded. `:memory:` keeps everything in RAM.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path.to_string_lossy()).into_owned())
    }

    /// Whether data is shared with other processes through a file.
    pub fn is_persistent(&self) -> bool {
        self.backend == StoreBackend::Sqlite && self.path != Path::new(":memory:")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Run the dispatcher loop inside the server process
    pub run_dispatcher: bool,
    /// Run the notifier loop inside the server process
    pub run_notifier: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: DEFAULT_BIND.to_string(),
            run_dispatcher: true,
            run_notifier: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    #[serde(with = "humantime_duration")]
    pub tick_interval: Duration,
    /// Continue from the last saved cursor instead of starting at now
    pub resume: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            tick_interval: Duration::from_secs(10),
            resume: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    /// How often an idle durable channel is polled
    #[serde(with = "humantime_duration")]
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            kind: ChannelKind::Memory,
            capacity: 1024,
            overflow: OverflowPolicy::Block,
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter; `RUST_LOG` takes precedence when set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Settings {
    pub fn config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".into()))?
            .join("calnotify");

        Ok(config_dir.join("config.toml"))
    }

    /// Load settings from `path`, or from the default location when `None`.
    /// A missing default file is created with every option commented out.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::config_path()?;
                if !path.exists() {
                    Self::create_default_config(&path)?;
                }
                path
            }
        };

        let settings: Settings = Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(
                Environment::with_prefix("CALNOTIFY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.dispatcher.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("dispatcher.tick_interval must be positive".into()));
        }
        if self.channel.capacity == 0 {
            return Err(ConfigError::Invalid("channel.capacity must be at least 1".into()));
        }
        if self.channel.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("channel.poll_interval must be positive".into()));
        }
        if self.channel.kind == ChannelKind::Sqlite && !self.database.is_persistent() {
            return Err(ConfigError::Invalid(
                "channel.kind = \"sqlite\" needs a sqlite database file".into(),
            ));
        }
        Ok(())
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> ConfigResult<()> {
        let contents = format!(
            "\
# calnotify configuration

[database]
# backend = \"sqlite\"          # or \"memory\"
# path = \"{DEFAULT_DATABASE_PATH}\"

[server]
# bind = \"{DEFAULT_BIND}\"
# run_dispatcher = true
# run_notifier = true

[dispatcher]
# tick_interval = \"10s\"
# resume = true

[channel]
# kind = \"memory\"             # \"sqlite\" to run dispatcher and notifier as separate processes
# capacity = 1024
# overflow = \"block\"          # or \"drop_oldest\", \"reject\"
# poll_interval = \"500ms\"

[log]
# level = \"info\"
# format = \"text\"             # or \"json\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;

        Ok(())
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
