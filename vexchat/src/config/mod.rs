//! Configuration system for the `VexChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/vexchat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use vexchat_proto::user::UserId;

use crate::controller::ControllerSettings;

/// Default model used by the Generative Language backend.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Default API root of the Generative Language backend.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    gateway: GatewayFileConfig,
    chat: ChatFileConfig,
    ui: UiFileConfig,
}

/// `[gateway]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct GatewayFileConfig {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    stream_timeout_secs: Option<u64>,
    smart_reply_window: Option<usize>,
    smart_reply_count: Option<usize>,
    event_buffer: Option<usize>,
    seed_file: Option<PathBuf>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Connection settings for the AI gateway (used by `GeminiGateway`).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API key; `None` leaves the gateway unavailable.
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// API root URL.
    pub base_url: String,
    /// Whole-request timeout for non-streaming calls.
    pub request_timeout: Duration,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Gateway --
    /// AI gateway connection settings.
    pub gateway: GatewayConfig,

    // -- Chat --
    /// Idle time after which a silent reply stream is abandoned.
    pub stream_timeout: Duration,
    /// Number of trailing messages used as smart-reply context.
    pub smart_reply_window: usize,
    /// Number of smart replies requested.
    pub smart_reply_count: usize,
    /// Buffer size for the controller event channel.
    pub event_buffer: usize,
    /// TOML file with startup conversations; `None` uses the built-in set.
    pub seed_file: Option<PathBuf>,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            stream_timeout: Duration::from_secs(30),
            smart_reply_window: 10,
            smart_reply_count: 3,
            event_buffer: 256,
            seed_file: None,
            poll_timeout: Duration::from_millis(50),
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/vexchat/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: ConfigFile) -> Self {
        let defaults = Self::default();
        let ConfigFile { gateway, chat, ui } = file;

        Self {
            gateway: GatewayConfig {
                api_key: cli.api_key.clone().or(gateway.api_key),
                model: cli
                    .model
                    .clone()
                    .or(gateway.model)
                    .unwrap_or(defaults.gateway.model),
                base_url: gateway.base_url.unwrap_or(defaults.gateway.base_url),
                request_timeout: gateway
                    .request_timeout_secs
                    .map_or(defaults.gateway.request_timeout, Duration::from_secs),
                connect_timeout: gateway
                    .connect_timeout_secs
                    .map_or(defaults.gateway.connect_timeout, Duration::from_secs),
            },
            stream_timeout: chat
                .stream_timeout_secs
                .map_or(defaults.stream_timeout, Duration::from_secs),
            smart_reply_window: chat
                .smart_reply_window
                .unwrap_or(defaults.smart_reply_window),
            smart_reply_count: chat
                .smart_reply_count
                .unwrap_or(defaults.smart_reply_count),
            event_buffer: chat.event_buffer.unwrap_or(defaults.event_buffer).max(1),
            seed_file: cli.seed_file.clone().or(chat.seed_file),
            poll_timeout: ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or(ui.timestamp_format)
                .unwrap_or(defaults.timestamp_format),
        }
    }

    /// Controller tuning derived from this configuration.
    ///
    /// `assistant` authors conversation summaries.
    #[must_use]
    pub fn to_controller_settings(&self, assistant: UserId) -> ControllerSettings {
        ControllerSettings {
            stream_timeout: self.stream_timeout,
            smart_reply_window: self.smart_reply_window,
            smart_reply_count: self.smart_reply_count,
            assistant,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal chat client with an AI assistant")]
pub struct CliArgs {
    /// API key for the Generative Language API.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name (default: `gemini-3-flash-preview`).
    #[arg(long, env = "VEXCHAT_MODEL")]
    pub model: Option<String>,

    /// Path to config file (default: `~/.config/vexchat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TOML file with startup conversations.
    #[arg(long)]
    pub seed_file: Option<PathBuf>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "VEXCHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/vexchat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit_path {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("vexchat").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
