use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Calibre library sync and cache service for TRMNL e-ink displays.
#[derive(Parser, Debug, Clone)]
#[command(name = "trmnl-calibre")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "TRMNL_CALIBRE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server overrides.
    #[command(flatten)]
    pub serve: ServeArgs,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve,

    /// Read the local Calibre library once and push it to a running server.
    Push {
        /// Calibre library directory (containing metadata.db).
        #[arg(short, long, env = "CALIBRE_PATH")]
        library: PathBuf,

        /// Base URL of the cloud service.
        #[arg(short, long, env = "CLOUD_URL")]
        url: String,

        /// Shared sync token.
        #[arg(short, long, env = "SYNC_TOKEN", hide_env_values = true)]
        token: String,

        /// Number of most recent books to send.
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Print a freshly generated random sync token.
    Token,

    /// Create a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Server overrides, usually supplied through the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to bind the server to.
    #[arg(short, long, global = true)]
    pub bind: Option<SocketAddr>,

    /// Port to listen on (keeps the bind address host).
    #[arg(short, long, env = "PORT", global = true)]
    pub port: Option<u16>,

    /// Ingestion mode.
    #[arg(long, env = "SYNC_MODE", value_enum, global = true)]
    pub mode: Option<IngestMode>,

    /// Shared secret for the push endpoint.
    #[arg(long, env = "SYNC_TOKEN", hide_env_values = true, global = true)]
    pub sync_token: Option<String>,

    /// Serve built-in fixture data instead of ingesting.
    ///
    /// Accepts the usual env spellings: `0`, `false`, `no`, `off` and an
    /// empty value disable it, anything else enables it.
    #[arg(
        long,
        env = "USE_MOCK_DATA",
        global = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true",
        value_parser = FalseyValueParser::new()
    )]
    pub use_mock_data: bool,

    /// Calibre-web base URL for pull mode.
    #[arg(long, env = "CALIBRE_BASE_URL", global = true)]
    pub calibre_base_url: Option<String>,

    /// Calibre-web library identifier.
    #[arg(long, env = "LIBRARY_ID", global = true)]
    pub library_id: Option<String>,
}

/// How library data reaches the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Periodically fetch the Calibre-web OPDS feed.
    #[default]
    Pull,
    /// Accept snapshots pushed by the local sync agent.
    Push,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Push sync configuration.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Display configuration.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        5052,
    )
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Pull from Calibre-web or accept pushes.
    #[serde(default)]
    pub mode: IngestMode,

    /// Calibre-web server URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Calibre-web library identifier.
    #[serde(default = "default_library_id")]
    pub library_id: String,

    /// Seconds between two pulls.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Seconds after which pulled data counts as stale once a refresh fails.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// Timeout for each request to Calibre-web.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Serve fixture data instead of ingesting.
    #[serde(default)]
    pub use_mock_data: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: IngestMode::default(),
            base_url: default_base_url(),
            library_id: default_library_id(),
            interval_seconds: default_interval(),
            ttl_seconds: default_ttl(),
            request_timeout_seconds: default_request_timeout(),
            use_mock_data: false,
        }
    }
}

fn default_base_url() -> String {
    "http://[::1]:8080".to_string()
}

fn default_library_id() -> String {
    "Calibre_Library".to_string()
}

fn default_interval() -> u64 {
    300
}

fn default_ttl() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    10
}

impl IngestConfig {
    /// Interval between pulls.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    /// Freshness window for pulled data.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

/// Push sync configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Shared secret expected on `/sync`.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Number of recent books returned when the client does not ask.
    #[serde(default = "default_book_limit")]
    pub default_book_limit: usize,

    /// Upper bound for a requested book limit.
    #[serde(default = "default_max_book_limit")]
    pub max_book_limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_book_limit: default_book_limit(),
            max_book_limit: default_max_book_limit(),
        }
    }
}

fn default_book_limit() -> usize {
    10
}

fn default_max_book_limit() -> usize {
    50
}

impl DisplayConfig {
    /// Clamp a requested limit to `1..=max_book_limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        let max = self.max_book_limit.max(1);
        requested
            .unwrap_or(self.default_book_limit)
            .clamp(1, max)
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("trmnl-calibre.toml"),
            dirs::config_dir()
                .map(|p| p.join("trmnl-calibre").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/trmnl-calibre/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Apply command line and environment overrides.
    pub fn apply_overrides(&mut self, args: &ServeArgs) {
        if let Some(bind) = args.bind {
            self.server.bind = bind;
        }
        if let Some(port) = args.port {
            self.server.bind.set_port(port);
        }
        if let Some(mode) = args.mode {
            self.ingest.mode = mode;
        }
        if let Some(token) = &args.sync_token {
            self.sync.token = Some(token.clone());
        }
        if args.use_mock_data {
            self.ingest.use_mock_data = true;
        }
        if let Some(url) = &args.calibre_base_url {
            self.ingest.base_url = url.clone();
        }
        if let Some(id) = &args.library_id {
            self.ingest.library_id = id.clone();
        }
    }

    /// Check that everything the selected mode needs is present.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.ingest.use_mock_data {
            return Ok(());
        }

        match self.ingest.mode {
            IngestMode::Push => {
                let has_token = self
                    .sync
                    .token
                    .as_deref()
                    .is_some_and(|t| !t.trim().is_empty());
                if !has_token {
                    return Err(crate::error::AppError::Config(
                        "push mode requires SYNC_TOKEN (or [sync] token) to be set".to_string(),
                    ));
                }
            }
            IngestMode::Pull => {
                let url = self.ingest.base_url.trim();
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(crate::error::AppError::Config(format!(
                        "pull mode requires an http(s) CALIBRE_BASE_URL, got '{}'",
                        url
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# trmnl-calibre configuration

[server]
bind = "0.0.0.0:5052"

[ingest]
# "pull" fetches the Calibre-web OPDS feed, "push" accepts POST /sync
mode = "pull"
base_url = "http://[::1]:8080"
library_id = "Calibre_Library"
# Seconds between pulls
interval_seconds = 300
# Pulled data is reported stale after this many seconds once a refresh fails
ttl_seconds = 300
request_timeout_seconds = 10
use_mock_data = false

[sync]
# Required in push mode. Generate one with: trmnl-calibre token
# token = "change-me"

[display]
default_book_limit = 10
max_book_limit = 50
"#
        .to_string()
    }
}
