//! Daemon configuration.
//!
//! Read once at startup from flags and environment, then passed around as an
//! immutable [`Config`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rbd_common::paths::{DEFAULT_MKFS_DIR, DEFAULT_RBD_PATH};
use rbd_common::{BrokerError, BrokerResult, ToolPaths};
use subtle::ConstantTimeEq;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on (overrides --port)
    #[arg(long, env = "RBD_BROKER_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// HTTP port to listen on all interfaces
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Username accepted by basic authentication
    #[arg(long, env = "CEPH_BROKER_USER")]
    pub user: String,

    /// Password accepted by basic authentication
    #[arg(long, env = "CEPH_BROKER_PASS", hide_env_values = true)]
    pub pass: String,

    /// Path of the rbd tool
    #[arg(long, env = "RBD_PATH", default_value = DEFAULT_RBD_PATH)]
    pub rbd_path: PathBuf,

    /// Directory holding mkfs.<filesystem> formatters
    #[arg(long, env = "MKFS_DIR", default_value = DEFAULT_MKFS_DIR)]
    pub mkfs_dir: PathBuf,

    /// Upper bound in seconds on a single external command
    #[arg(long, env = "RBD_COMMAND_TIMEOUT_SECS", default_value_t = 300)]
    pub command_timeout_secs: u64,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Basic authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    pass: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// The accepted username.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Whether a presented username and password match.
    ///
    /// Both comparisons run in constant time and are always evaluated.
    #[must_use]
    pub fn matches(&self, user: &str, pass: &str) -> bool {
        let user_ok = self.user.as_bytes().ct_eq(user.as_bytes());
        let pass_ok = self.pass.as_bytes().ct_eq(pass.as_bytes());
        (user_ok & pass_ok).into()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address.
    pub listen: SocketAddr,
    /// Basic authentication credentials.
    pub credentials: Credentials,
    /// External tool locations.
    pub paths: ToolPaths,
    /// Per-command timeout.
    pub command_timeout: Duration,
}

impl Config {
    /// Validate arguments into a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Config`] for empty credentials or a zero timeout.
    pub fn from_args(args: Args) -> BrokerResult<Self> {
        if args.user.is_empty() || args.pass.is_empty() {
            return Err(BrokerError::Config {
                message: "broker username and password must not be empty".to_string(),
            });
        }
        if args.command_timeout_secs == 0 {
            return Err(BrokerError::Config {
                message: "command timeout must be at least one second".to_string(),
            });
        }

        let listen = args
            .listen
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], args.port)));

        Ok(Self {
            listen,
            credentials: Credentials::new(args.user, args.pass),
            paths: ToolPaths::new()
                .with_rbd(args.rbd_path)
                .with_mkfs_dir(args.mkfs_dir),
            command_timeout: Duration::from_secs(args.command_timeout_secs),
        })
    }
}
