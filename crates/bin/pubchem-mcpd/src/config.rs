use clap::{Parser, ValueEnum};
use pubchem_core::policy::{
    DEFAULT_MAX_ATTEMPTS,
    DEFAULT_PACING_DELAY,
    DEFAULT_RETRY_DELAY,
    PacingPolicy,
    RetryPolicy,
};
use pubchem_core::transport::{
    DEFAULT_CHECK_URL,
    DEFAULT_REQUEST_TIMEOUT,
    IdentityCheck,
    TransportOptions,
};
use pubchem_core::upstream::DEFAULT_BASE_URL;
use pubchem_mcp::server::{DEFAULT_MCP_HTTP_ADDR, HttpServeConfig, Runner};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE_NAME: &str = "config.toml";
const LOG_DIR_NAME: &str = "logs_mcp";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = DEFAULT_REQUEST_TIMEOUT.as_secs();
const DEFAULT_RETRY_DELAY_SECS: u64 = DEFAULT_RETRY_DELAY.as_secs();
#[allow(clippy::cast_possible_truncation)]
const DEFAULT_PACING_MS: u64 = DEFAULT_PACING_DELAY.as_millis() as u64;

/// How the MCP protocol is exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ServeMode {
    Stdio,
    Http,
}

#[derive(Parser, Debug)]
#[command(name = "pubchem-mcpd", version, about = "PubChem compound lookup MCP daemon.")]
struct CliArgs {
    /// Proxy settings file; defaults to `config.toml` next to the executable.
    #[arg(long, env = "PUBCHEM_SETTINGS")]
    settings: Option<PathBuf>,

    /// Log directory; defaults to `logs_mcp/` next to the executable.
    #[arg(long, env = "PUBCHEM_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, env = "PUBCHEM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "PUBCHEM_CHECK_URL", default_value = DEFAULT_CHECK_URL)]
    check_url: String,

    #[arg(
        long,
        env = "PUBCHEM_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    #[arg(long, env = "PUBCHEM_RETRY_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    retry_attempts: u32,

    #[arg(
        long,
        env = "PUBCHEM_RETRY_DELAY_SECS",
        default_value_t = DEFAULT_RETRY_DELAY_SECS
    )]
    retry_delay_secs: u64,

    #[arg(long, env = "PUBCHEM_PACING_MS", default_value_t = DEFAULT_PACING_MS)]
    pacing_ms: u64,

    #[arg(long, env = "PUBCHEM_SERVE", value_enum, default_value_t = ServeMode::Stdio)]
    serve: ServeMode,

    #[arg(long, env = "PUBCHEM_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct PubchemConfig {
    pub settings_path: PathBuf,
    pub log_dir: PathBuf,
    pub base_url: String,
    pub transport: TransportOptions,
    pub retry: RetryPolicy,
    pub pacing: PacingPolicy,
    pub runner: Runner,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl PubchemConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for PubchemConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.retry_attempts == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "PUBCHEM_RETRY_ATTEMPTS",
                value: args.retry_attempts.to_string(),
            });
        }
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "PUBCHEM_REQUEST_TIMEOUT_SECS",
                value: args.request_timeout_secs.to_string(),
            });
        }
        if args.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "PUBCHEM_BASE_URL",
                value: args.base_url,
            });
        }
        if args.check_url.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "PUBCHEM_CHECK_URL",
                value: args.check_url,
            });
        }

        let home = executable_dir();
        let settings_path = args
            .settings
            .unwrap_or_else(|| home.join(SETTINGS_FILE_NAME));
        let log_dir = args.log_dir.unwrap_or_else(|| home.join(LOG_DIR_NAME));

        let request_timeout = Duration::from_secs(args.request_timeout_secs);
        let transport = TransportOptions {
            request_timeout,
            identity_check: IdentityCheck::new(args.check_url).with_timeout(request_timeout),
        };

        Ok(Self {
            settings_path,
            log_dir,
            base_url: args.base_url,
            transport,
            retry: RetryPolicy::new(
                args.retry_attempts,
                Duration::from_secs(args.retry_delay_secs),
            ),
            pacing: PacingPolicy::new(Duration::from_millis(args.pacing_ms)),
            runner: match args.serve {
                ServeMode::Stdio => Runner::Stdio,
                ServeMode::Http => Runner::Http(HttpServeConfig::new(args.mcp_http_addr)),
            },
        })
    }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
