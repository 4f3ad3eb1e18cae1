//! Outbound transport selection.
//!
//! A single [`Transport`] is built at startup from the persisted proxy settings
//! and shared read-only by every network-issuing component.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, Proxy};
use tracing::{error, info, warn};

use crate::settings::{self, DEFAULT_PROXY_HOST, DEFAULT_PROXY_PORT, SettingsError};

pub const DEFAULT_CHECK_URL: &str = "https://check.torproject.org/";
pub const TOR_CONFIRMATION: &str = "Congratulations. This browser is configured to use Tor.";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("pubchem-mcp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Socks5h,
    Socks5,
    Http,
    Https,
}

impl ProxyScheme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Socks5h => "socks5h",
            Self::Socks5 => "socks5",
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyScheme {
    type Err = TransportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "socks5h" => Ok(Self::Socks5h),
            "socks5" => Ok(Self::Socks5),
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            _ => Err(TransportError::UnsupportedScheme(value.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum TransportError {
    Settings(SettingsError),
    UnsupportedScheme(String),
    Client(reqwest::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings(err) => write!(f, "{err}"),
            Self::UnsupportedScheme(scheme) => write!(f, "unsupported proxy_type '{scheme}'"),
            Self::Client(err) => write!(f, "failed to build HTTP client: {err}"),
        }
    }
}

impl Error for TransportError {}

impl From<SettingsError> for TransportError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Client(err)
    }
}

/// Declarative proxy configuration, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub enabled: bool,
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: ProxyScheme::Socks5h,
            host: DEFAULT_PROXY_HOST.to_string(),
            port: DEFAULT_PROXY_PORT,
        }
    }
}

impl TransportConfig {
    /// Proxy URL applied to outbound requests, or `None` when proxying is off.
    #[must_use]
    pub fn proxy_url(&self) -> Option<String> {
        self.enabled
            .then(|| format!("{}://{}:{}", self.scheme, self.host, self.port))
    }

    /// Human-readable connection description used in lookup logs.
    #[must_use]
    pub fn connection_label(&self) -> String {
        self.proxy_url().map_or_else(
            || "Direct".to_string(),
            |url| format!("Proxy {} ({url})", self.scheme.as_str().to_ascii_uppercase()),
        )
    }
}

/// Settings that shape the shared HTTP client and its startup check.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub request_timeout: Duration,
    pub identity_check: IdentityCheck,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            identity_check: IdentityCheck::default(),
        }
    }
}

/// Shared HTTP client plus the configuration it was built from.
#[derive(Debug, Clone)]
pub struct Transport {
    config: TransportConfig,
    proxy: Option<String>,
    client: Client,
}

impl Transport {
    /// Builds the shared client for the given configuration.
    ///
    /// With proxying disabled the client ignores ambient proxy environment
    /// variables as well.
    ///
    /// # Errors
    /// Returns `TransportError` if the proxy URL is rejected or the client
    /// cannot be built.
    pub fn build(config: &TransportConfig, request_timeout: Duration) -> Result<Self, TransportError> {
        let proxy = config.proxy_url();
        let builder = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT);
        let builder = match proxy.as_deref() {
            Some(url) => builder.proxy(Proxy::all(url)?),
            None => builder.no_proxy(),
        };
        Ok(Self {
            config: config.clone(),
            proxy,
            client: builder.build()?,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Proxy every request issued through this transport goes through.
    #[must_use]
    pub fn effective_proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Runs the identity check when proxying is enabled.
    pub async fn verify(&self, check: &IdentityCheck) -> TransportCheck {
        if self.proxy.is_none() {
            return TransportCheck::Skipped;
        }
        check.run(&self.client).await
    }
}

/// Result of the one-time reachability and identity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCheck {
    Skipped,
    Confirmed,
    Unconfirmed,
    Failed(String),
}

/// Diagnostic request against an endpoint that reports whether traffic
/// arrived through the expected network.
#[derive(Debug, Clone)]
pub struct IdentityCheck {
    pub url: String,
    pub expected_text: String,
    pub timeout: Duration,
}

impl Default for IdentityCheck {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHECK_URL.to_string(),
            expected_text: TOR_CONFIRMATION.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl IdentityCheck {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expected_text(mut self, expected_text: impl Into<String>) -> Self {
        self.expected_text = expected_text.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self, client: &Client) -> TransportCheck {
        let response = match client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(response) => response,
            Err(err) => return TransportCheck::Failed(err.to_string()),
        };
        match response.text().await {
            Ok(body) if body.contains(&self.expected_text) => TransportCheck::Confirmed,
            Ok(_) => TransportCheck::Unconfirmed,
            Err(err) => TransportCheck::Failed(err.to_string()),
        }
    }
}

/// Loads the persisted settings, builds the shared transport and, when a proxy
/// is enabled, records the outcome of the identity check.
///
/// A failed check is logged and never prevents the transport from being used.
///
/// # Errors
/// Returns `TransportError` if the settings cannot be loaded or the client
/// cannot be built.
pub async fn configure(
    settings_path: &Path,
    options: &TransportOptions,
) -> Result<Transport, TransportError> {
    let config = settings::load_or_create(settings_path)?;
    let transport = Transport::build(&config, options.request_timeout)?;

    let Some(proxy) = transport.effective_proxy() else {
        info!("[PROXY DISABLED] using a direct connection; the real IP is visible to PubChem");
        return Ok(transport);
    };

    let tag = config.scheme.as_str().to_ascii_uppercase();
    info!("[{tag} PROXY ENABLED] routing requests through {proxy}");
    log_check(&tag, &transport.verify(&options.identity_check).await);
    Ok(transport)
}

fn log_check(tag: &str, check: &TransportCheck) {
    match check {
        TransportCheck::Skipped => {}
        TransportCheck::Confirmed => {
            info!("[{tag} PROXY CHECK] success; connection through the proxy network verified");
        }
        TransportCheck::Unconfirmed => {
            warn!(
                "[{tag} PROXY CHECK] connection succeeded but the response does not confirm the proxy network"
            );
        }
        TransportCheck::Failed(reason) => {
            error!("[{tag} PROXY CHECK] critical failure; could not connect through the proxy: {reason}");
            error!("[{tag} PROXY CHECK] ensure the proxy is running; requests will still use it");
        }
    }
}
