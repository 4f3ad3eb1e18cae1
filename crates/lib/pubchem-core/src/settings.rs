//! Persisted proxy settings.
//!
//! The settings file is a small TOML document with a single `[proxy]` section.
//! It is created from [`DEFAULT_SETTINGS`] on first run so the daemon always
//! starts with the proxy disabled unless an operator opts in.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, warn};

use crate::transport::{ProxyScheme, TransportConfig};

pub const DEFAULT_PROXY_HOST: &str = "127.0.0.1";
pub const DEFAULT_PROXY_PORT: u16 = 9050;

/// Template written when no settings file exists.
pub const DEFAULT_SETTINGS: &str = r#"[proxy]
# Set use_proxy to true to route every PubChem request through a proxy.
# Recommended when running behind Tor. "yes"/"no"/"on"/"off" also work.
use_proxy = false

# Proxy type. Options:
#   socks5h -> SOCKS5 with hostname resolution on the proxy (recommended for Tor).
#   socks5  -> SOCKS5 with local hostname resolution.
#   http    -> HTTP proxy. With Tor this needs an HTTP tunnel configured in torrc.
#   https   -> HTTPS proxy.
proxy_type = "socks5h"

# Proxy address.
#   127.0.0.1            -> the daemon runs on the same desktop as the proxy.
#   host.docker.internal -> the daemon runs inside Docker and the proxy on the host.
host = "127.0.0.1"

# Proxy port.
#   9050 -> Tor SOCKS port.
#   8118 -> common Tor HTTP tunnel port.
# Quoted values such as "9050" are accepted.
port = 9050
"#;

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(Box<toml::de::Error>),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "settings file error: {err}"),
            Self::Parse(err) => write!(f, "settings parse error: {err}"),
            Self::InvalidSetting { name, value } => write!(f, "invalid {name} value: {value}"),
        }
    }
}

impl Error for SettingsError {}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for SettingsError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(Box::new(err))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    proxy: ProxySection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ProxySection {
    use_proxy: Flag,
    proxy_type: String,
    host: String,
    port: PortValue,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            use_proxy: Flag::Bool(false),
            proxy_type: ProxyScheme::Socks5h.as_str().to_string(),
            host: DEFAULT_PROXY_HOST.to_string(),
            port: PortValue::Number(i64::from(DEFAULT_PROXY_PORT)),
        }
    }
}

/// Boolean written as a TOML bool, `0`/`1`, or an INI-style word.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl Flag {
    fn resolve(&self, name: &'static str) -> Result<bool, SettingsError> {
        match self {
            Self::Bool(value) => Ok(*value),
            Self::Number(1) => Ok(true),
            Self::Number(0) => Ok(false),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "yes" | "true" | "on" => Ok(true),
                "0" | "no" | "false" | "off" => Ok(false),
                _ => Err(SettingsError::InvalidSetting {
                    name,
                    value: text.clone(),
                }),
            },
            Self::Number(other) => Err(SettingsError::InvalidSetting {
                name,
                value: other.to_string(),
            }),
        }
    }
}

/// Port written as a TOML integer or a quoted number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(i64),
    Text(String),
}

impl PortValue {
    fn resolve(&self) -> Result<u16, SettingsError> {
        let invalid = |value: String| SettingsError::InvalidSetting {
            name: "port",
            value,
        };
        let number = match self {
            Self::Number(number) => *number,
            Self::Text(text) => text.trim().parse().map_err(|_| invalid(text.clone()))?,
        };
        u16::try_from(number)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| invalid(number.to_string()))
    }
}

/// Reads the settings file, writing the default template first if it is missing.
///
/// # Errors
/// Returns `SettingsError` if the file cannot be created or read, is not valid
/// TOML, or carries an out-of-range port.
pub fn load_or_create(path: &Path) -> Result<TransportConfig, SettingsError> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "settings file not found; creating one with safe defaults"
        );
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_SETTINGS)?;
    }
    let text = fs::read_to_string(path)?;
    parse_settings(&text)
}

/// Parses settings text into a transport configuration.
///
/// Missing keys take their defaults. An unknown `proxy_type` is logged and
/// replaced by `socks5h`. Ports may be quoted and `use_proxy` accepts
/// `yes`/`no`/`on`/`off`/`1`/`0`. With the proxy disabled, an unusable host or
/// port is logged and replaced by its default.
///
/// # Errors
/// Returns `SettingsError` if the text is not valid TOML, `use_proxy` is not a
/// recognizable boolean, or the proxy is enabled with a blank host or a port
/// outside 1-65535.
pub fn parse_settings(text: &str) -> Result<TransportConfig, SettingsError> {
    let file: SettingsFile = toml::from_str(text)?;
    let section = file.proxy;
    let enabled = section.use_proxy.resolve("use_proxy")?;

    let scheme = section.proxy_type.parse::<ProxyScheme>().unwrap_or_else(|err| {
        error!("{err} in settings; defaulting to socks5h");
        ProxyScheme::Socks5h
    });

    let (host, port) = match proxy_endpoint(&section) {
        Ok(endpoint) => endpoint,
        Err(err) if !enabled => {
            warn!("{err} in disabled proxy settings; keeping defaults");
            (DEFAULT_PROXY_HOST.to_string(), DEFAULT_PROXY_PORT)
        }
        Err(err) => return Err(err),
    };

    Ok(TransportConfig {
        enabled,
        scheme,
        host,
        port,
    })
}

fn proxy_endpoint(section: &ProxySection) -> Result<(String, u16), SettingsError> {
    let port = section.port.resolve()?;
    let host = section.host.trim();
    if host.is_empty() {
        return Err(SettingsError::InvalidSetting {
            name: "host",
            value: section.host.clone(),
        });
    }
    Ok((host.to_string(), port))
}
