//! Process settings read from the environment.

use std::fmt::{self, Debug, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use layerctl_telemetry::LogFormat;

use crate::error::{AppError, AppResult};

/// Admin secret presented in the `x-admin-key` header.
pub const ENV_ADMIN_KEY: &str = "LAYERCTL_ADMIN_KEY";
/// Listener address.
pub const ENV_BIND_ADDR: &str = "LAYERCTL_BIND_ADDR";
/// Listener port.
pub const ENV_HTTP_PORT: &str = "LAYERCTL_HTTP_PORT";
/// Optional JSON state file; absent means in-memory only.
pub const ENV_STATE_PATH: &str = "LAYERCTL_STATE_PATH";
/// `json` or `pretty`.
pub const ENV_LOG_FORMAT: &str = "LAYERCTL_LOG_FORMAT";

/// Default listener address.
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// Default listener port.
pub const DEFAULT_HTTP_PORT: u16 = 7070;

/// Settings for a single server process.
#[derive(Clone, PartialEq, Eq)]
pub struct AppSettings {
    /// Admin secret.
    pub admin_key: String,
    /// Listener address.
    pub bind_addr: IpAddr,
    /// Listener port, never zero.
    pub http_port: u16,
    /// Location of the persisted layer document.
    pub state_path: Option<PathBuf>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Debug for AppSettings {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppSettings")
            .field("admin_key", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .field("http_port", &self.http_port)
            .field("state_path", &self.state_path)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppSettings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the admin key is missing or a value fails to parse.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns an error when the admin key is missing or a value fails to parse.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_key = lookup(ENV_ADMIN_KEY)
            .filter(|value| !value.is_empty())
            .ok_or(AppError::MissingEnv {
                name: ENV_ADMIN_KEY,
            })?;
        let bind_addr = parse_bind_addr(non_blank(lookup(ENV_BIND_ADDR)).as_deref())?;
        let http_port = parse_http_port(non_blank(lookup(ENV_HTTP_PORT)).as_deref())?;
        let state_path = non_blank(lookup(ENV_STATE_PATH)).map(PathBuf::from);
        let log_format = LogFormat::from_name(lookup(ENV_LOG_FORMAT).as_deref());

        Ok(Self {
            admin_key,
            bind_addr,
            http_port,
            state_path,
            log_format,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bind_addr(value: Option<&str>) -> AppResult<IpAddr> {
    value.map_or(Ok(DEFAULT_BIND_ADDR), |raw| {
        raw.trim().parse().map_err(|_| AppError::InvalidConfig {
            field: "bind_addr",
            reason: "not_an_ip_address",
            value: Some(raw.to_string()),
        })
    })
}

fn parse_http_port(value: Option<&str>) -> AppResult<u16> {
    let Some(raw) = value else {
        return Ok(DEFAULT_HTTP_PORT);
    };
    let port = raw
        .trim()
        .parse::<u16>()
        .map_err(|_| AppError::InvalidConfig {
            field: "http_port",
            reason: "out_of_range",
            value: Some(raw.to_string()),
        })?;
    if port == 0 {
        return Err(AppError::InvalidConfig {
            field: "http_port",
            reason: "zero",
            value: Some(raw.to_string()),
        });
    }
    Ok(port)
}
