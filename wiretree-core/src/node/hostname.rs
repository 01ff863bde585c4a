//! Endpoint descriptions (`host[:port]`).

use std::fmt;
use std::str::FromStr;

use url::{Host, Url};

use crate::error::HostnameError;

/// Sender or receiver of a captured message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hostname {
    host: String,
    port: Option<u16>,
}

impl Hostname {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Parse an optional endpoint: blank input yields `None`.
    pub fn parse_optional(value: &str) -> Result<Option<Self>, HostnameError> {
        if value.trim().is_empty() {
            return Ok(None);
        }
        value.parse().map(Some)
    }

    /// Derive the endpoint from a URL, using the scheme's default port for
    /// http and https.
    pub fn from_url(url: &str) -> Result<Self, HostnameError> {
        let parsed = Url::parse(url).map_err(|e| HostnameError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| HostnameError::InvalidUrl {
                url: url.to_string(),
                reason: "no host".to_string(),
            })?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = match (parsed.port(), parsed.scheme()) {
            (Some(port), _) => port,
            (None, "http") => 80,
            (None, "https") => 443,
            _ => {
                return Err(HostnameError::UnknownPort {
                    url: url.to_string(),
                })
            }
        };
        Ok(Self::new(host, Some(port)))
    }
}

fn validate_host(host: &str) -> Result<(), HostnameError> {
    let invalid = || HostnameError::InvalidHost {
        value: host.to_string(),
    };
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let candidate = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    Host::parse(&candidate).map(|_| ()).map_err(|_| invalid())
}

fn parse_port(value: &str) -> Result<u16, HostnameError> {
    value.parse().map_err(|_| HostnameError::InvalidPort {
        value: value.to_string(),
    })
}

impl FromStr for Hostname {
    type Err = HostnameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(HostnameError::Blank);
        }

        // [v6]:port
        if let Some(rest) = value.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| HostnameError::InvalidHost {
                value: value.to_string(),
            })?;
            validate_host(host)?;
            let port = match tail.strip_prefix(':') {
                Some(port) => Some(parse_port(port)?),
                None if tail.is_empty() => None,
                None => {
                    return Err(HostnameError::InvalidHost {
                        value: value.to_string(),
                    })
                }
            };
            return Ok(Self::new(host, port));
        }

        match value.matches(':').count() {
            0 => {
                validate_host(value)?;
                Ok(Self::new(value, None))
            }
            1 => {
                let (host, port) = value.split_once(':').unwrap_or((value, ""));
                validate_host(host)?;
                Ok(Self::new(host, Some(parse_port(port)?)))
            }
            // bare IPv6 address
            _ => {
                validate_host(value)?;
                Ok(Self::new(value, None))
            }
        }
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host: &str = &self.host;
        match (self.port, host.contains(':')) {
            (Some(port), true) => write!(f, "[{host}]:{port}"),
            (Some(port), false) => write!(f, "{host}:{port}"),
            (None, _) => f.write_str(host),
        }
    }
}
