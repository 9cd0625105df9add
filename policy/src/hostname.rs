//! Hostname normalization and page address classification.
//!
//! DESIGN
//! ======
//! Overrides are keyed by the host component alone: lowercase, no scheme,
//! no userinfo, no port, no path. Both full page addresses and bare hosts
//! typed into the control surface go through the same parser so that
//! `https://Example.com:8443/x` and `example.com` hit the same key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address prefixes of browser-internal pages. These never receive pushes.
const PRIVILEGED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "devtools://",
    "view-source:",
    "moz-extension://",
];

/// Opaque schemes whose addresses carry no host at all.
const HOSTLESS_PREFIXES: &[&str] = &["data:", "blob:", "javascript:", "mailto:"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostnameError {
    #[error("hostname is empty")]
    Empty,
    #[error("hostname {host:?} contains invalid character {ch:?}")]
    InvalidCharacter { host: String, ch: char },
    #[error("unterminated IPv6 literal in {0:?}")]
    UnclosedBracket(String),
}

impl crate::frame::ErrorCode for HostnameError {
    fn error_code(&self) -> &'static str {
        "E_INVALID_HOSTNAME"
    }
}

/// A normalized hostname, usable as an override key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Normalize a bare host or a full address into a hostname.
    ///
    /// # Errors
    ///
    /// Returns [`HostnameError`] when no host can be extracted or the host
    /// contains characters that cannot appear in a hostname.
    pub fn parse(raw: &str) -> Result<Self, HostnameError> {
        let trimmed = raw.trim();
        // `://` only separates a scheme when it precedes any path, query or fragment.
        let path_start = trimmed.find(['/', '?', '#']).unwrap_or(trimmed.len());
        let rest = match trimmed.find("://") {
            Some(idx) if idx < path_start => &trimmed[idx + 3..],
            _ => trimmed,
        };

        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let authority = &rest[..end];
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

        let host = if host_port.starts_with('[') {
            let close = host_port
                .find(']')
                .ok_or_else(|| HostnameError::UnclosedBracket(host_port.to_owned()))?;
            &host_port[..=close]
        } else {
            host_port.split_once(':').map_or(host_port, |(host, _)| host)
        };

        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return Err(HostnameError::Empty);
        }
        validate(&host)?;
        Ok(Self(host))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(host: &str) -> Result<(), HostnameError> {
    let ipv6 = host.starts_with('[');
    let bad = host.chars().find(|ch| {
        let allowed = if ipv6 {
            ch.is_ascii_hexdigit() || matches!(ch, ':' | '.' | '[' | ']')
        } else {
            ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '_')
        };
        !allowed
    });
    match bad {
        Some(ch) => Err(HostnameError::InvalidCharacter { host: host.to_owned(), ch }),
        None => Ok(()),
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Hostname {
    type Error = HostnameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Hostname> for String {
    fn from(value: Hostname) -> Self {
        value.0
    }
}

// =============================================================================
// PAGE ADDRESS
// =============================================================================

/// What the coordinator needs to know about a loaded page's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAddress {
    /// Browser-internal page; no agent runs there and nothing is delivered.
    Privileged,
    /// Ordinary content page. `hostname` is `None` for host-less addresses
    /// such as `file:///…`, which resolve without an override.
    Content { hostname: Option<Hostname> },
}

impl PageAddress {
    #[must_use]
    pub fn classify(url: &str) -> Self {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Self::Privileged;
        }

        let lower = trimmed.to_ascii_lowercase();
        if PRIVILEGED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
            return Self::Privileged;
        }
        if HOSTLESS_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
            return Self::Content { hostname: None };
        }

        match Hostname::parse(trimmed) {
            Ok(hostname) => Self::Content { hostname: Some(hostname) },
            Err(_) => Self::Content { hostname: None },
        }
    }

    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Privileged)
    }

    #[must_use]
    pub fn hostname(&self) -> Option<&Hostname> {
        match self {
            Self::Content { hostname } => hostname.as_ref(),
            Self::Privileged => None,
        }
    }
}

#[cfg(test)]
#[path = "hostname_test.rs"]
mod tests;
