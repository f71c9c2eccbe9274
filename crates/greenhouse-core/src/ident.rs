//! Identifier rules shared by the config store and MQTT discovery.
//!
//! Discovery `object_id`s and `node_id`s may only contain `[a-zA-Z0-9_-]`.
//! Hostnames follow the RFC 1123 label rules the network stack enforces.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn object_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").ok()).as_ref()
}

fn hostname_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").ok())
        .as_ref()
}

/// A validated discovery identifier (`[a-zA-Z0-9_-]+`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate an identifier as-is.
    pub fn new(id: &str) -> Result<Self, IdentError> {
        if object_id_regex().is_some_and(|re| re.is_match(id)) {
            Ok(Self(id.to_string()))
        } else {
            Err(IdentError::InvalidObjectId(id.to_string()))
        }
    }

    /// Build an identifier from arbitrary text, replacing every character
    /// outside `[a-zA-Z0-9_-]` with `_`. Empty input becomes `"_"`.
    pub fn sanitize(raw: &str) -> Self {
        let mut id: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if id.is_empty() {
            id.push('_');
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ObjectId::new(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Whether `name` is usable as a network hostname.
pub fn is_valid_hostname(name: &str) -> bool {
    hostname_regex().is_some_and(|re| re.is_match(name))
}

/// Validate a hostname (a single RFC 1123 label).
pub fn check_hostname(name: &str) -> Result<&str, IdentError> {
    if is_valid_hostname(name) {
        Ok(name)
    } else {
        Err(IdentError::InvalidHostname(name.to_string()))
    }
}

/// Errors raised by identifier validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentError {
    #[error("Invalid object id: {0:?} (allowed: [a-zA-Z0-9_-])")]
    InvalidObjectId(String),
    #[error("Invalid hostname: {0:?}")]
    InvalidHostname(String),
}
