//! State, availability and command payloads.
//!
//! State is published as plain text on `<root>/<node>/<object>/state`:
//! numbers in their shortest decimal form, text verbatim and booleans as
//! `ON`/`OFF` so switches and binary sensors share one vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Payload of the availability topic while the device is up.
pub const PAYLOAD_ONLINE: &str = "online";
/// Payload of the availability topic (and last will) while it is not.
pub const PAYLOAD_OFFLINE: &str = "offline";
pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

/// A value read from a local input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Reading {
    /// Text published on the state topic.
    pub fn to_payload(&self) -> String {
        match self {
            Reading::Bool(true) => PAYLOAD_ON.to_string(),
            Reading::Bool(false) => PAYLOAD_OFF.to_string(),
            Reading::Number(n) => format_number(*n),
            Reading::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_payload())
    }
}

impl From<bool> for Reading {
    fn from(value: bool) -> Self {
        Reading::Bool(value)
    }
}

impl From<f64> for Reading {
    fn from(value: f64) -> Self {
        Reading::Number(value)
    }
}

impl From<&str> for Reading {
    fn from(value: &str) -> Self {
        Reading::Text(value.to_string())
    }
}

impl From<String> for Reading {
    fn from(value: String) -> Self {
        Reading::Text(value)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        // Two decimals are more than any of the fitted sensors resolve.
        let s = format!("{n:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Availability of the whole device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    pub fn as_payload(self) -> &'static str {
        match self {
            Availability::Online => PAYLOAD_ONLINE,
            Availability::Offline => PAYLOAD_OFFLINE,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Availability::Online => Availability::Offline,
            Availability::Offline => Availability::Online,
        }
    }

    pub fn is_online(self) -> bool {
        self == Availability::Online
    }
}

/// An on/off command received on a switch command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    On,
    Off,
}

impl SwitchCommand {
    pub fn is_on(self) -> bool {
        self == SwitchCommand::On
    }
}

impl From<SwitchCommand> for bool {
    fn from(command: SwitchCommand) -> Self {
        command.is_on()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_payloads() {
        assert_eq!(Reading::Bool(true).to_payload(), "ON");
        assert_eq!(Reading::Bool(false).to_payload(), "OFF");
        assert_eq!(Reading::Number(21.0).to_payload(), "21");
        assert_eq!(Reading::Number(21.456).to_payload(), "21.46");
        assert_eq!(Reading::Number(-3.5).to_payload(), "-3.5");
        assert_eq!(Reading::from("2024-05-01").to_payload(), "2024-05-01");
    }

    #[test]
    fn test_reading_serializes_untagged() {
        let json = serde_json::to_string(&Reading::Number(1.5)).unwrap();
        assert_eq!(json, "1.5");
        let back: Reading = serde_json::from_str("true").unwrap();
        assert_eq!(back, Reading::Bool(true));
    }

    #[test]
    fn test_availability_toggle() {
        assert_eq!(Availability::Online.toggled(), Availability::Offline);
        assert_eq!(Availability::Offline.toggled().as_payload(), "online");
    }
}
