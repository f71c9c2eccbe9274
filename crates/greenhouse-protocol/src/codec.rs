//! Encoding of outbound documents and decoding of inbound commands.

use thiserror::Error;

use crate::discovery::DiscoveryConfig;
use crate::messages::SwitchCommand;

/// Errors that can occur during payload encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize payload: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// The payload is not valid UTF-8.
    #[error("Payload is not valid UTF-8")]
    NotUtf8,

    /// The payload is not a recognised switch command.
    #[error("Unknown command payload: {0}")]
    UnknownCommand(String),
}

/// Encode a discovery document for its retained config topic.
pub fn encode_discovery(config: &DiscoveryConfig) -> Result<String, CodecError> {
    serde_json::to_string(config).map_err(CodecError::from)
}

/// Decode an on/off command payload.
///
/// Accepts `ON`/`OFF` in any case, `1`/`0` and `true`/`false`.
pub fn decode_switch_command(payload: &[u8]) -> Result<SwitchCommand, CodecError> {
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::NotUtf8)?;
    match text.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(SwitchCommand::On),
        "off" | "0" | "false" => Ok(SwitchCommand::Off),
        _ => Err(CodecError::UnknownCommand(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Component, DeviceInfo, Topics};
    use greenhouse_core::ObjectId;

    #[test]
    fn test_encode_discovery() {
        let topics = Topics::new(ObjectId::new("node").unwrap(), "homeassistant");
        let doc = DiscoveryConfig::new(
            &topics,
            Component::BinarySensor,
            &ObjectId::new("tank_empty").unwrap(),
            "Tank empty",
            DeviceInfo::new("node", "Node"),
        );
        let json = encode_discovery(&doc).unwrap();
        assert!(json.contains("\"state_topic\":\"greenhouse/node/tank_empty/state\""));
        assert!(!json.contains("command_topic"));
    }

    #[test]
    fn test_decode_switch_command() {
        assert_eq!(decode_switch_command(b"ON").unwrap(), SwitchCommand::On);
        assert_eq!(decode_switch_command(b" off\n").unwrap(), SwitchCommand::Off);
        assert_eq!(decode_switch_command(b"1").unwrap(), SwitchCommand::On);
        assert_eq!(decode_switch_command(b"false").unwrap(), SwitchCommand::Off);
    }

    #[test]
    fn test_decode_rejects_unknown_payloads() {
        assert!(matches!(
            decode_switch_command(b"toggle"),
            Err(CodecError::UnknownCommand(p)) if p == "toggle"
        ));
        assert!(matches!(
            decode_switch_command(&[0xff, 0xfe]),
            Err(CodecError::NotUtf8)
        ));
    }
}
