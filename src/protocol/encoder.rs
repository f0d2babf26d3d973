//! # Payload Encoder
//!
//! Builds outbound text payloads. Image and telemetry encoders produce what
//! the rover sends and are used to exercise the decoder.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::messages::*;

/// Encode a command as its literal wire token
pub fn encode_command(command: Command) -> &'static str {
    command.token()
}

/// Encode a captured PCM chunk as an `AUDIO:` payload
///
/// Only the valid part of the capture buffer should be passed in.
///
/// # Examples
///
/// ```
/// use rover_link::protocol::encoder::encode_audio_chunk;
///
/// assert_eq!(encode_audio_chunk(&[0x01, 0x02, 0x03]), "AUDIO:AQID");
/// ```
pub fn encode_audio_chunk(pcm: &[u8]) -> String {
    let mut payload = String::with_capacity(AUDIO_PREFIX.len() + pcm.len().div_ceil(3) * 4);
    payload.push_str(AUDIO_PREFIX);
    BASE64.encode_string(pcm, &mut payload);
    payload
}

/// Encode image bytes as an `IMAGE:` payload
pub fn encode_image_payload(image: &[u8]) -> String {
    format!("{}{}", IMAGE_PREFIX, BASE64.encode(image))
}

/// Encode a gimbal report as an `angel_<direction>:<value>` payload
pub fn encode_telemetry(update: &TelemetryUpdate) -> String {
    format!(
        "{}{}{}{}",
        TELEMETRY_PREFIX,
        update.direction.as_str(),
        TELEMETRY_SEPARATOR,
        update.value
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_is_token() {
        for command in Command::ALL {
            assert_eq!(encode_command(command), command.token());
        }
    }

    #[test]
    fn test_encode_audio_chunk_prefix() {
        let payload = encode_audio_chunk(&[0u8; 32]);
        assert!(payload.starts_with("AUDIO:"));
        assert!(!payload.contains('\n'), "Payload must not be line wrapped");
    }

    #[test]
    fn test_encode_audio_chunk_long_is_unwrapped() {
        // Long enough that MIME-style encoders would insert line breaks
        let payload = encode_audio_chunk(&[0x7fu8; 1280]);
        assert!(!payload.contains('\n'));
        assert_eq!(payload.len(), AUDIO_PREFIX.len() + 1708);
    }

    #[test]
    fn test_encode_audio_chunk_empty() {
        assert_eq!(encode_audio_chunk(&[]), "AUDIO:");
    }

    #[test]
    fn test_encode_image_payload() {
        assert_eq!(encode_image_payload(b"jpg"), "IMAGE:anBn");
    }

    #[test]
    fn test_encode_telemetry() {
        let update = TelemetryUpdate {
            direction: TelemetryDirection::Right,
            value: 85,
        };
        assert_eq!(encode_telemetry(&update), "angel_right:85");
    }
}
