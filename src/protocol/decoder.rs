//! # Payload Decoder
//!
//! Classifies inbound text payloads and decodes video, telemetry and audio
//! bodies.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use image::DynamicImage;

use super::messages::*;
use crate::error::{Result, RoverLinkError};

/// Inbound payload after marker matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Video frame; holds the base64 body after `IMAGE:`
    Frame(&'a str),
    /// Gimbal position report
    Telemetry(TelemetryUpdate),
    /// Anything else (tolerated, not an error)
    Unrecognized,
}

/// A decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Image bytes as sent by the rover (JPEG or PNG)
    pub encoded: Bytes,
    /// Decoded pixels
    pub image: DynamicImage,
}

impl VideoFrame {
    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Classify an inbound payload by its marker
///
/// A payload starting with `angel_` whose direction is not one of
/// `up`/`down`/`left`/`right` is [`Inbound::Unrecognized`].
///
/// # Examples
///
/// ```
/// use rover_link::protocol::decoder::{classify, Inbound};
///
/// assert_eq!(classify("IMAGE:AAAA"), Inbound::Frame("AAAA"));
/// assert_eq!(classify("hello"), Inbound::Unrecognized);
/// ```
pub fn classify(text: &str) -> Inbound<'_> {
    if let Some(body) = text.strip_prefix(IMAGE_PREFIX) {
        return Inbound::Frame(body);
    }

    match parse_telemetry(text) {
        Some(update) => Inbound::Telemetry(update),
        None => Inbound::Unrecognized,
    }
}

/// Parse an `angel_<direction>:<value>` payload
///
/// The body after the marker is split at the first `:`. Without a separator
/// the whole body is used for both fields. A value that is not an integer
/// reads as 0.
///
/// # Returns
///
/// * `Option<TelemetryUpdate>` - `None` if the marker or direction is wrong
///
/// # Examples
///
/// ```
/// use rover_link::protocol::decoder::parse_telemetry;
/// use rover_link::protocol::Axis;
///
/// let update = parse_telemetry("angel_up:45").unwrap();
/// assert_eq!(update.axis(), Axis::Vertical);
/// assert_eq!(update.value, 45);
///
/// assert_eq!(parse_telemetry("angel_up:notanumber").unwrap().value, 0);
/// assert!(parse_telemetry("angel_foo:10").is_none());
/// ```
pub fn parse_telemetry(text: &str) -> Option<TelemetryUpdate> {
    let body = text.strip_prefix(TELEMETRY_PREFIX)?;
    let (direction, value) = body
        .split_once(TELEMETRY_SEPARATOR)
        .unwrap_or((body, body));

    let direction = TelemetryDirection::parse(direction)?;
    let value = value.parse::<i32>().unwrap_or(0);

    Some(TelemetryUpdate { direction, value })
}

/// Decode the base64 body of a video payload into image bytes
///
/// Surrounding whitespace (including line breaks) is ignored.
///
/// # Errors
///
/// Returns `Base64` error if the body is not valid standard base64
pub fn decode_image_payload(body: &str) -> Result<Bytes> {
    let bytes = BASE64.decode(body.trim())?;
    Ok(Bytes::from(bytes))
}

/// Decode the base64 body of a video payload into a frame
///
/// # Errors
///
/// Returns error if:
/// - The body is not valid base64
/// - The bytes are not a decodable PNG or JPEG image
pub fn decode_frame(body: &str) -> Result<VideoFrame> {
    let encoded = decode_image_payload(body)?;
    if encoded.is_empty() {
        return Err(RoverLinkError::Protocol("Empty image payload".to_string()));
    }

    let image = image::load_from_memory(&encoded)?;
    Ok(VideoFrame { encoded, image })
}

/// Decode a full `AUDIO:` payload back into PCM bytes
///
/// # Errors
///
/// Returns error if the marker is missing or the body is not valid base64
pub fn decode_audio_payload(text: &str) -> Result<Vec<u8>> {
    let body = text
        .strip_prefix(AUDIO_PREFIX)
        .ok_or_else(|| RoverLinkError::Protocol("Missing AUDIO: marker".to_string()))?;
    Ok(BASE64.decode(body.trim())?)
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Encode a small solid image in the given format
    pub fn solid_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 40, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut out, format)
            .expect("encode test image");
        out.into_inner()
    }

    /// A 1x1 PNG
    pub fn png_1x1() -> Vec<u8> {
        solid_image(1, 1, ImageFormat::Png)
    }
}
