//! Binary frame demultiplexing
//!
//! Binary messages from the peer carry out-of-band data, currently camera
//! video. Layout: `<UTF-8 JSON header>\n<raw payload bytes>`. The header is
//! everything before the first line-feed; the payload is everything after it
//! and is passed on untouched.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::messages::ProtocolError;

/// Separator between header and payload
pub const FRAME_DELIMITER: u8 = b'\n';

/// Event tag of camera frames
pub const CAMERA_FRAME_EVENT: &str = "camera_frame";

/// Decoded frame header
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameHeader {
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A binary message split into header and payload
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

/// Split a binary message at the first line-feed and decode its header
///
/// The payload is a zero-copy slice of `raw`.
pub fn demux(raw: Bytes) -> Result<BinaryFrame, ProtocolError> {
    let split = raw
        .iter()
        .position(|b| *b == FRAME_DELIMITER)
        .ok_or(ProtocolError::MissingDelimiter)?;

    let header_text = std::str::from_utf8(&raw[..split])?;
    let header: FrameHeader = serde_json::from_str(header_text)?;
    let payload = raw.slice(split + 1..);

    Ok(BinaryFrame { header, payload })
}

impl BinaryFrame {
    pub fn is_camera_frame(&self) -> bool {
        self.header.event == CAMERA_FRAME_EVENT
    }

    /// Convert into a camera frame, or `None` for other events
    pub fn into_camera_frame(self) -> Option<CameraFrame> {
        if !self.is_camera_frame() {
            return None;
        }

        let data = self.header.data.as_ref();
        let dimension = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
        };

        Some(CameraFrame {
            format: ImageFormat::detect(&self.payload),
            width: dimension("w"),
            height: dimension("h"),
            timestamp: data.and_then(|d| d.get("ts")).and_then(Value::as_f64),
            payload: self.payload,
        })
    }
}

/// Compressed image encoding of a frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Unknown,
}

impl ImageFormat {
    const PNG_MAGIC: &'static [u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    const JPEG_MAGIC: &'static [u8] = &[0xff, 0xd8, 0xff];

    /// Sniff the format from the leading magic bytes
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(Self::PNG_MAGIC) {
            Self::Png
        } else if bytes.starts_with(Self::JPEG_MAGIC) {
            Self::Jpeg
        } else {
            Self::Unknown
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Unknown => "bin",
        }
    }
}

/// One video frame from the robot camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Encoded image bytes, exactly as received
    pub payload: Bytes,
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Peer capture time in seconds since the epoch
    pub timestamp: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(header: &str, payload: &[u8]) -> Bytes {
        let mut raw = header.as_bytes().to_vec();
        raw.push(b'\n');
        raw.extend_from_slice(payload);
        Bytes::from(raw)
    }

    #[test]
    fn test_camera_frame_payload_is_untouched() {
        let payload = [0xff, 0xd8, 0xff, 0x0a, 0x00, 0x0a];
        let frame = demux(message(r#"{"event":"camera_frame"}"#, &payload)).unwrap();
        assert!(frame.is_camera_frame());
        assert_eq!(&frame.payload[..], &payload[..]);

        let camera = frame.into_camera_frame().unwrap();
        assert_eq!(&camera.payload[..], &payload[..]);
        assert_eq!(camera.format, ImageFormat::Jpeg);
        assert_eq!(camera.width, None);
    }

    #[test]
    fn test_camera_frame_metadata() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];
        let frame = demux(message(
            r#"{"event":"camera_frame","data":{"ts":12.5,"w":320,"h":240}}"#,
            &png,
        ))
        .unwrap();
        let camera = frame.into_camera_frame().unwrap();
        assert_eq!(camera.format, ImageFormat::Png);
        assert_eq!(camera.width, Some(320));
        assert_eq!(camera.height, Some(240));
        assert_eq!(camera.timestamp, Some(12.5));
    }

    #[test]
    fn test_no_delimiter_is_rejected() {
        let err = demux(Bytes::from_static(br#"{"event":"camera_frame"}"#));
        assert!(matches!(err, Err(ProtocolError::MissingDelimiter)));
    }

    #[test]
    fn test_bad_header_is_rejected() {
        assert!(demux(message("not json", b"abc")).is_err());
        assert!(demux(message("", b"abc")).is_err());
        assert!(demux(message(r#"{"data":{}}"#, b"abc")).is_err());

        let mut raw = vec![0xc3, 0x28];
        raw.push(b'\n');
        assert!(matches!(
            demux(Bytes::from(raw)),
            Err(ProtocolError::NotUtf8(_))
        ));
    }

    #[test]
    fn test_other_events_are_not_camera_frames() {
        let frame = demux(message(r#"{"event":"audio"}"#, b"xyz")).unwrap();
        assert!(!frame.is_camera_frame());
        assert!(frame.into_camera_frame().is_none());
    }

    #[test]
    fn test_empty_payload() {
        let frame = demux(message(r#"{"event":"camera_frame"}"#, b"")).unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(ImageFormat::detect(&frame.payload), ImageFormat::Unknown);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Unknown.extension(), "bin");
    }
}
