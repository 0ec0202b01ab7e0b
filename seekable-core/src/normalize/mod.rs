//! Portable schema for container metadata and packets.
//!
//! Every time exposed here is in seconds. Payloads are owned copies with no
//! ties to engine buffers.

pub mod codec_string;
pub mod metadata;
pub mod packet;

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;

pub use codec_string::{CODEC_STRING_UNDEFINED, GENERIC_MIME_TYPE, audio_codec_string, audio_mime_type};
pub use metadata::{describe, describe_stream};
pub use packet::normalize_packet;

use crate::engine::{MediaType, NOPTS_VALUE, Rational};

/// Container-level description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub format_name: String,
    pub start_time: f64,
    pub duration: f64,
    /// Decimal string so values beyond 53 bits survive JSON hosts.
    pub bit_rate: String,
    pub nb_streams: usize,
    pub nb_chapters: u32,
    pub flags: i32,
    /// Indexed by stream index.
    pub streams: Vec<StreamDescriptor>,
}

impl MediaInfo {
    /// First stream of the given media type.
    pub fn first_stream_of(&self, media_type: MediaType) -> Option<&StreamDescriptor> {
        self.streams
            .iter()
            .find(|stream| stream.codec_type == media_type.code())
    }
}

/// Description of one elementary stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDescriptor {
    pub index: usize,
    pub id: i32,
    /// Numeric media type, -1 when unknown.
    pub codec_type: i32,
    pub codec_type_string: String,
    pub codec_name: String,
    /// RFC 6381 style codecs parameter; `"undf"` for non-audio streams.
    pub codec_string: String,
    pub profile: String,
    pub level: i32,
    pub bit_rate: String,
    #[serde(skip)]
    pub extradata: Bytes,
    pub extradata_size: usize,
    /// Audio only, 0 otherwise.
    pub channels: u32,
    /// Audio only, 0 otherwise.
    pub sample_rate: u32,
    /// Audio only, empty otherwise.
    pub sample_format: String,
    /// Audio only, empty otherwise.
    pub mime_type: String,
    pub start_time: f64,
    pub duration: f64,
    pub nb_frames: i64,
    pub tags: BTreeMap<String, String>,
}

/// One demuxed packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub stream_index: usize,
    pub keyframe: bool,
    pub timestamp: f64,
    pub duration: f64,
    pub size: usize,
    #[serde(skip)]
    pub data: Bytes,
}

/// Metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl StreamDescriptor {
    /// Tags as key/value entries in key order.
    pub fn tag_list(&self) -> Vec<Tag> {
        self.tags
            .iter()
            .map(|(key, value)| Tag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

/// Converts a time-base value to seconds. Unset timestamps become 0.
pub(crate) fn to_seconds(value: i64, time_base: Rational) -> f64 {
    if value == NOPTS_VALUE || time_base.den == 0 {
        0.0
    } else {
        // Multiplying first keeps whole-second timestamps exact
        value as f64 * f64::from(time_base.num) / f64::from(time_base.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_seconds() {
        assert_eq!(to_seconds(44100, Rational::new(1, 44100)), 1.0);
        assert_eq!(to_seconds(NOPTS_VALUE, Rational::new(1, 90000)), 0.0);
        assert_eq!(to_seconds(5, Rational::new(0, 0)), 0.0);
    }

    #[test]
    fn test_packet_json_omits_payload() {
        let packet = Packet {
            stream_index: 1,
            keyframe: true,
            timestamp: 0.5,
            duration: 0.02,
            size: 3,
            data: Bytes::from_static(&[1, 2, 3]),
        };
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["stream_index"], 1);
        assert_eq!(json["size"], 3);
        assert!(json.get("data").is_none());
    }
}
