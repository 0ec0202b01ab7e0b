//! Contract between the bridge and a container demuxing engine.
//!
//! The engine is a pull-based parser: it asks for bytes, parses, and hands
//! back packets one at a time. Every byte it consumes comes through the
//! [`ByteSourceAdapter`] passed into each call, so the only suspension points
//! inside an engine call are the adapter's awaits.
//!
//! Timestamps inside the engine are integers in each stream's rational time
//! base. Container-level times use the canonical micro-time-base
//! [`TIME_BASE_Q`]. Nothing in this module converts to seconds; that is the
//! normalizers' job.

pub mod codec;
pub mod probe;
pub mod format_reader;

use std::cmp::Reverse;
use std::ops::BitOr;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use codec::{CodecDescriptor, CodecId, LEVEL_UNKNOWN, PROFILE_UNKNOWN, SampleFormat};
pub use probe::{default_engines, select_engine};
pub use format_reader::SymphoniaEngine;

use crate::io::{ByteSourceAdapter, IoError};

/// Marker for "no timestamp".
pub const NOPTS_VALUE: i64 = i64::MIN;

/// Units per second of the canonical container time base.
pub const TIME_BASE: i64 = 1_000_000;

/// Canonical container time base (microseconds).
pub const TIME_BASE_Q: Rational = Rational::new(1, TIME_BASE as i32);

/// Rational number used for time bases and frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Value as a real number; a zero denominator yields 0.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }
}

/// Rescales `value` from time base `from` to time base `to`, rounding to the
/// nearest integer with halves away from zero.
pub fn rescale_q(value: i64, from: Rational, to: Rational) -> i64 {
    let num = i128::from(value) * i128::from(from.num) * i128::from(to.den);
    let den = i128::from(from.den) * i128::from(to.num);
    if den == 0 {
        return 0;
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    rounded.clamp(i128::from(i64::MIN) + 1, i128::from(i64::MAX)) as i64
}

/// Kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Unknown,
    Video,
    Audio,
    Data,
    Subtitle,
    Attachment,
}

impl MediaType {
    /// Stable numeric code shared with hosts (-1 for unknown).
    pub fn code(self) -> i32 {
        match self {
            MediaType::Unknown => -1,
            MediaType::Video => 0,
            MediaType::Audio => 1,
            MediaType::Data => 2,
            MediaType::Subtitle => 3,
            MediaType::Attachment => 4,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => MediaType::Video,
            1 => MediaType::Audio,
            2 => MediaType::Data,
            3 => MediaType::Subtitle,
            4 => MediaType::Attachment,
            _ => MediaType::Unknown,
        }
    }

    /// Lowercase name, `None` for [`MediaType::Unknown`].
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            MediaType::Unknown => None,
            MediaType::Video => Some("video"),
            MediaType::Audio => Some("audio"),
            MediaType::Data => Some("data"),
            MediaType::Subtitle => Some("subtitle"),
            MediaType::Attachment => Some("attachment"),
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "data" => Ok(MediaType::Data),
            "subtitle" => Ok(MediaType::Subtitle),
            "attachment" => Ok(MediaType::Attachment),
            _ => Err(format!("Invalid media type: {s}")),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().unwrap_or("unknown"))
    }
}

/// Seek behaviour flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeekFlags(u32);

impl SeekFlags {
    pub const NONE: SeekFlags = SeekFlags(0);
    /// Land on the closest keyframe at or before the target.
    pub const BACKWARD: SeekFlags = SeekFlags(1);
    /// Target is a byte offset rather than a timestamp.
    pub const BYTE: SeekFlags = SeekFlags(2);
    /// Non-keyframes are acceptable landing points.
    pub const ANY: SeekFlags = SeekFlags(4);
    /// Target is a frame number.
    pub const FRAME: SeekFlags = SeekFlags(8);

    /// Builds flags from raw bits, dropping unknown ones.
    pub const fn from_bits(bits: u32) -> Self {
        SeekFlags(bits & 0xf)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: SeekFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SeekFlags {
    type Output = SeekFlags;

    fn bitor(self, rhs: SeekFlags) -> SeekFlags {
        SeekFlags(self.0 | rhs.0)
    }
}

/// Engine-side description of one elementary stream.
#[derive(Debug, Clone)]
pub struct EngineStream {
    pub index: usize,
    pub id: i32,
    pub media_type: MediaType,
    pub codec_id: CodecId,
    pub profile: i32,
    pub level: i32,
    pub bit_rate: i64,
    /// Codec initialization data.
    pub extradata: Vec<u8>,
    pub channels: u32,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub time_base: Rational,
    /// In `time_base` units, or [`NOPTS_VALUE`].
    pub start_time: i64,
    /// In `time_base` units, or [`NOPTS_VALUE`] when unknown.
    pub duration: i64,
    /// Frame count, 0 when the container does not say.
    pub nb_frames: i64,
    pub avg_frame_rate: Rational,
    /// Marked as the default track by the container.
    pub is_default: bool,
    /// Metadata entries in container order.
    pub metadata: Vec<(String, String)>,
}

impl EngineStream {
    pub fn new(index: usize, media_type: MediaType, codec_id: CodecId, time_base: Rational) -> Self {
        Self {
            index,
            id: 0,
            media_type,
            codec_id,
            profile: PROFILE_UNKNOWN,
            level: LEVEL_UNKNOWN,
            bit_rate: 0,
            extradata: Vec::new(),
            channels: 0,
            sample_rate: 0,
            sample_format: SampleFormat::None,
            time_base,
            start_time: NOPTS_VALUE,
            duration: NOPTS_VALUE,
            nb_frames: 0,
            avg_frame_rate: Rational::default(),
            is_default: false,
            metadata: Vec::new(),
        }
    }
}

/// Engine-side description of the whole container.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    pub format_name: String,
    /// In [`TIME_BASE_Q`] units, or [`NOPTS_VALUE`].
    pub start_time: i64,
    /// In [`TIME_BASE_Q`] units, or [`NOPTS_VALUE`] when unknown.
    pub duration: i64,
    pub bit_rate: i64,
    pub nb_chapters: u32,
    pub flags: i32,
    /// Indexed by stream index.
    pub streams: Vec<EngineStream>,
}

/// Reusable packet scratch space filled by [`Demuxer::read_frame`].
///
/// The payload belongs to the engine and is overwritten by the next read;
/// anything that must outlive the next engine call has to be copied out.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub stream_index: usize,
    /// In the stream's time base, or [`NOPTS_VALUE`].
    pub pts: i64,
    /// In the stream's time base, or [`NOPTS_VALUE`].
    pub dts: i64,
    pub duration: i64,
    pub keyframe: bool,
    pub data: Vec<u8>,
}

impl RawPacket {
    pub fn new() -> Self {
        Self {
            stream_index: 0,
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            keyframe: false,
            data: Vec::new(),
        }
    }

    /// Resets every field, keeping the payload allocation for reuse.
    pub fn unref(&mut self) {
        self.stream_index = 0;
        self.pts = NOPTS_VALUE;
        self.dts = NOPTS_VALUE;
        self.duration = 0;
        self.keyframe = false;
        self.data.clear();
    }
}

impl Default for RawPacket {
    fn default() -> Self {
        Self::new()
    }
}

/// Failures raised inside an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading from the byte source failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// The container is malformed.
    #[error("invalid data: {reason}")]
    InvalidData { reason: String },

    /// The container uses a feature this engine does not handle.
    #[error("unsupported: {reason}")]
    Unsupported { reason: String },

    /// The seek target could not be reached.
    #[error("seek failed: {reason}")]
    Seek { reason: String },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A container format the bridge can open.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Short format name, also reported as `MediaInfo::format_name`.
    fn name(&self) -> &'static str;

    /// Scores how likely `header` belongs to this format; 0 means "not mine",
    /// 100 means certain.
    fn probe(&self, header: &[u8]) -> u8;

    /// Parses the container header, positioned at offset 0.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidData` - Header is malformed
    /// - `EngineError::Unsupported` - Header uses unsupported features
    /// - `EngineError::Io` - The byte source failed
    async fn open(&self, io: &mut ByteSourceAdapter) -> EngineResult<Box<dyn Demuxer>>;
}

/// An opened container.
#[async_trait]
pub trait Demuxer: Send {
    fn format(&self) -> &FormatContext;

    /// Reads as much as needed to complete stream descriptions.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidData` - Stream data is malformed
    /// - `EngineError::Io` - The byte source failed
    async fn find_stream_info(&mut self, io: &mut ByteSourceAdapter) -> EngineResult<()>;

    /// Fills `packet` with the next packet in decode order. Returns `false`
    /// on clean exhaustion.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidData` - Packet data is malformed
    /// - `EngineError::Io` - The byte source failed
    async fn read_frame(
        &mut self,
        io: &mut ByteSourceAdapter,
        packet: &mut RawPacket,
    ) -> EngineResult<bool>;

    /// Repositions so the next read returns packets around `timestamp`
    /// (in the time base of `stream_index`).
    ///
    /// # Errors
    ///
    /// - `EngineError::Seek` - Target unreachable or rejected by the source
    async fn seek_frame(
        &mut self,
        io: &mut ByteSourceAdapter,
        stream_index: usize,
        timestamp: i64,
        flags: SeekFlags,
    ) -> EngineResult<()>;

    /// Picks the stream of `media_type` best suited for playback.
    fn find_best_stream(&self, media_type: MediaType, wanted: Option<usize>) -> Option<usize> {
        best_stream(self.format(), media_type, wanted)
    }
}

/// Default stream choice: an explicitly wanted stream if it has the right
/// type, otherwise the default-disposition stream, then the highest bit
/// rate, then the lowest index.
pub fn best_stream(
    format: &FormatContext,
    media_type: MediaType,
    wanted: Option<usize>,
) -> Option<usize> {
    format
        .streams
        .iter()
        .filter(|stream| stream.media_type == media_type)
        .filter(|stream| wanted.is_none_or(|wanted| stream.index == wanted))
        .max_by_key(|stream| (stream.is_default, stream.bit_rate, Reverse(stream.index)))
        .map(|stream| stream.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: usize, media_type: MediaType, bit_rate: i64) -> EngineStream {
        let mut stream = EngineStream::new(index, media_type, CodecId::None, Rational::new(1, 1000));
        stream.bit_rate = bit_rate;
        stream
    }

    #[test]
    fn test_rescale_q_rounds_to_nearest() {
        // 5 seconds in microseconds into a 1/44100 time base
        assert_eq!(rescale_q(5_000_000, TIME_BASE_Q, Rational::new(1, 44100)), 220_500);
        // 1/3 of a 1/90000 tick rounds down, 2/3 rounds up
        assert_eq!(rescale_q(1, Rational::new(1, 270_000), Rational::new(1, 90_000)), 0);
        assert_eq!(rescale_q(2, Rational::new(1, 270_000), Rational::new(1, 90_000)), 1);
        assert_eq!(rescale_q(-2, Rational::new(1, 270_000), Rational::new(1, 90_000)), -1);
        assert_eq!(rescale_q(10, TIME_BASE_Q, Rational::new(0, 1)), 0);
    }

    #[test]
    fn test_rational_to_f64() {
        assert_eq!(Rational::new(1, 4).to_f64(), 0.25);
        assert_eq!(Rational::new(1, 0).to_f64(), 0.0);
    }

    #[test]
    fn test_media_type_codes_round_trip() {
        for media_type in [
            MediaType::Unknown,
            MediaType::Video,
            MediaType::Audio,
            MediaType::Data,
            MediaType::Subtitle,
            MediaType::Attachment,
        ] {
            assert_eq!(MediaType::from_code(media_type.code()), media_type);
        }
        assert_eq!(MediaType::Audio.code(), 1);
        assert_eq!(MediaType::Unknown.as_str(), None);
        assert_eq!("Audio".parse::<MediaType>().unwrap(), MediaType::Audio);
        assert!("sound".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_seek_flags() {
        let flags = SeekFlags::BACKWARD | SeekFlags::ANY;
        assert!(flags.contains(SeekFlags::BACKWARD));
        assert!(!flags.contains(SeekFlags::BYTE));
        assert_eq!(SeekFlags::from_bits(0xff).bits(), 0xf);
    }

    #[test]
    fn test_best_stream_selection() {
        let mut format = FormatContext {
            streams: vec![
                stream(0, MediaType::Video, 1_000_000),
                stream(1, MediaType::Audio, 64_000),
                stream(2, MediaType::Audio, 128_000),
            ],
            ..Default::default()
        };

        assert_eq!(best_stream(&format, MediaType::Audio, None), Some(2));
        assert_eq!(best_stream(&format, MediaType::Audio, Some(1)), Some(1));
        assert_eq!(best_stream(&format, MediaType::Audio, Some(0)), None);
        assert_eq!(best_stream(&format, MediaType::Subtitle, None), None);

        format.streams[1].is_default = true;
        assert_eq!(best_stream(&format, MediaType::Audio, None), Some(1));
    }

    #[test]
    fn test_raw_packet_unref_keeps_allocation() {
        let mut packet = RawPacket::new();
        packet.data.extend_from_slice(&[1, 2, 3]);
        packet.pts = 10;
        packet.keyframe = true;

        let capacity = packet.data.capacity();
        packet.unref();

        assert!(packet.data.is_empty());
        assert_eq!(packet.data.capacity(), capacity);
        assert_eq!(packet.pts, NOPTS_VALUE);
        assert!(!packet.keyframe);
    }
}
