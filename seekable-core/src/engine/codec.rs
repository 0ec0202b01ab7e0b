//! Codec identifiers and their static descriptor tables.
//!
//! These are closed mappings. New codecs are added as table rows, not as
//! trait implementations.

use super::MediaType;

/// Profile value meaning "not signalled".
pub const PROFILE_UNKNOWN: i32 = -99;
/// Level value meaning "not signalled".
pub const LEVEL_UNKNOWN: i32 = -99;

/// Codecs the bridge can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// No codec, or one without a descriptor.
    None,
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    Mpeg4,
    Mpeg2Video,
    Aac,
    Mp3,
    Ac3,
    Eac3,
    Flac,
    Vorbis,
    Opus,
    Alac,
    PcmU8,
    PcmS16le,
    PcmS16be,
    PcmU16le,
    PcmU16be,
    PcmS24le,
    PcmS32le,
    PcmF32le,
    PcmF64le,
    PcmAlaw,
    PcmMulaw,
    Subrip,
    WebVtt,
    MovText,
}

/// Static description of a codec.
#[derive(Debug)]
pub struct CodecDescriptor {
    pub id: CodecId,
    pub media_type: MediaType,
    pub name: &'static str,
    pub long_name: &'static str,
}

const fn descriptor(
    id: CodecId,
    media_type: MediaType,
    name: &'static str,
    long_name: &'static str,
) -> CodecDescriptor {
    CodecDescriptor {
        id,
        media_type,
        name,
        long_name,
    }
}

static CODEC_DESCRIPTORS: &[CodecDescriptor] = &[
    descriptor(CodecId::H264, MediaType::Video, "h264", "H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10"),
    descriptor(CodecId::Hevc, MediaType::Video, "hevc", "H.265 / HEVC (High Efficiency Video Coding)"),
    descriptor(CodecId::Vp8, MediaType::Video, "vp8", "On2 VP8"),
    descriptor(CodecId::Vp9, MediaType::Video, "vp9", "Google VP9"),
    descriptor(CodecId::Av1, MediaType::Video, "av1", "Alliance for Open Media AV1"),
    descriptor(CodecId::Mpeg4, MediaType::Video, "mpeg4", "MPEG-4 part 2"),
    descriptor(CodecId::Mpeg2Video, MediaType::Video, "mpeg2video", "MPEG-2 video"),
    descriptor(CodecId::Aac, MediaType::Audio, "aac", "AAC (Advanced Audio Coding)"),
    descriptor(CodecId::Mp3, MediaType::Audio, "mp3", "MP3 (MPEG audio layer 3)"),
    descriptor(CodecId::Ac3, MediaType::Audio, "ac3", "ATSC A/52A (AC-3)"),
    descriptor(CodecId::Eac3, MediaType::Audio, "eac3", "ATSC A/52B (AC-3, E-AC-3)"),
    descriptor(CodecId::Flac, MediaType::Audio, "flac", "FLAC (Free Lossless Audio Codec)"),
    descriptor(CodecId::Vorbis, MediaType::Audio, "vorbis", "Vorbis"),
    descriptor(CodecId::Opus, MediaType::Audio, "opus", "Opus (Opus Interactive Audio Codec)"),
    descriptor(CodecId::Alac, MediaType::Audio, "alac", "ALAC (Apple Lossless Audio Codec)"),
    descriptor(CodecId::PcmU8, MediaType::Audio, "pcm_u8", "PCM unsigned 8-bit"),
    descriptor(CodecId::PcmS16le, MediaType::Audio, "pcm_s16le", "PCM signed 16-bit little-endian"),
    descriptor(CodecId::PcmS16be, MediaType::Audio, "pcm_s16be", "PCM signed 16-bit big-endian"),
    descriptor(CodecId::PcmU16le, MediaType::Audio, "pcm_u16le", "PCM unsigned 16-bit little-endian"),
    descriptor(CodecId::PcmU16be, MediaType::Audio, "pcm_u16be", "PCM unsigned 16-bit big-endian"),
    descriptor(CodecId::PcmS24le, MediaType::Audio, "pcm_s24le", "PCM signed 24-bit little-endian"),
    descriptor(CodecId::PcmS32le, MediaType::Audio, "pcm_s32le", "PCM signed 32-bit little-endian"),
    descriptor(CodecId::PcmF32le, MediaType::Audio, "pcm_f32le", "PCM 32-bit floating point little-endian"),
    descriptor(CodecId::PcmF64le, MediaType::Audio, "pcm_f64le", "PCM 64-bit floating point little-endian"),
    descriptor(CodecId::PcmAlaw, MediaType::Audio, "pcm_alaw", "PCM A-law / G.711 A-law"),
    descriptor(CodecId::PcmMulaw, MediaType::Audio, "pcm_mulaw", "PCM mu-law / G.711 mu-law"),
    descriptor(CodecId::Subrip, MediaType::Subtitle, "subrip", "SubRip subtitle"),
    descriptor(CodecId::WebVtt, MediaType::Subtitle, "webvtt", "WebVTT subtitle"),
    descriptor(CodecId::MovText, MediaType::Subtitle, "mov_text", "3GPP Timed Text subtitle"),
];

static PROFILE_NAMES: &[(CodecId, i32, &str)] = &[
    (CodecId::Aac, 0, "Main"),
    (CodecId::Aac, 1, "LC"),
    (CodecId::Aac, 2, "SSR"),
    (CodecId::Aac, 3, "LTP"),
    (CodecId::Aac, 4, "HE-AAC"),
    (CodecId::Aac, 28, "HE-AACv2"),
    (CodecId::Aac, 22, "LD"),
    (CodecId::Aac, 38, "ELD"),
    (CodecId::H264, 66, "Baseline"),
    (CodecId::H264, 578, "Constrained Baseline"),
    (CodecId::H264, 77, "Main"),
    (CodecId::H264, 88, "Extended"),
    (CodecId::H264, 100, "High"),
    (CodecId::H264, 110, "High 10"),
    (CodecId::H264, 122, "High 4:2:2"),
    (CodecId::H264, 244, "High 4:4:4 Predictive"),
    (CodecId::Hevc, 1, "Main"),
    (CodecId::Hevc, 2, "Main 10"),
    (CodecId::Hevc, 3, "Main Still Picture"),
    (CodecId::Hevc, 4, "Rext"),
    (CodecId::Vp9, 0, "Profile 0"),
    (CodecId::Vp9, 1, "Profile 1"),
    (CodecId::Vp9, 2, "Profile 2"),
    (CodecId::Vp9, 3, "Profile 3"),
    (CodecId::Av1, 0, "Main"),
    (CodecId::Av1, 1, "High"),
    (CodecId::Av1, 2, "Professional"),
];

impl CodecId {
    pub fn descriptor(self) -> Option<&'static CodecDescriptor> {
        CODEC_DESCRIPTORS.iter().find(|d| d.id == self)
    }

    /// Short codec name, empty when there is no descriptor.
    pub fn name(self) -> &'static str {
        self.descriptor().map_or("", |d| d.name)
    }

    /// Looks a codec up by its short name; unknown names map to [`CodecId::None`].
    pub fn from_name(name: &str) -> Self {
        CODEC_DESCRIPTORS
            .iter()
            .find(|d| d.name == name)
            .map_or(CodecId::None, |d| d.id)
    }

    /// Human-readable profile name for `profile`, if the table knows it.
    pub fn profile_name(self, profile: i32) -> Option<&'static str> {
        PROFILE_NAMES
            .iter()
            .find(|(id, value, _)| *id == self && *value == profile)
            .map(|(_, _, name)| *name)
    }
}

/// Sample layout of decoded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    None,
    U8,
    S16,
    S32,
    Flt,
    Dbl,
    U8p,
    S16p,
    S32p,
    Fltp,
    Dblp,
    S64,
    S64p,
}

static SAMPLE_FORMAT_NAMES: &[(SampleFormat, &str)] = &[
    (SampleFormat::U8, "u8"),
    (SampleFormat::S16, "s16"),
    (SampleFormat::S32, "s32"),
    (SampleFormat::Flt, "flt"),
    (SampleFormat::Dbl, "dbl"),
    (SampleFormat::U8p, "u8p"),
    (SampleFormat::S16p, "s16p"),
    (SampleFormat::S32p, "s32p"),
    (SampleFormat::Fltp, "fltp"),
    (SampleFormat::Dblp, "dblp"),
    (SampleFormat::S64, "s64"),
    (SampleFormat::S64p, "s64p"),
];

impl SampleFormat {
    pub fn name(self) -> Option<&'static str> {
        SAMPLE_FORMAT_NAMES
            .iter()
            .find(|(format, _)| *format == self)
            .map(|(_, name)| *name)
    }

    pub fn from_name(name: &str) -> Self {
        SAMPLE_FORMAT_NAMES
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map_or(SampleFormat::None, |(format, _)| *format)
    }

    /// Interleaved equivalent of a planar format.
    pub fn packed(self) -> Self {
        match self {
            SampleFormat::U8p => SampleFormat::U8,
            SampleFormat::S16p => SampleFormat::S16,
            SampleFormat::S32p => SampleFormat::S32,
            SampleFormat::Fltp => SampleFormat::Flt,
            SampleFormat::Dblp => SampleFormat::Dbl,
            SampleFormat::S64p => SampleFormat::S64,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup() {
        assert_eq!(CodecId::Aac.name(), "aac");
        assert_eq!(CodecId::PcmS16le.name(), "pcm_s16le");
        assert_eq!(CodecId::None.name(), "");
        assert_eq!(
            CodecId::H264.descriptor().map(|d| d.media_type),
            Some(MediaType::Video)
        );
    }

    #[test]
    fn test_codec_from_name() {
        assert_eq!(CodecId::from_name("opus"), CodecId::Opus);
        assert_eq!(CodecId::from_name("mov_text"), CodecId::MovText);
        assert_eq!(CodecId::from_name("nonsense"), CodecId::None);
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(CodecId::Aac.profile_name(1), Some("LC"));
        assert_eq!(CodecId::H264.profile_name(100), Some("High"));
        assert_eq!(CodecId::H264.profile_name(PROFILE_UNKNOWN), None);
        assert_eq!(CodecId::Mp3.profile_name(0), None);
    }

    #[test]
    fn test_sample_format_names() {
        assert_eq!(SampleFormat::Fltp.name(), Some("fltp"));
        assert_eq!(SampleFormat::None.name(), None);
        assert_eq!(SampleFormat::from_name("s16"), SampleFormat::S16);
        assert_eq!(SampleFormat::S16p.packed(), SampleFormat::S16);
    }
}
