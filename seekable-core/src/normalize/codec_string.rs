//! Codecs parameter and MIME type synthesis for audio streams.

use crate::engine::{CodecId, EngineStream, PROFILE_UNKNOWN};

/// Codec string used for streams that are not audio.
pub const CODEC_STRING_UNDEFINED: &str = "undf";

/// MIME type for audio codecs outside the table.
pub const GENERIC_MIME_TYPE: &str = "application/octet-stream";

static AUDIO_MIME_TYPES: &[(CodecId, &str)] = &[
    (CodecId::Mp3, "audio/mpeg"),
    (CodecId::Aac, "audio/aac"),
    (CodecId::Ac3, "audio/ac3"),
    (CodecId::Eac3, "audio/eac3"),
    (CodecId::Flac, "audio/flac"),
    (CodecId::Vorbis, "audio/vorbis"),
    (CodecId::Opus, "audio/opus"),
    (CodecId::PcmS16le, "audio/wav"),
    (CodecId::PcmS16be, "audio/wav"),
    (CodecId::PcmU16le, "audio/wav"),
    (CodecId::PcmU16be, "audio/wav"),
    (CodecId::PcmAlaw, "audio/wav"),
    (CodecId::PcmMulaw, "audio/wav"),
];

static AUDIO_CODEC_STRINGS: &[(CodecId, &str)] = &[
    (CodecId::Mp3, "mp3"),
    (CodecId::Flac, "flac"),
    (CodecId::Opus, "opus"),
    (CodecId::Vorbis, "vorbis"),
    (CodecId::Alac, "alac"),
    (CodecId::Ac3, "ac-3"),
    (CodecId::Eac3, "ec-3"),
    (CodecId::PcmU8, "pcm-u8"),
    (CodecId::PcmS16le, "pcm-s16"),
    (CodecId::PcmS16be, "pcm-s16"),
    (CodecId::PcmS24le, "pcm-s24"),
    (CodecId::PcmS32le, "pcm-s32"),
    (CodecId::PcmF32le, "pcm-f32"),
    (CodecId::PcmF64le, "pcm-f64"),
    (CodecId::PcmAlaw, "alaw"),
    (CodecId::PcmMulaw, "ulaw"),
];

/// MIME type of an audio codec.
pub fn audio_mime_type(codec_id: CodecId) -> &'static str {
    AUDIO_MIME_TYPES
        .iter()
        .find(|(id, _)| *id == codec_id)
        .map_or(GENERIC_MIME_TYPE, |(_, mime)| *mime)
}

/// Codecs parameter of an audio stream.
///
/// AAC carries its audio object type, which is the profile plus one; an
/// unsignalled profile is reported as AAC-LC.
pub fn audio_codec_string(stream: &EngineStream) -> String {
    if stream.codec_id == CodecId::Aac {
        let object_type = if stream.profile == PROFILE_UNKNOWN {
            2
        } else {
            stream.profile + 1
        };
        return format!("mp4a.40.{object_type}");
    }

    AUDIO_CODEC_STRINGS
        .iter()
        .find(|(id, _)| *id == stream.codec_id)
        .map_or(CODEC_STRING_UNDEFINED, |(_, codec)| *codec)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MediaType, Rational};

    fn audio(codec_id: CodecId, profile: i32) -> EngineStream {
        let mut stream = EngineStream::new(0, MediaType::Audio, codec_id, Rational::new(1, 48000));
        stream.profile = profile;
        stream
    }

    #[test]
    fn test_aac_object_type_follows_profile() {
        assert_eq!(audio_codec_string(&audio(CodecId::Aac, 1)), "mp4a.40.2");
        assert_eq!(audio_codec_string(&audio(CodecId::Aac, 4)), "mp4a.40.5");
        assert_eq!(audio_codec_string(&audio(CodecId::Aac, 28)), "mp4a.40.29");
        assert_eq!(
            audio_codec_string(&audio(CodecId::Aac, PROFILE_UNKNOWN)),
            "mp4a.40.2"
        );
    }

    #[test]
    fn test_table_codec_strings() {
        assert_eq!(audio_codec_string(&audio(CodecId::Opus, PROFILE_UNKNOWN)), "opus");
        assert_eq!(audio_codec_string(&audio(CodecId::Eac3, PROFILE_UNKNOWN)), "ec-3");
        assert_eq!(audio_codec_string(&audio(CodecId::PcmS16le, PROFILE_UNKNOWN)), "pcm-s16");
        assert_eq!(audio_codec_string(&audio(CodecId::PcmMulaw, PROFILE_UNKNOWN)), "ulaw");
        assert_eq!(
            audio_codec_string(&audio(CodecId::PcmU16be, PROFILE_UNKNOWN)),
            CODEC_STRING_UNDEFINED
        );
    }

    #[test]
    fn test_mime_table_and_fallback() {
        assert_eq!(audio_mime_type(CodecId::Mp3), "audio/mpeg");
        assert_eq!(audio_mime_type(CodecId::PcmAlaw), "audio/wav");
        assert_eq!(audio_mime_type(CodecId::Eac3), "audio/eac3");
        assert_eq!(audio_mime_type(CodecId::Alac), GENERIC_MIME_TYPE);
        assert_eq!(audio_mime_type(CodecId::PcmF32le), GENERIC_MIME_TYPE);
    }
}
