//! Engine format and stream descriptions to [`MediaInfo`].

use bytes::Bytes;

use super::{
    CODEC_STRING_UNDEFINED, MediaInfo, StreamDescriptor, audio_codec_string, audio_mime_type,
    to_seconds,
};
use crate::engine::{EngineStream, FormatContext, MediaType, NOPTS_VALUE, TIME_BASE, TIME_BASE_Q};

/// Describes the whole container.
pub fn describe(format: &FormatContext) -> MediaInfo {
    let streams = format
        .streams
        .iter()
        .map(|stream| describe_stream(stream, format.duration))
        .collect::<Vec<_>>();

    MediaInfo {
        format_name: format.format_name.clone(),
        start_time: to_seconds(format.start_time, TIME_BASE_Q),
        duration: to_seconds(format.duration, TIME_BASE_Q),
        bit_rate: format.bit_rate.to_string(),
        nb_streams: streams.len(),
        nb_chapters: format.nb_chapters,
        flags: format.flags,
        streams,
    }
}

/// Describes one stream. `container_duration` is in microseconds, or
/// [`NOPTS_VALUE`] when unknown.
pub fn describe_stream(stream: &EngineStream, container_duration: i64) -> StreamDescriptor {
    let is_audio = stream.media_type == MediaType::Audio;

    let duration = if stream.duration > 0 {
        to_seconds(stream.duration, stream.time_base)
    } else {
        to_seconds(container_duration, TIME_BASE_Q)
    };

    StreamDescriptor {
        index: stream.index,
        id: stream.id,
        codec_type: stream.media_type.code(),
        codec_type_string: stream.media_type.as_str().unwrap_or_default().to_string(),
        codec_name: stream.codec_id.name().to_string(),
        codec_string: if is_audio {
            audio_codec_string(stream)
        } else {
            CODEC_STRING_UNDEFINED.to_string()
        },
        profile: stream
            .codec_id
            .profile_name(stream.profile)
            .unwrap_or_default()
            .to_string(),
        level: stream.level,
        bit_rate: stream.bit_rate.to_string(),
        extradata: Bytes::copy_from_slice(&stream.extradata),
        extradata_size: stream.extradata.len(),
        channels: if is_audio { stream.channels } else { 0 },
        sample_rate: if is_audio { stream.sample_rate } else { 0 },
        sample_format: if is_audio {
            stream.sample_format.name().unwrap_or_default().to_string()
        } else {
            String::new()
        },
        mime_type: if is_audio {
            audio_mime_type(stream.codec_id).to_string()
        } else {
            String::new()
        },
        start_time: to_seconds(stream.start_time, stream.time_base),
        duration,
        nb_frames: frame_count(stream, container_duration),
        tags: stream.metadata.iter().cloned().collect(),
    }
}

/// Engine-reported frame count, or an estimate from the average frame rate
/// over the container duration when the engine reports none.
fn frame_count(stream: &EngineStream, container_duration: i64) -> i64 {
    let rate = stream.avg_frame_rate;
    if stream.nb_frames != 0
        || rate.den == 0
        || container_duration == NOPTS_VALUE
        || container_duration <= 0
    {
        return stream.nb_frames;
    }
    let frames = i128::from(container_duration) * i128::from(rate.num)
        / (i128::from(rate.den) * i128::from(TIME_BASE));
    frames as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CodecId, Rational, SampleFormat};

    fn container(duration: i64, streams: Vec<EngineStream>) -> FormatContext {
        FormatContext {
            format_name: "test".to_string(),
            start_time: NOPTS_VALUE,
            duration,
            bit_rate: 9_007_199_254_740_993,
            nb_chapters: 2,
            flags: 0x200,
            streams,
        }
    }

    fn aac_stream() -> EngineStream {
        let mut stream = EngineStream::new(0, MediaType::Audio, CodecId::Aac, Rational::new(1, 44100));
        stream.profile = 1;
        stream.channels = 2;
        stream.sample_rate = 44100;
        stream.sample_format = SampleFormat::Fltp;
        stream.extradata = vec![0x12, 0x10];
        stream.duration = 441_000;
        stream.start_time = 0;
        stream.metadata = vec![
            ("language".to_string(), "eng".to_string()),
            ("handler_name".to_string(), "SoundHandler".to_string()),
        ];
        stream
    }

    fn h264_stream() -> EngineStream {
        let mut stream = EngineStream::new(1, MediaType::Video, CodecId::H264, Rational::new(1, 90000));
        stream.profile = 100;
        stream.level = 40;
        stream.avg_frame_rate = Rational::new(25, 1);
        stream
    }

    #[test]
    fn test_container_fields() {
        let info = describe(&container(10_000_000, vec![aac_stream(), h264_stream()]));

        assert_eq!(info.format_name, "test");
        assert_eq!(info.start_time, 0.0);
        assert_eq!(info.duration, 10.0);
        assert_eq!(info.bit_rate, "9007199254740993");
        assert_eq!(info.nb_streams, 2);
        assert_eq!(info.nb_chapters, 2);
        assert_eq!(info.flags, 0x200);
        for (position, stream) in info.streams.iter().enumerate() {
            assert_eq!(stream.index, position);
        }
    }

    #[test]
    fn test_audio_stream_fields() {
        let stream = describe_stream(&aac_stream(), 10_000_000);

        assert_eq!(stream.codec_type, 1);
        assert_eq!(stream.codec_type_string, "audio");
        assert_eq!(stream.codec_name, "aac");
        assert_eq!(stream.codec_string, "mp4a.40.2");
        assert_eq!(stream.profile, "LC");
        assert_eq!(stream.channels, 2);
        assert_eq!(stream.sample_rate, 44100);
        assert_eq!(stream.sample_format, "fltp");
        assert_eq!(stream.mime_type, "audio/aac");
        assert_eq!(stream.duration, 10.0);
        assert_eq!(&stream.extradata[..], &[0x12, 0x10]);
        assert_eq!(stream.extradata_size, 2);
        assert_eq!(stream.tags.len(), 2);
        assert_eq!(stream.tags["language"], "eng");
    }

    #[test]
    fn test_video_stream_uses_placeholder_and_fallbacks() {
        let stream = describe_stream(&h264_stream(), 10_000_000);

        assert_eq!(stream.codec_string, CODEC_STRING_UNDEFINED);
        assert_eq!(stream.mime_type, "");
        assert_eq!(stream.channels, 0);
        assert_eq!(stream.profile, "High");
        assert_eq!(stream.level, 40);
        assert_eq!(stream.start_time, 0.0);
        // Stream duration unknown: container duration is used
        assert_eq!(stream.duration, 10.0);
        // 10 s at 25 fps
        assert_eq!(stream.nb_frames, 250);
    }

    #[test]
    fn test_frame_count_estimate_needs_frame_rate_and_duration() {
        let mut stream = h264_stream();
        assert_eq!(frame_count(&stream, NOPTS_VALUE), 0);

        stream.avg_frame_rate = Rational::new(0, 0);
        assert_eq!(frame_count(&stream, 10_000_000), 0);

        stream.avg_frame_rate = Rational::new(30000, 1001);
        assert_eq!(frame_count(&stream, 10_000_000), 299);

        stream.nb_frames = 12;
        assert_eq!(frame_count(&stream, 10_000_000), 12);
    }

    #[test]
    fn test_unknown_codec_has_empty_name() {
        let stream = EngineStream::new(0, MediaType::Data, CodecId::None, Rational::new(1, 1000));
        let descriptor = describe_stream(&stream, NOPTS_VALUE);

        assert_eq!(descriptor.codec_name, "");
        assert_eq!(descriptor.codec_type_string, "data");
        assert_eq!(descriptor.duration, 0.0);
    }

    #[test]
    fn test_duplicate_tag_keys_keep_last_value() {
        let mut stream = aac_stream();
        stream.metadata.push(("language".to_string(), "por".to_string()));
        let descriptor = describe_stream(&stream, NOPTS_VALUE);

        assert_eq!(descriptor.tags.len(), 2);
        assert_eq!(descriptor.tags["language"], "por");
    }
}
