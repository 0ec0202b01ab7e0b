//! Container and stream descriptions produced for hosts.

use seekable_core::normalize::{CODEC_STRING_UNDEFINED, GENERIC_MIME_TYPE};
use seekable_core::{DemuxBridge, MediaInfo, MediaType, SeekableConfig};
use seekable_sim::{MockByteSource, SyntheticMedia, SyntheticStream, simulation_bridge};

async fn describe(bridge: &DemuxBridge, media: &SyntheticMedia) -> MediaInfo {
    let handle = bridge
        .open_default(MockByteSource::new(media.encode()).boxed())
        .await
        .unwrap();
    let info = bridge.describe(handle).await.unwrap();
    bridge.close(handle);
    info
}

#[tokio::test]
async fn test_audio_video_container_description() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let info = describe(&bridge, &SyntheticMedia::audio_video(10.0)).await;

    assert_eq!(info.format_name, "simc");
    assert_eq!(info.nb_streams, 2);
    assert_eq!(info.streams.len(), info.nb_streams);
    assert!((info.duration - 10.0).abs() < 1e-6);
    assert_eq!(info.bit_rate, "1128000");

    for (position, stream) in info.streams.iter().enumerate() {
        assert_eq!(stream.index, position);
    }
}

#[tokio::test]
async fn test_audio_stream_fields() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let info = describe(&bridge, &SyntheticMedia::audio_video(10.0)).await;
    let audio = info.first_stream_of(MediaType::Audio).unwrap();

    assert_eq!(audio.codec_type_string, "audio");
    assert_eq!(audio.codec_name, "aac");
    assert_eq!(audio.codec_string, "mp4a.40.2");
    assert_eq!(audio.mime_type, "audio/aac");
    assert_eq!(audio.profile, "LC");
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.sample_rate, 44_100);
    assert_eq!(audio.sample_format, "fltp");
    assert_eq!(audio.extradata_size, 2);
    assert_eq!(audio.nb_frames, 431);
    assert!((audio.duration - 431.0 * 1024.0 / 44_100.0).abs() < 1e-9);
    assert_eq!(audio.tags.get("language").map(String::as_str), Some("eng"));
    assert_eq!(
        audio.tags.get("title").map(String::as_str),
        Some("Synthetic audio")
    );
}

#[tokio::test]
async fn test_video_stream_falls_back_to_container_values() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let info = describe(&bridge, &SyntheticMedia::audio_video(10.0)).await;
    let video = info.first_stream_of(MediaType::Video).unwrap();

    assert_eq!(video.codec_type_string, "video");
    assert_eq!(video.codec_string, CODEC_STRING_UNDEFINED);
    assert_eq!(video.mime_type, "");
    assert_eq!(video.channels, 0);
    assert_eq!(video.profile, "High");
    assert_eq!(video.level, 40);
    // No stream duration or frame count: both come from the container
    assert!((video.duration - 10.0).abs() < 1e-6);
    assert_eq!(video.nb_frames, 250);
}

#[tokio::test]
async fn test_unknown_audio_codec_uses_generic_mime() {
    use seekable_core::engine::{CodecId, Rational};

    let mut media = SyntheticMedia::new("simc");
    media.add_stream(SyntheticStream::new(
        MediaType::Audio,
        CodecId::None,
        Rational::new(1, 48_000),
    ));
    let bridge = simulation_bridge(SeekableConfig::default());
    let info = describe(&bridge, &media).await;
    let audio = &info.streams[0];

    assert_eq!(audio.mime_type, GENERIC_MIME_TYPE);
    assert_eq!(audio.codec_string, CODEC_STRING_UNDEFINED);
}

#[tokio::test]
async fn test_duplicate_tag_keys_keep_last_value() {
    let mut media = SyntheticMedia::new("simc");
    media.add_stream(
        SyntheticStream::aac_lc(48_000, 1)
            .with_tag("title", "first")
            .with_tag("title", "second"),
    );
    let bridge = simulation_bridge(SeekableConfig::default());
    let info = describe(&bridge, &media).await;

    let tags = info.streams[0].tag_list();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].value, "second");
}

#[tokio::test]
async fn test_description_serializes_for_hosts() {
    let bridge = simulation_bridge(SeekableConfig::default());
    let info = describe(&bridge, &SyntheticMedia::audio_video(1.0)).await;

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["nb_streams"], 2);
    assert_eq!(json["streams"][0]["codec_string"], "mp4a.40.2");
    assert!(json["streams"][0].get("extradata").is_none());
    assert!(json["bit_rate"].is_string());
}
