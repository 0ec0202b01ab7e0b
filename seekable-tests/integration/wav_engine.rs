//! WAV files through the built-in engine.

use seekable_core::{
    CollectingSink, DemuxBridge, MediaType, MemorySource, SeekFlags, SeekableConfig, StopReason,
    StreamRequest,
};
use seekable_sim::{MockByteSource, WavFixture};

#[tokio::test]
async fn test_info_tags_become_stream_tags() {
    let wav = WavFixture::new(22_050, 2, 2.0)
        .with_info(*b"INAM", "Sawtooth")
        .with_info(*b"IART", "Seekable")
        .with_info(*b"ICRD", "2024")
        .build();
    let bridge = DemuxBridge::default();
    let handle = bridge
        .open_default(Box::new(MemorySource::new(wav)))
        .await
        .unwrap();

    let info = bridge.describe(handle).await.unwrap();
    let audio = &info.streams[0];

    assert_eq!(info.format_name, "wav");
    assert!((info.duration - 2.0).abs() < 1e-6);
    assert_eq!(audio.codec_name, "pcm_s16le");
    assert_eq!(audio.codec_string, "pcm-s16");
    assert_eq!(audio.mime_type, "audio/wav");
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.sample_rate, 22_050);
    assert_eq!(audio.bit_rate, "705600");
    assert_eq!(audio.tags.get("title").map(String::as_str), Some("Sawtooth"));
    assert_eq!(audio.tags.get("artist").map(String::as_str), Some("Seekable"));
    assert_eq!(audio.tags.get("date").map(String::as_str), Some("2024"));
}

#[tokio::test]
async fn test_streaming_size_with_unknown_length_reads_to_the_end() {
    let fixture = WavFixture::new(8000, 1, 1.5).with_streaming_size();
    let source = MockByteSource::new(fixture.build()).with_unknown_size();
    let bridge = DemuxBridge::default();
    let handle = bridge.open_default(source.boxed()).await.unwrap();

    let mut sink = CollectingSink::new();
    let summary = bridge
        .stream_packets(handle, StreamRequest::new(MediaType::Audio), &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    let total: usize = sink.packets().map(|p| p.size).sum();
    assert!(total > 0);
    assert!(total <= fixture.data_len());
    assert_eq!(total % usize::from(fixture.block_align()), 0);
}

#[tokio::test]
async fn test_far_seek_on_unknown_size_source_fails_cleanly() {
    let fixture = WavFixture::new(192_000, 8, 0.05);
    let source = MockByteSource::new(fixture.build()).with_unknown_size();
    let bridge = DemuxBridge::default();
    let handle = bridge.open_default(source.boxed()).await.unwrap();

    let error = bridge
        .fetch_packet(handle, MediaType::Audio, None, 1.0e13, SeekFlags::BACKWARD)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "SEEK_FAILED");

    let mut sink = CollectingSink::new();
    let error = bridge
        .stream_packets(
            handle,
            StreamRequest::new(MediaType::Audio).range(1.0e13, 0.0),
            &mut sink,
        )
        .await
        .unwrap_err();
    assert_eq!(error.code(), "SEEK_FAILED");
    assert!(sink.deliveries.is_empty());

    // The session survives the rejected seeks
    let packet = bridge
        .fetch_packet(handle, MediaType::Audio, None, 0.0, SeekFlags::BACKWARD)
        .await
        .unwrap();
    assert_eq!(packet.timestamp, 0.0);
}

#[tokio::test]
async fn test_far_seek_on_streaming_header_never_panics() {
    let fixture = WavFixture::new(192_000, 8, 0.05).with_streaming_size();
    let source = MockByteSource::new(fixture.build()).with_unknown_size();
    let bridge = DemuxBridge::default();

    // A header that claims 4 GiB of data may be refused outright; if it is
    // accepted, an unreachable target must come back as a seek failure.
    let handle = match bridge.open_default(source.boxed()).await {
        Ok(handle) => handle,
        Err(error) => {
            assert_eq!(error.code(), "SOURCE_OPEN_FAILED");
            return;
        }
    };
    let error = bridge
        .fetch_packet(handle, MediaType::Audio, None, 1.0e13, SeekFlags::BACKWARD)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "SEEK_FAILED");
}

#[tokio::test]
async fn test_oversized_fmt_chunk_is_rejected_without_allocating() {
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&36u32.to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&0xffff_fff0u32.to_le_bytes());
    wav.resize(44, 0);

    let source = MockByteSource::new(wav.into());
    let bridge = DemuxBridge::default();
    let error = bridge.open_default(source.boxed()).await.unwrap_err();

    assert_eq!(error.code(), "SOURCE_OPEN_FAILED");
    assert_eq!(bridge.session_count(), 0);
}

#[tokio::test]
async fn test_fetch_every_second() {
    let fixture = WavFixture::new(8000, 2, 5.0);
    let wav = fixture.build();
    let bridge = DemuxBridge::new(SeekableConfig::default());
    let handle = bridge
        .open_default(Box::new(MemorySource::new(wav.clone())))
        .await
        .unwrap();
    let data_offset = wav.len() - fixture.data_len();

    for second in 0..5 {
        let packet = bridge
            .fetch_packet(
                handle,
                MediaType::Audio,
                None,
                f64::from(second),
                SeekFlags::BACKWARD,
            )
            .await
            .unwrap();

        assert!((packet.timestamp - f64::from(second)).abs() < 1e-9);
        assert!(packet.size > 0);
        let start = data_offset + second as usize * 8000 * 4;
        assert_eq!(packet.data, wav.slice(start..start + packet.size));
    }

    // Past the last sample there is nothing to land on
    let error = bridge
        .fetch_packet(handle, MediaType::Audio, None, 9.0, SeekFlags::BACKWARD)
        .await
        .unwrap_err();
    assert_eq!(error.code(), "SEEK_FAILED");
}
