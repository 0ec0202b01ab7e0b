//! Synthetic multi-stream container for reproducible demuxing tests.
//!
//! The `SIMC` layout is a header describing the container and its streams,
//! followed by packet records until the end of the data. All integers are
//! little-endian; strings are a `u16` length followed by UTF-8 bytes.
//!
//! ```text
//! "SIMC" version:u8 format_name:str start:i64 duration:i64 bit_rate:i64
//! nb_chapters:u32 flags:i32 nb_streams:u8 stream*
//!
//! stream := id:i32 media_type:i8 codec:str profile:i32 level:i32
//!           bit_rate:i64 extradata_len:u32 extradata sample_rate:u32
//!           channels:u32 sample_format:str tb_num:i32 tb_den:i32
//!           start:i64 duration:i64 nb_frames:i64 fps_num:i32 fps_den:i32
//!           default:u8 nb_tags:u16 (key:str value:str)*
//!
//! record := stream:u8 flags:u8 pts:i64 dts:i64 duration:i64 size:u32 data
//! ```

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use seekable_core::engine::{
    CodecId, ContainerEngine, Demuxer, EngineError, EngineResult, EngineStream, FormatContext,
    MediaType, NOPTS_VALUE, RawPacket, Rational, SampleFormat, SeekFlags, PROFILE_UNKNOWN,
    LEVEL_UNKNOWN,
};
use seekable_core::io::ByteSourceAdapter;
use tracing::debug;

/// File signature.
pub const MAGIC: &[u8; 4] = b"SIMC";
/// Layout version written and accepted.
pub const VERSION: u8 = 1;

const FLAG_KEYFRAME: u8 = 0x01;

/// Stream description written into the header.
#[derive(Debug, Clone)]
pub struct SyntheticStream {
    pub id: i32,
    pub media_type: MediaType,
    pub codec_id: CodecId,
    pub profile: i32,
    pub level: i32,
    pub bit_rate: i64,
    pub extradata: Vec<u8>,
    pub channels: u32,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub time_base: Rational,
    pub start_time: i64,
    pub duration: i64,
    pub nb_frames: i64,
    pub avg_frame_rate: Rational,
    pub is_default: bool,
    pub tags: Vec<(String, String)>,
}

impl SyntheticStream {
    pub fn new(media_type: MediaType, codec_id: CodecId, time_base: Rational) -> Self {
        Self {
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
            start_time: 0,
            duration: NOPTS_VALUE,
            nb_frames: 0,
            avg_frame_rate: Rational::default(),
            is_default: false,
            tags: Vec::new(),
        }
    }

    /// AAC-LC audio, time base `1/sample_rate`.
    pub fn aac_lc(sample_rate: u32, channels: u32) -> Self {
        let mut stream = Self::new(
            MediaType::Audio,
            CodecId::Aac,
            Rational::new(1, sample_rate as i32),
        );
        stream.profile = 1;
        stream.bit_rate = 128_000;
        stream.extradata = vec![0x12, 0x10];
        stream.channels = channels;
        stream.sample_rate = sample_rate;
        stream.sample_format = SampleFormat::Fltp;
        stream.is_default = true;
        stream
    }

    /// H.264 High profile video on a 90 kHz clock.
    pub fn h264(frame_rate: Rational) -> Self {
        let mut stream = Self::new(MediaType::Video, CodecId::H264, Rational::new(1, 90_000));
        stream.profile = 100;
        stream.level = 40;
        stream.bit_rate = 1_000_000;
        stream.extradata = vec![0x01, 0x64, 0x00, 0x28, 0xff, 0xe1];
        stream.avg_frame_rate = frame_rate;
        stream.is_default = true;
        stream
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }
}

/// One packet record.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPacket {
    pub stream_index: usize,
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub keyframe: bool,
    pub data: Bytes,
}

/// In-memory description of a `SIMC` file.
#[derive(Debug, Clone)]
pub struct SyntheticMedia {
    pub format_name: String,
    /// Microseconds.
    pub start_time: i64,
    /// Microseconds, or [`NOPTS_VALUE`].
    pub duration: i64,
    pub bit_rate: i64,
    pub nb_chapters: u32,
    pub flags: i32,
    streams: Vec<SyntheticStream>,
    packets: Vec<SyntheticPacket>,
}

impl SyntheticMedia {
    pub fn new(format_name: &str) -> Self {
        Self {
            format_name: format_name.to_string(),
            start_time: 0,
            duration: NOPTS_VALUE,
            bit_rate: 0,
            nb_chapters: 0,
            flags: 0,
            streams: Vec::new(),
            packets: Vec::new(),
        }
    }

    /// Adds a stream and returns its index.
    pub fn add_stream(&mut self, stream: SyntheticStream) -> usize {
        self.bit_rate += stream.bit_rate;
        self.streams.push(stream);
        self.streams.len() - 1
    }

    /// Appends a packet record. Records are written in push order.
    pub fn push_packet(&mut self, packet: SyntheticPacket) {
        self.packets.push(packet);
    }

    pub fn streams(&self) -> &[SyntheticStream] {
        &self.streams
    }

    pub fn packets(&self) -> &[SyntheticPacket] {
        &self.packets
    }

    /// Packets of one stream in file order.
    pub fn packets_of(&self, stream_index: usize) -> impl Iterator<Item = &SyntheticPacket> {
        self.packets
            .iter()
            .filter(move |packet| packet.stream_index == stream_index)
    }

    /// Serializes to the `SIMC` layout.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(MAGIC);
        buf.put_u8(VERSION);
        put_str(&mut buf, &self.format_name);
        buf.put_i64_le(self.start_time);
        buf.put_i64_le(self.duration);
        buf.put_i64_le(self.bit_rate);
        buf.put_u32_le(self.nb_chapters);
        buf.put_i32_le(self.flags);
        buf.put_u8(self.streams.len() as u8);

        for stream in &self.streams {
            buf.put_i32_le(stream.id);
            buf.put_i8(stream.media_type.code() as i8);
            put_str(&mut buf, stream.codec_id.name());
            buf.put_i32_le(stream.profile);
            buf.put_i32_le(stream.level);
            buf.put_i64_le(stream.bit_rate);
            buf.put_u32_le(stream.extradata.len() as u32);
            buf.put_slice(&stream.extradata);
            buf.put_u32_le(stream.sample_rate);
            buf.put_u32_le(stream.channels);
            put_str(&mut buf, stream.sample_format.name().unwrap_or_default());
            buf.put_i32_le(stream.time_base.num);
            buf.put_i32_le(stream.time_base.den);
            buf.put_i64_le(stream.start_time);
            buf.put_i64_le(stream.duration);
            buf.put_i64_le(stream.nb_frames);
            buf.put_i32_le(stream.avg_frame_rate.num);
            buf.put_i32_le(stream.avg_frame_rate.den);
            buf.put_u8(u8::from(stream.is_default));
            buf.put_u16_le(stream.tags.len() as u16);
            for (key, value) in &stream.tags {
                put_str(&mut buf, key);
                put_str(&mut buf, value);
            }
        }

        for packet in &self.packets {
            buf.put_u8(packet.stream_index as u8);
            buf.put_u8(if packet.keyframe { FLAG_KEYFRAME } else { 0 });
            buf.put_i64_le(packet.pts);
            buf.put_i64_le(packet.dts);
            buf.put_i64_le(packet.duration);
            buf.put_u32_le(packet.data.len() as u32);
            buf.put_slice(&packet.data);
        }

        buf.freeze()
    }

    /// AAC audio (stream 0) interleaved with 25 fps H.264 video (stream 1)
    /// by presentation time. Video has a keyframe every second and reports
    /// neither its duration nor its frame count.
    pub fn audio_video(seconds: f64) -> Self {
        let mut media = Self::new("simc");
        media.duration = (seconds * 1_000_000.0) as i64;

        let audio = media.add_stream(
            SyntheticStream::aac_lc(44_100, 2)
                .with_tag("language", "eng")
                .with_tag("title", "Synthetic audio"),
        );
        let video = media.add_stream(
            SyntheticStream::h264(Rational::new(25, 1)).with_tag("handler_name", "VideoHandler"),
        );

        let audio_packets = audio_packets(audio, seconds);
        let video_packets = video_packets(video, seconds);
        media.streams[audio].duration = audio_packets.len() as i64 * 1024;
        media.streams[audio].nb_frames = audio_packets.len() as i64;
        media.streams[video].id = 1;

        let mut records: Vec<(f64, SyntheticPacket)> = audio_packets
            .into_iter()
            .map(|p| (p.pts as f64 / 44_100.0, p))
            .chain(video_packets.into_iter().map(|p| (p.pts as f64 / 90_000.0, p)))
            .collect();
        records.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.stream_index.cmp(&b.1.stream_index))
        });
        media.packets = records.into_iter().map(|(_, p)| p).collect();
        media
    }

    /// AAC audio only.
    pub fn audio_only(seconds: f64) -> Self {
        let mut media = Self::new("simc");
        media.duration = (seconds * 1_000_000.0) as i64;
        let audio = media.add_stream(SyntheticStream::aac_lc(44_100, 2));
        media.packets = audio_packets(audio, seconds);
        media.streams[audio].duration = media.packets.len() as i64 * 1024;
        media
    }

    /// 25 fps H.264 video only.
    pub fn video_only(seconds: f64) -> Self {
        let mut media = Self::new("simc");
        media.duration = (seconds * 1_000_000.0) as i64;
        let video = media.add_stream(SyntheticStream::h264(Rational::new(25, 1)));
        media.packets = video_packets(video, seconds);
        media
    }
}

fn put_str(buf: &mut BytesMut, value: &str) {
    buf.put_u16_le(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

/// Recognisable payload: stream index, little-endian sequence number, then
/// a counting pattern.
fn payload(stream_index: usize, sequence: u32, len: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(len.max(5));
    buf.put_u8(stream_index as u8);
    buf.put_u32_le(sequence);
    for i in 5..len {
        buf.put_u8((sequence as usize + i) as u8);
    }
    buf.freeze()
}

fn audio_packets(stream_index: usize, seconds: f64) -> Vec<SyntheticPacket> {
    let count = (seconds * 44_100.0 / 1024.0).ceil() as u32;
    (0..count)
        .map(|i| {
            let pts = i64::from(i) * 1024;
            SyntheticPacket {
                stream_index,
                pts,
                dts: pts,
                duration: 1024,
                keyframe: true,
                data: payload(stream_index, i, 256),
            }
        })
        .collect()
}

fn video_packets(stream_index: usize, seconds: f64) -> Vec<SyntheticPacket> {
    let count = (seconds * 25.0).round() as u32;
    (0..count)
        .map(|i| {
            let pts = i64::from(i) * 3600;
            let keyframe = i % 25 == 0;
            SyntheticPacket {
                stream_index,
                pts,
                dts: pts,
                duration: 3600,
                keyframe,
                data: payload(stream_index, i, if keyframe { 2048 } else { 512 }),
            }
        })
        .collect()
}

/// Engine for the `SIMC` layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticEngine;

#[async_trait]
impl ContainerEngine for SyntheticEngine {
    fn name(&self) -> &'static str {
        "simc"
    }

    fn probe(&self, header: &[u8]) -> u8 {
        if header.starts_with(MAGIC) { 100 } else { 0 }
    }

    async fn open(&self, io: &mut ByteSourceAdapter) -> EngineResult<Box<dyn Demuxer>> {
        let mut magic = [0u8; 4];
        io.read_exact(&mut magic).await?;
        if &magic != MAGIC {
            return Err(invalid("missing SIMC signature"));
        }
        let version = io.read_u8().await?;
        if version != VERSION {
            return Err(EngineError::Unsupported {
                reason: format!("SIMC version {version}"),
            });
        }

        let format_name = read_str(io).await?;
        let start_time = io.read_i64_le().await?;
        let duration = io.read_i64_le().await?;
        let bit_rate = io.read_i64_le().await?;
        let nb_chapters = io.read_u32_le().await?;
        let flags = io.read_i32_le().await?;
        let nb_streams = io.read_u8().await?;

        let mut streams = Vec::with_capacity(usize::from(nb_streams));
        for index in 0..usize::from(nb_streams) {
            streams.push(read_stream(io, index).await?);
        }

        let packets_offset = io.position();
        debug!(
            "SIMC header parsed: {} streams, packets at offset {}",
            streams.len(),
            packets_offset
        );

        Ok(Box::new(SyntheticDemuxer {
            format: FormatContext {
                format_name,
                start_time,
                duration,
                bit_rate,
                nb_chapters,
                flags,
                streams,
            },
            packets_offset,
            index: Vec::new(),
        }))
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidData {
        reason: reason.to_string(),
    }
}

async fn read_str(io: &mut ByteSourceAdapter) -> EngineResult<String> {
    let len = usize::from(io.read_u16_le().await?);
    let mut raw = vec![0u8; len];
    io.read_exact(&mut raw).await?;
    String::from_utf8(raw).map_err(|_| invalid("string is not UTF-8"))
}

async fn read_stream(io: &mut ByteSourceAdapter, index: usize) -> EngineResult<EngineStream> {
    let id = io.read_i32_le().await?;
    let media_type = MediaType::from_code(i32::from(io.read_u8().await? as i8));
    let codec_id = CodecId::from_name(&read_str(io).await?);

    let mut stream = EngineStream::new(index, media_type, codec_id, Rational::default());
    stream.id = id;
    stream.profile = io.read_i32_le().await?;
    stream.level = io.read_i32_le().await?;
    stream.bit_rate = io.read_i64_le().await?;

    let extradata_len = io.read_u32_le().await? as usize;
    stream.extradata = vec![0u8; extradata_len];
    io.read_exact(&mut stream.extradata).await?;

    stream.sample_rate = io.read_u32_le().await?;
    stream.channels = io.read_u32_le().await?;
    stream.sample_format = SampleFormat::from_name(&read_str(io).await?);
    stream.time_base = Rational::new(io.read_i32_le().await?, io.read_i32_le().await?);
    if stream.time_base.num <= 0 || stream.time_base.den <= 0 {
        return Err(invalid("stream time base must be positive"));
    }
    stream.start_time = io.read_i64_le().await?;
    stream.duration = io.read_i64_le().await?;
    stream.nb_frames = io.read_i64_le().await?;
    stream.avg_frame_rate = Rational::new(io.read_i32_le().await?, io.read_i32_le().await?);
    stream.is_default = io.read_u8().await? != 0;

    let nb_tags = io.read_u16_le().await?;
    for _ in 0..nb_tags {
        let key = read_str(io).await?;
        let value = read_str(io).await?;
        stream.metadata.push((key, value));
    }
    Ok(stream)
}

struct RecordHeader {
    stream_index: usize,
    keyframe: bool,
    pts: i64,
    dts: i64,
    duration: i64,
    size: usize,
}

async fn read_record_header(io: &mut ByteSourceAdapter) -> EngineResult<RecordHeader> {
    let stream_index = usize::from(io.read_u8().await?);
    let flags = io.read_u8().await?;
    Ok(RecordHeader {
        stream_index,
        keyframe: flags & FLAG_KEYFRAME != 0,
        pts: io.read_i64_le().await?,
        dts: io.read_i64_le().await?,
        duration: io.read_i64_le().await?,
        size: io.read_u32_le().await? as usize,
    })
}

/// Seek index entry built during stream analysis.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u64,
    stream_index: usize,
    timestamp: i64,
    keyframe: bool,
}

/// An opened `SIMC` file.
pub struct SyntheticDemuxer {
    format: FormatContext,
    packets_offset: u64,
    index: Vec<IndexEntry>,
}

impl SyntheticDemuxer {
    async fn at_end(io: &mut ByteSourceAdapter) -> EngineResult<bool> {
        Ok(io.peek(1).await?.is_empty())
    }
}

#[async_trait]
impl Demuxer for SyntheticDemuxer {
    fn format(&self) -> &FormatContext {
        &self.format
    }

    async fn find_stream_info(&mut self, io: &mut ByteSourceAdapter) -> EngineResult<()> {
        io.seek_to(self.packets_offset).await?;
        self.index.clear();

        while !Self::at_end(io).await? {
            let offset = io.position();
            let header = read_record_header(io).await?;
            if header.stream_index >= self.format.streams.len() {
                return Err(invalid("packet record for an undeclared stream"));
            }
            self.index.push(IndexEntry {
                offset,
                stream_index: header.stream_index,
                timestamp: if header.pts != NOPTS_VALUE {
                    header.pts
                } else {
                    header.dts
                },
                keyframe: header.keyframe,
            });
            io.skip(header.size as u64).await?;
        }

        io.seek_to(self.packets_offset).await?;
        debug!("SIMC index built with {} entries", self.index.len());
        Ok(())
    }

    async fn read_frame(
        &mut self,
        io: &mut ByteSourceAdapter,
        packet: &mut RawPacket,
    ) -> EngineResult<bool> {
        packet.unref();
        if Self::at_end(io).await? {
            return Ok(false);
        }

        let header = read_record_header(io).await?;
        let read = io.read_up_to(&mut packet.data, header.size).await?;
        if read != header.size {
            return Err(invalid("packet record cut short"));
        }

        packet.stream_index = header.stream_index;
        packet.keyframe = header.keyframe;
        packet.pts = header.pts;
        packet.dts = header.dts;
        packet.duration = header.duration;
        Ok(true)
    }

    async fn seek_frame(
        &mut self,
        io: &mut ByteSourceAdapter,
        stream_index: usize,
        timestamp: i64,
        flags: SeekFlags,
    ) -> EngineResult<()> {
        if flags.contains(SeekFlags::BYTE) || flags.contains(SeekFlags::FRAME) {
            return Err(EngineError::Seek {
                reason: "only timestamp seeks are supported".to_string(),
            });
        }
        if stream_index >= self.format.streams.len() {
            return Err(EngineError::Seek {
                reason: format!("no stream {stream_index}"),
            });
        }

        let any = flags.contains(SeekFlags::ANY);
        let mut candidates = self
            .index
            .iter()
            .filter(|entry| entry.stream_index == stream_index && (any || entry.keyframe));

        let entry = if flags.contains(SeekFlags::BACKWARD) {
            let first = candidates.clone().next();
            candidates
                .filter(|entry| entry.timestamp <= timestamp)
                .last()
                .or(first)
        } else {
            candidates.find(|entry| entry.timestamp >= timestamp)
        };

        let entry = entry.copied().ok_or_else(|| EngineError::Seek {
            reason: format!("no sync point for timestamp {timestamp} in stream {stream_index}"),
        })?;

        io.seek_to(entry.offset)
            .await
            .map_err(|e| EngineError::Seek {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use seekable_core::source::MemorySource;

    use super::*;

    async fn open(media: &SyntheticMedia) -> (Box<dyn Demuxer>, ByteSourceAdapter) {
        let mut io = ByteSourceAdapter::new(Box::new(MemorySource::new(media.encode())), 1024);
        let mut demuxer = SyntheticEngine.open(&mut io).await.unwrap();
        demuxer.find_stream_info(&mut io).await.unwrap();
        (demuxer, io)
    }

    #[test]
    fn test_preset_layout() {
        let media = SyntheticMedia::audio_video(10.0);

        assert_eq!(media.streams().len(), 2);
        assert_eq!(media.packets_of(0).count(), 431);
        assert_eq!(media.packets_of(1).count(), 250);
        assert_eq!(media.packets_of(1).filter(|p| p.keyframe).count(), 10);
        assert!(SyntheticEngine.probe(&media.encode()) == 100);
    }

    #[tokio::test]
    async fn test_header_round_trips_through_engine() {
        let media = SyntheticMedia::audio_video(2.0);
        let (demuxer, _io) = open(&media).await;
        let format = demuxer.format();

        assert_eq!(format.format_name, "simc");
        assert_eq!(format.duration, 2_000_000);
        assert_eq!(format.bit_rate, 1_128_000);

        let audio = &format.streams[0];
        assert_eq!(audio.codec_id, CodecId::Aac);
        assert_eq!(audio.profile, 1);
        assert_eq!(audio.sample_format, SampleFormat::Fltp);
        assert_eq!(audio.extradata, vec![0x12, 0x10]);
        assert_eq!(audio.metadata.len(), 2);

        let video = &format.streams[1];
        assert_eq!(video.media_type, MediaType::Video);
        assert_eq!(video.time_base, Rational::new(1, 90_000));
        assert_eq!(video.avg_frame_rate, Rational::new(25, 1));
        assert_eq!(video.duration, NOPTS_VALUE);
    }

    #[tokio::test]
    async fn test_reads_every_record_in_order() {
        let media = SyntheticMedia::audio_video(1.0);
        let (mut demuxer, mut io) = open(&media).await;
        let mut packet = RawPacket::new();

        for expected in media.packets() {
            assert!(demuxer.read_frame(&mut io, &mut packet).await.unwrap());
            assert_eq!(packet.stream_index, expected.stream_index);
            assert_eq!(packet.pts, expected.pts);
            assert_eq!(packet.data, expected.data.as_ref());
        }
        assert!(!demuxer.read_frame(&mut io, &mut packet).await.unwrap());
    }

    #[tokio::test]
    async fn test_backward_seek_lands_on_preceding_keyframe() {
        let media = SyntheticMedia::audio_video(4.0);
        let (mut demuxer, mut io) = open(&media).await;
        let mut packet = RawPacket::new();

        // 2.5 s on the video clock; the keyframe before it is at 2.0 s
        demuxer
            .seek_frame(&mut io, 1, 225_000, SeekFlags::BACKWARD)
            .await
            .unwrap();
        loop {
            assert!(demuxer.read_frame(&mut io, &mut packet).await.unwrap());
            if packet.stream_index == 1 {
                break;
            }
        }
        assert_eq!(packet.pts, 180_000);
        assert!(packet.keyframe);
    }

    #[tokio::test]
    async fn test_forward_seek_past_last_keyframe_fails() {
        let media = SyntheticMedia::audio_video(2.0);
        let (mut demuxer, mut io) = open(&media).await;

        let result = demuxer
            .seek_frame(&mut io, 1, 150_000, SeekFlags::NONE)
            .await;
        assert!(matches!(result, Err(EngineError::Seek { .. })));
    }

    #[tokio::test]
    async fn test_rejects_wrong_version() {
        let mut data = SyntheticMedia::audio_only(1.0).encode().to_vec();
        data[4] = 9;
        let mut io = ByteSourceAdapter::new(Box::new(MemorySource::new(Bytes::from(data))), 256);

        assert!(matches!(
            SyntheticEngine.open(&mut io).await,
            Err(EngineError::Unsupported { .. })
        ));
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

        #[test]
        fn prop_backward_seek_never_lands_after_target(target in 0i64..360_000) {
            let media = SyntheticMedia::audio_video(4.0);
            let pts = tokio_test::block_on(async {
                let (mut demuxer, mut io) = open(&media).await;
                let mut packet = RawPacket::new();
                demuxer
                    .seek_frame(&mut io, 1, target, SeekFlags::BACKWARD)
                    .await
                    .unwrap();
                loop {
                    assert!(demuxer.read_frame(&mut io, &mut packet).await.unwrap());
                    if packet.stream_index == 1 {
                        break packet.pts;
                    }
                }
            });

            proptest::prop_assert!(pts <= target);
            proptest::prop_assert_eq!(pts % 90_000, 0);
            proptest::prop_assert!(target - pts < 90_000);
        }
    }
}
