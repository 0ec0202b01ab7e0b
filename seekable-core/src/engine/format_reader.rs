//! Engine backed by symphonia's format readers.
//!
//! Symphonia pulls bytes synchronously through `Read + Seek`. Each demuxer
//! call therefore runs the reader on the blocking pool, and the reader's
//! byte source is a [`ChannelSource`] that hands every read and seek back to
//! the async side, where it is answered from the session's
//! [`ByteSourceAdapter`]. Only one reader call is in flight per demuxer, so
//! the engine still consumes the provider strictly one request at a time.

use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

use async_trait::async_trait;
use symphonia::core::codecs::{
    CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_NULL,
    CODEC_TYPE_OPUS, CODEC_TYPE_PCM_ALAW, CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_F64LE,
    CODEC_TYPE_PCM_MULAW, CODEC_TYPE_PCM_S16BE, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24LE,
    CODEC_TYPE_PCM_S32LE, CODEC_TYPE_PCM_U8, CODEC_TYPE_PCM_U16BE, CODEC_TYPE_PCM_U16LE,
    CODEC_TYPE_VORBIS, CodecParameters, CodecType,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag as SymphoniaTag};
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat as SymphoniaSampleFormat;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinHandle};
use tracing::{debug, trace};

use super::{
    CodecId, ContainerEngine, Demuxer, EngineError, EngineResult, EngineStream, FormatContext,
    MediaType, NOPTS_VALUE, RawPacket, Rational, SampleFormat, SeekFlags, TIME_BASE, TIME_BASE_Q,
    rescale_q,
};
use crate::io::{ByteSourceAdapter, IoError, IoResult, Whence};

/// Header bytes inspected to recognise a container.
const SIGNATURE_LEN: usize = 16;

static CODEC_IDS: &[(CodecType, CodecId)] = &[
    (CODEC_TYPE_AAC, CodecId::Aac),
    (CODEC_TYPE_MP3, CodecId::Mp3),
    (CODEC_TYPE_FLAC, CodecId::Flac),
    (CODEC_TYPE_VORBIS, CodecId::Vorbis),
    (CODEC_TYPE_OPUS, CodecId::Opus),
    (CODEC_TYPE_ALAC, CodecId::Alac),
    (CODEC_TYPE_PCM_U8, CodecId::PcmU8),
    (CODEC_TYPE_PCM_S16LE, CodecId::PcmS16le),
    (CODEC_TYPE_PCM_S16BE, CodecId::PcmS16be),
    (CODEC_TYPE_PCM_U16LE, CodecId::PcmU16le),
    (CODEC_TYPE_PCM_U16BE, CodecId::PcmU16be),
    (CODEC_TYPE_PCM_S24LE, CodecId::PcmS24le),
    (CODEC_TYPE_PCM_S32LE, CodecId::PcmS32le),
    (CODEC_TYPE_PCM_F32LE, CodecId::PcmF32le),
    (CODEC_TYPE_PCM_F64LE, CodecId::PcmF64le),
    (CODEC_TYPE_PCM_ALAW, CodecId::PcmAlaw),
    (CODEC_TYPE_PCM_MULAW, CodecId::PcmMulaw),
];

static TAG_KEYS: &[(StandardTagKey, &str)] = &[
    (StandardTagKey::TrackTitle, "title"),
    (StandardTagKey::Artist, "artist"),
    (StandardTagKey::Album, "album"),
    (StandardTagKey::AlbumArtist, "album_artist"),
    (StandardTagKey::Comment, "comment"),
    (StandardTagKey::Composer, "composer"),
    (StandardTagKey::Copyright, "copyright"),
    (StandardTagKey::Date, "date"),
    (StandardTagKey::Genre, "genre"),
    (StandardTagKey::Encoder, "encoder"),
    (StandardTagKey::EncodedBy, "encoded_by"),
    (StandardTagKey::Language, "language"),
    (StandardTagKey::TrackNumber, "track"),
];

/// Containers recognised from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Wav,
    Mp3,
    Adts,
    Flac,
    Ogg,
    Mp4,
    Matroska,
}

impl ContainerKind {
    pub fn detect(header: &[u8]) -> Option<Self> {
        match header {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(Self::Wav),
            [b'f', b'L', b'a', b'C', ..] => Some(Self::Flac),
            [b'O', b'g', b'g', b'S', ..] => Some(Self::Ogg),
            [0x1a, 0x45, 0xdf, 0xa3, ..] => Some(Self::Matroska),
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some(Self::Mp4),
            [b'I', b'D', b'3', ..] => Some(Self::Mp3),
            // ADTS has layer bits 00, MPEG audio layers never do
            [0xff, second, ..] if second & 0xf6 == 0xf0 => Some(Self::Adts),
            [0xff, second, ..] if second & 0xe0 == 0xe0 && second & 0x06 != 0 => Some(Self::Mp3),
            _ => None,
        }
    }

    /// Format name reported in `MediaInfo`.
    pub fn format_name(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Adts => "aac",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Mp4 => "mov,mp4,m4a,3gp,3g2,mj2",
            Self::Matroska => "matroska,webm",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Adts => "aac",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Mp4 => "mp4",
            Self::Matroska => "mkv",
        }
    }
}

/// Engine for every container symphonia can demux.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaEngine;

#[async_trait]
impl ContainerEngine for SymphoniaEngine {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn probe(&self, header: &[u8]) -> u8 {
        match ContainerKind::detect(header) {
            Some(ContainerKind::Mp3 | ContainerKind::Adts) => 50,
            Some(_) => 90,
            None => 0,
        }
    }

    async fn open(&self, io: &mut ByteSourceAdapter) -> EngineResult<Box<dyn Demuxer>> {
        let kind = ContainerKind::detect(io.peek(SIGNATURE_LEN).await?).ok_or_else(|| {
            EngineError::InvalidData {
                reason: "unrecognised container signature".to_string(),
            }
        })?;
        let byte_len = io.size().await?;

        let (sender, mut requests) = mpsc::unbounded_channel();
        let source = ChannelSource {
            requests: sender,
            byte_len,
        };
        let mut hint = Hint::new();
        hint.with_extension(kind.extension());

        let probe = task::spawn_blocking(move || {
            let stream = MediaSourceStream::new(Box::new(source), MediaSourceStreamOptions::default());
            let mut probed = symphonia::default::get_probe().format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )?;

            let mut tags = Vec::new();
            if let Some(metadata) = probed.metadata.get() {
                if let Some(revision) = metadata.current() {
                    tags.extend(revision.tags().iter().map(tag_entry));
                }
            }
            let mut reader = probed.format;
            if let Some(revision) = reader.metadata().current() {
                tags.extend(revision.tags().iter().map(tag_entry));
            }
            Ok::<_, SymphoniaError>((reader, tags))
        });

        let (probed, failure) = serve_until_done(io, &mut requests, probe).await?;
        let (reader, tags) = probed.map_err(|e| engine_error(e, failure))?;

        let format = describe_tracks(kind, reader.as_ref(), tags, byte_len)?;
        debug!(
            "symphonia opened {} with {} tracks",
            format.format_name,
            format.streams.len()
        );

        let track_ids = reader.tracks().iter().map(|track| track.id).collect();
        Ok(Box::new(SymphoniaDemuxer {
            format,
            reader: Some(reader),
            requests,
            track_ids,
            skip_until: None,
            byte_len,
        }))
    }
}

/// Blocking-side byte source: every call is a request to the async side.
struct ChannelSource {
    requests: mpsc::UnboundedSender<IoRequest>,
    byte_len: Option<u64>,
}

enum IoRequest {
    Read {
        len: usize,
        reply: oneshot::Sender<io::Result<Vec<u8>>>,
    },
    Seek {
        to: SeekFrom,
        reply: oneshot::Sender<io::Result<u64>>,
    },
}

impl ChannelSource {
    fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<io::Result<T>>) -> IoRequest,
    ) -> io::Result<T> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(request(reply))
            .map_err(|_| detached())?;
        answer.blocking_recv().map_err(|_| detached())?
    }
}

fn detached() -> io::Error {
    io::Error::new(ErrorKind::BrokenPipe, "demuxer session is gone")
}

impl Read for ChannelSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = self.call(|reply| IoRequest::Read {
            len: buf.len(),
            reply,
        })?;
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }
}

impl Seek for ChannelSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.call(|reply| IoRequest::Seek { to: pos, reply })
    }
}

impl MediaSource for ChannelSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.byte_len
    }
}

/// Answers the blocking reader's byte requests from `io` until `task` ends.
///
/// Returns the task's output together with the first adapter failure, so
/// callers can report the provider error instead of symphonia's copy of it.
async fn serve_until_done<R: Send + 'static>(
    io: &mut ByteSourceAdapter,
    requests: &mut mpsc::UnboundedReceiver<IoRequest>,
    mut task: JoinHandle<R>,
) -> EngineResult<(R, Option<IoError>)> {
    let mut failure = None;
    loop {
        tokio::select! {
            biased;
            joined = &mut task => {
                return joined
                    .map(|output| (output, failure))
                    .map_err(|e| EngineError::InvalidData {
                        reason: format!("format reader stopped: {e}"),
                    });
            }
            Some(request) = requests.recv() => serve_request(io, request, &mut failure).await,
        }
    }
}

async fn serve_request(
    io: &mut ByteSourceAdapter,
    request: IoRequest,
    failure: &mut Option<IoError>,
) {
    match request {
        IoRequest::Read { len, reply } => {
            let mut chunk = Vec::with_capacity(len);
            let result = io.read_up_to(&mut chunk, len).await.map(|_| chunk);
            trace!(len, "format reader read");
            let _ = reply.send(answer(result, failure));
        }
        IoRequest::Seek { to, reply } => {
            let result = match to {
                SeekFrom::Start(offset) => io.seek_to(offset).await,
                SeekFrom::Current(delta) => io.seek(delta, Whence::Current).await,
                SeekFrom::End(delta) => io.seek(delta, Whence::End).await,
            };
            trace!(?to, "format reader seek");
            let _ = reply.send(answer(result, failure));
        }
    }
}

fn answer<T>(result: IoResult<T>, failure: &mut Option<IoError>) -> io::Result<T> {
    result.map_err(|e| {
        let error = io::Error::other(e.to_string());
        failure.get_or_insert(e);
        error
    })
}

fn engine_error(error: SymphoniaError, failure: Option<IoError>) -> EngineError {
    if let Some(io) = failure {
        return EngineError::Io(io);
    }
    match error {
        SymphoniaError::IoError(e) if e.kind() == ErrorKind::UnexpectedEof => {
            EngineError::InvalidData {
                reason: "data ended inside a container structure".to_string(),
            }
        }
        SymphoniaError::Unsupported(feature) => EngineError::Unsupported {
            reason: feature.to_string(),
        },
        SymphoniaError::SeekError(kind) => EngineError::Seek {
            reason: format!("{kind:?}"),
        },
        other => EngineError::InvalidData {
            reason: other.to_string(),
        },
    }
}

fn tag_entry(tag: &SymphoniaTag) -> (String, String) {
    let key = tag
        .std_key
        .and_then(|std_key| TAG_KEYS.iter().find(|(known, _)| *known == std_key))
        .map_or_else(|| tag.key.to_lowercase(), |(_, name)| name.to_string());
    let value = tag.value.to_string().trim_end_matches('\0').to_string();
    (key, value)
}

/// Converts an unsigned time base, rejecting values that do not fit.
fn rational(num: u32, den: u32) -> EngineResult<Rational> {
    match (i32::try_from(num), i32::try_from(den)) {
        (Ok(num), Ok(den)) if num > 0 && den > 0 => Ok(Rational::new(num, den)),
        _ => Err(EngineError::Unsupported {
            reason: format!("time base {num}/{den} out of range"),
        }),
    }
}

fn sample_format(params: &CodecParameters) -> SampleFormat {
    match params.sample_format {
        Some(SymphoniaSampleFormat::U8) => SampleFormat::U8,
        Some(SymphoniaSampleFormat::S16) => SampleFormat::S16,
        Some(SymphoniaSampleFormat::S24 | SymphoniaSampleFormat::S32) => SampleFormat::S32,
        Some(SymphoniaSampleFormat::F32) => SampleFormat::Flt,
        Some(SymphoniaSampleFormat::F64) => SampleFormat::Dbl,
        _ => SampleFormat::None,
    }
}

fn describe_track(index: usize, track: &Track, is_default: bool) -> EngineResult<EngineStream> {
    let params = &track.codec_params;
    let codec_id = CODEC_IDS
        .iter()
        .find(|(codec, _)| *codec == params.codec)
        .map_or(CodecId::None, |(_, id)| *id);
    let media_type = if params.codec == CODEC_TYPE_NULL {
        MediaType::Unknown
    } else {
        MediaType::Audio
    };
    let time_base = match (params.time_base, params.sample_rate) {
        (Some(tb), _) => rational(tb.numer, tb.denom)?,
        (None, Some(rate)) => rational(1, rate)?,
        (None, None) => TIME_BASE_Q,
    };

    let mut stream = EngineStream::new(index, media_type, codec_id, time_base);
    stream.id = i32::try_from(track.id).unwrap_or(i32::MAX);
    stream.channels = params.channels.map_or(0, |channels| channels.count() as u32);
    stream.sample_rate = params.sample_rate.unwrap_or(0);
    stream.sample_format = sample_format(params);
    stream.start_time = i64::try_from(params.start_ts).unwrap_or(NOPTS_VALUE);
    stream.duration = params
        .n_frames
        .and_then(|frames| i64::try_from(frames).ok())
        .unwrap_or(NOPTS_VALUE);
    stream.nb_frames = stream.duration.max(0);
    stream.is_default = is_default;
    if let Some(extra) = &params.extra_data {
        stream.extradata = extra.to_vec();
    }
    // Uncompressed payloads have a fixed rate
    if let Some(bits) = params.bits_per_coded_sample.or(params.bits_per_sample) {
        if codec_id.name().starts_with("pcm_") {
            stream.bit_rate =
                i64::from(bits) * i64::from(stream.channels) * i64::from(stream.sample_rate);
        }
    }
    if let Some(language) = &track.language {
        stream.metadata.push(("language".to_string(), language.clone()));
    }
    Ok(stream)
}

fn describe_tracks(
    kind: ContainerKind,
    reader: &dyn FormatReader,
    tags: Vec<(String, String)>,
    byte_len: Option<u64>,
) -> EngineResult<FormatContext> {
    let default_id = reader.default_track().map(|track| track.id);
    let mut streams = Vec::with_capacity(reader.tracks().len());
    for (index, track) in reader.tracks().iter().enumerate() {
        let mut stream = describe_track(index, track, Some(track.id) == default_id)?;
        stream.metadata.extend(tags.iter().cloned());
        streams.push(stream);
    }

    let duration = streams
        .iter()
        .filter(|stream| stream.duration != NOPTS_VALUE)
        .map(|stream| rescale_q(stream.duration, stream.time_base, TIME_BASE_Q))
        .max()
        .unwrap_or(NOPTS_VALUE);
    let bit_rate = match byte_len {
        Some(len) if duration > 0 => {
            (i128::from(len) * 8 * i128::from(TIME_BASE) / i128::from(duration)) as i64
        }
        _ => streams.iter().map(|stream| stream.bit_rate).sum(),
    };

    Ok(FormatContext {
        format_name: kind.format_name().to_string(),
        start_time: 0,
        duration,
        bit_rate,
        nb_chapters: 0,
        flags: 0,
        streams,
    })
}

/// Byte distance of `timestamp` from the start of a constant bit rate
/// stream, or `None` when the rate is unknown.
fn byte_offset(stream: &EngineStream, timestamp: i64) -> Option<i128> {
    let Rational { num, den } = stream.time_base;
    if stream.bit_rate <= 0 || num <= 0 || den <= 0 {
        return None;
    }
    let bits = (i128::from(timestamp.max(0)) * i128::from(num))
        .checked_mul(i128::from(stream.bit_rate))
        .unwrap_or(i128::MAX);
    Some(bits / (i128::from(den) * 8))
}

/// An opened container read through symphonia.
pub struct SymphoniaDemuxer {
    format: FormatContext,
    /// Parked here between calls; `None` only if a call was interrupted.
    reader: Option<Box<dyn FormatReader>>,
    requests: mpsc::UnboundedReceiver<IoRequest>,
    /// Symphonia track id for each stream index.
    track_ids: Vec<u32>,
    /// Forward seek target: packets of this track before it are dropped.
    skip_until: Option<(u32, u64)>,
    byte_len: Option<u64>,
}

impl SymphoniaDemuxer {
    /// Runs `op` against the reader on the blocking pool while serving its
    /// byte requests from `io`.
    async fn with_reader<T, F>(&mut self, io: &mut ByteSourceAdapter, op: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn FormatReader) -> Result<T, SymphoniaError> + Send + 'static,
    {
        let Some(mut reader) = self.reader.take() else {
            // Unblock a reader stranded by an interrupted call
            while self.requests.try_recv().is_ok() {}
            return Err(EngineError::InvalidData {
                reason: "format reader lost by an interrupted call".to_string(),
            });
        };

        let job = task::spawn_blocking(move || {
            let result = op(reader.as_mut());
            (reader, result)
        });
        let ((reader, result), failure) = serve_until_done(io, &mut self.requests, job).await?;
        self.reader = Some(reader);
        result.map_err(|e| engine_error(e, failure))
    }
}

#[async_trait]
impl Demuxer for SymphoniaDemuxer {
    fn format(&self) -> &FormatContext {
        &self.format
    }

    async fn find_stream_info(&mut self, _io: &mut ByteSourceAdapter) -> EngineResult<()> {
        // Probing already parsed every track header
        Ok(())
    }

    async fn read_frame(
        &mut self,
        io: &mut ByteSourceAdapter,
        packet: &mut RawPacket,
    ) -> EngineResult<bool> {
        packet.unref();

        loop {
            let next = self
                .with_reader(io, |reader| match reader.next_packet() {
                    Ok(next) => Ok(Some(next)),
                    Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                        Ok(None)
                    }
                    Err(e) => Err(e),
                })
                .await?;
            let Some(next) = next else {
                return Ok(false);
            };

            if let Some((track_id, required)) = self.skip_until {
                if next.track_id() == track_id {
                    if next.ts() < required {
                        continue;
                    }
                    self.skip_until = None;
                }
            }
            let Some(index) = self.track_ids.iter().position(|id| *id == next.track_id()) else {
                continue;
            };

            packet.stream_index = index;
            packet.pts = i64::try_from(next.ts()).unwrap_or(i64::MAX);
            packet.dts = packet.pts;
            packet.duration = i64::try_from(next.dur()).unwrap_or(0);
            packet.keyframe = true;
            packet.data.extend_from_slice(next.buf());
            return Ok(true);
        }
    }

    async fn seek_frame(
        &mut self,
        io: &mut ByteSourceAdapter,
        stream_index: usize,
        timestamp: i64,
        flags: SeekFlags,
    ) -> EngineResult<()> {
        let (Some(stream), Some(&track_id)) = (
            self.format.streams.get(stream_index),
            self.track_ids.get(stream_index),
        ) else {
            return Err(EngineError::Seek {
                reason: format!("no stream {stream_index}"),
            });
        };
        if stream.duration != NOPTS_VALUE && timestamp > stream.duration {
            return Err(EngineError::Seek {
                reason: format!(
                    "timestamp {timestamp} is past the end of stream {stream_index} ({})",
                    stream.duration
                ),
            });
        }

        if let Some(offset) = byte_offset(stream, timestamp) {
            let limit = self.byte_len.map_or(i128::from(i64::MAX), i128::from);
            if offset > limit {
                return Err(EngineError::Seek {
                    reason: format!(
                        "timestamp {timestamp} lies beyond the data of stream {stream_index}"
                    ),
                });
            }
        }

        let ts = u64::try_from(timestamp).unwrap_or(0);
        let seeked = self
            .with_reader(io, move |reader| {
                reader.seek(SeekMode::Accurate, SeekTo::TimeStamp { ts, track_id })
            })
            .await
            .map_err(|e| match e {
                EngineError::Seek { .. } => e,
                other => EngineError::Seek {
                    reason: other.to_string(),
                },
            })?;

        self.skip_until =
            (!flags.contains(SeekFlags::BACKWARD)).then_some((track_id, seeked.required_ts));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use symphonia::core::audio::Channels;
    use symphonia::core::units::TimeBase;

    use super::*;
    use crate::source::MemorySource;

    /// 16-bit stereo PCM with a LIST/INFO title.
    fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
        let data_len = frames * 4;
        let info: &[u8] = b"INFOINAM\x05\0\0\0Tone\0\0";
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(4 + 24 + 8 + info.len() as u32 + 8 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 4).to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"LIST");
        out.extend_from_slice(&(info.len() as u32).to_le_bytes());
        out.extend_from_slice(info);
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend((0..data_len).map(|i| i as u8));
        out
    }

    async fn open(data: Vec<u8>) -> (Box<dyn Demuxer>, ByteSourceAdapter) {
        let mut io = ByteSourceAdapter::new(Box::new(MemorySource::new(Bytes::from(data))), 512);
        let mut demuxer = SymphoniaEngine.open(&mut io).await.unwrap();
        demuxer.find_stream_info(&mut io).await.unwrap();
        (demuxer, io)
    }

    #[test]
    fn test_detect_container_kinds() {
        assert_eq!(ContainerKind::detect(&wav_bytes(8000, 1)), Some(ContainerKind::Wav));
        assert_eq!(ContainerKind::detect(b"fLaC\0\0\0\x22"), Some(ContainerKind::Flac));
        assert_eq!(ContainerKind::detect(b"OggS\0\x02\0\0"), Some(ContainerKind::Ogg));
        assert_eq!(ContainerKind::detect(b"\0\0\0\x20ftypM4A "), Some(ContainerKind::Mp4));
        assert_eq!(ContainerKind::detect(b"\x1a\x45\xdf\xa3\x01"), Some(ContainerKind::Matroska));
        assert_eq!(ContainerKind::detect(b"ID3\x04\0\0"), Some(ContainerKind::Mp3));
        assert_eq!(ContainerKind::detect(&[0xff, 0xfb, 0x90, 0x64]), Some(ContainerKind::Mp3));
        assert_eq!(ContainerKind::detect(&[0xff, 0xf1, 0x50, 0x80]), Some(ContainerKind::Adts));
        assert_eq!(ContainerKind::detect(b"RIFF"), None);
        assert_eq!(ContainerKind::detect(b"SIMC\0\0\0\0"), None);
    }

    #[test]
    fn test_signature_scores() {
        assert_eq!(SymphoniaEngine.probe(&wav_bytes(8000, 1)), 90);
        assert_eq!(SymphoniaEngine.probe(&[0xff, 0xfb, 0x90, 0x64]), 50);
        assert_eq!(SymphoniaEngine.probe(b"not media"), 0);
    }

    #[test]
    fn test_oversized_time_base_is_rejected() {
        assert_eq!(rational(1, 48_000).unwrap(), Rational::new(1, 48_000));
        assert!(matches!(
            rational(1, u32::MAX),
            Err(EngineError::Unsupported { .. })
        ));
        assert!(rational(0, 1000).is_err());

        // A sample rate past i32 range must not become a negative time base
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_PCM_S16LE)
            .with_sample_rate(u32::MAX)
            .with_channels(Channels::FRONT_LEFT);
        let track = Track::new(0, params);
        assert!(matches!(
            describe_track(0, &track, true),
            Err(EngineError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_describe_track_maps_codec_parameters() {
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_PCM_S16LE)
            .with_sample_rate(8000)
            .with_time_base(TimeBase::new(1, 8000))
            .with_n_frames(16_000)
            .with_bits_per_sample(16)
            .with_channels(Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let stream = describe_track(0, &Track::new(3, params), true).unwrap();

        assert_eq!(stream.id, 3);
        assert_eq!(stream.media_type, MediaType::Audio);
        assert_eq!(stream.codec_id, CodecId::PcmS16le);
        assert_eq!(stream.time_base, Rational::new(1, 8000));
        assert_eq!(stream.duration, 16_000);
        assert_eq!(stream.channels, 2);
        assert_eq!(stream.bit_rate, 256_000);
        assert!(stream.is_default);
    }

    #[tokio::test]
    async fn test_open_wav_and_read_every_byte() {
        let (mut demuxer, mut io) = open(wav_bytes(8000, 2500)).await;
        let format = demuxer.format();
        assert_eq!(format.format_name, "wav");
        assert_eq!(format.streams.len(), 1);
        assert_eq!(format.streams[0].codec_id, CodecId::PcmS16le);
        assert_eq!(format.streams[0].duration, 2500);
        assert!(
            format.streams[0]
                .metadata
                .contains(&("title".to_string(), "Tone".to_string()))
        );

        let mut packet = RawPacket::new();
        let mut next_pts = 0;
        let mut total = 0;
        while demuxer.read_frame(&mut io, &mut packet).await.unwrap() {
            assert_eq!(packet.pts, next_pts);
            assert!(packet.keyframe);
            next_pts += packet.duration;
            total += packet.data.len();
        }
        assert_eq!(next_pts, 2500);
        assert_eq!(total, 10_000);
    }

    #[tokio::test]
    async fn test_seek_lands_on_requested_frame() {
        let (mut demuxer, mut io) = open(wav_bytes(8000, 16_000)).await;
        let mut packet = RawPacket::new();

        demuxer
            .seek_frame(&mut io, 0, 8000, SeekFlags::BACKWARD)
            .await
            .unwrap();
        assert!(demuxer.read_frame(&mut io, &mut packet).await.unwrap());
        assert_eq!(packet.pts, 8000);

        assert!(matches!(
            demuxer.seek_frame(&mut io, 3, 0, SeekFlags::NONE).await,
            Err(EngineError::Seek { .. })
        ));
    }

    #[tokio::test]
    async fn test_seek_past_the_end_is_rejected_without_moving() {
        let (mut demuxer, mut io) = open(wav_bytes(8000, 16_000)).await;

        let result = demuxer
            .seek_frame(&mut io, 0, i64::MAX, SeekFlags::BACKWARD)
            .await;
        assert!(matches!(result, Err(EngineError::Seek { .. })));

        // The reader is still usable
        demuxer
            .seek_frame(&mut io, 0, 0, SeekFlags::BACKWARD)
            .await
            .unwrap();
        let mut packet = RawPacket::new();
        assert!(demuxer.read_frame(&mut io, &mut packet).await.unwrap());
        assert_eq!(packet.pts, 0);
    }

    #[test]
    fn test_byte_offset_of_constant_rate_stream() {
        let mut stream = EngineStream::new(0, MediaType::Audio, CodecId::PcmS16le, Rational::new(1, 8000));
        assert_eq!(byte_offset(&stream, 8000), None);

        stream.bit_rate = 128_000;
        assert_eq!(byte_offset(&stream, 8000), Some(16_000));
        assert_eq!(byte_offset(&stream, -5), Some(0));
        // No overflow at the far end of the timestamp range
        assert!(byte_offset(&stream, i64::MAX).unwrap() > i128::from(i64::MAX));
    }

    #[tokio::test]
    async fn test_truncated_header_is_invalid_data() {
        let data = b"RIFF\x24\0\0\0WAVEfmt \x10\0\0\0\x01\0\x02\0".to_vec();
        let mut io = ByteSourceAdapter::new(Box::new(MemorySource::new(Bytes::from(data))), 64);

        assert!(matches!(
            SymphoniaEngine.open(&mut io).await,
            Err(EngineError::InvalidData { .. })
        ));
    }
}
