//! Random-access retrieval of a single packet.

use tracing::trace;

use crate::engine::{MediaType, Rational, SeekFlags, TIME_BASE, TIME_BASE_Q, rescale_q};
use crate::error::{BridgeError, BridgeResult};
use crate::normalize::{Packet, normalize_packet};
use crate::session::Session;

/// Resolves the stream an operation works on.
pub(crate) fn select_stream(
    session: &Session,
    media_type: MediaType,
    wanted: Option<usize>,
) -> BridgeResult<(usize, Rational)> {
    let index = session
        .demuxer
        .find_best_stream(media_type, wanted)
        .ok_or(BridgeError::StreamNotFound { media_type })?;
    let time_base = session
        .demuxer
        .format()
        .streams
        .get(index)
        .map(|stream| stream.time_base)
        .ok_or(BridgeError::StreamNotFound { media_type })?;
    Ok((index, time_base))
}

/// Seeks stream `index` to `seconds`.
pub(crate) async fn seek_stream(
    session: &mut Session,
    index: usize,
    time_base: Rational,
    seconds: f64,
    flags: SeekFlags,
) -> BridgeResult<()> {
    let micros = (seconds * TIME_BASE as f64) as i64;
    let target = rescale_q(micros, TIME_BASE_Q, time_base);
    trace!(stream = index, seconds, target, "seeking stream");

    session
        .demuxer
        .seek_frame(&mut session.io, index, target, flags)
        .await
        .map_err(BridgeError::from_seek)
}

/// Seeks to `timestamp` seconds and returns the first packet of the selected
/// stream read from there.
///
/// # Errors
///
/// - `BridgeError::StreamNotFound` - No stream of `media_type`
/// - `BridgeError::Seek` - The engine rejected the seek
/// - `BridgeError::PacketRead` - Data ended or a packet was empty before a match
/// - `BridgeError::Io` - The byte source failed
pub async fn fetch_packet(
    session: &mut Session,
    media_type: MediaType,
    wanted: Option<usize>,
    timestamp: f64,
    flags: SeekFlags,
) -> BridgeResult<Packet> {
    let (index, time_base) = select_stream(session, media_type, wanted)?;
    seek_stream(session, index, time_base, timestamp, flags).await?;

    let Session {
        demuxer, io, packet, ..
    } = session;

    loop {
        let got = demuxer
            .read_frame(io, packet)
            .await
            .map_err(BridgeError::from_read)?;
        if !got {
            return Err(BridgeError::PacketRead {
                reason: format!("no packet for stream {index} at {timestamp}s"),
            });
        }
        if packet.stream_index == index {
            break;
        }
    }

    if packet.data.is_empty() {
        packet.unref();
        return Err(BridgeError::PacketRead {
            reason: format!("empty packet for stream {index} at {timestamp}s"),
        });
    }

    let normalized = normalize_packet(packet, time_base);
    packet.unref();
    Ok(normalized)
}
