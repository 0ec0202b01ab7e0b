//! Engine packets to [`Packet`].

use bytes::Bytes;

use super::{Packet, to_seconds};
use crate::engine::{NOPTS_VALUE, RawPacket, Rational};

/// Normalizes `raw`, copying its payload so the result outlives the next
/// engine read. The timestamp comes from the presentation time, falling
/// back to the decode time.
pub fn normalize_packet(raw: &RawPacket, time_base: Rational) -> Packet {
    let timestamp = if raw.pts != NOPTS_VALUE {
        to_seconds(raw.pts, time_base)
    } else {
        to_seconds(raw.dts, time_base)
    };

    Packet {
        stream_index: raw.stream_index,
        keyframe: raw.keyframe,
        timestamp,
        duration: to_seconds(raw.duration, time_base),
        size: raw.data.len(),
        data: Bytes::copy_from_slice(&raw.data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pts: i64, dts: i64) -> RawPacket {
        RawPacket {
            stream_index: 2,
            pts,
            dts,
            duration: 1024,
            keyframe: true,
            data: vec![9, 8, 7],
        }
    }

    #[test]
    fn test_rescales_to_seconds() {
        let packet = normalize_packet(&raw(44100, 0), Rational::new(1, 44100));

        assert_eq!(packet.stream_index, 2);
        assert!(packet.keyframe);
        assert_eq!(packet.timestamp, 1.0);
        assert!((packet.duration - 1024.0 / 44100.0).abs() < 1e-12);
        assert_eq!(packet.size, 3);
    }

    #[test]
    fn test_falls_back_to_decode_time() {
        let tb = Rational::new(1, 1000);
        assert_eq!(normalize_packet(&raw(NOPTS_VALUE, 500), tb).timestamp, 0.5);
        assert_eq!(normalize_packet(&raw(NOPTS_VALUE, NOPTS_VALUE), tb).timestamp, 0.0);
    }

    #[test]
    fn test_payload_survives_engine_reuse() {
        let mut scratch = raw(0, 0);
        let packet = normalize_packet(&scratch, Rational::new(1, 1000));

        scratch.unref();
        scratch.data.extend_from_slice(&[0, 0, 0, 0]);

        assert_eq!(&packet.data[..], &[9, 8, 7]);
    }
}
