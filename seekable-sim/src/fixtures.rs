//! Ready-made media files for tests.

use bytes::{BufMut, Bytes, BytesMut};

/// Builder for a 16-bit PCM RIFF/WAVE file holding a deterministic sawtooth.
#[derive(Debug, Clone)]
pub struct WavFixture {
    sample_rate: u32,
    channels: u16,
    frames: u32,
    tags: Vec<([u8; 4], String)>,
    streaming_size: bool,
}

impl WavFixture {
    pub fn new(sample_rate: u32, channels: u16, seconds: f64) -> Self {
        Self {
            sample_rate,
            channels,
            frames: (f64::from(sample_rate) * seconds) as u32,
            tags: Vec::new(),
            streaming_size: false,
        }
    }

    /// Adds a `LIST/INFO` entry, e.g. `*b"INAM"` for the title.
    pub fn with_info(mut self, id: [u8; 4], value: &str) -> Self {
        self.tags.push((id, value.to_string()));
        self
    }

    /// Writes `0xffffffff` as both the RIFF and data sizes, as encoders
    /// writing to a pipe do.
    pub fn with_streaming_size(mut self) -> Self {
        self.streaming_size = true;
        self
    }

    pub fn block_align(&self) -> u16 {
        self.channels * 2
    }

    pub fn data_len(&self) -> usize {
        self.frames as usize * usize::from(self.block_align())
    }

    pub fn build(&self) -> Bytes {
        let mut body = BytesMut::new();
        body.put_slice(b"WAVE");

        body.put_slice(b"fmt ");
        body.put_u32_le(16);
        body.put_u16_le(1);
        body.put_u16_le(self.channels);
        body.put_u32_le(self.sample_rate);
        body.put_u32_le(self.sample_rate * u32::from(self.block_align()));
        body.put_u16_le(self.block_align());
        body.put_u16_le(16);

        if !self.tags.is_empty() {
            let mut list = BytesMut::new();
            list.put_slice(b"INFO");
            for (id, value) in &self.tags {
                let len = value.len() + 1;
                list.put_slice(id);
                list.put_u32_le(len as u32);
                list.put_slice(value.as_bytes());
                list.put_u8(0);
                if len % 2 == 1 {
                    list.put_u8(0);
                }
            }
            body.put_slice(b"LIST");
            body.put_u32_le(list.len() as u32);
            body.put_slice(&list);
        }

        body.put_slice(b"data");
        if self.streaming_size {
            body.put_u32_le(u32::MAX);
        } else {
            body.put_u32_le(self.data_len() as u32);
        }
        for frame in 0..self.frames {
            for channel in 0..self.channels {
                let sample = ((frame % 200) as i16 - 100) * 100 + i16::try_from(channel).unwrap_or(0);
                body.put_i16_le(sample);
            }
        }

        let mut out = BytesMut::with_capacity(body.len() + 8);
        out.put_slice(b"RIFF");
        if self.streaming_size {
            out.put_u32_le(u32::MAX);
        } else {
            out.put_u32_le(body.len() as u32);
        }
        out.put_slice(&body);
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let fixture = WavFixture::new(8000, 2, 0.5).with_info(*b"INAM", "Tone");
        let bytes = fixture.build();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(fixture.data_len(), 16000);
        // header + fmt + LIST("INFO" + "INAM" + len + "Tone\0" + pad) + data header
        assert_eq!(bytes.len(), 12 + 24 + 8 + 4 + 8 + 6 + 8 + 16000);
    }

    #[test]
    fn test_streaming_sizes() {
        let bytes = WavFixture::new(8000, 1, 0.1).with_streaming_size().build();
        assert_eq!(&bytes[4..8], &u32::MAX.to_le_bytes());
        assert_eq!(&bytes[40..44], &u32::MAX.to_le_bytes());
    }
}
