//! MPEG-1 Layer II audio elementary stream input.

use std::io;
use std::io::Read;

use log::warn;

use crate::{VcdError, VcdResult};

/// Bitrates in kbit/s per layer, indexed by the 4-bit header field
const BITRATES: [[u32; 16]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
];

/// Audio elementary stream positioned right behind its first frame header
#[derive(Debug)]
pub struct AudioStream<R> {
    input: R,
    bitrate: u32,
}

impl<R: Read> AudioStream<R> {
    /// Parse the 32-bit frame header at the start of `input` and check it
    /// against what a Video CD needs. Only Layer II with a fixed bitrate is
    /// accepted; non-standard bitrate, sample rate or channel mode get a
    /// warning but pass. The four header bytes stay consumed, the
    /// multiplexed payload starts right behind them.
    pub fn open(mut input: R) -> VcdResult<AudioStream<R>> {
        let mut bytes = [0u8; 4];
        input
            .read_exact(&mut bytes)
            .map_err(|_| VcdError::Truncated("audio input shorter than a frame header".to_string()))?;
        let header = u32::from_be_bytes(bytes);

        if header & 0xfff8_0000 != 0xfff8_0000 {
            return Err(VcdError::InvalidInput(
                "audio input is not an ISO 11172-3 stream".to_string(),
            ));
        }

        let layer = (header >> 17) & 3;
        let bitrate_index = (header >> 12) & 0xf;
        let frequency = (header >> 10) & 3;
        let mode = (header >> 6) & 3;

        // The 2-bit layer field counts down: 3 is Layer I, 2 Layer II
        if layer != 2 {
            return Err(VcdError::Unsupported(format!(
                "layer {} audio, a Video CD takes layer II",
                4 - layer
            )));
        }

        let bitrate = BITRATES[(3 - layer) as usize][bitrate_index as usize];
        if bitrate == 0 {
            return Err(VcdError::Unsupported(
                "free-format audio bitrate".to_string(),
            ));
        }

        let mut warnings = 0;
        if bitrate != 224 {
            warn!("audio bitrate for a VCD should be 224 kbit/s, found {}", bitrate);
            warnings += 1;
        }
        if frequency != 0 {
            warn!("audio sample rate for a VCD should be 44.1 kHz");
            warnings += 1;
        }
        if mode != 0 {
            warn!("audio mode for a VCD should be stereo");
            warnings += 1;
        }
        if warnings > 0 {
            warn!("the audio input does not comply with VCD requirements, the output might not play everywhere");
        }

        Ok(AudioStream { input, bitrate })
    }

    /// Bitrate in kbit/s
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Read up to `buf.len()` payload bytes, returning how many were
    /// actually read. A short count means the input is exhausted.
    pub fn read_payload(&mut self, mut buf: &mut [u8]) -> VcdResult<usize> {
        let mut total = 0;

        while !buf.is_empty() {
            match self.input.read(buf) {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    let tmp = buf;
                    buf = &mut tmp[n..];
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod test {
    use super::AudioStream;
    use crate::VcdError;
    use std::io::Cursor;

    /// 224 kbit/s, 44.1 kHz, stereo Layer II header
    pub fn vcd_header() -> [u8; 4] {
        [0xff, 0xfd, 0xb0, 0x00]
    }

    #[test]
    fn parses_vcd_conformant_header() {
        let mut stream = Vec::from(vcd_header());
        stream.extend_from_slice(&[1, 2, 3, 4, 5]);

        let mut audio = AudioStream::open(Cursor::new(stream)).unwrap();

        assert_eq!(audio.bitrate(), 224);

        // The payload picks up right behind the header
        let mut buf = [0u8; 8];
        assert_eq!(audio.read_payload(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_garbage() {
        let err = AudioStream::open(Cursor::new(vec![0x52, 0x49, 0x46, 0x46])).unwrap_err();

        assert!(matches!(err, VcdError::InvalidInput(_)));
    }

    #[test]
    fn rejects_layer_three() {
        // Layer field 01
        let err = AudioStream::open(Cursor::new(vec![0xff, 0xfb, 0xb0, 0x00])).unwrap_err();

        assert!(matches!(err, VcdError::Unsupported(_)));
    }

    #[test]
    fn rejects_free_format_bitrate() {
        let err = AudioStream::open(Cursor::new(vec![0xff, 0xfd, 0x00, 0x00])).unwrap_err();

        assert!(matches!(err, VcdError::Unsupported(_)));
    }
}
