//! MPEG-1 video elementary stream input.
//!
//! Parses the sequence header for the multiplexing parameters and then
//! serves the stream frame by frame. The saved sequence header (plus
//! quantizer matrices and, for MPEG-2, the sequence extension) is
//! re-injected in front of every GOP that is not already preceded by one,
//! so that playback can start at any entry point.

use std::io;
use std::io::{Read, Seek, SeekFrom};

use log::info;

use crate::{VcdError, VcdResult};

const PICTURE_START: u32 = 0x100;
const SEQUENCE_HEADER: u32 = 0x1b3;
const SEQUENCE_EXTENSION: u32 = 0x1b5;
const SEQUENCE_END: u32 = 0x1b7;
const GOP_HEADER: u32 = 0x1b8;

/// A frame should be far smaller than this
const MAX_FRAME_SIZE: usize = 512 * 1024;

/// Picture rates indexed by the 4-bit sequence header field
const FRAME_RATES: [f64; 16] = [
    0.0, 23.976, 24.0, 25.0, 29.97, 30.0, 50.0, 59.94, 60.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

/// One coded picture pulled out of the elementary stream
pub struct Frame {
    /// Frame bytes, including any injected sequence header
    pub data: Vec<u8>,
    /// Position in decode order
    pub number: u64,
    /// Position in display order (GOP origin plus temporal reference)
    pub sequence: u64,
    /// Picture coding type: 1 = I, 2 = P, 3 = B
    pub picture_type: u32,
}

/// Video elementary stream with its multiplexing parameters
#[derive(Debug)]
pub struct VideoStream<R> {
    input: R,
    /// Sequence header bytes to re-inject before GOPs
    sequence_header: Vec<u8>,
    /// In units of 400 bit/s
    bitrate: u32,
    /// 90 kHz clock ticks per frame
    ticks_per_frame: i64,
    /// 2 for interlaced MPEG-2 material, 1 otherwise
    fields_per_frame: i64,
    /// Start code most recently shifted in; 0 before the first read
    last_code: u32,
    /// Decode-order number of the first picture of the current GOP
    gop_start_frame: u64,
    frame_no: u64,
    /// A sequence header was seen since the last GOP
    seq_header_seen: bool,
}

impl<R: Read + Seek> VideoStream<R> {
    /// Parse the sequence header, look ahead for an MPEG-2 sequence
    /// extension, then rewind the input to the start. Variable bitrate and
    /// picture rates other than PAL and NTSC are refused.
    pub fn open(mut input: R) -> VcdResult<VideoStream<R>> {
        let mut header = vec![0u8; 12];
        input
            .read_exact(&mut header)
            .map_err(|_| VcdError::Truncated("video input shorter than a sequence header".to_string()))?;

        if header[0] != 0 || header[1] != 0 || header[2] != 1 || header[3] != 0xb3 {
            return Err(VcdError::InvalidInput(
                "video input is not an MPEG-1 video stream".to_string(),
            ));
        }

        let horizontal = getbits(&header, 32, 12);
        let vertical = getbits(&header, 44, 12);
        let frame_rate_index = getbits(&header, 60, 4);
        let bitrate = getbits(&header, 64, 18);

        info!(
            "video input: {}x{}, {} pictures/sec, {} bit/s",
            horizontal,
            vertical,
            FRAME_RATES[frame_rate_index as usize],
            bitrate * 400
        );

        if bitrate == 0 || bitrate == 0x3ffff {
            return Err(VcdError::Unsupported(
                "variable bitrate video".to_string(),
            ));
        }

        let ticks_per_frame = match frame_rate_index {
            3 => 3600, // PAL, 25 frames/s
            4 => 3003, // NTSC, 29.97 frames/s
            _ => {
                return Err(VcdError::Unsupported(format!(
                    "picture rate {} (only PAL and NTSC)",
                    FRAME_RATES[frame_rate_index as usize]
                )))
            }
        };

        // The quantizer matrices are part of the header we re-inject. The
        // non-intra flag is the lowest bit of the last byte read so far.
        if header[11] & 2 != 0 {
            read_matrix(&mut input, &mut header)?;
        }
        if header[header.len() - 1] & 1 != 0 {
            read_matrix(&mut input, &mut header)?;
        }

        // Look ahead for an MPEG-2 sequence extension before the first
        // picture
        let mut fields_per_frame = 1;
        let mut code = u32::MAX;
        loop {
            let byte = read_byte(&mut input)?.ok_or_else(|| {
                VcdError::Truncated("video input ends inside the header".to_string())
            })?;
            code = (code << 8) | u32::from(byte);

            if code == PICTURE_START || code == SEQUENCE_EXTENSION {
                break;
            }
        }

        if code == SEQUENCE_EXTENSION {
            let mut extension = vec![0x00, 0x00, 0x01, 0xb5, 0, 0, 0, 0, 0, 0];
            input.read_exact(&mut extension[4..]).map_err(|_| {
                VcdError::Truncated("video input ends inside the sequence extension".to_string())
            })?;

            let progressive = getbits(&extension, 44, 1);
            fields_per_frame = if progressive == 0 { 2 } else { 1 };
            info!(
                "MPEG-2 stream, {}",
                if progressive == 1 { "progressive" } else { "interlaced" }
            );

            header.extend_from_slice(&extension);
        }

        input.seek(SeekFrom::Start(0))?;

        Ok(VideoStream {
            input,
            sequence_header: header,
            bitrate,
            ticks_per_frame,
            fields_per_frame,
            last_code: 0,
            gop_start_frame: 0,
            frame_no: 0,
            seq_header_seen: false,
        })
    }

    /// Bitrate in units of 400 bit/s
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// 90 kHz clock ticks per frame: 3600 for PAL, 3003 for NTSC
    pub fn ticks_per_frame(&self) -> i64 {
        self.ticks_per_frame
    }

    /// Number of fields a picture covers for timestamp purposes
    pub fn fields_per_frame(&self) -> i64 {
        self.fields_per_frame
    }

    /// Pull the next frame out of the stream: everything from one picture
    /// start code up to the next one (or the sequence end code). Returns
    /// `None` once the sequence end code has been reached.
    pub fn next_frame(&mut self) -> VcdResult<Option<Frame>> {
        let mut data = Vec::new();

        if self.last_code == 0 {
            // First call: prime the code register and collect everything in
            // front of the first picture (sequence header, GOP header)
            let mut code = 0u32;
            for _ in 0..4 {
                let byte = self.read_input_byte()?.ok_or_else(|| {
                    VcdError::Truncated("video input ends before the first frame".to_string())
                })?;
                code = (code << 8) | u32::from(byte);
            }
            self.last_code = code;

            while self.last_code != PICTURE_START {
                push_byte(&mut data, (self.last_code >> 24) as u8)?;

                let byte = self.read_input_byte()?.ok_or_else(|| {
                    VcdError::Truncated("video input ends before the first frame".to_string())
                })?;
                self.last_code = (self.last_code << 8) | u32::from(byte);
            }
        } else if self.last_code == SEQUENCE_END {
            return Ok(None);
        }

        // The picture start code lands here in the next loop
        let picture_start = data.len();

        let number = self.frame_no;
        self.frame_no += 1;
        let mut sequence = self.gop_start_frame;

        loop {
            push_byte(&mut data, (self.last_code >> 24) as u8)?;

            let byte = self.read_input_byte()?.ok_or_else(|| {
                VcdError::Truncated("video input ends inside a frame".to_string())
            })?;
            self.last_code = (self.last_code << 8) | u32::from(byte);

            // A sequence header of the stream's own makes injection
            // unnecessary for the following GOP
            if self.last_code == SEQUENCE_HEADER {
                self.seq_header_seen = true;
            }

            if self.last_code == GOP_HEADER {
                self.gop_start_frame = self.frame_no;

                if !self.seq_header_seen {
                    for &byte in &self.sequence_header {
                        push_byte(&mut data, byte)?;
                    }
                }
                self.seq_header_seen = false;
            }

            if self.last_code == PICTURE_START || self.last_code == SEQUENCE_END {
                break;
            }
        }

        if data.len() < picture_start + 6 {
            return Err(VcdError::InvalidInput(
                "truncated picture header".to_string(),
            ));
        }

        sequence += u64::from(getbits(&data[picture_start..], 32, 10));
        let picture_type = getbits(&data[picture_start..], 42, 3);

        Ok(Some(Frame {
            data,
            number,
            sequence,
            picture_type,
        }))
    }

    fn read_input_byte(&mut self) -> VcdResult<Option<u8>> {
        read_byte(&mut self.input)
    }
}

fn read_matrix<R: Read>(input: &mut R, header: &mut Vec<u8>) -> VcdResult<()> {
    let mut matrix = [0u8; 64];
    input.read_exact(&mut matrix).map_err(|_| {
        VcdError::Truncated("video input ends inside a quantizer matrix".to_string())
    })?;
    header.extend_from_slice(&matrix);

    Ok(())
}

fn read_byte<R: Read>(input: &mut R) -> VcdResult<Option<u8>> {
    let mut byte = [0u8; 1];

    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn push_byte(data: &mut Vec<u8>, byte: u8) -> VcdResult<()> {
    if data.len() >= MAX_FRAME_SIZE {
        return Err(VcdError::InvalidInput(
            "oversized MPEG frame, is this really a video stream?".to_string(),
        ));
    }
    data.push(byte);

    Ok(())
}

/// Big-endian bit field extraction, `pos` counted from the start of `data`
pub(super) fn getbits(data: &[u8], mut pos: usize, len: usize) -> u32 {
    let mut res = 0;

    for _ in 0..len {
        res <<= 1;
        if data[pos >> 3] & (0x80 >> (pos & 7)) != 0 {
            res |= 1;
        }
        pos += 1;
    }

    res
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::VcdError;
    use std::io::Cursor;

    /// 352x288 PAL sequence header, 1152 kbit/s, no quantizer matrices
    pub fn vcd_sequence_header() -> Vec<u8> {
        vec![
            0x00, 0x00, 0x01, 0xb3, 0x16, 0x01, 0x20, 0x13, 0x02, 0xd0, 0x21, 0x70,
        ]
    }

    fn picture(temporal_reference: u16, picture_type: u8) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0x00];
        // 10 bits temporal reference, 3 bits type, 16 bits vbv_delay
        data.push((temporal_reference >> 2) as u8);
        data.push(((temporal_reference as u8 & 3) << 6) | (picture_type << 3));
        data.extend_from_slice(&[0xff, 0xff, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa]);
        data
    }

    fn gop() -> Vec<u8> {
        vec![0x00, 0x00, 0x01, 0xb8, 0x00, 0x08, 0x00, 0x40]
    }

    fn sample_stream() -> Vec<u8> {
        let mut stream = vcd_sequence_header();
        stream.extend_from_slice(&gop());
        stream.extend_from_slice(&picture(0, 1));
        stream.extend_from_slice(&picture(1, 2));
        // A second GOP without its own sequence header
        stream.extend_from_slice(&gop());
        stream.extend_from_slice(&picture(0, 1));
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xb7]);
        stream
    }

    #[test]
    fn parses_sequence_header() {
        let video = VideoStream::open(Cursor::new(sample_stream())).unwrap();

        assert_eq!(video.bitrate(), 2880);
        assert_eq!(video.ticks_per_frame(), 3600);
        assert_eq!(video.fields_per_frame(), 1);
    }

    #[test]
    fn rejects_variable_bitrate() {
        let mut header = vcd_sequence_header();
        // All-ones bitrate field
        header[8] = 0xff;
        header[9] = 0xff;
        header[10] = 0xe1;

        let err = VideoStream::open(Cursor::new(header)).unwrap_err();
        assert!(matches!(err, VcdError::Unsupported(_)));
    }

    #[test]
    fn rejects_unsupported_picture_rate() {
        let mut header = vcd_sequence_header();
        header[7] = 0x15; // 30 fps

        let mut stream = header;
        stream.extend_from_slice(&picture(0, 1));

        let err = VideoStream::open(Cursor::new(stream)).unwrap_err();
        assert!(matches!(err, VcdError::Unsupported(_)));
    }

    #[test]
    fn rejects_elementary_audio() {
        let err = VideoStream::open(Cursor::new(vec![0xff, 0xfd, 0xb0, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, VcdError::InvalidInput(_)));
    }

    #[test]
    fn extracts_frames_in_order() {
        let mut video = VideoStream::open(Cursor::new(sample_stream())).unwrap();

        let first = video.next_frame().unwrap().unwrap();
        assert_eq!(first.number, 0);
        assert_eq!(first.sequence, 0);
        assert_eq!(first.picture_type, 1);
        // The leading sequence and GOP headers ride along with frame one
        assert_eq!(&first.data[..4], &[0x00, 0x00, 0x01, 0xb3]);

        let second = video.next_frame().unwrap().unwrap();
        assert_eq!(second.number, 1);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.picture_type, 2);
        assert_eq!(&second.data[..4], &[0x00, 0x00, 0x01, 0x00]);

        let third = video.next_frame().unwrap().unwrap();
        assert_eq!(third.number, 2);
        // New GOP: display order restarts at the GOP origin
        assert_eq!(third.sequence, 2);

        assert!(video.next_frame().unwrap().is_none());
        assert!(video.next_frame().unwrap().is_none());
    }

    #[test]
    fn injects_sequence_header_before_bare_gop() {
        let mut video = VideoStream::open(Cursor::new(sample_stream())).unwrap();

        // The second GOP has no sequence header of its own, so the saved
        // one is spliced into the frame preceding it
        let second = video.next_frame().unwrap().unwrap();

        let header = vcd_sequence_header();
        let spliced = second
            .data
            .windows(header.len())
            .any(|window| window == &header[..]);
        assert!(spliced, "expected an injected sequence header");
    }

    #[test]
    fn getbits_extracts_fields() {
        let header = vcd_sequence_header();

        assert_eq!(getbits(&header, 32, 12), 352);
        assert_eq!(getbits(&header, 44, 12), 288);
        assert_eq!(getbits(&header, 60, 4), 3);
        assert_eq!(getbits(&header, 64, 18), 2880);
    }
}
