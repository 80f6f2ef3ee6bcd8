//! MPEG-1 system stream pack scanner.
//!
//! Splits a system stream into its packs, one record per pack, each record
//! payload sized for a Mode 2 Form 2 sector. The scanner also reports the
//! elementary-stream id of the last packet seen in the pack (which drives
//! the XA sub-header downstream) and whether the stream ended.

use std::io;
use std::io::Read;

use crate::sector::FORM2_DATA_SIZE;
use crate::{VcdError, VcdResult};

/// `0x000001BA`, starts a pack
const PACK_START: u32 = 0x1ba;
/// `0x000001B9`, ends the whole program stream
const PROGRAM_END: u32 = 0x1b9;
/// `0x000001BB`, system header packet
const SYSTEM_HEADER: u32 = 0x1bb;

/// One MPEG pack, repacked into a Form 2 payload
pub struct PackRecord {
    /// Pack bytes, zero padded to the full Form 2 payload size
    pub data: [u8; FORM2_DATA_SIZE],
    /// Stream id of the last audio/video packet in the pack, or of the
    /// single stream declared by a one-stream system header
    pub last_stream_id: Option<u8>,
    /// True if this is the last record of the stream
    pub end_of_stream: bool,
}

enum State {
    /// No start code read yet
    Start,
    /// A start code was read but not yet consumed
    Pending(u32),
    /// The stream is finished
    Done,
}

/// Lazy pack iterator over an MPEG-1 system stream
pub struct PackScanner<R> {
    input: R,
    state: State,
    started: bool,
}

impl<R: Read> PackScanner<R> {
    /// Create a scanner reading from `input`. The input is read byte-wise,
    /// so hand in something buffered.
    pub fn new(input: R) -> PackScanner<R> {
        PackScanner {
            input,
            state: State::Start,
            started: false,
        }
    }

    /// True once the initial pack start code has been accepted. Callers use
    /// this to tell a stream that went bad (recoverable per input file)
    /// from one that never was an MPEG system stream.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Return the next pack, or `None` once the stream is exhausted
    pub fn next_record(&mut self) -> VcdResult<Option<PackRecord>> {
        let pending = match self.state {
            State::Done => return Ok(None),
            State::Pending(code) => code,
            State::Start => {
                let code = match self.read_start_code()? {
                    Some(code) => code,
                    None => return Err(VcdError::Truncated("MPEG file is empty".to_string())),
                };

                if code != PACK_START {
                    return Err(VcdError::InvalidInput(format!(
                        "not an MPEG system stream, starts with {:#010x}",
                        code
                    )));
                }

                self.started = true;
                code
            }
        };

        let mut record = PackRecord {
            data: [0; FORM2_DATA_SIZE],
            last_stream_id: None,
            end_of_stream: false,
        };

        put_code(&mut record.data, 0, pending);

        // A deferred program end code becomes a record of its own
        if pending == PROGRAM_END {
            self.state = State::Done;
            record.end_of_stream = true;
            return Ok(Some(record));
        }

        // The 8 bytes of pack header following the start code
        if self.fill(&mut record.data[4..12])? < 8 {
            return Ok(Some(self.finish(record)));
        }

        let mut n = 12;

        loop {
            let code = match self.read_start_code()? {
                Some(code) => code,
                None => return Ok(Some(self.finish(record))),
            };

            if !(PROGRAM_END..=0x1ff).contains(&code) {
                return Err(VcdError::InvalidInput(format!(
                    "illegal MPEG start code {:#010x}",
                    code
                )));
            }

            match code {
                PACK_START => {
                    self.state = State::Pending(code);
                    return Ok(Some(record));
                }
                PROGRAM_END => {
                    if n + 4 <= FORM2_DATA_SIZE {
                        put_code(&mut record.data, n, code);
                        return Ok(Some(self.finish(record)));
                    }

                    // No room left: the end code becomes the next record
                    self.state = State::Pending(code);
                    return Ok(Some(record));
                }
                _ => {
                    // System header, padding, private or PES packet: a
                    // 2-byte big-endian length followed by the packet body
                    let mut len_bytes = [0u8; 2];
                    if self.fill(&mut len_bytes)? < 2 {
                        return Ok(Some(self.finish(record)));
                    }
                    let len = u16::from_be_bytes(len_bytes) as usize;

                    if n + 4 + 2 + len > FORM2_DATA_SIZE {
                        return Err(VcdError::CapacityExceeded(format!(
                            "{} byte MPEG packet does not fit a {} byte pack",
                            len, FORM2_DATA_SIZE
                        )));
                    }

                    put_code(&mut record.data, n, code);
                    record.data[n + 4..n + 6].copy_from_slice(&len_bytes);

                    let body = n + 6;
                    if self.fill(&mut record.data[body..body + len])? < len {
                        return Ok(Some(self.finish(record)));
                    }

                    if code == SYSTEM_HEADER && len == 9 {
                        // A system header declaring exactly one stream also
                        // tags the pack with that stream's id
                        record.last_stream_id = Some(record.data[body + 6]);
                    }
                    if (0x1c0..=0x1ff).contains(&code) {
                        record.last_stream_id = Some((code & 0xff) as u8);
                    }

                    n = body + len;
                }
            }
        }
    }

    fn finish(&mut self, mut record: PackRecord) -> PackRecord {
        self.state = State::Done;
        record.end_of_stream = true;
        record
    }

    /// Read the next 32-bit start code: at least 4 bytes, shifting further
    /// while the upper 24 bits are still zero (this skips stuffing zeroes
    /// in front of the code). Returns `None` on end of input.
    fn read_start_code(&mut self) -> VcdResult<Option<u32>> {
        let mut code = 0u32;
        let mut n = 0;

        loop {
            let mut byte = [0u8; 1];
            if self.fill(&mut byte)? == 0 {
                return Ok(None);
            }

            code = (code << 8) | u32::from(byte[0]);
            n += 1;

            if n >= 4 && code & 0xffff_ff00 != 0 {
                return Ok(Some(code));
            }
        }
    }

    /// Read until `buf` is full or the input ends, returning the number of
    /// bytes actually read
    fn fill(&mut self, mut buf: &mut [u8]) -> VcdResult<usize> {
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

fn put_code(data: &mut [u8; FORM2_DATA_SIZE], offset: usize, code: u32) {
    data[offset..offset + 4].copy_from_slice(&code.to_be_bytes());
}
