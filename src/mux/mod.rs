//! MPEG-1 system stream multiplexer for Video CDs.
//!
//! Interleaves one video and one audio elementary stream into a system
//! stream made of fixed 2324-byte packs, each holding one pack header and
//! one PES packet (plus a padding packet where the standard VCD rate asks
//! for it). The output is exactly what the image builder's pack scanner
//! expects to consume.

mod audio;
mod video;

pub use audio::AudioStream;
pub use video::{Frame, VideoStream};

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use log::{info, warn};

use crate::sector::FORM2_DATA_SIZE;
use crate::{VcdError, VcdResult};

/// Pack size of the multiplexed stream, the payload of one Form 2 sector
pub const SECTOR_SIZE: usize = FORM2_DATA_SIZE;

/// Audio payload bytes carried per audio packet
const AUDIO_BYTES: usize = 2279;

/// Decoder-side audio buffer, 4 KB per the VCD system header
const AUDIO_BUFFER_SIZE: i64 = 4096;

/// Maximum video lead over the system clock in 90 kHz ticks. The standard
/// 46 KB MPEG-1 buffer holds roughly a third of a second of video at VCD
/// rates; half a second still fits the memory of the players in the field.
const MAX_VIDEO_BUFFER_TICKS: i64 = 45000;

/// Initial system clock reference
const INITIAL_SCR: i64 = 36000;

/// Initial presentation timestamp base for both streams
const INITIAL_PTS: i64 = 72000;

const MARKER_DTS: u8 = 1;
const MARKER_SCR: u8 = 2;
const MARKER_PTS_ONLY: u8 = 2;
const MARKER_PTS: u8 = 3;

/// Encode a 33-bit 90 kHz timestamp into the 5-byte marker-bit-laced
/// MPEG-1 system layout
fn put_timecode(time: i64, marker: u8, out: &mut [u8]) {
    out[0] = (marker << 4) | (((time >> 29) & 0x6) as u8) | 1;
    out[1] = ((time >> 22) & 0xff) as u8;
    out[2] = ((((time >> 15) & 0x7f) as u8) << 1) | 1;
    out[3] = ((time >> 7) & 0xff) as u8;
    out[4] = (((time & 0x7f) as u8) << 1) | 1;
}

/// One pack being assembled
struct Pack {
    data: [u8; SECTOR_SIZE],
    len: usize,
}

impl Pack {
    /// Start a pack: start code, SCR and mux rate
    fn new(scr: i64, mux_rate: u32) -> Pack {
        let mut pack = Pack {
            data: [0; SECTOR_SIZE],
            len: 12,
        };

        pack.data[0..4].copy_from_slice(&[0x00, 0x00, 0x01, 0xba]);
        put_timecode(scr, MARKER_SCR, &mut pack.data[4..9]);

        pack.data[9] = 0x80 | (mux_rate >> 15) as u8;
        pack.data[10] = (mux_rate >> 7) as u8;
        pack.data[11] = 0x01 | ((mux_rate & 0x7f) << 1) as u8;

        pack
    }

    fn push(&mut self, byte: u8) {
        self.data[self.len] = byte;
        self.len += 1;
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Reserve space that a later step fills in (packet length fields)
    fn skip(&mut self, count: usize) {
        self.len += count;
    }

    fn put_timecode(&mut self, time: i64, marker: u8) {
        put_timecode(time, marker, &mut self.data[self.len..self.len + 5]);
        self.len += 5;
    }

    /// Append a system header packet announcing a single stream with its
    /// decoder buffer size
    fn system_header(&mut self, audio: bool, mux_rate: u32) {
        let (stream_id, audio_bound, video_bound, buffer_scale, buffer_size) = if audio {
            // 32 * 128 bytes = 4 KB
            (0xc0u8, 1u8, 0u8, 0u8, 32u16)
        } else {
            // 46 * 1024 bytes = 46 KB
            (0xe0, 0, 1, 1, 46)
        };

        self.extend(&[0x00, 0x00, 0x01, 0xbb, 0x00, 0x09]);

        self.push(0x80 | (mux_rate >> 15) as u8);
        self.push((mux_rate >> 7) as u8);
        self.push(0x01 | ((mux_rate & 0x7f) << 1) as u8);
        self.push(audio_bound << 2);
        self.push(0x20 | video_bound);
        self.push(0xff);

        self.push(stream_id);
        self.push(0xc0 | (buffer_scale << 5) | (buffer_size >> 8) as u8);
        self.push((buffer_size & 0xff) as u8);
    }

    /// Patch the packet length field, optionally fill the rest of the
    /// sector with a padding packet, and write the full sector out
    fn write<W: Write>(mut self, out: &mut W, add_pad: bool) -> VcdResult<()> {
        assert!(self.len <= SECTOR_SIZE, "sector size exceeded");

        // The single packet always starts at offset 12, so its length
        // field sits at 16..18
        let len = self.len as i64 - 18;
        if len > 0 {
            self.data[16] = (len >> 8) as u8;
            self.data[17] = (len & 0xff) as u8;
        }

        if add_pad && self.len <= SECTOR_SIZE - 8 {
            self.extend(&[0x00, 0x00, 0x01, 0xbe]);

            let pad = SECTOR_SIZE - self.len - 2;
            self.push((pad >> 8) as u8);
            self.push((pad & 0xff) as u8);

            self.push(0x0f); // no timestamp
            while self.len < SECTOR_SIZE {
                self.push(0xff);
            }
        }

        out.write_all(&self.data)?;

        Ok(())
    }
}

/// Multiplex `video_in` and `audio_in` into `out` as a VCD system stream
pub fn multiplex<V, A, W>(video_in: V, audio_in: A, mut out: W) -> VcdResult<()>
where
    V: Read + Seek,
    A: Read,
    W: Write,
{
    let mut video = VideoStream::open(video_in)?;
    let mut audio = AudioStream::open(audio_in)?;

    let tpf = video.ticks_per_frame();
    let nfields = video.fields_per_frame();

    // The standard VCD rate fills every second with exactly 75 sectors and
    // pads them out; anything else gets the smallest multiple-of-5 rate
    // that carries the payload, without padding
    let (sectors_per_second, use_padding) = if video.bitrate() == 2880 && audio.bitrate() == 224 {
        info!("input has VCD bitrates, creating 75 sectors/sec with padding");
        (75u32, true)
    } else {
        let bits_per_second = video.bitrate() * 400 + audio.bitrate() * 1000;
        let rate = bits_per_second.div_ceil(18400).div_ceil(5) * 5;
        info!("creating {} sectors/sec without padding", rate);
        (rate, false)
    };

    // A raw sector has 2352 bytes; the mux rate is in units of 400 bit/s
    let mux_rate = sectors_per_second * 2352 / 50;
    let ticks_per_sector = i64::from(90000 / sectors_per_second);

    let mut scr = INITIAL_SCR;
    let audio_start = INITIAL_PTS;
    let video_start = INITIAL_PTS;
    let mut last_buffer_time = video_start;

    // Two system header packs open the stream, audio first
    let mut pack = Pack::new(scr, mux_rate);
    pack.system_header(true, mux_rate);
    pack.write(&mut out, true)?;

    scr += ticks_per_sector;
    let mut pack = Pack::new(scr, mux_rate);
    pack.system_header(false, mux_rate);
    pack.write(&mut out, true)?;

    let mut num_packs: i64 = 2;
    let mut num_audio_packs: i64 = 0;
    let mut audio_eof = false;
    let mut need_padding = false;
    let mut max_time_diff: i64 = 0;
    let mut last_message_time: i64 = 0;

    let mut frame: Option<Frame> = None;
    let mut bytes_out = 0usize;

    let audio_bytes_per_ms = i64::from(audio.bitrate() / 8);

    loop {
        scr += ticks_per_sector;
        num_packs += 1;

        let mut pack = Pack::new(scr, mux_rate);

        if need_padding {
            pack.write(&mut out, true)?;
            warn!("inserted padding sector {}", num_packs);
            need_padding = false;
            continue;
        }

        // Audio goes out at the start (the 6th pack) and from then on
        // whenever another packet fits the decoder's 4 KB buffer
        let audio_time =
            (num_audio_packs * AUDIO_BYTES as i64 / audio_bytes_per_ms) * 90 + audio_start;

        if !audio_eof
            && ((num_audio_packs == 0 && num_packs == 6)
                || audio_time - scr <= (AUDIO_BUFFER_SIZE - AUDIO_BYTES as i64) * 90 / audio_bytes_per_ms)
        {
            pack.extend(&[0x00, 0x00, 0x01, 0xc0]);
            pack.skip(2); // length, patched on write

            // STD buffer field: scale 0, size 32 -> 4 KB
            pack.extend(&[0x40, 0x20]);
            pack.put_timecode(audio_time, MARKER_PTS_ONLY);

            let start = pack.len;
            let n = audio.read_payload(&mut pack.data[start..start + AUDIO_BYTES])?;
            pack.len += n;

            if n < AUDIO_BYTES {
                audio_eof = true;
                info!(
                    "audio input exhausted after {} bytes",
                    num_audio_packs * AUDIO_BYTES as i64 + n as i64
                );
            }

            pack.write(&mut out, false)?;
            num_audio_packs += 1;
            continue;
        }

        // Video packet header
        pack.extend(&[0x00, 0x00, 0x01, 0xe0]);
        pack.skip(2); // length, patched on write

        let remaining = frame.as_ref().map(|f| f.data.len() - bytes_out).unwrap_or(0);

        // A long frame keeps streaming through untimestamped packets as
        // long as more data remains than the next packet's worst-case
        // header overhead
        if remaining > SECTOR_SIZE - 34 {
            let n = remaining.min(SECTOR_SIZE - 18);

            pack.push(0x0f); // no timestamp
            let data = &frame.as_ref().unwrap().data;
            pack.extend(&data[bytes_out..bytes_out + n - 1]);
            bytes_out += n - 1;

            pack.write(&mut out, false)?;
            continue;
        }

        // The current frame ends in this sector: flush its tail and start
        // the next frame behind it, timestamped
        let residue: Vec<u8> = frame
            .as_ref()
            .map(|f| f.data[bytes_out..].to_vec())
            .unwrap_or_default();

        let next = match video.next_frame()? {
            Some(next) => next,
            None => {
                pack.push(0x0f);
                pack.extend(&residue);
                // Close the video stream with a sequence end code
                pack.extend(&[0x00, 0x00, 0x01, 0xb7]);
                pack.write(&mut out, false)?;

                // One final sector holding just the ISO 11172 end code
                let mut last = [0u8; SECTOR_SIZE];
                last[0..4].copy_from_slice(&[0x00, 0x00, 0x01, 0xb9]);
                out.write_all(&last)?;
                out.flush()?;

                info!(
                    "maximum buffer required: {} KB",
                    max_time_diff / 1200 * SECTOR_SIZE as i64 / 1024
                );
                return Ok(());
            }
        };

        bytes_out = 0;

        if last_buffer_time <= scr {
            warn!("video buffer underrun, output may not play correctly");
        }

        let pts = next.sequence as i64 * tpf / nfields + video_start;
        let dts = next.number as i64 * tpf / nfields + video_start;

        if next.picture_type == 1 || next.picture_type == 2 {
            // I and P frames decode ahead of presentation and carry both
            // timestamps, preceded by the 46 KB STD buffer field
            pack.extend(&[0x60, 0x2e]);
            pack.put_timecode(pts, MARKER_PTS);
            pack.put_timecode(dts, MARKER_DTS);
            last_buffer_time = dts;
        } else {
            pack.put_timecode(pts, MARKER_PTS_ONLY);
            last_buffer_time = pts;
        }

        if next.sequence as i64 * tpf / nfields / 90000 > last_message_time + 10 {
            last_message_time += 10;
            info!("{} seconds multiplexed", last_message_time);
        }

        pack.extend(&residue);
        while pack.len < SECTOR_SIZE && bytes_out < next.data.len() {
            pack.push(next.data[bytes_out]);
            bytes_out += 1;
        }

        pack.write(&mut out, false)?;
        frame = Some(next);

        max_time_diff = max_time_diff.max(last_buffer_time - scr);

        // Keep the decoder's video buffer from overflowing: either pad a
        // sector or, without padding, let the clock run one sector ahead
        need_padding = last_buffer_time - scr > MAX_VIDEO_BUFFER_TICKS;
        if need_padding && !use_padding {
            scr += ticks_per_sector;
            need_padding = false;
        }
    }
}

/// Multiplex two elementary stream files into `out_path`. Refuses to
/// overwrite an existing output file.
pub fn multiplex_files(video_path: &Path, audio_path: &Path, out_path: &Path) -> VcdResult<()> {
    if out_path.exists() {
        return Err(VcdError::InvalidInput(format!(
            "output file {} already exists, not overwriting it",
            out_path.display()
        )));
    }

    let video = BufReader::new(File::open(video_path)?);
    let audio = BufReader::new(File::open(audio_path)?);
    let out = BufWriter::new(File::create(out_path)?);

    multiplex(video, audio, out)
}
