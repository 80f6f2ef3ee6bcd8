//! Image build driver.
//!
//! Lays each MPEG input into the image as a track surrounded by its gap
//! structure, then synthesizes the ISO filesystem over sectors 0..900 and
//! renders the TOC. The writer state is carried explicitly instead of the
//! globals the classic tools used.

use std::fs;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::image::{ImageWriter, Truncate};
use crate::isofs::{self, TrackExtent, ISO_FS_BLOCKS};
use crate::scanner::{PackRecord, PackScanner};
use crate::sector::{
    self, XaSubHeader, FORM2_DATA_SIZE, SUBMODE_AUDIO, SUBMODE_EOF, SUBMODE_EOR, SUBMODE_FORM2,
    SUBMODE_REAL_TIME, SUBMODE_VIDEO,
};
use crate::toc::{self, TocTrack};
use crate::{VcdError, VcdResult};

/// Maximum number of MPEG inputs on one disc
pub const MAX_TRACKS: usize = 32;

/// Pre-gap in front of every track
const PRE_GAP_SECTORS: u32 = 150;
/// Empty Form 2 sectors between the pre-gap and the first pack
const LEADER_SECTORS: u32 = 30;
/// Empty Form 2 sectors after the last pack
const TRAILER_SECTORS: u32 = 40;
/// Pre-gap-style sectors closing a track, after the EOF marker
const POST_GAP_SECTORS: u32 = 4;

/// Tracks with fewer packs than this are rejected
const MIN_TRACK_RECORDS: u32 = 150;

/// Identity strings and output locations for an image build
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// ISO volume identifier, up to 32 characters
    pub volume_id: String,
    /// Album identifier stored in `INFO.VCD`, up to 16 characters
    pub album_id: String,
    /// Where to write the disc image
    pub image_path: PathBuf,
    /// Where to write the TOC descriptor
    pub toc_path: PathBuf,
}

impl Default for BuildOptions {
    fn default() -> BuildOptions {
        BuildOptions {
            volume_id: "LINUX VIDEO CD".to_string(),
            album_id: "1".to_string(),
            image_path: PathBuf::from("vcd_image.bin"),
            toc_path: PathBuf::from("vcd.toc"),
        }
    }
}

/// Incremental image builder: feed it one MPEG system stream per track,
/// then `finish` to lay down the filesystem
pub struct ImageBuilder<W> {
    image: ImageWriter<W>,
    tracks: Vec<TocTrack>,
    /// Next LSN to be written
    cursor: u32,
}

impl<W: Write + Seek + Truncate> ImageBuilder<W> {
    /// Start a build writing into `out`, which is assumed to be empty.
    /// MPEG data starts right after the filesystem area.
    pub fn new(out: W) -> ImageBuilder<W> {
        ImageBuilder {
            image: ImageWriter::new(out),
            tracks: Vec::new(),
            cursor: ISO_FS_BLOCKS,
        }
    }

    /// Append `input` as the next MPEG track. A stream that turns bad after
    /// its first pack (illegal start code, oversized pack) only loses this
    /// track: the image is rolled back to where the track began and the
    /// build goes on. A stream that cannot even produce a first pack, or
    /// one with fewer than 150 packs, fails the build.
    pub fn add_track<R: Read>(&mut self, name: &str, input: R) -> VcdResult<()> {
        if self.tracks.len() >= MAX_TRACKS {
            return Err(VcdError::CapacityExceeded(format!(
                "maximum of {} MPEG files exceeded",
                MAX_TRACKS
            )));
        }

        let track_base = self.cursor;
        let file_number = (self.tracks.len() + 1) as u8;
        let zero = [0u8; FORM2_DATA_SIZE];

        let pre_gap = XaSubHeader {
            file: 0,
            channel: 0,
            submode: SUBMODE_FORM2,
            coding: 0,
        };
        let empty = XaSubHeader {
            file: file_number,
            channel: 0,
            submode: SUBMODE_FORM2 | SUBMODE_REAL_TIME,
            coding: 0,
        };

        for _ in 0..PRE_GAP_SECTORS {
            self.push(pre_gap, &zero)?;
        }

        let start_lsn = self.cursor;

        for _ in 0..LEADER_SECTORS {
            self.push(empty, &zero)?;
        }

        let mut scanner = PackScanner::new(input);
        let mut records = 0u32;

        loop {
            match scanner.next_record() {
                Ok(Some(record)) => {
                    self.push(record_sub_header(file_number, &record), &record.data)?;
                    records += 1;

                    if record.end_of_stream {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err @ VcdError::Io(_)) => return Err(err),
                Err(err) => {
                    if !scanner.has_started() {
                        // Not an MPEG system stream at all
                        return Err(err);
                    }

                    warn!("skipping {}: {}", name, err);
                    self.image.rewind_to(track_base)?;
                    self.cursor = track_base;
                    return Ok(());
                }
            }
        }

        if records < MIN_TRACK_RECORDS {
            return Err(VcdError::Truncated(format!(
                "not enough MPEG data in {}: got {} packs, need {}",
                name, records, MIN_TRACK_RECORDS
            )));
        }

        for _ in 0..TRAILER_SECTORS {
            self.push(empty, &zero)?;
        }

        let eof = XaSubHeader {
            file: file_number,
            channel: 0,
            submode: SUBMODE_EOF | SUBMODE_REAL_TIME | SUBMODE_FORM2 | SUBMODE_EOR,
            coding: 0,
        };
        self.push(eof, &zero)?;

        for _ in 0..POST_GAP_SECTORS {
            self.push(pre_gap, &zero)?;
        }

        info!("done with {}, got {} pack sectors", name, records);

        self.tracks.push(TocTrack {
            source: name.to_string(),
            start_lsn,
            sectors: records + LEADER_SECTORS + TRAILER_SECTORS + POST_GAP_SECTORS + 1,
        });

        Ok(())
    }

    /// Synthesize the filesystem and return the underlying sink together
    /// with the final track list
    pub fn finish(
        mut self,
        volume_id: &str,
        album_id: &str,
        timestamp: DateTime<Utc>,
    ) -> VcdResult<(W, Vec<TocTrack>)> {
        let extents: Vec<TrackExtent> = self
            .tracks
            .iter()
            .map(|t| TrackExtent {
                start_lsn: t.start_lsn,
                sectors: t.sectors,
            })
            .collect();

        isofs::write_filesystem(&mut self.image, &extents, volume_id, album_id, timestamp)?;
        self.image.flush()?;

        Ok((self.image.into_inner(), self.tracks))
    }

    fn push(&mut self, sub: XaSubHeader, data: &[u8; FORM2_DATA_SIZE]) -> VcdResult<()> {
        let sector = sector::encode_form2(self.cursor, sub, data);
        self.image.put(self.cursor, &sector)?;
        self.cursor += 1;

        Ok(())
    }
}

/// XA sub-header for a pack record: the stream id of the last packet
/// selects the video/audio bits and the coding byte, the final record of a
/// stream gets the end-of-record bit on top
fn record_sub_header(file: u8, record: &PackRecord) -> XaSubHeader {
    let (mut submode, coding) = match record.last_stream_id {
        Some(0xe0) => (SUBMODE_FORM2 | SUBMODE_REAL_TIME | SUBMODE_VIDEO, 0x0f),
        Some(0xc0) => (SUBMODE_FORM2 | SUBMODE_REAL_TIME | SUBMODE_AUDIO, 0x7f),
        _ => (SUBMODE_FORM2 | SUBMODE_REAL_TIME, 0x00),
    };

    if record.end_of_stream {
        submode |= SUBMODE_EOR;
    }

    XaSubHeader {
        file,
        channel: 1,
        submode,
        coding,
    }
}

/// Build `vcd_image.bin` and `vcd.toc` from the given MPEG files. On any
/// fatal error both output files are removed so no truncated artifacts are
/// left behind.
pub fn build(inputs: &[PathBuf], options: &BuildOptions, timestamp: DateTime<Utc>) -> VcdResult<()> {
    build_inner(inputs, options, timestamp).map_err(|err| {
        let _ = fs::remove_file(&options.image_path);
        let _ = fs::remove_file(&options.toc_path);
        err
    })
}

fn build_inner(
    inputs: &[PathBuf],
    options: &BuildOptions,
    timestamp: DateTime<Utc>,
) -> VcdResult<()> {
    if inputs.len() > MAX_TRACKS {
        return Err(VcdError::CapacityExceeded(format!(
            "maximum of {} MPEG files exceeded",
            MAX_TRACKS
        )));
    }

    let out = File::create(&options.image_path)?;
    let mut builder = ImageBuilder::new(out);

    for path in inputs {
        info!("copying {}", path.display());

        let file = File::open(path)?;
        builder.add_track(&path.display().to_string(), BufReader::new(file))?;
    }

    let (_, tracks) = builder.finish(&options.volume_id, &options.album_id, timestamp)?;

    let image_name = options.image_path.display().to_string();
    let mut toc = File::create(&options.toc_path)?;
    toc::write_toc(&mut toc, &image_name, &tracks)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    /// A system stream of `packs` video packs followed by the program end
    /// code
    fn synthetic_stream(packs: usize) -> Vec<u8> {
        let mut stream = Vec::new();

        for i in 0..packs {
            stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xba]);
            stream.extend_from_slice(&[0x21, 0x00, 0x01, 0x1e, 0x65, 0x80, 0x2d, 0x21]);

            let body = [0x0f, i as u8, 1, 2, 3, 4];
            stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xe0]);
            stream.extend_from_slice(&(body.len() as u16).to_be_bytes());
            stream.extend_from_slice(&body);
        }

        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xb9]);

        stream
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2001, 7, 14, 12, 30, 5).unwrap()
    }

    fn build_one(packs: usize) -> (Vec<u8>, Vec<TocTrack>) {
        let mut builder = ImageBuilder::new(Cursor::new(Vec::new()));
        builder
            .add_track("a.mpg", Cursor::new(synthetic_stream(packs)))
            .unwrap();

        let (image, tracks) = builder.finish("LINUX VIDEO CD", "1", timestamp()).unwrap();

        (image.into_inner(), tracks)
    }

    fn sub_header(image: &[u8], lsn: u32) -> &[u8] {
        let start = lsn as usize * 2352 + 16;
        &image[start..start + 4]
    }

    #[test]
    fn minimal_track_layout() {
        let (image, tracks) = build_one(150);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].start_lsn, 1050);
        // 150 packs + 30 leader + 40 trailer + 1 EOF + 4 post-gap
        assert_eq!(tracks[0].sectors, 225);

        // 900 filesystem + 150 pre-gap + 225 track sectors
        assert_eq!(image.len(), 1275 * 2352);

        // Pre-gap: no file number, Form 2 only
        assert_eq!(sub_header(&image, 900), &[0, 0, 0x20, 0]);
        assert_eq!(sub_header(&image, 1049), &[0, 0, 0x20, 0]);

        // Leader
        assert_eq!(sub_header(&image, 1050), &[1, 0, 0x60, 0]);
        assert_eq!(sub_header(&image, 1079), &[1, 0, 0x60, 0]);

        // Video packs on channel 1
        assert_eq!(sub_header(&image, 1080), &[1, 1, 0x62, 0x0f]);
        // The last pack also carries the end-of-record bit
        assert_eq!(sub_header(&image, 1229), &[1, 1, 0x63, 0x0f]);

        // Trailer, EOF marker, post-gap
        assert_eq!(sub_header(&image, 1230), &[1, 0, 0x60, 0]);
        assert_eq!(sub_header(&image, 1269), &[1, 0, 0x60, 0]);
        assert_eq!(sub_header(&image, 1270), &[1, 0, 0xe1, 0]);
        assert_eq!(sub_header(&image, 1271), &[0, 0, 0x20, 0]);
        assert_eq!(sub_header(&image, 1274), &[0, 0, 0x20, 0]);

        // Exactly one sector in the whole track area has the EOF bit set
        let eof_count = (900..1275)
            .filter(|&lsn| image[lsn as usize * 2352 + 18] & 0x80 != 0)
            .count();
        assert_eq!(eof_count, 1);

        // The filesystem went in below
        let info = &image[150 * 2352 + 24..];
        assert_eq!(&info[0..8], b"VIDEO_CD");
        let entries = &image[151 * 2352 + 24..];
        assert_eq!(&entries[0..8], b"ENTRYVCD");
        assert_eq!(entries[11], 1);
        // Track 1 starts at LSN 1050 -> MSF 00:16:00
        assert_eq!(&entries[12..16], &[2, 0x00, 0x16, 0x00]);
    }

    #[test]
    fn short_track_is_rejected() {
        let mut builder = ImageBuilder::new(Cursor::new(Vec::new()));

        let err = builder
            .add_track("a.mpg", Cursor::new(synthetic_stream(149)))
            .unwrap_err();

        assert!(matches!(err, VcdError::Truncated(_)));
    }

    #[test]
    fn bad_file_after_first_pack_is_skipped() {
        let mut builder = ImageBuilder::new(Cursor::new(Vec::new()));

        builder
            .add_track("good.mpg", Cursor::new(synthetic_stream(150)))
            .unwrap();

        // A pack followed by an illegal start code
        let mut bad = synthetic_stream(1);
        bad.truncate(bad.len() - 4);
        bad.extend_from_slice(&[0x00, 0x00, 0x01, 0xaf]);

        builder.add_track("bad.mpg", Cursor::new(bad)).unwrap();

        let (image, tracks) = builder.finish("LINUX VIDEO CD", "1", timestamp()).unwrap();

        // Only the good track survived and the bad one left no sectors
        assert_eq!(tracks.len(), 1);
        assert_eq!(image.into_inner().len(), 1275 * 2352);
    }

    #[test]
    fn non_system_stream_is_fatal() {
        let mut builder = ImageBuilder::new(Cursor::new(Vec::new()));

        let err = builder
            .add_track("video.m1v", Cursor::new(vec![0x00, 0x00, 0x01, 0xb3, 0x16]))
            .unwrap_err();

        assert!(matches!(err, VcdError::InvalidInput(_)));
    }

    #[test]
    fn second_track_follows_first() {
        let mut builder = ImageBuilder::new(Cursor::new(Vec::new()));
        builder
            .add_track("a.mpg", Cursor::new(synthetic_stream(150)))
            .unwrap();
        builder
            .add_track("b.mpg", Cursor::new(synthetic_stream(151)))
            .unwrap();

        let (_, tracks) = builder.finish("LINUX VIDEO CD", "1", timestamp()).unwrap();

        assert_eq!(tracks[0].start_lsn, 1050);
        // Second pre-gap starts where the first track ended
        assert_eq!(tracks[1].start_lsn, 1275 + 150);
        assert_eq!(tracks[1].sectors, 226);

        // Sub-headers of the second track carry file number 2
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn builds_are_deterministic() {
        let (first, _) = build_one(150);
        let (second, _) = build_one(150);

        assert_eq!(first, second);
    }

    #[test]
    fn rejects_more_than_32_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = (0..33).map(|i| PathBuf::from(format!("{}.mpg", i))).collect();

        let options = BuildOptions {
            image_path: dir.path().join("vcd_image.bin"),
            toc_path: dir.path().join("vcd.toc"),
            ..BuildOptions::default()
        };

        let err = build(&inputs, &options, timestamp()).unwrap_err();
        assert!(matches!(err, VcdError::CapacityExceeded(_)));
    }

    #[test]
    fn build_cleans_up_outputs_on_failure() {
        let dir = tempfile::tempdir().unwrap();

        let input = dir.path().join("short.mpg");
        fs::write(&input, synthetic_stream(10)).unwrap();

        let options = BuildOptions {
            image_path: dir.path().join("vcd_image.bin"),
            toc_path: dir.path().join("vcd.toc"),
            ..BuildOptions::default()
        };

        let err = build(&[input], &options, timestamp()).unwrap_err();
        assert!(matches!(err, VcdError::Truncated(_)));

        assert!(!options.image_path.exists());
        assert!(!options.toc_path.exists());
    }

    #[test]
    fn build_writes_image_and_toc() {
        let dir = tempfile::tempdir().unwrap();

        let input = dir.path().join("movie.mpg");
        fs::write(&input, synthetic_stream(150)).unwrap();

        let options = BuildOptions {
            image_path: dir.path().join("vcd_image.bin"),
            toc_path: dir.path().join("vcd.toc"),
            ..BuildOptions::default()
        };

        build(&[input], &options, timestamp()).unwrap();

        let image = fs::read(&options.image_path).unwrap();
        assert_eq!(image.len(), 1275 * 2352);

        let toc = fs::read_to_string(&options.toc_path).unwrap();
        assert!(toc.starts_with("CD_ROM_XA\n"));
        assert!(toc.contains("DATAFILE"));
        assert!(toc.contains("#2469600"));
    }
}
