//! Rendering of the textual table-of-contents descriptor consumed by
//! cdrdao-style burning tools.

use std::io::Write;

use crate::isofs::ISO_FS_BLOCKS;
use crate::msf::Msf;
use crate::sector::{LEAD_IN_SECTORS, SECTOR_RAW_SIZE};
use crate::VcdResult;

/// One MPEG track as it appears in the TOC
#[derive(Clone, Debug)]
pub struct TocTrack {
    /// Name of the MPEG input the track came from, used in the comment
    pub source: String,
    /// First track sector (right after the pre-gap)
    pub start_lsn: u32,
    /// Number of sectors the track occupies from `start_lsn`
    pub sectors: u32,
}

/// Write the TOC for a finished image. Track 1 is the ISO filesystem, each
/// MPEG input follows as its own MODE2_RAW track addressed by byte offset
/// into the image file.
pub fn write_toc<W: Write>(out: &mut W, image_name: &str, tracks: &[TocTrack]) -> VcdResult<()> {
    writeln!(out, "CD_ROM_XA")?;
    writeln!(out)?;

    writeln!(out, "// Track 1: Header with ISO 9660 file system")?;
    writeln!(out, "TRACK MODE2_RAW")?;
    let length = msf(ISO_FS_BLOCKS + LEAD_IN_SECTORS);
    writeln!(out, "DATAFILE \"{}\" {}", image_name, length)?;
    writeln!(out)?;

    for (i, track) in tracks.iter().enumerate() {
        writeln!(out, "// Track {}: MPEG data from {}", i + 2, track.source)?;
        writeln!(out, "TRACK MODE2_RAW")?;

        // Every track but the last absorbs the following track's pre-gap
        let mut sectors = track.sectors;
        if i + 1 != tracks.len() {
            sectors += LEAD_IN_SECTORS;
        }

        let offset = u64::from(track.start_lsn) * SECTOR_RAW_SIZE as u64;
        writeln!(out, "DATAFILE \"{}\" #{} {}", image_name, offset, msf(sectors))?;
        writeln!(out)?;
    }

    Ok(())
}

fn msf(sectors: u32) -> Msf {
    Msf::from_sector_index(sectors).expect("track length beyond 99:59:74")
}
