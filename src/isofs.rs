//! ISO 9660 + CD-XA filesystem synthesis for the Video CD.
//!
//! The filesystem occupies logical sectors 0..900 of the image and its
//! layout is fixed:
//!
//! | LSN     | Content                                    |
//! |---------|--------------------------------------------|
//! | 0-15    | zero (system area)                         |
//! | 16      | primary volume descriptor                  |
//! | 17      | volume descriptor set terminator           |
//! | 18      | L-type path table                          |
//! | 19      | M-type path table                          |
//! | 20      | root directory                             |
//! | 21-23   | `CDI`, `MPEGAV`, `VCD` directories         |
//! | 150     | `INFO.VCD` (players rely on this address)  |
//! | 151     | `ENTRIES.VCD` (likewise)                   |
//! | 210     | `CDI_VCD.APP` stub                         |
//! | 900..   | MPEG track data, outside the filesystem    |
//!
//! Everything else up to block 900 is zero filled with Form 1 sectors.

use std::io::{Seek, Write};

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::image::ImageWriter;
use crate::msf::Msf;
use crate::sector::{self, XaSubHeader, FORM1_DATA_SIZE, LEAD_IN_SECTORS};
use crate::{VcdError, VcdResult};

/// Number of 2048-byte blocks occupied by the ISO filesystem
pub const ISO_FS_BLOCKS: u32 = 900;

/// `INFO.VCD` must sit exactly here
pub const INFO_LSN: u32 = 150;

/// `ENTRIES.VCD` must sit exactly here
pub const ENTRIES_LSN: u32 = 151;

const PRIMARY_DESCRIPTOR_LSN: u32 = 16;
const TERMINATOR_LSN: u32 = 17;
const PATH_TABLE_L_LSN: u32 = 18;
const PATH_TABLE_M_LSN: u32 = 19;
const ROOT_DIR_LSN: u32 = 20;

/// Directories are allocated sequentially from 21 and may not reach the
/// `INFO.VCD` address
const DIR_CEILING: u32 = 150;

/// First extent for files outside the `VCD` directory
const START_FILE_LSN: u32 = 210;

/// Every directory occupies a single logical block
const ISO_DIR_SIZE: usize = FORM1_DATA_SIZE;

/// Mandatory system identifier for CD-i bridge discs
const SYSTEM_ID: &str = "CD-RTOS CD-BRIDGE";
const APPLICATION_ID: &str = "CDI/CDI_VCD.APP;1";

/// Location of one MPEG track in the image, as recorded by the image
/// builder and referenced by the `MPEGAV` directory and `ENTRIES.VCD`
#[derive(Copy, Clone, Debug)]
pub struct TrackExtent {
    /// First track sector (right after the pre-gap)
    pub start_lsn: u32,
    /// Number of sectors the track occupies from `start_lsn`
    pub sectors: u32,
}

/// Recording date stamped on every directory record
#[derive(Copy, Clone)]
struct RecordDate {
    year_since_1900: u8,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl RecordDate {
    fn new(at: DateTime<Utc>) -> RecordDate {
        RecordDate {
            year_since_1900: (at.year() - 1900) as u8,
            month: at.month() as u8,
            day: at.day() as u8,
            hour: at.hour() as u8,
            minute: at.minute() as u8,
            second: at.second() as u8,
        }
    }
}

/// A single directory record before serialization
struct DirEntry {
    /// Raw identifier bytes; `0x00` is `.`, `0x01` is `..`
    name: Vec<u8>,
    extent: u32,
    size: u32,
    /// 0 for a file, 2 for a directory
    flags: u8,
    /// CD-XA extension trailer carrying the track's file number, written
    /// for the `MPEGAV` entries only
    xa_file_number: Option<u8>,
}

impl DirEntry {
    fn record_len(&self) -> usize {
        let mut len = 33 + self.name.len();
        if len & 1 != 0 {
            len += 1;
        }
        if self.xa_file_number.is_some() {
            len += 14;
        }
        len
    }

    fn serialize(&self, out: &mut [u8], date: RecordDate) {
        let len = self.record_len();

        out[0] = len as u8;
        // out[1]: no extended attribute record
        put_u32_both(&mut out[2..10], self.extent);
        put_u32_both(&mut out[10..18], self.size);

        out[18] = date.year_since_1900;
        out[19] = date.month;
        out[20] = date.day;
        out[21] = date.hour;
        out[22] = date.minute;
        out[23] = date.second;
        // out[24]: GMT offset in units of 15 minutes, always 0

        out[25] = self.flags;
        // out[26], out[27]: no file units, no interleave
        put_u16_both(&mut out[28..32], 1);

        out[32] = self.name.len() as u8;
        out[33..33 + self.name.len()].copy_from_slice(&self.name);

        if let Some(n) = self.xa_file_number {
            // The XA trailer needed by some players. The 4 preceding and 5
            // trailing bytes stay zero.
            out[len - 10] = 0x15;
            out[len - 9] = 0x55;
            out[len - 8] = b'X';
            out[len - 7] = b'A';
            out[len - 6] = n;
        }
    }
}

/// An ordered directory, serialized to the ISO layout only at the end
struct Directory {
    entries: Vec<DirEntry>,
}

impl Directory {
    /// A fresh directory containing its `.` and `..` entries
    fn new(self_extent: u32, parent_extent: u32) -> Directory {
        let mut dir = Directory {
            entries: Vec::new(),
        };

        dir.add_dir(vec![0x00], self_extent);
        dir.add_dir(vec![0x01], parent_extent);

        dir
    }

    fn add_dir(&mut self, name: Vec<u8>, extent: u32) {
        self.entries.push(DirEntry {
            name,
            extent,
            size: ISO_DIR_SIZE as u32,
            flags: 2,
            xa_file_number: None,
        });
    }

    fn add_file(&mut self, name: &str, extent: u32, size: u32, xa_file_number: Option<u8>) {
        self.entries.push(DirEntry {
            name: name.as_bytes().to_vec(),
            extent,
            size,
            flags: 0,
            xa_file_number,
        });
    }

    fn serialize(&self, date: RecordDate) -> VcdResult<[u8; ISO_DIR_SIZE]> {
        let mut block = [0u8; ISO_DIR_SIZE];
        let mut pos = 0;

        for entry in &self.entries {
            let len = entry.record_len();

            // Records may not straddle a logical block boundary
            if pos % FORM1_DATA_SIZE + len > FORM1_DATA_SIZE {
                pos = (pos / FORM1_DATA_SIZE + 1) * FORM1_DATA_SIZE;
            }

            if pos + len > ISO_DIR_SIZE {
                return Err(VcdError::CapacityExceeded(
                    "directory does not fit a single block".to_string(),
                ));
            }

            entry.serialize(&mut block[pos..pos + len], date);
            pos += len;
        }

        Ok(block)
    }
}

/// Build the two path table sectors (little- and big-endian flavours).
/// Every root entry except `..` becomes a record with the root (directory
/// number 1) as its parent; nesting deeper than one level is not supported.
fn path_tables(root: &Directory) -> VcdResult<([u8; FORM1_DATA_SIZE], [u8; FORM1_DATA_SIZE], u32)> {
    let mut table_l = [0u8; FORM1_DATA_SIZE];
    let mut table_m = [0u8; FORM1_DATA_SIZE];
    let mut size = 0;

    for entry in &root.entries {
        if entry.name == [0x01] {
            continue;
        }

        let record_len = 8 + entry.name.len() + (entry.name.len() & 1);
        if size + record_len > FORM1_DATA_SIZE {
            return Err(VcdError::CapacityExceeded(
                "path table does not fit a single sector".to_string(),
            ));
        }

        table_l[size] = entry.name.len() as u8;
        table_m[size] = entry.name.len() as u8;
        // One zero byte of extended attribute length follows

        table_l[size + 2..size + 6].copy_from_slice(&entry.extent.to_le_bytes());
        table_m[size + 2..size + 6].copy_from_slice(&entry.extent.to_be_bytes());

        table_l[size + 6..size + 8].copy_from_slice(&1u16.to_le_bytes());
        table_m[size + 6..size + 8].copy_from_slice(&1u16.to_be_bytes());

        table_l[size + 8..size + 8 + entry.name.len()].copy_from_slice(&entry.name);
        table_m[size + 8..size + 8 + entry.name.len()].copy_from_slice(&entry.name);

        size += record_len;
    }

    Ok((table_l, table_m, size as u32))
}

/// Build the primary volume descriptor block
fn primary_descriptor(
    volume_id: &str,
    path_table_size: u32,
    date: RecordDate,
    timestamp: DateTime<Utc>,
) -> [u8; FORM1_DATA_SIZE] {
    let mut pvd = [0u8; FORM1_DATA_SIZE];

    pvd[0] = 1;
    pvd[1..6].copy_from_slice(b"CD001");
    pvd[6] = 1;

    put_str(&mut pvd[8..40], SYSTEM_ID);
    put_str(&mut pvd[40..72], volume_id);

    put_u32_both(&mut pvd[80..88], ISO_FS_BLOCKS);
    // Escape sequences stay zero
    put_u16_both(&mut pvd[120..124], 1);
    put_u16_both(&mut pvd[124..128], 1);
    put_u16_both(&mut pvd[128..132], FORM1_DATA_SIZE as u16);

    put_u32_both(&mut pvd[132..140], path_table_size);
    pvd[140..144].copy_from_slice(&PATH_TABLE_L_LSN.to_le_bytes());
    pvd[148..152].copy_from_slice(&PATH_TABLE_M_LSN.to_be_bytes());

    // The root directory record is embedded at byte 156
    let root = DirEntry {
        name: vec![0x00],
        extent: ROOT_DIR_LSN,
        size: ISO_DIR_SIZE as u32,
        flags: 2,
        xa_file_number: None,
    };
    root.serialize(&mut pvd[156..190], date);

    put_str(&mut pvd[190..318], " ");
    put_str(&mut pvd[318..446], " ");
    put_str(&mut pvd[446..574], " ");
    put_str(&mut pvd[574..702], APPLICATION_ID);

    put_str(&mut pvd[702..739], " ");
    put_str(&mut pvd[739..776], " ");
    put_str(&mut pvd[776..813], " ");

    let iso_time = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}00",
        timestamp.year(),
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second()
    );
    // ASCII timestamp plus one binary byte: GMT offset in 15 minute units
    pvd[813..829].copy_from_slice(iso_time.as_bytes());
    pvd[830..846].copy_from_slice(iso_time.as_bytes());
    pvd[847..863].copy_from_slice(b"0000000000000000");
    pvd[864..880].copy_from_slice(iso_time.as_bytes());

    pvd[881] = 1;

    // The string CD-XA001 in this exact position marks the disc as
    // containing XA sectors
    pvd[1024..1032].copy_from_slice(b"CD-XA001");

    pvd
}

/// Build the volume descriptor set terminator block
fn set_terminator() -> [u8; FORM1_DATA_SIZE] {
    let mut block = [0u8; FORM1_DATA_SIZE];

    block[0] = 0xff;
    block[1..6].copy_from_slice(b"CD001");
    block[6] = 0x01;

    block
}

/// Build the `INFO.VCD` block: system identification plus album metadata
fn info_file(album_id: &str) -> [u8; FORM1_DATA_SIZE] {
    let mut block = [0u8; FORM1_DATA_SIZE];

    block[0..8].copy_from_slice(b"VIDEO_CD");
    block[8] = 1;
    block[9] = 1;
    put_str(&mut block[10..26], album_id);
    // 16 reserved zero bytes, then one volume out of one
    block[42..48].copy_from_slice(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);

    block
}

/// Build the `ENTRIES.VCD` block: one BCD MSF entry per MPEG track
fn entries_file(tracks: &[TrackExtent]) -> [u8; FORM1_DATA_SIZE] {
    let mut block = [0u8; FORM1_DATA_SIZE];

    block[0..8].copy_from_slice(b"ENTRYVCD");
    block[8] = 1;
    block[9] = 1;
    block[11] = tracks.len() as u8;

    for (i, track) in tracks.iter().enumerate() {
        let msf = Msf::from_sector_index(track.start_lsn + LEAD_IN_SECTORS)
            .expect("track start beyond 99:59:74");
        let (m, s, f) = msf.into_bcd();

        let entry = &mut block[12 + 4 * i..16 + 4 * i];
        entry[0] = (i + 2) as u8;
        entry[1] = m.bcd();
        entry[2] = s.bcd();
        entry[3] = f.bcd();
    }

    block
}

/// Space-pad `src` into the fixed-width field `out`
fn put_str(out: &mut [u8], src: &str) {
    let src = src.as_bytes();

    for (i, byte) in out.iter_mut().enumerate() {
        *byte = if i < src.len() { src[i] } else { b' ' };
    }
}

/// Write a u32 in both-endian format: 4 bytes little-endian followed by 4
/// bytes big-endian, so readers on either architecture can use it directly
fn put_u32_both(out: &mut [u8], val: u32) {
    out[0..4].copy_from_slice(&val.to_le_bytes());
    out[4..8].copy_from_slice(&val.to_be_bytes());
}

/// Write a u16 in both-endian format
fn put_u16_both(out: &mut [u8], val: u16) {
    out[0..2].copy_from_slice(&val.to_le_bytes());
    out[2..4].copy_from_slice(&val.to_be_bytes());
}

/// Synthesize the whole filesystem into sectors 0..900 of `image`, all of
/// them Form 1 with a plain data sub-header
pub fn write_filesystem<W: Write + Seek>(
    image: &mut ImageWriter<W>,
    tracks: &[TrackExtent],
    volume_id: &str,
    album_id: &str,
    timestamp: DateTime<Utc>,
) -> VcdResult<()> {
    fn put<W: Write + Seek>(
        image: &mut ImageWriter<W>,
        lsn: u32,
        block: &[u8; FORM1_DATA_SIZE],
    ) -> VcdResult<()> {
        image.put(lsn, &sector::encode_form1(lsn, XaSubHeader::data(), block))
    }

    let date = RecordDate::new(timestamp);
    let zero_block = [0u8; FORM1_DATA_SIZE];

    // System area
    for lsn in 0..PRIMARY_DESCRIPTOR_LSN {
        put(image, lsn, &zero_block)?;
    }

    let mut root = Directory::new(ROOT_DIR_LSN, ROOT_DIR_LSN);
    let mut next_dir = ROOT_DIR_LSN + 1;
    let mut next_file = START_FILE_LSN;

    let alloc_dir = |next_dir: &mut u32| -> VcdResult<u32> {
        let lsn = *next_dir;
        if lsn >= DIR_CEILING {
            return Err(VcdError::CapacityExceeded(
                "too many directories".to_string(),
            ));
        }
        *next_dir += 1;
        Ok(lsn)
    };

    // CDI: only a zeroed application stub, kept for ancient CD-i players
    let cdi_lsn = alloc_dir(&mut next_dir)?;
    let mut cdi = Directory::new(cdi_lsn, ROOT_DIR_LSN);
    root.add_dir(b"CDI".to_vec(), cdi_lsn);

    cdi.add_file("CDI_VCD.APP;1", next_file, FORM1_DATA_SIZE as u32, None);
    put(image, next_file, &zero_block)?;
    next_file += 1;

    put(image, cdi_lsn, &cdi.serialize(date)?)?;

    // MPEGAV: pointers at the MPEG tracks outside the filesystem. The
    // recorded length is the sector count times 2048, not a byte count.
    let mpegav_lsn = alloc_dir(&mut next_dir)?;
    let mut mpegav = Directory::new(mpegav_lsn, ROOT_DIR_LSN);
    root.add_dir(b"MPEGAV".to_vec(), mpegav_lsn);

    for (i, track) in tracks.iter().enumerate() {
        let name = format!("AVSEQ{:02}.DAT;1", i + 1);
        mpegav.add_file(
            &name,
            track.start_lsn,
            track.sectors * FORM1_DATA_SIZE as u32,
            Some((i + 1) as u8),
        );
    }

    put(image, mpegav_lsn, &mpegav.serialize(date)?)?;

    // Fill the area behind the last allocated file up to the end of the
    // filesystem
    for lsn in next_file..ISO_FS_BLOCKS {
        put(image, lsn, &zero_block)?;
    }

    // VCD: the two mandatory metadata files at their fixed addresses
    let vcd_lsn = alloc_dir(&mut next_dir)?;
    let mut vcd = Directory::new(vcd_lsn, ROOT_DIR_LSN);
    root.add_dir(b"VCD".to_vec(), vcd_lsn);

    vcd.add_file("ENTRIES.VCD;1", ENTRIES_LSN, FORM1_DATA_SIZE as u32, None);
    put(image, ENTRIES_LSN, &entries_file(tracks))?;

    vcd.add_file("INFO.VCD;1", INFO_LSN, FORM1_DATA_SIZE as u32, None);
    put(image, INFO_LSN, &info_file(album_id))?;

    put(image, vcd_lsn, &vcd.serialize(date)?)?;

    // Gap between the VCD directory data and the other files
    for lsn in ENTRIES_LSN + 1..START_FILE_LSN {
        put(image, lsn, &zero_block)?;
    }

    // Gap between the last directory and the VCD directory data
    for lsn in next_dir..INFO_LSN {
        put(image, lsn, &zero_block)?;
    }

    let (table_l, table_m, path_table_size) = path_tables(&root)?;
    put(image, PATH_TABLE_L_LSN, &table_l)?;
    put(image, PATH_TABLE_M_LSN, &table_m)?;

    put(image, ROOT_DIR_LSN, &root.serialize(date)?)?;

    let pvd = primary_descriptor(volume_id, path_table_size, date, timestamp);
    put(image, PRIMARY_DESCRIPTOR_LSN, &pvd)?;
    put(image, TERMINATOR_LSN, &set_terminator())?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    const TRACKS: [TrackExtent; 2] = [
        TrackExtent {
            start_lsn: 1050,
            sectors: 225,
        },
        TrackExtent {
            start_lsn: 1425,
            sectors: 300,
        },
    ];

    fn sample_image() -> Vec<u8> {
        let mut image = ImageWriter::new(Cursor::new(Vec::new()));

        write_filesystem(
            &mut image,
            &TRACKS,
            "LINUX VIDEO CD",
            "1",
            Utc.with_ymd_and_hms(2001, 7, 14, 12, 30, 5).unwrap(),
        )
        .unwrap();

        image.flush().unwrap();
        image.into_inner().into_inner()
    }

    /// Form 1 payload of the given sector
    fn payload(image: &[u8], lsn: u32) -> &[u8] {
        let start = lsn as usize * 2352 + 24;
        &image[start..start + 2048]
    }

    #[test]
    fn covers_the_whole_filesystem_area() {
        let image = sample_image();

        assert_eq!(image.len(), ISO_FS_BLOCKS as usize * 2352);

        // Every sector is Mode 2 Form 1 with the plain data sub-header
        for lsn in 0..ISO_FS_BLOCKS {
            let sector = &image[lsn as usize * 2352..];
            assert_eq!(sector[15], 2, "mode byte of LSN {}", lsn);
            assert_eq!(&sector[16..20], &[0, 0, 8, 0], "sub-header of LSN {}", lsn);
        }
    }

    #[test]
    fn primary_descriptor_fields() {
        let image = sample_image();
        let pvd = payload(&image, 16);

        assert_eq!(pvd[0], 1);
        assert_eq!(&pvd[1..6], b"CD001");
        assert_eq!(&pvd[8..25], b"CD-RTOS CD-BRIDGE");
        assert_eq!(&pvd[40..54], b"LINUX VIDEO CD");

        // 900 blocks, both-endian
        assert_eq!(&pvd[80..84], &900u32.to_le_bytes());
        assert_eq!(&pvd[84..88], &900u32.to_be_bytes());
        // 2048 byte blocks
        assert_eq!(&pvd[128..130], &2048u16.to_le_bytes());

        // Path tables at 18/19
        assert_eq!(&pvd[140..144], &18u32.to_le_bytes());
        assert_eq!(&pvd[148..152], &19u32.to_be_bytes());

        // Embedded root record points at LSN 20
        assert_eq!(pvd[156], 34);
        assert_eq!(&pvd[158..162], &20u32.to_le_bytes());
        assert_eq!(pvd[156 + 25], 2);

        assert_eq!(&pvd[813..829], b"2001071412300500");
        assert_eq!(pvd[829], 0);
        assert_eq!(&pvd[847..863], b"0000000000000000");
        assert_eq!(pvd[881], 1);
        assert_eq!(&pvd[1024..1032], b"CD-XA001");
    }

    #[test]
    fn terminator_follows_descriptor() {
        let image = sample_image();
        let term = payload(&image, 17);

        assert_eq!(term[0], 0xff);
        assert_eq!(&term[1..6], b"CD001");
        assert_eq!(term[6], 1);
        assert!(term[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn path_tables_list_root_and_subdirectories() {
        let image = sample_image();
        let table = payload(&image, 18);

        // Root: name length 1, extent 20, parent 1, identifier 0
        assert_eq!(table[0], 1);
        assert_eq!(&table[2..6], &20u32.to_le_bytes());
        assert_eq!(&table[6..8], &1u16.to_le_bytes());
        assert_eq!(table[8], 0);

        // CDI follows, padded to even length
        assert_eq!(table[10], 3);
        assert_eq!(&table[12..16], &21u32.to_le_bytes());
        assert_eq!(&table[18..21], b"CDI");

        // MPEGAV
        assert_eq!(table[22], 6);
        assert_eq!(&table[24..28], &22u32.to_le_bytes());
        assert_eq!(&table[30..36], b"MPEGAV");

        // VCD
        assert_eq!(table[36], 3);
        assert_eq!(&table[38..42], &23u32.to_le_bytes());
        assert_eq!(&table[44..47], b"VCD");

        // The M table mirrors the L table with swapped byte order
        let table_m = payload(&image, 19);
        assert_eq!(&table_m[12..16], &21u32.to_be_bytes());
        assert_eq!(&table_m[24..28], &22u32.to_be_bytes());

        // Declared size matches the three directories plus the root
        let pvd = payload(&image, 16);
        let size = u32::from_le_bytes([pvd[132], pvd[133], pvd[134], pvd[135]]);
        assert_eq!(size, 10 + 12 + 14 + 12);
    }

    #[test]
    fn root_directory_lists_subdirectories() {
        let image = sample_image();
        let root = payload(&image, 20);

        // `.` and `..` both point at the root itself
        assert_eq!(root[0], 34);
        assert_eq!(&root[2..6], &20u32.to_le_bytes());
        assert_eq!(root[25], 2);
        assert_eq!(root[33], 0x00);
        assert_eq!(root[34], 34);
        assert_eq!(root[34 + 33], 0x01);

        // "CDI" and "VCD" records are 36 bytes, "MPEGAV" is 40
        let dirs: Vec<&[u8]> = vec![&root[68..], &root[68 + 36..], &root[68 + 36 + 40..]];
        assert_eq!(&dirs[0][33..36], b"CDI");
        assert_eq!(&dirs[1][33..39], b"MPEGAV");
        assert_eq!(&dirs[2][33..36], b"VCD");
        assert_eq!(&dirs[0][2..6], &21u32.to_le_bytes());
        assert_eq!(&dirs[1][2..6], &22u32.to_le_bytes());
        assert_eq!(&dirs[2][2..6], &23u32.to_le_bytes());
    }

    #[test]
    fn mpegav_entries_carry_xa_trailer() {
        let image = sample_image();
        let dir = payload(&image, 22);

        // Skip `.` and `..`
        let first = &dir[68..];
        // "AVSEQ01.DAT;1" is 13 chars: 33 + 13 + 14 = 60
        assert_eq!(first[0], 60);
        assert_eq!(&first[33..46], b"AVSEQ01.DAT;1");
        assert_eq!(&first[2..6], &1050u32.to_le_bytes());
        assert_eq!(&first[10..14], &(225u32 * 2048).to_le_bytes());
        assert_eq!(&first[50..55], &[0x15, 0x55, b'X', b'A', 1]);

        let second = &dir[68 + 60..];
        assert_eq!(&second[33..46], b"AVSEQ02.DAT;1");
        assert_eq!(&second[2..6], &1425u32.to_le_bytes());
        assert_eq!(&second[50..55], &[0x15, 0x55, b'X', b'A', 2]);
    }

    #[test]
    fn info_and_entries_at_fixed_addresses() {
        let image = sample_image();

        let info = payload(&image, 150);
        assert_eq!(&info[0..8], b"VIDEO_CD");
        assert_eq!(&info[8..10], &[1, 1]);
        assert_eq!(&info[10..26], b"1               ");
        assert!(info[26..42].iter().all(|&b| b == 0));
        assert_eq!(&info[42..48], &[0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        assert!(info[48..].iter().all(|&b| b == 0));

        let entries = payload(&image, 151);
        assert_eq!(&entries[0..8], b"ENTRYVCD");
        assert_eq!(&entries[8..12], &[1, 1, 0, 2]);
        // Track 1 starts at LSN 1050 -> MSF 00:16:00
        assert_eq!(&entries[12..16], &[2, 0x00, 0x16, 0x00]);
        // Track 2 starts at LSN 1425 -> MSF 00:21:00
        assert_eq!(&entries[16..20], &[3, 0x00, 0x21, 0x00]);
    }

    #[test]
    fn vcd_directory_lists_metadata_files() {
        let image = sample_image();
        let dir = payload(&image, 23);

        let first = &dir[68..];
        assert_eq!(&first[33..46], b"ENTRIES.VCD;1");
        assert_eq!(&first[2..6], &151u32.to_le_bytes());

        // "ENTRIES.VCD;1" is 13 chars: 33 + 13 = 46 -> no padding
        let second = &dir[68 + 46..];
        assert_eq!(&second[33..43], b"INFO.VCD;1");
        assert_eq!(&second[2..6], &150u32.to_le_bytes());
    }

    #[test]
    fn cdi_stub_is_zeroed() {
        let image = sample_image();

        let dir = payload(&image, 21);
        let first = &dir[68..];
        assert_eq!(&first[33..46], b"CDI_VCD.APP;1");
        assert_eq!(&first[2..6], &210u32.to_le_bytes());

        assert!(payload(&image, 210).iter().all(|&b| b == 0));
    }
}
