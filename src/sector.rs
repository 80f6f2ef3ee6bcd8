//! CD-ROM XA sector assembly.
//!
//! Sectors are encoded as pure functions from (mode, logical sector number,
//! payload) to the full 2352-byte raw sector, including sync pattern, BCD
//! header, duplicated sub-header, EDC and (Form 1 only) Reed-Solomon
//! parity.

use arrayref::array_mut_ref;

use crate::ecc;
use crate::edc;
use crate::msf::Msf;

/// Size of a raw CD sector in bytes
pub const SECTOR_RAW_SIZE: usize = 2352;

/// User payload of a Mode 2 Form 1 sector
pub const FORM1_DATA_SIZE: usize = 2048;

/// User payload of a Mode 2 Form 2 sector
pub const FORM2_DATA_SIZE: usize = 2324;

/// Number of lead-in sectors separating the start of the disc from logical
/// sector 0: the header address of LSN `n` is the MSF of `n + 150`
pub const LEAD_IN_SECTORS: u32 = 150;

/// Sync pattern at the start of every CD-ROM sector
const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00,
];

/// End Of Record bit in the sub-header submode byte
pub const SUBMODE_EOR: u8 = 1;
/// Video bit in the sub-header submode byte
pub const SUBMODE_VIDEO: u8 = 1 << 1;
/// Audio bit in the sub-header submode byte
pub const SUBMODE_AUDIO: u8 = 1 << 2;
/// Data bit in the sub-header submode byte
pub const SUBMODE_DATA: u8 = 1 << 3;
/// Form bit in the sub-header submode byte (set means Form 2)
pub const SUBMODE_FORM2: u8 = 1 << 5;
/// Real-time bit in the sub-header submode byte
pub const SUBMODE_REAL_TIME: u8 = 1 << 6;
/// End Of File bit in the sub-header submode byte
pub const SUBMODE_EOF: u8 = 1 << 7;

/// Mode 2 XA sub-header (from the CDi "green book"):
///
///   byte 0: File Number
///   byte 1: Channel Number
///   byte 2: Submode
///   byte 3: Coding Information
///
/// The sub-header occupies bytes 16..24 of the raw sector, just after the
/// CD-ROM header; the 4 bytes are stored twice and both copies must be
/// identical.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct XaSubHeader {
    /// File number, used to tell interleaved files apart
    pub file: u8,
    /// Channel number
    pub channel: u8,
    /// Submode bit field (see the `SUBMODE_*` constants)
    pub submode: u8,
    /// Coding information, only meaningful for audio and video sectors
    pub coding: u8,
}

impl XaSubHeader {
    /// Sub-header used for every ISO filesystem sector: plain Form 1 data
    pub fn data() -> XaSubHeader {
        XaSubHeader {
            file: 0,
            channel: 0,
            submode: SUBMODE_DATA,
            coding: 0,
        }
    }

    fn write(&self, pair: &mut [u8; 8]) {
        pair[0] = self.file;
        pair[1] = self.channel;
        pair[2] = self.submode;
        pair[3] = self.coding;
        let (first, second) = pair.split_at_mut(4);
        second.copy_from_slice(first);
    }
}

/// Write the sync pattern, the BCD MSF of `lsn + 150` and the mode byte
fn write_header(sector: &mut [u8; SECTOR_RAW_SIZE], lsn: u32, mode: u8) {
    sector[..12].copy_from_slice(&SYNC_PATTERN);

    let msf = Msf::from_sector_index(lsn + LEAD_IN_SECTORS)
        .expect("sector address beyond 99:59:74");
    let (m, s, f) = msf.into_bcd();

    sector[12] = m.bcd();
    sector[13] = s.bcd();
    sector[14] = f.bcd();
    sector[15] = mode;
}

/// Encode a Mode 0 sector: sync, header and an all-zero data block
pub fn encode_mode0(lsn: u32) -> [u8; SECTOR_RAW_SIZE] {
    let mut sector = [0u8; SECTOR_RAW_SIZE];

    write_header(&mut sector, lsn, 0);

    sector
}

/// Encode a Mode 2 Form 1 sector: 2048 bytes of user data protected by the
/// EDC and the P/Q Reed-Solomon parity
pub fn encode_form1(
    lsn: u32,
    sub_header: XaSubHeader,
    data: &[u8; FORM1_DATA_SIZE],
) -> [u8; SECTOR_RAW_SIZE] {
    let mut sector = [0u8; SECTOR_RAW_SIZE];

    write_header(&mut sector, lsn, 2);
    sub_header.write(array_mut_ref![sector, 16, 8]);
    sector[24..2072].copy_from_slice(data);

    let edc = edc::compute(&sector[16..2072]);
    sector[2072..2076].copy_from_slice(&edc.to_le_bytes());

    ecc::generate(&mut sector);

    sector
}

/// Encode a Mode 2 Form 2 sector: 2324 bytes of user data followed by the
/// EDC. The EDC is optional for Form 2 but we always store it.
pub fn encode_form2(
    lsn: u32,
    sub_header: XaSubHeader,
    data: &[u8; FORM2_DATA_SIZE],
) -> [u8; SECTOR_RAW_SIZE] {
    let mut sector = [0u8; SECTOR_RAW_SIZE];

    write_header(&mut sector, lsn, 2);
    sub_header.write(array_mut_ref![sector, 16, 8]);
    sector[24..2348].copy_from_slice(data);

    let edc = edc::compute(&sector[16..2348]);
    sector[2348..2352].copy_from_slice(&edc.to_le_bytes());

    sector
}
