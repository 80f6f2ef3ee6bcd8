//! Error-detection code stored in every CD-ROM XA sector.
//!
//! This is a 32-bit CRC with the reflected polynomial `0xD8018001`
//! (`0x8001801B` in forward notation), zero initial value and no final
//! inversion, computed least-significant-bit first and stored
//! little-endian.

const EDC_POLY: u32 = 0xd801_8001;

static EDC_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;

        while bit < 8 {
            crc = (crc >> 1) ^ if crc & 1 != 0 { EDC_POLY } else { 0 };
            bit += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Compute the EDC over `data`
pub fn compute(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &b| {
        (crc >> 8) ^ EDC_TABLE[((crc ^ u32::from(b)) & 0xff) as usize]
    })
}
