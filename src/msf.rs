//! CDs were originally meant for storing music so positions on the
//! disc are stored in "minute:second:frame" format, where frame means
//! sector.
//!
//! There are 75 frames/sectors in a second, 60 seconds in a
//! minute. All three components are stored as BCD.

use std::fmt;

use crate::bcd::Bcd;

/// CD "minute:second:frame" timestamp, given as triplet of *BCD*
/// encoded bytes. In this context "frame" is synonymous with
/// "sector".
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Msf(Bcd, Bcd, Bcd);

impl Msf {
    /// Build an MSF from a BCD triplet. Returns `None` if `s` is
    /// greater than 0x59 or if `f` is greater than 0x74.
    pub fn new(m: Bcd, s: Bcd, f: Bcd) -> Option<Msf> {
        // Make sure the frame and seconds make sense (there are only
        // 75 frames per second and obviously 60 seconds per minute)
        if s.bcd() < 0x60 && f.bcd() < 0x75 {
            Some(Msf(m, s, f))
        } else {
            None
        }
    }

    /// Return the internal BCD triplet
    pub fn into_bcd(self) -> (Bcd, Bcd, Bcd) {
        (self.0, self.1, self.2)
    }

    /// Convert an MSF into a sector index. In this convention sector
    /// index 0 is MSF 00:00:00
    pub fn sector_index(self) -> u32 {
        let Msf(m, s, f) = self;

        let m = m.binary() as u32;
        let s = s.binary() as u32;
        let f = f.binary() as u32;

        // 60 seconds in a minute, 75 sectors(frames) in a second
        (60 * 75 * m) + (75 * s) + f
    }

    /// Build an MSF from a sector index. Returns None if the index is
    /// out of range.
    pub fn from_sector_index(si: u32) -> Option<Msf> {
        let m = si / (60 * 75);

        if m > 99 {
            return None;
        }

        let si = si % (60 * 75);

        let s = si / 75;
        let f = si % 75;

        let m = Bcd::from_binary(m as u8).unwrap();
        let s = Bcd::from_binary(s as u8).unwrap();
        let f = Bcd::from_binary(f as u8).unwrap();

        Some(Msf(m, s, f))
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let Msf(m, s, f) = *self;

        // BCD nibbles are decimal digits, so the hex formatting below
        // renders the conventional decimal MM:SS:FF notation
        write!(fmt, "{:02x}:{:02x}:{:02x}", m.bcd(), s.bcd(), f.bcd())
    }
}
