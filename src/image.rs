//! Random-access sector sink backing the disc image file.

use std::fs::File;
use std::io;
use std::io::{Cursor, Seek, SeekFrom, Write};

use crate::sector::{self, SECTOR_RAW_SIZE};
use crate::VcdResult;

/// Sink that can discard everything past a given byte length. Needed by the
/// per-file recovery path of the image builder, which rolls a partially
/// written track back out of the image.
pub trait Truncate {
    /// Drop all data at and beyond `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

impl Truncate for Cursor<Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().truncate(len as usize);
        Ok(())
    }
}

/// Writer for a raw disc image, indexed by logical sector number. Writing
/// past the current end fills the gap with Mode 0 sectors so that every LSN
/// below the high-water mark is written exactly once.
pub struct ImageWriter<W> {
    out: W,
    /// One past the highest LSN written so far
    max_lsn: u32,
}

impl<W: Write + Seek> ImageWriter<W> {
    /// Wrap `out`, which is assumed to be empty
    pub fn new(out: W) -> ImageWriter<W> {
        ImageWriter { out, max_lsn: 0 }
    }

    /// Write `sector` at `lsn`. Forward writes zero-fill the gap from the
    /// previous high-water mark with Mode 0 sectors; writes below the mark
    /// overwrite in place.
    pub fn put(&mut self, lsn: u32, sector: &[u8; SECTOR_RAW_SIZE]) -> VcdResult<()> {
        if lsn >= self.max_lsn {
            for gap in self.max_lsn..lsn {
                self.write_at(gap, &sector::encode_mode0(gap))?;
            }
            self.max_lsn = lsn + 1;
        }

        self.write_at(lsn, sector)
    }

    fn write_at(&mut self, lsn: u32, sector: &[u8; SECTOR_RAW_SIZE]) -> VcdResult<()> {
        self.out
            .seek(SeekFrom::Start(u64::from(lsn) * SECTOR_RAW_SIZE as u64))?;
        self.out.write_all(sector)?;

        Ok(())
    }

    /// One past the highest LSN written so far
    pub fn max_lsn(&self) -> u32 {
        self.max_lsn
    }

    /// Flush the underlying sink
    pub fn flush(&mut self) -> VcdResult<()> {
        self.out.flush()?;

        Ok(())
    }

    /// Consume the writer and return the underlying sink
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Seek + Truncate> ImageWriter<W> {
    /// Discard every sector at and beyond `lsn` and move the high-water
    /// mark back accordingly
    pub fn rewind_to(&mut self, lsn: u32) -> VcdResult<()> {
        self.out
            .truncate(u64::from(lsn) * SECTOR_RAW_SIZE as u64)?;
        self.max_lsn = self.max_lsn.min(lsn);

        Ok(())
    }
}
