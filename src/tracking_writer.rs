#![forbid(unsafe_code)]

use std::io::{self, Write};

use crate::crc32;

////////////////////////////////////////////////////////////////////////////////

/// Counts the bytes written through it and keeps their running CRC-32.
pub struct TrackingWriter<T> {
    crc: u32,
    inner: T,
    byte_n: u64,
}

impl<T: Write> Write for TrackingWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let size = self.inner.write(buf)?;
        let eff_buf = &buf[0..size];
        self.crc = crc32::update(self.crc, eff_buf);
        self.byte_n += size as u64;
        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T> TrackingWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            crc: crc32::init(),
            inner,
            byte_n: 0,
        }
    }

    /// Starts a new count and checksum; the inner writer is left alone.
    pub fn reset_tracking(&mut self) {
        self.crc = crc32::init();
        self.byte_n = 0;
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_n
    }

    pub fn crc32(&self) -> u32 {
        self.crc
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut_ref_inner(&mut self) -> &mut T {
        &mut self.inner
    }
}

////////////////////////////////////////////////////////////////////////////////
