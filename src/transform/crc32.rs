use crc32fast::Hasher;
use std::io::{self, Write};

/// Write-only tee that checksums everything passing through it.
pub struct Crc32Writer<W> {
    inner: W,
    hasher: Hasher,
    bytes: u64,
}

impl<W: Write> Crc32Writer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            bytes: 0,
        }
    }

    /// Returns `(crc32, byte count, inner)`.
    pub fn finish(self) -> (u32, u64, W) {
        (self.hasher.finalize(), self.bytes, self.inner)
    }
}

impl<W: Write> Write for Crc32Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Only checksum what the inner writer actually took.
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
