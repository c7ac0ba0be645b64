use super::Stream;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Adapts any `Read + Seek` source into a read-only [`Stream`].
///
/// Writes and resizes fail with [`io::ErrorKind::Unsupported`].
#[derive(Debug)]
pub struct ReadOnly<R> {
    inner: R,
}

impl<R> ReadOnly<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "stream is read-only")
}

impl<R: Read> Read for ReadOnly<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R> Write for ReadOnly<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(unsupported())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: Seek> Seek for ReadOnly<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl<R: Read + Seek> Stream for ReadOnly<R> {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        false
    }

    fn can_resize(&self) -> bool {
        false
    }

    fn set_size(&mut self, _size: u64) -> io::Result<()> {
        Err(unsupported())
    }
}
