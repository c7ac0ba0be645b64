//! Byte-stream capability surface consumed by the archive.
//!
//! The archive never talks to files or buffers directly. It drives a
//! [`Stream`], which is `Read + Write + Seek` plus a handful of capability
//! queries used to validate the open mode up front.

mod local;
mod read_only;
mod sink;
mod sub;

pub use local::FileStream;
pub use read_only::ReadOnly;
pub use sink::SharedSink;
pub use sub::SubStream;

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// A seekable byte stream with explicit capabilities.
pub trait Stream: Read + Write + Seek {
    /// Whether `read` may be called.
    fn can_read(&self) -> bool;

    /// Whether `write` may be called.
    fn can_write(&self) -> bool;

    /// Whether `seek` may be called.
    fn can_seek(&self) -> bool {
        true
    }

    /// Whether [`set_size`](Stream::set_size) may be called.
    fn can_resize(&self) -> bool;

    /// Total size of the stream in bytes. The current position is preserved.
    fn size(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if pos != end {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(end)
    }

    /// Truncate or zero-extend the stream. The current position is left alone.
    fn set_size(&mut self, size: u64) -> io::Result<()>;
}

fn usize_len(size: u64) -> io::Result<usize> {
    usize::try_from(size).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "size too large"))
}

impl Stream for Cursor<Vec<u8>> {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_resize(&self) -> bool {
        true
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn set_size(&mut self, size: u64) -> io::Result<()> {
        let size = usize_len(size)?;
        self.get_mut().resize(size, 0);
        Ok(())
    }
}

impl Stream for Cursor<&mut Vec<u8>> {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_resize(&self) -> bool {
        true
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn set_size(&mut self, size: u64) -> io::Result<()> {
        let size = usize_len(size)?;
        self.get_mut().resize(size, 0);
        Ok(())
    }
}
