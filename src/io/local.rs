use super::Stream;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Local file stream that remembers the access it was opened with.
///
/// `std::fs::File` cannot report whether it is readable or writable, so the
/// capabilities are recorded at construction.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    readable: bool,
    writable: bool,
}

impl FileStream {
    /// Open an existing file for reading only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file,
            readable: true,
            writable: false,
        })
    }

    /// Create (or truncate) a file for reading and writing.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            readable: true,
            writable: true,
        })
    }

    /// Open an existing file for reading and writing, keeping its contents.
    pub fn open_rw(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            readable: true,
            writable: true,
        })
    }

    /// Unwrap the underlying file.
    pub fn into_inner(self) -> File {
        self.file
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for FileStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Stream for FileStream {
    fn can_read(&self) -> bool {
        self.readable
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn can_resize(&self) -> bool {
        self.writable
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_size(&mut self, size: u64) -> io::Result<()> {
        self.file.set_len(size)
    }
}
