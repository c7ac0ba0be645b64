use std::cell::RefCell;
use std::io::{self, Seek, SeekFrom, Write};
use std::rc::Weak;

/// Write cursor over a shared stream.
///
/// The counterpart of [`SubStream`](super::SubStream): holds the stream
/// weakly, borrows it per call and seeks to its own position before writing.
pub struct SharedSink<S> {
    target: Weak<RefCell<S>>,
    pos: u64,
}

impl<S> SharedSink<S> {
    pub fn new(target: Weak<RefCell<S>>, pos: u64) -> Self {
        Self { target, pos }
    }

    /// Absolute stream offset of the next byte written.
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl<S: Write + Seek> Write for SharedSink<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let target = self
            .target
            .upgrade()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "archive stream is gone"))?;
        let mut target = target
            .try_borrow_mut()
            .map_err(|_| io::Error::other("archive stream is busy"))?;
        target.seek(SeekFrom::Start(self.pos))?;
        let n = target.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.target.upgrade() {
            Some(target) => target
                .try_borrow_mut()
                .map_err(|_| io::Error::other("archive stream is busy"))?
                .flush(),
            None => Ok(()),
        }
    }
}
