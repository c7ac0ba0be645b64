use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Weak;

/// A bounded read window `[start, start + len)` over a shared stream.
///
/// The source is held weakly and borrowed only for the duration of each
/// call, so several windows may coexist over one stream. Every read seeks
/// the source first; the window owns its own position.
pub struct SubStream<S> {
    source: Weak<RefCell<S>>,
    start: u64,
    len: u64,
    pos: u64,
}

impl<S> SubStream<S> {
    pub fn new(source: Weak<RefCell<S>>, start: u64, len: u64) -> Self {
        Self {
            source,
            start,
            len,
            pos: 0,
        }
    }

    /// Length of the window.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }
}

impl<S: Read + Seek> Read for SubStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let source = self
            .source
            .upgrade()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "archive stream is gone"))?;
        let mut source = source
            .try_borrow_mut()
            .map_err(|_| io::Error::other("archive stream is busy"))?;

        source.seek(SeekFrom::Start(self.start + self.pos))?;
        let want = remaining.min(buf.len() as u64) as usize;
        let n = source.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S> Seek for SubStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(target) if target <= self.len => {
                self.pos = target;
                Ok(target)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek outside of the window",
            )),
        }
    }
}
