//! Entry write sessions.
//!
//! A streaming session writes a provisional local header on the first
//! non-empty write, pushes data through the write chain into the archive
//! stream, and on finish seeks back to patch the CRC32 and sizes into the
//! header. Requires a seekable archive stream, which the archive checks when
//! it is opened.

use std::cell::RefCell;
use std::io::{self, Seek, SeekFrom, Write};
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::archive::ArchiveInner;
use super::entry::EntryState;
use super::structures::*;
use crate::error::{Result, ZipError};
use crate::io::{SharedSink, Stream};
use crate::transform::WriteChain;

enum Session<S: Stream> {
    NotStarted,
    Writing {
        header_offset: u64,
        local: LocalFileHeader,
        chain: WriteChain<SharedSink<S>>,
    },
    Finished,
}

/// Streams one entry's data straight into the archive.
pub struct EntryWriter<S: Stream> {
    archive: Weak<ArchiveInner<S>>,
    entry: Rc<RefCell<EntryState>>,
    session: Session<S>,
    /// Whether this writer holds the archive-wide write session.
    holds_session: bool,
}

impl<S: Stream> EntryWriter<S> {
    pub(crate) fn new(
        archive: Weak<ArchiveInner<S>>,
        entry: Rc<RefCell<EntryState>>,
        holds_session: bool,
    ) -> Self {
        Self {
            archive,
            entry,
            session: Session::NotStarted,
            holds_session,
        }
    }

    fn archive(&self) -> Result<Rc<ArchiveInner<S>>> {
        self.archive
            .upgrade()
            .ok_or_else(|| ZipError::illegal_state("archive has been dropped"))
    }

    /// Write the provisional header at the archive write cursor.
    fn begin(&mut self, archive: &ArchiveInner<S>) -> Result<()> {
        let header_offset = archive.write_cursor.get();
        let (local, method, password) = {
            let state = self.entry.borrow();
            let method = state.write_method;
            (
                state.local_header(method, state.password.is_some()),
                method,
                state.password.clone(),
            )
        };

        let written = {
            let mut stream = archive.stream()?;
            stream.seek(SeekFrom::Start(header_offset))?;
            local.write(&mut *stream)?
        };
        trace!("Provisional local header @{header_offset:#x}: {local:#x?}");

        let sink = SharedSink::new(Rc::downgrade(&archive.stream), header_offset + written);
        let chain = WriteChain::new(sink, method, archive.options.compression_level_value(), password);
        self.session = Session::Writing {
            header_offset,
            local,
            chain,
        };
        Ok(())
    }

    /// Complete the entry. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        let result = match mem::replace(&mut self.session, Session::Finished) {
            Session::Finished => return Ok(()),
            Session::NotStarted => self.archive().and_then(|archive| self.write_empty(&archive)),
            Session::Writing {
                header_offset,
                local,
                chain,
            } => self
                .archive()
                .and_then(|archive| self.seal(&archive, header_offset, local, chain)),
        };
        self.release();
        result
    }

    /// No data ever arrived: emit a minimal Stored header instead of patching.
    fn write_empty(&self, archive: &ArchiveInner<S>) -> Result<()> {
        let header_offset = archive.write_cursor.get();
        let local = self.entry.borrow().local_header(CompressionMethod::Stored, false);
        let written = {
            let mut stream = archive.stream()?;
            stream.seek(SeekFrom::Start(header_offset))?;
            local.write(&mut *stream)?
        };
        archive.write_cursor.set(header_offset + written);

        let mut state = self.entry.borrow_mut();
        state.record_written(header_offset, &local, 0, 0, 0);
        debug!("Wrote empty entry {:?} @{header_offset:#x}", state.name);
        Ok(())
    }

    fn seal(
        &self,
        archive: &ArchiveInner<S>,
        header_offset: u64,
        local: LocalFileHeader,
        chain: WriteChain<SharedSink<S>>,
    ) -> Result<()> {
        let (totals, sink) = chain.finish()?;
        {
            let mut stream = archive.stream()?;
            LocalFileHeader::patch_sizes(
                &mut *stream,
                header_offset,
                totals.crc32,
                totals.compressed_size,
                totals.uncompressed_size,
            )?;
        }
        archive.write_cursor.set(sink.position());

        let mut state = self.entry.borrow_mut();
        state.record_written(
            header_offset,
            &local,
            totals.crc32,
            totals.compressed_size,
            totals.uncompressed_size,
        );
        debug!(
            "Finished entry {:?} @{header_offset:#x}: crc32={:#010x} {} -> {} bytes",
            state.name, totals.crc32, totals.uncompressed_size, totals.compressed_size
        );
        Ok(())
    }

    fn release(&self) {
        self.entry.borrow_mut().currently_open_for_write = false;
        if self.holds_session {
            if let Some(archive) = self.archive.upgrade() {
                archive.write_session.set(false);
            }
        }
    }
}

impl<S: Stream> Write for EntryWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Session::NotStarted = self.session {
            let archive = self.archive().map_err(ZipError::into_io)?;
            self.begin(&archive).map_err(ZipError::into_io)?;
        }
        match &mut self.session {
            Session::Writing { chain, .. } => chain.write(buf),
            _ => Err(ZipError::illegal_state("entry stream is already finished").into_io()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.session {
            Session::Writing { chain, .. } => chain.flush(),
            _ => Ok(()),
        }
    }
}

impl<S: Stream> Drop for EntryWriter<S> {
    fn drop(&mut self) {
        if matches!(self.session, Session::Finished) {
            return;
        }
        if let Err(e) = self.finish() {
            warn!("Failed to finish entry {:?}: {e}", self.entry.borrow().name);
        }
    }
}

/// Collects an entry's new content in memory until the archive is closed.
pub struct BufferedEntryWriter {
    entry: Rc<RefCell<EntryState>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl BufferedEntryWriter {
    pub(crate) fn new(entry: Rc<RefCell<EntryState>>) -> Self {
        Self {
            entry,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Hand the buffered content to the entry. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let mut state = self.entry.borrow_mut();
        state.content = Some(mem::take(&mut self.buffer));
        state.currently_open_for_write = false;
        trace!("Buffered {} bytes for {:?}", state.content.as_ref().map_or(0, Vec::len), state.name);
        Ok(())
    }
}

impl Write for BufferedEntryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(ZipError::illegal_state("entry stream is already finished").into_io());
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BufferedEntryWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to finish entry {:?}: {e}", self.entry.borrow().name);
        }
    }
}
