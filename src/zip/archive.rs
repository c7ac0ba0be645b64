//! High-level archive API.
//!
//! [`ZipArchive`] owns the stream and the entry table. Entries are handed
//! out as [`ZipEntry`] handles; everything reaches the stream on
//! [`close`](ZipArchive::close), which also runs on drop.

use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use byteorder::{LittleEndian, WriteBytesExt};
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, trace, warn};

use super::entry::{EntryState, ZipEntry, encode_text};
use super::parser::{self, DEFAULT_SEARCH_CHUNK};
use super::structures::*;
use super::writer::EntryWriter;
use crate::error::{Result, ZipError};
use crate::io::Stream;

/// How an archive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Write a new archive. The stream must be writable and seekable.
    Create,
    /// Read an existing archive. The stream must be readable and seekable.
    Read,
    /// Modify an existing archive in place. The stream must be readable,
    /// writable, seekable and resizable.
    Update,
}

/// Options for [`ZipArchive::open_with`].
#[derive(Debug, Clone, Copy)]
pub struct ArchiveOptions {
    encoding: &'static Encoding,
    search_chunk_size: usize,
    compression_level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            encoding: UTF_8,
            search_chunk_size: DEFAULT_SEARCH_CHUNK,
            compression_level: 6,
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoding for names and comments not flagged as UTF-8.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Chunk size of the backward end-of-central-directory scan.
    pub fn search_chunk_size(mut self, size: usize) -> Self {
        self.search_chunk_size = size.max(1);
        self
    }

    /// Deflate level, 0 to 9.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub(crate) fn encoding_value(&self) -> &'static Encoding {
        self.encoding
    }

    pub(crate) fn compression_level_value(&self) -> u32 {
        self.compression_level
    }
}

/// Entries by name, in insertion order.
#[derive(Default)]
struct EntryTable {
    order: Vec<Rc<RefCell<EntryState>>>,
    by_name: HashMap<String, Rc<RefCell<EntryState>>>,
}

impl EntryTable {
    /// Insert, replacing (and detaching) any entry of the same name.
    fn insert(&mut self, entry: Rc<RefCell<EntryState>>) {
        let name = entry.borrow().name.clone();
        if let Some(old) = self.by_name.insert(name, Rc::clone(&entry)) {
            debug!("Entry {:?} replaced by a newer one", old.borrow().name);
            self.order.retain(|e| !Rc::ptr_eq(e, &old));
            old.borrow_mut().deleted = true;
        }
        self.order.push(entry);
    }

    fn remove(&mut self, entry: &Rc<RefCell<EntryState>>) {
        self.order.retain(|e| !Rc::ptr_eq(e, entry));
        let name = entry.borrow().name.clone();
        if self.by_name.get(&name).is_some_and(|e| Rc::ptr_eq(e, entry)) {
            self.by_name.remove(&name);
        }
    }
}

/// The end records as last read or written.
#[derive(Debug, Clone, Default)]
struct EndRecords {
    eocd: EndOfCentralDirectory,
    zip64_locator: Option<Zip64EndOfCentralDirectoryLocator>,
    zip64_eocd: Option<Zip64EndOfCentralDirectory>,
}

/// Archive state shared with entry handles and write sessions.
pub(crate) struct ArchiveInner<S> {
    pub(crate) mode: OpenMode,
    pub(crate) options: ArchiveOptions,
    pub(crate) stream: Rc<RefCell<S>>,
    entries: RefCell<EntryTable>,
    end: RefCell<EndRecords>,
    comment: RefCell<Vec<u8>>,
    /// Where the next local header goes.
    pub(crate) write_cursor: Cell<u64>,
    /// A Create-mode entry writer is live.
    pub(crate) write_session: Cell<bool>,
    closed: Cell<bool>,
}

impl<S> ArchiveInner<S> {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(ZipError::illegal_state("archive is closed"));
        }
        Ok(())
    }

    pub(crate) fn stream(&self) -> Result<RefMut<'_, S>> {
        self.stream
            .try_borrow_mut()
            .map_err(|_| ZipError::illegal_state("archive stream is busy"))
    }

    pub(crate) fn remove_entry(&self, entry: &Rc<RefCell<EntryState>>) {
        self.entries.borrow_mut().remove(entry);
    }
}

fn needs_zip64_eocd(count: u64, cd_offset: u64, cd_size: u64) -> bool {
    cd_offset >= u64::from(SENTINEL_U32)
        || cd_size >= u64::from(SENTINEL_U32)
        || count > u64::from(SENTINEL_U16)
}

impl<S: Stream> ArchiveInner<S> {
    fn close(self: &Rc<Self>) -> Result<()> {
        if self.closed.get() {
            return Ok(());
        }
        if self.mode == OpenMode::Read {
            self.closed.set(true);
            return Ok(());
        }

        let entries: Vec<_> = self.entries.borrow().order.clone();
        if self.write_session.get() || entries.iter().any(|e| e.borrow().currently_open_for_write) {
            return Err(ZipError::illegal_state(
                "cannot close while an entry is open for writing",
            ));
        }

        if self.mode == OpenMode::Update {
            // Everything that can fail without touching the stream happens
            // before it is truncated.
            for entry in &entries {
                entry.borrow().header.encoded_len()?;
            }
            // Offsets are about to shift, so everything still on disk comes into memory first.
            let size = self.stream()?.size()?;
            for entry in &entries {
                self.materialize(entry, size)?;
            }
            let mut stream = self.stream()?;
            stream.set_size(0)?;
            stream.seek(SeekFrom::Start(0))?;
            self.write_cursor.set(0);
        }

        for entry in &entries {
            self.persist(entry)?;
        }
        self.write_central_directory(&entries)?;
        self.closed.set(true);

        for entry in &entries {
            let mut state = entry.borrow_mut();
            state.content = None;
            state.raw = None;
        }
        Ok(())
    }

    /// Pull the raw bytes and local extra fields of an untouched original
    /// out of a stream of `size` bytes.
    fn materialize(&self, entry: &Rc<RefCell<EntryState>>, size: u64) -> Result<()> {
        let mut state = entry.borrow_mut();
        if state.content.is_some() || state.raw.is_some() || !state.originally_in_archive {
            return Ok(());
        }

        let offset = state.header.local_header_offset;
        let overrun = || {
            ZipError::malformed(format!(
                "entry {:?} @{offset:#x} runs past the end of the archive",
                state.name
            ))
        };
        if offset.saturating_add(LocalFileHeader::FIXED_SIZE as u64) > size {
            return Err(overrun());
        }

        let mut stream = self.stream()?;
        stream.seek(SeekFrom::Start(offset))?;
        let local = LocalFileHeader::read(&mut *stream).map_err(|e| match e {
            ZipError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => overrun(),
            other => other,
        })?;
        let data_end = (offset + local.encoded_len()).checked_add(state.header.compressed_size);
        if data_end.is_none_or(|end| end > size) {
            return Err(overrun());
        }
        let len = usize::try_from(state.header.compressed_size).map_err(|_| {
            ZipError::unsupported(format!("entry {:?} is too large to buffer", state.name))
        })?;
        let mut raw = vec![0u8; len];
        stream.read_exact(&mut raw)?;
        drop(stream);
        trace!("Materialized {len} raw bytes of {:?}", state.name);
        state.local_extra_fields = Some(local.extra_fields);
        state.raw = Some(raw);
        Ok(())
    }

    /// Write one entry's local header and data at the write cursor.
    fn persist(self: &Rc<Self>, entry: &Rc<RefCell<EntryState>>) -> Result<()> {
        match self.mode {
            OpenMode::Read => Ok(()),
            OpenMode::Create => {
                if entry.borrow().ever_opened_for_write {
                    return Ok(());
                }
                EntryWriter::new(Rc::downgrade(self), Rc::clone(entry), false).finish()
            }
            OpenMode::Update => {
                // Buffers go back to the entry whatever the outcome; a failed
                // close may be retried.
                let (content, raw) = {
                    let mut state = entry.borrow_mut();
                    (state.content.take(), state.raw.take())
                };
                let result = match (&content, &raw) {
                    (Some(content), _) => {
                        let mut writer = EntryWriter::new(Rc::downgrade(self), Rc::clone(entry), false);
                        writer
                            .write_all(content)
                            .map_err(ZipError::from)
                            .and_then(|()| writer.finish())
                    }
                    (None, Some(raw)) => self.copy_verbatim(entry, raw),
                    (None, None) => EntryWriter::new(Rc::downgrade(self), Rc::clone(entry), false).finish(),
                };
                let mut state = entry.borrow_mut();
                state.content = content;
                state.raw = raw;
                result
            }
        }
    }

    /// Re-emit an untouched entry: a fresh local header followed by the
    /// original compressed bytes, plus a data descriptor if the entry
    /// declared one.
    fn copy_verbatim(&self, entry: &Rc<RefCell<EntryState>>, raw: &[u8]) -> Result<()> {
        let header_offset = self.write_cursor.get();
        let mut state = entry.borrow_mut();

        let h = &state.header;
        let mut extra_fields = state.local_extras_without_zip64();
        let oversized = h.compressed_size >= u64::from(SENTINEL_U32)
            || h.uncompressed_size >= u64::from(SENTINEL_U32);
        if oversized {
            let zip64 = Zip64ExtraField {
                uncompressed_size: Some(h.uncompressed_size),
                compressed_size: Some(h.compressed_size),
                ..Default::default()
            };
            extra_fields.insert(0, zip64.to_extra_field());
        }
        let local = LocalFileHeader {
            version_needed: if oversized {
                h.version_needed.max(VERSION_ZIP64)
            } else {
                h.version_needed
            },
            flags: h.flags,
            compression_method: h.compression_method,
            last_modified: h.last_modified,
            crc32: h.crc32,
            compressed_size: promote_u32(h.compressed_size).0,
            uncompressed_size: promote_u32(h.uncompressed_size).0,
            file_name: h.file_name.clone(),
            extra_fields,
        };

        let mut stream = self.stream()?;
        stream.seek(SeekFrom::Start(header_offset))?;
        let mut written = local.write(&mut *stream)?;
        stream.write_all(raw)?;
        written += raw.len() as u64;

        if h.flags & FLAG_DATA_DESCRIPTOR != 0 {
            stream.write_u32::<LittleEndian>(DATA_DESCRIPTOR_SIGNATURE)?;
            stream.write_u32::<LittleEndian>(h.crc32)?;
            if oversized {
                stream.write_u64::<LittleEndian>(h.compressed_size)?;
                stream.write_u64::<LittleEndian>(h.uncompressed_size)?;
                written += 24;
            } else {
                stream.write_u32::<LittleEndian>(h.compressed_size as u32)?;
                stream.write_u32::<LittleEndian>(h.uncompressed_size as u32)?;
                written += 16;
            }
        }

        self.write_cursor.set(header_offset + written);
        state.header.local_header_offset = header_offset;
        trace!("Copied {:?} verbatim @{header_offset:#x}", state.name);
        Ok(())
    }

    /// Central directory, then the Zip64 end records if needed, then the classic EOCD.
    fn write_central_directory(&self, entries: &[Rc<RefCell<EntryState>>]) -> Result<()> {
        let cd_offset = self.write_cursor.get();
        let count = entries.len() as u64;
        let comment = self.comment.borrow().clone();

        let mut stream = self.stream()?;
        stream.seek(SeekFrom::Start(cd_offset))?;
        let mut w = BufWriter::new(&mut *stream);

        let mut cd_size = 0u64;
        for entry in entries {
            cd_size += entry.borrow().header.write(&mut w)?;
        }

        let mut end = EndRecords::default();
        let mut end_offset = cd_offset + cd_size;
        let zip64 = needs_zip64_eocd(count, cd_offset, cd_size);
        if zip64 {
            let record = Zip64EndOfCentralDirectory {
                version_made_by: VERSION_MADE_BY,
                version_needed: VERSION_ZIP64,
                disk_number: 0,
                disk_with_cd: 0,
                disk_entries: count,
                total_entries: count,
                cd_size,
                cd_offset,
            };
            let locator = Zip64EndOfCentralDirectoryLocator {
                disk_with_eocd64: 0,
                eocd64_offset: end_offset,
                total_disks: 1,
            };
            end_offset += record.write(&mut w)?;
            end_offset += locator.write(&mut w)?;
            end.zip64_eocd = Some(record);
            end.zip64_locator = Some(locator);
        }

        end.eocd = if zip64 {
            EndOfCentralDirectory {
                disk_number: 0,
                disk_with_cd: 0,
                disk_entries: SENTINEL_U16,
                total_entries: SENTINEL_U16,
                cd_size: SENTINEL_U32,
                cd_offset: SENTINEL_U32,
                comment,
            }
        } else {
            EndOfCentralDirectory {
                disk_number: 0,
                disk_with_cd: 0,
                disk_entries: count as u16,
                total_entries: count as u16,
                cd_size: cd_size as u32,
                cd_offset: cd_offset as u32,
                comment,
            }
        };
        end_offset += end.eocd.write(&mut w)?;
        w.flush()?;
        drop(w);

        if stream.can_resize() {
            stream.set_size(end_offset)?;
        }
        stream.flush()?;
        debug!(
            "Wrote central directory: {count} entries, {cd_size} bytes @{cd_offset:#x}, zip64={zip64}"
        );
        *self.end.borrow_mut() = end;
        Ok(())
    }
}

/// A ZIP archive over a [`Stream`].
///
/// # Example
///
/// ```
/// use std::io::{Cursor, Read, Write};
/// use ziparc::{OpenMode, ZipArchive};
///
/// # fn main() -> ziparc::Result<()> {
/// let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
/// let mut w = archive.create_entry("1.txt")?.open()?;
/// w.write_all(b"2333")?;
/// w.finish()?;
/// drop(w);
/// let bytes = archive.into_inner()?.into_inner();
///
/// let archive = ZipArchive::open(Cursor::new(bytes), OpenMode::Read)?;
/// let mut data = Vec::new();
/// archive.get_entry("1.txt").unwrap().open()?.read_to_end(&mut data)?;
/// assert_eq!(data, b"2333");
/// # Ok(())
/// # }
/// ```
pub struct ZipArchive<S: Stream> {
    inner: Rc<ArchiveInner<S>>,
}

impl<S: Stream> fmt::Debug for ZipArchive<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchive")
            .field("mode", &self.inner.mode)
            .field("entries", &self.inner.entries.borrow().order.len())
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}

impl<S: Stream> ZipArchive<S> {
    /// Open with default [`ArchiveOptions`].
    pub fn open(stream: S, mode: OpenMode) -> Result<Self> {
        Self::open_with(stream, mode, ArchiveOptions::default())
    }

    pub fn open_with(mut stream: S, mode: OpenMode, options: ArchiveOptions) -> Result<Self> {
        let capable = stream.can_seek()
            && match mode {
                OpenMode::Create => stream.can_write(),
                OpenMode::Read => stream.can_read(),
                OpenMode::Update => stream.can_read() && stream.can_write() && stream.can_resize(),
            };
        if !capable {
            return Err(ZipError::invalid_argument(format!(
                "stream lacks the capabilities required for {mode:?} mode"
            )));
        }

        let mut table = EntryTable::default();
        let mut end = EndRecords::default();
        let mut write_cursor = 0;
        match mode {
            OpenMode::Create => write_cursor = stream.stream_position()?,
            OpenMode::Read | OpenMode::Update => {
                let size = stream.size()?;
                if mode == OpenMode::Update && size == 0 {
                    debug!("Empty stream opened for update, starting a new archive");
                } else {
                    let directory = parser::read_directory(&mut stream, size, options.search_chunk_size)?;
                    for header in directory.headers {
                        let state = EntryState::from_central(header, options.encoding);
                        table.insert(Rc::new(RefCell::new(state)));
                    }
                    end = EndRecords {
                        eocd: directory.eocd,
                        zip64_locator: directory.zip64_locator,
                        zip64_eocd: directory.zip64_eocd,
                    };
                }
            }
        }
        debug!("Opened archive in {mode:?} mode with {} entries", table.order.len());

        let comment = end.eocd.comment.clone();
        Ok(Self {
            inner: Rc::new(ArchiveInner {
                mode,
                options,
                stream: Rc::new(RefCell::new(stream)),
                entries: RefCell::new(table),
                end: RefCell::new(end),
                comment: RefCell::new(comment),
                write_cursor: Cell::new(write_cursor),
                write_session: Cell::new(false),
                closed: Cell::new(false),
            }),
        })
    }

    pub fn mode(&self) -> OpenMode {
        self.inner.mode
    }

    /// Add an entry. An existing entry of the same name is replaced and its
    /// handles become unusable.
    pub fn create_entry(&self, name: &str) -> Result<ZipEntry<S>> {
        self.inner.ensure_open()?;
        if self.inner.mode == OpenMode::Read {
            return Err(ZipError::illegal_state("cannot create entries in read mode"));
        }
        let state = Rc::new(RefCell::new(EntryState::new(name, self.inner.options.encoding)?));
        self.inner.entries.borrow_mut().insert(Rc::clone(&state));
        debug!("Created entry {name:?}");
        Ok(ZipEntry::new(state, Rc::downgrade(&self.inner)))
    }

    pub fn get_entry(&self, name: &str) -> Option<ZipEntry<S>> {
        self.inner
            .entries
            .borrow()
            .by_name
            .get(name)
            .map(|state| ZipEntry::new(Rc::clone(state), Rc::downgrade(&self.inner)))
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Vec<ZipEntry<S>> {
        self.inner
            .entries
            .borrow()
            .order
            .iter()
            .map(|state| ZipEntry::new(Rc::clone(state), Rc::downgrade(&self.inner)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The archive comment, decoded with the configured encoding.
    pub fn comment(&self) -> String {
        let comment = self.inner.comment.borrow();
        self.inner
            .options
            .encoding
            .decode_without_bom_handling(&comment)
            .0
            .into_owned()
    }

    pub fn set_comment(&self, comment: &str) -> Result<()> {
        self.inner.ensure_open()?;
        if self.inner.mode == OpenMode::Read {
            return Err(ZipError::illegal_state("cannot set the comment in read mode"));
        }
        let bytes = encode_text(comment, self.inner.options.encoding, "archive comment")?;
        if bytes.len() > usize::from(SENTINEL_U16) {
            return Err(ZipError::invalid_argument("archive comment longer than 65535 bytes"));
        }
        *self.inner.comment.borrow_mut() = bytes;
        Ok(())
    }

    /// The End of Central Directory record as last read or written.
    pub fn end_of_central_directory(&self) -> EndOfCentralDirectory {
        self.inner.end.borrow().eocd.clone()
    }

    pub fn zip64_end_of_central_directory(&self) -> Option<Zip64EndOfCentralDirectory> {
        self.inner.end.borrow().zip64_eocd
    }

    pub fn zip64_locator(&self) -> Option<Zip64EndOfCentralDirectoryLocator> {
        self.inner.end.borrow().zip64_locator
    }

    /// Persist everything (Create and Update modes). Idempotent.
    ///
    /// In Update mode every untouched entry is first read into memory, then
    /// the stream is truncated and rewritten from scratch.
    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }

    /// Close and hand back the stream.
    pub fn into_inner(self) -> Result<S> {
        self.close()?;
        let inner = Rc::clone(&self.inner);
        drop(self);
        let inner = Rc::try_unwrap(inner)
            .map_err(|_| ZipError::illegal_state("archive is still in use"))?;
        let stream = Rc::try_unwrap(inner.stream)
            .map_err(|_| ZipError::illegal_state("archive stream is still in use"))?;
        Ok(stream.into_inner())
    }
}

impl<S: Stream> Drop for ZipArchive<S> {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            warn!("Failed to close archive: {e}");
        }
    }
}
