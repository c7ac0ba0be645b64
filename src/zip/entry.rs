//! Archive members.
//!
//! A [`ZipEntry`] is a cheap, cloneable handle: it shares the entry's state
//! with the archive table and keeps only a weak reference to the archive
//! itself, so a handle never keeps an archive (or its stream) alive.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::rc::{Rc, Weak};

use encoding_rs::{Encoding, UTF_8};
use time::PrimitiveDateTime;
use tracing::{debug, trace};

use super::archive::{ArchiveInner, OpenMode};
use super::structures::*;
use super::writer::{BufferedEntryWriter, EntryWriter};
use crate::dostime::DosDateTime;
use crate::error::{Result, ZipError};
use crate::io::{Stream, SubStream};
use crate::transform::cipher::PasswordCheck;
use crate::transform::{ReadChain, ReadChainBuilt, build_read_chain};

/// MS-DOS directory attribute bit.
const DOS_DIRECTORY: u32 = 0x10;

/// Outcome of the password check on an encrypted entry.
///
/// This is a status, not an error: the check compares only one or two bytes
/// so a wrong password is accepted with probability of roughly 1 in 65536.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStatus {
    /// The header check matched.
    Success,
    /// The header check failed; the password is almost certainly wrong.
    Crc32CheckFailed,
    /// Encrypted, but not opened for reading yet.
    NotDecryptYet,
    /// The entry is not encrypted.
    NeedNotToDecrypt,
}

/// Decode a name or comment: UTF-8 when flag bit 11 is set, else `encoding`.
pub(crate) fn decode_text(bytes: &[u8], flags: u16, encoding: &'static Encoding) -> String {
    let encoding = if flags & FLAG_UTF8 != 0 { UTF_8 } else { encoding };
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

pub(crate) fn encode_text(text: &str, encoding: &'static Encoding, what: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(ZipError::invalid_argument(format!(
            "{what} {text:?} cannot be represented in {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

/// State shared between the archive table and every handle to one entry.
pub(crate) struct EntryState {
    pub(crate) name: String,
    pub(crate) header: CentralDirectoryFileHeader,
    /// Method used the next time data is written.
    pub(crate) write_method: CompressionMethod,
    pub(crate) originally_in_archive: bool,
    pub(crate) ever_opened_for_write: bool,
    pub(crate) currently_open_for_write: bool,
    /// Uncompressed replacement content (Update mode).
    pub(crate) content: Option<Vec<u8>>,
    /// Compressed bytes of an untouched original, pulled in before truncation.
    pub(crate) raw: Option<Vec<u8>>,
    pub(crate) local_extra_fields: Option<Vec<ExtraField>>,
    pub(crate) password: Option<Vec<u8>>,
    pub(crate) decrypt_status: DecryptStatus,
    pub(crate) deleted: bool,
}

impl EntryState {
    /// State for a record read from the central directory.
    pub(crate) fn from_central(header: CentralDirectoryFileHeader, encoding: &'static Encoding) -> Self {
        let name = decode_text(&header.file_name, header.flags, encoding);
        let method = CompressionMethod::from_u16(header.compression_method);
        let decrypt_status = if header.flags & FLAG_ENCRYPTED != 0 {
            DecryptStatus::NotDecryptYet
        } else {
            DecryptStatus::NeedNotToDecrypt
        };
        Self {
            name,
            header,
            write_method: if method.is_supported() {
                method
            } else {
                CompressionMethod::Deflate
            },
            originally_in_archive: true,
            ever_opened_for_write: false,
            currently_open_for_write: false,
            content: None,
            raw: None,
            local_extra_fields: None,
            password: None,
            decrypt_status,
            deleted: false,
        }
    }

    /// State for a freshly created entry.
    pub(crate) fn new(name: &str, encoding: &'static Encoding) -> Result<Self> {
        if name.is_empty() {
            return Err(ZipError::invalid_argument("entry name must not be empty"));
        }
        let file_name = encode_text(name, encoding, "entry name")?;
        if file_name.len() > usize::from(u16::MAX) {
            return Err(ZipError::invalid_argument(format!(
                "entry name is {} bytes encoded, at most 65535 allowed",
                file_name.len()
            )));
        }
        let utf8 = encoding == UTF_8;
        let header = CentralDirectoryFileHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_DEFLATE,
            flags: if utf8 { FLAG_UTF8 } else { 0 },
            compression_method: CompressionMethod::Deflate.as_u16(),
            last_modified: DosDateTime::now(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: if name.ends_with('/') { DOS_DIRECTORY } else { 0 },
            local_header_offset: 0,
            file_name,
            extra_fields: Vec::new(),
            comment: Vec::new(),
        };
        Ok(Self {
            name: name.to_string(),
            header,
            write_method: CompressionMethod::Deflate,
            originally_in_archive: false,
            ever_opened_for_write: false,
            currently_open_for_write: false,
            content: None,
            raw: None,
            local_extra_fields: None,
            password: None,
            decrypt_status: DecryptStatus::NeedNotToDecrypt,
            deleted: false,
        })
    }

    /// Provisional local header for writing fresh data with `method`.
    pub(crate) fn local_header(&self, method: CompressionMethod, encrypted: bool) -> LocalFileHeader {
        let mut flags = self.header.flags & FLAG_UTF8;
        if encrypted {
            flags |= FLAG_ENCRYPTED;
        }
        LocalFileHeader {
            version_needed: method.version_needed(),
            flags,
            compression_method: method.as_u16(),
            last_modified: self.header.last_modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: self.header.file_name.clone(),
            extra_fields: self.local_extras_without_zip64(),
        }
    }

    pub(crate) fn local_extras_without_zip64(&self) -> Vec<ExtraField> {
        self.local_extra_fields
            .iter()
            .flatten()
            .filter(|f| f.tag != ZIP64_EXTRA_FIELD_TAG)
            .cloned()
            .collect()
    }

    /// Record the outcome of writing this entry's data at `header_offset`.
    pub(crate) fn record_written(
        &mut self,
        header_offset: u64,
        local: &LocalFileHeader,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
    ) {
        let header = &mut self.header;
        header.version_needed = local.version_needed;
        header.flags = local.flags;
        header.compression_method = local.compression_method;
        header.crc32 = crc32;
        header.compressed_size = compressed_size;
        header.uncompressed_size = uncompressed_size;
        header.local_header_offset = header_offset;
        header.disk_number_start = 0;
        self.decrypt_status = if local.flags & FLAG_ENCRYPTED != 0 {
            DecryptStatus::NotDecryptYet
        } else {
            DecryptStatus::NeedNotToDecrypt
        };
    }
}

/// Handle to one member of a [`ZipArchive`](super::ZipArchive).
pub struct ZipEntry<S> {
    state: Rc<RefCell<EntryState>>,
    archive: Weak<ArchiveInner<S>>,
}

impl<S> Clone for ZipEntry<S> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            archive: Weak::clone(&self.archive),
        }
    }
}

impl<S> fmt::Debug for ZipEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ZipEntry")
            .field("name", &state.name)
            .field("compressed_size", &state.header.compressed_size)
            .field("uncompressed_size", &state.header.uncompressed_size)
            .field("deleted", &state.deleted)
            .finish()
    }
}

impl<S> ZipEntry<S> {
    pub(crate) fn new(state: Rc<RefCell<EntryState>>, archive: Weak<ArchiveInner<S>>) -> Self {
        Self { state, archive }
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.state.borrow().header.compression_method)
    }

    pub fn crc32(&self) -> u32 {
        self.state.borrow().header.crc32
    }

    pub fn compressed_size(&self) -> u64 {
        self.state.borrow().header.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.state.borrow().header.uncompressed_size
    }

    /// Modification time, `None` if the stored DOS value is not a valid date.
    pub fn last_modified(&self) -> Option<PrimitiveDateTime> {
        self.state.borrow().header.last_modified.to_datetime()
    }

    pub fn comment(&self) -> String {
        let state = self.state.borrow();
        decode_text(&state.header.comment, state.header.flags, self.encoding())
    }

    pub fn is_encrypted(&self) -> bool {
        self.state.borrow().header.flags & FLAG_ENCRYPTED != 0
    }

    pub fn is_dir(&self) -> bool {
        self.state.borrow().name.ends_with('/')
    }

    pub fn local_header_offset(&self) -> u64 {
        self.state.borrow().header.local_header_offset
    }

    pub fn external_attributes(&self) -> u32 {
        self.state.borrow().header.external_attributes
    }

    /// Central-directory extra fields, excluding the Zip64 field.
    pub fn extra_fields(&self) -> Vec<ExtraField> {
        self.state.borrow().header.extra_fields.clone()
    }

    pub fn decrypt_status(&self) -> DecryptStatus {
        self.state.borrow().decrypt_status
    }

    /// Password used to decrypt this entry on read, and to encrypt it on write.
    pub fn set_password(&self, password: impl AsRef<[u8]>) {
        self.state.borrow_mut().password = Some(password.as_ref().to_vec());
    }

    fn encoding(&self) -> &'static Encoding {
        self.archive
            .upgrade()
            .map_or(UTF_8, |archive| archive.options.encoding_value())
    }

    fn archive(&self) -> Result<Rc<ArchiveInner<S>>> {
        if self.state.borrow().deleted {
            return Err(ZipError::illegal_state(format!(
                "entry {:?} has been removed from its archive",
                self.state.borrow().name
            )));
        }
        let archive = self
            .archive
            .upgrade()
            .ok_or_else(|| ZipError::illegal_state("archive has been dropped"))?;
        archive.ensure_open()?;
        Ok(archive)
    }

    /// The archive, provided it accepts metadata changes.
    fn mutable_archive(&self) -> Result<Rc<ArchiveInner<S>>> {
        let archive = self.archive()?;
        if archive.mode == OpenMode::Read {
            return Err(ZipError::illegal_state("archive is open for reading only"));
        }
        Ok(archive)
    }

    /// Fails once a Create-mode entry has its data on disk.
    fn ensure_not_written(&self, archive: &ArchiveInner<S>) -> Result<()> {
        let state = self.state.borrow();
        if archive.mode == OpenMode::Create && state.ever_opened_for_write {
            return Err(ZipError::illegal_state(format!(
                "entry {:?} has already been written",
                state.name
            )));
        }
        Ok(())
    }

    pub fn set_compression_method(&self, method: CompressionMethod) -> Result<()> {
        let archive = self.mutable_archive()?;
        self.ensure_not_written(&archive)?;
        if !method.is_supported() {
            return Err(ZipError::unsupported(format!("compression method {method:?}")));
        }
        self.state.borrow_mut().write_method = method;
        Ok(())
    }

    pub fn set_last_modified(&self, modified: PrimitiveDateTime) -> Result<()> {
        let archive = self.mutable_archive()?;
        self.ensure_not_written(&archive)?;
        self.state.borrow_mut().header.last_modified = DosDateTime::from_datetime(modified);
        Ok(())
    }

    pub fn set_comment(&self, comment: &str) -> Result<()> {
        let archive = self.mutable_archive()?;
        let encoding = archive.options.encoding_value();
        let mut state = self.state.borrow_mut();
        let encoding = if state.header.flags & FLAG_UTF8 != 0 { UTF_8 } else { encoding };
        let bytes = encode_text(comment, encoding, "entry comment")?;
        if bytes.len() > usize::from(u16::MAX) {
            return Err(ZipError::invalid_argument("entry comment longer than 65535 bytes"));
        }
        state.header.comment = bytes;
        Ok(())
    }

    pub fn set_external_attributes(&self, attributes: u32) -> Result<()> {
        self.mutable_archive()?;
        self.state.borrow_mut().header.external_attributes = attributes;
        Ok(())
    }
}

impl<S: Stream> ZipEntry<S> {
    /// Open this entry. What comes back depends on the archive mode:
    ///
    /// - `Read`: a decompressing (and decrypting) reader over the entry data.
    /// - `Create`: a single-shot writer streaming straight into the archive.
    /// - `Update`: a writer into an in-memory buffer that replaces the
    ///   entry's content when the archive is closed.
    pub fn open(&self) -> Result<EntryStream<S>> {
        let archive = self.archive()?;
        match archive.mode {
            OpenMode::Read => self.open_read(&archive).map(EntryStream::Reader),
            OpenMode::Create => self.open_create(&archive).map(EntryStream::Writer),
            OpenMode::Update => self.open_update().map(EntryStream::Buffer),
        }
    }

    fn open_read(&self, archive: &ArchiveInner<S>) -> Result<EntryReader<S>> {
        let (name, header) = {
            let state = self.state.borrow();
            (state.name.clone(), state.header.clone())
        };
        let method = CompressionMethod::from_u16(header.compression_method);
        if header.flags & FLAG_STRONG_ENCRYPTION != 0 || method == CompressionMethod::Aes {
            return Err(ZipError::unsupported(format!("entry {name:?} uses strong encryption")));
        }
        if !method.is_supported() {
            return Err(ZipError::unsupported(format!(
                "entry {name:?} uses compression method {method:?}"
            )));
        }

        let password = if header.flags & FLAG_ENCRYPTED != 0 {
            let password = self.state.borrow().password.clone();
            Some(password.ok_or_else(|| ZipError::entry_encrypted(name.as_str()))?)
        } else {
            None
        };

        let data_offset = {
            let mut stream = archive.stream()?;
            stream.seek(SeekFrom::Start(header.local_header_offset))?;
            let local = LocalFileHeader::read(&mut *stream)?;
            trace!("{local:#x?}");
            stream.stream_position()?
        };
        let window = SubStream::new(Rc::downgrade(&archive.stream), data_offset, header.compressed_size);
        let check = PasswordCheck::for_entry(header.flags, header.crc32, header.last_modified.time);
        let ReadChainBuilt { chain, password_ok } =
            build_read_chain(window, method, password.as_deref().map(|p| (p, check)))?;

        let status = match password_ok {
            None => DecryptStatus::NeedNotToDecrypt,
            Some(true) => DecryptStatus::Success,
            Some(false) => DecryptStatus::Crc32CheckFailed,
        };
        self.state.borrow_mut().decrypt_status = status;
        debug!("Opened {name:?} for reading @{data_offset:#x} ({method:?}, {status:?})");
        Ok(EntryReader { chain })
    }

    fn open_create(&self, archive: &Rc<ArchiveInner<S>>) -> Result<EntryWriter<S>> {
        let mut state = self.state.borrow_mut();
        if state.ever_opened_for_write {
            return Err(ZipError::illegal_state(format!(
                "entry {:?} was already opened for writing once",
                state.name
            )));
        }
        if archive.write_session.get() {
            return Err(ZipError::illegal_state("another entry is still being written"));
        }
        state.ever_opened_for_write = true;
        state.currently_open_for_write = true;
        archive.write_session.set(true);
        Ok(EntryWriter::new(Rc::downgrade(archive), Rc::clone(&self.state), true))
    }

    fn open_update(&self) -> Result<BufferedEntryWriter> {
        let mut state = self.state.borrow_mut();
        if state.currently_open_for_write {
            return Err(ZipError::illegal_state(format!(
                "entry {:?} is already open for writing",
                state.name
            )));
        }
        state.ever_opened_for_write = true;
        state.currently_open_for_write = true;
        Ok(BufferedEntryWriter::new(Rc::clone(&self.state)))
    }

    /// Remove this entry from an archive opened for update.
    ///
    /// Every handle to the entry becomes unusable afterwards.
    pub fn delete(&self) -> Result<()> {
        let archive = self.archive()?;
        if archive.mode != OpenMode::Update {
            return Err(ZipError::illegal_state("entries can only be deleted in update mode"));
        }
        if self.state.borrow().currently_open_for_write {
            return Err(ZipError::illegal_state(format!(
                "entry {:?} is open for writing",
                self.state.borrow().name
            )));
        }
        archive.remove_entry(&self.state);
        let mut state = self.state.borrow_mut();
        state.deleted = true;
        debug!("Deleted entry {:?}", state.name);
        Ok(())
    }
}

/// Decompressing, and if needed decrypting, reader over one entry's data.
pub struct EntryReader<S: Read + Seek> {
    chain: ReadChain<S>,
}

impl<S: Read + Seek> Read for EntryReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.chain.read(buf)
    }
}

/// Stream returned by [`ZipEntry::open`].
pub enum EntryStream<S: Stream> {
    Reader(EntryReader<S>),
    Writer(EntryWriter<S>),
    Buffer(BufferedEntryWriter),
}

impl<S: Stream> EntryStream<S> {
    /// Complete a write. Also runs on drop, where errors can only be logged.
    pub fn finish(&mut self) -> Result<()> {
        match self {
            EntryStream::Reader(_) => Ok(()),
            EntryStream::Writer(w) => w.finish(),
            EntryStream::Buffer(w) => w.finish(),
        }
    }
}

fn wrong_direction(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("entry stream is not {what}"))
}

impl<S: Stream> Read for EntryStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryStream::Reader(r) => r.read(buf),
            _ => Err(wrong_direction("readable")),
        }
    }
}

impl<S: Stream> Write for EntryStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EntryStream::Reader(_) => Err(wrong_direction("writable")),
            EntryStream::Writer(w) => w.write(buf),
            EntryStream::Buffer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EntryStream::Reader(_) => Ok(()),
            EntryStream::Writer(w) => w.flush(),
            EntryStream::Buffer(w) => w.flush(),
        }
    }
}
