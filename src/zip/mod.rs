//! ZIP container: on-disk records, parsing, entries and the archive.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (local and central headers, EOCD, Zip64 records, extra fields)
//! - [`parser`]: backward EOCD search and central directory parsing
//! - [`archive`]: the [`ZipArchive`] container and its close/rewrite logic
//! - [`entry`]: [`ZipEntry`] handles and the streams they open
//! - `writer`: entry write sessions
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD at the end of the stream, then the Central
//! Directory; entry data is only touched when an entry is opened.
//!
//! ## Supported Features
//!
//! - Read, Create and Update modes
//! - ZIP64 extensions for sizes, offsets and entry counts
//! - STORED and DEFLATE compression methods
//! - Traditional PKWARE encryption
//!
//! ## Limitations
//!
//! - No multi-disk archive support
//! - No AES or strong encryption
//! - No BZIP2, LZMA, or other compression methods (recognized, not implemented)

pub mod archive;
pub mod entry;
pub mod parser;
pub mod structures;
mod writer;

pub use archive::{ArchiveOptions, OpenMode, ZipArchive};
pub use entry::{DecryptStatus, EntryReader, EntryStream, ZipEntry};
pub use structures::*;
pub use writer::{BufferedEntryWriter, EntryWriter};
