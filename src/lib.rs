//! # ziparc
//!
//! A ZIP container engine: reads, creates and updates archives over any
//! seekable byte stream.
//!
//! ## Features
//!
//! - Read, Create and Update open modes
//! - ZIP64 extensions (entries and archives larger than 4GB, more than 65535 entries)
//! - STORED and DEFLATE compression methods
//! - Traditional PKWARE ("ZipCrypto") encryption
//! - Configurable name encoding for archives without the UTF-8 flag
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use ziparc::{FileStream, OpenMode, ZipArchive};
//!
//! fn main() -> ziparc::Result<()> {
//!     let archive = ZipArchive::open(FileStream::open("archive.zip")?, OpenMode::Read)?;
//!
//!     // List all files in the archive
//!     for entry in archive.entries() {
//!         println!("{} ({} bytes)", entry.name(), entry.uncompressed_size());
//!     }
//!
//!     // Read one of them
//!     if let Some(entry) = archive.get_entry("readme.txt") {
//!         let mut text = String::new();
//!         entry.open()?.read_to_string(&mut text)?;
//!     }
//!     Ok(())
//! }
//! ```

mod dostime;
pub mod error;
pub mod io;
pub mod transform;
pub mod zip;

pub use dostime::DosDateTime;
pub use error::{ErrorKind, Result, ZipError};
pub use io::{FileStream, ReadOnly, Stream};
pub use zip::{
    ArchiveOptions, CompressionMethod, DecryptStatus, EntryStream, ExtraField, OpenMode, ZipArchive,
    ZipEntry,
};
