//! Low-level ZIP archive parser.
//!
//! This module locates and parses the trailing directory structures of an
//! archive held in any `Read + Seek` source.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Scan backward for the End of Central Directory (EOCD) signature
//! 2. If the EOCD carries a sentinel, look for the ZIP64 EOCD locator just
//!    before it (scanning further back if needed) and follow it to the
//!    ZIP64 EOCD
//! 3. Read the Central Directory sequentially until the recorded entry
//!    count is exhausted

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use tracing::{debug, warn};

use super::structures::*;
use crate::error::{Result, ZipError};

/// Default number of bytes read per step of the backward signature scan.
pub const DEFAULT_SEARCH_CHUNK: usize = 32;

/// Scan backward from `end` for a 4-byte little-endian `signature`.
///
/// Bytes are read in chunks of `chunk_size` ending at `end`, walking toward
/// the start of the stream. Each byte is shifted into a 32-bit accumulator,
/// so a signature split across two chunks is still found. Returns the offset
/// of the first signature byte, or `None` once the stream start is reached.
pub fn find_signature_backward<R: Read + Seek>(
    r: &mut R,
    end: u64,
    signature: u32,
    chunk_size: usize,
) -> io::Result<Option<u64>> {
    let chunk_size = chunk_size.max(1);
    let mut buf = vec![0u8; chunk_size];
    let mut acc: u32 = 0;
    let mut shifted: u64 = 0;
    let mut pos = end;

    while pos > 0 {
        let len = (chunk_size as u64).min(pos) as usize;
        let start = pos - len as u64;
        r.seek(SeekFrom::Start(start))?;
        r.read_exact(&mut buf[..len])?;

        for i in (0..len).rev() {
            acc = (acc << 8) | u32::from(buf[i]);
            shifted += 1;
            if shifted >= 4 && acc == signature {
                return Ok(Some(start + i as u64));
            }
        }
        pos = start;
    }
    Ok(None)
}

/// Everything read from the tail of an archive.
#[derive(Debug, Clone)]
pub struct Directory {
    pub eocd: EndOfCentralDirectory,
    pub eocd_offset: u64,
    pub zip64_locator: Option<Zip64EndOfCentralDirectoryLocator>,
    pub zip64_eocd: Option<Zip64EndOfCentralDirectory>,
    pub headers: Vec<CentralDirectoryFileHeader>,
}

impl Directory {
    /// `(offset, size, count)` of the central directory, preferring ZIP64 values.
    pub fn central_directory_span(&self) -> (u64, u64, u64) {
        match &self.zip64_eocd {
            Some(z) => (z.cd_offset, z.cd_size, z.total_entries),
            None => (
                u64::from(self.eocd.cd_offset),
                u64::from(self.eocd.cd_size),
                u64::from(self.eocd.total_entries),
            ),
        }
    }
}

/// Find and parse the End of Central Directory record.
///
/// A candidate whose comment would run past the end of the stream is taken
/// to be a stray signature (for instance inside the comment itself) and the
/// scan resumes below it.
pub fn find_eocd<R: Read + Seek>(
    r: &mut R,
    size: u64,
    chunk_size: usize,
) -> Result<(EndOfCentralDirectory, u64)> {
    let mut end = size;
    loop {
        let Some(offset) = find_signature_backward(r, end, EOCD_SIGNATURE, chunk_size)? else {
            return Err(ZipError::malformed("end of central directory not found"));
        };

        if offset + EndOfCentralDirectory::SIZE as u64 <= size {
            r.seek(SeekFrom::Start(offset + 20))?;
            let mut comment_len = [0u8; 2];
            r.read_exact(&mut comment_len)?;
            let comment_len = u64::from(u16::from_le_bytes(comment_len));
            if offset + EndOfCentralDirectory::SIZE as u64 + comment_len <= size {
                r.seek(SeekFrom::Start(offset))?;
                let eocd = EndOfCentralDirectory::read(r)?;
                debug!("Found end of central directory @{offset:#x}");
                return Ok((eocd, offset));
            }
        }

        debug!("Skipping EOCD candidate @{offset:#x}");
        // Resume so that only candidates strictly below this one are considered.
        end = offset + 3;
    }
}

/// Read the ZIP64 End of Central Directory record.
///
/// The locator normally sits immediately before the classic EOCD; failing
/// that, the scan walks backward from there. A candidate counts only if the
/// record it points to lies before it and starts with the Zip64 EOCD
/// signature, so locator-like bytes inside entry data are passed over.
/// Returns `None` when no valid locator is found.
pub fn read_zip64_eocd<R: Read + Seek>(
    r: &mut R,
    eocd_offset: u64,
    chunk_size: usize,
) -> Result<Option<(Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectory)>> {
    let fixed = eocd_offset.checked_sub(Zip64EndOfCentralDirectoryLocator::SIZE as u64);
    if let Some(offset) = fixed
        && let Some(found) = zip64_eocd_at(r, offset)?
    {
        return Ok(Some(found));
    }

    let mut end = fixed.map_or(eocd_offset, |offset| offset + 3);
    while let Some(offset) = find_signature_backward(r, end, ZIP64_EOCD_LOCATOR_SIGNATURE, chunk_size)? {
        if let Some(found) = zip64_eocd_at(r, offset)? {
            return Ok(Some(found));
        }
        debug!("Skipping zip64 locator candidate @{offset:#x}");
        end = offset + 3;
    }
    Ok(None)
}

/// Try the locator candidate at `offset`; `None` if it does not lead to a
/// Zip64 EOCD record.
fn zip64_eocd_at<R: Read + Seek>(
    r: &mut R,
    offset: u64,
) -> Result<Option<(Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectory)>> {
    r.seek(SeekFrom::Start(offset))?;
    let locator = match Zip64EndOfCentralDirectoryLocator::read(r) {
        Ok(locator) => locator,
        Err(ZipError::MalformedArchive(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let record_end = locator
        .eocd64_offset
        .checked_add(Zip64EndOfCentralDirectory::SIZE as u64);
    if record_end.is_none_or(|end| end > offset) {
        return Ok(None);
    }
    r.seek(SeekFrom::Start(locator.eocd64_offset))?;
    if r.read_u32::<LittleEndian>()? != ZIP64_EOCD_SIGNATURE {
        return Ok(None);
    }
    debug!("Zip64 EOCD locator @{offset:#x}: {locator:#x?}");

    if locator.total_disks > 1 {
        return Err(ZipError::unsupported(format!(
            "multi-disk archive ({} disks)",
            locator.total_disks
        )));
    }
    r.seek(SeekFrom::Start(locator.eocd64_offset))?;
    let record = Zip64EndOfCentralDirectory::read(r)?;
    debug!("Z64EOCD: {record:#x?}");
    Ok(Some((locator, record)))
}

/// Parse the central directory: exactly `count` records from `[offset, offset + size)`.
pub fn read_central_directory<R: Read + Seek>(
    r: &mut R,
    offset: u64,
    size: u64,
    count: u64,
) -> Result<Vec<CentralDirectoryFileHeader>> {
    let len = usize::try_from(size)
        .map_err(|_| ZipError::malformed(format!("central directory size {size} is too large")))?;
    let mut data = vec![0u8; len];
    r.seek(SeekFrom::Start(offset))?;
    r.read_exact(&mut data).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ZipError::malformed("central directory runs past end of stream"),
        _ => ZipError::Io(e),
    })?;

    let mut cursor = Cursor::new(data.as_slice());
    let mut headers = Vec::with_capacity(count.min(u64::from(u16::MAX)) as usize);
    for index in 0..count {
        if cursor.position() >= size {
            return Err(ZipError::malformed(format!(
                "central directory holds {index} entries, {count} recorded"
            )));
        }
        let header = CentralDirectoryFileHeader::read(&mut cursor).map_err(|e| match e {
            ZipError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                ZipError::malformed(format!("central directory record {index} is truncated"))
            }
            other => other,
        })?;
        headers.push(header);
    }

    if cursor.position() != size {
        debug!(
            "{} trailing bytes after central directory",
            size - cursor.position()
        );
    }
    Ok(headers)
}

/// Locate and parse all trailing structures of an archive of `size` bytes.
pub fn read_directory<R: Read + Seek>(r: &mut R, size: u64, chunk_size: usize) -> Result<Directory> {
    let (eocd, eocd_offset) = find_eocd(r, size, chunk_size)?;
    debug!("EOCD: {eocd:#x?}");

    let (zip64_locator, zip64_eocd) = if eocd.is_zip64() {
        match read_zip64_eocd(r, eocd_offset, chunk_size)? {
            Some((locator, record)) => (Some(locator), Some(record)),
            None => {
                warn!("EOCD carries a sentinel but no zip64 locator precedes it");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let mut directory = Directory {
        eocd,
        eocd_offset,
        zip64_locator,
        zip64_eocd,
        headers: Vec::new(),
    };

    let multi_disk = match &directory.zip64_eocd {
        Some(z) => z.disk_number != 0 || z.disk_with_cd != 0,
        None => {
            (directory.eocd.disk_number != 0 && directory.eocd.disk_number != SENTINEL_U16)
                || (directory.eocd.disk_with_cd != 0 && directory.eocd.disk_with_cd != SENTINEL_U16)
        }
    };
    if multi_disk {
        return Err(ZipError::unsupported("multi-disk archive"));
    }

    let (cd_offset, cd_size, count) = directory.central_directory_span();
    if cd_offset.checked_add(cd_size).is_none_or(|end| end > eocd_offset) {
        return Err(ZipError::malformed(format!(
            "central directory [{cd_offset:#x}, +{cd_size:#x}) overlaps the end records @{eocd_offset:#x}"
        )));
    }
    directory.headers = read_central_directory(r, cd_offset, cd_size, count)?;
    debug!("Read {} central directory records", directory.headers.len());
    Ok(directory)
}
