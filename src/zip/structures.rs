//! On-disk ZIP records.
//!
//! Every record begins with a 4-byte little-endian signature which is
//! verified on read; a mismatch is a [`ZipError::MalformedArchive`], never
//! silently skipped. All multi-byte fields are little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{trace, warn};

use crate::dostime::DosDateTime;
use crate::error::{Result, ZipError};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
pub const EOCD_SIGNATURE: u32 = 0x06054b50;
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x06064b50;
pub const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x07064b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// Tag of the Zip64 extended information extra field.
pub const ZIP64_EXTRA_FIELD_TAG: u16 = 0x0001;

/// 32-bit fields holding this value defer to the Zip64 record.
pub const SENTINEL_U32: u32 = 0xFFFF_FFFF;
/// 16-bit fields holding this value defer to the Zip64 record.
pub const SENTINEL_U16: u16 = 0xFFFF;

pub const FLAG_ENCRYPTED: u16 = 1 << 0;
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
pub const FLAG_STRONG_ENCRYPTION: u16 = 1 << 6;
pub const FLAG_UTF8: u16 = 1 << 11;

pub const VERSION_STORED: u16 = 10;
pub const VERSION_DEFLATE: u16 = 20;
pub const VERSION_ZIP64: u16 = 45;
/// Upper byte 0: MS-DOS/FAT attribute compatibility.
pub const VERSION_MADE_BY: u16 = VERSION_ZIP64;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Shrink,
    Implode,
    Deflate,
    Deflate64,
    Bzip2,
    Lzma,
    Zstd,
    Xz,
    Aes,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            1 => CompressionMethod::Shrink,
            6 => CompressionMethod::Implode,
            8 => CompressionMethod::Deflate,
            9 => CompressionMethod::Deflate64,
            12 => CompressionMethod::Bzip2,
            14 => CompressionMethod::Lzma,
            93 => CompressionMethod::Zstd,
            95 => CompressionMethod::Xz,
            99 => CompressionMethod::Aes,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Shrink => 1,
            CompressionMethod::Implode => 6,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Deflate64 => 9,
            CompressionMethod::Bzip2 => 12,
            CompressionMethod::Lzma => 14,
            CompressionMethod::Zstd => 93,
            CompressionMethod::Xz => 95,
            CompressionMethod::Aes => 99,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// Whether entries using this method can be read and written.
    pub fn is_supported(&self) -> bool {
        matches!(self, CompressionMethod::Stored | CompressionMethod::Deflate)
    }

    /// Minimum "version needed to extract" for this method.
    pub fn version_needed(&self) -> u16 {
        match self {
            CompressionMethod::Stored => VERSION_STORED,
            _ => VERSION_DEFLATE,
        }
    }
}

/// Generic tag-length-value extra field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraField {
    pub tag: u16,
    pub data: Vec<u8>,
}

impl ExtraField {
    pub fn new(tag: u16, data: Vec<u8>) -> Self {
        Self { tag, data }
    }

    /// Encoded length including the 4-byte tag/size prefix.
    pub fn encoded_len(&self) -> usize {
        4 + self.data.len()
    }

    /// Parse a TLV sequence occupying exactly `raw`.
    ///
    /// A trailing fragment shorter than a TLV prefix, or a declared size
    /// running past the end, is malformed.
    pub fn parse_all(mut raw: &[u8]) -> Result<Vec<ExtraField>> {
        let mut fields = Vec::new();
        while !raw.is_empty() {
            if raw.len() < 4 {
                return Err(ZipError::malformed(format!(
                    "truncated extra field header ({} bytes left)",
                    raw.len()
                )));
            }
            let tag = raw.read_u16::<LittleEndian>()?;
            let size = usize::from(raw.read_u16::<LittleEndian>()?);
            if size > raw.len() {
                return Err(ZipError::malformed(format!(
                    "extra field {tag:#06x} declares {size} bytes but only {} remain",
                    raw.len()
                )));
            }
            let (data, rest) = raw.split_at(size);
            fields.push(ExtraField::new(tag, data.to_vec()));
            raw = rest;
        }
        Ok(fields)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let size = u16::try_from(self.data.len()).map_err(|_| {
            ZipError::invalid_argument(format!("extra field {:#06x} is too large", self.tag))
        })?;
        w.write_u16::<LittleEndian>(self.tag)?;
        w.write_u16::<LittleEndian>(size)?;
        w.write_all(&self.data)?;
        Ok(())
    }
}

fn encode_extra_fields(fields: &[ExtraField]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(fields.iter().map(ExtraField::encoded_len).sum());
    for field in fields {
        field.write(&mut out)?;
    }
    if out.len() > usize::from(u16::MAX) {
        return Err(ZipError::invalid_argument("extra fields exceed 65535 bytes"));
    }
    Ok(out)
}

/// Which base header fields were sentineled, and therefore which values a
/// Zip64 extra field carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Presence {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub local_header_offset: bool,
    pub disk_start: bool,
}

impl Zip64Presence {
    pub fn any(&self) -> bool {
        self.uncompressed_size || self.compressed_size || self.local_header_offset || self.disk_start
    }

    /// Payload length implied by the present subset.
    pub fn payload_len(&self) -> usize {
        let mut len = 0;
        for present in [self.uncompressed_size, self.compressed_size, self.local_header_offset] {
            if present {
                len += 8;
            }
        }
        if self.disk_start {
            len += 4;
        }
        len
    }
}

/// Zip64 extended information (tag `0x0001`).
///
/// The payload is positional: it holds only the values whose base field was
/// sentineled, always in the order uncompressed size, compressed size, local
/// header offset, disk start. Nothing in the payload says which are present,
/// so parsing requires the [`Zip64Presence`] of the referencing header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64ExtraField {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub local_header_offset: Option<u64>,
    pub disk_start: Option<u32>,
}

impl Zip64ExtraField {
    pub fn parse(mut data: &[u8], presence: Zip64Presence) -> Result<Self> {
        if data.len() < presence.payload_len() {
            return Err(ZipError::malformed(format!(
                "zip64 extra field holds {} bytes, {} required",
                data.len(),
                presence.payload_len()
            )));
        }
        let mut field = Zip64ExtraField::default();
        if presence.uncompressed_size {
            field.uncompressed_size = Some(data.read_u64::<LittleEndian>()?);
        }
        if presence.compressed_size {
            field.compressed_size = Some(data.read_u64::<LittleEndian>()?);
        }
        if presence.local_header_offset {
            field.local_header_offset = Some(data.read_u64::<LittleEndian>()?);
        }
        if presence.disk_start {
            field.disk_start = Some(data.read_u32::<LittleEndian>()?);
        }
        Ok(field)
    }

    pub fn presence(&self) -> Zip64Presence {
        Zip64Presence {
            uncompressed_size: self.uncompressed_size.is_some(),
            compressed_size: self.compressed_size.is_some(),
            local_header_offset: self.local_header_offset.is_some(),
            disk_start: self.disk_start.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.presence().any()
    }

    pub fn to_extra_field(&self) -> ExtraField {
        let mut data = Vec::with_capacity(self.presence().payload_len());
        for value in [self.uncompressed_size, self.compressed_size, self.local_header_offset]
            .into_iter()
            .flatten()
        {
            data.extend_from_slice(&value.to_le_bytes());
        }
        if let Some(disk) = self.disk_start {
            data.extend_from_slice(&disk.to_le_bytes());
        }
        ExtraField::new(ZIP64_EXTRA_FIELD_TAG, data)
    }
}

pub(crate) fn promote_u32(value: u64) -> (u32, Option<u64>) {
    if value >= u64::from(SENTINEL_U32) {
        (SENTINEL_U32, Some(value))
    } else {
        (value as u32, None)
    }
}

fn check_signature(found: u32, expected: u32, what: &str) -> Result<()> {
    if found != expected {
        return Err(ZipError::malformed(format!(
            "invalid {what} signature: expected {expected:#010x}, found {found:#010x}"
        )));
    }
    Ok(())
}

fn u16_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| ZipError::invalid_argument(format!("{what} exceeds 65535 bytes")))
}

/// Central Directory File Header
///
/// Sizes, offset and disk number hold their full values here; sentinel
/// promotion happens only when serializing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CentralDirectoryFileHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub disk_number_start: u32,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub local_header_offset: u64,
    pub file_name: Vec<u8>,
    /// Extra fields other than Zip64, which is regenerated on write.
    pub extra_fields: Vec<ExtraField>,
    pub comment: Vec<u8>,
}

impl CentralDirectoryFileHeader {
    pub const SIGNATURE: u32 = CENTRAL_DIRECTORY_SIGNATURE;
    pub const FIXED_SIZE: usize = 46;

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        check_signature(r.read_u32::<LittleEndian>()?, Self::SIGNATURE, "central directory")?;

        let version_made_by = r.read_u16::<LittleEndian>()?;
        let version_needed = r.read_u16::<LittleEndian>()?;
        let flags = r.read_u16::<LittleEndian>()?;
        let compression_method = r.read_u16::<LittleEndian>()?;
        let time = r.read_u16::<LittleEndian>()?;
        let date = r.read_u16::<LittleEndian>()?;
        let crc32 = r.read_u32::<LittleEndian>()?;
        let compressed_size = r.read_u32::<LittleEndian>()?;
        let uncompressed_size = r.read_u32::<LittleEndian>()?;
        let name_len = r.read_u16::<LittleEndian>()?;
        let extra_len = r.read_u16::<LittleEndian>()?;
        let comment_len = r.read_u16::<LittleEndian>()?;
        let disk_number_start = r.read_u16::<LittleEndian>()?;
        let internal_attributes = r.read_u16::<LittleEndian>()?;
        let external_attributes = r.read_u32::<LittleEndian>()?;
        let local_header_offset = r.read_u32::<LittleEndian>()?;

        let mut file_name = vec![0u8; name_len.into()];
        r.read_exact(&mut file_name)?;
        let mut extra = vec![0u8; extra_len.into()];
        r.read_exact(&mut extra)?;
        let mut comment = vec![0u8; comment_len.into()];
        r.read_exact(&mut comment)?;

        let mut extra_fields = ExtraField::parse_all(&extra)?;

        let presence = Zip64Presence {
            uncompressed_size: uncompressed_size == SENTINEL_U32,
            compressed_size: compressed_size == SENTINEL_U32,
            local_header_offset: local_header_offset == SENTINEL_U32,
            disk_start: disk_number_start == SENTINEL_U16,
        };

        let zip64_pos = extra_fields.iter().position(|f| f.tag == ZIP64_EXTRA_FIELD_TAG);
        let zip64 = match zip64_pos {
            Some(pos) => {
                let field = extra_fields.remove(pos);
                Zip64ExtraField::parse(&field.data, presence)?
            }
            None => {
                if presence.any() {
                    warn!(
                        "sentineled fields without a zip64 extra field in {:?}",
                        String::from_utf8_lossy(&file_name)
                    );
                }
                Zip64ExtraField::default()
            }
        };

        let header = Self {
            version_made_by,
            version_needed,
            flags,
            compression_method,
            last_modified: DosDateTime::new(time, date),
            crc32,
            compressed_size: zip64.compressed_size.unwrap_or(compressed_size.into()),
            uncompressed_size: zip64.uncompressed_size.unwrap_or(uncompressed_size.into()),
            disk_number_start: zip64.disk_start.unwrap_or(disk_number_start.into()),
            internal_attributes,
            external_attributes,
            local_header_offset: zip64.local_header_offset.unwrap_or(local_header_offset.into()),
            file_name,
            extra_fields,
            comment,
        };
        trace!("{:#x?}", header);
        Ok(header)
    }

    /// The Zip64 extra field this header needs, if any value overflows its base field.
    pub fn zip64_extra(&self) -> Zip64ExtraField {
        Zip64ExtraField {
            uncompressed_size: promote_u32(self.uncompressed_size).1,
            compressed_size: promote_u32(self.compressed_size).1,
            local_header_offset: promote_u32(self.local_header_offset).1,
            disk_start: (self.disk_number_start >= u32::from(SENTINEL_U16))
                .then_some(self.disk_number_start),
        }
    }

    fn encoded_extra(&self, zip64: &Zip64ExtraField) -> Result<Vec<u8>> {
        let mut fields = Vec::with_capacity(self.extra_fields.len() + 1);
        if !zip64.is_empty() {
            fields.push(zip64.to_extra_field());
        }
        fields.extend(self.extra_fields.iter().cloned());
        encode_extra_fields(&fields)
    }

    /// Length of the encoded record. Fails exactly where [`write`](Self::write)
    /// would, on a variable field longer than 65535 bytes.
    pub fn encoded_len(&self) -> Result<u64> {
        let extra = self.encoded_extra(&self.zip64_extra())?;
        u16_len(self.file_name.len(), "file name")?;
        u16_len(self.comment.len(), "file comment")?;
        Ok((Self::FIXED_SIZE + self.file_name.len() + extra.len() + self.comment.len()) as u64)
    }

    /// Serialize, promoting overflowing values to a Zip64 extra field.
    /// Returns the number of bytes written.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<u64> {
        let zip64 = self.zip64_extra();
        let extra = self.encoded_extra(&zip64)?;

        let version_needed = if zip64.is_empty() {
            self.version_needed
        } else {
            self.version_needed.max(VERSION_ZIP64)
        };
        let disk_start = if zip64.disk_start.is_some() {
            SENTINEL_U16
        } else {
            self.disk_number_start as u16
        };

        w.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_made_by)?;
        w.write_u16::<LittleEndian>(version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method)?;
        w.write_u16::<LittleEndian>(self.last_modified.time)?;
        w.write_u16::<LittleEndian>(self.last_modified.date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(promote_u32(self.compressed_size).0)?;
        w.write_u32::<LittleEndian>(promote_u32(self.uncompressed_size).0)?;
        w.write_u16::<LittleEndian>(u16_len(self.file_name.len(), "file name")?)?;
        w.write_u16::<LittleEndian>(extra.len() as u16)?;
        w.write_u16::<LittleEndian>(u16_len(self.comment.len(), "file comment")?)?;
        w.write_u16::<LittleEndian>(disk_start)?;
        w.write_u16::<LittleEndian>(self.internal_attributes)?;
        w.write_u32::<LittleEndian>(self.external_attributes)?;
        w.write_u32::<LittleEndian>(promote_u32(self.local_header_offset).0)?;
        w.write_all(&self.file_name)?;
        w.write_all(&extra)?;
        w.write_all(&self.comment)?;

        Ok((Self::FIXED_SIZE + self.file_name.len() + extra.len() + self.comment.len()) as u64)
    }
}

/// Local File Header
///
/// Sizes are kept as their raw 32-bit values. The header is written once
/// provisionally and later patched in place with
/// [`patch_sizes`](LocalFileHeader::patch_sizes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: Vec<u8>,
    pub extra_fields: Vec<ExtraField>,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = LOCAL_FILE_HEADER_SIGNATURE;
    pub const FIXED_SIZE: usize = 30;
    /// Offset of the CRC32 field from the start of the header; the two size
    /// fields follow it immediately.
    pub const CRC32_OFFSET: u64 = 14;

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        check_signature(r.read_u32::<LittleEndian>()?, Self::SIGNATURE, "local file header")?;

        let version_needed = r.read_u16::<LittleEndian>()?;
        let flags = r.read_u16::<LittleEndian>()?;
        let compression_method = r.read_u16::<LittleEndian>()?;
        let time = r.read_u16::<LittleEndian>()?;
        let date = r.read_u16::<LittleEndian>()?;
        let crc32 = r.read_u32::<LittleEndian>()?;
        let compressed_size = r.read_u32::<LittleEndian>()?;
        let uncompressed_size = r.read_u32::<LittleEndian>()?;
        let name_len = r.read_u16::<LittleEndian>()?;
        let extra_len = r.read_u16::<LittleEndian>()?;

        let mut file_name = vec![0u8; name_len.into()];
        r.read_exact(&mut file_name)?;
        let mut extra = vec![0u8; extra_len.into()];
        r.read_exact(&mut extra)?;

        Ok(Self {
            version_needed,
            flags,
            compression_method,
            last_modified: DosDateTime::new(time, date),
            crc32,
            compressed_size,
            uncompressed_size,
            file_name,
            extra_fields: ExtraField::parse_all(&extra)?,
        })
    }

    /// Total encoded length of this header.
    pub fn encoded_len(&self) -> u64 {
        let extra: usize = self.extra_fields.iter().map(ExtraField::encoded_len).sum();
        (Self::FIXED_SIZE + self.file_name.len() + extra) as u64
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<u64> {
        let extra = encode_extra_fields(&self.extra_fields)?;
        w.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method)?;
        w.write_u16::<LittleEndian>(self.last_modified.time)?;
        w.write_u16::<LittleEndian>(self.last_modified.date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size)?;
        w.write_u16::<LittleEndian>(u16_len(self.file_name.len(), "file name")?)?;
        w.write_u16::<LittleEndian>(extra.len() as u16)?;
        w.write_all(&self.file_name)?;
        w.write_all(&extra)?;
        Ok((Self::FIXED_SIZE + self.file_name.len() + extra.len()) as u64)
    }

    /// Overwrite the CRC32 and both size fields of a header already in `w`
    /// at `header_offset`. Sizes that do not fit are written as the sentinel.
    /// Leaves the position just past the patched range.
    pub fn patch_sizes<W: Write + Seek>(
        w: &mut W,
        header_offset: u64,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Result<()> {
        w.seek(SeekFrom::Start(header_offset + Self::CRC32_OFFSET))?;
        w.write_u32::<LittleEndian>(crc32)?;
        w.write_u32::<LittleEndian>(promote_u32(compressed_size).0)?;
        w.write_u32::<LittleEndian>(promote_u32(uncompressed_size).0)?;
        Ok(())
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = EOCD_SIGNATURE;
    pub const SIZE: usize = 22;

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        check_signature(r.read_u32::<LittleEndian>()?, Self::SIGNATURE, "end of central directory")?;
        let disk_number = r.read_u16::<LittleEndian>()?;
        let disk_with_cd = r.read_u16::<LittleEndian>()?;
        let disk_entries = r.read_u16::<LittleEndian>()?;
        let total_entries = r.read_u16::<LittleEndian>()?;
        let cd_size = r.read_u32::<LittleEndian>()?;
        let cd_offset = r.read_u32::<LittleEndian>()?;
        let comment_len = r.read_u16::<LittleEndian>()?;
        let mut comment = vec![0u8; comment_len.into()];
        r.read_exact(&mut comment)?;

        if disk_entries != total_entries {
            return Err(ZipError::malformed(format!(
                "entry count mismatch: {disk_entries} on this disk, {total_entries} in total"
            )));
        }

        Ok(Self {
            disk_number,
            disk_with_cd,
            disk_entries,
            total_entries,
            cd_size,
            cd_offset,
            comment,
        })
    }

    /// Whether any field carries its sentinel, deferring to the Zip64 record.
    pub fn is_zip64(&self) -> bool {
        self.disk_number == SENTINEL_U16
            || self.disk_with_cd == SENTINEL_U16
            || self.disk_entries == SENTINEL_U16
            || self.total_entries == SENTINEL_U16
            || self.cd_size == SENTINEL_U32
            || self.cd_offset == SENTINEL_U32
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<u64> {
        w.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.disk_number)?;
        w.write_u16::<LittleEndian>(self.disk_with_cd)?;
        w.write_u16::<LittleEndian>(self.disk_entries)?;
        w.write_u16::<LittleEndian>(self.total_entries)?;
        w.write_u32::<LittleEndian>(self.cd_size)?;
        w.write_u32::<LittleEndian>(self.cd_offset)?;
        w.write_u16::<LittleEndian>(u16_len(self.comment.len(), "archive comment")?)?;
        w.write_all(&self.comment)?;
        Ok((Self::SIZE + self.comment.len()) as u64)
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub const SIGNATURE: u32 = ZIP64_EOCD_LOCATOR_SIGNATURE;
    pub const SIZE: usize = 20;

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        check_signature(r.read_u32::<LittleEndian>()?, Self::SIGNATURE, "zip64 end of central directory locator")?;
        Ok(Self {
            disk_with_eocd64: r.read_u32::<LittleEndian>()?,
            eocd64_offset: r.read_u64::<LittleEndian>()?,
            total_disks: r.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<u64> {
        w.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        w.write_u32::<LittleEndian>(self.disk_with_eocd64)?;
        w.write_u64::<LittleEndian>(self.eocd64_offset)?;
        w.write_u32::<LittleEndian>(self.total_disks)?;
        Ok(Self::SIZE as u64)
    }
}

/// ZIP64 End of Central Directory - 56 bytes, of which the trailing 44 are
/// counted by the record's own size field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: u32 = ZIP64_EOCD_SIGNATURE;
    /// Value of the "size of record" field: everything after that field.
    pub const RECORD_SIZE: u64 = 44;
    pub const SIZE: usize = 56;

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        check_signature(r.read_u32::<LittleEndian>()?, Self::SIGNATURE, "zip64 end of central directory")?;
        let record_size = r.read_u64::<LittleEndian>()?;
        if record_size < Self::RECORD_SIZE {
            return Err(ZipError::malformed(format!(
                "zip64 end of central directory record too small: {record_size}"
            )));
        }
        let record = Self {
            version_made_by: r.read_u16::<LittleEndian>()?,
            version_needed: r.read_u16::<LittleEndian>()?,
            disk_number: r.read_u32::<LittleEndian>()?,
            disk_with_cd: r.read_u32::<LittleEndian>()?,
            disk_entries: r.read_u64::<LittleEndian>()?,
            total_entries: r.read_u64::<LittleEndian>()?,
            cd_size: r.read_u64::<LittleEndian>()?,
            cd_offset: r.read_u64::<LittleEndian>()?,
        };
        if record.disk_entries != record.total_entries {
            return Err(ZipError::malformed(format!(
                "zip64 entry count mismatch: {} on this disk, {} in total",
                record.disk_entries, record.total_entries
            )));
        }
        Ok(record)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<u64> {
        w.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        w.write_u64::<LittleEndian>(Self::RECORD_SIZE)?;
        w.write_u16::<LittleEndian>(self.version_made_by)?;
        w.write_u16::<LittleEndian>(self.version_needed)?;
        w.write_u32::<LittleEndian>(self.disk_number)?;
        w.write_u32::<LittleEndian>(self.disk_with_cd)?;
        w.write_u64::<LittleEndian>(self.disk_entries)?;
        w.write_u64::<LittleEndian>(self.total_entries)?;
        w.write_u64::<LittleEndian>(self.cd_size)?;
        w.write_u64::<LittleEndian>(self.cd_offset)?;
        Ok(Self::SIZE as u64)
    }
}
