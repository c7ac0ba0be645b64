use quickcheck_macros::quickcheck;
use std::io::{Cursor, Read, Write};
use ziparc::{CompressionMethod, DecryptStatus, OpenMode, ZipArchive};

mod encryption;
mod files;
mod roundtrip;
mod update;

/// Write `files` into a fresh in-memory archive.
pub fn create_archive(files: &[(&str, &[u8])], password: Option<&str>) -> anyhow::Result<Vec<u8>> {
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    for (name, data) in files {
        let entry = archive.create_entry(name)?;
        if let Some(password) = password {
            entry.set_password(password);
        }
        let mut writer = entry.open()?;
        writer.write_all(data)?;
        writer.finish()?;
    }
    Ok(archive.into_inner()?.into_inner())
}

/// Read one entry back, returning its decrypt status and plaintext.
pub fn read_entry(
    data: &[u8],
    name: &str,
    password: Option<&str>,
) -> anyhow::Result<(DecryptStatus, Vec<u8>)> {
    let archive = ZipArchive::open(Cursor::new(data.to_vec()), OpenMode::Read)?;
    let entry = archive
        .get_entry(name)
        .ok_or_else(|| anyhow::anyhow!("missing entry {name:?}"))?;
    if let Some(password) = password {
        entry.set_password(password);
    }
    let mut out = Vec::new();
    entry.open()?.read_to_end(&mut out)?;
    Ok((entry.decrypt_status(), out))
}

pub fn entry_names(data: &[u8]) -> anyhow::Result<Vec<String>> {
    let archive = ZipArchive::open(Cursor::new(data.to_vec()), OpenMode::Read)?;
    Ok(archive.entries().iter().map(|e| e.name()).collect())
}

#[quickcheck]
fn test_read_what_we_write(files: Vec<Vec<u8>>, deflate: bool) -> bool {
    let method = if deflate {
        CompressionMethod::Deflate
    } else {
        CompressionMethod::Stored
    };

    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create).unwrap();
    for (i, data) in files.iter().enumerate() {
        let entry = archive.create_entry(&format!("file_{i}.bin")).unwrap();
        entry.set_compression_method(method).unwrap();
        let mut writer = entry.open().unwrap();
        std::io::copy(&mut Cursor::new(data), &mut writer).unwrap();
        writer.finish().unwrap();
    }
    let output = archive.into_inner().unwrap().into_inner();

    let archive = ZipArchive::open(Cursor::new(output), OpenMode::Read).unwrap();
    if archive.len() != files.len() {
        return false;
    }
    files.iter().enumerate().all(|(i, data)| {
        let entry = archive.get_entry(&format!("file_{i}.bin")).unwrap();
        let mut out = Vec::new();
        entry.open().unwrap().read_to_end(&mut out).unwrap();
        entry.uncompressed_size() == data.len() as u64
            && entry.crc32() == crc32fast::hash(data)
            && out == *data
    })
}
