use std::io::{Read, Write};
use ziparc::{ErrorKind, FileStream, OpenMode, ZipArchive};

#[test]
fn test_file_backed_archive() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("test.zip");

    let archive = ZipArchive::open(FileStream::create(&path)?, OpenMode::Create)?;
    let entry = archive.create_entry("1.txt")?;
    entry.set_password("2333");
    let mut writer = entry.open()?;
    writer.write_all(b"2333")?;
    writer.finish()?;
    drop(writer);
    archive.close()?;
    drop(archive);

    let archive = ZipArchive::open(FileStream::open_rw(&path)?, OpenMode::Update)?;
    let mut writer = archive.create_entry("test/2.txt")?.open()?;
    writer.write_all(b"1234")?;
    writer.finish()?;
    drop(writer);
    archive.close()?;
    drop(archive);

    let archive = ZipArchive::open(FileStream::open(&path)?, OpenMode::Read)?;
    assert_eq!(archive.len(), 2);
    let entry = archive.get_entry("1.txt").unwrap();
    entry.set_password("2333");
    let mut out = Vec::new();
    entry.open()?.read_to_end(&mut out)?;
    assert_eq!(out, b"2333");
    out.clear();
    archive.get_entry("test/2.txt").unwrap().open()?.read_to_end(&mut out)?;
    assert_eq!(out, b"1234");
    Ok(())
}

#[test]
fn test_read_only_file_rejects_update() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.zip");
    ZipArchive::open(FileStream::create(&path)?, OpenMode::Create)?.close()?;

    let err = ZipArchive::open(FileStream::open(&path)?, OpenMode::Update).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let archive = ZipArchive::open(FileStream::open(&path)?, OpenMode::Read)?;
    assert!(archive.is_empty());
    Ok(())
}

/// The central directory lands past 4 GiB, which alone calls for the Zip64
/// end records. The file is sparse, so this costs no real disk space.
#[cfg(unix)]
#[test]
fn test_central_directory_beyond_4gib() -> anyhow::Result<()> {
    use std::io::{Seek, SeekFrom};

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("far.zip");
    let start = 0xFFFF_FFF0u64;

    let mut stream = FileStream::create(&path)?;
    stream.seek(SeekFrom::Start(start))?;
    let archive = ZipArchive::open(stream, OpenMode::Create)?;
    let mut writer = archive.create_entry("1.txt")?.open()?;
    writer.write_all(b"2333")?;
    writer.finish()?;
    drop(writer);
    archive.close()?;
    let record = archive.zip64_end_of_central_directory().unwrap();
    assert!(record.cd_offset >= 0xFFFF_FFFF);
    assert_eq!(record.total_entries, 1);
    drop(archive);

    let archive = ZipArchive::open(FileStream::open(&path)?, OpenMode::Read)?;
    let eocd = archive.end_of_central_directory();
    assert_eq!(eocd.cd_offset, 0xFFFF_FFFF);
    assert_eq!(eocd.total_entries, 0xFFFF);
    assert!(archive.zip64_locator().is_some());
    let entry = archive.get_entry("1.txt").unwrap();
    assert_eq!(entry.local_header_offset(), start);
    let mut out = Vec::new();
    entry.open()?.read_to_end(&mut out)?;
    assert_eq!(out, b"2333");
    Ok(())
}
