use crate::{create_archive, entry_names, read_entry};
use encoding_rs::SHIFT_JIS;
use rstest::rstest;
use std::io::{Cursor, Read, Write};
use time::macros::datetime;
use ziparc::{ArchiveOptions, CompressionMethod, DecryptStatus, ErrorKind, OpenMode, ZipArchive};

#[test]
fn test_single_entry_round_trip() -> anyhow::Result<()> {
    let data = create_archive(&[("1.txt", b"2333")], None)?;
    let (status, content) = read_entry(&data, "1.txt", None)?;
    assert_eq!(content, b"2333");
    assert_eq!(status, DecryptStatus::NeedNotToDecrypt);
    Ok(())
}

#[rstest]
#[case(CompressionMethod::Stored)]
#[case(CompressionMethod::Deflate)]
fn test_compression_methods(#[case] method: CompressionMethod) -> anyhow::Result<()> {
    let payload = b"The quick brown fox jumps over the lazy dog. ".repeat(200);
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    let entry = archive.create_entry("fox.txt")?;
    entry.set_compression_method(method)?;
    let mut writer = entry.open()?;
    // Many small writes, so the codec sees a stream rather than one buffer.
    for chunk in payload.chunks(7) {
        writer.write_all(chunk)?;
    }
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();

    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    let entry = archive.get_entry("fox.txt").unwrap();
    assert_eq!(entry.compression_method(), method);
    assert_eq!(entry.uncompressed_size(), payload.len() as u64);
    assert_eq!(entry.crc32(), crc32fast::hash(&payload));
    match method {
        CompressionMethod::Stored => assert_eq!(entry.compressed_size(), payload.len() as u64),
        _ => assert!(entry.compressed_size() < payload.len() as u64),
    }
    let mut out = Vec::new();
    entry.open()?.read_to_end(&mut out)?;
    assert_eq!(out, payload);
    Ok(())
}

#[test]
fn test_many_entries_keep_order() -> anyhow::Result<()> {
    let files: Vec<(String, Vec<u8>)> = (0..20)
        .map(|i| (format!("dir/file_{i:02}.txt"), format!("content {i}").into_bytes()))
        .collect();
    let refs: Vec<(&str, &[u8])> = files.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
    let data = create_archive(&refs, None)?;

    let names = entry_names(&data)?;
    assert_eq!(names, files.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>());
    for (name, content) in &files {
        assert_eq!(&read_entry(&data, name, None)?.1, content);
    }
    Ok(())
}

#[test]
fn test_unwritten_entry_is_empty_stored() -> anyhow::Result<()> {
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    archive.create_entry("empty/")?;
    let entry = archive.create_entry("opened-but-empty.txt")?;
    entry.set_password("ignored");
    entry.open()?.finish()?;
    let data = archive.into_inner()?.into_inner();

    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    assert_eq!(archive.len(), 2);
    for entry in archive.entries() {
        assert_eq!(entry.compression_method(), CompressionMethod::Stored);
        assert_eq!(entry.compressed_size(), 0);
        assert_eq!(entry.crc32(), 0);
        assert!(!entry.is_encrypted());
        let mut out = Vec::new();
        entry.open()?.read_to_end(&mut out)?;
        assert!(out.is_empty());
    }
    assert!(archive.get_entry("empty/").unwrap().is_dir());
    Ok(())
}

#[test]
fn test_metadata_round_trip() -> anyhow::Result<()> {
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    archive.set_comment("archive comment")?;
    let entry = archive.create_entry("meta.txt")?;
    entry.set_last_modified(datetime!(2009-11-15 22:46:10))?;
    entry.set_comment("entry comment")?;
    entry.set_external_attributes(0o100644 << 16)?;
    let mut writer = entry.open()?;
    writer.write_all(b"meta")?;
    writer.finish()?;
    drop(writer);
    // Data is on disk now, so the timestamp is frozen.
    assert_eq!(
        entry.set_last_modified(datetime!(2020-01-01 0:00)).unwrap_err().kind(),
        ErrorKind::IllegalState
    );
    let data = archive.into_inner()?.into_inner();

    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    assert_eq!(archive.comment(), "archive comment");
    let entry = archive.get_entry("meta.txt").unwrap();
    assert_eq!(entry.last_modified(), Some(datetime!(2009-11-15 22:46:10)));
    assert_eq!(entry.comment(), "entry comment");
    assert_eq!(entry.external_attributes(), 0o100644 << 16);
    assert_eq!(entry.local_header_offset(), 0);
    Ok(())
}

#[test]
fn test_create_starts_at_stream_position() -> anyhow::Result<()> {
    let prefix = b"#!/bin/sh\nexit 0\n".to_vec();
    let mut stream = Cursor::new(prefix.clone());
    stream.set_position(prefix.len() as u64);

    let archive = ZipArchive::open(stream, OpenMode::Create)?;
    let mut writer = archive.create_entry("payload.txt")?.open()?;
    writer.write_all(b"appended")?;
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();

    assert!(data.starts_with(&prefix));
    let archive = ZipArchive::open(Cursor::new(data.clone()), OpenMode::Read)?;
    assert_eq!(
        archive.get_entry("payload.txt").unwrap().local_header_offset(),
        prefix.len() as u64
    );
    assert_eq!(read_entry(&data, "payload.txt", None)?.1, b"appended");
    Ok(())
}

#[test]
fn test_custom_encoding() -> anyhow::Result<()> {
    let options = ArchiveOptions::new().encoding(SHIFT_JIS);
    let archive = ZipArchive::open_with(Cursor::new(Vec::new()), OpenMode::Create, options)?;
    let mut writer = archive.create_entry("日本語.txt")?.open()?;
    writer.write_all(b"nihongo")?;
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();

    // The name is stored in Shift_JIS, not UTF-8.
    assert!(!data.windows(9).any(|w| w == "日本語".as_bytes()));

    let archive = ZipArchive::open_with(Cursor::new(data), OpenMode::Read, options)?;
    let entry = archive.get_entry("日本語.txt").unwrap();
    let mut out = Vec::new();
    entry.open()?.read_to_end(&mut out)?;
    assert_eq!(out, b"nihongo");
    Ok(())
}

#[test]
fn test_duplicate_names_last_wins() -> anyhow::Result<()> {
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    let first = archive.create_entry("dup.txt")?;
    let second = archive.create_entry("dup.txt")?;
    assert_eq!(archive.len(), 1);
    assert_eq!(first.open().err().map(|e| e.kind()), Some(ErrorKind::IllegalState));

    let mut writer = second.open()?;
    writer.write_all(b"second")?;
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();

    assert_eq!(entry_names(&data)?, vec!["dup.txt".to_string()]);
    assert_eq!(read_entry(&data, "dup.txt", None)?.1, b"second");
    Ok(())
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(1000)]
#[case(0xFFFF)]
fn test_trailing_comment(#[case] len: usize) -> anyhow::Result<()> {
    // The comment embeds a stray end-of-central-directory signature.
    let mut comment = "x".repeat(len);
    if len >= 22 {
        comment.replace_range(len - 22..len - 18, "PK\x05\x06");
    }

    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    archive.set_comment(&comment)?;
    let mut writer = archive.create_entry("1.txt")?.open()?;
    writer.write_all(b"2333")?;
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();

    let archive = ZipArchive::open(Cursor::new(data.clone()), OpenMode::Read)?;
    assert_eq!(archive.comment(), comment);
    assert_eq!(archive.len(), 1);
    assert_eq!(read_entry(&data, "1.txt", None)?.1, b"2333");
    Ok(())
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(32)]
#[case(4096)]
fn test_search_chunk_sizes(#[case] chunk: usize) -> anyhow::Result<()> {
    let data = create_archive(&[("a", b"alpha"), ("b", b"beta")], None)?;
    let options = ArchiveOptions::new().search_chunk_size(chunk);
    let archive = ZipArchive::open_with(Cursor::new(data), OpenMode::Read, options)?;
    assert_eq!(archive.len(), 2);
    Ok(())
}

#[test]
fn test_comment_too_long() -> anyhow::Result<()> {
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    let err = archive.set_comment(&"x".repeat(0x10000)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    Ok(())
}
