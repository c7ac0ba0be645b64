use crate::{create_archive, read_entry};
use rstest::rstest;
use std::io::{Cursor, Read, Write};
use ziparc::{CompressionMethod, DecryptStatus, ErrorKind, OpenMode, ZipArchive};

#[test]
fn test_password_round_trip() -> anyhow::Result<()> {
    let data = create_archive(&[("1.txt", b"2333")], Some("2333"))?;
    let (status, content) = read_entry(&data, "1.txt", Some("2333"))?;
    assert_eq!(status, DecryptStatus::Success);
    assert_eq!(content, b"2333");
    Ok(())
}

#[test]
fn test_ciphertext_hides_plaintext() -> anyhow::Result<()> {
    let secret = b"attack at dawn, attack at dawn, attack at dawn";
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    let entry = archive.create_entry("secret.txt")?;
    entry.set_password("hunter2");
    entry.set_compression_method(CompressionMethod::Stored)?;
    let mut writer = entry.open()?;
    writer.write_all(secret)?;
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();

    assert!(!data.windows(secret.len()).any(|w| w == secret));
    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    let entry = archive.get_entry("secret.txt").unwrap();
    assert!(entry.is_encrypted());
    // Payload plus the 12-byte encryption header.
    assert_eq!(entry.compressed_size(), secret.len() as u64 + 12);
    Ok(())
}

#[rstest]
#[case(CompressionMethod::Stored)]
#[case(CompressionMethod::Deflate)]
fn test_wrong_password_is_soft(#[case] method: CompressionMethod) -> anyhow::Result<()> {
    let original = b"some moderately long plaintext that should not survive a wrong key".to_vec();
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    let entry = archive.create_entry("1.txt")?;
    entry.set_password("right");
    entry.set_compression_method(method)?;
    let mut writer = entry.open()?;
    writer.write_all(&original)?;
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();

    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    let entry = archive.get_entry("1.txt").unwrap();
    entry.set_password("wrong");
    // Opening never fails on a bad password; the outcome is a status.
    let mut stream = entry.open()?;
    let status = entry.decrypt_status();
    let mut out = Vec::new();
    let read = stream.read_to_end(&mut out);
    match status {
        DecryptStatus::Crc32CheckFailed => {
            // Inflating garbage may fail outright; if it does not, the bytes differ.
            if read.is_ok() {
                assert_ne!(out, original);
            }
        }
        // A false accept is possible, roughly once in 65536.
        DecryptStatus::Success => {}
        other => panic!("unexpected status {other:?}"),
    }
    Ok(())
}

#[test]
fn test_missing_password() -> anyhow::Result<()> {
    let data = create_archive(&[("1.txt", b"2333")], Some("2333"))?;
    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    let entry = archive.get_entry("1.txt").unwrap();
    assert_eq!(entry.decrypt_status(), DecryptStatus::NotDecryptYet);
    let err = entry.open().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::EntryEncrypted);
    assert!(err.to_string().contains("1.txt"));
    Ok(())
}

#[test]
fn test_unencrypted_status() -> anyhow::Result<()> {
    let data = create_archive(&[("plain.txt", b"plain")], None)?;
    // A password on an unencrypted entry is simply unused.
    let (status, content) = read_entry(&data, "plain.txt", Some("unused"))?;
    assert_eq!(status, DecryptStatus::NeedNotToDecrypt);
    assert_eq!(content, b"plain");
    Ok(())
}

#[test]
fn test_encrypted_entry_survives_update() -> anyhow::Result<()> {
    let mut data = create_archive(&[("locked.txt", b"top secret")], Some("pw"))?;
    {
        let archive = ZipArchive::open(Cursor::new(&mut data), OpenMode::Update)?;
        let mut writer = archive.create_entry("open.txt")?.open()?;
        writer.write_all(b"public")?;
        writer.finish()?;
        drop(writer);
        archive.close()?;
    }
    let (status, content) = read_entry(&data, "locked.txt", Some("pw"))?;
    assert_eq!(status, DecryptStatus::Success);
    assert_eq!(content, b"top secret");
    assert_eq!(read_entry(&data, "open.txt", None)?.1, b"public");
    Ok(())
}
