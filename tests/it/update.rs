use crate::{create_archive, entry_names, read_entry};
use std::cell::Cell;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;
use ziparc::{ErrorKind, OpenMode, Stream, ZipArchive};

/// In-memory stream whose writes fail once `budget` bytes have gone through.
struct FlakyStream {
    inner: Cursor<Vec<u8>>,
    budget: Rc<Cell<Option<usize>>>,
}

impl Read for FlakyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for FlakyStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(left) = self.budget.get() {
            if left < buf.len() {
                return Err(io::Error::other("no space left"));
            }
            self.budget.set(Some(left - buf.len()));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FlakyStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Stream for FlakyStream {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn can_resize(&self) -> bool {
        true
    }

    fn set_size(&mut self, size: u64) -> io::Result<()> {
        self.inner.set_size(size)
    }
}

#[test]
fn test_add_entry() -> anyhow::Result<()> {
    let original = create_archive(&[("1.txt", b"2333")], None)?;

    let archive = ZipArchive::open(Cursor::new(original.clone()), OpenMode::Update)?;
    assert_eq!(archive.len(), 1);
    let mut writer = archive.create_entry("test/2.txt")?.open()?;
    writer.write_all(b"1234")?;
    writer.finish()?;
    drop(writer);
    let updated = archive.into_inner()?.into_inner();

    assert_eq!(entry_names(&updated)?, vec!["1.txt".to_string(), "test/2.txt".to_string()]);
    assert_eq!(read_entry(&updated, "1.txt", None)?.1, b"2333");
    assert_eq!(read_entry(&updated, "test/2.txt", None)?.1, b"1234");
    Ok(())
}

#[test]
fn test_untouched_entries_copied_verbatim() -> anyhow::Result<()> {
    let payload = b"compressible compressible compressible compressible".repeat(50);
    let original = create_archive(&[("keep.txt", &payload), ("other.txt", b"x")], None)?;
    let before = ZipArchive::open(Cursor::new(original.clone()), OpenMode::Read)?;
    let keep = before.get_entry("keep.txt").unwrap();

    let archive = ZipArchive::open(Cursor::new(original.clone()), OpenMode::Update)?;
    archive.get_entry("other.txt").unwrap().delete()?;
    let updated = archive.into_inner()?.into_inner();

    let after = ZipArchive::open(Cursor::new(updated.clone()), OpenMode::Read)?;
    let kept = after.get_entry("keep.txt").unwrap();
    assert_eq!(kept.crc32(), keep.crc32());
    assert_eq!(kept.compressed_size(), keep.compressed_size());
    assert_eq!(kept.last_modified(), keep.last_modified());
    assert_eq!(read_entry(&updated, "keep.txt", None)?.1, payload);
    Ok(())
}

#[test]
fn test_replace_content() -> anyhow::Result<()> {
    let mut data = create_archive(&[("a.txt", b"old content"), ("b.txt", b"bee")], None)?;
    {
        let archive = ZipArchive::open(Cursor::new(&mut data), OpenMode::Update)?;
        let entry = archive.get_entry("a.txt").unwrap();
        let mut writer = entry.open()?;
        writer.write_all(b"new ")?;
        writer.write_all(b"content")?;
        writer.finish()?;
    }
    assert_eq!(read_entry(&data, "a.txt", None)?.1, b"new content");
    assert_eq!(read_entry(&data, "b.txt", None)?.1, b"bee");
    Ok(())
}

#[test]
fn test_single_writer_per_entry() -> anyhow::Result<()> {
    let data = create_archive(&[("a.txt", b"a")], None)?;
    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Update)?;
    let entry = archive.get_entry("a.txt").unwrap();

    let mut first = entry.open()?;
    let err = entry.open().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::IllegalState);

    // Closing with a stream still open is refused as well.
    assert_eq!(archive.close().unwrap_err().kind(), ErrorKind::IllegalState);

    first.write_all(b"rewritten")?;
    first.finish()?;
    // Released once the first stream is finished.
    entry.open()?.finish()?;
    archive.close()?;
    Ok(())
}

#[test]
fn test_delete() -> anyhow::Result<()> {
    let data = create_archive(&[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")], None)?;

    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Update)?;
    let b = archive.get_entry("b.txt").unwrap();
    let alias = b.clone();
    b.delete()?;
    assert!(archive.get_entry("b.txt").is_none());
    assert_eq!(archive.len(), 2);
    // Every handle to the deleted entry is dead.
    assert_eq!(alias.open().err().unwrap().kind(), ErrorKind::IllegalState);
    assert_eq!(alias.delete().unwrap_err().kind(), ErrorKind::IllegalState);
    let updated = archive.into_inner()?.into_inner();

    assert_eq!(entry_names(&updated)?, vec!["a.txt".to_string(), "c.txt".to_string()]);
    assert_eq!(read_entry(&updated, "c.txt", None)?.1, b"c");
    Ok(())
}

#[test]
fn test_delete_while_open() -> anyhow::Result<()> {
    let data = create_archive(&[("a.txt", b"a")], None)?;
    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Update)?;
    let entry = archive.get_entry("a.txt").unwrap();
    let mut writer = entry.open()?;
    assert_eq!(entry.delete().unwrap_err().kind(), ErrorKind::IllegalState);
    writer.finish()?;
    entry.delete()?;
    Ok(())
}

#[test]
fn test_delete_requires_update_mode() -> anyhow::Result<()> {
    let data = create_archive(&[("a.txt", b"a")], None)?;
    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    let err = archive.get_entry("a.txt").unwrap().delete().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);

    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
    let err = archive.create_entry("a.txt")?.delete().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    Ok(())
}

#[test]
fn test_update_empty_stream() -> anyhow::Result<()> {
    let archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Update)?;
    assert!(archive.is_empty());
    let mut writer = archive.create_entry("fresh.txt")?.open()?;
    writer.write_all(b"fresh")?;
    writer.finish()?;
    drop(writer);
    let data = archive.into_inner()?.into_inner();
    assert_eq!(read_entry(&data, "fresh.txt", None)?.1, b"fresh");
    Ok(())
}

#[test]
fn test_update_drops_stale_bytes() -> anyhow::Result<()> {
    let big = vec![0x5Au8; 64 * 1024];
    let mut data = create_archive(&[("big.bin", &big), ("small.txt", b"small")], None)?;
    let before = data.len();
    {
        let archive = ZipArchive::open(Cursor::new(&mut data), OpenMode::Update)?;
        archive.get_entry("big.bin").unwrap().delete()?;
    }
    assert!(data.len() < before);
    let archive = ZipArchive::open(Cursor::new(data), OpenMode::Read)?;
    assert_eq!(archive.len(), 1);
    let mut out = String::new();
    archive.get_entry("small.txt").unwrap().open()?.read_to_string(&mut out)?;
    assert_eq!(out, "small");
    Ok(())
}

#[test]
fn test_overlong_name_leaves_archive_intact() -> anyhow::Result<()> {
    let mut data = create_archive(&[("1.txt", b"2333")], None)?;
    let before = data.clone();
    {
        let archive = ZipArchive::open(Cursor::new(&mut data), OpenMode::Update)?;
        let err = archive.create_entry(&"a".repeat(70000)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(archive.len(), 1);
        archive.close()?;
    }
    assert_eq!(entry_names(&data)?, vec!["1.txt".to_string()]);
    assert_eq!(read_entry(&data, "1.txt", None)?.1, b"2333");
    assert_eq!(data.len(), before.len());
    Ok(())
}

#[test]
fn test_failed_close_can_be_retried() -> anyhow::Result<()> {
    let payload = b"keep me around ".repeat(20);
    let original = create_archive(&[("keep.txt", &payload), ("edit.txt", b"old")], None)?;
    let budget = Rc::new(Cell::new(Some(40)));
    let stream = FlakyStream {
        inner: Cursor::new(original),
        budget: Rc::clone(&budget),
    };

    let archive = ZipArchive::open(stream, OpenMode::Update)?;
    let mut writer = archive.get_entry("edit.txt").unwrap().open()?;
    writer.write_all(b"new")?;
    writer.finish()?;
    drop(writer);

    // The stream is already truncated when the write fails.
    assert_eq!(archive.close().unwrap_err().kind(), ErrorKind::Io);
    budget.set(None);
    archive.close()?;

    let updated = archive.into_inner()?.inner.into_inner();
    assert_eq!(entry_names(&updated)?, vec!["keep.txt".to_string(), "edit.txt".to_string()]);
    assert_eq!(read_entry(&updated, "keep.txt", None)?.1, payload);
    assert_eq!(read_entry(&updated, "edit.txt", None)?.1, b"new");
    Ok(())
}
