mod common;

use std::io::{Cursor, ErrorKind};
use std::path::PathBuf;
use std::sync::Arc;

use mcdos::shell::create_image;
use mcdos::*;

/// A scratch image path, removed again when dropped.
struct TempImage(PathBuf);

impl TempImage {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("mcdos-{}-{}.img", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        TempImage(path)
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn test_create_rounds_up() {
    let image = TempImage::new("round");
    let disk = FileDisk::create(&image.0, 10 * BLOCK_SIZE as u64 + 1).unwrap();
    assert_eq!(disk.num_blocks(), 11);
    assert_eq!(
        std::fs::metadata(&image.0).unwrap().len(),
        11 * BLOCK_SIZE as u64
    );
    let mut buf = [0xaa; BLOCK_SIZE];
    assert_eq!(disk.read_block(11, &mut buf), Err(Error::InvalidBlockId(11)));
    assert_eq!(disk.write_block(11, &buf), Err(Error::InvalidBlockId(11)));
}

#[test]
fn test_open_missing() {
    let image = TempImage::new("missing");
    match FileDisk::open(&image.0) {
        Err(Error::Io { op, kind, .. }) => {
            assert_eq!(op, "open");
            assert_eq!(kind, ErrorKind::NotFound);
        }
        other => panic!("unexpected: {:?}", other.map(|d| d.num_blocks())),
    }
}

#[test]
fn test_image_persists() {
    let image = TempImage::new("persist");
    {
        let disk = Arc::new(FileDisk::create(&image.0, 64 * BLOCK_SIZE as u64).unwrap());
        let fs = FileSystem::format(disk, &[("alice", "pw"), ("bob", "bpw")]).unwrap();
        let session = fs.login("alice", "pw").unwrap();
        session.mkdir("/docs").unwrap();
        session.write("/docs/notes", &common::pattern(1300)).unwrap();
        session.chown("/docs/notes", "bob").unwrap();
        fs.device().flush().unwrap();
    }

    let disk = Arc::new(FileDisk::open(&image.0).unwrap());
    assert_eq!(disk.num_blocks(), 64);
    let fs = FileSystem::mount(disk).unwrap();
    let session = fs.login("bob", "bpw").unwrap();
    assert_eq!(session.cat("/docs/notes").unwrap(), common::pattern(1300));
    assert_eq!(session.ls("/docs").unwrap()[0].meta.owner, 1);
    assert!(fs.check().unwrap().is_consistent());
}

#[test]
fn test_mount_rejects_garbage() {
    let image = TempImage::new("garbage");
    let disk = Arc::new(FileDisk::create(&image.0, 16 * BLOCK_SIZE as u64).unwrap());
    assert_eq!(FileSystem::mount(disk).err(), Some(Error::InvalidSuperBlock));
}

#[test]
fn test_create_image_prompts() {
    let image = TempImage::new("prompts");
    let mut input = Cursor::new("abc\n4096\n2\nalice\npw\nbob\nbpw\n");
    let mut out = Vec::new();
    let fs = create_image(&image.0, &mut input, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    log!("{}", text);
    assert!(text.contains("Please enter a number."));
    assert!(text.contains("Creating disk on: "));
    assert!(text.ends_with("Done!\n"));

    let info = fs.diskinfo().unwrap();
    assert_eq!(info.total, 8);
    assert_eq!(info.free, 3);
    assert_eq!(fs.login("bob", "bpw").unwrap().uid(), 1);
}

#[test]
fn test_create_image_too_small() {
    let image = TempImage::new("small");
    let mut input = Cursor::new("1024\n1\nalice\npw\n");
    let mut out = Vec::new();
    assert_eq!(
        create_image(&image.0, &mut input, &mut out).err(),
        Some(Error::InvalidDiskSize)
    );
}

#[test]
fn test_create_image_eof() {
    let image = TempImage::new("eof");
    let mut input = Cursor::new("4096\n");
    let mut out = Vec::new();
    assert_eq!(
        create_image(&image.0, &mut input, &mut out).err(),
        Some(Error::Terminal(ErrorKind::UnexpectedEof))
    );
}
