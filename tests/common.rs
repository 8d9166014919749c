//! Common utilities for tests
#![allow(unused)]

use std::sync::{Arc, Mutex};

use mcdos::{BlockDevice, Error, FileSystem, Result, Session, BLOCK_SIZE};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
        }
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        let start = block_id as usize * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        let start = block_id as usize * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // In a RAM disk, flushing is a no-op since data is already in memory.
        Ok(())
    }
}

/// A freshly formatted RAM image with users alice (superuser), bob and carol.
pub fn format(num_blocks: usize) -> FileSystem<RamDisk> {
    FileSystem::format(
        Arc::new(RamDisk::new(num_blocks)),
        &[("alice", "pw"), ("bob", "bpw"), ("carol", "cpw")],
    )
    .unwrap()
}

pub fn alice(fs: &FileSystem<RamDisk>) -> Session<RamDisk> {
    fs.login("alice", "pw").unwrap()
}

pub fn bob(fs: &FileSystem<RamDisk>) -> Session<RamDisk> {
    fs.login("bob", "bpw").unwrap()
}

pub fn carol(fs: &FileSystem<RamDisk>) -> Session<RamDisk> {
    fs.login("carol", "cpw").unwrap()
}

/// Asserts the image is consistent and the block counts add up.
pub fn assert_consistent(fs: &FileSystem<RamDisk>) {
    let report = fs.check().unwrap();
    assert!(report.is_consistent(), "problems: {:?}", report.problems);
    assert_eq!(report.free + report.owned + 1, report.block_count);
}

/// Bytes with a recognisable pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
