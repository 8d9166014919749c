use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads a block of data from the block device.
    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Writes a block of data to the block device.
    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Flushes any buffered data to the backing storage.
    fn flush(&self) -> Result<()>;

    /// Returns the size of each block in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }
}

/// Number of blocks needed to hold `bytes`, rounding a partial block up.
pub fn blocks_for_size(bytes: u64) -> u64 {
    bytes.div_ceil(BLOCK_SIZE as u64)
}

/// A disk image stored in a regular file.
/// Every read and write goes straight to the file, nothing is cached.
#[derive(Debug)]
pub struct FileDisk {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl FileDisk {
    /// Opens an existing image. Its length decides the block count.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| io_error("open", 0, e))?;
        let len = file.metadata().map_err(|e| io_error("stat", 0, e))?.len();
        Ok(FileDisk {
            inner: Mutex::new(file),
            num_blocks: (len / BLOCK_SIZE as u64) as usize,
        })
    }

    /// Creates (or truncates) an image able to hold `size_bytes`.
    pub fn create(path: impl AsRef<Path>, size_bytes: u64) -> Result<Self> {
        let num_blocks = blocks_for_size(size_bytes);
        if num_blocks > u32::MAX as u64 {
            return Err(FsError::InvalidDiskSize);
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| io_error("create", 0, e))?;
        file.set_len(num_blocks * BLOCK_SIZE as u64)
            .map_err(|e| io_error("resize", 0, e))?;
        Ok(FileDisk {
            inner: Mutex::new(file),
            num_blocks: num_blocks as usize,
        })
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        // A poisoned lock still guards a valid file handle.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn seek_to(file: &mut File, block_id: u32) -> Result<()> {
        let start = block_id as u64 * BLOCK_SIZE as u64;
        file.seek(SeekFrom::Start(start))
            .map_err(|e| io_error("seek", block_id, e))?;
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }
        let mut file = self.lock();
        Self::seek_to(&mut file, block_id)?;
        file.read_exact(buf)
            .map_err(|e| io_error("read", block_id, e))
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }
        let mut file = self.lock();
        Self::seek_to(&mut file, block_id)?;
        file.write_all(buf)
            .map_err(|e| io_error("write", block_id, e))
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.lock();
        file.flush().map_err(|e| io_error("flush", 0, e))?;
        file.sync_data().map_err(|e| io_error("sync", 0, e))
    }
}

fn io_error(op: &'static str, block: u32, err: std::io::Error) -> FsError {
    FsError::Io {
        op,
        block,
        kind: err.kind(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blocks_for_size() {
        assert_eq!(blocks_for_size(0), 0);
        assert_eq!(blocks_for_size(1), 1);
        assert_eq!(blocks_for_size(512), 1);
        assert_eq!(blocks_for_size(513), 2);
        assert_eq!(blocks_for_size(10 * 512), 10);
    }
}
