//! Typed get/put of blocks over a block device.
//! Nothing is cached: a block written through one handle must be read again
//! by anyone who wants to observe the change.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::block_dev::BlockDevice;
use crate::config::BLOCK_SIZE;
use crate::error::Result;
use crate::structs::*;

/// Current time as u32 epoch seconds.
pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

pub fn read_raw(device: &impl BlockDevice, block_id: u32) -> Result<[u8; BLOCK_SIZE]> {
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    Ok(buf)
}

pub fn get_block(device: &impl BlockDevice, block_id: u32, kind: BlockKind) -> Result<Block> {
    Block::decode(kind, block_id, &read_raw(device, block_id)?)
}

pub fn put_block(device: &impl BlockDevice, block_id: u32, block: &Block) -> Result<()> {
    device.write_block(block_id, &block.encode())
}

pub fn get_dir(device: &impl BlockDevice, block_id: u32) -> Result<DirBlock> {
    DirBlock::decode(block_id, &read_raw(device, block_id)?)
}

pub fn put_dir(device: &impl BlockDevice, block_id: u32, dir: &DirBlock) -> Result<()> {
    device.write_block(block_id, &dir.encode())
}

pub fn get_file(device: &impl BlockDevice, block_id: u32) -> Result<FileBlock> {
    FileBlock::decode(block_id, &read_raw(device, block_id)?)
}

pub fn put_file(device: &impl BlockDevice, block_id: u32, file: &FileBlock) -> Result<()> {
    device.write_block(block_id, &file.encode())
}

pub fn get_free(device: &impl BlockDevice, block_id: u32) -> Result<FreeBlock> {
    Ok(FreeBlock::decode(&read_raw(device, block_id)?))
}

pub fn put_free(device: &impl BlockDevice, block_id: u32, free: &FreeBlock) -> Result<()> {
    device.write_block(block_id, &free.encode())
}

/// Meta and reported size of the block an entry points at.
/// Directories report one block since descendant sizes are not tracked.
pub fn stat(device: &impl BlockDevice, entry: &DirEntry) -> Result<(Meta, u32)> {
    match entry.ty {
        EntryType::Directory => Ok((get_dir(device, entry.block)?.meta, BLOCK_SIZE as u32)),
        EntryType::File => {
            let file = get_file(device, entry.block)?;
            Ok((file.meta, file.size))
        }
    }
}
