//! Free block management.
//! Unused blocks form a singly linked list threaded through their own first
//! four bytes. The superblock holds the head; 0 terminates the list.
//! Allocation pops the head and release pushes onto it, so order is LIFO.

use log::trace;

use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::node::{get_free, put_free};
use crate::structs::FreeBlock;
use crate::superblock::{read_superblock, write_superblock};

/// Takes a block off the free list and zero-fills it.
pub fn alloc_block(device: &impl BlockDevice) -> Result<u32> {
    let mut superblock = read_superblock(device)?;
    let block_id = superblock.free_head;
    if block_id == FREE_LIST_END {
        return Err(FsError::DiskFull);
    }
    if block_id >= superblock.block_count {
        return Err(FsError::CorruptBlock(block_id));
    }

    let free = get_free(device, block_id)?;
    if free.next >= superblock.block_count {
        return Err(FsError::CorruptBlock(block_id));
    }
    superblock.free_head = free.next;
    write_superblock(device, &superblock)?;

    device.write_block(block_id, &[0u8; BLOCK_SIZE])?;
    trace!("[alloc_block] {} (next head {})", block_id, superblock.free_head);
    Ok(block_id)
}

/// Pushes a block back onto the free list.
/// Releasing a block twice is not detected.
pub fn free_block(device: &impl BlockDevice, block_id: u32) -> Result<()> {
    let mut superblock = read_superblock(device)?;
    if block_id == SUPERBLOCK_ID || block_id >= superblock.block_count {
        return Err(FsError::InvalidBlockId(block_id));
    }

    put_free(device, block_id, &FreeBlock { next: superblock.free_head })?;
    superblock.free_head = block_id;
    write_superblock(device, &superblock)?;
    trace!("[free_block] {}", block_id);
    Ok(())
}

/// Walks the free list and returns its blocks in list order.
pub fn free_list(device: &impl BlockDevice) -> Result<Vec<u32>> {
    let superblock = read_superblock(device)?;
    let mut blocks = Vec::new();
    let mut cur = superblock.free_head;
    while cur != FREE_LIST_END {
        // A list longer than the image can only be a cycle.
        if cur >= superblock.block_count || blocks.len() >= superblock.block_count as usize {
            return Err(FsError::CorruptBlock(cur));
        }
        blocks.push(cur);
        cur = get_free(device, cur)?.next;
    }
    Ok(blocks)
}

pub fn free_count(device: &impl BlockDevice) -> Result<u32> {
    Ok(free_list(device)?.len() as u32)
}
