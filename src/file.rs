//! File content access over a file's allocation table.

use log::debug;

use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::directory::{check_new_entry, dir_lookup};
use crate::error::{FsError, Result};
use crate::freelist::{alloc_block, free_block};
use crate::node::{get_dir, get_file, now, put_dir, put_file, read_raw};
use crate::perm::{check_access, Access};
use crate::structs::*;

/// Creates an empty file `name` inside `parent`.
/// Returns the block of the new file.
pub fn fcreate(device: &impl BlockDevice, uid: u8, parent: u32, name: &str) -> Result<u32> {
    let mut parent_dir = get_dir(device, parent)?;
    check_access(&parent_dir.meta, uid, Access::Write)?;
    check_new_entry(&parent_dir, name)?;

    let block = alloc_block(device)?;
    let now = now();
    put_file(device, block, &FileBlock::new(Meta::new(uid, now)))?;
    link_entry(device, parent, &mut parent_dir, EntryType::File, block, name, now)?;

    debug!("[fcreate] {} -> block {} in {}", name, block, parent);
    Ok(block)
}

fn link_entry(
    device: &impl BlockDevice,
    parent: u32,
    parent_dir: &mut DirBlock,
    ty: EntryType,
    block: u32,
    name: &str,
    now: u32,
) -> Result<()> {
    parent_dir.entries.push(DirEntry::new(ty, block, name)?);
    parent_dir.meta.mtime = now;
    put_dir(device, parent, parent_dir)
}

/// Concatenates the table's blocks and cuts the result to the file size.
/// Unbacked slots read as zeros.
fn read_content(device: &impl BlockDevice, file: &FileBlock) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(file.fat.len() * BLOCK_SIZE);
    for &block in file.fat.iter() {
        if block == 0 {
            data.extend_from_slice(&[0u8; BLOCK_SIZE]);
        } else {
            data.extend_from_slice(&read_raw(device, block)?);
        }
    }
    data.truncate(file.size as usize);
    Ok(data)
}

/// Reads the whole content of the file at `block`.
pub fn fread(device: &impl BlockDevice, uid: u8, block: u32) -> Result<Vec<u8>> {
    let file = get_file(device, block)?;
    check_access(&file.meta, uid, Access::Read)?;
    read_content(device, &file)
}

/// Replaces the content of the file at `block` with `data`.
/// The table grows or shrinks to ceil(len / BLOCK_SIZE) blocks. On failure
/// the file and the free list are left as they were.
pub fn fwrite(device: &impl BlockDevice, uid: u8, block: u32, data: &[u8]) -> Result<()> {
    let mut file = get_file(device, block)?;
    check_access(&file.meta, uid, Access::Write)?;

    let required = data.len().div_ceil(BLOCK_SIZE);
    if required > FAT_SIZE {
        return Err(FsError::FileTooLarge);
    }

    let mut fat = file.fat.clone();
    let released: Vec<u32> = if fat.len() > required {
        fat.split_off(required).into_iter().filter(|&b| b != 0).collect()
    } else {
        Vec::new()
    };

    // Back every slot we need before touching any data block.
    let mut fresh = Vec::new();
    for slot in 0..required {
        if slot < fat.len() && fat[slot] != 0 {
            continue;
        }
        let new_block = match alloc_block(device) {
            Ok(b) => b,
            Err(e) => {
                // Push back in reverse so the free list ends up unchanged.
                for b in fresh.iter().rev() {
                    free_block(device, *b)?;
                }
                return Err(e);
            }
        };
        fresh.push(new_block);
        if slot < fat.len() {
            fat[slot] = new_block;
        } else {
            fat.push(new_block);
        }
    }

    for (chunk, &data_block) in data.chunks(BLOCK_SIZE).zip(fat.iter()) {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..chunk.len()].copy_from_slice(chunk);
        device.write_block(data_block, &buf)?;
    }

    file.fat = fat;
    file.size = data.len() as u32;
    file.meta.mtime = now();
    put_file(device, block, &file)?;

    for b in released.iter() {
        free_block(device, *b)?;
    }

    debug!(
        "[fwrite] block {}: {} bytes, {} new, {} released",
        block,
        data.len(),
        fresh.len(),
        released.len()
    );
    Ok(())
}

/// Removes file `name` from `parent`, releasing its data and its own block.
pub fn fdelete(device: &impl BlockDevice, uid: u8, parent: u32, name: &str) -> Result<()> {
    let mut parent_dir = get_dir(device, parent)?;
    check_access(&parent_dir.meta, uid, Access::Write)?;
    let (index, entry) = dir_lookup(&parent_dir, name)?;
    if entry.is_dir() {
        return Err(FsError::NotAFile);
    }
    let file = get_file(device, entry.block)?;

    parent_dir.entries.remove(index);
    parent_dir.meta.mtime = now();
    put_dir(device, parent, &parent_dir)?;

    for &b in file.fat.iter().filter(|&&b| b != 0) {
        free_block(device, b)?;
    }
    free_block(device, entry.block)?;

    debug!("[fdelete] {} (block {}, {} data blocks)", name, entry.block, file.fat.len());
    Ok(())
}

/// Copies the file at `src` into `dst_parent` as `name`.
/// The copy owns fresh blocks, nothing is shared with the source.
pub fn fcopy(
    device: &impl BlockDevice,
    uid: u8,
    src: u32,
    dst_parent: u32,
    name: &str,
) -> Result<u32> {
    let source = get_file(device, src)?;
    check_access(&source.meta, uid, Access::Read)?;
    let mut parent_dir = get_dir(device, dst_parent)?;
    check_access(&parent_dir.meta, uid, Access::Write)?;
    check_new_entry(&parent_dir, name)?;

    let data = read_content(device, &source)?;
    let needed = 1 + data.len().div_ceil(BLOCK_SIZE);
    let mut blocks = Vec::with_capacity(needed);
    for _ in 0..needed {
        match alloc_block(device) {
            Ok(b) => blocks.push(b),
            Err(e) => {
                for b in blocks.iter().rev() {
                    free_block(device, *b)?;
                }
                return Err(e);
            }
        }
    }

    let block = blocks[0];
    for (chunk, &data_block) in data.chunks(BLOCK_SIZE).zip(blocks[1..].iter()) {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..chunk.len()].copy_from_slice(chunk);
        device.write_block(data_block, &buf)?;
    }

    let now = now();
    let copy = FileBlock {
        meta: Meta::new(uid, now),
        size: source.size,
        fat: blocks[1..].to_vec(),
    };
    put_file(device, block, &copy)?;
    link_entry(device, dst_parent, &mut parent_dir, EntryType::File, block, name, now)?;

    debug!("[fcopy] block {} -> {} ({} bytes)", src, block, data.len());
    Ok(block)
}
