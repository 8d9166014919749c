use log::debug;

use crate::block_dev::BlockDevice;
use crate::error::{FsError, Result};
use crate::freelist::{alloc_block, free_block};
use crate::node::{get_dir, get_file, now, put_dir, stat};
use crate::path::is_ancestor;
use crate::perm::{check_access, Access};
use crate::structs::*;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub entry: DirEntry,
    pub meta: Meta,
    pub size: u32,
}

/// Checks that `name` can be added to `dir`.
/// Order: name length, duplicate, room. Allocation comes after.
pub(crate) fn check_new_entry(dir: &DirBlock, name: &str) -> Result<()> {
    encode_name(name)?;
    if dir.find(name).is_some() {
        return Err(FsError::DuplicateName);
    }
    if dir.is_full() {
        return Err(FsError::DirectoryFull);
    }
    Ok(())
}

/// Finds `name` in `dir`, returning its index and entry.
pub(crate) fn dir_lookup(dir: &DirBlock, name: &str) -> Result<(usize, DirEntry)> {
    let index = dir.find(name).ok_or(FsError::NotFound)?;
    Ok((index, dir.entries[index]))
}

pub fn read_dir(device: &impl BlockDevice, uid: u8, dir_block: u32) -> Result<Vec<Listing>> {
    let dir = get_dir(device, dir_block)?;
    check_access(&dir.meta, uid, Access::Read)?;

    dir.entries
        .iter()
        .map(|entry| {
            let (meta, size) = stat(device, entry)?;
            Ok(Listing { entry: *entry, meta, size })
        })
        .collect()
}

/// Creates an empty directory `name` inside `parent`.
/// Returns the block of the new directory.
pub fn mkdir(device: &impl BlockDevice, uid: u8, parent: u32, name: &str) -> Result<u32> {
    let mut parent_dir = get_dir(device, parent)?;
    check_access(&parent_dir.meta, uid, Access::Write)?;
    check_new_entry(&parent_dir, name)?;
    let entry_name = encode_name(name)?;

    let block = alloc_block(device)?;
    let now = now();
    put_dir(device, block, &DirBlock::new(Meta::new(uid, now), parent))?;

    parent_dir.entries.push(DirEntry {
        ty: EntryType::Directory,
        block,
        name: entry_name,
    });
    parent_dir.meta.mtime = now;
    put_dir(device, parent, &parent_dir)?;

    debug!("[mkdir] {} -> block {} in {}", name, block, parent);
    Ok(block)
}

/// Removes directory `name` from `parent`.
/// Without `recursive` the directory must be empty. With it, every
/// descendant is released first, walking the tree with an explicit stack.
pub fn rmdir(
    device: &impl BlockDevice,
    uid: u8,
    parent: u32,
    name: &str,
    recursive: bool,
) -> Result<()> {
    let mut parent_dir = get_dir(device, parent)?;
    check_access(&parent_dir.meta, uid, Access::Write)?;
    let (index, entry) = dir_lookup(&parent_dir, name)?;
    if !entry.is_dir() {
        return Err(FsError::NotADirectory);
    }

    let target = get_dir(device, entry.block)?;
    if !recursive && !target.entries.is_empty() {
        return Err(FsError::DirectoryNotEmpty);
    }

    // Collect everything first so permission failures leave the tree alone.
    let doomed = collect_tree(device, uid, entry.block)?;

    parent_dir.entries.remove(index);
    parent_dir.meta.mtime = now();
    put_dir(device, parent, &parent_dir)?;

    // Children were pushed after their parents, release in reverse.
    for block in doomed.iter().rev() {
        free_block(device, *block)?;
    }

    debug!("[rmdir] {} ({} blocks released)", name, doomed.len());
    Ok(())
}

/// Every block owned by the directory at `root_block`, itself included,
/// parents before children. Each non-empty directory needs write access.
fn collect_tree(device: &impl BlockDevice, uid: u8, root_block: u32) -> Result<Vec<u32>> {
    let mut blocks = Vec::new();
    let mut stack = vec![root_block];

    while let Some(dir_block) = stack.pop() {
        // Bounded by the image, a loop in the tree would grow this forever.
        if blocks.len() >= device.num_blocks() {
            return Err(FsError::CorruptBlock(dir_block));
        }
        blocks.push(dir_block);
        let dir = get_dir(device, dir_block)?;
        if !dir.entries.is_empty() {
            check_access(&dir.meta, uid, Access::Write)?;
        }
        for entry in dir.entries.iter() {
            match entry.ty {
                EntryType::Directory => stack.push(entry.block),
                EntryType::File => {
                    let file = get_file(device, entry.block)?;
                    blocks.push(entry.block);
                    blocks.extend(file.fat.iter().copied().filter(|&b| b != 0));
                }
            }
        }
    }

    Ok(blocks)
}

/// Renames an entry in place.
pub fn rename(
    device: &impl BlockDevice,
    uid: u8,
    parent: u32,
    name: &str,
    new_name: &str,
) -> Result<()> {
    let mut parent_dir = get_dir(device, parent)?;
    check_access(&parent_dir.meta, uid, Access::Write)?;
    let (index, _) = dir_lookup(&parent_dir, name)?;
    if name == new_name {
        return Ok(());
    }
    let encoded = encode_name(new_name)?;
    if parent_dir.find(new_name).is_some() {
        return Err(FsError::DuplicateName);
    }

    parent_dir.entries[index].name = encoded;
    parent_dir.meta.mtime = now();
    put_dir(device, parent, &parent_dir)?;
    debug!("[rename] {} -> {} in {}", name, new_name, parent);
    Ok(())
}

/// Moves entry `name` of `src_parent` into `dst_parent` as `new_name`.
/// A moved directory gets its parent pointer updated.
pub fn move_entry(
    device: &impl BlockDevice,
    uid: u8,
    root: u32,
    src_parent: u32,
    name: &str,
    dst_parent: u32,
    new_name: &str,
) -> Result<()> {
    if src_parent == dst_parent {
        return rename(device, uid, src_parent, name, new_name);
    }

    let mut src_dir = get_dir(device, src_parent)?;
    let mut dst_dir = get_dir(device, dst_parent)?;
    check_access(&src_dir.meta, uid, Access::Write)?;
    check_access(&dst_dir.meta, uid, Access::Write)?;
    let (index, entry) = dir_lookup(&src_dir, name)?;
    check_new_entry(&dst_dir, new_name)?;
    if entry.is_dir() && is_ancestor(device, root, entry.block, dst_parent)? {
        return Err(FsError::InvalidMove);
    }

    let now = now();
    let mut moved = entry;
    moved.name = encode_name(new_name)?;
    dst_dir.entries.push(moved);
    dst_dir.meta.mtime = now;
    put_dir(device, dst_parent, &dst_dir)?;

    src_dir.entries.remove(index);
    src_dir.meta.mtime = now;
    put_dir(device, src_parent, &src_dir)?;

    if entry.is_dir() {
        let mut child = get_dir(device, entry.block)?;
        child.parent = dst_parent;
        child.meta.mtime = now;
        put_dir(device, entry.block, &child)?;
    }

    debug!("[move] {} ({}) -> {}/{}", name, src_parent, dst_parent, new_name);
    Ok(())
}
