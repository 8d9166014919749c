//! Path resolution and manipulation utilities.

use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::node::get_dir;
use crate::perm::{check_access, Access};
use crate::structs::{DirEntry, EntryType};

/// Where a path led.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub block: u32,
    pub ty: EntryType,
    /// Containing directory and entry index, when the path ended in a name.
    /// `None` for the root, or for paths ending in `.` or `..`.
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub parent: u32,
    pub index: usize,
    pub entry: DirEntry,
}

impl Location {
    fn dir(block: u32) -> Self {
        Self {
            block,
            ty: EntryType::Directory,
            link: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.ty == EntryType::Directory
    }

    /// The containing directory and entry, for operations that must edit it.
    pub fn link(&self) -> Result<Link> {
        self.link.ok_or(FsError::InvalidPath)
    }
}

/// Resolves `path` starting from `root` when absolute, from `cwd` otherwise.
/// Each directory passed through (not the start, not the target) needs the
/// execute bit for `uid`.
pub fn resolve(
    device: &impl BlockDevice,
    uid: u8,
    root: u32,
    cwd: u32,
    path: &str,
) -> Result<Location> {
    let mut loc = Location::dir(if path.starts_with('/') { root } else { cwd });

    let components: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for (i, component) in components.iter().enumerate() {
        if !loc.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let dir = get_dir(device, loc.block)?;
        if i > 0 {
            check_access(&dir.meta, uid, Access::Execute)?;
        }

        loc = match *component {
            DOT_NAME => Location::dir(loc.block),
            DOTDOT_NAME => {
                if loc.block == root || dir.parent == ROOT_PARENT {
                    Location::dir(root)
                } else {
                    Location::dir(dir.parent)
                }
            }
            name => {
                let index = dir.find(name).ok_or(FsError::NotFound)?;
                let entry = dir.entries[index];
                Location {
                    block: entry.block,
                    ty: entry.ty,
                    link: Some(Link {
                        parent: loc.block,
                        index,
                        entry,
                    }),
                }
            }
        };
    }

    Ok(loc)
}

/// Splits a path into the parent path and the final name.
/// e.g. "/a/b/c" -> ("/a/b", "c"), "c" -> (".", "c"), "/c" -> ("/", "c").
pub fn split(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(pos) => (trimmed[..pos].to_string(), trimmed[pos + 1..].to_string()),
        None => (DOT_NAME.to_string(), trimmed.to_string()),
    }
}

/// Parent of a directory block, or `None` for the root.
pub fn parent_of(device: &impl BlockDevice, root: u32, block: u32) -> Result<Option<u32>> {
    if block == root {
        return Ok(None);
    }
    let dir = get_dir(device, block)?;
    if dir.parent == ROOT_PARENT {
        return Ok(Some(root));
    }
    Ok(Some(dir.parent))
}

/// Whether `ancestor` is `block` or lies on its way up to the root.
pub fn is_ancestor(device: &impl BlockDevice, root: u32, ancestor: u32, block: u32) -> Result<bool> {
    let mut cur = block;
    // Depth is bounded by the block count, guard against corrupt parent loops.
    for _ in 0..device.num_blocks() {
        if cur == ancestor {
            return Ok(true);
        }
        match parent_of(device, root, cur)? {
            Some(parent) => cur = parent,
            None => return Ok(false),
        }
    }
    Err(FsError::CorruptBlock(block))
}

/// Rebuilds the absolute path of a directory from parent pointers.
pub fn path_of(device: &impl BlockDevice, root: u32, block: u32) -> Result<String> {
    let mut names = Vec::new();
    let mut cur = block;
    for _ in 0..device.num_blocks() {
        let Some(parent) = parent_of(device, root, cur)? else {
            names.reverse();
            return Ok(format!("/{}", names.join("/")));
        };
        let dir = get_dir(device, parent)?;
        let entry = dir
            .entries
            .iter()
            .find(|e| e.is_dir() && e.block == cur)
            .ok_or(FsError::CorruptBlock(cur))?;
        names.push(entry.name().into_owned());
        cur = parent;
    }
    Err(FsError::CorruptBlock(block))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(split("/a/b/c"), ("/a/b".to_string(), "c".to_string()));
        assert_eq!(split("/c"), ("/".to_string(), "c".to_string()));
        assert_eq!(split("c"), (".".to_string(), "c".to_string()));
        assert_eq!(split("a/c/"), ("a".to_string(), "c".to_string()));
    }
}
