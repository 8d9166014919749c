use std::sync::Arc;

use log::{debug, info, warn};

use crate::block_dev::BlockDevice;
use crate::check::{check, CheckReport};
use crate::config::*;
use crate::directory::{self, Listing};
use crate::error::{FsError, Result};
use crate::file::{fcopy, fcreate, fdelete, fread, fwrite};
use crate::freelist::free_count;
use crate::node::get_dir;
use crate::path::{is_ancestor, path_of, resolve, split, Location};
use crate::perm::{self, check_access, Access, Perm};
use crate::structs::{EntryType, SuperBlock};
use crate::superblock::{format_fs, read_superblock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInfo {
    pub total: u32,
    pub free: u32,
    pub used: u32,
}

#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    root: u32,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Formats the whole device. The first user becomes the superuser.
    pub fn format(device: Arc<D>, users: &[(&str, &str)]) -> Result<Self> {
        let superblock = format_fs(&*device, users)?;
        Ok(Self {
            device,
            root: superblock.root,
        })
    }

    pub fn mount(device: Arc<D>) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        debug!(
            "[mount] {} blocks, root {}, free head {}",
            superblock.block_count, superblock.root, superblock.free_head
        );
        Ok(Self {
            device,
            root: superblock.root,
        })
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session<D>> {
        let superblock = read_superblock(&*self.device)?;
        let uid = superblock.authenticate(username, password)?;
        info!("[login] {} (uid {})", username, uid);
        Ok(Session {
            device: Arc::clone(&self.device),
            root: self.root,
            uid,
            username: username.to_string(),
            cwd: self.root,
            cwd_path: "/".to_string(),
        })
    }

    pub fn diskinfo(&self) -> Result<DiskInfo> {
        diskinfo(&*self.device)
    }

    pub fn check(&self) -> Result<CheckReport> {
        check(&*self.device)
    }

    pub fn superblock(&self) -> Result<SuperBlock> {
        read_superblock(&*self.device)
    }

    pub fn root(&self) -> u32 {
        self.root
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}

fn diskinfo(device: &impl BlockDevice) -> Result<DiskInfo> {
    let total = read_superblock(device)?.block_count;
    let free = free_count(device)?;
    Ok(DiskInfo {
        total,
        free,
        used: total - free,
    })
}

/// A logged-in user working on an image.
/// Holds no filesystem state besides where it stands, so any number of
/// sessions can share one device.
#[derive(Debug)]
pub struct Session<D: BlockDevice> {
    device: Arc<D>,
    root: u32,
    uid: u8,
    username: String,
    cwd: u32,
    cwd_path: String,
}

impl<D: BlockDevice> Session<D> {
    pub fn uid(&self) -> u8 {
        self.uid
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn cwd(&self) -> u32 {
        self.cwd
    }

    pub fn pwd(&self) -> &str {
        &self.cwd_path
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    /// Resolves `path`. Relative paths fail with `NotFound` once another
    /// session has removed or moved the cwd.
    pub fn resolve(&self, path: &str) -> Result<Location> {
        if !path.starts_with('/') && !self.cwd_is_current()? {
            warn!("[session] {} lost its cwd {}", self.username, self.cwd_path);
            return Err(FsError::NotFound);
        }
        resolve(&*self.device, self.uid, self.root, self.cwd, path)
    }

    /// Whether `cwd_path` still leads to `cwd`. Walked without permission
    /// checks.
    fn cwd_is_current(&self) -> Result<bool> {
        match resolve(&*self.device, SUPERUSER_ID, self.root, self.root, &self.cwd_path) {
            Ok(loc) => Ok(loc.is_dir() && loc.block == self.cwd),
            Err(FsError::NotFound | FsError::NotADirectory) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Resolves the directory that will hold the final name of `path`.
    /// The directory is passed through, so it needs execute unless it is
    /// the start directory itself.
    fn resolve_parent(&self, path: &str) -> Result<(u32, String)> {
        let (parent_path, name) = split(path);
        let parent = self.resolve(&parent_path)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if parent_path.split('/').any(|c| !c.is_empty() && c != DOT_NAME) {
            self.check_enter(parent.block)?;
        }
        Ok((parent.block, name))
    }

    fn check_enter(&self, dir_block: u32) -> Result<()> {
        let dir = get_dir(&*self.device, dir_block)?;
        check_access(&dir.meta, self.uid, Access::Execute)
    }

    /// Where `src` should land for cp/mv: inside `dst` when it is an
    /// existing directory, otherwise at `dst` itself.
    fn resolve_destination(&self, dst: &str, src_name: &str) -> Result<(u32, String)> {
        match self.resolve(dst) {
            Ok(loc) if loc.is_dir() => {
                self.check_enter(loc.block)?;
                Ok((loc.block, src_name.to_string()))
            }
            Ok(_) => Err(FsError::DuplicateName),
            Err(FsError::NotFound) => self.resolve_parent(dst),
            Err(e) => Err(e),
        }
    }

    pub fn cd(&mut self, path: &str) -> Result<()> {
        let target = if path.is_empty() { "/" } else { path };
        let loc = self.resolve(target)?;
        if !loc.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.check_enter(loc.block)?;
        self.cwd_path = path_of(&*self.device, self.root, loc.block)?;
        self.cwd = loc.block;
        Ok(())
    }

    pub fn ls(&self, path: &str) -> Result<Vec<Listing>> {
        let loc = self.resolve(if path.is_empty() { "." } else { path })?;
        if !loc.is_dir() {
            return Err(FsError::NotADirectory);
        }
        directory::read_dir(&*self.device, self.uid, loc.block)
    }

    pub fn diskinfo(&self) -> Result<DiskInfo> {
        diskinfo(&*self.device)
    }

    pub fn superblock(&self) -> Result<SuperBlock> {
        read_superblock(&*self.device)
    }

    pub fn mkdir(&self, path: &str) -> Result<u32> {
        let (parent, name) = self.resolve_parent(path)?;
        directory::mkdir(&*self.device, self.uid, parent, &name)
    }

    pub fn touch(&self, path: &str) -> Result<u32> {
        let (parent, name) = self.resolve_parent(path)?;
        fcreate(&*self.device, self.uid, parent, &name)
    }

    pub fn cat(&self, path: &str) -> Result<Vec<u8>> {
        let loc = self.resolve(path)?;
        if loc.is_dir() {
            return Err(FsError::NotAFile);
        }
        fread(&*self.device, self.uid, loc.block)
    }

    /// Replaces the content of `path`, creating the file when missing.
    /// A file created here is removed again if the write fails.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        match self.resolve(path) {
            Ok(loc) if loc.is_dir() => return Err(FsError::NotAFile),
            Ok(loc) => return fwrite(&*self.device, self.uid, loc.block, data),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        if data.len().div_ceil(BLOCK_SIZE) > FAT_SIZE {
            return Err(FsError::FileTooLarge);
        }
        let (parent, name) = self.resolve_parent(path)?;
        let block = fcreate(&*self.device, self.uid, parent, &name)?;
        if let Err(e) = fwrite(&*self.device, self.uid, block, data) {
            fdelete(&*self.device, self.uid, parent, &name)?;
            return Err(e);
        }
        Ok(())
    }

    pub fn rm(&self, path: &str) -> Result<()> {
        let link = self.resolve(path)?.link()?;
        fdelete(&*self.device, self.uid, link.parent, &link.entry.name())
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        self.remove_dir(path, false)
    }

    /// Removes a directory together with everything below it.
    pub fn rmdir_all(&self, path: &str) -> Result<()> {
        self.remove_dir(path, true)
    }

    fn remove_dir(&self, path: &str, recursive: bool) -> Result<()> {
        let loc = self.resolve(path)?;
        let link = loc.link()?;
        // A cwd removed elsewhere cannot be busy and its parent chain is gone.
        if loc.is_dir()
            && self.cwd_is_current()?
            && is_ancestor(&*self.device, self.root, loc.block, self.cwd)?
        {
            return Err(FsError::Busy);
        }
        directory::rmdir(&*self.device, self.uid, link.parent, &link.entry.name(), recursive)
    }

    pub fn cp(&self, src: &str, dst: &str) -> Result<u32> {
        let source = self.resolve(src)?;
        if source.is_dir() {
            return Err(FsError::NotAFile);
        }
        let (_, src_name) = split(src);
        let (parent, name) = self.resolve_destination(dst, &src_name)?;
        fcopy(&*self.device, self.uid, source.block, parent, &name)
    }

    pub fn mv(&mut self, src: &str, dst: &str) -> Result<()> {
        let link = self.resolve(src)?.link()?;
        let cwd_current = self.cwd_is_current()?;
        let src_name = link.entry.name().into_owned();
        let (parent, name) = self.resolve_destination(dst, &src_name)?;
        directory::move_entry(
            &*self.device,
            self.uid,
            self.root,
            link.parent,
            &src_name,
            parent,
            &name,
        )?;
        // The cwd may sit below what just moved.
        if cwd_current {
            self.cwd_path = path_of(&*self.device, self.root, self.cwd)?;
        }
        Ok(())
    }

    pub fn chmod(&self, path: &str, perm: Perm) -> Result<()> {
        let loc = self.resolve(path)?;
        perm::chmod(&*self.device, self.uid, loc.block, loc.ty, perm)
    }

    pub fn chown(&self, path: &str, username: &str) -> Result<()> {
        let new_owner = read_superblock(&*self.device)?
            .user_id(username)
            .ok_or(FsError::UnknownUser)?;
        let loc = self.resolve(path)?;
        perm::chown(&*self.device, self.uid, loc.block, loc.ty, new_owner)
    }

    /// Type of whatever `path` points at.
    pub fn kind(&self, path: &str) -> Result<EntryType> {
        Ok(self.resolve(path)?.ty)
    }

    pub fn is_superuser(&self) -> bool {
        self.uid == SUPERUSER_ID
    }
}
