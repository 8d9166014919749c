//! On-disk block variants.
//! A block carries no type tag, whoever references it knows what it holds,
//! so every variant has its own encode/decode pair over the raw 512 bytes.

use std::borrow::Cow;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::perm::Perm;

fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(bytes)
}

fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let end = name.iter().position(|&c| c == 0).unwrap_or(name.len());
    &name[..end]
}

/// Validates an entry name and packs it into the NUL padded on-disk field.
pub fn encode_name(name: &str) -> Result<[u8; NAME_LEN_LIMIT]> {
    if name.is_empty() || name == DOT_NAME || name == DOTDOT_NAME {
        return Err(FsError::InvalidName);
    }
    if name.contains('/') || name.contains('\0') {
        return Err(FsError::InvalidName);
    }
    pack_str(name).ok_or(FsError::NameTooLong)
}

fn pack_str(s: &str) -> Option<[u8; NAME_LEN_LIMIT]> {
    if s.len() > MAX_NAME_LEN {
        return None;
    }
    let mut arr = [0u8; NAME_LEN_LIMIT];
    arr[..s.len()].copy_from_slice(s.as_bytes());
    Some(arr)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Super,
    Free,
    Directory,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    pub owner: u8,
    pub perm: Perm,
    pub ctime: u32,
    pub mtime: u32,
}

impl Meta {
    pub fn new(owner: u8, now: u32) -> Self {
        Self {
            owner,
            perm: Perm::DEFAULT,
            ctime: now,
            mtime: now,
        }
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            owner: buf[META_OWNER_OFF],
            perm: Perm::from_bits_truncate(buf[META_PERM_OFF]),
            ctime: get_u32(buf, META_CTIME_OFF),
            mtime: get_u32(buf, META_MTIME_OFF),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[META_OWNER_OFF] = self.owner;
        buf[META_PERM_OFF] = self.perm.bits();
        put_u32(buf, META_CTIME_OFF, self.ctime);
        put_u32(buf, META_MTIME_OFF, self.mtime);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInfo {
    pub username: [u8; NAME_LEN_LIMIT],
    pub password: [u8; NAME_LEN_LIMIT],
}

impl UserInfo {
    pub fn new(username: &str, password: &str) -> Result<Self> {
        if username.is_empty() || username.contains(char::is_whitespace) {
            return Err(FsError::InvalidUserTable);
        }
        Ok(Self {
            username: pack_str(username).ok_or(FsError::InvalidUserTable)?,
            password: pack_str(password).ok_or(FsError::InvalidUserTable)?,
        })
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(trim_zero(&self.username))
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        trim_zero(&self.username) == username.as_bytes()
            && trim_zero(&self.password) == password.as_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub block_count: u32, // Total number of blocks in the image
    pub free_head: u32,   // First block of the free list, 0 when empty
    pub root: u32,        // Root directory block
    pub users: Vec<UserInfo>,
}

impl SuperBlock {
    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        let user_count = buf[SUPER_UC_OFF] as usize;
        if user_count > USER_LIMIT {
            return Err(FsError::InvalidSuperBlock);
        }
        let users = (0..user_count)
            .map(|i| {
                let off = SUPER_USERS_OFF + i * USER_INFO_SIZE;
                let mut user = UserInfo {
                    username: [0; NAME_LEN_LIMIT],
                    password: [0; NAME_LEN_LIMIT],
                };
                user.username.copy_from_slice(&buf[off..off + NAME_LEN_LIMIT]);
                user.password
                    .copy_from_slice(&buf[off + NAME_LEN_LIMIT..off + USER_INFO_SIZE]);
                user
            })
            .collect();
        Ok(Self {
            block_count: get_u32(buf, SUPER_BC_OFF),
            free_head: get_u32(buf, SUPER_FREE_OFF),
            root: get_u32(buf, SUPER_ROOT_OFF),
            users,
        })
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        put_u32(&mut buf, SUPER_BC_OFF, self.block_count);
        put_u32(&mut buf, SUPER_FREE_OFF, self.free_head);
        put_u32(&mut buf, SUPER_ROOT_OFF, self.root);
        buf[SUPER_UC_OFF] = self.users.len() as u8;
        for (i, user) in self.users.iter().take(USER_LIMIT).enumerate() {
            let off = SUPER_USERS_OFF + i * USER_INFO_SIZE;
            buf[off..off + NAME_LEN_LIMIT].copy_from_slice(&user.username);
            buf[off + NAME_LEN_LIMIT..off + USER_INFO_SIZE].copy_from_slice(&user.password);
        }
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    pub next: u32,
}

impl FreeBlock {
    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Self {
        Self { next: get_u32(buf, FREE_NEXT_OFF) }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        put_u32(&mut buf, FREE_NEXT_OFF, self.next);
        buf
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File = 0,
    Directory = 1,
}

impl EntryType {
    pub fn block_kind(self) -> BlockKind {
        match self {
            EntryType::File => BlockKind::File,
            EntryType::Directory => BlockKind::Directory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub ty: EntryType,
    pub block: u32,
    pub name: [u8; NAME_LEN_LIMIT],
}

impl DirEntry {
    pub fn new(ty: EntryType, block: u32, name: &str) -> Result<Self> {
        Ok(Self {
            ty,
            block,
            name: encode_name(name)?,
        })
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(trim_zero(&self.name))
    }

    pub fn name_eq(&self, name: &str) -> bool {
        trim_zero(&self.name) == name.as_bytes()
    }

    pub fn is_dir(&self) -> bool {
        self.ty == EntryType::Directory
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirBlock {
    pub meta: Meta,
    pub parent: u32,
    pub entries: Vec<DirEntry>,
}

impl DirBlock {
    pub fn new(meta: Meta, parent: u32) -> Self {
        Self {
            meta,
            parent,
            entries: Vec::new(),
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name_eq(name))
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= DIRC_LIMIT
    }

    pub fn decode(block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        let count = buf[DIR_COUNT_OFF] as usize;
        if count > DIRC_LIMIT {
            return Err(FsError::CorruptBlock(block_id));
        }
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let off = DIR_ENTRIES_OFF + i * DIR_ENTRY_SIZE;
            let ty = match get_u32(buf, off) {
                0 => EntryType::File,
                1 => EntryType::Directory,
                _ => return Err(FsError::CorruptBlock(block_id)),
            };
            let mut name = [0u8; NAME_LEN_LIMIT];
            name.copy_from_slice(&buf[off + 8..off + 8 + NAME_LEN_LIMIT]);
            entries.push(DirEntry {
                ty,
                block: get_u32(buf, off + 4),
                name,
            });
        }
        Ok(Self {
            meta: Meta::decode(buf),
            parent: get_u32(buf, DIR_PARENT_OFF),
            entries,
        })
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        self.meta.encode(&mut buf);
        put_u32(&mut buf, DIR_PARENT_OFF, self.parent);
        buf[DIR_COUNT_OFF] = self.entries.len() as u8;
        for (i, entry) in self.entries.iter().take(DIRC_LIMIT).enumerate() {
            let off = DIR_ENTRIES_OFF + i * DIR_ENTRY_SIZE;
            put_u32(&mut buf, off, entry.ty as u32);
            put_u32(&mut buf, off + 4, entry.block);
            buf[off + 8..off + 8 + NAME_LEN_LIMIT].copy_from_slice(&entry.name);
        }
        buf
    }
}

/// A file's metadata block.
/// `fat` always holds `ceil(size / BLOCK_SIZE)` slots. A slot of 0 is unbacked
/// and reads as zeros; only the seed files written by format have those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlock {
    pub meta: Meta,
    pub size: u32,
    pub fat: Vec<u32>,
}

impl FileBlock {
    pub fn new(meta: Meta) -> Self {
        Self {
            meta,
            size: 0,
            fat: Vec::new(),
        }
    }

    /// A file of `size` bytes whose data blocks are all unbacked.
    pub fn placeholder(meta: Meta, size: u32) -> Self {
        Self {
            meta,
            size,
            fat: vec![0; (size as usize).div_ceil(BLOCK_SIZE)],
        }
    }

    pub fn decode(block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        let size = get_u32(buf, FILE_SIZE_OFF);
        let slots = (size as usize).div_ceil(BLOCK_SIZE);
        if slots > FAT_SIZE {
            return Err(FsError::CorruptBlock(block_id));
        }
        let fat = (0..slots)
            .map(|i| get_u32(buf, FILE_FAT_OFF + i * 4))
            .collect();
        Ok(Self {
            meta: Meta::decode(buf),
            size,
            fat,
        })
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        self.meta.encode(&mut buf);
        put_u32(&mut buf, FILE_SIZE_OFF, self.size);
        for (i, &block) in self.fat.iter().take(FAT_SIZE).enumerate() {
            put_u32(&mut buf, FILE_FAT_OFF + i * 4, block);
        }
        buf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Super(SuperBlock),
    Free(FreeBlock),
    Directory(DirBlock),
    File(FileBlock),
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Super(_) => BlockKind::Super,
            Block::Free(_) => BlockKind::Free,
            Block::Directory(_) => BlockKind::Directory,
            Block::File(_) => BlockKind::File,
        }
    }

    pub fn decode(kind: BlockKind, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        Ok(match kind {
            BlockKind::Super => Block::Super(SuperBlock::decode(buf)?),
            BlockKind::Free => Block::Free(FreeBlock::decode(buf)),
            BlockKind::Directory => Block::Directory(DirBlock::decode(block_id, buf)?),
            BlockKind::File => Block::File(FileBlock::decode(block_id, buf)?),
        })
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        match self {
            Block::Super(sb) => sb.encode(),
            Block::Free(free) => free.encode(),
            Block::Directory(dir) => dir.encode(),
            Block::File(file) => file.encode(),
        }
    }

    /// Meta of a directory or file block.
    pub fn meta(&self) -> Option<&Meta> {
        match self {
            Block::Directory(dir) => Some(&dir.meta),
            Block::File(file) => Some(&file.meta),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn meta() -> Meta {
        Meta {
            owner: 3,
            perm: Perm::OWNER_READ | Perm::OTHER_EXEC,
            ctime: 0x0102_0304,
            mtime: 0x0a0b_0c0d,
        }
    }

    #[test]
    fn test_meta_layout() {
        let dir = DirBlock::new(meta(), 7);
        let buf = dir.encode();
        assert_eq!(buf[0], 3);
        assert_eq!(buf[1], 0b100001);
        assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[8..12], &[0x0d, 0x0c, 0x0b, 0x0a]);
        assert_eq!(&buf[12..16], &[7, 0, 0, 0]);
    }

    #[test]
    fn test_dir_layout() {
        let mut dir = DirBlock::new(meta(), 1);
        dir.entries.push(DirEntry::new(EntryType::File, 9, "a.txt").unwrap());
        dir.entries.push(DirEntry::new(EntryType::Directory, 10, "sub").unwrap());
        let buf = dir.encode();
        assert_eq!(buf[DIR_COUNT_OFF], 2);
        // second entry starts at 20 + 24
        assert_eq!(&buf[44..48], &[1, 0, 0, 0]);
        assert_eq!(&buf[48..52], &[10, 0, 0, 0]);
        assert_eq!(&buf[52..56], b"sub\0");
        assert_eq!(DirBlock::decode(1, &buf).unwrap(), dir);
    }

    #[test]
    fn test_file_layout() {
        let mut file = FileBlock::new(meta());
        file.size = 1025;
        file.fat = vec![5, 6, 7];
        let buf = file.encode();
        assert_eq!(&buf[12..16], &1025u32.to_le_bytes());
        assert_eq!(&buf[16..20], &5u32.to_le_bytes());
        assert_eq!(&buf[24..28], &7u32.to_le_bytes());
        assert_eq!(FileBlock::decode(2, &buf).unwrap(), file);
        // the last table slot ends exactly at the block boundary
        assert_eq!(FILE_FAT_OFF + FAT_SIZE * 4, BLOCK_SIZE);
    }

    #[test]
    fn test_super_layout() {
        let sb = SuperBlock {
            block_count: 100,
            free_head: 5,
            root: 1,
            users: vec![UserInfo::new("alice", "pw").unwrap()],
        };
        let buf = sb.encode();
        assert_eq!(&buf[0..4], &100u32.to_le_bytes());
        assert_eq!(buf[12], 1);
        assert_eq!(&buf[13..18], b"alice");
        assert_eq!(&buf[29..31], b"pw");
        assert_eq!(SuperBlock::decode(&buf).unwrap(), sb);
        assert_eq!(SUPER_USERS_OFF + USER_LIMIT * USER_INFO_SIZE, 493);
    }

    #[test]
    fn test_corrupt_dir_count() {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[DIR_COUNT_OFF] = 17;
        assert_eq!(DirBlock::decode(4, &buf), Err(FsError::CorruptBlock(4)));
    }

    #[test]
    fn test_encode_name() {
        assert!(encode_name("fifteen_chars__").is_ok());
        assert_eq!(encode_name("sixteen_chars___"), Err(FsError::NameTooLong));
        assert_eq!(encode_name(""), Err(FsError::InvalidName));
        assert_eq!(encode_name(".."), Err(FsError::InvalidName));
        assert_eq!(encode_name("a/b"), Err(FsError::InvalidName));
    }

    #[test]
    fn test_placeholder() {
        let file = FileBlock::placeholder(meta(), 123);
        assert_eq!(file.fat, vec![0]);
        let file = FileBlock::placeholder(meta(), 0);
        assert!(file.fat.is_empty());
    }
}
