use log::{debug, info};

use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::node::{get_block, now, put_block};
use crate::structs::*;

pub fn read_superblock(device: &impl BlockDevice) -> Result<SuperBlock> {
    let superblock = match get_block(device, SUPERBLOCK_ID, BlockKind::Super)? {
        Block::Super(sb) => sb,
        _ => return Err(FsError::InvalidSuperBlock),
    };

    // A garbage block 0 fails one of these.
    if superblock.block_count < MIN_BLOCKS
        || superblock.block_count as usize > device.num_blocks()
    {
        return Err(FsError::InvalidSuperBlock);
    }
    if superblock.root == SUPERBLOCK_ID || superblock.root >= superblock.block_count {
        return Err(FsError::InvalidSuperBlock);
    }
    if superblock.free_head >= superblock.block_count {
        return Err(FsError::InvalidSuperBlock);
    }
    if superblock.users.is_empty() {
        return Err(FsError::InvalidSuperBlock);
    }

    Ok(superblock)
}

pub fn write_superblock(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<()> {
    device.write_block(SUPERBLOCK_ID, &superblock.encode())
}

impl SuperBlock {
    /// Returns the user id of a matching user table row.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<u8> {
        self.users
            .iter()
            .position(|u| u.matches(username, password))
            .map(|i| i as u8)
            .ok_or(FsError::Auth)
    }

    pub fn user_id(&self, username: &str) -> Option<u8> {
        self.users
            .iter()
            .position(|u| u.name() == username)
            .map(|i| i as u8)
    }

    pub fn username(&self, uid: u8) -> Option<String> {
        self.users.get(uid as usize).map(|u| u.name().into_owned())
    }
}

/// Writes a fresh image: superblock, seeded root directory, two seed files,
/// one seed subdirectory and a free list over every remaining block.
pub fn format_fs(device: &impl BlockDevice, users: &[(&str, &str)]) -> Result<SuperBlock> {
    let block_count = device.num_blocks();
    if block_count < MIN_BLOCKS as usize || block_count > u32::MAX as usize {
        return Err(FsError::InvalidDiskSize);
    }
    let block_count = block_count as u32;

    if users.is_empty() || users.len() > USER_LIMIT {
        return Err(FsError::InvalidUserTable);
    }
    let mut table: Vec<UserInfo> = Vec::with_capacity(users.len());
    for (name, password) in users {
        let user = UserInfo::new(name, password)?;
        if table.iter().any(|u| u.username == user.username) {
            return Err(FsError::InvalidUserTable);
        }
        table.push(user);
    }

    let superblock = SuperBlock {
        block_count,
        free_head: FIRST_FREE_BLOCK,
        root: ROOT_BLOCK_ID,
        users: table,
    };

    let now = now();
    let mut root = DirBlock::new(Meta::new(SUPERUSER_ID, now), ROOT_PARENT);
    root.entries = vec![
        DirEntry::new(EntryType::File, SEED_FILE1_BLOCK, "file1")?,
        DirEntry::new(EntryType::File, SEED_FILE2_BLOCK, "file2")?,
        DirEntry::new(EntryType::Directory, SEED_DIR_BLOCK, "dir1")?,
    ];

    let seed = [
        (SUPERBLOCK_ID, Block::Super(superblock.clone())),
        (ROOT_BLOCK_ID, Block::Directory(root)),
        (SEED_FILE1_BLOCK, Block::File(FileBlock::placeholder(Meta::new(SUPERUSER_ID, now), 123))),
        (SEED_FILE2_BLOCK, Block::File(FileBlock::placeholder(Meta::new(SUPERUSER_ID, now), 321))),
        (SEED_DIR_BLOCK, Block::Directory(DirBlock::new(Meta::new(SUPERUSER_ID, now), ROOT_BLOCK_ID))),
    ];
    for (block_id, block) in seed.iter() {
        put_block(device, *block_id, block)?;
    }

    for block_id in FIRST_FREE_BLOCK..block_count {
        let next = if block_id + 1 < block_count {
            block_id + 1
        } else {
            FREE_LIST_END
        };
        put_block(device, block_id, &Block::Free(FreeBlock { next }))?;
    }
    device.flush()?;

    info!(
        "[format] {} blocks, {} users, {} free",
        block_count,
        superblock.users.len(),
        block_count - FIRST_FREE_BLOCK
    );
    debug!("[format] free list {}..{}", FIRST_FREE_BLOCK, block_count - 1);
    Ok(superblock)
}
