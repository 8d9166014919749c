pub const BLOCK_SIZE: usize = 512;
pub const SUPERBLOCK_ID: u32 = 0; // Block ID for the superblock
pub const ROOT_BLOCK_ID: u32 = 1; // Root directory block written by format
pub const FREE_LIST_END: u32 = 0; // Free list terminator, block 0 is never free
pub const ROOT_PARENT: u32 = 0; // Root has no parent, stored as 0

pub const NAME_LEN_LIMIT: usize = 16; // On-disk name field, NUL padded
pub const MAX_NAME_LEN: usize = NAME_LEN_LIMIT - 1; // Usable bytes of a name
pub const DIRC_LIMIT: usize = 16; // Maximum number of entries per directory
pub const USER_LIMIT: usize = 15; // Maximum number of users in the superblock
pub const FAT_SIZE: usize = 124; // Allocation table slots per file
pub const MAX_FILE_SIZE: usize = FAT_SIZE * BLOCK_SIZE;

pub const SUPERUSER_ID: u8 = 0;
pub const DOT_NAME: &str = ".";
pub const DOTDOT_NAME: &str = "..";

// Seed content written by format.
pub const SEED_FILE1_BLOCK: u32 = 2;
pub const SEED_FILE2_BLOCK: u32 = 3;
pub const SEED_DIR_BLOCK: u32 = 4;
pub const FIRST_FREE_BLOCK: u32 = 5;
pub const MIN_BLOCKS: u32 = FIRST_FREE_BLOCK + 1;

// Byte layout, little endian with C natural alignment.
pub const META_SIZE: usize = 12;
pub const META_OWNER_OFF: usize = 0;
pub const META_PERM_OFF: usize = 1;
pub const META_CTIME_OFF: usize = 4;
pub const META_MTIME_OFF: usize = 8;

pub const SUPER_BC_OFF: usize = 0;
pub const SUPER_FREE_OFF: usize = 4;
pub const SUPER_ROOT_OFF: usize = 8;
pub const SUPER_UC_OFF: usize = 12;
pub const SUPER_USERS_OFF: usize = 13;
pub const USER_INFO_SIZE: usize = 2 * NAME_LEN_LIMIT;

pub const DIR_PARENT_OFF: usize = META_SIZE;
pub const DIR_COUNT_OFF: usize = 16;
pub const DIR_ENTRIES_OFF: usize = 20;
pub const DIR_ENTRY_SIZE: usize = 24; // type (4) + block (4) + name (16)

pub const FILE_SIZE_OFF: usize = META_SIZE;
pub const FILE_FAT_OFF: usize = 16;

pub const FREE_NEXT_OFF: usize = 0;
