//! mcdos is a tiny multi-user file system living in a single disk image.
//! Blocks carry no type tag; what a block holds is known from whatever
//! references it.
//!
//! Image layout:
//! - Block 0: Superblock (block count, free list head, root, user table)
//! - Block 1: Root directory
//! - Every other block: a directory, a file's metadata, a file's data, or free
//!
//! Layers (from bottom to top):
//! 1. Block Device: raw 512-byte block access, `FileDisk` for image files.
//! 2. Node: typed get/put of superblock, free, directory and file blocks.
//! 3. Free List: allocation and release of blocks.
//! 4. Path: resolution of path strings, with execute checks on the way.
//! 5. Directory/File: structural and content operations, permission checked.
//! 6. FileSystem/Session: format, mount, login, per-user path operations.
//! 7. Shell: the interactive front end used by the `mcdos` binary.

mod config;
mod block_dev;
mod structs;
mod node;
mod superblock;
mod freelist;
mod perm;
mod path;
mod directory;
mod file;
mod check;
mod fs;
mod error;
mod logger;
pub mod shell;

pub use block_dev::*;
pub use config::*;
pub use structs::*;
pub use node::*;
pub use superblock::*;
pub use freelist::*;
pub use perm::*;
pub use path::*;
pub use directory::*;
pub use file::*;
pub use check::*;
pub use fs::*;
pub use logger::{init_logger, level_for};
pub use error::FsError as Error;
pub use error::Result;
