//! Whole-image structural verification.
//! Walks the directory tree from the root and the free list, recording who
//! owns each block. A consistent image has every block owned exactly once.

use std::collections::HashSet;

use log::warn;

use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::error::Result;
use crate::node::{get_block, get_free};
use crate::structs::*;
use crate::superblock::read_superblock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// Block reachable from two places.
    DoubleReference(u32),
    /// Block index outside the image.
    OutOfRange(u32),
    /// Block neither free nor owned.
    Leaked(u32),
    /// Free list revisits a block.
    FreeListCycle(u32),
    DuplicateName { dir: u32, name: String },
    BadOwner { block: u32, owner: u8 },
    BadParent { dir: u32, expected: u32, found: u32 },
    RootParent(u32),
    /// Block that could not be decoded as what references it expects.
    Undecodable(u32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub block_count: u32,
    pub free: u32,
    /// Blocks held by directories and files, the root included.
    pub owned: u32,
    pub problems: Vec<Problem>,
}

impl CheckReport {
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }
}

struct Walker {
    block_count: u32,
    seen: Vec<bool>,
    report: CheckReport,
}

impl Walker {
    /// Marks `block` as claimed. Returns false when it must not be followed.
    fn claim(&mut self, block: u32) -> bool {
        if block == SUPERBLOCK_ID || block >= self.block_count {
            self.report.problems.push(Problem::OutOfRange(block));
            return false;
        }
        if self.seen[block as usize] {
            self.report.problems.push(Problem::DoubleReference(block));
            return false;
        }
        self.seen[block as usize] = true;
        true
    }

    fn check_owner(&mut self, block: u32, meta: &Meta, users: usize) {
        if meta.owner as usize >= users {
            self.report.problems.push(Problem::BadOwner { block, owner: meta.owner });
        }
    }
}

pub fn check(device: &impl BlockDevice) -> Result<CheckReport> {
    let superblock = read_superblock(device)?;
    let users = superblock.users.len();
    let mut walker = Walker {
        block_count: superblock.block_count,
        seen: vec![false; superblock.block_count as usize],
        report: CheckReport {
            block_count: superblock.block_count,
            ..Default::default()
        },
    };

    // Free list first, a cycle shows up as a block seen twice.
    let mut cur = superblock.free_head;
    while cur != FREE_LIST_END {
        if cur >= superblock.block_count {
            walker.report.problems.push(Problem::OutOfRange(cur));
            break;
        }
        if walker.seen[cur as usize] {
            walker.report.problems.push(Problem::FreeListCycle(cur));
            break;
        }
        walker.seen[cur as usize] = true;
        walker.report.free += 1;
        cur = get_free(device, cur)?.next;
    }

    // Directory tree with an explicit stack of (block, expected parent).
    let mut stack = Vec::new();
    if walker.claim(superblock.root) {
        stack.push((superblock.root, ROOT_PARENT));
    }
    while let Some((dir_block, expected_parent)) = stack.pop() {
        walker.report.owned += 1;
        let dir = match get_block(device, dir_block, BlockKind::Directory) {
            Ok(Block::Directory(dir)) => dir,
            _ => {
                walker.report.problems.push(Problem::Undecodable(dir_block));
                continue;
            }
        };
        walker.check_owner(dir_block, &dir.meta, users);
        if dir_block == superblock.root {
            if dir.parent != ROOT_PARENT {
                walker.report.problems.push(Problem::RootParent(dir.parent));
            }
        } else if dir.parent != expected_parent {
            walker.report.problems.push(Problem::BadParent {
                dir: dir_block,
                expected: expected_parent,
                found: dir.parent,
            });
        }

        let mut names = HashSet::new();
        for entry in dir.entries.iter() {
            let name = entry.name().into_owned();
            if !names.insert(name.clone()) {
                walker.report.problems.push(Problem::DuplicateName { dir: dir_block, name });
            }
            if !walker.claim(entry.block) {
                continue;
            }
            match entry.ty {
                EntryType::Directory => stack.push((entry.block, dir_block)),
                EntryType::File => {
                    walker.report.owned += 1;
                    let file = match get_block(device, entry.block, BlockKind::File) {
                        Ok(Block::File(file)) => file,
                        _ => {
                            walker.report.problems.push(Problem::Undecodable(entry.block));
                            continue;
                        }
                    };
                    walker.check_owner(entry.block, &file.meta, users);
                    for &data_block in file.fat.iter().filter(|&&b| b != 0) {
                        if walker.claim(data_block) {
                            walker.report.owned += 1;
                        }
                    }
                }
            }
        }
    }

    for block in 1..superblock.block_count {
        if !walker.seen[block as usize] {
            walker.report.problems.push(Problem::Leaked(block));
        }
    }

    for problem in walker.report.problems.iter() {
        warn!("[check] {:?}", problem);
    }
    Ok(walker.report)
}
