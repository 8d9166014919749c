//! Ownership and permission bits.
//! User 0 is the superuser and passes every check. Everyone else is judged
//! by the owner bits when they own the entry and by the other bits otherwise.

use bitflags::bitflags;
use log::debug;

use crate::block_dev::BlockDevice;
use crate::config::SUPERUSER_ID;
use crate::error::{FsError, Result};
use crate::node::{get_dir, get_file, now, put_dir, put_file};
use crate::structs::{EntryType, Meta};
use crate::superblock::read_superblock;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Perm: u8 {
        const OWNER_READ = 1;
        const OWNER_WRITE = 2;
        const OWNER_EXEC = 4;
        const OTHER_READ = 8;
        const OTHER_WRITE = 16;
        const OTHER_EXEC = 32;

        const DEFAULT = Self::OWNER_READ.bits()
            | Self::OWNER_WRITE.bits()
            | Self::OWNER_EXEC.bits()
            | Self::OTHER_READ.bits()
            | Self::OTHER_EXEC.bits();
    }
}

impl Perm {
    /// Parses `rwxr-x` (listing form) or two octal digits such as `75`.
    pub fn parse(mode: &str) -> Result<Self> {
        let bytes = mode.as_bytes();
        match bytes.len() {
            6 => {
                const FLAGS: [(u8, Perm); 6] = [
                    (b'r', Perm::OWNER_READ),
                    (b'w', Perm::OWNER_WRITE),
                    (b'x', Perm::OWNER_EXEC),
                    (b'r', Perm::OTHER_READ),
                    (b'w', Perm::OTHER_WRITE),
                    (b'x', Perm::OTHER_EXEC),
                ];
                let mut perm = Perm::empty();
                for (&c, (letter, flag)) in bytes.iter().zip(FLAGS) {
                    if c == letter {
                        perm |= flag;
                    } else if c != b'-' {
                        return Err(FsError::InvalidMode);
                    }
                }
                Ok(perm)
            }
            2 => {
                let owner = octal_class(bytes[0])?;
                let other = octal_class(bytes[1])?;
                Ok(Perm::from_bits_truncate(owner | (other << 3)))
            }
            _ => Err(FsError::InvalidMode),
        }
    }

    /// Renders the mask as `rwxr-x`.
    pub fn render(&self) -> String {
        [
            (Perm::OWNER_READ, 'r'),
            (Perm::OWNER_WRITE, 'w'),
            (Perm::OWNER_EXEC, 'x'),
            (Perm::OTHER_READ, 'r'),
            (Perm::OTHER_WRITE, 'w'),
            (Perm::OTHER_EXEC, 'x'),
        ]
        .iter()
        .map(|&(flag, c)| if self.contains(flag) { c } else { '-' })
        .collect()
    }
}

// Unix digit (r=4, w=2, x=1) to this layout's class bits (r=1, w=2, x=4).
fn octal_class(digit: u8) -> Result<u8> {
    if !(b'0'..=b'7').contains(&digit) {
        return Err(FsError::InvalidMode);
    }
    let d = digit - b'0';
    Ok(((d >> 2) & 1) | (d & 2) | ((d & 1) << 2))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

pub fn check_access(meta: &Meta, uid: u8, access: Access) -> Result<()> {
    if uid == SUPERUSER_ID {
        return Ok(());
    }
    let needed = match (meta.owner == uid, access) {
        (true, Access::Read) => Perm::OWNER_READ,
        (true, Access::Write) => Perm::OWNER_WRITE,
        (true, Access::Execute) => Perm::OWNER_EXEC,
        (false, Access::Read) => Perm::OTHER_READ,
        (false, Access::Write) => Perm::OTHER_WRITE,
        (false, Access::Execute) => Perm::OTHER_EXEC,
    };
    if meta.perm.contains(needed) {
        Ok(())
    } else {
        debug!("[perm] uid {} denied {:?} on entry owned by {}", uid, access, meta.owner);
        Err(FsError::PermissionDenied)
    }
}

/// chmod and chown are reserved to the owner and the superuser.
pub fn check_owner(meta: &Meta, uid: u8) -> Result<()> {
    if uid == SUPERUSER_ID || meta.owner == uid {
        Ok(())
    } else {
        Err(FsError::PermissionDenied)
    }
}

fn update_meta(
    device: &impl BlockDevice,
    block: u32,
    ty: EntryType,
    uid: u8,
    f: impl FnOnce(&mut Meta),
) -> Result<()> {
    match ty {
        EntryType::Directory => {
            let mut dir = get_dir(device, block)?;
            check_owner(&dir.meta, uid)?;
            f(&mut dir.meta);
            dir.meta.mtime = now();
            put_dir(device, block, &dir)
        }
        EntryType::File => {
            let mut file = get_file(device, block)?;
            check_owner(&file.meta, uid)?;
            f(&mut file.meta);
            file.meta.mtime = now();
            put_file(device, block, &file)
        }
    }
}

pub fn chmod(device: &impl BlockDevice, uid: u8, block: u32, ty: EntryType, perm: Perm) -> Result<()> {
    update_meta(device, block, ty, uid, |meta| meta.perm = perm)?;
    debug!("[chmod] block {} -> {}", block, perm.render());
    Ok(())
}

pub fn chown(device: &impl BlockDevice, uid: u8, block: u32, ty: EntryType, new_owner: u8) -> Result<()> {
    let superblock = read_superblock(device)?;
    if new_owner as usize >= superblock.users.len() {
        return Err(FsError::UnknownUser);
    }
    update_meta(device, block, ty, uid, |meta| meta.owner = new_owner)?;
    debug!("[chown] block {} -> uid {}", block, new_owner);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn meta(owner: u8, perm: Perm) -> Meta {
        Meta { owner, perm, ctime: 0, mtime: 0 }
    }

    #[test]
    fn test_parse_listing_form() {
        assert_eq!(Perm::parse("rwxr-x").unwrap(), Perm::DEFAULT);
        assert_eq!(Perm::parse("------").unwrap(), Perm::empty());
        assert_eq!(Perm::parse("rw-rw-").unwrap().bits(), 0b011011);
        assert_eq!(Perm::parse("rwxrwq"), Err(FsError::InvalidMode));
        assert_eq!(Perm::parse("xwrr-x"), Err(FsError::InvalidMode));
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(Perm::parse("75").unwrap(), Perm::DEFAULT);
        assert_eq!(Perm::parse("60").unwrap(), Perm::OWNER_READ | Perm::OWNER_WRITE);
        assert_eq!(Perm::parse("01").unwrap(), Perm::OTHER_EXEC);
        assert_eq!(Perm::parse("78"), Err(FsError::InvalidMode));
        assert_eq!(Perm::parse("755"), Err(FsError::InvalidMode));
    }

    #[test]
    fn test_render() {
        assert_eq!(Perm::DEFAULT.render(), "rwxr-x");
        assert_eq!(Perm::empty().render(), "------");
        assert_eq!(Perm::all().render(), "rwxrwx");
    }

    #[test]
    fn test_check_access() {
        let m = meta(1, Perm::OWNER_READ | Perm::OWNER_WRITE | Perm::OTHER_READ);
        assert!(check_access(&m, 1, Access::Write).is_ok());
        assert!(check_access(&m, 2, Access::Read).is_ok());
        assert_eq!(check_access(&m, 2, Access::Write), Err(FsError::PermissionDenied));
        assert_eq!(check_access(&m, 1, Access::Execute), Err(FsError::PermissionDenied));
        // superuser ignores the mask entirely
        assert!(check_access(&meta(1, Perm::empty()), SUPERUSER_ID, Access::Write).is_ok());
    }

    #[test]
    fn test_check_owner() {
        let m = meta(2, Perm::empty());
        assert!(check_owner(&m, 2).is_ok());
        assert!(check_owner(&m, SUPERUSER_ID).is_ok());
        assert_eq!(check_owner(&m, 3), Err(FsError::PermissionDenied));
    }
}
