use std::io::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("{op} failed at block {block}: {kind}")]
    Io {
        op: &'static str,
        block: u32,
        kind: ErrorKind,
    },
    #[error("terminal I/O failed: {0}")]
    Terminal(ErrorKind),
    #[error("invalid login or password")]
    Auth,
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a file")]
    NotAFile,
    #[error("name already exists")]
    DuplicateName,
    #[error("name too long")]
    NameTooLong,
    #[error("invalid name")]
    InvalidName,
    #[error("invalid path")]
    InvalidPath,
    #[error("directory full")]
    DirectoryFull,
    #[error("file too large")]
    FileTooLarge,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("disk full")]
    DiskFull,
    #[error("permission denied")]
    PermissionDenied,
    #[error("cannot move a directory into itself")]
    InvalidMove,
    #[error("directory is in use")]
    Busy,
    #[error("unknown user")]
    UnknownUser,
    #[error("invalid mode")]
    InvalidMode,
    #[error("invalid disk size")]
    InvalidDiskSize,
    #[error("invalid user table")]
    InvalidUserTable,
    #[error("invalid superblock")]
    InvalidSuperBlock,
    #[error("invalid block id {0}")]
    InvalidBlockId(u32),
    #[error("corrupt block {0}")]
    CorruptBlock(u32),
}

impl FsError {
    /// Errors after which the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FsError::Io { .. }
                | FsError::Terminal(_)
                | FsError::InvalidSuperBlock
                | FsError::CorruptBlock(_)
        )
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
