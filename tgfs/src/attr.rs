//! Attribute translation: backend `NodeAttributes` -> POSIX mode bits and link count.
//!
//! Two fixed policies apply:
//! - directories always get `dr-xr-xr-x` and their stored privileges are ignored;
//! - files named `*.sh` / `*.bash` are always `rwxrwxrwx`, whatever the backend says.

use crate::model::{NodeAttributes, Privileges};

const S_IFMT: u32 = libc::S_IFMT as u32;
const S_IFDIR: u32 = libc::S_IFDIR as u32;
const S_IFREG: u32 = libc::S_IFREG as u32;

/// World-read, execute for every class, owner-read.
pub const DIRECTORY_MODE: u32 = S_IFDIR | 0o444 | 0o111 | 0o400;
pub const DIRECTORY_NLINK: u32 = 2;
pub const FILE_NLINK: u32 = 1;

const SCRIPT_SUFFIXES: [&str; 2] = [".sh", ".bash"];

/// POSIX view of a node, ready to be handed to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosixAttributes {
    pub mode: u32,
    pub nlink: u32,
    pub size: u64,
    /// Epoch seconds, no sub-second part.
    pub mtime: i64,
}

impl PosixAttributes {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Permission bits without the file type.
    pub fn perm(&self) -> u16 {
        (self.mode & 0o7777) as u16
    }
}

pub fn translate(path: &str, attrs: &NodeAttributes) -> PosixAttributes {
    if attrs.is_directory {
        return PosixAttributes {
            mode: directory_mode(),
            nlink: DIRECTORY_NLINK,
            size: 0,
            mtime: i64::from(attrs.modification_time),
        };
    }

    let attrs = apply_script_override(path, attrs.clone());
    PosixAttributes {
        mode: file_mode(&attrs),
        nlink: FILE_NLINK,
        size: attrs.size,
        mtime: i64::from(attrs.modification_time),
    }
}

/// Directories ignore stored privileges.
pub fn directory_mode() -> u32 {
    DIRECTORY_MODE
}

pub fn is_shell_script(path: &str) -> bool {
    SCRIPT_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Shell scripts are always readable, writable and executable by everyone.
pub fn apply_script_override(path: &str, attrs: NodeAttributes) -> NodeAttributes {
    if is_shell_script(path) {
        attrs.with_all_privileges(Privileges::FULL)
    } else {
        attrs
    }
}

/// Regular-file mode assembled from the three stored triples.
pub fn file_mode(attrs: &NodeAttributes) -> u32 {
    S_IFREG
        | triple_bits(attrs.owner_privileges, 6)
        | triple_bits(attrs.group_privileges, 3)
        | triple_bits(attrs.others_privileges, 0)
}

fn triple_bits(p: Privileges, shift: u32) -> u32 {
    let mut bits = 0;
    if p.can_read {
        bits |= 0o4;
    }
    if p.can_write {
        bits |= 0o2;
    }
    if p.can_execute {
        bits |= 0o1;
    }
    bits << shift
}
