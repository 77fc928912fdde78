/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Mode-bit helpers and the in-memory stat bundle shared by C2-C5.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Root directory has no `paths` row; it is addressed with this identifier.
pub const ROOT_ID: i64 = 0;

/// Owner stamped on the synthesized root entry, set once from `Config` at
/// startup. Unset in tests, where the process's own uid/gid stands in.
static ROOT_OWNER: OnceLock<(u32, u32)> = OnceLock::new();

/// Called once by the bridge adapter during setup; later calls are no-ops.
pub fn set_root_owner(uid: u32, gid: u32) {
    let _ = ROOT_OWNER.set((uid, gid));
}

pub const S_IFMT: u32 = 0o170_000;
pub const S_IFDIR: u32 = 0o040_000;
pub const S_IFREG: u32 = 0o100_000;
pub const S_IFLNK: u32 = 0o120_000;

pub const ROOT_MODE: u32 = S_IFDIR | 0o755;
pub const DEFAULT_SYMLINK_MODE: u32 = S_IFLNK | 0o777;

pub fn file_type_bits(mode: u32) -> u32 {
    mode & S_IFMT
}

pub fn is_dir(mode: u32) -> bool {
    file_type_bits(mode) == S_IFDIR
}

pub fn is_regular(mode: u32) -> bool {
    file_type_bits(mode) == S_IFREG
}

/// Seconds since the Unix epoch, used for every stored timestamp column.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// Full attribute bundle for a namespace entry, as read back from a join of
/// `paths` and `files`. Mirrors what `getattr` needs to hand the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub size: u64,
    pub nlink: u32,
}

impl Stat {
    /// The stat synthesized for the virtual root entry (no `paths` row).
    /// Owner comes from [`set_root_owner`] when configured, otherwise from
    /// the mounting process's own uid/gid.
    pub fn root() -> Self {
        let now = now_secs();
        let (uid, gid) = *ROOT_OWNER
            .get_or_init(|| unsafe { (libc::getuid(), libc::getgid()) });
        Stat {
            uid,
            gid,
            mode: ROOT_MODE,
            atime: now,
            mtime: now,
            ctime: now,
            size: 0,
            nlink: 1,
        }
    }
}

/// Metadata bundle returned by path resolution: just enough to drive
/// existence/type checks without a second round trip for most callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    pub id: i64,
    pub mode: u32,
    pub file_id: i64,
    pub size: u64,
}

impl PathInfo {
    pub fn root() -> Self {
        PathInfo {
            id: ROOT_ID,
            mode: ROOT_MODE,
            file_id: 0,
            size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_bits_round_trip() {
        assert!(is_dir(S_IFDIR | 0o755));
        assert!(is_regular(S_IFREG | 0o644));
        assert!(!is_dir(S_IFREG | 0o644));
        assert_eq!(file_type_bits(S_IFLNK | 0o777), S_IFLNK);
    }
}
