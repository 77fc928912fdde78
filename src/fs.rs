/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Registers the operation table with the kernel bridge and translates
//! between [`fuse_mt`]'s path-based contract and the C2-C5 handlers (C6).

use std::path::Path;

use fuse::{FileAttr, FileType};
use fuse_mt::{
    CreatedEntry, DirectoryEntry, FilesystemMT, RequestInfo, ResultCreate, ResultData,
    ResultEmpty, ResultEntry, ResultGetattr, ResultOpen, ResultReaddir, ResultStatfs, ResultWrite,
    ResultXattr, Statfs,
};
use log::{debug, error, warn};
use time::Timespec;

use crate::config::Config;
use crate::content;
use crate::db::Database;
use crate::error::FsError;
use crate::meta;
use crate::namespace;
use crate::types::{self, Stat};

/// TTL handed back to the kernel for every attribute reply. The database is
/// the single source of truth and every handler re-reads it, so there is
/// nothing gained by letting the kernel cache attributes longer than this.
const ATTR_TTL: Timespec = Timespec { sec: 1, nsec: 0 };

pub struct TableFs {
    db: Database,
}

impl TableFs {
    pub fn new(db: Database, config: &Config) -> Self {
        types::set_root_owner(config.default_uid, config.default_gid);
        TableFs { db }
    }
}

fn stat_to_attr(stat: &Stat) -> FileAttr {
    let kind = match types::file_type_bits(stat.mode) {
        types::S_IFDIR => FileType::Directory,
        types::S_IFLNK => FileType::Symlink,
        _ => FileType::RegularFile,
    };
    let time = Timespec {
        sec: stat.mtime,
        nsec: 0,
    };
    FileAttr {
        ino: 0,
        size: stat.size,
        blocks: stat.size.div_ceil(512),
        atime: Timespec {
            sec: stat.atime,
            nsec: 0,
        },
        mtime: time,
        ctime: Timespec {
            sec: stat.ctime,
            nsec: 0,
        },
        crtime: time,
        kind,
        perm: (stat.mode & 0o7777) as u16,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        flags: 0,
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn join(parent: &Path, name: &Path) -> String {
    let parent = path_str(parent);
    let name = name.to_string_lossy();
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn log_and_errno(op: &str, path: &str, err: FsError) -> libc::c_int {
    match err {
        FsError::NotFound(_) => {}
        FsError::Io(ref inner) => error!("{op} '{path}' failed: storage error: {inner}"),
        ref other => warn!("{op} '{path}' failed: {other}"),
    }
    err.to_errno()
}

impl FilesystemMT for TableFs {
    fn init(&self, _req: RequestInfo) -> ResultEmpty {
        debug!("init");
        Ok(())
    }

    fn destroy(&self, _req: RequestInfo) {
        debug!("destroy");
    }

    fn getattr(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>) -> ResultGetattr {
        let path = path_str(path);
        let conn = self.db.lock();
        meta::getattr(&conn, &path)
            .map(|stat| (ATTR_TTL, stat_to_attr(&stat)))
            .map_err(|e| log_and_errno("getattr", &path, e))
    }

    fn chmod(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>, mode: u32) -> ResultEmpty {
        let path = path_str(path);
        debug!("chmod {path} {mode:o}");
        let conn = self.db.lock();
        meta::chmod(&conn, &path, mode).map_err(|e| log_and_errno("chmod", &path, e))
    }

    fn chown(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: Option<u64>,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> ResultEmpty {
        let path = path_str(path);
        debug!("chown {path} {uid:?} {gid:?}");
        let conn = self.db.lock();
        let current = meta::getattr(&conn, &path).map_err(|e| log_and_errno("chown", &path, e))?;
        meta::chown(
            &conn,
            &path,
            uid.unwrap_or(current.uid),
            gid.unwrap_or(current.gid),
        )
        .map_err(|e| log_and_errno("chown", &path, e))
    }

    fn truncate(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>, size: u64) -> ResultEmpty {
        let path = path_str(path);
        debug!("truncate {path} to {size}");
        let conn = self.db.lock();
        content::truncate(&conn, &path, size).map_err(|e| log_and_errno("truncate", &path, e))
    }

    fn utimens(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: Option<u64>,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> ResultEmpty {
        let path = path_str(path);
        let conn = self.db.lock();
        meta::utimens(&conn, &path, atime.map(|t| t.sec), mtime.map(|t| t.sec))
            .map_err(|e| log_and_errno("utimens", &path, e))
    }

    fn readlink(&self, _req: RequestInfo, path: &Path) -> ResultData {
        let path = path_str(path);
        let conn = self.db.lock();
        namespace::readlink(&conn, &path, 4096).map_err(|e| log_and_errno("readlink", &path, e))
    }

    fn mknod(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &Path,
        mode: u32,
        rdev: u32,
    ) -> ResultEntry {
        let path = join(parent, name);
        debug!("mknod {path} {mode:o}");
        let conn = self.db.lock();
        namespace::mknod(&conn, &path, mode, rdev)
            .and_then(|()| meta::getattr(&conn, &path))
            .map(|stat| (ATTR_TTL, stat_to_attr(&stat), 0))
            .map_err(|e| log_and_errno("mknod", &path, e))
    }

    fn mkdir(&self, _req: RequestInfo, parent: &Path, name: &Path, mode: u32) -> ResultEntry {
        let path = join(parent, name);
        debug!("mkdir {path} {mode:o}");
        let conn = self.db.lock();
        namespace::mkdir(&conn, &path, mode)
            .and_then(|()| meta::getattr(&conn, &path))
            .map(|stat| (ATTR_TTL, stat_to_attr(&stat), 0))
            .map_err(|e| log_and_errno("mkdir", &path, e))
    }

    fn unlink(&self, _req: RequestInfo, parent: &Path, name: &Path) -> ResultEmpty {
        let path = join(parent, name);
        debug!("unlink {path}");
        let mut conn = self.db.lock();
        namespace::unlink(&mut conn, &path).map_err(|e| log_and_errno("unlink", &path, e))
    }

    fn rmdir(&self, _req: RequestInfo, parent: &Path, name: &Path) -> ResultEmpty {
        let path = join(parent, name);
        debug!("rmdir {path}");
        let conn = self.db.lock();
        namespace::rmdir(&conn, &path).map_err(|e| log_and_errno("rmdir", &path, e))
    }

    fn symlink(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &Path,
        target: &Path,
    ) -> ResultEntry {
        let path = join(parent, name);
        let target = path_str(target);
        debug!("symlink {path} -> {target}");
        let conn = self.db.lock();
        namespace::symlink(&conn, &target, &path)
            .and_then(|()| meta::getattr(&conn, &path))
            .map(|stat| (ATTR_TTL, stat_to_attr(&stat), 0))
            .map_err(|e| log_and_errno("symlink", &path, e))
    }

    fn rename(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &Path,
        newparent: &Path,
        newname: &Path,
    ) -> ResultEmpty {
        let old_path = join(parent, name);
        let new_path = join(newparent, newname);
        debug!("rename {old_path} -> {new_path}");
        let mut conn = self.db.lock();
        namespace::rename(&mut conn, &old_path, &new_path)
            .map_err(|e| log_and_errno("rename", &old_path, e))
    }

    fn link(&self, _req: RequestInfo, path: &Path, newparent: &Path, newname: &Path) -> ResultEntry {
        let old_path = path_str(path);
        let new_path = join(newparent, newname);
        debug!("link {old_path} -> {new_path}");
        let conn = self.db.lock();
        namespace::link(&conn, &old_path, &new_path)
            .and_then(|()| meta::getattr(&conn, &new_path))
            .map(|stat| (ATTR_TTL, stat_to_attr(&stat), 0))
            .map_err(|e| log_and_errno("link", &old_path, e))
    }

    fn open(&self, _req: RequestInfo, path: &Path, _flags: u32) -> ResultOpen {
        let path = path_str(path);
        let conn = self.db.lock();
        meta::getattr(&conn, &path)
            .map(|_| (0, 0))
            .map_err(|e| log_and_errno("open", &path, e))
    }

    fn read(&self, _req: RequestInfo, path: &Path, _fh: u64, offset: u64, size: u32) -> ResultData {
        let path = path_str(path);
        let conn = self.db.lock();
        content::read(&conn, &path, offset, size).map_err(|e| log_and_errno("read", &path, e))
    }

    fn write(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: u64,
        offset: u64,
        data: &[u8],
        _flags: u32,
    ) -> ResultWrite {
        let path = path_str(path);
        debug!("write {path} {} bytes @ {offset}", data.len());
        let conn = self.db.lock();
        content::write(&conn, &path, offset, data).map_err(|e| log_and_errno("write", &path, e))
    }

    fn flush(&self, _req: RequestInfo, _path: &Path, _fh: u64, _lock_owner: u64) -> ResultEmpty {
        Ok(())
    }

    fn release(
        &self,
        _req: RequestInfo,
        _path: &Path,
        _fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> ResultEmpty {
        Ok(())
    }

    fn fsync(&self, _req: RequestInfo, _path: &Path, _fh: u64, _datasync: bool) -> ResultEmpty {
        Ok(())
    }

    fn opendir(&self, _req: RequestInfo, path: &Path, _flags: u32) -> ResultOpen {
        let path = path_str(path);
        let conn = self.db.lock();
        meta::opendir(&conn, &path)
            .map(|handle| (handle as u64, 0))
            .map_err(|e| log_and_errno("opendir", &path, e))
    }

    fn readdir(&self, _req: RequestInfo, path: &Path, fh: u64, offset: u64) -> ResultReaddir {
        let path = path_str(path);
        let conn = self.db.lock();
        meta::readdir(&conn, fh as i64, offset as i64)
            .map(|entries| {
                entries
                    .into_iter()
                    .map(|entry| DirectoryEntry {
                        name: entry.name.into(),
                        kind: match types::file_type_bits(entry.stat.mode) {
                            types::S_IFDIR => FileType::Directory,
                            types::S_IFLNK => FileType::Symlink,
                            _ => FileType::RegularFile,
                        },
                    })
                    .collect()
            })
            .map_err(|e| log_and_errno("readdir", &path, e))
    }

    fn releasedir(&self, _req: RequestInfo, _path: &Path, _fh: u64, _flags: u32) -> ResultEmpty {
        Ok(())
    }

    fn fsyncdir(&self, _req: RequestInfo, _path: &Path, _fh: u64, _datasync: bool) -> ResultEmpty {
        Ok(())
    }

    fn statfs(&self, _req: RequestInfo, _path: &Path) -> ResultStatfs {
        Ok(Statfs {
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            bsize: 512,
            namelen: 4096,
            frsize: 512,
        })
    }

    fn getxattr(&self, _req: RequestInfo, _path: &Path, _name: &std::ffi::OsStr, _size: u32) -> ResultXattr {
        Err(libc::ENOSYS)
    }

    fn listxattr(&self, _req: RequestInfo, _path: &Path, _size: u32) -> ResultXattr {
        Err(libc::ENOSYS)
    }

    fn create(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &Path,
        mode: u32,
        _flags: u32,
    ) -> ResultCreate {
        let path = join(parent, name);
        debug!("create {path} {mode:o}");
        let conn = self.db.lock();
        namespace::mknod(&conn, &path, mode, 0)
            .and_then(|()| meta::getattr(&conn, &path))
            .map(|stat| CreatedEntry {
                ttl: ATTR_TTL,
                attr: stat_to_attr(&stat),
                generation: 0,
                fh: 0,
                flags: 0,
            })
            .map_err(|e| log_and_errno("create", &path, e))
    }
}
