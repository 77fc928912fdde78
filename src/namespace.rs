/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Directory/namespace mutations: mkdir, mknod, unlink, rmdir, symlink,
//! readlink, rename, link (C4).
//!
//! All mutations follow resolve -> validate preconditions -> execute a
//! small query sequence -> OK or a negated error. Sequences that touch both
//! `paths` and `files` (unlink, rename-overwrite) run inside an explicit
//! transaction so a partial failure can never leave a decremented `nlink`
//! with its `paths` row still present, or a `files` row orphaned.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{FsError, Result};
use crate::path_resolver::{self, split};
use crate::schema;
use crate::types::{self, now_secs, PathInfo};

fn exists(conn: &Connection, path: &str) -> Result<bool> {
    match path_resolver::resolve_id(conn, path) {
        Ok(_) => Ok(true),
        Err(FsError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Inserts a `paths` row for `path`, looking up its parent by splitting the
/// path textually. `file_id` is 0 for directories.
fn insert_path(conn: &Connection, path: &str, mode: u32, file_id: i64) -> Result<i64> {
    let (parent, _) = split(path);
    let parent_id = path_resolver::resolve_id(conn, parent)?;
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };
    let now = now_secs();
    let mut stmt = conn.prepare_cached(schema::INSERT_PATH)?;
    stmt.execute(rusqlite::params![
        path, parent_id, uid, gid, mode, now, now, now, file_id
    ])?;
    Ok(conn.last_insert_rowid())
}

fn insert_file(conn: &Connection, content: Option<&[u8]>, dev: u32, size: u64) -> Result<i64> {
    let mut stmt = conn.prepare_cached(schema::INSERT_FILE)?;
    stmt.execute(rusqlite::params![content, dev, size as i64])?;
    Ok(conn.last_insert_rowid())
}

/// Decrements `nlink` on `file_id` and deletes the `files` row once it
/// drops to zero. Callers run this inside the same transaction as the
/// `paths` row deletion that triggered it.
fn drop_ref(conn: &Connection, file_id: i64) -> Result<()> {
    let nlink: i64 = conn
        .prepare_cached(schema::DECREMENT_NLINK)?
        .query_row([file_id], |row| row.get(0))?;
    if nlink <= 0 {
        conn.prepare_cached(schema::DELETE_FILE_BY_ID)?
            .execute([file_id])?;
    }
    Ok(())
}

pub fn mkdir(conn: &Connection, path: &str, mode: u32) -> Result<()> {
    if exists(conn, path)? {
        return Err(FsError::Exists(path.to_owned()));
    }
    insert_path(conn, path, types::S_IFDIR | (mode & !types::S_IFMT), 0)?;
    Ok(())
}

pub fn mknod(conn: &Connection, path: &str, mode: u32, dev: u32) -> Result<()> {
    if exists(conn, path)? {
        return Err(FsError::Exists(path.to_owned()));
    }
    let file_id = insert_file(conn, None, dev, 0)?;
    insert_path(conn, path, types::S_IFREG | (mode & !types::S_IFMT), file_id)?;
    Ok(())
}

pub fn symlink(conn: &Connection, target: &str, link_path: &str) -> Result<()> {
    if exists(conn, link_path)? {
        return Err(FsError::Exists(link_path.to_owned()));
    }
    let bytes = target.as_bytes();
    let file_id = insert_file(conn, Some(bytes), 0, bytes.len() as u64)?;
    insert_path(conn, link_path, types::DEFAULT_SYMLINK_MODE, file_id)?;
    Ok(())
}

/// Reads the symlink target, clamped to `size` bytes.
pub fn readlink(conn: &Connection, path: &str, size: usize) -> Result<Vec<u8>> {
    let info = path_resolver::resolve_info(conn, path)?;
    if types::file_type_bits(info.mode) != types::S_IFLNK {
        return Err(FsError::NotSupported(format!("'{path}' is not a symlink")));
    }
    let content: Option<Vec<u8>> = conn
        .prepare_cached(schema::SELECT_FILE_CONTENT)?
        .query_row([info.file_id], |row| row.get(0))?;
    let mut content = content.unwrap_or_default();
    content.truncate(size);
    Ok(content)
}

pub fn link(conn: &Connection, old_path: &str, new_path: &str) -> Result<()> {
    if exists(conn, new_path)? {
        return Err(FsError::Exists(new_path.to_owned()));
    }
    let info = path_resolver::resolve_info(conn, old_path)?;
    insert_path(conn, new_path, info.mode, info.file_id)?;
    conn.prepare_cached(schema::INCREMENT_NLINK)?
        .execute([info.file_id])?;
    Ok(())
}

pub fn unlink(conn: &mut Connection, path: &str) -> Result<()> {
    let info = path_resolver::resolve_info(conn, path)?;
    if types::is_dir(info.mode) {
        return Err(FsError::IsDir(path.to_owned()));
    }
    let tx = conn.transaction()?;
    tx.prepare_cached(schema::DELETE_PATH_BY_ID)?
        .execute([info.id])?;
    drop_ref(&tx, info.file_id)?;
    tx.commit()?;
    Ok(())
}

pub fn rmdir(conn: &Connection, path: &str) -> Result<()> {
    let info = path_resolver::resolve_info(conn, path)?;
    if !types::is_dir(info.mode) {
        return Err(FsError::NotDir(path.to_owned()));
    }
    let count: i64 = conn
        .prepare_cached(schema::COUNT_CHILDREN)?
        .query_row([info.id], |row| row.get(0))?;
    if count != 0 {
        return Err(FsError::NotEmpty(path.to_owned()));
    }
    conn.prepare_cached(schema::DELETE_PATH_BY_ID)?
        .execute([info.id])?;
    Ok(())
}

fn has_children(conn: &Connection, id: i64) -> Result<bool> {
    let count: i64 = conn
        .prepare_cached(schema::COUNT_CHILDREN)?
        .query_row([id], |row| row.get(0))?;
    Ok(count != 0)
}

pub fn rename(conn: &mut Connection, old_path: &str, new_path: &str) -> Result<()> {
    let old_info = path_resolver::resolve_info(conn, old_path)?;
    if types::is_dir(old_info.mode) && has_children(conn, old_info.id)? {
        return Err(FsError::NotSupported(format!(
            "rename of non-empty directory '{old_path}'"
        )));
    }

    let existing: Option<PathInfo> = match path_resolver::resolve_info(conn, new_path) {
        Ok(info) => Some(info),
        Err(FsError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let tx = conn.transaction()?;
    if let Some(existing) = existing {
        if types::is_dir(existing.mode) {
            return Err(FsError::IsDir(new_path.to_owned()));
        }
        tx.prepare_cached(schema::DELETE_PATH_BY_ID)?
            .execute([existing.id])?;
        drop_ref(&tx, existing.file_id)?;
    }
    tx.prepare_cached(schema::UPDATE_PATH_NAME)?
        .execute(rusqlite::params![new_path, old_info.id])?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn mkdir_then_getattr_shows_directory() {
        let db = Database::open_in_memory().unwrap();
        let mut conn = db.lock();
        mkdir(&conn, "/a", 0o755).unwrap();
        let info = path_resolver::resolve_info(&conn, "/a").unwrap();
        assert!(types::is_dir(info.mode));
        assert_eq!(mkdir(&mut conn, "/a", 0o755).unwrap_err().to_errno(), libc::EEXIST);
    }

    #[test]
    fn mknod_creates_empty_regular_file() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        mkdir(&conn, "/a", 0o755).unwrap();
        mknod(&conn, "/a/f", 0o644, 0).unwrap();
        let info = path_resolver::resolve_info(&conn, "/a/f").unwrap();
        assert!(types::is_regular(info.mode));
        assert_eq!(info.size, 0);
    }

    #[test]
    fn link_shares_content_and_increments_nlink() {
        let db = Database::open_in_memory().unwrap();
        let mut conn = db.lock();
        mkdir(&conn, "/a", 0o755).unwrap();
        mknod(&conn, "/a/f", 0o644, 0).unwrap();
        link(&conn, "/a/f", "/a/g").unwrap();
        let stat = path_resolver::resolve_stat(&conn, "/a/g").unwrap();
        assert_eq!(stat.nlink, 2);

        unlink(&mut conn, "/a/f").unwrap();
        assert!(path_resolver::resolve_info(&conn, "/a/g").is_ok());

        unlink(&mut conn, "/a/g").unwrap();
        let count: i64 = conn
            .query_row("select count(*) from files", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn symlink_and_readlink_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        mkdir(&conn, "/a", 0o755).unwrap();
        mknod(&conn, "/a/f", 0o644, 0).unwrap();
        symlink(&conn, "/a/f", "/a/s").unwrap();
        let target = readlink(&conn, "/a/s", 64).unwrap();
        assert_eq!(target, b"/a/f");
    }

    #[test]
    fn rmdir_requires_empty_directory() {
        let db = Database::open_in_memory().unwrap();
        let mut conn = db.lock();
        mkdir(&conn, "/d", 0o755).unwrap();
        mknod(&conn, "/d/x", 0o644, 0).unwrap();
        assert_eq!(rmdir(&conn, "/d").unwrap_err().to_errno(), libc::ENOTEMPTY);
        unlink(&mut conn, "/d/x").unwrap();
        rmdir(&conn, "/d").unwrap();
        assert!(path_resolver::resolve_id(&conn, "/d").is_err());
    }

    #[test]
    fn rename_overwrites_existing_file() {
        let db = Database::open_in_memory().unwrap();
        let mut conn = db.lock();
        mkdir(&conn, "/a", 0o755).unwrap();
        mknod(&conn, "/a/f", 0o644, 0).unwrap();
        mknod(&conn, "/a/g", 0o644, 0).unwrap();
        rename(&mut conn, "/a/f", "/a/g").unwrap();
        assert!(path_resolver::resolve_id(&conn, "/a/f").is_err());
        assert!(path_resolver::resolve_id(&conn, "/a/g").is_ok());
    }

    #[test]
    fn rename_over_directory_is_isdir_error() {
        let db = Database::open_in_memory().unwrap();
        let mut conn = db.lock();
        mkdir(&conn, "/a", 0o755).unwrap();
        mkdir(&conn, "/b", 0o755).unwrap();
        mknod(&conn, "/f", 0o644, 0).unwrap();
        let err = rename(&mut conn, "/f", "/b").unwrap_err();
        assert_eq!(err.to_errno(), libc::EISDIR);
    }

    #[test]
    fn rename_of_nonempty_directory_is_not_supported() {
        let db = Database::open_in_memory().unwrap();
        let mut conn = db.lock();
        mkdir(&conn, "/a", 0o755).unwrap();
        mknod(&conn, "/a/f", 0o644, 0).unwrap();
        let err = rename(&mut conn, "/a", "/b").unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOTSUP);
    }
}
