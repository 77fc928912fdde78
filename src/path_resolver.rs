/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Maps a textual absolute path to an internal identifier and metadata (C2).
//!
//! Path strings are treated opaquely except for the textual split into
//! parent/basename below; no `.`/`..` normalization happens here, the bridge
//! is assumed to deliver canonical paths.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{FsError, Result};
use crate::schema;
use crate::types::{PathInfo, Stat, ROOT_ID};

/// Splits an absolute path into its parent directory and basename.
/// `"/a/b"` -> `("/a", "b")`, `"/a"` -> `("/", "a")`.
pub fn split(path: &str) -> (&str, &str) {
    let at = path.rfind('/').expect("path must be absolute");
    let (parent, name) = (&path[..at], &path[at + 1..]);
    if parent.is_empty() {
        ("/", name)
    } else {
        (parent, name)
    }
}

pub fn basename(path: &str) -> &str {
    split(path).1
}

fn is_root(path: &str) -> bool {
    path == "/"
}

/// Resolves a path to its `paths.id`, or `NotFound`. Root resolves to
/// [`ROOT_ID`] without touching the database.
pub fn resolve_id(conn: &Connection, path: &str) -> Result<i64> {
    if is_root(path) {
        return Ok(ROOT_ID);
    }
    let mut stmt = conn.prepare_cached("select id from paths where path = ?1")?;
    stmt.query_row([path], |row| row.get(0))
        .optional()?
        .ok_or_else(|| FsError::NotFound(path.to_owned()))
}

/// Resolves a path to the metadata bundle handlers need for existence/type
/// checks without a second round trip.
pub fn resolve_info(conn: &Connection, path: &str) -> Result<PathInfo> {
    if is_root(path) {
        return Ok(PathInfo::root());
    }
    let mut stmt = conn.prepare_cached(schema::SELECT_PATH_INFO)?;
    stmt.query_row([path], |row| {
        Ok(PathInfo {
            id: row.get(0)?,
            mode: row.get(1)?,
            file_id: row.get(2)?,
            size: row.get::<_, i64>(3)? as u64,
        })
    })
    .optional()?
    .ok_or_else(|| FsError::NotFound(path.to_owned()))
}

/// Resolves the id of `path`'s parent directory.
pub fn parent_id(conn: &Connection, path: &str) -> Result<i64> {
    let (parent, _) = split(path);
    resolve_id(conn, parent)
}

fn stat_from_row(row: &Row) -> rusqlite::Result<Stat> {
    Ok(Stat {
        uid: row.get(0)?,
        gid: row.get(1)?,
        mode: row.get(2)?,
        atime: row.get(3)?,
        mtime: row.get(4)?,
        ctime: row.get(5)?,
        size: row.get::<_, i64>(6)? as u64,
        nlink: row.get(7)?,
    })
}

/// Full [`Stat`] for `path`, joining `paths` with `files`.
pub fn resolve_stat(conn: &Connection, path: &str) -> Result<Stat> {
    if is_root(path) {
        return Ok(Stat::root());
    }
    let mut stmt = conn.prepare_cached(schema::SELECT_STAT)?;
    stmt.query_row([path], stat_from_row)
        .optional()?
        .ok_or_else(|| FsError::NotFound(path.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn split_handles_top_level_and_nested() {
        assert_eq!(split("/a"), ("/", "a"));
        assert_eq!(split("/a/b"), ("/a", "b"));
        assert_eq!(basename("/a/b/c"), "c");
    }

    #[test]
    fn root_resolves_without_a_query() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        assert_eq!(resolve_id(&conn, "/").unwrap(), ROOT_ID);
        assert_eq!(resolve_info(&conn, "/").unwrap(), PathInfo::root());
    }

    #[test]
    fn missing_path_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        assert!(matches!(
            resolve_id(&conn, "/missing"),
            Err(FsError::NotFound(_))
        ));
    }
}
