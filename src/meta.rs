/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Attribute reads/writes: getattr, chmod, chown, utimens, readdir (C3).

use rusqlite::Connection;

use crate::error::Result;
use crate::path_resolver::{self, basename};
use crate::schema;
use crate::types::{now_secs, Stat, ROOT_ID};

pub fn getattr(conn: &Connection, path: &str) -> Result<Stat> {
    path_resolver::resolve_stat(conn, path)
}

/// Preserves the stored type bits: the incoming mode is OR-ed into the
/// existing one so the low (permission) bits of the request dominate
/// without ever clearing the high (type) bits.
pub fn chmod(conn: &Connection, path: &str, mode: u32) -> Result<()> {
    let info = path_resolver::resolve_info(conn, path)?;
    conn.prepare_cached(schema::UPDATE_PATH_MODE)?
        .execute(rusqlite::params![info.mode | mode, info.id])?;
    Ok(())
}

/// Updates owner/group on the namespace entry's own row (its `paths.id`,
/// not `file_id` — ownership is a property of the link, not the shared
/// content; see DESIGN.md item 4).
pub fn chown(conn: &Connection, path: &str, uid: u32, gid: u32) -> Result<()> {
    let info = path_resolver::resolve_info(conn, path)?;
    conn.prepare_cached(schema::UPDATE_PATH_OWNER)?
        .execute(rusqlite::params![uid, gid, info.id])?;
    Ok(())
}

/// Stores whole seconds, matching every other timestamp column.
pub fn utimens(conn: &Connection, path: &str, atime: Option<i64>, mtime: Option<i64>) -> Result<()> {
    let info = path_resolver::resolve_info(conn, path)?;
    let now = now_secs();
    conn.prepare_cached(schema::UPDATE_PATH_TIMES)?
        .execute(rusqlite::params![
            atime.unwrap_or(now),
            mtime.unwrap_or(now),
            info.id
        ])?;
    Ok(())
}

/// A directory handle is just its resolved id; readdir streams by
/// `parent_id` so there is nothing else to cache.
pub fn opendir(conn: &Connection, path: &str) -> Result<i64> {
    let info = path_resolver::resolve_info(conn, path)?;
    Ok(info.id)
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub stat: Stat,
}

/// Streams children of `handle` (a directory id), skipping the first
/// `offset` rows. Emits synthetic `.`/`..` only at `offset == 0`.
pub fn readdir(conn: &Connection, handle: i64, offset: i64) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    if offset == 0 {
        entries.push(DirEntry {
            name: ".".to_owned(),
            stat: Stat::root(),
        });
        entries.push(DirEntry {
            name: "..".to_owned(),
            stat: Stat::root(),
        });
    }
    let mut stmt = conn.prepare_cached(schema::SELECT_CHILDREN)?;
    let rows = stmt.query_map(rusqlite::params![handle, offset], |row| {
        let path: String = row.get(0)?;
        Ok((
            path,
            Stat {
                uid: row.get(1)?,
                gid: row.get(2)?,
                mode: row.get(3)?,
                atime: row.get(4)?,
                mtime: row.get(5)?,
                ctime: row.get(6)?,
                size: row.get::<_, i64>(7)? as u64,
                nlink: row.get(8)?,
            },
        ))
    })?;
    for row in rows {
        let (path, stat) = row?;
        entries.push(DirEntry {
            name: basename(&path).to_owned(),
            stat,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::namespace;
    use crate::types;

    #[test]
    fn chmod_preserves_type_bits() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        namespace::mkdir(&conn, "/a", 0o755).unwrap();
        chmod(&conn, "/a", 0o700).unwrap();
        let stat = getattr(&conn, "/a").unwrap();
        assert!(types::is_dir(stat.mode));
        assert_eq!(stat.mode & 0o777, 0o755 | 0o700);
    }

    #[test]
    fn readdir_lists_every_child_once() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        namespace::mkdir(&conn, "/a", 0o755).unwrap();
        namespace::mknod(&conn, "/a/one", 0o644, 0).unwrap();
        namespace::mknod(&conn, "/a/two", 0o644, 0).unwrap();
        let handle = opendir(&conn, "/a").unwrap();
        let entries = readdir(&conn, handle, 0).unwrap();
        let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec![".", "..", "one", "two"]);
    }

    #[test]
    fn readdir_offset_skips_leading_entries_and_dotdirs() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();
        namespace::mkdir(&conn, "/a", 0o755).unwrap();
        namespace::mknod(&conn, "/a/one", 0o644, 0).unwrap();
        let handle = opendir(&conn, "/a").unwrap();
        let entries = readdir(&conn, handle, 1).unwrap();
        assert!(entries.iter().all(|e| e.name != "." && e.name != ".."));
    }

    #[test]
    fn root_is_its_own_synthesized_entry() {
        assert_eq!(ROOT_ID, 0);
        let stat = Stat::root();
        assert!(types::is_dir(stat.mode));
    }
}
