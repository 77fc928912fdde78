/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Relation definitions and the fixed set of parameterized queries (C1).
//!
//! Every other component reaches the database through
//! [`rusqlite::Connection::prepare_cached`], keyed by SQL text: the engine
//! compiles each query once and every later call with the same text reuses
//! the cached, already-bound-and-reset statement. The query text below is
//! declared once so callers never repeat it.

use rusqlite::Connection;

const CREATE_TABLES_SQL: &str = "
create table if not exists files(
    id integer primary key autoincrement,
    nlink integer not null default 1,
    content blob,
    dev integer not null default 0,
    size integer not null default 0
);
create table if not exists paths(
    id integer primary key autoincrement,
    path text not null,
    parent_id integer not null default 0,
    uid integer not null,
    gid integer not null,
    mode integer not null,
    atime integer not null,
    mtime integer not null,
    ctime integer not null,
    file_id integer not null default 0
);
create unique index if not exists path_idx on paths(path);
create index if not exists file_id_idx on paths(file_id);
create index if not exists parent_id_idx on paths(parent_id);
";

pub const SELECT_PATH_INFO: &str =
    "select id, mode, file_id, ifnull((select size from files where files.id = paths.file_id), 0) as size \
     from paths where path = ?1";

pub const SELECT_STAT: &str =
    "select p.uid, p.gid, p.mode, p.atime, p.mtime, p.ctime, ifnull(f.size, 0), ifnull(f.nlink, 1) \
     from paths p left join files f on p.file_id = f.id where p.path = ?1";

pub const SELECT_CHILDREN: &str =
    "select p.path, p.uid, p.gid, p.mode, p.atime, p.mtime, p.ctime, ifnull(f.size, 0), ifnull(f.nlink, 1) \
     from paths p left join files f on p.file_id = f.id where p.parent_id = ?1 limit -1 offset ?2";

pub const COUNT_CHILDREN: &str = "select count(*) from paths where parent_id = ?1";

pub const INSERT_PATH: &str =
    "insert into paths(path, parent_id, uid, gid, mode, atime, mtime, ctime, file_id) \
     values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

pub const INSERT_FILE: &str = "insert into files(content, dev, size) values (?1, ?2, ?3)";

pub const DELETE_PATH_BY_ID: &str = "delete from paths where id = ?1";
pub const DELETE_FILE_BY_ID: &str = "delete from files where id = ?1";

pub const INCREMENT_NLINK: &str = "update files set nlink = nlink + 1 where id = ?1";
pub const DECREMENT_NLINK: &str = "update files set nlink = nlink - 1 where id = ?1 returning nlink";

pub const UPDATE_PATH_NAME: &str = "update paths set path = ?1 where id = ?2";
pub const UPDATE_PATH_MODE: &str = "update paths set mode = ?1 where id = ?2";
pub const UPDATE_PATH_OWNER: &str = "update paths set uid = ?1, gid = ?2 where id = ?3";
pub const UPDATE_PATH_TIMES: &str = "update paths set atime = ?1, mtime = ?2 where id = ?3";

pub const UPDATE_FILE_SIZE_AND_CONTENT: &str =
    "update files set content = ?1, size = ?2 where id = ?3";
pub const SELECT_FILE_CONTENT: &str = "select content from files where id = ?1";

/// Ensures both relations and their indices exist, and turns on the
/// write-ahead journal so readers never block a writer holding the process
/// mutex (see [`crate::db::Database`]).
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(CREATE_TABLES_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "select count(*) from sqlite_master where type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
