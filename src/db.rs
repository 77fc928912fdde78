/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Owns the single storage-engine connection shared by every handler.
//!
//! Per §5 of the design, a single [`rusqlite::Connection`] is not safe to
//! drive from multiple threads at once. Rather than restrict the bridge to
//! one worker thread, the connection is wrapped in a process-wide
//! [`Mutex`] that every handler acquires for the duration of the call (the
//! "single handler-wide lock" option from the design's concurrency model).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::schema;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (creating if absent) the database file at `path` and ensures
    /// the schema from [`schema::init`] exists.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Acquires the process-wide lock for the duration of one handler call.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace;

    #[test]
    fn open_creates_schema_on_disk_and_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("fs.sqlite");

        {
            let db = Database::open(&db_path).unwrap();
            let conn = db.lock();
            namespace::mkdir(&conn, "/a", 0o755).unwrap();
        }

        let db = Database::open(&db_path).unwrap();
        let conn = db.lock();
        let info = crate::path_resolver::resolve_info(&conn, "/a").unwrap();
        assert!(crate::types::is_dir(info.mode));
    }
}
