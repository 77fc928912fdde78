/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

/// Errors raised by the core filesystem operations (C2-C5).
///
/// This is the one vocabulary the path resolver, metadata, namespace and
/// content components speak; [`FsError::to_errno`] is the single place that
/// translates it into the negated POSIX code the bridge expects.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("no such file or directory: '{0}'")]
    NotFound(String),
    #[error("already exists: '{0}'")]
    Exists(String),
    #[error("is a directory: '{0}'")]
    IsDir(String),
    #[error("not a directory: '{0}'")]
    NotDir(String),
    #[error("directory not empty: '{0}'")]
    NotEmpty(String),
    #[error("operation not supported: '{0}'")]
    NotSupported(String),
    #[error("storage error: {0}")]
    Io(#[from] rusqlite::Error),
}

impl FsError {
    /// Negated POSIX error code for the bridge's `Result<_, libc::c_int>` contract.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Exists(_) => libc::EEXIST,
            FsError::IsDir(_) => libc::EISDIR,
            FsError::NotDir(_) => libc::ENOTDIR,
            FsError::NotEmpty(_) => libc::ENOTEMPTY,
            FsError::NotSupported(_) => libc::ENOTSUP,
            FsError::Io(_) => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_enoent() {
        assert_eq!(FsError::NotFound("/a".into()).to_errno(), libc::ENOENT);
    }

    #[test]
    fn not_empty_maps_to_enotempty() {
        assert_eq!(FsError::NotEmpty("/a".into()).to_errno(), libc::ENOTEMPTY);
    }

    #[test]
    fn io_maps_to_eio() {
        let err = FsError::Io(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.to_errno(), libc::EIO);
    }
}
