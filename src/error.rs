//
// error.rs -- crate error type
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

use std::{fmt::Display, fmt::Formatter, io};

#[derive(Debug)]
pub enum Error {
    /// IO error.
    Io(io::Error),
    /// Header `tag` field was not `"XDB"`.
    BadTag,
    /// Header `ver` field did not match the version this library writes.
    BadVersion {
        /// Version byte found in the file.
        found: u8,
        /// Version byte this library expects.
        expected: u8,
    },
    /// Header `check` float was not the `3.14` sanity marker.
    BadCheck,
    /// Header `fsize` disagreed with the file's actual size.
    SizeMismatch {
        /// `fsize` recorded in the header.
        header_fsize: u32,
        /// Actual file size on disk.
        actual: u64,
    },
    /// The path did not refer to a regular file.
    NotRegularFile,
    /// The file is too small to hold a header.
    Truncated,
    /// A writer already holds the exclusive advisory lock.
    Locked,
    /// A record pointer, record length, or root-table index referred
    /// outside the valid data region, or a record's own fields were
    /// internally inconsistent.
    Corrupt(&'static str),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{self:?}")
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// The crate result type.
pub type Result<T> = std::result::Result<T, Error>;
