//
// options.rs -- type-stated open/create builder
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! A small type-state builder over [`crate::store::Store`]'s associated
//! functions, so callers spell out intent (`.write()`) rather than
//! passing booleans.

use std::path::Path;

use crate::error::Result;
use crate::store::{ReadOnly, ReadWrite, Store};

/// Marker: the options have not been switched to write mode.
#[derive(Copy, Clone, Debug, Default)]
pub struct NotWrite;
/// Marker: the options will open or create a writable store.
#[derive(Copy, Clone, Debug, Default)]
pub struct Writable;

/// Builder for opening or creating a [`Store`].
#[derive(Copy, Clone, Debug, Default)]
pub struct OpenOptions<W = NotWrite> {
    write: W,
}

impl OpenOptions<NotWrite> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(self) -> OpenOptions<Writable> {
        OpenOptions { write: Writable }
    }

    /// Open an existing store read-only.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Store<ReadOnly>> {
        Store::<ReadOnly>::open(path)
    }
}

impl OpenOptions<Writable> {
    /// Open an existing store for read-write access.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Store<ReadWrite>> {
        Store::<ReadWrite>::open(path)
    }

    /// Create a new store at `path`, which must not already exist.
    /// `base == 0`/`prime == 0` fall back to the store's defaults.
    pub fn create<P: AsRef<Path>>(self, path: P, base: u32, prime: u32) -> Result<Store<ReadWrite>> {
        Store::<ReadWrite>::create(path, base, prime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn builder_creates_and_reopens() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        std::fs::remove_file(&path).ok();

        let mut store = OpenOptions::new().write().create(&path, 0, 31).unwrap();
        store.put("k", "v").unwrap();
        store.close().unwrap();

        let reopened = OpenOptions::new().open(&path).unwrap();
        assert_eq!(reopened.get::<_, String>("k").unwrap(), Some("v".to_string()));
        std::fs::remove_file(&path).ok();
    }
}
