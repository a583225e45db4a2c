//
// lib.rs -- embedded hashed-BST key/value dictionary
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! A small embedded key/value dictionary, read-optimized rather than
//! write-optimized. Each key hashes into one of a fixed number of
//! buckets; each bucket is an independent binary search tree ordered by
//! key. [`Dict`] keeps everything in one arena-backed in-memory
//! structure; [`Store`] keeps the same layout in a single grow-only
//! file, with keys and values read straight off disk (or a memory map)
//! rather than cached.
//!
//! There is no deletion, no transactions, and no concurrent writers --
//! a [`Store`] opened for writing holds an exclusive advisory lock for
//! its whole session. [`Store::optimize`]/[`Dict::optimize`] rebuild a
//! bucket's tree to a depth bounded by `ceil(log2(n+1))`, which matters
//! because nothing else keeps a bucket balanced as keys are inserted in
//! whatever order the caller chooses.
//!
//! # Examples
//! ```
//! use xdict::Dict;
//!
//! let mut dict = Dict::new(0, 0);
//! dict.put("286755fad04869ca523320acce0dc6a4", "chal28griffin@example.com");
//! dict.put("4aacf9c858c82716ab0034320bd2efe9", "floribund@gmail.com");
//!
//! let value: Option<String> = dict.get("4aacf9c858c82716ab0034320bd2efe9");
//! assert_eq!(value, Some("floribund@gmail.com".to_string()));
//! ```
//!
//! A [`Store`] is opened the same way, but lives on disk:
//! ```
//! use xdict::{OpenOptions, Store, ReadWrite};
//! # use tempfile::tempdir;
//! # fn main() -> Result<(), String> {
//! #     let tmp_dir = tempdir().map_err(|e| e.to_string())?;
//! #     let path = tmp_dir.path().join("addressbook");
//! #     || -> xdict::Result<()> {
//! let mut store: Store<ReadWrite> = OpenOptions::new().write().create(&path, 0, 0)?;
//! store.put("286755fad04869ca523320acce0dc6a4", "chal28griffin@example.com")?;
//!
//! let value: Option<String> = store.get("286755fad04869ca523320acce0dc6a4")?;
//! assert_eq!(value, Some("chal28griffin@example.com".to_string()));
//! #         Ok(())
//! #     }().map_err(|e| e.to_string())
//! # }
//! ```

pub mod arena;
pub mod bytes;
pub mod error;
pub mod hashutil;
pub mod header;
pub mod io;
pub mod mem;
pub mod options;
pub mod record;
pub mod reshape;
pub mod ser;
pub mod store;

pub use bytes::{BytesRef, FromBytes, ToBytesRef};
pub use error::{Error, Result};
pub use mem::Dict;
pub use options::OpenOptions;
pub use record::MAX_KEY_LEN;
pub use store::{ReadOnly, ReadWrite, Store};
