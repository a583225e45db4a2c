//
// header.rs -- XDB file header
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! The fixed 32-byte header at the start of every XDB file:
//! `tag(3) ver(1) base(4) prime(4) fsize(4) check(4) unused(12)`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::ser::CHECK_FLOAT;

/// The fixed tag string every XDB file starts with.
pub const TAG: &[u8; 3] = b"XDB";

/// Version byte: high 3 bits major, low 5 bits minor. `34 == 1<<5 | 2`.
pub const VERSION: u8 = 34;

/// Total on-disk size of the header.
pub const HEADER_LEN: u64 = 32;

/// Byte offset of the `fsize` field within the header, used by
/// [`crate::store::Store`] to patch just that field on close without
/// rewriting the whole header.
pub const FSIZE_FIELD_OFFSET: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Seed for the hash fold; also the default root for successive folds.
    pub base: u32,
    /// Number of buckets in the root table.
    pub prime: u32,
    /// Total file size, in bytes. Kept authoritative only in memory while
    /// the store is open for writing; persisted to disk on close.
    pub fsize: u32,
}

impl Header {
    /// Size in bytes of the root pointer table that immediately follows
    /// the header.
    pub fn root_table_len(&self) -> u64 {
        self.prime as u64 * 8
    }

    /// Byte offset of the first record in the grow-only data region.
    pub fn data_start(&self) -> u64 {
        HEADER_LEN + self.root_table_len()
    }

    /// Absolute byte offset of bucket `index`'s 8-byte root pointer slot.
    pub fn root_slot_offset(&self, index: u32) -> u64 {
        HEADER_LEN + index as u64 * 8
    }

    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut tag = [0u8; 3];
        r.read_exact(&mut tag)?;
        if &tag != TAG {
            return Err(Error::BadTag);
        }

        let ver = r.read_u8()?;
        if ver != VERSION {
            return Err(Error::BadVersion {
                found: ver,
                expected: VERSION,
            });
        }

        let base = r.read_u32::<LittleEndian>()?;
        let prime = r.read_u32::<LittleEndian>()?;
        let fsize = r.read_u32::<LittleEndian>()?;

        let check = r.read_f32::<LittleEndian>()?;
        if (check - CHECK_FLOAT).abs() > f32::EPSILON {
            return Err(Error::BadCheck);
        }

        let mut unused = [0u8; 12];
        r.read_exact(&mut unused)?;

        Ok(Header { base, prime, fsize })
    }

    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        w.write_all(TAG)?;
        w.write_u8(VERSION)?;
        w.write_u32::<LittleEndian>(self.base)?;
        w.write_u32::<LittleEndian>(self.prime)?;
        w.write_u32::<LittleEndian>(self.fsize)?;
        w.write_f32::<LittleEndian>(CHECK_FLOAT)?;
        w.write_all(&[0u8; 12])?;
        Ok(())
    }
}
