//
// record.rs -- on-disk record and pointer layout
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! A file record is `left(8) right(8) klen(1) key(klen) value(rest)`.
//! `left`/`right` are 8-byte pointers: a 4-byte offset and a 4-byte
//! length, little-endian. A record's own length is never stored inside
//! the record -- only whoever points to it (the root table, or a
//! parent's `left`/`right` field) knows how many bytes it occupies. That
//! means a pointer's length can outlive the record's logical size after
//! an in-place value shrink, leaving dead space at the tail of the
//! record; nothing ever reclaims it.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Maximum key length, inclusive.
pub const MAX_KEY_LEN: usize = 240;

/// Size of the fixed part of a record: two 8-byte pointers plus `klen`.
pub const RECORD_FIXED_LEN: u32 = 17;

/// A pointer to a record: `(offset, length)`. `length == 0` is the null
/// pointer regardless of `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordPtr {
    pub offset: u32,
    pub length: u32,
}

impl RecordPtr {
    pub const NULL: RecordPtr = RecordPtr {
        offset: 0,
        length: 0,
    };

    pub fn is_null(&self) -> bool {
        self.length == 0
    }

    pub fn decode(buf: &[u8]) -> RecordPtr {
        let mut r = buf;
        RecordPtr {
            offset: r.read_u32::<LittleEndian>().expect("8-byte pointer slice"),
            length: r.read_u32::<LittleEndian>().expect("8-byte pointer slice"),
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.write_u32::<LittleEndian>(self.offset).unwrap();
        buf.write_u32::<LittleEndian>(self.length).unwrap();
    }
}

/// The decoded fixed part of a record, plus the absolute file offsets of
/// its key and value bytes (not read yet).
#[derive(Debug, Clone, Copy)]
pub struct RecordMeta {
    pub left: RecordPtr,
    pub right: RecordPtr,
    pub klen: u8,
    pub key_offset: u64,
    pub value_offset: u64,
    pub value_len: u32,
}

impl RecordMeta {
    /// Decode the fixed 17-byte header of a record given the pointer that
    /// referenced it. `header` must be exactly the first 17 bytes at
    /// `ptr.offset`.
    pub fn decode(ptr: RecordPtr, header: &[u8; 17]) -> Result<RecordMeta> {
        let left = RecordPtr::decode(&header[0..8]);
        let right = RecordPtr::decode(&header[8..16]);
        let klen = header[16];

        let fixed_and_key = RECORD_FIXED_LEN + klen as u32;
        if ptr.length < fixed_and_key {
            return Err(Error::Corrupt("record pointer shorter than key"));
        }

        let key_offset = ptr.offset as u64 + RECORD_FIXED_LEN as u64;
        let value_offset = key_offset + klen as u64;
        let value_len = ptr.length - fixed_and_key;

        Ok(RecordMeta {
            left,
            right,
            klen,
            key_offset,
            value_offset,
            value_len,
        })
    }
}

/// Build the on-disk bytes for a brand-new record: `left`/`right` both
/// null, followed by `key` and `value`.
pub fn encode_new(key: &[u8], value: &[u8]) -> Vec<u8> {
    encode_with_children(RecordPtr::NULL, RecordPtr::NULL, key, value)
}

/// Build the on-disk bytes for a record with explicit `left`/`right`
/// pointers (used when relocating a record on grow, preserving its
/// existing children).
pub fn encode_with_children(left: RecordPtr, right: RecordPtr, key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_FIXED_LEN as usize + key.len() + value.len());
    left.encode(&mut buf);
    right.encode(&mut buf);
    buf.push(key.len() as u8);
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    buf
}
