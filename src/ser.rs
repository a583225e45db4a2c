//
// ser.rs -- on-disk integer/float encoding
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! All multi-byte fields in an XDB file are fixed-width, little-endian.
//! Native-width ("whatever the writer's `size_t` happened to be") is
//! explicitly not supported -- see the header module for the rationale.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

/// The `3.14` sanity float written into every header and checked on open.
pub const CHECK_FLOAT: f32 = 3.14;

/// Read a little-endian `u32` straight from a reader.
pub fn read_u32<R: io::Read>(r: &mut R) -> io::Result<u32> {
    r.read_u32::<LittleEndian>()
}

/// Write a little-endian `u32` straight to a writer.
pub fn write_u32<W: io::Write>(w: &mut W, val: u32) -> io::Result<()> {
    w.write_u32::<LittleEndian>(val)
}
