//
// io.rs -- positioned I/O, advisory locking, and the mmap-or-file read path
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! Every read and write in this crate goes through `read_at`/`write_at`
//! rather than `seek` followed by `read`/`write`, so there is no window
//! in which two logically-unrelated operations could interleave a seek.

use fs2::FileExt;
use memmap2::Mmap;
use std::fs::File;
use std::io;

use crate::error::Result;

#[cfg(unix)]
fn pread(f: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt as _;
    f.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn pread(f: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt as _;
    let mut pos = offset;
    let mut filled = 0;
    while filled < buf.len() {
        let n = f.seek_read(&mut buf[filled..], pos)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short read at offset",
            ));
        }
        filled += n;
        pos += n as u64;
    }
    Ok(())
}

#[cfg(unix)]
fn pwrite(f: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt as _;
    f.write_all_at(buf, offset)
}

#[cfg(windows)]
fn pwrite(f: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt as _;
    let mut pos = offset;
    let mut written = 0;
    while written < buf.len() {
        let n = f.seek_write(&buf[written..], pos)?;
        written += n;
        pos += n as u64;
    }
    Ok(())
}

/// Either a plain file or a read-only memory map of one. `Store` reads
/// through whichever is active without caring which.
pub enum ReadSource {
    File(File),
    Mmap(Mmap),
}

impl ReadSource {
    /// Read `buf.len()` bytes starting at `offset`. Reads that run past
    /// the end of the available data are an error; callers clamp ranges
    /// to `fsize` before calling this.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        match self {
            ReadSource::File(f) => pread(f, buf, offset),
            ReadSource::Mmap(m) => {
                let start = offset as usize;
                let end = start
                    .checked_add(buf.len())
                    .filter(|&e| e <= m.len())
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::UnexpectedEof, "read past mapped region")
                    })?;
                buf.copy_from_slice(&m[start..end]);
                Ok(())
            }
        }
    }
}

/// Open `path` for read-only access, preferring a memory map and falling
/// back to positioned reads through the open file descriptor if mapping
/// fails (an empty file, for instance, cannot be mapped on some
/// platforms).
pub fn open_read_source(file: File) -> ReadSource {
    match unsafe { Mmap::map(&file) } {
        Ok(mmap) => ReadSource::Mmap(mmap),
        Err(_) => ReadSource::File(file),
    }
}

/// Read `buf.len()` bytes from `f` at `offset`.
pub fn read_at(f: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    pread(f, buf, offset)
}

/// Write all of `buf` to `f` at `offset`.
pub fn write_at(f: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    pwrite(f, buf, offset)
}

/// Acquire the exclusive advisory lock a writer must hold for the
/// session. Returns [`crate::error::Error::Locked`] if another writer
/// already holds it.
pub fn lock_exclusive(f: &File) -> Result<()> {
    f.try_lock_exclusive()
        .map_err(|_| crate::error::Error::Locked)
}

/// Release a previously acquired exclusive lock. Errors are swallowed by
/// callers that do this best-effort in a `Drop` impl.
pub fn unlock(f: &File) -> io::Result<()> {
    fs2::FileExt::unlock(f)
}
