//
// store.rs -- file-backed hashed-BST store
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! `Store<ReadOnly>`/`Store<ReadWrite>` are the file-backed counterpart
//! to [`crate::mem::Dict`], sharing the same bucket-of-BSTs layout on
//! disk. A write handle holds the file's exclusive advisory lock for its
//! whole session; a read handle prefers a memory map and falls back to
//! positioned reads if mapping the file fails.

use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use crate::bytes::{BytesRef, FromBytes, ToBytesRef};
use crate::error::{Error, Result};
use crate::hashutil::bucket_index;
use crate::header::{Header, FSIZE_FIELD_OFFSET, HEADER_LEN};
use crate::io::{self, ReadSource};
use crate::mem::Dict;
use crate::record::{self, RecordMeta, RecordPtr, MAX_KEY_LEN, RECORD_FIXED_LEN};
use crate::reshape::reshape;

/// Default hash seed, ported from `xdb_create`'s fallback when `base == 0`.
pub const DEFAULT_BASE: u32 = 0xF422F;
/// Default bucket count, ported from `xdb_create`'s fallback when
/// `prime == 0`. Deliberately different from [`crate::mem::DEFAULT_PRIME`]
/// -- the original source uses different literals at the two call sites.
pub const DEFAULT_PRIME: u32 = 2047;

/// Marker type: this store was opened read-only.
pub struct ReadOnly;
/// Marker type: this store holds the exclusive write lock.
pub struct ReadWrite;

enum IoMode {
    Read(ReadSource),
    Write(File),
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// The pointer field that must be rewritten to link in a new or relocated
/// record: either a root-table slot, or a parent record's `left`/`right`
/// field. Threaded through descent instead of a parent pointer, since
/// records never carry a back-reference.
#[derive(Clone, Copy)]
enum ParentSlot {
    RootTable(u32),
    Record { offset: u32, side: Side },
}

impl ParentSlot {
    fn absolute_offset(&self, header: &Header) -> u64 {
        match *self {
            ParentSlot::RootTable(i) => header.root_slot_offset(i),
            ParentSlot::Record { offset, side } => {
                offset as u64
                    + match side {
                        Side::Left => 0,
                        Side::Right => 8,
                    }
            }
        }
    }
}

enum Descent {
    Found {
        slot: ParentSlot,
        ptr: RecordPtr,
        meta: RecordMeta,
    },
    NotFound {
        slot: ParentSlot,
    },
}

/// A file-backed hashed binary-search-tree store.
pub struct Store<Mode> {
    io: IoMode,
    header: Header,
    _mode: PhantomData<Mode>,
}

impl<Mode> Store<Mode> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        match &self.io {
            IoMode::Read(rs) => rs.read_at(buf, offset).map_err(Error::Io),
            IoMode::Write(f) => io::read_at(f, buf, offset).map_err(Error::Io),
        }
    }

    fn read_ptr(&self, slot: ParentSlot) -> Result<RecordPtr> {
        let mut buf = [0u8; 8];
        self.read_exact_at(&mut buf, slot.absolute_offset(&self.header))?;
        Ok(RecordPtr::decode(&buf))
    }

    fn read_meta(&self, ptr: RecordPtr) -> Result<RecordMeta> {
        if ptr.length < RECORD_FIXED_LEN {
            return Err(Error::Corrupt("record pointer shorter than fixed header"));
        }
        if ptr.offset as u64 + ptr.length as u64 > self.header.fsize as u64 {
            return Err(Error::Corrupt("record pointer extends past fsize"));
        }
        let mut header_buf = [0u8; 17];
        self.read_exact_at(&mut header_buf, ptr.offset as u64)?;
        RecordMeta::decode(ptr, &header_buf)
    }

    fn read_key(&self, meta: &RecordMeta) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; meta.klen as usize];
        self.read_exact_at(&mut buf, meta.key_offset)?;
        Ok(buf)
    }

    fn read_value(&self, meta: &RecordMeta) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; meta.value_len as usize];
        self.read_exact_at(&mut buf, meta.value_offset)?;
        Ok(buf)
    }

    fn find(&self, key: &[u8]) -> Result<Descent> {
        let bucket = bucket_index(self.header.base, self.header.prime, key);
        let mut slot = ParentSlot::RootTable(bucket);
        loop {
            let ptr = self.read_ptr(slot)?;
            if ptr.is_null() {
                return Ok(Descent::NotFound { slot });
            }
            let meta = self.read_meta(ptr)?;
            let rkey = self.read_key(&meta)?;
            slot = match key.cmp(rkey.as_slice()) {
                std::cmp::Ordering::Equal => return Ok(Descent::Found { slot, ptr, meta }),
                std::cmp::Ordering::Less => ParentSlot::Record {
                    offset: ptr.offset,
                    side: Side::Left,
                },
                std::cmp::Ordering::Greater => ParentSlot::Record {
                    offset: ptr.offset,
                    side: Side::Right,
                },
            };
        }
    }

    fn collect_bucket(&self, bucket: u32) -> Result<Vec<(RecordPtr, RecordMeta)>> {
        let mut out = Vec::new();
        let mut stack = vec![self.read_ptr(ParentSlot::RootTable(bucket))?];
        while let Some(ptr) = stack.pop() {
            if ptr.is_null() {
                continue;
            }
            let meta = self.read_meta(ptr)?;
            stack.push(meta.left);
            stack.push(meta.right);
            out.push((ptr, meta));
        }
        Ok(out)
    }

    /// Look up `key`. Corruption encountered while descending is treated
    /// the same as "not found"; only a genuine I/O failure propagates.
    pub fn get<K: ToBytesRef + ?Sized, V: FromBytes>(&self, key: &K) -> Result<Option<V>> {
        let key_ref = key.to_bytes_ref();
        let key = key_ref.as_ref();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Ok(None);
        }
        match self.find(key) {
            Ok(Descent::Found { meta, .. }) => Ok(Some(V::from_bytes(self.read_value(&meta)?))),
            Ok(Descent::NotFound { .. }) => Ok(None),
            Err(Error::Corrupt(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Total number of live entries across all buckets.
    pub fn len(&self) -> Result<usize> {
        let mut total = 0;
        for bucket in 0..self.header.prime {
            total += self.collect_bucket(bucket)?.len();
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Copy every entry into `into` (or a fresh dictionary sharing this
    /// store's `base`/`prime` if `None`), returning the populated
    /// dictionary.
    pub fn to_dict(&self, into: Option<Dict>) -> Result<Dict> {
        let mut dict = into.unwrap_or_else(|| Dict::new(self.header.base, self.header.prime));
        for bucket in 0..self.header.prime {
            for (_, meta) in self.collect_bucket(bucket)? {
                let key = self.read_key(&meta)?;
                let value = self.read_value(&meta)?;
                dict.put(&BytesRef::Reference(&key), &BytesRef::Reference(&value));
            }
        }
        Ok(dict)
    }

    /// Collect every `(key, value)` pair. Eager, not lazy: the whole
    /// store is walked up front.
    pub fn iter(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for bucket in 0..self.header.prime {
            for (_, meta) in self.collect_bucket(bucket)? {
                out.push((self.read_key(&meta)?, self.read_value(&meta)?));
            }
        }
        Ok(out)
    }

    pub fn base(&self) -> u32 {
        self.header.base
    }

    pub fn prime(&self) -> u32 {
        self.header.prime
    }

    /// Current file size in bytes, as tracked by this handle. Monotonic
    /// across the life of a writer; authoritative on disk only at `close`.
    pub fn fsize(&self) -> u32 {
        self.header.fsize
    }

    fn inorder_walk(&self, ptr: RecordPtr, out: &mut Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }
        let meta = self.read_meta(ptr)?;
        self.inorder_walk(meta.left, out)?;
        out.push((self.read_key(&meta)?, self.read_value(&meta)?));
        self.inorder_walk(meta.right, out)?;
        Ok(())
    }

    /// In-order traversal of a single bucket's tree: ascending by key
    /// when the BST invariant holds. Exposed for testing that invariant.
    pub fn bucket_inorder(&self, bucket: u32) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        let root = self.read_ptr(ParentSlot::RootTable(bucket))?;
        self.inorder_walk(root, &mut out)?;
        Ok(out)
    }

    fn depth_of(&self, ptr: RecordPtr) -> Result<usize> {
        if ptr.is_null() {
            return Ok(0);
        }
        let meta = self.read_meta(ptr)?;
        let l = self.depth_of(meta.left)?;
        let r = self.depth_of(meta.right)?;
        Ok(1 + l.max(r))
    }

    /// Depth of each bucket's tree (0 for an empty bucket). Exposed for
    /// testing the depth bound `optimize` guarantees.
    pub fn bucket_depths(&self) -> Result<Vec<usize>> {
        let mut out = Vec::with_capacity(self.header.prime as usize);
        for bucket in 0..self.header.prime {
            let root = self.read_ptr(ParentSlot::RootTable(bucket))?;
            out.push(self.depth_of(root)?);
        }
        Ok(out)
    }
}

impl Store<ReadOnly> {
    /// Open an existing store read-only, memory-mapping it when possible.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let header = read_and_check_header(&file)?;
        let source = io::open_read_source(file);
        Ok(Store {
            io: IoMode::Read(source),
            header,
            _mode: PhantomData,
        })
    }
}

impl Store<ReadWrite> {
    /// Create a new store at `path`, which must not already exist.
    /// `base == 0`/`prime == 0` fall back to [`DEFAULT_BASE`]/
    /// [`DEFAULT_PRIME`].
    pub fn create<P: AsRef<Path>>(path: P, base: u32, prime: u32) -> Result<Self> {
        let base = if base == 0 { DEFAULT_BASE } else { base };
        let prime = if prime == 0 { DEFAULT_PRIME } else { prime };

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        io::lock_exclusive(&file)?;

        let header = Header {
            base,
            prime,
            fsize: (HEADER_LEN + prime as u64 * 8) as u32,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf)?;
        io::write_at(&file, &buf, 0)?;
        file.set_len(header.fsize as u64)?;

        Ok(Store {
            io: IoMode::Write(file),
            header,
            _mode: PhantomData,
        })
    }

    /// Open an existing store for read-write access, taking its
    /// exclusive advisory lock for the session.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
        let header = read_and_check_header(&file)?;
        io::lock_exclusive(&file)?;
        Ok(Store {
            io: IoMode::Write(file),
            header,
            _mode: PhantomData,
        })
    }

    fn file(&self) -> &File {
        match &self.io {
            IoMode::Write(f) => f,
            IoMode::Read(_) => unreachable!("Store<ReadWrite> always holds IoMode::Write"),
        }
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        io::write_at(self.file(), buf, offset).map_err(Error::Io)
    }

    fn write_ptr(&self, slot: ParentSlot, ptr: RecordPtr) -> Result<()> {
        let mut buf = Vec::with_capacity(8);
        ptr.encode(&mut buf);
        self.write_at(&buf, slot.absolute_offset(&self.header))
    }

    fn append(&mut self, bytes: &[u8]) -> Result<RecordPtr> {
        let offset = self.header.fsize;
        self.write_at(bytes, offset as u64)?;
        self.header.fsize += bytes.len() as u32;
        Ok(RecordPtr {
            offset,
            length: bytes.len() as u32,
        })
    }

    /// Insert or overwrite `key` with `value`. A no-op for an empty key
    /// or a key longer than [`MAX_KEY_LEN`] bytes, and also a no-op for a
    /// zero-length value against a key that doesn't already exist -- it
    /// never creates a record just to hold nothing.
    ///
    /// An overwrite that fits within the existing record's length is
    /// applied in place, patching only the owning pointer's length field
    /// if the new value is shorter. An overwrite that grows the value, or
    /// a brand-new key, is appended to the end of the file and linked in
    /// with a single pointer rewrite; the displaced bytes, if any, are
    /// never reclaimed.
    pub fn put<K: ToBytesRef + ?Sized, V: ToBytesRef + ?Sized>(
        &mut self,
        key: &K,
        value: &V,
    ) -> Result<()> {
        let key_ref = key.to_bytes_ref();
        let key = key_ref.as_ref();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Ok(());
        }
        let value_ref = value.to_bytes_ref();
        let value = value_ref.as_ref();

        match self.find(key)? {
            Descent::Found { slot, ptr, meta } => {
                if value.len() as u32 <= meta.value_len {
                    self.write_at(value, meta.value_offset)?;
                    if (value.len() as u32) < meta.value_len {
                        let shrink = meta.value_len - value.len() as u32;
                        self.write_ptr(
                            slot,
                            RecordPtr {
                                offset: ptr.offset,
                                length: ptr.length - shrink,
                            },
                        )?;
                    }
                } else {
                    let key_bytes = self.read_key(&meta)?;
                    let bytes =
                        record::encode_with_children(meta.left, meta.right, &key_bytes, value);
                    let new_ptr = self.append(&bytes)?;
                    self.write_ptr(slot, new_ptr)?;
                }
            }
            Descent::NotFound { slot } => {
                if value.is_empty() {
                    return Ok(());
                }
                let bytes = record::encode_new(key, value);
                let new_ptr = self.append(&bytes)?;
                self.write_ptr(slot, new_ptr)?;
            }
        }
        Ok(())
    }

    /// Rebuild every bucket with more than two nodes into a depth-bounded
    /// tree (see [`crate::reshape`]), rewriting only `left`/`right`
    /// pointer fields -- no record payload is moved.
    pub fn optimize(&mut self) -> Result<()> {
        for bucket in 0..self.header.prime {
            let entries = self.collect_bucket(bucket)?;
            if entries.len() <= 2 {
                continue;
            }

            let mut keyed = Vec::with_capacity(entries.len());
            for (ptr, meta) in entries {
                let key = self.read_key(&meta)?;
                keyed.push((key, ptr));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            let ptrs: Vec<RecordPtr> = keyed.into_iter().map(|(_, p)| p).collect();

            let reader: &Store<ReadWrite> = self;
            let mut write_err: Option<Error> = None;
            let root = reshape(&ptrs, |ptr, left, right| {
                if write_err.is_some() {
                    return;
                }
                let mut buf = Vec::with_capacity(16);
                left.unwrap_or(RecordPtr::NULL).encode(&mut buf);
                right.unwrap_or(RecordPtr::NULL).encode(&mut buf);
                if let Err(e) = reader.write_at(&buf, ptr.offset as u64) {
                    write_err = Some(e);
                }
            });
            if let Some(e) = write_err {
                return Err(e);
            }
            self.write_ptr(ParentSlot::RootTable(bucket), root)?;
        }
        Ok(())
    }

    fn flush_header(&self) -> Result<()> {
        let mut buf = Vec::new();
        crate::ser::write_u32(&mut buf, self.header.fsize).map_err(Error::Io)?;
        self.write_at(&buf, FSIZE_FIELD_OFFSET)
    }

    /// Flush the `fsize` header field and release the exclusive lock.
    pub fn close(self) -> Result<()> {
        self.flush_header()?;
        io::unlock(self.file()).map_err(Error::Io)
    }
}

impl Drop for Store<ReadWrite> {
    fn drop(&mut self) {
        let _ = self.flush_header();
        let _ = io::unlock(self.file());
    }
}

fn read_and_check_header(file: &File) -> Result<Header> {
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(Error::NotRegularFile);
    }
    if metadata.len() < HEADER_LEN {
        return Err(Error::Truncated);
    }
    let mut buf = vec![0u8; HEADER_LEN as usize];
    io::read_at(file, &mut buf, 0)?;
    let header = Header::read_from(&buf[..])?;
    if header.fsize as u64 != metadata.len() {
        return Err(Error::SizeMismatch {
            header_fsize: header.fsize,
            actual: metadata.len(),
        });
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn scratch_path() -> std::path::PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        // the file must not exist yet for Store::create's exclusive create
        drop(tmp);
        std::fs::remove_file(&path).ok();
        path
    }

    #[test]
    fn create_then_put_then_get() {
        let path = scratch_path();
        let mut store = Store::<ReadWrite>::create(&path, 0, 31).unwrap();
        store.put("hello", "world").unwrap();
        assert_eq!(store.get::<_, String>("hello").unwrap(), Some("world".to_string()));
        assert_eq!(store.get::<_, String>("missing").unwrap(), None);
        store.close().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_value_on_absent_key_is_a_no_op() {
        let path = scratch_path();
        let mut store = Store::<ReadWrite>::create(&path, 0, 31).unwrap();
        let fsize_before = store.fsize();
        store.put("ghost", "").unwrap();
        assert_eq!(store.fsize(), fsize_before);
        assert_eq!(store.get::<_, Vec<u8>>("ghost").unwrap(), None);
        store.close().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn in_place_shrink_patches_pointer_length() {
        let path = scratch_path();
        let mut store = Store::<ReadWrite>::create(&path, 0, 31).unwrap();
        store.put("k", "a long value").unwrap();
        store.put("k", "short").unwrap();
        assert_eq!(store.get::<_, String>("k").unwrap(), Some("short".to_string()));
        store.close().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn grow_appends_and_relinks() {
        let path = scratch_path();
        let mut store = Store::<ReadWrite>::create(&path, 0, 31).unwrap();
        store.put("k", "short").unwrap();
        let fsize_before = store.header.fsize;
        store.put("k", "a much longer replacement value").unwrap();
        assert!(store.header.fsize > fsize_before);
        assert_eq!(
            store.get::<_, String>("k").unwrap(),
            Some("a much longer replacement value".to_string())
        );
        store.close().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reopen_after_close_preserves_data() {
        let path = scratch_path();
        let mut store = Store::<ReadWrite>::create(&path, 0, 31).unwrap();
        for i in 0..20 {
            store.put(&format!("k{i}"), &format!("v{i}")).unwrap();
        }
        store.close().unwrap();

        let reopened = Store::<ReadOnly>::open(&path).unwrap();
        for i in 0..20 {
            assert_eq!(
                reopened.get::<_, String>(format!("k{i}").as_str()).unwrap(),
                Some(format!("v{i}"))
            );
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn optimize_preserves_all_entries() {
        let path = scratch_path();
        let mut store = Store::<ReadWrite>::create(&path, 0, 3).unwrap();
        for i in 0..60 {
            store.put(&format!("k{i:03}"), &format!("v{i}")).unwrap();
        }
        store.optimize().unwrap();
        assert_eq!(store.len().unwrap(), 60);
        for i in 0..60 {
            assert_eq!(
                store.get::<_, String>(format!("k{i:03}").as_str()).unwrap(),
                Some(format!("v{i}"))
            );
        }
        store.close().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn to_dict_round_trips() {
        let path = scratch_path();
        let mut store = Store::<ReadWrite>::create(&path, 0, 31).unwrap();
        store.put("a", "1").unwrap();
        store.put("b", "2").unwrap();
        let dict = store.to_dict(None).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get::<_, String>("a"), Some("1".to_string()));
        store.close().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn second_writer_is_locked_out() {
        let path = scratch_path();
        let _store = Store::<ReadWrite>::create(&path, 0, 31).unwrap();
        let second = Store::<ReadWrite>::open(&path);
        assert!(matches!(second, Err(Error::Locked)));
        std::fs::remove_file(&path).ok();
    }
}
