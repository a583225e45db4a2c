//
// mem.rs -- in-memory hashed-BST dictionary
//
// Copyright (c) 2019-2024 Jeff Garzik
//
// This file is part of the gdbm-native software project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT

//! `Dict` hashes each key into one of `prime` buckets, each an
//! independent binary search tree ordered by key. All node and key/value
//! storage lives in one [`Arena`], freed in a single shot when the
//! `Dict` drops.

use crate::arena::{Arena, Handle};
use crate::bytes::{BytesRef, FromBytes, ToBytesRef};
use crate::hashutil::bucket_index;
use crate::record::MAX_KEY_LEN;
use crate::reshape::reshape;

/// Default hash seed, ported from `xtree_new`'s fallback when `base == 0`.
pub const DEFAULT_BASE: u32 = 0xF422F;
/// Default bucket count, ported from `xtree_new`'s fallback when `prime == 0`.
pub const DEFAULT_PRIME: u32 = 31;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct NodeId(u32);

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

struct Node {
    key: Handle,
    value: Handle,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// An in-memory hashed binary-search-tree dictionary.
pub struct Dict {
    arena: Arena,
    base: u32,
    prime: u32,
    nodes: Vec<Node>,
    roots: Vec<Option<NodeId>>,
    count: usize,
}

impl Dict {
    /// Create an empty dictionary. `base == 0` and `prime == 0` fall back
    /// to [`DEFAULT_BASE`]/[`DEFAULT_PRIME`], matching the original
    /// `xtree_new`'s argument handling.
    pub fn new(base: u32, prime: u32) -> Self {
        let base = if base == 0 { DEFAULT_BASE } else { base };
        let prime = if prime == 0 { DEFAULT_PRIME } else { prime };
        Dict {
            arena: Arena::new(),
            base,
            prime,
            nodes: Vec::new(),
            roots: vec![None; prime as usize],
            count: 0,
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn prime(&self) -> u32 {
        self.prime
    }

    /// Total number of live entries across all buckets.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Insert or overwrite `key` with `value`. A no-op for an empty key
    /// or a key longer than [`MAX_KEY_LEN`] bytes, matching
    /// `xtree_nput`'s silent rejection.
    pub fn put<K: ToBytesRef + ?Sized, V: ToBytesRef + ?Sized>(&mut self, key: &K, value: &V) {
        let key = key.to_bytes_ref();
        let key = key.as_ref();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return;
        }
        let value = value.to_bytes_ref();
        let value = value.as_ref();

        let bucket = bucket_index(self.base, self.prime, key) as usize;
        let mut cur = self.roots[bucket];
        let mut parent: Option<(NodeId, Side)> = None;

        loop {
            match cur {
                None => {
                    let key_handle = self.arena.dup_bytes(key);
                    let value_handle = self.arena.dup_bytes(value);
                    let id = NodeId(self.nodes.len() as u32);
                    self.nodes.push(Node {
                        key: key_handle,
                        value: value_handle,
                        left: None,
                        right: None,
                    });
                    match parent {
                        None => self.roots[bucket] = Some(id),
                        Some((p, Side::Left)) => self.nodes[p.0 as usize].left = Some(id),
                        Some((p, Side::Right)) => self.nodes[p.0 as usize].right = Some(id),
                    }
                    self.count += 1;
                    return;
                }
                Some(id) => {
                    let node_key = self.arena.get(self.nodes[id.0 as usize].key).to_vec();
                    match key.cmp(node_key.as_slice()) {
                        std::cmp::Ordering::Equal => {
                            let value_handle = self.arena.dup_bytes(value);
                            self.nodes[id.0 as usize].value = value_handle;
                            return;
                        }
                        std::cmp::Ordering::Less => {
                            parent = Some((id, Side::Left));
                            cur = self.nodes[id.0 as usize].left;
                        }
                        std::cmp::Ordering::Greater => {
                            parent = Some((id, Side::Right));
                            cur = self.nodes[id.0 as usize].right;
                        }
                    }
                }
            }
        }
    }

    /// Look up `key`. Returns `None` for an empty key, an oversize key,
    /// or a key not present.
    pub fn get<K: ToBytesRef + ?Sized, V: FromBytes>(&self, key: &K) -> Option<V> {
        let key = key.to_bytes_ref();
        let key = key.as_ref();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return None;
        }

        let bucket = bucket_index(self.base, self.prime, key) as usize;
        let mut cur = self.roots[bucket];
        while let Some(id) = cur {
            let node = &self.nodes[id.0 as usize];
            let node_key = self.arena.get(node.key);
            match key.cmp(node_key) {
                std::cmp::Ordering::Equal => {
                    return Some(V::from_bytes(self.arena.get(node.value).to_vec()))
                }
                std::cmp::Ordering::Less => cur = node.left,
                std::cmp::Ordering::Greater => cur = node.right,
            }
        }
        None
    }

    fn collect_bucket(&self, bucket: usize) -> Vec<NodeId> {
        fn walk(nodes: &[Node], id: Option<NodeId>, out: &mut Vec<NodeId>) {
            if let Some(id) = id {
                out.push(id);
                walk(nodes, nodes[id.0 as usize].left, out);
                walk(nodes, nodes[id.0 as usize].right, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, self.roots[bucket], &mut out);
        out
    }

    /// In-order traversal of a single bucket's tree: ascending by key
    /// when the BST invariant holds. Exposed for testing that invariant.
    pub fn bucket_inorder(&self, bucket: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        fn walk(
            arena: &Arena,
            nodes: &[Node],
            id: Option<NodeId>,
            out: &mut Vec<(Vec<u8>, Vec<u8>)>,
        ) {
            if let Some(id) = id {
                let n = &nodes[id.0 as usize];
                walk(arena, nodes, n.left, out);
                out.push((arena.get(n.key).to_vec(), arena.get(n.value).to_vec()));
                walk(arena, nodes, n.right, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.arena, &self.nodes, self.roots[bucket], &mut out);
        out
    }

    /// Depth of each bucket's tree (0 for an empty bucket), indexed the
    /// same way as `bucket_index`. Exposed for testing the depth bound
    /// `optimize` guarantees.
    pub fn bucket_depths(&self) -> Vec<usize> {
        fn depth(nodes: &[Node], id: Option<NodeId>) -> usize {
            match id {
                None => 0,
                Some(id) => {
                    let n = &nodes[id.0 as usize];
                    1 + depth(nodes, n.left).max(depth(nodes, n.right))
                }
            }
        }
        self.roots.iter().map(|r| depth(&self.nodes, *r)).collect()
    }

    /// Rebuild every bucket with more than two nodes into a depth-bounded
    /// tree (see [`crate::reshape`]).
    pub fn optimize(&mut self) {
        for bucket in 0..self.prime as usize {
            let mut ids = self.collect_bucket(bucket);
            if ids.len() <= 2 {
                continue;
            }
            ids.sort_by(|a, b| {
                let ka = self.arena.get(self.nodes[a.0 as usize].key);
                let kb = self.arena.get(self.nodes[b.0 as usize].key);
                ka.cmp(kb)
            });
            let nodes = &mut self.nodes;
            let root = reshape(&ids, |id, left, right| {
                nodes[id.0 as usize].left = left;
                nodes[id.0 as usize].right = right;
            });
            self.roots[bucket] = Some(root);
        }
    }

    /// Iterate over every `(key, value)` pair, in arbitrary per-bucket
    /// preorder. No ordering is implied across buckets or within one.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            dict: self,
            next_bucket: 0,
            stack: Vec::new(),
        }
    }

    /// Serialize this dictionary to a fresh file-backed store at `path`,
    /// carrying over its `base`/`prime`.
    pub fn to_store<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> crate::error::Result<crate::store::Store<crate::store::ReadWrite>> {
        let mut store = crate::store::Store::create(path, self.base, self.prime)?;
        for (k, v) in self.iter() {
            store.put(&BytesRef::Reference(k), &BytesRef::Reference(v))?;
        }
        Ok(store)
    }
}

/// Iterator over `(key, value)` pairs yielded by [`Dict::iter`].
pub struct Iter<'a> {
    dict: &'a Dict,
    next_bucket: u32,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.stack.pop() {
                let node = &self.dict.nodes[id.0 as usize];
                if let Some(r) = node.right {
                    self.stack.push(r);
                }
                if let Some(l) = node.left {
                    self.stack.push(l);
                }
                return Some((self.dict.arena.get(node.key), self.dict.arena.get(node.value)));
            }
            if self.next_bucket >= self.dict.prime {
                return None;
            }
            let b = self.next_bucket;
            self.next_bucket += 1;
            if let Some(root) = self.dict.roots[b as usize] {
                self.stack.push(root);
            }
        }
    }
}
