use xdict::Dict;

/// Deterministic, not-actually-random bytes, cheap to regenerate from an
/// index so every test run sees the same keys without a crate dependency.
pub fn scratch_key(i: usize) -> String {
    format!("key-{i:06}-{:x}", i.wrapping_mul(2654435761))
}

pub fn scratch_value(i: usize) -> String {
    format!("value-{i:06}-{:x}", i.wrapping_mul(40503))
}

/// Panics with a descriptive message unless `pairs` is strictly ascending
/// by key -- the shape an in-order BST traversal must have.
pub fn assert_sorted_inorder(pairs: &[(Vec<u8>, Vec<u8>)]) {
    for w in pairs.windows(2) {
        assert!(
            w[0].0 < w[1].0,
            "bucket not sorted in-order: {:?} should come before {:?}",
            w[0].0,
            w[1].0
        );
    }
}

/// `⌈log2(n + 1)⌉`, the depth bound `optimize` must satisfy.
pub fn ceil_log2_n_plus_1(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (usize::BITS - n.leading_zeros()) as usize
}

/// Every bucket's depth must not exceed its size's depth bound, and the
/// bucket counts recovered from `dict.iter()` must sum to `dict.len()`.
pub fn assert_depth_bound(dict: &Dict) {
    let mut counts = vec![0usize; dict.prime() as usize];
    for (k, _) in dict.iter() {
        let b = xdict::hashutil::bucket_index(dict.base(), dict.prime(), k) as usize;
        counts[b] += 1;
    }
    let depths = dict.bucket_depths();
    for (bucket, (&count, &depth)) in counts.iter().zip(depths.iter()).enumerate() {
        assert!(
            depth <= ceil_log2_n_plus_1(count),
            "bucket {bucket} has {count} entries but depth {depth} > {}",
            ceil_log2_n_plus_1(count)
        );
    }
}
