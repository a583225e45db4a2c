mod common;

use common::{assert_depth_bound, assert_sorted_inorder, scratch_key, scratch_value};
use std::collections::HashMap;
use tempfile::NamedTempFile;
use xdict::{hashutil, Dict, OpenOptions, ReadWrite, Store};

fn scratch_path() -> std::path::PathBuf {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    drop(tmp);
    std::fs::remove_file(&path).ok();
    path
}

fn assert_dict_matches_model(dict: &Dict, model: &HashMap<String, String>) {
    assert_eq!(dict.len(), model.len());
    for (k, v) in model {
        assert_eq!(dict.get::<_, String>(k.as_str()), Some(v.clone()));
    }
}

fn assert_dict_buckets_sorted(dict: &Dict) {
    for bucket in 0..dict.prime() as usize {
        assert_sorted_inorder(&dict.bucket_inorder(bucket));
    }
}

fn assert_store_buckets_sorted(store: &Store<ReadWrite>) {
    for bucket in 0..store.prime() {
        assert_sorted_inorder(&store.bucket_inorder(bucket).unwrap());
    }
}

#[test]
fn round_trip_and_miss() {
    let mut dict = Dict::new(0, 17);
    let mut model = HashMap::new();

    for i in 0..200 {
        let (k, v) = (scratch_key(i % 50), scratch_value(i));
        dict.put(&k, &v);
        model.insert(k, v);
    }

    assert_dict_matches_model(&dict, &model);
    assert_eq!(dict.get::<_, String>("never-inserted-key"), None);
}

#[test]
fn memory_and_file_are_equivalent() {
    let mut dict = Dict::new(0, 11);
    let mut model = HashMap::new();
    for i in 0..120 {
        let (k, v) = (scratch_key(i), scratch_value(i));
        dict.put(&k, &v);
        model.insert(k, v);
    }

    let path = scratch_path();
    let store = dict.to_store(&path).unwrap();
    let back = store.to_dict(None).unwrap();
    assert_dict_matches_model(&back, &model);
    store.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn optimize_preserves_mapping_in_memory() {
    let mut dict = Dict::new(0, 5);
    let mut model = HashMap::new();
    for i in 0..80 {
        let (k, v) = (scratch_key(i), scratch_value(i));
        dict.put(&k, &v);
        model.insert(k, v);
    }
    dict.optimize();
    assert_dict_matches_model(&dict, &model);
}

#[test]
fn optimize_preserves_mapping_on_disk() {
    let path = scratch_path();
    let mut store: Store<ReadWrite> = OpenOptions::new().write().create(&path, 0, 5).unwrap();
    let mut model = HashMap::new();
    for i in 0..80 {
        let (k, v) = (scratch_key(i), scratch_value(i));
        store.put(&k, &v).unwrap();
        model.insert(k, v);
    }
    store.optimize().unwrap();
    for (k, v) in &model {
        assert_eq!(store.get::<_, String>(k.as_str()).unwrap(), Some(v.clone()));
    }
    store.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn depth_bound_after_optimize() {
    let mut dict = Dict::new(0, 3);
    for i in 0..150 {
        dict.put(&scratch_key(i), &scratch_value(i));
    }
    dict.optimize();
    assert_depth_bound(&dict);
}

#[test]
fn monotone_file_size() {
    let path = scratch_path();
    let mut store: Store<ReadWrite> = OpenOptions::new().write().create(&path, 0, 13).unwrap();

    let mut prev = store.fsize();
    for i in 0..100 {
        store.put(&scratch_key(i % 30), &scratch_value(i)).unwrap();
        let now = store.fsize();
        assert!(now >= prev, "fsize went backwards: {now} < {prev}");
        prev = now;
    }

    store.close().unwrap();
    let actual = std::fs::metadata(&path).unwrap().len();
    assert_eq!(actual, prev as u64);
    std::fs::remove_file(&path).ok();
}

#[test]
fn in_place_small_write_does_not_grow_file() {
    let path = scratch_path();
    let mut store: Store<ReadWrite> = OpenOptions::new().write().create(&path, 0, 31).unwrap();
    store.put("k", "a longish value here").unwrap();
    let before = store.fsize();
    store.put("k", "shorter").unwrap();
    assert_eq!(store.fsize(), before);
    store.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn bucket_order_holds_after_every_operation_in_memory() {
    let mut dict = Dict::new(0, 4);
    for i in 0..60 {
        dict.put(&scratch_key(i), &scratch_value(i));
        assert_dict_buckets_sorted(&dict);
    }
    dict.optimize();
    assert_dict_buckets_sorted(&dict);
}

#[test]
fn bucket_order_holds_after_every_operation_on_disk() {
    let path = scratch_path();
    let mut store: Store<ReadWrite> = OpenOptions::new().write().create(&path, 0, 4).unwrap();
    for i in 0..60 {
        store.put(&scratch_key(i), &scratch_value(i)).unwrap();
        assert_store_buckets_sorted(&store);
    }
    store.optimize().unwrap();
    assert_store_buckets_sorted(&store);
    store.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn hash_is_stable_across_memory_and_file_forms() {
    let path = scratch_path();
    let mut dict = Dict::new(0xF422F, 23);
    let mut store: Store<ReadWrite> = OpenOptions::new().write().create(&path, 0xF422F, 23).unwrap();

    for i in 0..40 {
        let (k, v) = (scratch_key(i), scratch_value(i));
        dict.put(&k, &v);
        store.put(&k, &v).unwrap();
        let mem_bucket = hashutil::bucket_index(dict.base(), dict.prime(), k.as_bytes());
        let file_bucket = hashutil::bucket_index(store.base(), store.prime(), k.as_bytes());
        assert_eq!(mem_bucket, file_bucket);
    }

    dict.optimize();
    store.optimize().unwrap();
    for i in 0..40 {
        let k = scratch_key(i);
        let mem_bucket = hashutil::bucket_index(dict.base(), dict.prime(), k.as_bytes());
        let file_bucket = hashutil::bucket_index(store.base(), store.prime(), k.as_bytes());
        assert_eq!(mem_bucket, file_bucket);
    }

    store.close().unwrap();
    std::fs::remove_file(&path).ok();
}
