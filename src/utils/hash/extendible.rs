use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Dynamically sized open hash table: a directory of `2^global_depth` slots
/// pointing into a bucket arena. Buckets with `local_depth < global_depth`
/// are aliased by every slot whose low `local_depth` bits match. A single
/// exclusive latch covers the whole structure.
#[derive(Debug)]
pub struct ExtendibleHashTable<K, V> {
    inner: Mutex<Inner<K, V>>,
}

#[derive(Debug)]
struct Inner<K, V> {
    global_depth: u32,
    bucket_size: usize,
    num_buckets: usize,
    // directory slots are indices into the bucket arena
    directory: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

#[derive(Debug)]
struct Bucket<K, V> {
    local_depth: u32,
    items: Vec<(K, V)>,
}

fn hash_of<K: Hash>(key: &K) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as usize
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            inner: Mutex::new(Inner {
                global_depth: 0,
                bucket_size,
                num_buckets: 1,
                directory: vec![0],
                buckets: vec![Bucket {
                    local_depth: 0,
                    items: Vec::with_capacity(bucket_size),
                }],
            }),
        }
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock();
        let bucket = &inner.buckets[inner.directory[inner.slot_of(key)]];
        bucket
            .items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Inserts the pair, overwriting the value of an existing key. Bucket
    /// overflow splits the bucket, doubling the directory when the bucket is
    /// already at global depth; the insert is then retried (splits may
    /// cascade when every entry rehashes to the same side).
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        loop {
            let bucket_idx = inner.directory[inner.slot_of(&key)];
            let bucket_size = inner.bucket_size;
            let bucket = &mut inner.buckets[bucket_idx];
            if let Some(slot) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
                return;
            }
            if bucket.items.len() < bucket_size {
                bucket.items.push((key, value));
                return;
            }
            inner.split(bucket_idx);
        }
    }

    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let bucket_idx = inner.directory[inner.slot_of(key)];
        let bucket = &mut inner.buckets[bucket_idx];
        if let Some(pos) = bucket.items.iter().position(|(k, _)| k == key) {
            bucket.items.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    pub fn local_depth(&self, dir_index: usize) -> u32 {
        let inner = self.inner.lock();
        inner.buckets[inner.directory[dir_index]].local_depth
    }

    pub fn num_buckets(&self) -> usize {
        self.inner.lock().num_buckets
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        let mut seen = vec![false; inner.buckets.len()];
        let mut total = 0;
        for &idx in inner.directory.iter() {
            if !seen[idx] {
                seen[idx] = true;
                total += inner.buckets[idx].items.len();
            }
        }
        total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Inner<K, V>
where
    K: Hash + Eq,
{
    fn slot_of(&self, key: &K) -> usize {
        hash_of(key) & ((1usize << self.global_depth) - 1)
    }

    fn split(&mut self, bucket_idx: usize) {
        let local_depth = self.buckets[bucket_idx].local_depth;
        if local_depth == self.global_depth {
            // double the directory: slot i + old_size aliases slot i
            let old_size = self.directory.len();
            self.directory.extend_from_within(0..old_size);
            self.global_depth += 1;
        }

        let sibling_idx = self.buckets.len();
        self.buckets.push(Bucket {
            local_depth: local_depth + 1,
            items: Vec::with_capacity(self.bucket_size),
        });
        self.buckets[bucket_idx].local_depth = local_depth + 1;

        // entries whose distinguishing bit is set move to the sibling
        let bit = 1usize << local_depth;
        let items = std::mem::take(&mut self.buckets[bucket_idx].items);
        for (key, value) in items {
            if hash_of(&key) & bit != 0 {
                self.buckets[sibling_idx].items.push((key, value));
            } else {
                self.buckets[bucket_idx].items.push((key, value));
            }
        }

        for slot in 0..self.directory.len() {
            if self.directory[slot] == bucket_idx && slot & bit != 0 {
                self.directory[slot] = sibling_idx;
            }
        }
        self.num_buckets += 1;
    }
}
