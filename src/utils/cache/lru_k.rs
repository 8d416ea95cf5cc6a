use super::Replacer;
use crate::buffer::FrameId;
use std::collections::{HashMap, VecDeque};

#[derive(Debug)]
struct LruKNode {
    // the last k access timestamps, oldest first
    history: VecDeque<u64>,
    first_access: u64,
    is_evictable: bool,
}

impl LruKNode {
    fn new(timestamp: u64) -> Self {
        let mut history = VecDeque::new();
        history.push_back(timestamp);
        Self {
            history,
            first_access: timestamp,
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: u64, k: usize) {
        self.history.push_back(timestamp);
        if self.history.len() > k {
            self.history.pop_front();
        }
    }
}

/// LRU-K replacement: the victim is the evictable frame with the largest
/// backward K-distance (infinite with fewer than K recorded accesses).
/// Frames of equal distance, infinite included, fall back to classic LRU on
/// the first recorded access.
#[derive(Debug)]
pub struct LruKReplacer {
    // number of evictable frames
    current_size: usize,
    // upper bound on tracked frames
    replacer_size: usize,
    k: usize,
    node_store: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
}

impl LruKReplacer {
    pub fn with_k(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "lru-k requires k > 0");
        Self {
            current_size: 0,
            replacer_size: num_frames,
            k,
            node_store: HashMap::with_capacity(num_frames),
            current_timestamp: 0,
        }
    }
}

impl Replacer for LruKReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} out of range (num_frames = {})",
            frame_id,
            self.replacer_size
        );
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;
        if let Some(node) = self.node_store.get_mut(&frame_id) {
            node.record_access(timestamp, self.k);
        } else {
            self.node_store.insert(frame_id, LruKNode::new(timestamp));
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        // (frame, infinite distance, distance, first access)
        let mut victim: Option<(FrameId, bool, u64, u64)> = None;
        for (&frame_id, node) in self.node_store.iter() {
            if !node.is_evictable {
                continue;
            }
            let infinite = node.history.len() < self.k;
            let distance = if infinite {
                0
            } else {
                // front() is the k-th most recent access
                self.current_timestamp - node.history.front().copied().unwrap_or(0)
            };
            let better = match victim {
                None => true,
                Some((_, best_inf, best_dist, best_first)) => {
                    if infinite != best_inf {
                        infinite
                    } else if !infinite && distance != best_dist {
                        distance > best_dist
                    } else {
                        node.first_access < best_first
                    }
                }
            };
            if better {
                victim = Some((frame_id, infinite, distance, node.first_access));
            }
        }
        let (frame_id, ..) = victim?;
        self.node_store.remove(&frame_id);
        self.current_size -= 1;
        Some(frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} out of range (num_frames = {})",
            frame_id,
            self.replacer_size
        );
        if let Some(node) = self.node_store.get_mut(&frame_id) {
            if node.is_evictable != set_evictable {
                node.is_evictable = set_evictable;
                if set_evictable {
                    self.current_size += 1;
                } else {
                    self.current_size -= 1;
                }
            }
        }
    }

    fn remove(&mut self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} out of range (num_frames = {})",
            frame_id,
            self.replacer_size
        );
        if let Some(node) = self.node_store.get(&frame_id) {
            if !node.is_evictable {
                return;
            }
            self.node_store.remove(&frame_id);
            self.current_size -= 1;
        }
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_evictable_adjusts_size() {
        let mut replacer = LruKReplacer::with_k(3, 2);
        replacer.record_access(1);
        replacer.set_evictable(1, true);
        assert_eq!(replacer.size(), 1);
        replacer.set_evictable(1, true);
        assert_eq!(replacer.size(), 1);
        replacer.set_evictable(1, false);
        assert_eq!(replacer.size(), 0);
        // untracked frame is a no-op
        replacer.set_evictable(2, true);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn evict_prefers_larger_k_distance() {
        let mut replacer = LruKReplacer::with_k(2, 3);
        replacer.record_access(0); // ts=0
        replacer.record_access(1); // ts=1
        replacer.record_access(1); // ts=2
        replacer.record_access(0); // ts=3
        replacer.record_access(1); // ts=4
        replacer.record_access(0); // ts=5
        replacer.set_evictable(0, true);
        replacer.set_evictable(1, true);
        // frame 0 history [0,3,5], k-dist = 6-0 = 6
        // frame 1 history [1,2,4], k-dist = 6-1 = 5
        assert_eq!(replacer.evict(), Some(0));
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn infinite_distance_wins_and_breaks_ties_on_first_access() {
        let mut replacer = LruKReplacer::with_k(4, 2);
        replacer.record_access(1); // ts=0
        replacer.record_access(2); // ts=1
        replacer.record_access(3); // ts=2
        replacer.record_access(1); // ts=3, frame 1 has k accesses now
        replacer.record_access(2); // ts=4
        replacer.record_access(1); // ts=5
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);
        replacer.set_evictable(3, true);
        // frame 3 has a single access: infinite distance, evicted first.
        assert_eq!(replacer.evict(), Some(3));
        // frames 1 and 2 are both finite; frame 2's 2nd-most-recent access
        // (ts=1) is older than frame 1's (ts=3).
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), Some(1));
    }

    #[test]
    fn ties_among_infinite_use_earliest_first_access() {
        let mut replacer = LruKReplacer::with_k(3, 2);
        replacer.record_access(0); // ts=0
        replacer.record_access(1); // ts=1
        replacer.record_access(2); // ts=2
        replacer.record_access(0); // ts=3, frame 0 now has k accesses
        replacer.set_evictable(0, true);
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);
        // frames 1 and 2 are infinite; frame 1 was first seen earlier.
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), Some(0));
    }

    #[test]
    fn remove_is_a_noop_on_pinned_or_untracked_frames() {
        let mut replacer = LruKReplacer::with_k(3, 2);
        replacer.record_access(0);
        // tracked but non-evictable: kept
        replacer.remove(0);
        replacer.set_evictable(0, true);
        assert_eq!(replacer.size(), 1);
        // untracked: no-op
        replacer.remove(2);
        assert_eq!(replacer.size(), 1);
        replacer.remove(0);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_frame_id_panics() {
        let mut replacer = LruKReplacer::with_k(3, 2);
        replacer.record_access(3);
    }

    #[test]
    fn full_scenario() {
        let mut replacer = LruKReplacer::with_k(7, 2);

        replacer.record_access(1); // ts=0
        replacer.record_access(2); // ts=1
        replacer.record_access(3); // ts=2
        replacer.record_access(4); // ts=3
        replacer.record_access(5); // ts=4
        replacer.record_access(6); // ts=5
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);
        replacer.set_evictable(3, true);
        replacer.set_evictable(4, true);
        replacer.set_evictable(5, true);
        assert_eq!(replacer.size(), 5);

        replacer.record_access(1); // ts=6, frame 1 now finite
        // frames 2..5 are infinite; first accesses 1,2,3,4
        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), Some(3));
        assert_eq!(replacer.evict(), Some(4));
        assert_eq!(replacer.size(), 2);

        replacer.record_access(3); // ts=7
        replacer.record_access(4); // ts=8
        replacer.record_access(5); // ts=9, frame 5 history [4,9]
        replacer.record_access(4); // ts=10, frame 4 history [8,10]
        replacer.set_evictable(3, true);
        replacer.set_evictable(4, true);
        assert_eq!(replacer.size(), 4);

        // frame 3 is the only infinite one left
        assert_eq!(replacer.evict(), Some(3));

        replacer.set_evictable(6, true);
        // frame 6 history [5]: infinite
        assert_eq!(replacer.evict(), Some(6));

        replacer.set_evictable(1, false);
        // frame 5 k-dist = 11-4, frame 4 k-dist = 11-8
        assert_eq!(replacer.evict(), Some(5));

        replacer.record_access(1); // ts=11
        replacer.record_access(1); // ts=12, history [11,12]
        replacer.set_evictable(1, true);
        // frame 4 k-dist = 13-8, frame 1 k-dist = 13-11
        assert_eq!(replacer.evict(), Some(4));
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }
}
