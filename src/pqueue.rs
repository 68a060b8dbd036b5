//! Indexed binary min-heap over an externally owned weight array.
//!
//! The queue stores dense integer keys whose priority is `weights[key]` —
//! the weight array lives with the caller (typically the distance array of a
//! shortest-path search) and is mutated between operations. `decrease_key`
//! restores the heap property after the caller lowered a key's weight.
//!
//! With a position index (the default via [`IndexedMinQueue::with_positions`])
//! `decrease_key` locates the key in O(1); without one it falls back to a
//! linear scan, so performance-sensitive callers should size the index.

/// Sentinel for "key is not currently in the heap".
const NO_POS: u32 = u32::MAX;

/// Binary min-heap of `u32` keys ordered by an external `weights[key]` array.
///
/// Smaller weight means higher priority. Equal-weight keys pop in no
/// particular relative order.
#[derive(Debug)]
pub struct IndexedMinQueue {
    /// Heap slots, 0-based; `heap[0]` is the minimum.
    heap: Vec<u32>,
    /// Logical size; `clear` resets this without shrinking the backing storage.
    size: usize,
    /// key → heap slot, or `NO_POS` when the key is not enqueued.
    positions: Option<Vec<u32>>,
}

impl IndexedMinQueue {
    /// Create a queue without a position index.
    ///
    /// `decrease_key` will locate keys by linear scan.
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(initial_capacity),
            size: 0,
            positions: None,
        }
    }

    /// Create a queue with a position index covering keys `0..key_capacity`.
    pub fn with_positions(key_capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(key_capacity.min(128)),
            size: 0,
            positions: Some(vec![NO_POS; key_capacity]),
        }
    }

    /// Grow the position index so keys up to `key_capacity` are addressable.
    ///
    /// No-op for queues without a position index or when already large enough.
    pub fn ensure_key_capacity(&mut self, key_capacity: usize) {
        if let Some(pos) = &mut self.positions {
            if pos.len() < key_capacity {
                pos.resize(key_capacity, NO_POS);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn len(&self) -> usize {
        self.size
    }

    /// Logical reset: size goes to zero, backing storage is kept for reuse.
    ///
    /// Position-index entries of cleared elements are not touched; they are
    /// overwritten by the next `insert` of the same key. `decrease_key` must
    /// only be called for keys inserted since the last `clear`.
    pub fn clear(&mut self) {
        self.size = 0;
    }

    /// Insert `key`; its priority is `weights[key]`. O(log n).
    pub fn insert(&mut self, key: u32, weights: &[f64]) {
        if self.size == self.heap.len() {
            self.heap.push(key);
        } else {
            self.heap[self.size] = key;
        }
        if let Some(pos) = &mut self.positions {
            pos[key as usize] = self.size as u32;
        }
        self.size += 1;
        self.sift_up(self.size - 1, weights);
    }

    /// Remove and return the minimum-weight key, or `None` on an empty queue.
    pub fn pop_min(&mut self, weights: &[f64]) -> Option<u32> {
        if self.size == 0 {
            return None;
        }
        self.swap_slots(0, self.size - 1);
        self.size -= 1;
        let key = self.heap[self.size];
        if let Some(pos) = &mut self.positions {
            pos[key as usize] = NO_POS;
        }
        self.sift_down(0, weights);
        Some(key)
    }

    /// Rebalance after the caller decreased `weights[key]`. O(log n) with a
    /// position index, O(n) without. Keys not currently enqueued are ignored.
    pub fn decrease_key(&mut self, key: u32, weights: &[f64]) {
        let slot = match &self.positions {
            Some(pos) => {
                let p = pos[key as usize];
                if p == NO_POS {
                    return;
                }
                p as usize
            }
            None => match self.heap[..self.size].iter().position(|&k| k == key) {
                Some(p) => p,
                None => return,
            },
        };
        self.sift_up(slot, weights);
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        if let Some(pos) = &mut self.positions {
            pos[self.heap[a] as usize] = a as u32;
            pos[self.heap[b] as usize] = b as u32;
        }
    }

    fn sift_up(&mut self, mut slot: usize, weights: &[f64]) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if weights[self.heap[parent] as usize] > weights[self.heap[slot] as usize] {
                self.swap_slots(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut slot: usize, weights: &[f64]) {
        loop {
            let mut child = 2 * slot + 1;
            if child >= self.size {
                break;
            }
            if child + 1 < self.size
                && weights[self.heap[child] as usize] > weights[self.heap[child + 1] as usize]
            {
                child += 1;
            }
            if weights[self.heap[slot] as usize] > weights[self.heap[child] as usize] {
                self.swap_slots(slot, child);
                slot = child;
            } else {
                break;
            }
        }
    }
}
