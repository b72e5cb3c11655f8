//! LRU List Module
//!
//! Recency-ordered list of entries used for LRU eviction.
//!
//! Nodes live in an arena (`Vec` of slots) and link to each other through
//! `usize` handles, so move-to-front, unlink and evict-from-back are all O(1)
//! and freed slots are reused instead of reallocated.

use super::Entry;

// == Slot ==
#[derive(Debug)]
struct Slot<V> {
    entry: Option<Entry<V>>,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU List ==
/// Doubly-linked recency list.
///
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Handles returned by [`push_front`](Self::push_front) stay valid until the
/// node is removed; passing a stale handle panics.
#[derive(Debug)]
pub struct LruList<V> {
    slots: Vec<Slot<V>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<V> Default for LruList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LruList<V> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts an entry as the most recently used and returns its handle.
    pub fn push_front(&mut self, entry: Entry<V>) -> usize {
        let slot = Slot {
            entry: Some(entry),
            prev: None,
            next: self.head,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        match self.head {
            Some(old_head) => self.slots[old_head].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
        idx
    }

    // == Move To Front ==
    /// Marks a node as most recently used.
    pub fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);

        let slot = &mut self.slots[idx];
        slot.prev = None;
        slot.next = self.head;
        match self.head {
            Some(old_head) => self.slots[old_head].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    // == Remove ==
    /// Unlinks a node and returns its entry. The handle becomes free.
    pub fn remove(&mut self, idx: usize) -> Entry<V> {
        self.unlink(idx);

        let slot = &mut self.slots[idx];
        slot.prev = None;
        slot.next = None;
        let entry = slot.entry.take().expect("stale LRU handle");

        self.free.push(idx);
        self.len -= 1;
        entry
    }

    // == Pop Back ==
    /// Removes and returns the least recently used entry.
    pub fn pop_back(&mut self) -> Option<Entry<V>> {
        self.tail.map(|idx| self.remove(idx))
    }

    // == Back ==
    /// Handle of the least recently used node.
    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    /// Handle of the most recently used node.
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// Handle of the node one step closer to the front.
    pub fn prev(&self, idx: usize) -> Option<usize> {
        self.slots[idx].prev
    }

    /// Handle of the node one step closer to the back.
    pub fn next(&self, idx: usize) -> Option<usize> {
        self.slots[idx].next
    }

    pub fn get(&self, idx: usize) -> &Entry<V> {
        self.slots[idx].entry.as_ref().expect("stale LRU handle")
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Entry<V> {
        self.slots[idx].entry.as_mut().expect("stale LRU handle")
    }

    // == Drain ==
    /// Removes every entry, returned front (most recent) to back.
    pub fn drain(&mut self) -> Vec<Entry<V>> {
        let mut entries = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            cursor = self.slots[idx].next;
            if let Some(entry) = self.slots[idx].entry.take() {
                entries.push(entry);
            }
        }

        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
        entries
    }

    // == Length ==
    /// Returns the number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Keys from front to back.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.len);
        let mut cursor = self.front();
        while let Some(idx) = cursor {
            keys.push(self.get(idx).key.as_str());
            cursor = self.next(idx);
        }
        keys
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
    }
}
