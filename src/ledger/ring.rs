//! Fixed-capacity ring of the most recent alerts.
//!
//! Slots are allocated once; `cursor` is the slot the next push writes.
//! When full, a push overwrites (and returns) the oldest item.

#[derive(Debug, Clone)]
pub struct RecentBuffer<T> {
    slots: Vec<Option<T>>,
    cursor: usize,
    len: usize,
}

impl<T> RecentBuffer<T> {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Write `item` at the cursor and advance it. Returns the overwritten
    /// item when the buffer was already full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = self.slots[self.cursor].replace(item);
        self.cursor = (self.cursor + 1) % self.capacity();
        if evicted.is_none() {
            self.len += 1;
        }
        evicted
    }

    /// Index of the oldest occupied slot.
    fn head(&self) -> usize {
        if self.is_full() {
            self.cursor
        } else {
            0
        }
    }

    /// Items oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let head = self.head();
        let capacity = self.capacity();
        (0..self.len).filter_map(move |offset| self.slots[(head + offset) % capacity].as_ref())
    }

    /// The most recently pushed item.
    pub fn latest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let index = (self.cursor + self.capacity() - 1) % self.capacity();
        self.slots[index].as_ref()
    }
}

impl<T: Clone> RecentBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
