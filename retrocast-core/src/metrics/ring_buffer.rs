//! Fixed-capacity circular buffer.
//!
//! The backing store is allocated once at construction. Every caller on
//! the hot path uses [`RingBuffer::push_and_pop_when_full`], which never
//! fails and evicts the oldest element deterministically when the buffer
//! is full. The strict [`push`](RingBuffer::push) / [`pop`](RingBuffer::pop)
//! pair reports misuse as an error instead.

use crate::error::StreamError;

// ── RingBuffer ───────────────────────────────────────────────────

/// A FIFO ring of at most `capacity` elements.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    /// Index of the oldest element.
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Allocate a ring with room for `capacity` elements.
    pub fn new(capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::InvalidCapacity);
        }
        let slots = std::iter::repeat_with(|| None).take(capacity).collect();
        Ok(Self {
            slots,
            head: 0,
            len: 0,
        })
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append `item`, failing with [`StreamError::BufferFull`] when full.
    pub fn push(&mut self, item: T) -> Result<(), StreamError> {
        if self.is_full() {
            return Err(StreamError::BufferFull {
                capacity: self.capacity(),
            });
        }
        let tail = self.slot_index(self.len);
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Remove and return the oldest element.
    pub fn pop(&mut self) -> Result<T, StreamError> {
        if self.is_empty() {
            return Err(StreamError::BufferEmpty);
        }
        let item = self.slots[self.head].take().ok_or(StreamError::BufferEmpty)?;
        self.head = self.slot_index(1);
        self.len -= 1;
        Ok(item)
    }

    /// Append `item`, overwriting the oldest element when full.
    ///
    /// Returns the evicted element, or `None` if there was room.
    pub fn push_and_pop_when_full(&mut self, item: T) -> Option<T> {
        if self.is_full() {
            let evicted = self.slots[self.head].replace(item);
            self.head = self.slot_index(1);
            evicted
        } else {
            let tail = self.slot_index(self.len);
            self.slots[tail] = Some(item);
            self.len += 1;
            None
        }
    }

    /// Drop every element, keeping the allocation.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.slots[self.slot_index(i)].as_ref())
    }

    fn slot_index(&self, offset: usize) -> usize {
        (self.head + offset) % self.capacity()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            RingBuffer::<u8>::new(0),
            Err(StreamError::InvalidCapacity)
        ));
    }

    #[test]
    fn push_pop_fifo() {
        let mut ring = RingBuffer::new(3).unwrap();
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.pop().unwrap(), 1);
        assert_eq!(ring.pop().unwrap(), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn strict_push_fails_when_full() {
        let mut ring = RingBuffer::new(2).unwrap();
        ring.push('a').unwrap();
        ring.push('b').unwrap();
        let err = ring.push('c').unwrap_err();
        assert!(matches!(err, StreamError::BufferFull { capacity: 2 }));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn pop_empty_fails() {
        let mut ring = RingBuffer::<u32>::new(1).unwrap();
        assert!(matches!(ring.pop(), Err(StreamError::BufferEmpty)));
    }

    #[test]
    fn overwrite_evicts_oldest_in_order() {
        let mut ring = RingBuffer::new(3).unwrap();
        for i in 0..3 {
            assert_eq!(ring.push_and_pop_when_full(i), None);
        }
        // Every further insertion evicts the least-recently inserted survivor.
        for i in 3..20 {
            assert_eq!(ring.push_and_pop_when_full(i), Some(i - 3));
            assert_eq!(ring.len(), 3);
        }
        let remaining: Vec<_> = ring.iter().copied().collect();
        assert_eq!(remaining, vec![17, 18, 19]);
    }

    #[test]
    fn count_never_exceeds_capacity_with_mixed_ops() {
        let mut ring = RingBuffer::new(4).unwrap();
        let mut model = std::collections::VecDeque::new();
        // Deterministic pseudo-random op sequence.
        let mut seed: u32 = 0x9E37_79B9;
        for value in 0..500u32 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            if seed % 3 == 0 {
                assert_eq!(ring.pop().ok(), model.pop_front());
            } else {
                let evicted = ring.push_and_pop_when_full(value);
                model.push_back(value);
                let expected = if model.len() > 4 { model.pop_front() } else { None };
                assert_eq!(evicted, expected);
            }
            assert!(ring.len() <= ring.capacity());
            assert_eq!(ring.len(), model.len());
        }
    }

    #[test]
    fn wraps_after_pops() {
        let mut ring = RingBuffer::new(2).unwrap();
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        ring.pop().unwrap();
        ring.push(3).unwrap();
        assert!(ring.is_full());
        assert_eq!(ring.push_and_pop_when_full(4), Some(2));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn clear_resets() {
        let mut ring = RingBuffer::new(2).unwrap();
        ring.push(String::from("x")).unwrap();
        ring.clear();
        assert!(ring.is_empty());
        ring.push(String::from("y")).unwrap();
        assert_eq!(ring.pop().unwrap(), "y");
    }
}
