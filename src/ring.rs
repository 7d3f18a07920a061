/// A fixed-capacity circular buffer that overwrites the oldest entry when full.
///
/// Capacity is rounded up to the next power of two so that index masking
/// replaces modulo arithmetic. This is the substrate for serializing pending
/// lifecycle commands, not a general message bus: there is no blocking and no
/// backpressure signal beyond the overwrite itself.
pub struct Ring<T> {
    buf: Vec<Option<T>>,
    mask: usize,
    head: usize,
    tail: usize,
}

impl<T> Ring<T> {
    /// Creates a ring with capacity rounded up to the next power of two (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        Self {
            buf,
            mask: capacity - 1,
            head: 0,
            tail: 0,
        }
    }

    /// Appends a value, silently dropping the oldest unread entry if the ring is full.
    pub fn put(&mut self, value: T) {
        self.buf[self.head & self.mask] = Some(value);
        self.head += 1;
        if self.head - self.tail > self.capacity() {
            self.tail += 1;
        }
    }

    /// Removes and returns the oldest entry.
    pub fn get(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.buf[self.tail & self.mask].take();
        self.tail += 1;
        value
    }

    /// Returns the oldest entry without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.buf[self.tail & self.mask].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn len(&self) -> usize {
        self.head - self.tail
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        for slot in &mut self.buf {
            *slot = None;
        }
    }
}
