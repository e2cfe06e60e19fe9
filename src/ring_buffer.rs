//! Fixed-capacity decimating circular buffer (§4.8).

/// A ring buffer of `f32` samples. Rounding from the `f64` DSP domain to
/// `f32` storage happens here, at push time (§9 "Float32 vs Float64").
pub struct RingBuffer {
    data: Vec<f32>,
    capacity: usize,
    write_index: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            data: vec![0.0; capacity],
            capacity,
            write_index: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid samples currently stored (`<= capacity`).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrites the oldest sample once full.
    #[inline]
    pub fn push(&mut self, v: f64) {
        self.data[self.write_index] = v as f32;
        self.write_index = (self.write_index + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.len = 0;
    }

    /// The stride used for decimated snapshots, derived from `capacity` (not
    /// the current length) so geometry stays stable as the buffer warms up.
    pub fn stride_for(capacity: usize, max_points: usize) -> usize {
        ((capacity as f64) / (max_points.max(1) as f64)).ceil().max(1.0) as usize
    }

    /// Copies a decimated, chronologically-ordered view of the buffer into
    /// `target`, at stride `⌈capacity / max_points⌉`. Returns the number of
    /// samples written, `⌈len / stride⌉`.
    pub fn snapshot_into(&self, target: &mut [f32], max_points: usize) -> usize {
        let stride = Self::stride_for(self.capacity, max_points);
        let oldest = if self.len < self.capacity {
            0
        } else {
            self.write_index
        };
        let mut written = 0;
        let mut k = 0;
        while k < self.len {
            let idx = (oldest + k) % self.capacity;
            if written >= target.len() {
                break;
            }
            target[written] = self.data[idx];
            written += 1;
            k += stride;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_preserves_insertion_order_with_stride() {
        let capacity = 10;
        let max_points = 4; // stride = ceil(10/4) = 3
        let mut ring = RingBuffer::new(capacity);
        for v in 0..10 {
            ring.push(v as f64);
        }
        let mut target = vec![0.0f32; max_points];
        let written = ring.snapshot_into(&mut target, max_points);
        assert_eq!(RingBuffer::stride_for(capacity, max_points), 3);
        assert_eq!(written, 4); // ceil(10/3)
        assert_eq!(&target[..written], &[0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn overwrite_oldest_when_full() {
        let mut ring = RingBuffer::new(4);
        for v in 0..6 {
            ring.push(v as f64);
        }
        // Contents are now [4,5,2,3] in storage, chronological oldest-first is [2,3,4,5].
        let mut target = vec![0.0f32; 4];
        let written = ring.snapshot_into(&mut target, 4);
        assert_eq!(written, 4);
        assert_eq!(&target[..written], &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn stride_depends_on_capacity_not_current_length() {
        let capacity = 100_000;
        let max_points = 10_000;
        let mut ring = RingBuffer::new(capacity);
        ring.push(1.0);
        let stride_when_nearly_empty = RingBuffer::stride_for(ring.capacity(), max_points);
        for i in 0..capacity {
            ring.push(i as f64);
        }
        let stride_when_full = RingBuffer::stride_for(ring.capacity(), max_points);
        assert_eq!(stride_when_nearly_empty, stride_when_full);
    }

    #[test]
    fn clear_resets_length_and_write_index() {
        let mut ring = RingBuffer::new(4);
        for v in 0..4 {
            ring.push(v as f64);
        }
        ring.clear();
        assert_eq!(ring.len(), 0);
        let mut target = vec![0.0f32; 4];
        assert_eq!(ring.snapshot_into(&mut target, 4), 0);
    }
}
