use super::PoolPos;

/// ClockReplacer implements the clock page replacement policy for the buffer pool.
/// Whether a frame may be evicted at all is decided by the caller at victim search time.
pub(in crate::buffer) struct ClockReplacer {
    pool_size: usize,
    clock_hand: PoolPos,
    ref_bits: Vec<bool>,
}

impl ClockReplacer {
    /// Construct a new ClockReplacer for a pool with `pool_size` frames
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            clock_hand: 0,
            ref_bits: vec![false; pool_size],
        }
    }

    /// The frame at the given position was used
    pub fn touch(&mut self, frame: PoolPos) {
        self.ref_bits[frame] = true;
    }

    /// The frame at the given position no longer holds a page
    pub fn forget(&mut self, frame: PoolPos) {
        self.ref_bits[frame] = false;
    }

    /// Returns None if no frame is evictable, else the next evictable frame whose
    /// reference bit is clear. Reference bits of skipped evictable frames are cleared.
    pub fn find_victim(&mut self, evictable: impl Fn(PoolPos) -> bool) -> Option<PoolPos> {
        // two sweeps: the first may only clear reference bits
        for _ in 0..2 * self.pool_size {
            let frame = self.clock_hand;
            self.clock_hand = (self.clock_hand + 1) % self.pool_size;
            if !evictable(frame) {
                continue;
            }
            if !self.ref_bits[frame] {
                return Some(frame);
            }
            self.ref_bits[frame] = false;
        }
        None
    }
}
