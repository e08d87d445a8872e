use crate::common::SlotNo;

/// Geometry of a heap page holding fixed-size tuples.
///
/// A page starts with an occupancy bitmap of `header_size` bytes, one bit per slot,
/// followed by `num_slots` tuple slots of `tuple_size` bytes each. Bit `i` lives in byte
/// `i / 8` at position `i % 8`, counting from the least significant bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(in crate::storage) struct PageLayout {
    pub page_size: usize,
    pub tuple_size: usize,
    pub num_slots: usize,
    pub header_size: usize,
}

impl PageLayout {
    pub fn new(page_size: usize, tuple_size: usize) -> Self {
        // every tuple costs its bytes plus one header bit
        let num_slots = (page_size * 8) / (tuple_size * 8 + 1);
        let header_size = num_slots.div_ceil(8);
        Self {
            page_size,
            tuple_size,
            num_slots,
            header_size,
        }
    }

    /// Byte offset of the first byte of `slot`.
    pub fn slot_offset(&self, slot: SlotNo) -> usize {
        self.header_size + slot * self.tuple_size
    }
}

pub(in crate::storage) fn is_bit_set(bitmap: &[u8], bit: usize) -> bool {
    bitmap[bit / 8] & (1 << (bit % 8)) != 0
}

pub(in crate::storage) fn set_bit(bitmap: &mut [u8], bit: usize, value: bool) {
    let mask = 1 << (bit % 8);
    if value {
        bitmap[bit / 8] |= mask;
    } else {
        bitmap[bit / 8] &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::{is_bit_set, set_bit, PageLayout};

    #[test]
    fn layout_fits_into_page() {
        for (page_size, tuple_size) in [(4096, 8), (4096, 136), (512, 4), (64, 60), (4096, 4097)] {
            let layout = PageLayout::new(page_size, tuple_size);
            assert!(layout.header_size * 8 >= layout.num_slots);
            assert!(layout.slot_offset(layout.num_slots) <= page_size);
        }
        let layout = PageLayout::new(4096, 8);
        assert_eq!(layout.num_slots, 504);
        assert_eq!(layout.header_size, 63);

        assert_eq!(PageLayout::new(4096, 4097).num_slots, 0);
    }

    #[test]
    fn bits_are_lsb_first() {
        let mut bitmap = [0u8; 2];
        set_bit(&mut bitmap, 0, true);
        set_bit(&mut bitmap, 9, true);
        assert_eq!(bitmap, [0b0000_0001, 0b0000_0010]);
        assert!(is_bit_set(&bitmap, 9));
        assert!(!is_bit_set(&bitmap, 8));

        set_bit(&mut bitmap, 0, false);
        assert_eq!(bitmap, [0, 0b0000_0010]);
    }
}
