//! MSB-first bit packing into a fixed-size, zero-initialized buffer.

/// Writes values most significant bit first.
///
/// The buffer is sized up front. Writes past the end are a programming
/// error: they trip a debug assertion and are otherwise dropped.
#[derive(Debug)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
            bit_pos: 0,
        }
    }

    /// Append the low `bits` bits of `value` (at most 32).
    pub fn write(&mut self, value: u32, bits: u32) {
        debug_assert!(bits <= 32);
        let capacity = self.data.len() * 8;
        debug_assert!(
            self.bit_pos + bits as usize <= capacity,
            "bit writer overflow: {} + {} > {}",
            self.bit_pos,
            bits,
            capacity
        );

        for i in (0..bits).rev() {
            if self.bit_pos >= capacity {
                return;
            }
            if (value >> i) & 1 == 1 {
                self.data[self.bit_pos / 8] |= 0x80 >> (self.bit_pos % 8);
            }
            self.bit_pos += 1;
        }
    }

    /// Bits written so far.
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
