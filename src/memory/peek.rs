//! The memory-read capability supplied by the host
//!
//! The engine never reads process memory itself. The host hands it a
//! [`MemoryPeek`] implementation that resolves `(address, num_bytes)` to a
//! little-endian value; the engine is correct for any implementation,
//! including one that always returns 0.

/// Trait for reading values out of emulated memory
pub trait MemoryPeek {
    /// Read `num_bytes` (1, 2, or 4) at `address` as a little-endian
    /// unsigned value. Out-of-range reads should return 0.
    fn peek(&self, address: u32, num_bytes: u32) -> u32;
}

impl<F> MemoryPeek for F
where
    F: Fn(u32, u32) -> u32,
{
    fn peek(&self, address: u32, num_bytes: u32) -> u32 {
        self(address, num_bytes)
    }
}

/// A [`MemoryPeek`] backed by an in-process byte buffer.
///
/// Useful for tests and for hosts that already mirror emulated RAM into a
/// flat buffer. Reads past the end of the buffer yield 0 per byte.
#[derive(Debug, Clone, Default)]
pub struct SliceMemory {
    bytes: Vec<u8>,
}

impl SliceMemory {
    /// Create a memory view over the given bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Overwrite a single byte, growing the buffer if needed
    pub fn poke(&mut self, address: u32, value: u8) {
        let idx = address as usize;
        if idx >= self.bytes.len() {
            self.bytes.resize(idx + 1, 0);
        }
        self.bytes[idx] = value;
    }

    fn byte_at(&self, address: u32) -> u32 {
        self.bytes.get(address as usize).copied().unwrap_or(0) as u32
    }
}

impl MemoryPeek for SliceMemory {
    fn peek(&self, address: u32, num_bytes: u32) -> u32 {
        let mut value = 0u32;
        for i in 0..num_bytes.min(4) {
            value |= self.byte_at(address.wrapping_add(i)) << (i * 8);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_memory_little_endian() {
        let mem = SliceMemory::new(vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(mem.peek(0, 1), 0x12);
        assert_eq!(mem.peek(0, 2), 0x3412);
        assert_eq!(mem.peek(0, 4), 0x78563412);
    }

    #[test]
    fn test_out_of_range_reads_zero() {
        let mem = SliceMemory::new(vec![0xFF]);
        assert_eq!(mem.peek(100, 4), 0);
        assert_eq!(mem.peek(0, 2), 0x00FF);
    }

    #[test]
    fn test_poke_grows_buffer() {
        let mut mem = SliceMemory::default();
        mem.poke(5, 0xAB);
        assert_eq!(mem.peek(5, 1), 0xAB);
        assert_eq!(mem.peek(4, 1), 0);
    }

    #[test]
    fn test_closure_impl() {
        let peek = |_addr: u32, _n: u32| 42u32;
        assert_eq!(MemoryPeek::peek(&peek, 0, 1), 42);
    }
}
