//! Memory references and the deduplicating reference pool
//!
//! Every memory operand in a condition set resolves to an entry in the
//! [`MemrefPool`]. Non-indirect entries are deduplicated by
//! `(address, size)` so that all conditions observing the same location
//! share one current/prior value pair; indirect entries (those whose
//! effective address depends on the AddAddress accumulator) always get a
//! fresh entry and are refreshed lazily at evaluation time.

use crate::memory::MemoryPeek;

/// How many bytes, and which bits, of memory an operand observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemSize {
    Bit0,
    Bit1,
    Bit2,
    Bit3,
    Bit4,
    Bit5,
    Bit6,
    Bit7,
    NibbleLower,
    NibbleUpper,
    /// Population count of the 8-bit value at the address
    BitCount,
    EightBits,
    SixteenBits,
    TwentyFourBits,
    ThirtyTwoBits,
}

impl MemSize {
    /// Parse a size letter from the condition language (the character
    /// immediately after `0x`). Returns `None` for characters that denote
    /// the default 16-bit read without consuming anything.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'm' => Some(MemSize::Bit0),
            'n' => Some(MemSize::Bit1),
            'o' => Some(MemSize::Bit2),
            'p' => Some(MemSize::Bit3),
            'q' => Some(MemSize::Bit4),
            'r' => Some(MemSize::Bit5),
            's' => Some(MemSize::Bit6),
            't' => Some(MemSize::Bit7),
            'l' => Some(MemSize::NibbleLower),
            'u' => Some(MemSize::NibbleUpper),
            'k' => Some(MemSize::BitCount),
            'h' => Some(MemSize::EightBits),
            'w' => Some(MemSize::TwentyFourBits),
            'x' => Some(MemSize::ThirtyTwoBits),
            _ => None,
        }
    }

    /// Number of bytes fetched from the host for this size.
    ///
    /// 24-bit reads fetch a full 4-byte word and mask off the top byte.
    pub fn bytes_needed(self) -> u32 {
        match self {
            MemSize::SixteenBits => 2,
            MemSize::TwentyFourBits | MemSize::ThirtyTwoBits => 4,
            _ => 1,
        }
    }

    /// Derive the typed value from the raw little-endian word
    pub fn transform(self, raw: u32) -> u32 {
        match self {
            MemSize::Bit0 => raw & 1,
            MemSize::Bit1 => (raw >> 1) & 1,
            MemSize::Bit2 => (raw >> 2) & 1,
            MemSize::Bit3 => (raw >> 3) & 1,
            MemSize::Bit4 => (raw >> 4) & 1,
            MemSize::Bit5 => (raw >> 5) & 1,
            MemSize::Bit6 => (raw >> 6) & 1,
            MemSize::Bit7 => (raw >> 7) & 1,
            MemSize::NibbleLower => raw & 0x0F,
            MemSize::NibbleUpper => (raw >> 4) & 0x0F,
            MemSize::BitCount => (raw & 0xFF).count_ones(),
            MemSize::EightBits => raw & 0xFF,
            MemSize::SixteenBits => raw & 0xFFFF,
            MemSize::TwentyFourBits => raw & 0x00FF_FFFF,
            MemSize::ThirtyTwoBits => raw,
        }
    }
}

/// One memory-read descriptor plus its memoized state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryReference {
    pub address: u32,
    pub size: MemSize,
    pub is_indirect: bool,
    /// Current resolved value as of the last update
    pub value: u32,
    /// Value as of the last update on which the value changed
    pub prior: u32,
    /// Whether the last update observed a different value
    pub changed: bool,
}

impl MemoryReference {
    fn new(address: u32, size: MemSize, is_indirect: bool) -> Self {
        Self {
            address,
            size,
            is_indirect,
            value: 0,
            prior: 0,
            changed: false,
        }
    }

    /// Fetch this reference at `effective_address` and apply the
    /// value-update rule.
    fn update(&mut self, effective_address: u32, peek: Option<&dyn MemoryPeek>) {
        let raw = match peek {
            Some(peek) => peek.peek(effective_address, self.size.bytes_needed()),
            None => 0,
        };
        let new_value = self.size.transform(raw);
        if new_value != self.value {
            self.prior = self.value;
            self.value = new_value;
            self.changed = true;
        } else {
            self.changed = false;
        }
    }
}

/// Index of a [`MemoryReference`] inside its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemrefHandle(usize);

/// Arena of memory references owned by a compiled trigger.
///
/// Insertion-ordered; the dedup scan for non-indirect acquires is a linear
/// search over the contiguous buffer.
#[derive(Debug, Clone, Default)]
pub struct MemrefPool {
    entries: Vec<MemoryReference>,
}

impl MemrefPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of references in the pool (shared and indirect)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no references
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get or create a reference for `(address, size)`.
    ///
    /// Non-indirect acquires share an existing entry with the same address
    /// and size; indirect acquires always append a fresh entry, since their
    /// effective address depends on a runtime-computed offset.
    pub fn acquire(&mut self, address: u32, size: MemSize, is_indirect: bool) -> MemrefHandle {
        if !is_indirect {
            for (idx, entry) in self.entries.iter().enumerate() {
                if !entry.is_indirect && entry.address == address && entry.size == size {
                    return MemrefHandle(idx);
                }
            }
        }
        self.entries.push(MemoryReference::new(address, size, is_indirect));
        MemrefHandle(self.entries.len() - 1)
    }

    /// Borrow the reference behind a handle
    pub fn get(&self, handle: MemrefHandle) -> &MemoryReference {
        &self.entries[handle.0]
    }

    /// Refresh every shared (non-indirect) reference, in insertion order.
    ///
    /// Must run once per frame before any condition evaluation so all
    /// shared references observe a single snapshot.
    pub fn refresh_all(&mut self, peek: Option<&dyn MemoryPeek>) {
        for entry in &mut self.entries {
            if !entry.is_indirect {
                let address = entry.address;
                entry.update(address, peek);
            }
        }
    }

    /// Refresh one indirect reference at `base + offset`, at the moment of
    /// use during evaluation.
    pub fn refresh_indirect(
        &mut self,
        handle: MemrefHandle,
        offset: u32,
        peek: Option<&dyn MemoryPeek>,
    ) {
        let entry = &mut self.entries[handle.0];
        debug_assert!(entry.is_indirect);
        let effective = entry.address.wrapping_add(offset);
        entry.update(effective, peek);
    }
}
