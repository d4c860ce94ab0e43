//! memtrigger
//!
//! A memory-condition trigger evaluation engine compatible with the
//! RetroAchievements condition language. Condition strings describing
//! tests over a running program's memory (used for achievements,
//! leaderboards, rich-presence values, and cheats) are compiled into a
//! shared, memoizing representation and re-evaluated once per emulated
//! frame against live memory.
//!
//! The engine performs no I/O of its own: the host supplies a
//! [`MemoryPeek`] capability that resolves `(address, byte width)` to a
//! value, calls [`Trigger::evaluate`] once per frame, and reacts to the
//! returned hit/fired/measured state.
//!
//! # Example
//!
//! ```
//! use memtrigger::{SliceMemory, Trigger};
//!
//! // 8-bit value at 0x1234 must equal 10 on five frames
//! let mut trigger = Trigger::parse("0xH1234=10(5)").unwrap();
//! let mut mem = SliceMemory::new(vec![0u8; 0x2000]);
//! mem.poke(0x1234, 10);
//!
//! for frame in 1..=5 {
//!     let result = trigger.evaluate(Some(&mem));
//!     assert_eq!(result.fired, frame == 5);
//! }
//! ```

pub mod condition;
pub mod defs;
pub mod error;
pub mod memory;

pub use condition::{
    Condition, ConditionGroup, ConditionOperator, ConditionType, GroupResult, Operand, Trigger,
    TriggerResult,
};
pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use memory::{MemSize, MemoryPeek, MemoryReference, MemrefHandle, MemrefPool, SliceMemory};

/// Parse a complete trigger string (core group plus optional `S` separated
/// alternate groups). Convenience wrapper around [`Trigger::parse`].
pub fn parse_trigger(source: &str) -> ParseResult<Trigger> {
    Trigger::parse(source)
}
