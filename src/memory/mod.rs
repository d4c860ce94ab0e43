//! Memory layer: the host-supplied read capability and the deduplicating
//! memory-reference pool.

mod memref;
mod peek;

pub use memref::{MemSize, MemoryReference, MemrefHandle, MemrefPool};
pub use peek::{MemoryPeek, SliceMemory};
