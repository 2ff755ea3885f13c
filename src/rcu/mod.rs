//! Snapshot publication: one writer, many concurrent readers.

pub mod buffer;
pub mod versioned;

pub use buffer::BufferRcu;
pub use versioned::{ReadHandle, Rcu};
