#![warn(missing_docs)]

//! byteflow-core: segmented byte buffers and the streaming contracts.
//!
//! This crate provides the foundation the rest of the workspace builds on:
//! - [`Buffer`]: a FIFO byte queue backed by pooled, fixed-size segments,
//!   with typed read/write primitives and zero-copy buffer-to-buffer moves
//! - [`ByteString`]: an immutable, hashable byte sequence with codec helpers
//! - [`Source`] / [`Sink`]: the contracts every stream adapter implements
//! - [`Timeout`]: the cancellation hook consulted by blocking adapters
//! - A process-wide segment pool capped at [`pool::MAX_SIZE`] bytes
//!
//! Adapters over operating-system streams and compressed formats live in the
//! `byteflow-io` and `byteflow-codec` crates.

/// FIFO byte queues built from segments.
pub mod buffer;
/// Immutable byte sequences with codec helpers.
pub mod byte_string;
/// Error types and the `Result` alias.
pub mod error;
/// Segment recycling.
pub mod pool;
/// Deadlines for blocking calls.
pub mod timeout;
/// The `Source` and `Sink` contracts.
pub mod transport;

mod segment;

pub use buffer::Buffer;
pub use byte_string::ByteString;
pub use error::{ErrorKind, Result};
pub use segment::{SEGMENT_SIZE, SHARE_MINIMUM};
pub use timeout::Timeout;
pub use transport::{Sink, Source};
