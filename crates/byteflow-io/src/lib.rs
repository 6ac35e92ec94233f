#![warn(missing_docs)]

//! byteflow-io: buffered adapters over raw sources and sinks.
//!
//! A raw [`Source`](byteflow_core::Source) moves whole chunks of bytes; a
//! [`BufferedSource`] layers typed reads (integers, strings, byte strings)
//! and lookahead over it with an internal buffer. [`BufferedSink`] is the
//! mirror image for writes. The [`stream`] module bridges anything
//! implementing `std::io::Read`/`std::io::Write` (files, sockets, in-memory
//! cursors) into the source/sink world.

/// Typed writes over a raw sink.
pub mod buffered_sink;
/// Typed reads over a raw source.
pub mod buffered_source;
/// Bridges to `std::io` byte streams.
pub mod stream;

pub use buffered_sink::BufferedSink;
pub use buffered_source::BufferedSource;
pub use stream::{sink, source, ReaderSource, WriterSink};
