#![warn(missing_docs)]

//! Byteflow: a small public API facade for the workspace.
//!
//! This crate provides a clean, stable surface that re-exports the most
//! commonly used types for moving bytes between producers and consumers:
//!
//! - Buffers and byte strings (`Buffer`, `ByteString`)
//! - The streaming contracts (`Source`, `Sink`, `Timeout`)
//! - Buffered adapters and `std::io` bridges (`BufferedSource`,
//!   `BufferedSink`, `source`, `sink`)
//! - Compression adapters (`DeflaterSink`, `InflaterSource`, `GzipSink`,
//!   `GzipSource`)
//!
//! Example
//! ```
//! use byteflow::{Buffer, GzipSink, GzipSource, Sink, Source};
//!
//! // Gzip a message into an in-memory document. In real code the wrapped
//! // sink is usually a file or socket.
//! let mut document = Buffer::new();
//! let mut gzip = GzipSink::new(&mut document);
//! let mut data = Buffer::new();
//! data.write_utf8("It's a UNIX system! I know this!");
//! let size = data.size();
//! gzip.write(&mut data, size).unwrap();
//! gzip.close().unwrap();
//! drop(gzip);
//!
//! // Then read it back out.
//! let mut gunzip = GzipSource::new(document);
//! let mut plain = Buffer::new();
//! while gunzip.read(&mut plain, 8192).unwrap().is_some() {}
//! assert_eq!(plain.read_utf8_to_end().unwrap(), "It's a UNIX system! I know this!");
//! ```

// Buffers, byte strings, contracts, and constants
pub use byteflow_core::{
    pool, Buffer, ByteString, ErrorKind, Result, Sink, Source, Timeout, SEGMENT_SIZE,
    SHARE_MINIMUM,
};
// Buffered adapters and std::io bridges
pub use byteflow_io::{sink, source, BufferedSink, BufferedSource, ReaderSource, WriterSink};
// Compression adapters
pub use byteflow_codec::{DeflaterSink, GzipSink, GzipSource, InflaterSource};

/// Convenience prelude with the most commonly used items.
pub mod prelude {
    pub use crate::{
        Buffer, BufferedSink, BufferedSource, ByteString, ErrorKind, GzipSink, GzipSource,
        Result, Sink, Source, Timeout,
    };
}
