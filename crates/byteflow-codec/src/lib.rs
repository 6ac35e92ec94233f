#![warn(missing_docs)]

//! byteflow-codec: compressed-stream adapters.
//!
//! [`DeflaterSink`] and [`InflaterSource`] move bytes through a DEFLATE
//! engine (RFC 1951) on their way to or from a wrapped sink or source.
//! [`GzipSink`] and [`GzipSource`] add GZIP framing (RFC 1952): header,
//! CRC-32, and length trailer.

/// DEFLATE compression and decompression adapters.
pub mod deflate;
/// GZIP framing over DEFLATE.
pub mod gzip;

pub use deflate::{DeflaterSink, InflaterSource};
pub use gzip::{GzipSink, GzipSource};
