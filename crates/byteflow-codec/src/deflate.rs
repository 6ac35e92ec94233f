//! Streaming DEFLATE adapters.
//!
//! Both adapters drive a low-level engine directly against buffer segments:
//! input is handed to the engine one head-segment slice at a time, and
//! output lands in the tail segment of the destination buffer in place.
//! Consumed input is released by advancing the upstream buffer's cursors by
//! the engine's reported intake, so no bytes are ever retained inside the
//! adapter.

use std::cmp;

use byteflow_core::{
    error::{ErrorKind, Result},
    Buffer, Sink, Source, Timeout,
};
use byteflow_io::{BufferedSink, BufferedSource};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

fn encoding_error(error: impl std::fmt::Display) -> ErrorKind {
    ErrorKind::Encoding(format!("deflate: {}", error))
}

/// A [`Sink`] that DEFLATE-compresses everything written to it.
///
/// Call [`finish`](DeflaterSink::finish) (or `close`, which implies it) to
/// terminate the compressed stream; an unterminated stream cannot be
/// inflated back in full.
pub struct DeflaterSink<S: Sink> {
    sink: BufferedSink<S>,
    deflater: Compress,
    closed: bool,
}

impl<S: Sink> DeflaterSink<S> {
    /// Compresses into a zlib-wrapped stream with the default level.
    pub fn new(sink: S) -> DeflaterSink<S> {
        DeflaterSink::with_engine(
            BufferedSink::new(sink),
            Compress::new(Compression::default(), true),
        )
    }

    /// Compresses into a raw DEFLATE stream, as used inside GZIP framing.
    pub fn new_raw(sink: S, level: Compression) -> DeflaterSink<S> {
        DeflaterSink::with_engine(BufferedSink::new(sink), Compress::new(level, false))
    }

    pub(crate) fn with_engine(sink: BufferedSink<S>, deflater: Compress) -> DeflaterSink<S> {
        DeflaterSink { sink, deflater, closed: false }
    }

    /// The wrapped buffered sink.
    pub fn get_mut(&mut self) -> &mut BufferedSink<S> {
        &mut self.sink
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(ErrorKind::Closed);
        }
        Ok(())
    }

    /// Runs the engine with no further input until it stops producing
    /// output, then pushes complete segments downstream. Returns true when
    /// the engine reported end of stream.
    fn drive(&mut self, flush: FlushCompress) -> Result<bool> {
        let Self { sink, deflater, .. } = &mut *self;
        let mut finished = false;
        loop {
            let out_before = deflater.total_out();
            let mut status = Status::Ok;
            sink.buffer_mut().with_writable(1, |out| {
                status = deflater.compress(&[], out, flush).map_err(encoding_error)?;
                Ok::<usize, ErrorKind>((deflater.total_out() - out_before) as usize)
            })?;
            if matches!(status, Status::StreamEnd) {
                finished = true;
                break;
            }
            if deflater.total_out() == out_before {
                break;
            }
        }
        sink.emit_complete_segments()?;
        Ok(finished)
    }

    /// Terminates the DEFLATE stream and pushes the remaining compressed
    /// bytes downstream. The wrapped sink stays open.
    pub fn finish(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.drive(FlushCompress::Finish)? {
            return Err(encoding_error("stream stalled before end"));
        }
        Ok(())
    }
}

impl<S: Sink> Sink for DeflaterSink<S> {
    fn write(&mut self, source: &mut Buffer, mut byte_count: u64) -> Result<()> {
        self.check_open()?;
        if byte_count > source.size() {
            return Err(ErrorKind::OutOfRange(format!(
                "byte_count {} exceeds source size {}",
                byte_count,
                source.size()
            )));
        }
        while byte_count > 0 {
            let head_len = cmp::min(byte_count, source.chunk().len() as u64) as usize;
            {
                // Split borrows: the chunk aliases `source`, the engine and
                // output buffer alias `self`.
                let chunk = &source.chunk()[..head_len];
                let Self { sink, deflater, .. } = &mut *self;
                let mut consumed = 0usize;
                while consumed < chunk.len() {
                    let in_before = deflater.total_in();
                    let out_before = deflater.total_out();
                    sink.buffer_mut().with_writable(1, |out| {
                        deflater
                            .compress(&chunk[consumed..], out, FlushCompress::None)
                            .map_err(encoding_error)?;
                        Ok::<usize, ErrorKind>((deflater.total_out() - out_before) as usize)
                    })?;
                    consumed += (deflater.total_in() - in_before) as usize;
                }
            }
            self.sink.emit_complete_segments()?;
            source.skip(head_len as u64)?;
            byte_count -= head_len as u64;
        }
        Ok(())
    }

    /// Emits a sync flush so everything written so far can be decompressed
    /// by the receiver, then flushes the wrapped sink.
    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.drive(FlushCompress::Sync)?;
        Sink::flush(&mut self.sink)
    }

    fn timeout(&self) -> &Timeout {
        self.sink.timeout()
    }

    /// Finishes the stream, then closes the wrapped sink. Every step runs;
    /// the first error wins.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let mut first_error = self.finish().err();
        if let Err(error) = self.sink.close() {
            if first_error.is_none() {
                first_error = Some(error);
            } else {
                tracing::debug!("discarding secondary close error: {}", error);
            }
        }
        self.closed = true;
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A [`Source`] that decompresses a DEFLATE stream read from a wrapped
/// source.
pub struct InflaterSource<S: Source> {
    source: BufferedSource<S>,
    inflater: Decompress,
    closed: bool,
}

impl<S: Source> InflaterSource<S> {
    /// Decompresses a zlib-wrapped stream.
    pub fn new(source: S) -> InflaterSource<S> {
        InflaterSource::with_engine(BufferedSource::new(source), Decompress::new(true))
    }

    /// Decompresses a raw DEFLATE stream, as used inside GZIP framing.
    pub fn new_raw(source: S) -> InflaterSource<S> {
        InflaterSource::with_engine(BufferedSource::new(source), Decompress::new(false))
    }

    pub(crate) fn with_engine(
        source: BufferedSource<S>,
        inflater: Decompress,
    ) -> InflaterSource<S> {
        InflaterSource { source, inflater, closed: false }
    }

    /// The wrapped buffered source. Bytes past the end of the DEFLATE
    /// stream (such as a framing trailer) remain readable here.
    pub fn get_mut(&mut self) -> &mut BufferedSource<S> {
        &mut self.source
    }

    /// Total bytes of decompressed output produced so far.
    pub fn total_out(&self) -> u64 {
        self.inflater.total_out()
    }
}

impl<S: Source> Source for InflaterSource<S> {
    fn read(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<Option<u64>> {
        if self.closed {
            return Err(ErrorKind::Closed);
        }
        if byte_count == 0 {
            return Ok(Some(0));
        }
        loop {
            // Refill one segment if the upstream buffer ran dry.
            let source_exhausted = self.source.exhausted()?;

            let Self { source, inflater, .. } = &mut *self;
            let input = source.buffer().chunk();
            let in_before = inflater.total_in();
            let out_before = inflater.total_out();
            let mut stream_end = false;
            let produced = sink.with_writable(1, |out| {
                let max = cmp::min(out.len() as u64, byte_count) as usize;
                let status = inflater
                    .decompress(input, &mut out[..max], FlushDecompress::None)
                    .map_err(encoding_error)?;
                stream_end = matches!(status, Status::StreamEnd);
                Ok::<usize, ErrorKind>((inflater.total_out() - out_before) as usize)
            })?;

            // Release the input the engine consumed.
            let consumed = inflater.total_in() - in_before;
            if consumed > 0 {
                source.buffer_mut().skip(consumed)?;
            }

            if produced > 0 {
                return Ok(Some(produced as u64));
            }
            if stream_end {
                return Ok(None);
            }
            if source_exhausted {
                // The engine needs input that will never arrive.
                return Err(ErrorKind::Eof);
            }
        }
    }

    fn timeout(&self) -> &Timeout {
        self.source.timeout()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.source.close()
    }
}
