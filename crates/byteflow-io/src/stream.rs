//! Bridges between `std::io` byte streams and sources/sinks.
//!
//! Anything readable becomes a [`Source`] and anything writable becomes a
//! [`Sink`]: files, TCP streams, pipes, in-memory cursors. Transfers move at
//! most one segment per call, writing into buffer segments in place. These
//! adapters are where the attached [`Timeout`] is enforced: the deadline is
//! checked before every blocking call.

use std::{cmp, io};

use byteflow_core::{
    error::{ErrorKind, Result},
    Buffer, Sink, Source, Timeout,
};

/// Wraps `reader` as a [`Source`].
pub fn source<R: io::Read>(reader: R) -> ReaderSource<R> {
    ReaderSource { reader, timeout: Timeout::new() }
}

/// Wraps `writer` as a [`Sink`].
pub fn sink<W: io::Write>(writer: W) -> WriterSink<W> {
    WriterSink { writer, timeout: Timeout::new() }
}

/// A [`Source`] reading from any `std::io::Read` stream.
pub struct ReaderSource<R: io::Read> {
    reader: R,
    timeout: Timeout,
}

impl<R: io::Read> ReaderSource<R> {
    /// The wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// The timeout, for configuring a deadline.
    pub fn timeout_mut(&mut self) -> &mut Timeout {
        &mut self.timeout
    }

    /// Unwraps this adapter, returning the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: io::Read> Source for ReaderSource<R> {
    fn read(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<Option<u64>> {
        if byte_count == 0 {
            return Ok(Some(0));
        }
        self.timeout.throw_if_reached()?;
        let reader = &mut self.reader;
        let read = sink.with_writable(1, |dst| {
            let max = cmp::min(dst.len() as u64, byte_count) as usize;
            reader.read(&mut dst[..max])
        })?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(read as u64))
    }

    fn timeout(&self) -> &Timeout {
        &self.timeout
    }
}

/// A [`Sink`] writing to any `std::io::Write` stream.
pub struct WriterSink<W: io::Write> {
    writer: W,
    timeout: Timeout,
}

impl<W: io::Write> WriterSink<W> {
    /// The wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// The timeout, for configuring a deadline.
    pub fn timeout_mut(&mut self) -> &mut Timeout {
        &mut self.timeout
    }

    /// Unwraps this adapter, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> Sink for WriterSink<W> {
    fn write(&mut self, source: &mut Buffer, mut byte_count: u64) -> Result<()> {
        if byte_count > source.size() {
            return Err(ErrorKind::OutOfRange(format!(
                "byte_count {} exceeds source size {}",
                byte_count,
                source.size()
            )));
        }
        while byte_count > 0 {
            self.timeout.throw_if_reached()?;
            let chunk = source.chunk();
            let to_write = cmp::min(byte_count, chunk.len() as u64) as usize;
            self.writer.write_all(&chunk[..to_write])?;
            source.skip(to_write as u64)?;
            byte_count -= to_write as u64;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.timeout.throw_if_reached()?;
        self.writer.flush()?;
        Ok(())
    }

    fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
