//! A sink with an internal buffer and typed writes.

use std::io;

use byteflow_core::{
    error::{ErrorKind, Result},
    Buffer, ByteString, Sink, Source, Timeout, SEGMENT_SIZE,
};

/// Wraps a raw [`Sink`] with a buffer so callers can write typed values
/// without producing a downstream write per call.
///
/// Writes accumulate in the internal buffer; whenever at least one complete
/// segment is ready it is pushed to the wrapped sink, so small writes batch
/// up while bulk writes stream through. [`flush`](Sink::flush) forces
/// everything out.
pub struct BufferedSink<S: Sink> {
    sink: S,
    buffer: Buffer,
    closed: bool,
}

impl<S: Sink> BufferedSink<S> {
    /// Wraps `sink`.
    pub fn new(sink: S) -> BufferedSink<S> {
        BufferedSink { sink, buffer: Buffer::new(), closed: false }
    }

    /// The internal buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The internal buffer, mutably. Bytes written here reach the wrapped
    /// sink on the next emit or flush.
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// The wrapped sink.
    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    /// The wrapped sink, mutably.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(ErrorKind::Closed);
        }
        Ok(())
    }

    /// Pushes all complete segments to the wrapped sink.
    pub fn emit_complete_segments(&mut self) -> Result<()> {
        self.check_open()?;
        let byte_count = self.buffer.complete_segment_byte_count();
        if byte_count > 0 {
            self.sink.write(&mut self.buffer, byte_count)?;
        }
        Ok(())
    }

    /// Appends all of `source`.
    pub fn write_slice(&mut self, source: &[u8]) -> Result<()> {
        self.check_open()?;
        self.buffer.write_slice(source);
        self.emit_complete_segments()
    }

    /// Appends the content of `byte_string`.
    pub fn write_byte_string(&mut self, byte_string: &ByteString) -> Result<()> {
        self.check_open()?;
        self.buffer.write_byte_string(byte_string);
        self.emit_complete_segments()
    }

    /// Appends the UTF-8 encoding of `string`.
    pub fn write_utf8(&mut self, string: &str) -> Result<()> {
        self.check_open()?;
        self.buffer.write_utf8(string);
        self.emit_complete_segments()
    }

    /// Appends `string` under the named charset.
    pub fn write_string(&mut self, string: &str, charset: &str) -> Result<()> {
        self.check_open()?;
        self.buffer.write_string(string, charset)?;
        self.emit_complete_segments()
    }

    /// Appends one byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.check_open()?;
        self.buffer.write_u8(value);
        self.emit_complete_segments()
    }

    /// Appends a big-endian 16-bit integer.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.check_open()?;
        self.buffer.write_u16(value);
        self.emit_complete_segments()
    }

    /// Appends a little-endian 16-bit integer.
    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        self.check_open()?;
        self.buffer.write_u16_le(value);
        self.emit_complete_segments()
    }

    /// Appends a big-endian 32-bit integer.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.check_open()?;
        self.buffer.write_u32(value);
        self.emit_complete_segments()
    }

    /// Appends a little-endian 32-bit integer.
    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.check_open()?;
        self.buffer.write_u32_le(value);
        self.emit_complete_segments()
    }

    /// Appends a big-endian 64-bit integer.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.check_open()?;
        self.buffer.write_u64(value);
        self.emit_complete_segments()
    }

    /// Appends a little-endian 64-bit integer.
    pub fn write_u64_le(&mut self, value: u64) -> Result<()> {
        self.check_open()?;
        self.buffer.write_u64_le(value);
        self.emit_complete_segments()
    }

    /// Moves everything `source` produces into this sink, one segment at a
    /// time. Returns the total.
    pub fn write_all<R: Source>(&mut self, source: &mut R) -> Result<u64> {
        self.check_open()?;
        let mut total = 0u64;
        while let Some(read) = source.read(&mut self.buffer, SEGMENT_SIZE as u64)? {
            total += read;
            self.emit_complete_segments()?;
        }
        Ok(total)
    }
}

impl<S: Sink> Sink for BufferedSink<S> {
    fn write(&mut self, source: &mut Buffer, byte_count: u64) -> Result<()> {
        self.check_open()?;
        self.buffer.write(source, byte_count)?;
        self.emit_complete_segments()
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        let byte_count = self.buffer.size();
        if byte_count > 0 {
            self.sink.write(&mut self.buffer, byte_count)?;
        }
        self.sink.flush()
    }

    fn timeout(&self) -> &Timeout {
        self.sink.timeout()
    }

    /// Writes remaining buffered bytes, then closes the wrapped sink. Both
    /// steps run even if the first fails; the first error wins.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let mut first_error = None;
        let byte_count = self.buffer.size();
        if byte_count > 0 {
            if let Err(error) = self.sink.write(&mut self.buffer, byte_count) {
                first_error = Some(error);
            }
        }
        if let Err(error) = self.sink.close() {
            if first_error.is_none() {
                first_error = Some(error);
            } else {
                tracing::debug!("discarding secondary close error: {}", error);
            }
        }
        self.closed = true;
        self.buffer.clear();
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<S: Sink> io::Write for BufferedSink<S> {
    fn write(&mut self, source: &[u8]) -> io::Result<usize> {
        self.write_slice(source)?;
        Ok(source.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Sink::flush(self)?;
        Ok(())
    }
}

impl<S: Sink> Drop for BufferedSink<S> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(error) = self.close() {
                tracing::debug!("error closing sink on drop: {}", error);
            }
        }
    }
}
