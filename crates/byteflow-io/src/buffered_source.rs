//! A source with an internal buffer and typed reads.

use std::{cmp, io};

use byteflow_core::{
    error::{ErrorKind, Result},
    Buffer, ByteString, Sink, Source, Timeout, SEGMENT_SIZE,
};

/// Wraps a raw [`Source`] with a buffer so callers can read typed values
/// and look ahead without caring how bytes arrive from the wire.
///
/// Refills pull one segment at a time from the wrapped source, so lookahead
/// never buffers more than one segment beyond what a caller asked for.
/// After [`close`](Source::close), every read fails with
/// [`ErrorKind::Closed`].
pub struct BufferedSource<S: Source> {
    source: S,
    buffer: Buffer,
    closed: bool,
}

impl<S: Source> BufferedSource<S> {
    /// Wraps `source`.
    pub fn new(source: S) -> BufferedSource<S> {
        BufferedSource { source, buffer: Buffer::new(), closed: false }
    }

    /// The internal buffer. Callers may inspect buffered bytes without
    /// consuming them.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The internal buffer, mutably. Pre-populating it is allowed; typed
    /// reads consume buffered bytes before touching the wrapped source.
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// The wrapped source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// The wrapped source, mutably.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(ErrorKind::Closed);
        }
        Ok(())
    }

    /// Ensures the buffer holds at least `byte_count` bytes, reading from
    /// the wrapped source one segment at a time. Fails with end-of-data if
    /// the source is exhausted first.
    pub fn require(&mut self, byte_count: u64) -> Result<()> {
        self.check_open()?;
        while self.buffer.size() < byte_count {
            if self.source.read(&mut self.buffer, SEGMENT_SIZE as u64)?.is_none() {
                return Err(ErrorKind::Eof);
            }
        }
        Ok(())
    }

    /// True when the buffer is empty and the wrapped source has no more
    /// bytes. May block to find out.
    pub fn exhausted(&mut self) -> Result<bool> {
        self.check_open()?;
        if !self.buffer.is_empty() {
            return Ok(false);
        }
        Ok(self.source.read(&mut self.buffer, SEGMENT_SIZE as u64)?.is_none())
    }

    /// Removes one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        self.buffer.read_u8()
    }

    /// Removes a big-endian 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.require(2)?;
        self.buffer.read_u16()
    }

    /// Removes a little-endian 16-bit integer.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.require(2)?;
        self.buffer.read_u16_le()
    }

    /// Removes a big-endian 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        self.buffer.read_u32()
    }

    /// Removes a little-endian 32-bit integer.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.require(4)?;
        self.buffer.read_u32_le()
    }

    /// Removes a big-endian 64-bit integer.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.require(8)?;
        self.buffer.read_u64()
    }

    /// Removes a little-endian 64-bit integer.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.require(8)?;
        self.buffer.read_u64_le()
    }

    /// Removes `byte_count` bytes and decodes them as UTF-8.
    pub fn read_utf8(&mut self, byte_count: u64) -> Result<String> {
        self.require(byte_count)?;
        self.buffer.read_utf8(byte_count)
    }

    /// Reads the wrapped source to exhaustion and decodes everything as
    /// UTF-8.
    pub fn read_utf8_to_end(&mut self) -> Result<String> {
        self.check_open()?;
        self.buffer.write_all(&mut self.source)?;
        self.buffer.read_utf8_to_end()
    }

    /// Removes `byte_count` bytes as a byte string.
    pub fn read_byte_string(&mut self, byte_count: u64) -> Result<ByteString> {
        self.require(byte_count)?;
        self.buffer.read_byte_string(byte_count)
    }

    /// Reads the wrapped source to exhaustion, returning everything as a
    /// byte string.
    pub fn read_byte_string_to_end(&mut self) -> Result<ByteString> {
        self.check_open()?;
        self.buffer.write_all(&mut self.source)?;
        self.buffer.read_byte_string_to_end()
    }

    /// Removes `byte_count` bytes as a vector.
    pub fn read_byte_array(&mut self, byte_count: u64) -> Result<Vec<u8>> {
        self.require(byte_count)?;
        self.buffer.read_byte_array(byte_count)
    }

    /// Reads the wrapped source to exhaustion, returning everything as a
    /// vector.
    pub fn read_byte_array_to_end(&mut self) -> Result<Vec<u8>> {
        self.check_open()?;
        self.buffer.write_all(&mut self.source)?;
        self.buffer.read_byte_array_to_end()
    }

    /// Discards `byte_count` bytes, refilling from the wrapped source as
    /// needed. Fails with end-of-data if the stream runs dry first.
    pub fn skip(&mut self, mut byte_count: u64) -> Result<()> {
        self.check_open()?;
        while byte_count > 0 {
            if self.buffer.is_empty()
                && self.source.read(&mut self.buffer, SEGMENT_SIZE as u64)?.is_none()
            {
                return Err(ErrorKind::Eof);
            }
            let to_skip = cmp::min(byte_count, self.buffer.size());
            self.buffer.skip(to_skip)?;
            byte_count -= to_skip;
        }
        Ok(())
    }

    /// The first offset holding `byte`, reading more data until it is found
    /// or the source is exhausted.
    pub fn index_of(&mut self, byte: u8) -> Result<Option<u64>> {
        self.check_open()?;
        let mut from_index = 0u64;
        loop {
            if let Some(found) = self.buffer.index_of(byte, from_index) {
                return Ok(Some(found));
            }
            from_index = self.buffer.size();
            if self.source.read(&mut self.buffer, SEGMENT_SIZE as u64)?.is_none() {
                return Ok(None);
            }
        }
    }

    /// Moves everything to `sink`, pulling one segment at a time so memory
    /// stays bounded regardless of the stream length. Returns the total.
    pub fn read_all<K: Sink>(&mut self, sink: &mut K) -> Result<u64> {
        self.check_open()?;
        let mut total = 0u64;
        while self.source.read(&mut self.buffer, SEGMENT_SIZE as u64)?.is_some() {
            let emit = self.buffer.complete_segment_byte_count();
            if emit > 0 {
                total += emit;
                sink.write(&mut self.buffer, emit)?;
            }
        }
        let remaining = self.buffer.size();
        if remaining > 0 {
            total += remaining;
            sink.write(&mut self.buffer, remaining)?;
        }
        Ok(total)
    }
}

impl<S: Source> Source for BufferedSource<S> {
    fn read(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<Option<u64>> {
        self.check_open()?;
        if self.buffer.is_empty()
            && self.source.read(&mut self.buffer, SEGMENT_SIZE as u64)?.is_none()
        {
            return Ok(None);
        }
        let to_read = cmp::min(byte_count, self.buffer.size());
        self.buffer.read(sink, to_read)
    }

    fn timeout(&self) -> &Timeout {
        self.source.timeout()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.source.close();
        self.buffer.clear();
        result
    }
}

/// The blocking byte-stream view: an empty internal buffer triggers a refill
/// from the wrapped source before any bytes are copied out, so `Ok(0)` means
/// true exhaustion. After `close`, reads fail.
impl<S: Source> io::Read for BufferedSource<S> {
    fn read(&mut self, sink: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(ErrorKind::Closed.into());
        }
        if sink.is_empty() {
            return Ok(0);
        }
        if self.buffer.is_empty()
            && self
                .source
                .read(&mut self.buffer, SEGMENT_SIZE as u64)
                .map_err(io::Error::from)?
                .is_none()
        {
            return Ok(0);
        }
        io::Read::read(&mut self.buffer, sink)
    }
}

impl<S: Source> Drop for BufferedSource<S> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(error) = self.close() {
                tracing::debug!("error closing source on drop: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeat(c: char, count: usize) -> String {
        std::iter::repeat(c).take(count).collect()
    }

    fn buffer_of(content: &str) -> Buffer {
        let mut buffer = Buffer::new();
        buffer.write_utf8(content);
        buffer
    }

    #[test]
    fn require_tracks_buffer_first() {
        let source = buffer_of("bb");
        let mut buffered = BufferedSource::new(source);
        buffered.buffer_mut().write_utf8("aa");

        buffered.require(2).unwrap();
        assert_eq!(buffered.buffer().size(), 2);
        assert_eq!(buffered.get_ref().size(), 2);
    }

    #[test]
    fn require_includes_buffer_bytes() {
        let source = buffer_of("b");
        let mut buffered = BufferedSource::new(source);
        buffered.buffer_mut().write_utf8("a");

        buffered.require(2).unwrap();
        assert_eq!(buffered.buffer_mut().read_utf8(2).unwrap(), "ab");
    }

    #[test]
    fn require_insufficient_data() {
        let source = buffer_of("a");
        let mut buffered = BufferedSource::new(source);
        assert!(matches!(buffered.require(2), Err(ErrorKind::Eof)));
    }

    #[test]
    fn require_reads_one_segment_at_a_time() {
        let mut source = Buffer::new();
        source.write_utf8(&repeat('a', SEGMENT_SIZE));
        source.write_utf8(&repeat('b', SEGMENT_SIZE));

        let mut buffered = BufferedSource::new(source);
        buffered.require(2).unwrap();
        assert_eq!(buffered.get_ref().size(), SEGMENT_SIZE as u64);
        assert_eq!(buffered.buffer().size(), SEGMENT_SIZE as u64);
    }

    #[test]
    fn skip_insufficient_data() {
        let source = buffer_of("a");
        let mut buffered = BufferedSource::new(source);
        assert!(matches!(buffered.skip(2), Err(ErrorKind::Eof)));
    }

    #[test]
    fn skip_reads_one_segment_at_a_time() {
        let mut source = Buffer::new();
        source.write_utf8(&repeat('a', SEGMENT_SIZE));
        source.write_utf8(&repeat('b', SEGMENT_SIZE));

        let mut buffered = BufferedSource::new(source);
        buffered.skip(2).unwrap();
        assert_eq!(buffered.get_ref().size(), SEGMENT_SIZE as u64);
        assert_eq!(buffered.buffer().size(), (SEGMENT_SIZE - 2) as u64);
    }

    #[test]
    fn skip_tracks_buffer_first() {
        let source = buffer_of("bb");
        let mut buffered = BufferedSource::new(source);
        buffered.buffer_mut().write_utf8("aa");

        buffered.skip(2).unwrap();
        assert_eq!(buffered.buffer().size(), 0);
        assert_eq!(buffered.get_ref().size(), 2);
    }

    #[test]
    fn typed_reads_delegate_to_buffer() {
        let mut source = Buffer::new();
        source.write_slice(&[0xab, 0xcd, 0xef, 0x01, 0x87, 0x65, 0x43, 0x21]);
        let mut buffered = BufferedSource::new(source);
        assert_eq!(buffered.read_u32().unwrap(), 0xabcdef01);
        assert_eq!(buffered.read_u32().unwrap(), 0x87654321);
        assert!(matches!(buffered.read_u8(), Err(ErrorKind::Eof)));
    }

    #[test]
    fn index_of_refills_until_found() {
        let mut source = Buffer::new();
        source.write_utf8(&repeat('a', SEGMENT_SIZE * 2));
        source.write_utf8("b");
        let mut buffered = BufferedSource::new(source);
        assert_eq!(buffered.index_of(b'b').unwrap(), Some((SEGMENT_SIZE * 2) as u64));
        assert_eq!(buffered.index_of(b'c').unwrap(), None);
    }

    #[test]
    fn operations_after_close() {
        let mut buffered = BufferedSource::new(Buffer::new());
        buffered.close().unwrap();

        assert!(matches!(buffered.index_of(b'a'), Err(ErrorKind::Closed)));
        assert!(matches!(buffered.skip(1), Err(ErrorKind::Closed)));
        assert!(matches!(buffered.read_u8(), Err(ErrorKind::Closed)));
        assert!(matches!(buffered.read_byte_string(10), Err(ErrorKind::Closed)));

        let mut sink = [0u8; 10];
        assert!(io::Read::read(&mut buffered, &mut sink).is_err());
        let mut single = [0u8; 1];
        assert!(io::Read::read(&mut buffered, &mut single).is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let mut buffered = BufferedSource::new(buffer_of("abc"));
        buffered.close().unwrap();
        buffered.close().unwrap();
    }

    #[test]
    fn read_all_drains_buffer_and_source() {
        let mut buffered = BufferedSource::new(buffer_of("def"));
        buffered.buffer_mut().write_utf8("abc");

        let mut sink = Buffer::new();
        assert_eq!(buffered.read_all(&mut sink).unwrap(), 6);
        assert_eq!(sink.read_utf8(6).unwrap(), "abcdef");
        assert!(buffered.exhausted().unwrap());
    }

    #[test]
    fn read_all_exhausted() {
        let mut buffered = BufferedSource::new(Buffer::new());
        let mut sink = Buffer::new();
        assert_eq!(buffered.read_all(&mut sink).unwrap(), 0);
        assert!(buffered.exhausted().unwrap());
    }

    /// Streaming move: one segment is buffered, pushed, and reused, instead
    /// of accumulating the whole stream in memory.
    #[test]
    fn read_all_reads_one_segment_at_a_time() {
        let mut source = Buffer::new();
        source.write_utf8(&repeat('a', SEGMENT_SIZE));
        source.write_utf8(&repeat('b', SEGMENT_SIZE));
        source.write_utf8(&repeat('c', SEGMENT_SIZE));

        struct CountingSink {
            writes: Vec<u64>,
            content: Buffer,
        }
        impl Sink for CountingSink {
            fn write(&mut self, source: &mut Buffer, byte_count: u64) -> Result<()> {
                self.writes.push(byte_count);
                self.content.write(source, byte_count)
            }
            fn flush(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let mut sink = CountingSink { writes: Vec::new(), content: Buffer::new() };
        let mut buffered = BufferedSource::new(source);
        assert_eq!(buffered.read_all(&mut sink).unwrap(), (SEGMENT_SIZE * 3) as u64);
        assert_eq!(
            sink.writes,
            vec![SEGMENT_SIZE as u64, SEGMENT_SIZE as u64, SEGMENT_SIZE as u64]
        );
    }

    #[test]
    fn read_byte_array_to_end() {
        let string = format!("abcd{}", repeat('e', SEGMENT_SIZE));
        let mut buffered = BufferedSource::new(buffer_of(&string));
        assert_eq!(buffered.read_byte_array_to_end().unwrap(), string.as_bytes());
    }

    #[test]
    fn read_byte_string_partial() {
        let mut buffered = BufferedSource::new(buffer_of("abcd"));
        assert_eq!(buffered.read_byte_string(3).unwrap().utf8().unwrap(), "abc");
        assert_eq!(buffered.read_utf8(1).unwrap(), "d");
    }

    #[test]
    fn io_read_buffers_one_segment() {
        let mut source = Buffer::new();
        source.write_utf8("a");
        source.write_utf8(&repeat('b', SEGMENT_SIZE));
        source.write_utf8("c");

        let mut buffered = BufferedSource::new(source);
        assert_eq!(buffered.buffer().size(), 0);

        // Reading one byte buffers a full segment.
        let mut byte = [0u8; 1];
        assert_eq!(io::Read::read(&mut buffered, &mut byte).unwrap(), 1);
        assert_eq!(byte[0], b'a');
        assert_eq!(buffered.buffer().size(), (SEGMENT_SIZE - 1) as u64);
        assert_eq!(buffered.get_ref().size(), 2);

        // A bulk read takes the rest of the buffered segment.
        let mut sink = vec![0u8; SEGMENT_SIZE * 2];
        assert_eq!(io::Read::read(&mut buffered, &mut sink).unwrap(), SEGMENT_SIZE - 1);
        assert_eq!(&sink[..SEGMENT_SIZE - 1], repeat('b', SEGMENT_SIZE - 1).as_bytes());
        assert_eq!(buffered.get_ref().size(), 2);

        // Continuing buffers the next segment.
        assert_eq!(io::Read::read(&mut buffered, &mut byte).unwrap(), 1);
        assert_eq!(byte[0], b'b');
        assert_eq!(buffered.buffer().size(), 1);
        assert_eq!(buffered.get_ref().size(), 0);

        assert_eq!(io::Read::read(&mut buffered, &mut byte).unwrap(), 1);
        assert_eq!(byte[0], b'c');

        // Exhausted now.
        assert_eq!(io::Read::read(&mut buffered, &mut byte).unwrap(), 0);
    }
}
