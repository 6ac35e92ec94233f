//! A mutable FIFO queue of bytes backed by a list of segments.

use std::{
    cmp,
    collections::VecDeque,
    fmt,
    hash::{Hash, Hasher},
    io,
};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use md5::{Digest, Md5};

use crate::{
    byte_string::ByteString,
    error::{ErrorKind, Result},
    pool,
    segment::{Segment, SEGMENT_SIZE},
    transport::{Sink, Source},
};

/// A queue of bytes: writes append at the tail, reads consume from the head.
///
/// Internally the bytes live in a list of fixed-size segments. Moving data
/// between buffers relinks whole segments wherever possible, so large
/// transfers cost pointer updates rather than copies. A buffer is both a
/// [`Source`] and a [`Sink`], which lets it terminate any adapter chain.
///
/// Buffers are single-owner values; the segments they release are returned
/// to the process-wide pool on drop.
#[derive(Default)]
pub struct Buffer {
    segments: VecDeque<Segment>,
    size: u64,
}

impl Buffer {
    /// An empty buffer.
    pub fn new() -> Buffer {
        Buffer::default()
    }

    /// The number of readable bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// True when this buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Discards all bytes, releasing the segments to the pool.
    pub fn clear(&mut self) {
        while let Some(segment) = self.segments.pop_front() {
            pool::recycle(segment);
        }
        self.size = 0;
    }

    /// The sum of the sizes of all full leading segments. Adapters use this
    /// to decide how much can be pushed downstream without breaking up a
    /// partially-filled tail.
    pub fn complete_segment_byte_count(&self) -> u64 {
        let mut result = self.size;
        if result == 0 {
            return 0;
        }
        if let Some(tail) = self.segments.back() {
            if tail.limit() < SEGMENT_SIZE && tail.is_owner() {
                result -= tail.len() as u64;
            }
        }
        result
    }

    /// The readable bytes of the head segment, or an empty slice. Combined
    /// with [`Buffer::skip`] this gives adapters chunked access to the
    /// content without draining it into an intermediate allocation.
    pub fn chunk(&self) -> &[u8] {
        self.segments.front().map_or(&[], |segment| segment.data())
    }

    fn writable_segment(&mut self, minimum: usize) -> &mut Segment {
        debug_assert!(minimum >= 1 && minimum <= SEGMENT_SIZE);
        let fits = self.segments.back().map_or(false, |tail| tail.can_append(minimum));
        if !fits {
            self.segments.push_back(pool::take());
        }
        self.segments.back_mut().expect("writable_segment leaves a tail")
    }

    fn drop_empty_tail(&mut self) {
        if self.segments.back().map_or(false, Segment::is_empty) {
            if let Some(tail) = self.segments.pop_back() {
                pool::recycle(tail);
            }
        }
    }

    /// Exposes at least `minimum` writable bytes at the tail to `f`, which
    /// returns how many it filled in. Cursors and the buffer size advance by
    /// that count. This is the in-place write path used by stream and codec
    /// adapters to avoid staging output in a scratch allocation.
    pub fn with_writable<E, F>(&mut self, minimum: usize, f: F) -> std::result::Result<usize, E>
    where
        F: FnOnce(&mut [u8]) -> std::result::Result<usize, E>,
    {
        let outcome = {
            let tail = self.writable_segment(minimum);
            let available = SEGMENT_SIZE - tail.limit();
            match f(tail.writable()) {
                Ok(written) => {
                    assert!(written <= available, "writer overflowed the segment");
                    tail.add_limit(written);
                    Ok(written)
                }
                Err(error) => Err(error),
            }
        };
        match outcome {
            Ok(written) => {
                self.size += written as u64;
                if written == 0 {
                    self.drop_empty_tail();
                }
                Ok(written)
            }
            Err(error) => {
                self.drop_empty_tail();
                Err(error)
            }
        }
    }

    // --- writes ---

    /// Appends all of `source`.
    pub fn write_slice(&mut self, source: &[u8]) {
        let mut offset = 0;
        while offset < source.len() {
            let tail = self.writable_segment(1);
            let to_copy = cmp::min(source.len() - offset, SEGMENT_SIZE - tail.limit());
            tail.extend_from_slice(&source[offset..offset + to_copy]);
            offset += to_copy;
            self.size += to_copy as u64;
        }
    }

    /// Appends the content of `byte_string`.
    pub fn write_byte_string(&mut self, byte_string: &ByteString) {
        self.write_slice(byte_string.as_slice());
    }

    /// Appends the UTF-8 encoding of `string`.
    pub fn write_utf8(&mut self, string: &str) {
        self.write_slice(string.as_bytes());
    }

    /// Appends `string` under the named charset. `"utf-8"` and `"utf-32"`
    /// (big-endian, no BOM) are supported.
    pub fn write_string(&mut self, string: &str, charset: &str) -> Result<()> {
        match charset.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => {
                self.write_utf8(string);
                Ok(())
            }
            "utf-32" | "utf32" | "utf-32be" => {
                for c in string.chars() {
                    self.write_u32(c as u32);
                }
                Ok(())
            }
            _ => Err(ErrorKind::Unsupported(format!("unsupported encoding {}", charset))),
        }
    }

    /// Multi-byte integers are kept contiguous within one segment so the
    /// matching read never straddles a boundary it wrote itself.
    fn write_integer_bytes(&mut self, encoded: &[u8]) {
        let tail = self.writable_segment(encoded.len());
        tail.extend_from_slice(encoded);
        self.size += encoded.len() as u64;
    }

    /// Appends one byte.
    pub fn write_u8(&mut self, value: u8) {
        self.write_integer_bytes(&[value]);
    }

    /// Appends a big-endian 16-bit integer.
    pub fn write_u16(&mut self, value: u16) {
        let mut encoded = [0; 2];
        BigEndian::write_u16(&mut encoded, value);
        self.write_integer_bytes(&encoded);
    }

    /// Appends a little-endian 16-bit integer.
    pub fn write_u16_le(&mut self, value: u16) {
        let mut encoded = [0; 2];
        LittleEndian::write_u16(&mut encoded, value);
        self.write_integer_bytes(&encoded);
    }

    /// Appends a big-endian 32-bit integer.
    pub fn write_u32(&mut self, value: u32) {
        let mut encoded = [0; 4];
        BigEndian::write_u32(&mut encoded, value);
        self.write_integer_bytes(&encoded);
    }

    /// Appends a little-endian 32-bit integer.
    pub fn write_u32_le(&mut self, value: u32) {
        let mut encoded = [0; 4];
        LittleEndian::write_u32(&mut encoded, value);
        self.write_integer_bytes(&encoded);
    }

    /// Appends a big-endian 64-bit integer.
    pub fn write_u64(&mut self, value: u64) {
        let mut encoded = [0; 8];
        BigEndian::write_u64(&mut encoded, value);
        self.write_integer_bytes(&encoded);
    }

    /// Appends a little-endian 64-bit integer.
    pub fn write_u64_le(&mut self, value: u64) {
        let mut encoded = [0; 8];
        LittleEndian::write_u64(&mut encoded, value);
        self.write_integer_bytes(&encoded);
    }

    // --- reads ---

    fn require(&self, byte_count: u64) -> Result<()> {
        if self.size < byte_count {
            return Err(ErrorKind::Eof);
        }
        Ok(())
    }

    /// Copies up to `sink.len()` bytes out of the buffer, returning the
    /// count; zero only when the buffer is empty or `sink` is empty.
    fn read_some(&mut self, sink: &mut [u8]) -> usize {
        let Some(head) = self.segments.front_mut() else { return 0 };
        let to_copy = cmp::min(head.len(), sink.len());
        sink[..to_copy].copy_from_slice(&head.data()[..to_copy]);
        head.consume(to_copy);
        let emptied = head.is_empty();
        self.size -= to_copy as u64;
        if emptied {
            if let Some(head) = self.segments.pop_front() {
                pool::recycle(head);
            }
        }
        to_copy
    }

    /// Fills `sink` exactly, or fails with end-of-data leaving the buffer
    /// untouched.
    pub fn read_exact_slice(&mut self, sink: &mut [u8]) -> Result<()> {
        self.require(sink.len() as u64)?;
        let mut offset = 0;
        while offset < sink.len() {
            offset += self.read_some(&mut sink[offset..]);
        }
        Ok(())
    }

    /// Removes one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut encoded = [0; 1];
        self.read_exact_slice(&mut encoded)?;
        Ok(encoded[0])
    }

    /// Removes a big-endian 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut encoded = [0; 2];
        self.read_exact_slice(&mut encoded)?;
        Ok(BigEndian::read_u16(&encoded))
    }

    /// Removes a little-endian 16-bit integer.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let mut encoded = [0; 2];
        self.read_exact_slice(&mut encoded)?;
        Ok(LittleEndian::read_u16(&encoded))
    }

    /// Removes a big-endian 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut encoded = [0; 4];
        self.read_exact_slice(&mut encoded)?;
        Ok(BigEndian::read_u32(&encoded))
    }

    /// Removes a little-endian 32-bit integer.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let mut encoded = [0; 4];
        self.read_exact_slice(&mut encoded)?;
        Ok(LittleEndian::read_u32(&encoded))
    }

    /// Removes a big-endian 64-bit integer.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut encoded = [0; 8];
        self.read_exact_slice(&mut encoded)?;
        Ok(BigEndian::read_u64(&encoded))
    }

    /// Removes a little-endian 64-bit integer.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        let mut encoded = [0; 8];
        self.read_exact_slice(&mut encoded)?;
        Ok(LittleEndian::read_u64(&encoded))
    }

    /// Removes `byte_count` bytes as a vector.
    pub fn read_byte_array(&mut self, byte_count: u64) -> Result<Vec<u8>> {
        self.require(byte_count)?;
        let mut result = vec![0; byte_count as usize];
        self.read_exact_slice(&mut result)?;
        Ok(result)
    }

    /// Removes all bytes as a vector.
    pub fn read_byte_array_to_end(&mut self) -> Result<Vec<u8>> {
        self.read_byte_array(self.size)
    }

    /// Removes `byte_count` bytes as an immutable byte string.
    pub fn read_byte_string(&mut self, byte_count: u64) -> Result<ByteString> {
        Ok(ByteString::from(self.read_byte_array(byte_count)?))
    }

    /// Removes all bytes as an immutable byte string.
    pub fn read_byte_string_to_end(&mut self) -> Result<ByteString> {
        self.read_byte_string(self.size)
    }

    /// Removes `byte_count` bytes and decodes them as UTF-8.
    pub fn read_utf8(&mut self, byte_count: u64) -> Result<String> {
        String::from_utf8(self.read_byte_array(byte_count)?)
            .map_err(|_| ErrorKind::Encoding("invalid utf-8".into()))
    }

    /// Removes all bytes and decodes them as UTF-8.
    pub fn read_utf8_to_end(&mut self) -> Result<String> {
        self.read_utf8(self.size)
    }

    /// Removes `byte_count` bytes and decodes them under the named charset.
    pub fn read_string(&mut self, byte_count: u64, charset: &str) -> Result<String> {
        match charset.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => self.read_utf8(byte_count),
            "utf-32" | "utf32" | "utf-32be" => {
                if byte_count % 4 != 0 {
                    return Err(ErrorKind::Encoding("encoding error: truncated code point".into()));
                }
                let encoded = self.read_byte_array(byte_count)?;
                let mut result = String::with_capacity(encoded.len() / 4);
                for group in encoded.chunks_exact(4) {
                    let code_point = BigEndian::read_u32(group);
                    let c = char::from_u32(code_point).ok_or_else(|| {
                        ErrorKind::Encoding(format!("encoding error: bad code point {:#x}", code_point))
                    })?;
                    result.push(c);
                }
                Ok(result)
            }
            _ => Err(ErrorKind::Unsupported(format!("unsupported encoding {}", charset))),
        }
    }

    /// Removes all bytes and decodes them under the named charset.
    pub fn read_string_to_end(&mut self, charset: &str) -> Result<String> {
        self.read_string(self.size, charset)
    }

    /// The byte at logical offset `index`, without consuming anything.
    pub fn get_byte(&self, index: u64) -> Result<u8> {
        if index >= self.size {
            return Err(ErrorKind::OutOfRange(format!("index {} size {}", index, self.size)));
        }
        let mut remaining = index;
        for segment in &self.segments {
            let len = segment.len() as u64;
            if remaining < len {
                return Ok(segment.data()[remaining as usize]);
            }
            remaining -= len;
        }
        unreachable!("index checked against size")
    }

    /// The first offset at or after `from_index` holding `byte`, if any.
    pub fn index_of(&self, byte: u8, from_index: u64) -> Option<u64> {
        let mut offset = 0u64;
        for segment in &self.segments {
            let data = segment.data();
            let len = data.len() as u64;
            if offset + len <= from_index {
                offset += len;
                continue;
            }
            let start = from_index.saturating_sub(offset) as usize;
            if let Some(found) = data[start..].iter().position(|&b| b == byte) {
                return Some(offset + (start + found) as u64);
            }
            offset += len;
        }
        None
    }

    /// Discards `byte_count` bytes from the head, releasing fully consumed
    /// segments to the pool.
    pub fn skip(&mut self, mut byte_count: u64) -> Result<()> {
        self.require(byte_count)?;
        while byte_count > 0 {
            let head = self.segments.front_mut().expect("sized buffer has a head");
            let to_skip = cmp::min(byte_count, head.len() as u64);
            head.consume(to_skip as usize);
            let emptied = head.is_empty();
            byte_count -= to_skip;
            self.size -= to_skip;
            if emptied {
                if let Some(head) = self.segments.pop_front() {
                    pool::recycle(head);
                }
            }
        }
        Ok(())
    }

    // --- streams ---

    /// Copies bytes `[offset, offset + byte_count)` to `out` without
    /// consuming them.
    pub fn copy_to<W: io::Write>(&self, out: &mut W, offset: u64, byte_count: u64) -> Result<()> {
        check_offset_and_count(self.size, offset, byte_count)?;
        let mut offset = offset;
        let mut remaining = byte_count;
        for segment in &self.segments {
            if remaining == 0 {
                break;
            }
            let data = segment.data();
            let len = data.len() as u64;
            if offset >= len {
                offset -= len;
                continue;
            }
            let to_write = cmp::min(len - offset, remaining) as usize;
            let start = offset as usize;
            out.write_all(&data[start..start + to_write])?;
            remaining -= to_write as u64;
            offset = 0;
        }
        Ok(())
    }

    /// Removes `byte_count` bytes, writing them to `out`.
    pub fn write_to<W: io::Write>(&mut self, out: &mut W, mut byte_count: u64) -> Result<()> {
        check_offset_and_count(self.size, 0, byte_count)?;
        while byte_count > 0 {
            let head = self.segments.front_mut().expect("sized buffer has a head");
            let to_write = cmp::min(byte_count, head.len() as u64) as usize;
            out.write_all(&head.data()[..to_write])?;
            head.consume(to_write);
            let emptied = head.is_empty();
            byte_count -= to_write as u64;
            self.size -= to_write as u64;
            if emptied {
                if let Some(head) = self.segments.pop_front() {
                    pool::recycle(head);
                }
            }
        }
        Ok(())
    }

    /// Appends everything `input` produces, returning the byte count.
    pub fn read_from<R: io::Read>(&mut self, input: &mut R) -> Result<u64> {
        let mut total = 0u64;
        loop {
            let read = self.with_writable(1, |sink| input.read(sink))?;
            if read == 0 {
                return Ok(total);
            }
            total += read as u64;
        }
    }

    /// Appends exactly `byte_count` bytes from `input`, failing with
    /// end-of-data if it runs dry first.
    pub fn read_from_exact<R: io::Read>(
        &mut self,
        input: &mut R,
        mut byte_count: u64,
    ) -> Result<()> {
        while byte_count > 0 {
            let read = self.with_writable(1, |sink| {
                let max = cmp::min(sink.len() as u64, byte_count) as usize;
                input.read(&mut sink[..max])
            })?;
            if read == 0 {
                return Err(ErrorKind::Eof);
            }
            byte_count -= read as u64;
        }
        Ok(())
    }

    // --- buffer-to-buffer transfer ---

    /// Moves `byte_count` bytes from the head of `source` to the tail of
    /// this buffer.
    ///
    /// Whole segments move by relinking. A transfer that would take only
    /// part of a segment first tries to copy into spare room at this
    /// buffer's tail; failing that, the source's head segment is split
    /// (sharing the backing array for large prefixes) so the prefix can be
    /// relinked. Relinked segments are absorbed into the tail when both
    /// halves fit in one page, keeping buffers from accumulating short
    /// segments under chatty write patterns.
    pub fn write(&mut self, source: &mut Buffer, mut byte_count: u64) -> Result<()> {
        if byte_count > source.size {
            return Err(ErrorKind::OutOfRange(format!(
                "byte_count {} exceeds source size {}",
                byte_count, source.size
            )));
        }
        while byte_count > 0 {
            let head_len = source.segments.front().map_or(0, Segment::len);
            debug_assert!(head_len > 0, "sized source has a non-empty head");

            if (byte_count as usize) < head_len {
                // The transfer ends inside the source's head segment.
                let tail_fits = self.segments.back().map_or(false, |tail| {
                    tail.is_owner() && {
                        let reclaimable = if tail.is_shared() { 0 } else { tail.pos() };
                        byte_count as usize + tail.limit() - reclaimable <= SEGMENT_SIZE
                    }
                });
                if tail_fits {
                    let head = source.segments.front_mut().expect("sized source has a head");
                    let tail = self.segments.back_mut().expect("tail checked above");
                    head.write_to(tail, byte_count as usize);
                    source.size -= byte_count;
                    self.size += byte_count;
                    return Ok(());
                }
                let prefix = source
                    .segments
                    .front_mut()
                    .expect("sized source has a head")
                    .split(byte_count as usize);
                source.segments.push_front(prefix);
                // The prefix now moves as a whole segment below.
            }

            let mut head = source.segments.pop_front().expect("sized source has a head");
            let moved = head.len() as u64;
            let absorbed = match self.segments.back_mut() {
                Some(tail) if tail.is_owner() && !tail.is_shared() => {
                    let incoming = head.len();
                    if incoming + tail.limit() - tail.pos() <= SEGMENT_SIZE {
                        head.write_to(tail, incoming);
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if absorbed {
                pool::recycle(head);
            } else {
                self.segments.push_back(head);
            }
            source.size -= moved;
            self.size += moved;
            byte_count -= moved;
        }
        Ok(())
    }

    /// Moves all bytes into `sink` as a single write, returning the count.
    pub fn read_all<S: Sink>(&mut self, sink: &mut S) -> Result<u64> {
        let byte_count = self.size;
        if byte_count > 0 {
            sink.write(self, byte_count)?;
        }
        Ok(byte_count)
    }

    /// Moves everything `source` produces into this buffer, one segment at
    /// a time, returning the total.
    pub fn write_all<S: Source>(&mut self, source: &mut S) -> Result<u64> {
        let mut total = 0u64;
        while let Some(read) = source.read(self, SEGMENT_SIZE as u64)? {
            total += read;
        }
        Ok(total)
    }

    /// 31-polynomial hash over the logical bytes, independent of the
    /// segment layout.
    fn hash_code(&self) -> i32 {
        let mut result = 1i32;
        for segment in &self.segments {
            for &byte in segment.data() {
                result = result.wrapping_mul(31).wrapping_add(byte as i8 as i32);
            }
        }
        result
    }

    #[cfg(test)]
    fn segment_sizes(&self) -> Vec<usize> {
        self.segments.iter().map(Segment::len).collect()
    }
}

fn check_offset_and_count(size: u64, offset: u64, byte_count: u64) -> Result<()> {
    match offset.checked_add(byte_count) {
        Some(end) if end <= size => Ok(()),
        _ => Err(ErrorKind::OutOfRange(format!(
            "size {} offset {} byte_count {}",
            size, offset, byte_count
        ))),
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.clear();
    }
}

/// A deep-logical copy: both buffers share the backing arrays but own
/// independent cursors, so reads and writes on one never affect the other.
impl Clone for Buffer {
    fn clone(&self) -> Buffer {
        Buffer { segments: self.segments.iter().map(Segment::share).collect(), size: self.size }
    }
}

impl Source for Buffer {
    fn read(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<Option<u64>> {
        if self.size == 0 {
            return Ok(None);
        }
        let to_read = cmp::min(byte_count, self.size);
        sink.write(self, to_read)?;
        Ok(Some(to_read))
    }
}

impl Sink for Buffer {
    fn write(&mut self, source: &mut Buffer, byte_count: u64) -> Result<()> {
        Buffer::write(self, source, byte_count)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Equality over the logical byte sequence, whatever the segment layout.
impl PartialEq for Buffer {
    fn eq(&self, other: &Buffer) -> bool {
        if self.size != other.size {
            return false;
        }
        let mut our_segments = self.segments.iter().map(|s| s.data());
        let mut their_segments = other.segments.iter().map(|s| s.data());
        let mut ours: &[u8] = &[];
        let mut theirs: &[u8] = &[];
        loop {
            if ours.is_empty() {
                // Equal sizes: both iterators run out together.
                ours = match our_segments.next() {
                    Some(data) => data,
                    None => return true,
                };
            }
            if theirs.is_empty() {
                theirs = match their_segments.next() {
                    Some(data) => data,
                    None => return true,
                };
            }
            let overlap = cmp::min(ours.len(), theirs.len());
            if ours[..overlap] != theirs[..overlap] {
                return false;
            }
            ours = &ours[overlap..];
            theirs = &theirs[overlap..];
        }
    }
}

impl Eq for Buffer {}

impl Hash for Buffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size == 0 {
            return write!(f, "Buffer[size=0]");
        }
        if self.size <= 16 {
            let mut data = Vec::with_capacity(self.size as usize);
            for segment in &self.segments {
                data.extend_from_slice(segment.data());
            }
            write!(f, "Buffer[size={} data={}]", self.size, hex::encode(data))
        } else {
            let mut digest = Md5::new();
            for segment in &self.segments {
                digest.update(segment.data());
            }
            write!(f, "Buffer[size={} md5={}]", self.size, hex::encode(digest.finalize()))
        }
    }
}

impl io::Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_some(buf))
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
