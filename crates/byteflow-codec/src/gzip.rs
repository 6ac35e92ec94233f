//! GZIP framing (RFC 1952) over DEFLATE.

use std::io;

use byteflow_core::{
    error::{ErrorKind, Result},
    Buffer, Sink, Source, Timeout,
};
use byteflow_io::{BufferedSink, BufferedSource};
use crc32fast::Hasher;
use flate2::{Compress, Compression, Decompress};

use crate::deflate::{DeflaterSink, InflaterSource};

// Header flag bit indices.
const FHCRC: u8 = 1;
const FEXTRA: u8 = 2;
const FNAME: u8 = 3;
const FCOMMENT: u8 = 4;

/// Magic, method 8 (DEFLATE), no flags, zero mtime, no extra flags, unknown
/// operating system.
const HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0];

/// Streams a buffer's bytes into a CRC without copying them.
struct CrcWriter<'a>(&'a mut Hasher);

impl io::Write for CrcWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.update(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn update_crc(crc: &mut Hasher, buffer: &Buffer, offset: u64, byte_count: u64) -> Result<()> {
    buffer.copy_to(&mut CrcWriter(crc), offset, byte_count)
}

/// A [`Sink`] that GZIP-compresses everything written to it.
///
/// The fixed header is staged at construction; `close` finishes the DEFLATE
/// stream and appends the CRC-32/length trailer, so a `GzipSink` must be
/// closed to produce a valid document.
pub struct GzipSink<S: Sink> {
    deflater: DeflaterSink<S>,
    crc: Hasher,
    byte_count: u64,
    closed: bool,
}

impl<S: Sink> GzipSink<S> {
    /// Wraps `sink` with default-level compression.
    pub fn new(sink: S) -> GzipSink<S> {
        GzipSink::with_level(sink, Compression::default())
    }

    /// Wraps `sink` with an explicit compression level.
    pub fn with_level(sink: S, level: Compression) -> GzipSink<S> {
        let mut buffered = BufferedSink::new(sink);
        buffered.buffer_mut().write_slice(&HEADER);
        GzipSink {
            deflater: DeflaterSink::with_engine(buffered, Compress::new(level, false)),
            crc: Hasher::new(),
            byte_count: 0,
            closed: false,
        }
    }
}

impl<S: Sink> Sink for GzipSink<S> {
    fn write(&mut self, source: &mut Buffer, byte_count: u64) -> Result<()> {
        if self.closed {
            return Err(ErrorKind::Closed);
        }
        if byte_count > source.size() {
            return Err(ErrorKind::OutOfRange(format!(
                "byte_count {} exceeds source size {}",
                byte_count,
                source.size()
            )));
        }
        if byte_count == 0 {
            return Ok(());
        }
        // The trailer covers the uncompressed bytes; account for them on
        // the way into the encoder.
        update_crc(&mut self.crc, source, 0, byte_count)?;
        self.byte_count += byte_count;
        self.deflater.write(source, byte_count)
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(ErrorKind::Closed);
        }
        self.deflater.flush()
    }

    fn timeout(&self) -> &Timeout {
        self.deflater.timeout()
    }

    /// Finishes the DEFLATE stream, writes the trailer, and closes the
    /// wrapped sink. Every step runs even after an earlier failure; the
    /// first error is surfaced and later ones are logged.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let mut first_error = self.deflater.finish().err();

        let buffered = self.deflater.get_mut();
        buffered.buffer_mut().write_u32_le(self.crc.clone().finalize());
        buffered.buffer_mut().write_u32_le(self.byte_count as u32);

        if let Err(error) = buffered.close() {
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

impl<S: Sink> Drop for GzipSink<S> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(error) = self.close() {
                tracing::debug!("error closing gzip sink on drop: {}", error);
            }
        }
    }
}

enum Section {
    Header,
    Body,
    Trailer,
    Done,
}

/// A [`Source`] that decompresses a GZIP document read from a wrapped
/// source, validating the header and the CRC-32/length trailer.
pub struct GzipSource<S: Source> {
    inflater: InflaterSource<S>,
    crc: Hasher,
    section: Section,
}

impl<S: Source> GzipSource<S> {
    /// Wraps `source`.
    pub fn new(source: S) -> GzipSource<S> {
        GzipSource {
            inflater: InflaterSource::with_engine(
                BufferedSource::new(source),
                Decompress::new(false),
            ),
            crc: Hasher::new(),
            section: Section::Header,
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let Self { inflater, crc, .. } = self;
        let source = inflater.get_mut();
        source.require(10)?;

        // When the header carries its own CRC-16, every header byte counts
        // toward it; peek at the flags before consuming anything.
        let flags = source.buffer().get_byte(3)?;
        let fhcrc = (flags >> FHCRC) & 1 == 1;
        if fhcrc {
            update_crc(crc, source.buffer(), 0, 10)?;
        }

        let magic = source.read_u16()?;
        if magic != 0x1f8b {
            return Err(ErrorKind::Encoding(format!("bad gzip magic {:#06x}", magic)));
        }
        let method = source.read_u8()?;
        if method != 8 {
            return Err(ErrorKind::Unsupported(format!(
                "unsupported compression method {}",
                method
            )));
        }
        source.skip(1)?; // flags, examined above
        if flags & 0xe0 != 0 {
            return Err(ErrorKind::Unsupported("unsupported gzip flag".into()));
        }
        source.skip(6)?; // mtime, extra flags, operating system

        if (flags >> FEXTRA) & 1 == 1 {
            source.require(2)?;
            if fhcrc {
                update_crc(crc, source.buffer(), 0, 2)?;
            }
            let extra_len = source.read_u16_le()? as u64;
            source.require(extra_len)?;
            if fhcrc {
                update_crc(crc, source.buffer(), 0, extra_len)?;
            }
            source.skip(extra_len)?;
        }

        if (flags >> FNAME) & 1 == 1 {
            let terminator = source.index_of(0)?.ok_or(ErrorKind::Eof)?;
            if fhcrc {
                update_crc(crc, source.buffer(), 0, terminator + 1)?;
            }
            source.skip(terminator + 1)?;
        }

        if (flags >> FCOMMENT) & 1 == 1 {
            let terminator = source.index_of(0)?.ok_or(ErrorKind::Eof)?;
            if fhcrc {
                update_crc(crc, source.buffer(), 0, terminator + 1)?;
            }
            source.skip(terminator + 1)?;
        }

        if fhcrc {
            let expected = source.read_u16_le()?;
            let actual = (crc.clone().finalize() & 0xffff) as u16;
            if expected != actual {
                return Err(ErrorKind::Encoding("crc mismatch".into()));
            }
            crc.reset();
        }
        Ok(())
    }

    fn read_trailer(&mut self) -> Result<()> {
        let actual_crc = self.crc.clone().finalize();
        let actual_size = self.inflater.total_out() as u32;
        let source = self.inflater.get_mut();

        source.require(8)?;
        if source.read_u32_le()? != actual_crc {
            return Err(ErrorKind::Encoding("crc mismatch".into()));
        }
        if source.read_u32_le()? != actual_size {
            return Err(ErrorKind::Encoding("size mismatch".into()));
        }
        Ok(())
    }
}

impl<S: Source> Source for GzipSource<S> {
    fn read(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<Option<u64>> {
        if byte_count == 0 {
            return Ok(Some(0));
        }
        if matches!(self.section, Section::Header) {
            self.read_header()?;
            self.section = Section::Body;
        }
        if matches!(self.section, Section::Body) {
            match self.inflater.read(sink, byte_count)? {
                Some(read) => {
                    // The trailer covers the uncompressed output; fold in
                    // the bytes that just landed at the sink's tail.
                    update_crc(&mut self.crc, sink, sink.size() - read, read)?;
                    return Ok(Some(read));
                }
                None => self.section = Section::Trailer,
            }
        }
        if matches!(self.section, Section::Trailer) {
            self.read_trailer()?;
            self.section = Section::Done;
        }
        Ok(None)
    }

    fn timeout(&self) -> &Timeout {
        self.inflater.timeout()
    }

    fn close(&mut self) -> Result<()> {
        self.inflater.close()
    }
}
