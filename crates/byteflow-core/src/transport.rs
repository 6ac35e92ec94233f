//! The streaming contracts: sources produce bytes, sinks consume them.
//!
//! Both traits move bytes through a [`Buffer`], so implementations can hand
//! whole segments around instead of copying. Anything that can supply bytes
//! (a file, a socket, a decompressor, another buffer) is a [`Source`];
//! anything that can accept them is a [`Sink`].

use crate::{buffer::Buffer, error::Result, timeout::Timeout};

/// Supplies a stream of bytes.
pub trait Source {
    /// Removes up to `byte_count` bytes from this source and appends them to
    /// `sink`. Returns the number of bytes moved, or `None` if this source
    /// is exhausted and no more bytes will ever arrive.
    fn read(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<Option<u64>>;

    /// Returns the timeout governing this source's blocking calls.
    fn timeout(&self) -> &Timeout {
        Timeout::none()
    }

    /// Closes this source and releases held resources. Idempotent.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives a stream of bytes.
pub trait Sink {
    /// Removes exactly `byte_count` bytes from `source` and appends them to
    /// this sink. On partial failure the sink is left in an unspecified but
    /// valid state.
    fn write(&mut self, source: &mut Buffer, byte_count: u64) -> Result<()>;

    /// Pushes any buffered bytes to the underlying resource.
    fn flush(&mut self) -> Result<()>;

    /// Returns the timeout governing this sink's blocking calls.
    fn timeout(&self) -> &Timeout {
        Timeout::none()
    }

    /// Flushes and closes this sink. Idempotent.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn read(&mut self, sink: &mut Buffer, byte_count: u64) -> Result<Option<u64>> {
        (**self).read(sink, byte_count)
    }

    fn timeout(&self) -> &Timeout {
        (**self).timeout()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write(&mut self, source: &mut Buffer, byte_count: u64) -> Result<()> {
        (**self).write(source, byte_count)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn timeout(&self) -> &Timeout {
        (**self).timeout()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
