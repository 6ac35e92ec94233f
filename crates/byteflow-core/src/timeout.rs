//! Deadlines and time caps for blocking stream operations.

use std::time::{Duration, Instant};

use crate::error::{ErrorKind, Result};

/// A policy value attached to a source or sink.
///
/// `Timeout` itself enforces nothing; concrete stream adapters consult it
/// before (and during) blocking calls. The `timeout` caps the duration of a
/// single call, while the `deadline` is an absolute point in time after
/// which all further calls fail with [`ErrorKind::TimedOut`].
#[derive(Debug, Default)]
pub struct Timeout {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

static NONE: Timeout = Timeout::new();

impl Timeout {
    /// Creates a timeout with no time cap and no deadline.
    pub const fn new() -> Timeout {
        Timeout { timeout: None, deadline: None }
    }

    /// A shared no-op timeout for streams that do not support timing out.
    pub fn none() -> &'static Timeout {
        &NONE
    }

    /// Caps the duration a single blocking call may take.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Timeout {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the per-call time cap.
    pub fn clear_timeout(&mut self) -> &mut Timeout {
        self.timeout = None;
        self
    }

    /// Sets an absolute deadline after which blocking calls fail.
    pub fn set_deadline(&mut self, deadline: Instant) -> &mut Timeout {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `duration` from now.
    pub fn deadline_after(&mut self, duration: Duration) -> &mut Timeout {
        self.set_deadline(Instant::now() + duration)
    }

    /// Removes the deadline.
    pub fn clear_deadline(&mut self) -> &mut Timeout {
        self.deadline = None;
        self
    }

    /// Returns the per-call time cap, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the absolute deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with [`ErrorKind::TimedOut`] if the deadline has been reached.
    ///
    /// Stream adapters call this before every blocking operation.
    pub fn throw_if_reached(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ErrorKind::TimedOut),
            _ => Ok(()),
        }
    }
}
