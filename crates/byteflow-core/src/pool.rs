//! Process-wide recycling of segments.
//!
//! Buffers churn through segments quickly, so instead of allocating a fresh
//! page for every write the workspace keeps a capped free list. The pool is
//! lazily populated on first use and never torn down; once it is at capacity,
//! further recycled segments are simply dropped.

use std::sync::{Mutex, PoisonError};

use crate::segment::{Segment, SEGMENT_SIZE};

/// The maximum number of bytes the pool will retain.
pub const MAX_SIZE: usize = 64 * 1024;

/// A free list of empty segments with a byte budget.
///
/// The process-wide instance lives behind [`take`]/[`recycle`]; tests build
/// their own instances to observe the cap deterministically.
pub(crate) struct Pool {
    free: Vec<Segment>,
}

impl Pool {
    pub(crate) const fn new() -> Pool {
        Pool { free: Vec::new() }
    }

    /// Bytes currently retained by the free list.
    pub(crate) fn byte_count(&self) -> usize {
        self.free.len() * SEGMENT_SIZE
    }

    /// Returns a pooled segment, or a freshly allocated one when empty.
    pub(crate) fn take(&mut self) -> Segment {
        self.free.pop().unwrap_or_else(Segment::new)
    }

    /// Returns `segment` to the free list if there is budget for it.
    ///
    /// Shared segments and non-owner views are dropped: their backing
    /// arrays are still referenced elsewhere or were never theirs to reuse.
    pub(crate) fn recycle(&mut self, mut segment: Segment) {
        if !segment.is_owner() || segment.is_shared() {
            return;
        }
        if self.byte_count() + SEGMENT_SIZE > MAX_SIZE {
            return;
        }
        segment.reset();
        self.free.push(segment);
    }
}

static POOL: Mutex<Pool> = Mutex::new(Pool::new());

fn lock() -> std::sync::MutexGuard<'static, Pool> {
    POOL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Takes a fresh, empty, owned segment from the process-wide pool.
pub(crate) fn take() -> Segment {
    lock().take()
}

/// Offers `segment` back to the process-wide pool.
pub(crate) fn recycle(segment: Segment) {
    lock().recycle(segment);
}

/// Bytes currently retained by the process-wide pool. Never exceeds
/// [`MAX_SIZE`].
pub fn byte_count() -> usize {
    lock().byte_count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_prefers_pooled_segments() {
        let mut pool = Pool::new();
        let mut segment = pool.take();
        segment.extend_from_slice(b"abc");
        pool.recycle(segment);
        assert_eq!(pool.byte_count(), SEGMENT_SIZE);

        let segment = pool.take();
        assert_eq!(segment.len(), 0); // recycled segments come back empty
        assert_eq!(pool.byte_count(), 0);
    }

    #[test]
    fn recycle_stops_at_the_cap() {
        let mut pool = Pool::new();
        for _ in 0..(MAX_SIZE / SEGMENT_SIZE) * 2 {
            pool.recycle(Segment::new());
        }
        assert_eq!(pool.byte_count(), MAX_SIZE);
    }

    #[test]
    fn shared_and_view_segments_are_not_pooled() {
        let mut pool = Pool::new();

        let owner = Segment::new();
        let view = owner.share();
        pool.recycle(view); // not an owner
        assert_eq!(pool.byte_count(), 0);
        pool.recycle(owner); // still aliased by nothing now, but was shared above
        assert_eq!(pool.byte_count(), SEGMENT_SIZE);
    }

    #[test]
    fn global_pool_respects_cap() {
        // Other tests share the process-wide pool, so only the bound is
        // asserted here; exact counts are covered on local instances.
        for _ in 0..64 {
            recycle(Segment::new());
        }
        assert!(byte_count() <= MAX_SIZE);
    }
}
