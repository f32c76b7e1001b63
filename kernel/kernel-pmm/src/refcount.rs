//! Per-frame reference counts.

use alloc::boxed::Box;
use alloc::vec;
use kernel_frames::FrameNumber;
use kernel_sync::SpinLock;

/// One reference count per managed frame, mutated only under the table-wide
/// lock.
///
/// The count links the two halves of the allocator: it is zero exactly
/// while the frame sits on some CPU's free list, and `>= 1` exactly while
/// the frame is allocated. Counts only move through the methods below;
/// every transition that would break that linkage (incrementing a free
/// frame, decrementing past zero, re-initializing an allocated frame)
/// panics.
///
/// The table lock is independent of the per-CPU list locks and is never
/// held across a call into the pool.
pub struct RefCountTable {
    counts: SpinLock<Box<[u32]>>,
}

impl RefCountTable {
    /// A table for `frame_count` frames, all counts zero (free).
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        Self {
            counts: SpinLock::new(vec![0; frame_count].into_boxed_slice()),
        }
    }

    /// First reference to a frame that just left a free list: 0 → 1.
    ///
    /// # Panics
    /// If the count was not zero — the free list and the table disagree.
    pub fn set_initial(&self, frame: FrameNumber) {
        let mut counts = self.counts.lock();
        let count = &mut counts[frame.as_usize()];
        assert!(
            *count == 0,
            "allocator inconsistent: {frame:?} left a free list with refcount {count}"
        );
        *count = 1;
    }

    /// Add a sharer to an allocated frame.
    ///
    /// # Panics
    /// If the count is zero (the frame is free).
    pub fn inc(&self, frame: FrameNumber) {
        let mut counts = self.counts.lock();
        let count = &mut counts[frame.as_usize()];
        assert!(*count > 0, "refcount underflow: inc on free {frame:?}");
        *count += 1;
    }

    /// Drop one reference; `true` iff the count reached zero and the caller
    /// must return the frame to the pool.
    ///
    /// # Panics
    /// If the count is already zero (double free).
    pub fn dec_and_check(&self, frame: FrameNumber) -> bool {
        let mut counts = self.counts.lock();
        let count = &mut counts[frame.as_usize()];
        assert!(*count > 0, "refcount underflow: double free of {frame:?}");
        *count -= 1;
        *count == 0
    }

    /// The make-unique decrement, as a single lock acquisition.
    ///
    /// Returns `false` if the frame has exactly one holder: the count is
    /// untouched and the caller already owns the frame exclusively.
    /// Returns `true` if the frame was shared: one reference (the caller's)
    /// has been released and the remaining holders keep the frame.
    ///
    /// # Panics
    /// If the count is zero (the frame is free).
    pub fn release_if_shared(&self, frame: FrameNumber) -> bool {
        let mut counts = self.counts.lock();
        let count = &mut counts[frame.as_usize()];
        assert!(*count > 0, "refcount underflow: make_unique on free {frame:?}");
        if *count == 1 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Current count. Diagnostic; stale as soon as the lock drops.
    #[must_use]
    pub fn count(&self, frame: FrameNumber) -> u32 {
        self.counts.lock()[frame.as_usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_frames::{FrameRange, PhysicalAddress};

    fn frame() -> FrameNumber {
        let range = FrameRange::new(PhysicalAddress::new(0), PhysicalAddress::new(0x1000)).unwrap();
        range.frames().next().unwrap()
    }

    #[test]
    fn alloc_share_release_cycle() {
        let table = RefCountTable::new(1);
        let f = frame();
        assert_eq!(table.count(f), 0);

        table.set_initial(f);
        table.inc(f);
        table.inc(f);
        assert_eq!(table.count(f), 3);

        assert!(!table.dec_and_check(f));
        assert!(!table.dec_and_check(f));
        assert!(table.dec_and_check(f));
        assert_eq!(table.count(f), 0);
    }

    #[test]
    fn release_if_shared_keeps_exclusive_frames() {
        let table = RefCountTable::new(1);
        let f = frame();
        table.set_initial(f);
        assert!(!table.release_if_shared(f));
        assert_eq!(table.count(f), 1);
    }

    #[test]
    fn release_if_shared_drops_one_reference() {
        let table = RefCountTable::new(1);
        let f = frame();
        table.set_initial(f);
        table.inc(f);
        assert!(table.release_if_shared(f));
        assert_eq!(table.count(f), 1);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn decrement_of_free_frame_panics() {
        let table = RefCountTable::new(1);
        table.dec_and_check(frame());
    }

    #[test]
    #[should_panic(expected = "inc on free")]
    fn inc_of_free_frame_panics() {
        let table = RefCountTable::new(1);
        table.inc(frame());
    }

    #[test]
    #[should_panic(expected = "left a free list")]
    fn set_initial_on_allocated_frame_panics() {
        let table = RefCountTable::new(1);
        let f = frame();
        table.set_initial(f);
        table.set_initial(f);
    }
}
