//! Per-CPU free list.

use alloc::vec::Vec;
use kernel_frames::FrameNumber;

/// The free list owned by one logical CPU: a LIFO stack of frame numbers
/// plus an available-count kept redundantly as a cross-check.
///
/// The list is index-based rather than intrusive — freed frames are junk-
/// filled, so their contents are never reinterpreted as link pointers.
///
/// An instance is only ever touched under its owning lock (see
/// [`FramePool`](crate::FramePool)); the type itself carries no
/// synchronization.
#[derive(Debug, Default)]
pub struct PerCpuList {
    frames: Vec<FrameNumber>,
    avail: usize,
}

impl PerCpuList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            avail: 0,
        }
    }

    /// Push `frame` onto the list.
    pub fn push(&mut self, frame: FrameNumber) {
        self.frames.push(frame);
        self.avail += 1;
    }

    /// Pop the most recently freed frame, or `None` if the list is empty.
    ///
    /// # Panics
    /// If the available-count disagrees with the list length.
    pub fn pop(&mut self) -> Option<FrameNumber> {
        let frame = self.frames.pop()?;
        assert!(self.avail > 0, "per-CPU free list inconsistent: count 0 with non-empty list");
        self.avail -= 1;
        Some(frame)
    }

    /// Number of frames currently on the list.
    #[must_use]
    pub const fn available(&self) -> usize {
        self.avail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_frames::{FrameRange, PhysicalAddress};

    fn three_frames() -> [FrameNumber; 3] {
        let range = FrameRange::new(PhysicalAddress::new(0), PhysicalAddress::new(0x3000)).unwrap();
        let mut it = range.frames();
        [it.next().unwrap(), it.next().unwrap(), it.next().unwrap()]
    }

    #[test]
    fn lifo_order() {
        let [a, b, c] = three_frames();
        let mut list = PerCpuList::new();
        list.push(a);
        list.push(b);
        list.push(c);
        assert_eq!(list.available(), 3);
        assert_eq!(list.pop(), Some(c));
        assert_eq!(list.pop(), Some(b));
        assert_eq!(list.pop(), Some(a));
        assert_eq!(list.pop(), None);
        assert_eq!(list.available(), 0);
    }

    #[test]
    fn pop_on_empty_is_none_and_free() {
        let mut list = PerCpuList::new();
        assert_eq!(list.pop(), None);
        assert_eq!(list.pop(), None);
        assert_eq!(list.available(), 0);
    }
}
