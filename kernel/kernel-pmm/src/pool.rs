//! The fixed collection of per-CPU free lists and the stealing policy.

use alloc::boxed::Box;
use alloc::vec::Vec;
use kernel_frames::{FrameNumber, FrameRange};
use kernel_sync::SpinLock;

use crate::percpu::PerCpuList;

/// One [`PerCpuList`] per core, each behind its own spin lock.
///
/// Locking rule: every operation acquires at most one list lock at a time.
/// The stealing loop in [`FramePool::alloc_on`] probes victims through
/// self-contained scoped locks, so no lock ordering between peers can
/// arise and peers cannot deadlock.
pub struct FramePool {
    cpus: Box<[SpinLock<PerCpuList>]>,
}

impl FramePool {
    /// An empty pool for `cpu_count` cores.
    ///
    /// # Panics
    /// If `cpu_count` is zero.
    #[must_use]
    pub fn new(cpu_count: usize) -> Self {
        assert!(cpu_count > 0, "frame pool needs at least one CPU");
        let cpus: Vec<_> = (0..cpu_count)
            .map(|_| SpinLock::new(PerCpuList::new()))
            .collect();
        Self {
            cpus: cpus.into_boxed_slice(),
        }
    }

    /// Number of per-CPU lists.
    #[must_use]
    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    /// Hand every frame of `range` to a CPU, round-robin. Init-time only:
    /// runs before any other core touches the pool.
    pub fn distribute(&self, range: &FrameRange) {
        let n = self.cpus.len();
        for (i, frame) in range.frames().enumerate() {
            self.cpus[i % n].lock().push(frame);
        }
        for (cpu, list) in self.cpus.iter().enumerate() {
            log::debug!("cpu{cpu}: {} frames", list.lock().available());
        }
    }

    /// Allocate a frame for `cpu`: local list first, then peers in
    /// descending index order. A stolen frame goes straight to the caller;
    /// it is never re-homed to the requesting CPU's list.
    ///
    /// Returns `None` when every list is empty (out of memory).
    pub fn alloc_on(&self, cpu: usize) -> Option<FrameNumber> {
        if let Some(frame) = self.cpus[cpu].lock().pop() {
            return Some(frame);
        }

        for victim in (0..self.cpus.len()).rev() {
            if victim == cpu {
                continue;
            }
            if let Some(frame) = self.cpus[victim].lock().pop() {
                log::trace!("cpu{cpu}: borrowed {frame:?} from cpu{victim}");
                return Some(frame);
            }
        }
        None
    }

    /// Return `frame` to the *freeing* CPU's list, regardless of where it
    /// was first distributed. Frames drift toward whichever core frees
    /// them most.
    pub fn free_on(&self, cpu: usize, frame: FrameNumber) {
        self.cpus[cpu].lock().push(frame);
    }

    /// Frames currently free on `cpu`'s list.
    #[must_use]
    pub fn available_on(&self, cpu: usize) -> usize {
        self.cpus[cpu].lock().available()
    }

    /// Total free frames across all lists. Advisory under concurrency.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.cpus.iter().map(|c| c.lock().available()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_frames::PhysicalAddress;

    fn pool_with_frames(cpus: usize, frames: usize) -> (FramePool, FrameRange) {
        let range = FrameRange::new(
            PhysicalAddress::new(0),
            PhysicalAddress::new(frames as u64 * 4096),
        )
        .unwrap();
        let pool = FramePool::new(cpus);
        pool.distribute(&range);
        (pool, range)
    }

    #[test]
    fn distribute_is_round_robin() {
        let (pool, _) = pool_with_frames(3, 8);
        // 8 frames over 3 CPUs: 3, 3, 2
        assert_eq!(pool.available_on(0), 3);
        assert_eq!(pool.available_on(1), 3);
        assert_eq!(pool.available_on(2), 2);
        assert_eq!(pool.free_frames(), 8);
    }

    #[test]
    fn local_list_drains_before_stealing() {
        let (pool, _) = pool_with_frames(2, 4);
        // cpu0 owns frames 0 and 2, LIFO order
        assert!(pool.alloc_on(0).is_some());
        assert!(pool.alloc_on(0).is_some());
        assert_eq!(pool.available_on(0), 0);
        assert_eq!(pool.available_on(1), 2);
    }

    #[test]
    fn steals_from_peer_when_empty() {
        let (pool, range) = pool_with_frames(2, 2);
        let local = pool.alloc_on(0).unwrap();
        let stolen = pool.alloc_on(0).unwrap();
        assert_ne!(local, stolen);
        assert_eq!(pool.available_on(1), 0);
        // stolen frame was cpu1's
        assert_eq!(range.address_of(stolen).as_u64(), 0x1000);
    }

    #[test]
    fn stolen_frames_return_to_the_freeing_cpu() {
        let (pool, _) = pool_with_frames(2, 2);
        let _ = pool.alloc_on(0).unwrap();
        let stolen = pool.alloc_on(0).unwrap();
        pool.free_on(0, stolen);
        assert_eq!(pool.available_on(0), 1);
        assert_eq!(pool.available_on(1), 0);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let (pool, _) = pool_with_frames(2, 2);
        assert!(pool.alloc_on(0).is_some());
        assert!(pool.alloc_on(1).is_some());
        assert_eq!(pool.alloc_on(0), None);
        assert_eq!(pool.alloc_on(1), None);
    }
}
