//! The allocator façade: alloc / free / inc_ref / make_unique.

use core::ptr;

use kernel_frames::{FrameNumber, FrameRange, PageSize, PhysicalAddress, Size4K};

use crate::error::AllocError;
use crate::phys_map::PhysMapper;
use crate::pool::FramePool;
use crate::refcount::RefCountTable;

/// Byte written over a frame on allocation, so reads of memory the caller
/// never initialized stand out.
pub const ALLOC_FILL: u8 = 0x05;

/// Byte written over a frame when its last reference is freed, so dangling
/// reads stand out. Distinct from [`ALLOC_FILL`].
pub const FREE_FILL: u8 = 0x01;

/// Physical page-frame allocator over one contiguous range.
///
/// Composes the per-CPU free lists ([`FramePool`]) with the frame
/// reference counts ([`RefCountTable`]) and owns the only code paths that
/// move a frame between "free on some CPU's list" and "allocated with
/// count n".
///
/// The type is `Sync`; all operations take `&self` and may run
/// concurrently from any core. Callers identify themselves by CPU index,
/// which selects the free list to prefer — nothing else about the
/// operation is CPU-specific.
///
/// Constructing an instance *is* initialization: there is no separate init
/// call to forget or repeat, and tests can hold several isolated
/// allocators at once.
pub struct FrameAllocator<M> {
    range: FrameRange,
    pool: FramePool,
    refs: RefCountTable,
    mapper: M,
}

impl<M: PhysMapper> FrameAllocator<M> {
    /// Take ownership of `range` and distribute its frames round-robin
    /// over `cpu_count` free lists.
    ///
    /// Must complete before any other core calls into the allocator.
    ///
    /// # Safety
    /// - The memory covered by `range` must be owned by the caller,
    ///   writable, and unused by anything else from here on.
    /// - `mapper` must translate every address in `range` to a valid
    ///   pointer for as long as the allocator lives.
    ///
    /// # Panics
    /// If `cpu_count` is zero.
    pub unsafe fn new(range: FrameRange, cpu_count: usize, mapper: M) -> Self {
        let pool = FramePool::new(cpu_count);
        let refs = RefCountTable::new(range.frame_count());
        pool.distribute(&range);
        log::info!(
            "pmm: managing {} frames at [{}, {}) across {cpu_count} CPUs",
            range.frame_count(),
            range.base(),
            range.limit(),
        );
        Self {
            range,
            pool,
            refs,
            mapper,
        }
    }

    /// Allocate one frame, preferring `cpu`'s free list and stealing from
    /// peers when it is empty. The frame comes back with reference count 1
    /// and its contents set to [`ALLOC_FILL`].
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] when every free list is empty.
    pub fn alloc(&self, cpu: usize) -> Result<PhysicalAddress, AllocError> {
        let Some(frame) = self.pool.alloc_on(cpu) else {
            log::debug!("pmm: cpu{cpu} found no free frame anywhere");
            return Err(AllocError::OutOfMemory);
        };
        self.refs.set_initial(frame);
        let addr = self.range.address_of(frame);
        // Safety: count just became 1 and no mapping to the frame exists
        // yet, so this core is the sole holder.
        unsafe { self.fill(addr, ALLOC_FILL) };
        Ok(addr)
    }

    /// Drop one reference to the frame at `addr`. When the last reference
    /// goes, the contents are overwritten with [`FREE_FILL`] and the frame
    /// is pushed onto *`cpu`'s* free list — not the list it was first
    /// distributed to.
    ///
    /// # Panics
    /// If `addr` is misaligned or outside the managed range, or if the
    /// frame is already free (double free).
    pub fn free(&self, addr: PhysicalAddress, cpu: usize) {
        let frame = self.checked_frame(addr);
        if self.refs.dec_and_check(frame) {
            // Safety: the count just hit zero, so no holder remains; the
            // frame is not yet on any free list either.
            unsafe { self.fill(addr, FREE_FILL) };
            self.pool.free_on(cpu, frame);
        }
    }

    /// Add a sharer to the frame at `addr` without copying it — the
    /// copy-on-write half of address-space duplication.
    ///
    /// # Panics
    /// If `addr` is invalid or the frame is free.
    pub fn inc_ref(&self, addr: PhysicalAddress) {
        self.refs.inc(self.checked_frame(addr));
    }

    /// Give the caller a frame it holds exclusively, duplicating the page
    /// on demand — the write-fault half of copy-on-write.
    ///
    /// With a single holder this returns `addr` unchanged. With several,
    /// the caller's reference is released, a fresh frame is allocated on
    /// `cpu`, the page contents are copied over, and the copy's address is
    /// returned.
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if the frame was shared and no frame
    /// could be allocated for the copy. The caller's reference is gone
    /// either way: `addr` still belongs to the remaining sharers and must
    /// not be written through. The fault handler is expected to treat this
    /// as fatal for the faulting process.
    ///
    /// # Panics
    /// If `addr` is invalid or the frame is free.
    pub fn make_unique(
        &self,
        addr: PhysicalAddress,
        cpu: usize,
    ) -> Result<PhysicalAddress, AllocError> {
        let frame = self.checked_frame(addr);
        if !self.refs.release_if_shared(frame) {
            // Sole holder; the common case once the other sharers wrote.
            return Ok(addr);
        }

        let copy = self.alloc(cpu)?;
        // Safety: `copy` has count 1 and no mapping yet, so no lock is
        // needed while writing it. The source stays mapped read-only by
        // the remaining sharers.
        unsafe {
            ptr::copy_nonoverlapping(
                self.mapper.phys_to_ptr(addr),
                self.mapper.phys_to_ptr(copy),
                Size4K::SIZE as usize,
            );
        }
        Ok(copy)
    }

    /// Reference count of the frame at `addr`. Diagnostic; stale
    /// immediately under concurrency.
    ///
    /// # Panics
    /// If `addr` is misaligned or outside the managed range.
    #[must_use]
    pub fn ref_count(&self, addr: PhysicalAddress) -> u32 {
        self.refs.count(self.checked_frame(addr))
    }

    /// Frames currently free on `cpu`'s list.
    #[must_use]
    pub fn available_on(&self, cpu: usize) -> usize {
        self.pool.available_on(cpu)
    }

    /// Free frames across all lists. Advisory under concurrency.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.pool.free_frames()
    }

    /// Total frames in the managed range.
    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.range.frame_count()
    }

    /// The managed range.
    #[must_use]
    pub const fn range(&self) -> &FrameRange {
        &self.range
    }

    /// Number of per-CPU free lists.
    #[must_use]
    pub fn cpu_count(&self) -> usize {
        self.pool.cpu_count()
    }

    /// Validate an externally supplied address. A bad address is a caller
    /// bug, not a recoverable condition.
    fn checked_frame(&self, addr: PhysicalAddress) -> FrameNumber {
        match self.range.frame_number(addr) {
            Ok(frame) => frame,
            Err(err) => panic!("invalid physical address: {err}"),
        }
    }

    /// Overwrite the whole frame at `addr` with `byte`.
    ///
    /// # Safety
    /// The calling core must be the frame's sole holder (or the frame must
    /// be off every free list with count zero, mid-free).
    unsafe fn fill(&self, addr: PhysicalAddress, byte: u8) {
        unsafe {
            ptr::write_bytes(self.mapper.phys_to_ptr(addr), byte, Size4K::SIZE as usize);
        }
    }
}
