//! Physical-to-pointer translation for frame contents.
//!
//! The allocator touches frame memory in two places: sentinel fills on
//! alloc/free and the page copy in `make_unique`. Rust code can only
//! dereference virtual addresses, and how a physical address becomes one
//! differs between a kernel with a direct map and the host test harness —
//! so the strategy sits behind a trait.

use kernel_frames::PhysicalAddress;

/// Translates a physical address into a dereferenceable pointer.
pub trait PhysMapper {
    /// Pointer through which the frame starting at `pa` can be read and
    /// written.
    ///
    /// # Safety
    /// - `pa` must lie within memory the caller owns and the mapping must
    ///   cover the whole frame.
    /// - The returned pointer is only valid while that mapping persists.
    unsafe fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;
}

/// [`PhysMapper`] for environments where physical addresses are directly
/// dereferenceable: identity-mapped kernels, or host tests where the
/// "physical range" is an ordinary heap allocation.
///
/// A kernel with an offset map (e.g. a higher-half direct map) supplies its
/// own impl that adds the map base instead.
#[derive(Debug, Copy, Clone, Default)]
pub struct IdentityMapper;

impl PhysMapper for IdentityMapper {
    #[inline]
    unsafe fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        pa.as_u64() as *mut u8
    }
}
