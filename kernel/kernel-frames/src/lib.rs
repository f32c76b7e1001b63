//! # Physical Frame Addressing Types
//!
//! Strongly typed wrappers for the physical addresses and frame numbers used
//! by the physical memory manager.
//!
//! ## Overview
//!
//! The allocator tracks a contiguous range of physical memory in fixed-size
//! frames. Everything above the boundary API speaks [`PhysicalAddress`];
//! everything below it speaks [`FrameNumber`], an index into the managed
//! range. The only way to cross that line is [`FrameRange::frame_number`],
//! a bounds- and alignment-checked conversion — raw integer arithmetic on
//! addresses never leaks past this crate.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address. |
//! | [`Size4K`] | The [`PageSize`] marker for 4 KiB frames. |
//! | [`FrameNumber`] | A validated index of one frame within the managed range. |
//! | [`FrameRange`] | The managed `[base, limit)` range and its conversions. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_frames::*;
//! let range = FrameRange::new(
//!     PhysicalAddress::new(0x8000_0000),
//!     PhysicalAddress::new(0x8000_4000),
//! )
//! .unwrap();
//! assert_eq!(range.frame_count(), 4);
//!
//! // Addresses round-trip through their frame number.
//! let pa = PhysicalAddress::new(0x8000_2000);
//! let frame = range.frame_number(pa).unwrap();
//! assert_eq!(range.address_of(frame), pa);
//!
//! // Unaligned or foreign addresses are rejected, never wrapped.
//! assert!(range.frame_number(PhysicalAddress::new(0x8000_2001)).is_err());
//! assert!(range.frame_number(PhysicalAddress::new(0x9000_0000)).is_err());
//! ```
//!
//! ## Design Notes
//!
//! - All types are `#[repr(transparent)]` or plain `Copy` data; conversions
//!   are `const fn` where possible and zero-cost in release builds.
//! - [`FrameNumber`] has no public constructor. Holding one is proof that the
//!   address it came from was page-aligned and inside the managed range.

#![cfg_attr(not(any(test, doctest)), no_std)]

use core::fmt;
use core::hash::Hash;
use core::ops::Add;

/// Sealed trait pattern to restrict `PageSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for supported frame sizes.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Debug
{
    /// Frame size in bytes (power of two).
    const SIZE: u64;
    /// log2(SIZE), i.e., number of low bits used for the in-frame offset.
    const SHIFT: u32;
}

/// 4 KiB frame (4096 bytes), the only granularity the allocator manages.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Size4K;
impl sealed::Sealed for Size4K {}
impl PageSize for Size4K {
    const SIZE: u64 = 4096;
    const SHIFT: u32 = 12;
}

/// Physical memory address.
///
/// A thin wrapper around `u64` that carries physical-address intent and
/// prevents accidental mix-ups with frame indices or virtual addresses.
///
/// ### Examples
/// ```rust
/// # use kernel_frames::*;
/// let pa = PhysicalAddress::new(0x1234_5678);
/// assert_eq!(pa.align_down::<Size4K>().as_u64(), 0x1234_5000);
/// assert!(!pa.is_aligned::<Size4K>());
/// assert!(pa.align_down::<Size4K>().is_aligned::<Size4K>());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as u64)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Align down to the frame boundary of size `S`.
    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !(S::SIZE - 1))
    }

    /// Whether the low `S::SHIFT` bits are all zero.
    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0 & (S::SIZE - 1) == 0
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// Index of one frame within a [`FrameRange`].
///
/// There is no public constructor: a `FrameNumber` is only ever produced by
/// [`FrameRange::frame_number`], so holding one is proof that the underlying
/// address was aligned and in range.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameNumber(usize);

impl FrameNumber {
    /// The raw index, usable as a table slot.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame#{}", self.0)
    }
}

/// Error produced when an address fails validation against a [`FrameRange`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameRangeError {
    #[error("address {0} is not frame-aligned")]
    Unaligned(PhysicalAddress),
    #[error("address {0} is outside the managed range")]
    OutOfRange(PhysicalAddress),
    #[error("range [{0}, {1}) holds no complete frame")]
    EmptyRange(PhysicalAddress, PhysicalAddress),
}

/// The contiguous physical range `[base, limit)` managed by the allocator,
/// divided into 4 KiB frames.
///
/// ### Invariants
/// - `base` and `limit` are frame-aligned and `base < limit`.
/// - Every [`FrameNumber`] this range hands out satisfies
///   `index < frame_count()`.
///
/// ### Examples
/// ```rust
/// # use kernel_frames::*;
/// let range = FrameRange::new(
///     PhysicalAddress::new(0x1000),
///     PhysicalAddress::new(0x4000),
/// )
/// .unwrap();
/// let frames: Vec<_> = range.frames().map(|f| range.address_of(f)).collect();
/// assert_eq!(frames.len(), 3);
/// assert_eq!(frames[0].as_u64(), 0x1000);
/// assert_eq!(frames[2].as_u64(), 0x3000);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameRange {
    base: PhysicalAddress,
    frames: usize,
}

impl FrameRange {
    /// Create a range over `[base, limit)`.
    ///
    /// # Errors
    /// [`FrameRangeError::Unaligned`] if either bound is not frame-aligned,
    /// [`FrameRangeError::EmptyRange`] if the bounds enclose no frame.
    pub const fn new(
        base: PhysicalAddress,
        limit: PhysicalAddress,
    ) -> Result<Self, FrameRangeError> {
        if !base.is_aligned::<Size4K>() {
            return Err(FrameRangeError::Unaligned(base));
        }
        if !limit.is_aligned::<Size4K>() {
            return Err(FrameRangeError::Unaligned(limit));
        }
        if limit.as_u64() <= base.as_u64() {
            return Err(FrameRangeError::EmptyRange(base, limit));
        }
        let frames = ((limit.as_u64() - base.as_u64()) >> Size4K::SHIFT) as usize;
        Ok(Self { base, frames })
    }

    /// First address of the range.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// One past the last managed byte.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64() + (self.frames as u64) * Size4K::SIZE)
    }

    /// Number of frames in the range.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frames
    }

    /// Whether `addr` falls inside `[base, limit)` (any alignment).
    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: PhysicalAddress) -> bool {
        addr.as_u64() >= self.base.as_u64() && addr.as_u64() < self.limit().as_u64()
    }

    /// The bounds-checked address-to-frame conversion. This is the only way
    /// to obtain a [`FrameNumber`].
    ///
    /// # Errors
    /// [`FrameRangeError::Unaligned`] or [`FrameRangeError::OutOfRange`] if
    /// `addr` is not the base address of a managed frame.
    pub const fn frame_number(&self, addr: PhysicalAddress) -> Result<FrameNumber, FrameRangeError> {
        if !addr.is_aligned::<Size4K>() {
            return Err(FrameRangeError::Unaligned(addr));
        }
        if !self.contains(addr) {
            return Err(FrameRangeError::OutOfRange(addr));
        }
        Ok(FrameNumber(
            ((addr.as_u64() - self.base.as_u64()) >> Size4K::SHIFT) as usize,
        ))
    }

    /// Base address of the given frame. Inverse of [`Self::frame_number`].
    #[inline]
    #[must_use]
    pub const fn address_of(&self, frame: FrameNumber) -> PhysicalAddress {
        debug_assert!(frame.0 < self.frames);
        PhysicalAddress::new(self.base.as_u64() + (frame.0 as u64) * Size4K::SIZE)
    }

    /// Iterate over every frame in the range, in ascending address order.
    pub fn frames(&self) -> impl Iterator<Item = FrameNumber> + use<> {
        (0..self.frames).map(FrameNumber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> FrameRange {
        FrameRange::new(
            PhysicalAddress::new(0x10_0000),
            PhysicalAddress::new(0x10_4000),
        )
        .unwrap()
    }

    #[test]
    fn range_bounds_and_count() {
        let r = range();
        assert_eq!(r.frame_count(), 4);
        assert_eq!(r.base().as_u64(), 0x10_0000);
        assert_eq!(r.limit().as_u64(), 0x10_4000);
    }

    #[test]
    fn rejects_unaligned_bounds() {
        let err = FrameRange::new(
            PhysicalAddress::new(0x10_0008),
            PhysicalAddress::new(0x10_4000),
        )
        .unwrap_err();
        assert_eq!(err, FrameRangeError::Unaligned(PhysicalAddress::new(0x10_0008)));
    }

    #[test]
    fn rejects_empty_range() {
        let err = FrameRange::new(
            PhysicalAddress::new(0x10_0000),
            PhysicalAddress::new(0x10_0000),
        )
        .unwrap_err();
        assert!(matches!(err, FrameRangeError::EmptyRange(_, _)));
    }

    #[test]
    fn address_frame_round_trip() {
        let r = range();
        for frame in r.frames() {
            let addr = r.address_of(frame);
            assert_eq!(r.frame_number(addr).unwrap(), frame);
        }
    }

    #[test]
    fn frame_number_validation() {
        let r = range();
        // interior but unaligned
        assert_eq!(
            r.frame_number(PhysicalAddress::new(0x10_0001)),
            Err(FrameRangeError::Unaligned(PhysicalAddress::new(0x10_0001)))
        );
        // aligned but below / at limit
        assert_eq!(
            r.frame_number(PhysicalAddress::new(0x0F_F000)),
            Err(FrameRangeError::OutOfRange(PhysicalAddress::new(0x0F_F000)))
        );
        assert_eq!(
            r.frame_number(PhysicalAddress::new(0x10_4000)),
            Err(FrameRangeError::OutOfRange(PhysicalAddress::new(0x10_4000)))
        );
    }

    #[test]
    fn alignment_helpers() {
        let pa = PhysicalAddress::new(0x12345);
        assert_eq!(pa.align_down::<Size4K>().as_u64(), 0x12000);
        assert!(!pa.is_aligned::<Size4K>());
        assert!(PhysicalAddress::new(0x12000).is_aligned::<Size4K>());
    }
}
