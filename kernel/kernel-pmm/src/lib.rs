//! # Physical Memory Manager
//!
//! A multi-core physical page-frame allocator with copy-on-write reference
//! counting.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │         FrameAllocator (façade)                     │
//! │   • alloc / free / inc_ref / make_unique            │
//! │   • address validation, sentinel fills, page copy   │
//! └───────────┬───────────────────────────┬─────────────┘
//!             │                           │
//! ┌───────────▼─────────────┐ ┌───────────▼─────────────┐
//! │  FramePool              │ │  RefCountTable          │
//! │  • one free list + lock │ │  • one count per frame  │
//! │    per CPU              │ │    under a table lock   │
//! │  • stealing on empty    │ │  • underflow detection  │
//! └─────────────────────────┘ └─────────────────────────┘
//! ```
//!
//! Every CPU owns a LIFO free list of frames behind its own spin lock;
//! allocation drains the local list first and borrows from peers when it is
//! empty. A frame's reference count and its free-list membership are linked
//! by one invariant: the count is zero exactly while the frame sits on some
//! CPU's free list.
//!
//! No operation ever holds two locks at once. The cross-CPU stealing path
//! takes one victim lock at a time, and `make_unique` copies page contents
//! with no lock held at all — the destination frame is freshly allocated
//! and has no other holder yet.
//!
//! Out-of-memory is the only recoverable failure and surfaces as
//! [`AllocError::OutOfMemory`]. Misaligned or foreign addresses, double
//! frees and count/list disagreements are caller or allocator bugs and
//! panic immediately rather than risking silent corruption.
//!
//! ## Usage
//!
//! ```rust
//! # use kernel_pmm::*;
//! # use kernel_frames::{FrameRange, PhysicalAddress};
//! # let backing = vec![0u8; 5 * 4096];
//! # let base = PhysicalAddress::new((backing.as_ptr() as u64 + 4095) & !4095);
//! let range = FrameRange::new(base, base + 4 * 4096).unwrap();
//! // Safety: `range` covers memory we own and the identity mapping holds.
//! let pmm = unsafe { FrameAllocator::new(range, 2, IdentityMapper) };
//!
//! let page = pmm.alloc(0).unwrap();
//! pmm.inc_ref(page); // share it, e.g. across a COW fork
//! let copy = pmm.make_unique(page, 0).unwrap(); // write fault: duplicate
//! assert_ne!(copy, page);
//! pmm.free(copy, 0);
//! pmm.free(page, 0);
//! assert_eq!(pmm.free_frames(), 4);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod allocator;
mod error;
mod percpu;
mod phys_map;
mod pool;
mod refcount;

pub use allocator::{ALLOC_FILL, FREE_FILL, FrameAllocator};
pub use error::AllocError;
pub use percpu::PerCpuList;
pub use phys_map::{IdentityMapper, PhysMapper};
pub use pool::FramePool;
pub use refcount::RefCountTable;
