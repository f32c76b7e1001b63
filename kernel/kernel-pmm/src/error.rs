/// Recoverable allocator failures.
///
/// This is deliberately a one-variant enum: out-of-memory is the only
/// condition a caller is expected to handle. Invalid addresses, refcount
/// underflows and internal inconsistencies are bugs upstream of the
/// allocator and panic instead (see the crate docs).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// No frame available on the local CPU or via stealing.
    #[error("out of physical memory")]
    OutOfMemory,
}
