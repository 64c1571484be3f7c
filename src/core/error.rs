//! Exposes the helios error type

use std::alloc::LayoutError;
use std::sync::PoisonError;

use thiserror::Error;

/// Error type that helios can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Tried to allocate zero bytes.
    #[error("Cannot allocate a zero-sized block.")]
    ZeroSizedAllocation,
    /// Growing the allocator would exceed the configured memory limit.
    #[error("Out of memory: requested `{requested}` bytes with `{available}` bytes left before the limit.")]
    OutOfMemory {
        /// Size of the region that was needed to serve the request.
        requested: u64,
        /// Bytes that could still be reserved before hitting the limit.
        available: u64,
    },
    /// Alignment must be a non-zero power of two.
    #[error("Invalid alignment `{0}`, must be a non-zero power of two.")]
    InvalidAlignment(u64),
    /// The allocator settings are inconsistent.
    #[error("Invalid allocator settings: {0}")]
    InvalidSettings(&'static str),
    /// Allocation was already released, or was never handed out by this allocator.
    #[error("Released an allocation that is not live in this allocator.")]
    InvalidRelease,
    /// Tried to access memory through an allocation that was already released.
    #[error("Allocation is not live anymore.")]
    StaleAllocation,
    /// Region size and alignment do not form a valid memory layout.
    #[error("Invalid memory layout: `{0}`")]
    LayoutError(LayoutError),
    /// The system allocator could not provide memory for a new region.
    #[error("System allocator failed to provide `{0}` bytes.")]
    HostAllocationFailed(u64),
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}

impl From<LayoutError> for Error {
    fn from(value: LayoutError) -> Self {
        Error::LayoutError(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
