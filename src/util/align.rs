//! Utilities for aligning sizes and offsets

use std::ops::{Add, BitAnd, Not, Sub};

/// Round `value` up to the next multiple of `alignment`. Values that are already aligned are returned unchanged.
/// `alignment` must be a power of two.
pub fn align<T>(value: T, alignment: T) -> T
where
    T: Add<T, Output = T> + Sub<T, Output = T> + BitAnd<T, Output = T> + Not<Output = T> + From<u8> + Copy, {
    let mask = alignment - T::from(1u8);
    (value + mask) & !mask
}

/// Whether `value` is a non-zero power of two, and therefore usable as an alignment.
pub fn is_valid_alignment(value: u64) -> bool {
    value.is_power_of_two()
}

/// Whether `value` is a multiple of `alignment`. `alignment` must be a power of two.
pub fn is_aligned(value: u64, alignment: u64) -> bool {
    value & (alignment - 1) == 0
}
