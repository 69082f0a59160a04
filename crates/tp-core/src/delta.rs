//! Incremental counter adjustment
//!
//! Category tallies are never rescanned after a command; each flag change
//! moves the count by the difference in effective blocked state.

/// Change in a blocked count when a tracker goes from `old` to `new`.
#[inline]
pub fn delta(old: bool, new: bool) -> i32 {
    i32::from(new) - i32::from(old)
}

/// Apply a delta to a count, clamping at zero.
#[inline]
pub fn apply_delta(count: u32, delta: i32) -> u32 {
    count.saturating_add_signed(delta)
}
