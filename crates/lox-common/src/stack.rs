//! Stack growth for the recursive stages: parsing, resolving and evaluating
//! deeply nested programs.

/// Remaining stack below which a new segment is allocated.
const RED_ZONE: usize = 128 * 1024;
/// Size of each newly allocated stack segment.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Runs `f`, first moving to a fresh stack segment if the current one is
/// nearly exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}
