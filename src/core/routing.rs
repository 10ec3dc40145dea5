//! Routing state machine - Decides which inspector slot an order moves to next.
//!
//! Steps are 1-based positions in the chain. Step 0 means "not routed yet" and
//! the step after the last slot (5 for the fixed four-slot chain) means the
//! chain is exhausted and the order is approved. Routing is a pure function of
//! `(current_step, level, slots)` so it can be re-evaluated at every approval.

use crate::core::escalation::TIER_COUNT;

/// Step of an order that has not been routed yet.
pub const INITIAL_STEP: i32 = 0;

/// Step reached once the four-slot chain is exhausted.
pub const APPROVED_STEP: i32 = TIER_COUNT + 1;

/// Returns the step following `current_step` for an order of tier `level`.
///
/// Slots `current_step .. level` (0-indexed) are scanned in order and the
/// 1-based position of the first bound slot is returned. When none is bound,
/// or `current_step` is already at the end of the chain, the terminal step
/// `slots.len() + 1` is returned: an order with no eligible inspector left is
/// treated as approved.
#[must_use]
pub fn next_step<T>(current_step: i32, level: i32, slots: &[Option<T>]) -> i32 {
    let terminal = terminal_step(slots);
    let start = usize::try_from(current_step).unwrap_or(0);
    let end = usize::try_from(level).unwrap_or(0).min(slots.len());

    if start >= slots.len() {
        return terminal;
    }

    (start..end)
        .find(|&index| slots[index].is_some())
        .and_then(|index| i32::try_from(index + 1).ok())
        .unwrap_or(terminal)
}

/// The step that marks an exhausted chain of this length.
#[must_use]
pub fn terminal_step<T>(slots: &[Option<T>]) -> i32 {
    i32::try_from(slots.len()).map_or(i32::MAX, |len| len + 1)
}

/// Resolves a 1-based step to the value bound in that slot.
#[must_use]
pub fn slot_at<T: Copy>(slots: &[Option<T>], step: i32) -> Option<T> {
    let index = usize::try_from(step).ok()?.checked_sub(1)?;
    slots.get(index).copied().flatten()
}
