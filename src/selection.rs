use rand::Rng;

use crate::error::GroupError;
use crate::models::Participant;

/// A participant's draw weight: one plus spins since their last win, floored
/// at one. The bias is the product: the longer since a win, the heavier.
pub fn weight(p: &Participant) -> u64 {
    u64::from(p.spins_since_last_won) + 1
}

/// Weighted draw over the active roster. Ties on a cumulative-weight boundary
/// go to the earlier insertion position.
pub fn draw<'a, R: Rng>(
    active: &[&'a Participant],
    rng: &mut R,
) -> Result<&'a Participant, GroupError> {
    if active.len() < 2 {
        return Err(GroupError::conflict(
            "At least 2 active participants are required to spin",
        ));
    }
    let total: u64 = active.iter().map(|p| weight(p)).sum();
    if total == 0 {
        return Err(GroupError::internal("Spin weights sum to zero"));
    }
    let x = rng.gen_range(0..total);
    pick(active, x).ok_or_else(|| GroupError::internal("Weighted walk exhausted the roster"))
}

/// Walk the roster accumulating weights; the first participant whose
/// cumulative weight exceeds `x` wins.
fn pick<'a>(active: &[&'a Participant], x: u64) -> Option<&'a Participant> {
    let mut cumulative = 0u64;
    for p in active {
        cumulative += weight(p);
        if cumulative > x {
            return Some(p);
        }
    }
    None
}
