//! Next-target selection policy
//!
//! Pure selection over a switcher's target list: round-robin in sequential
//! mode, uniform random with blacklist and repeat avoidance otherwise.

use rand::Rng;
use thiserror::Error;

use super::SwitcherState;

/// Selection failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no targets configured")]
    NoTargetsConfigured,
}

/// Select the index of the next target to fire
///
/// Sequential mode advances the round-robin cursor. Random mode picks
/// uniformly among candidates, excluding blacklisted targets and (when
/// `avoid_repeat`) the previously fired one. An exhausted candidate set
/// self-heals by clearing the blacklist and falling back to the full range,
/// so the scheduler can never be deadlocked out of a selection.
pub fn select_next(state: &mut SwitcherState, avoid_repeat: bool) -> Result<usize, SelectionError> {
    let len = state.targets.len();
    if len == 0 {
        return Err(SelectionError::NoTargetsConfigured);
    }

    if state.sequential_mode {
        state.sequential_index = (state.sequential_index + 1) % len;
        return Ok(state.sequential_index);
    }

    let mut candidates: Vec<usize> = (0..len)
        .filter(|&i| !state.blacklist.contains(&state.targets[i]))
        .collect();

    if avoid_repeat {
        if let Some(prev) = &state.previous_target {
            if let Some(prev_index) = state.targets.iter().position(|t| t == prev) {
                candidates.retain(|&i| i != prev_index);
            }
        }
    }

    if candidates.is_empty() {
        state.blacklist.clear();
        candidates = (0..len).collect();
    }

    let pick = rand::rng().random_range(0..candidates.len());
    Ok(candidates[pick])
}
