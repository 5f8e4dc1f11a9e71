//! Transition table of the playback state machine
//!
//! Pure functions over queue length, current index and policy flags, so
//! the rules can be exercised without a media sink.

use crate::state::RepeatMode;
use rand::Rng;

/// What to do when the sink reports the end of the current track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndedAction {
    /// Seek to 0 and keep playing the same track
    Restart,
    /// Load the track at this index
    Advance(usize),
    /// Back to `Idle`, progress reset, pointer left on the last track
    Stop,
}

/// Index reached by `next()`, `None` when there is nowhere to go
///
/// With shuffle on and more than one track, a uniformly random index other
/// than the current one. Otherwise the following index, wrapping to 0 only
/// under `RepeatMode::All`.
pub fn next_index<R: Rng>(
    len: usize,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }

    if shuffle && len > 1 {
        return Some(match current {
            Some(current) => {
                let pick = rng.random_range(0..len - 1);
                if pick >= current { pick + 1 } else { pick }
            }
            None => rng.random_range(0..len),
        });
    }

    match current {
        None => Some(0),
        Some(current) if current + 1 < len => Some(current + 1),
        Some(_) if repeat == RepeatMode::All => Some(0),
        Some(_) => None,
    }
}

/// Index reached by `previous()`
pub fn previous_index(len: usize, current: Option<usize>, repeat: RepeatMode) -> Option<usize> {
    match current {
        Some(current) if current > 0 && current < len => Some(current - 1),
        Some(_) if repeat == RepeatMode::All && len > 0 => Some(len - 1),
        _ => None,
    }
}

/// Reaction to the `ended` signal
///
/// `One` restarts, shuffle or `All` follow the `next()` rule, and a
/// sequential queue advances until its last track, then stops.
pub fn on_ended<R: Rng>(
    len: usize,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: &mut R,
) -> EndedAction {
    if repeat == RepeatMode::One && current.is_some() {
        return EndedAction::Restart;
    }
    match next_index(len, current, shuffle, repeat, rng) {
        Some(index) => EndedAction::Advance(index),
        None => EndedAction::Stop,
    }
}

/// Fisher–Yates shuffle of every position except `keep`
pub fn shuffle_keeping_current<T, R: Rng>(
    items: &mut [T],
    keep: Option<usize>,
    rng: &mut R,
) {
    let positions: Vec<usize> = (0..items.len()).filter(|i| Some(*i) != keep).collect();
    for i in (1..positions.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(positions[i], positions[j]);
    }
}
