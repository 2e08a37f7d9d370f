//! Scramble generation, invoked once per attempt.
//!
//! The coordinator treats this as an opaque generator: it asks for a scramble
//! for the room's event and embeds whatever comes back, unchanged, in the new
//! attempt.

use rand::{Rng, rng};
use thiserror::Error;

use crate::config::AppConfig;

/// Faces of a cube in standard notation.
const FACES: [char; 6] = ['R', 'L', 'U', 'D', 'F', 'B'];
/// Turn modifiers: quarter, inverse quarter, half.
const MODIFIERS: [&str; 3] = ["", "'", "2"];
/// Chance that a move on a big cube is a wide turn.
const WIDE_MOVE_PROBABILITY: f64 = 0.4;

/// Failure to produce a scramble.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScrambleError {
    #[error("no scramble generator for event `{event}`")]
    UnknownEvent { event: String },
}

/// Generate a random move sequence for `event` according to the catalog in
/// `config`. Consecutive moves never turn the same face.
pub fn generate(config: &AppConfig, event: &str) -> Result<String, ScrambleError> {
    let Some(params) = config.event(event) else {
        return Err(ScrambleError::UnknownEvent {
            event: event.to_owned(),
        });
    };

    let mut rng = rng();
    let mut moves = Vec::with_capacity(params.scramble_moves);
    let mut last_face: Option<char> = None;

    while moves.len() < params.scramble_moves {
        let face = FACES[rng.random_range(0..FACES.len())];
        if Some(face) == last_face {
            continue;
        }
        last_face = Some(face);

        let modifier = MODIFIERS[rng.random_range(0..MODIFIERS.len())];
        let wide = params.cube_size > 3 && rng.random_bool(WIDE_MOVE_PROBABILITY);
        if wide {
            moves.push(format!("{face}w{modifier}"));
        } else {
            moves.push(format!("{face}{modifier}"));
        }
    }

    Ok(moves.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_of(mv: &str) -> char {
        mv.chars().next().unwrap()
    }

    #[test]
    fn scramble_has_configured_move_count() {
        let config = AppConfig::default();
        let scramble = generate(&config, "333").unwrap();
        assert_eq!(scramble.split_whitespace().count(), 20);
    }

    #[test]
    fn consecutive_moves_never_repeat_a_face() {
        let config = AppConfig::default();
        for _ in 0..50 {
            let scramble = generate(&config, "333").unwrap();
            let faces: Vec<char> = scramble.split_whitespace().map(face_of).collect();
            for pair in faces.windows(2) {
                assert_ne!(pair[0], pair[1], "repeated face in `{scramble}`");
            }
        }
    }

    #[test]
    fn three_by_three_never_contains_wide_moves() {
        let config = AppConfig::default();
        for _ in 0..20 {
            let scramble = generate(&config, "333").unwrap();
            assert!(!scramble.contains('w'), "wide move in `{scramble}`");
        }
    }

    #[test]
    fn unknown_event_is_an_error() {
        let config = AppConfig::default();
        let err = generate(&config, "megaminx").unwrap_err();
        assert_eq!(
            err,
            ScrambleError::UnknownEvent {
                event: "megaminx".into()
            }
        );
    }
}
