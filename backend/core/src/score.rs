//! Poll score scale helpers and generated-answer sampling.

use rand::{Rng, RngExt};

use crate::models::{AmbitionLevel, SCORE_DEFAULT, SCORE_MAX, SCORE_MIN};

/// Normalizes a raw poll score (`SCORE_MIN..=SCORE_MAX`) to 0..=100.
///
/// The raw scale is shifted to start at zero and stretched to 100, rounded to
/// the nearest integer. With the default 1..=5 scale this yields the exact
/// steps 0, 25, 50, 75, 100.
pub fn normalize_score(raw: i64) -> i64 {
    let span = SCORE_MAX - SCORE_MIN;
    ((raw - SCORE_MIN) * 100 + span / 2) / span
}

/// The normalized distance between two adjacent raw scores.
pub fn normalized_unit() -> i64 {
    100 / (SCORE_MAX - SCORE_MIN)
}

/// Score for a generated poll answer.
///
/// Neutral by default; uniform over the whole scale when the random-defaults
/// developer knob is set.
pub fn generated_score<R: Rng>(randomized: bool, rng: &mut R) -> i64 {
    if randomized {
        rng.random_range(SCORE_MIN..=SCORE_MAX)
    } else {
        SCORE_DEFAULT
    }
}

/// Ambition level for a generated poll.
///
/// Unspecified by default. The randomized distribution is weighted to seed
/// realistic mixes: 45% solid, 25% ambitious, 20% unspecified, 10% minimal-pass.
pub fn generated_level<R: Rng>(randomized: bool, rng: &mut R) -> AmbitionLevel {
    if !randomized {
        return AmbitionLevel::Unspecified;
    }
    match rng.random_range(0..100) {
        0..45 => AmbitionLevel::Solid,
        45..70 => AmbitionLevel::Ambitious,
        70..90 => AmbitionLevel::Unspecified,
        _ => AmbitionLevel::MinimalPass,
    }
}
