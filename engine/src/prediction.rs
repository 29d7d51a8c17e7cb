//! Prediction rounds.
//!
//! Each round poses a numeric question with a hidden target drawn uniformly
//! from the question's range at round start. Guesses are locked in once and
//! scored at round resolution by closeness, normalized to the range width.

use claw_types::Address;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Question templates: prompt plus inclusive range.
const TEMPLATES: [(&str, i64, i64); 3] = [
    ("What will be the last 2 digits of the next block number?", 0, 99),
    ("Guess a number between 1-1000. Closest to the secret wins!", 1, 1_000),
    ("How many transactions land in the next block?", 0, 10_000),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRound {
    pub question: String,
    pub min: i64,
    pub max: i64,
    /// Hidden until resolution; never sent to clients.
    target: i64,
    pub time_limit_ms: u64,
    pub guesses: BTreeMap<Address, i64>,
}

impl PredictionRound {
    pub fn generate(rng: &mut StdRng, time_limit_ms: u64) -> Self {
        let (question, min, max) = TEMPLATES[rng.gen_range(0..TEMPLATES.len())];
        let target = rng.gen_range(min..=max);
        Self {
            question: question.to_string(),
            min,
            max,
            target,
            time_limit_ms,
            guesses: BTreeMap::new(),
        }
    }

    pub fn in_range(&self, guess: i64) -> bool {
        (self.min..=self.max).contains(&guess)
    }

    pub fn has_guessed(&self, player: &Address) -> bool {
        self.guesses.contains_key(player)
    }

    /// Lock in a guess. The caller has already rejected duplicates and
    /// out-of-range values.
    pub fn record_guess(&mut self, player: Address, guess: i64) {
        self.guesses.insert(player, guess);
    }

    pub fn auto_guess(&self, rng: &mut StdRng) -> i64 {
        rng.gen_range(self.min..=self.max)
    }

    /// Closeness score: `max(0, 100 − round(|guess − target| / range · 100))`,
    /// computed in integers with round-half-up.
    pub fn score(&self, guess: i64) -> i64 {
        let range = (self.max - self.min).max(1) as i128;
        let diff = (guess - self.target).unsigned_abs() as i128;
        let scaled = (diff * 100 + range / 2) / range;
        (100 - scaled).max(0) as i64
    }

    /// Score every locked-in guess. Called once at round resolution.
    pub fn resolve(&self) -> BTreeMap<Address, i64> {
        self.guesses
            .iter()
            .map(|(player, guess)| (*player, self.score(*guess)))
            .collect()
    }

    #[cfg(test)]
    pub fn target_for_tests(&self) -> i64 {
        self.target
    }
}
