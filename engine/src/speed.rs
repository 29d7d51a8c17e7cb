//! Speed challenge rounds.
//!
//! Ten short rounds, each one of three task flavors: mental math, pattern
//! completion, or raw reaction. Faster correct answers score higher:
//! `max(10, 100 − response_time_ms / 50)`. Wrong or timed-out answers score
//! zero, as does firing before a reaction round's go signal.

use claw_types::constants::MOVE_TIMEOUT_DEFAULT_MS;
use claw_types::Address;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MATH_LIMIT_MS: u64 = MOVE_TIMEOUT_DEFAULT_MS;
const PATTERN_LIMIT_MS: u64 = 15_000;
const REACTION_LIMIT_MS: u64 = MOVE_TIMEOUT_DEFAULT_MS;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpeedTask {
    Math { question: String, answer: i64 },
    Pattern { question: String, answer: i64 },
    /// Go signal fires `delay_ms` after round start; the time limit counts
    /// from the signal.
    Reaction { delay_ms: u64 },
}

impl SpeedTask {
    pub fn time_limit_ms(&self) -> u64 {
        match self {
            SpeedTask::Math { .. } => MATH_LIMIT_MS,
            SpeedTask::Pattern { .. } => PATTERN_LIMIT_MS,
            SpeedTask::Reaction { .. } => REACTION_LIMIT_MS,
        }
    }

    /// Total window from round start until the deadline.
    pub fn deadline_ms(&self) -> u64 {
        match self {
            SpeedTask::Reaction { delay_ms } => delay_ms + REACTION_LIMIT_MS,
            other => other.time_limit_ms(),
        }
    }
}

/// A player's recorded outcome for the round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedOutcome {
    pub delta: i64,
    pub correct: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedRound {
    pub task: SpeedTask,
    pub submissions: BTreeMap<Address, SpeedOutcome>,
}

impl SpeedRound {
    pub fn generate(rng: &mut StdRng) -> Self {
        let task = match rng.gen_range(0..3u32) {
            0 => math_task(rng),
            1 => pattern_task(rng),
            _ => SpeedTask::Reaction {
                delay_ms: rng.gen_range(2_000..=5_000),
            },
        };
        Self {
            task,
            submissions: BTreeMap::new(),
        }
    }

    pub fn has_answered(&self, player: &Address) -> bool {
        self.submissions.contains_key(player)
    }

    /// Score an answer submitted `elapsed_ms` after round start and record
    /// the outcome. The caller has already rejected duplicates.
    pub fn record_answer(&mut self, player: Address, answer: i64, elapsed_ms: u64) -> SpeedOutcome {
        let outcome = self.score(answer, elapsed_ms);
        self.submissions.insert(player, outcome);
        outcome
    }

    fn score(&self, answer: i64, elapsed_ms: u64) -> SpeedOutcome {
        match &self.task {
            SpeedTask::Math { answer: expected, .. } | SpeedTask::Pattern { answer: expected, .. } => {
                if elapsed_ms > self.task.time_limit_ms() || answer != *expected {
                    SpeedOutcome {
                        delta: 0,
                        correct: false,
                    }
                } else {
                    SpeedOutcome {
                        delta: speed_points(elapsed_ms),
                        correct: true,
                    }
                }
            }
            SpeedTask::Reaction { delay_ms } => {
                // Firing before the go signal counts as answered, scores zero.
                if elapsed_ms < *delay_ms {
                    return SpeedOutcome {
                        delta: 0,
                        correct: false,
                    };
                }
                let reaction_ms = elapsed_ms - delay_ms;
                if reaction_ms > REACTION_LIMIT_MS {
                    SpeedOutcome {
                        delta: 0,
                        correct: false,
                    }
                } else {
                    SpeedOutcome {
                        delta: speed_points(reaction_ms),
                        correct: true,
                    }
                }
            }
        }
    }

    /// Deterministic stand-in answer for an absent player: correct, at an
    /// unhurried pace.
    pub fn auto_answer(&self, rng: &mut StdRng) -> (i64, u64) {
        match &self.task {
            SpeedTask::Math { answer, .. } | SpeedTask::Pattern { answer, .. } => {
                (*answer, rng.gen_range(2_000..=8_000))
            }
            SpeedTask::Reaction { delay_ms } => (0, delay_ms + rng.gen_range(200..=1_200)),
        }
    }
}

fn speed_points(response_time_ms: u64) -> i64 {
    (100 - (response_time_ms / 50) as i64).max(10)
}

fn math_task(rng: &mut StdRng) -> SpeedTask {
    let a = rng.gen_range(10..=99i64);
    let b = rng.gen_range(10..=99i64);
    let (op, answer) = match rng.gen_range(0..3u32) {
        0 => ("+", a + b),
        1 => ("-", a - b),
        _ => ("*", a * b),
    };
    SpeedTask::Math {
        question: format!("What is {a} {op} {b}?"),
        answer,
    }
}

fn pattern_task(rng: &mut StdRng) -> SpeedTask {
    let start = rng.gen_range(1..=10i64);
    let step = rng.gen_range(2..=5i64);
    let shown: Vec<String> = (0..4).map(|i| (start + i * step).to_string()).collect();
    SpeedTask::Pattern {
        question: format!("What comes next: {}, ?", shown.join(", ")),
        answer: start + 4 * step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn math(answer: i64) -> SpeedRound {
        SpeedRound {
            task: SpeedTask::Math {
                question: "What is 2 + 2?".into(),
                answer,
            },
            submissions: BTreeMap::new(),
        }
    }

    #[test]
    fn fast_correct_answer_scores_high() {
        let mut round = math(4);
        let p = Address::repeat_byte(1);
        let outcome = round.record_answer(p, 4, 500);
        assert!(outcome.correct);
        assert_eq!(outcome.delta, 90); // 100 − 500/50
    }

    #[test]
    fn slow_correct_answer_floors_at_10() {
        let mut round = math(4);
        let outcome = round.record_answer(Address::repeat_byte(1), 4, 9_900);
        assert!(outcome.correct);
        assert_eq!(outcome.delta, 10);
    }

    #[test]
    fn wrong_answer_scores_zero() {
        let mut round = math(4);
        let outcome = round.record_answer(Address::repeat_byte(1), 5, 100);
        assert!(!outcome.correct);
        assert_eq!(outcome.delta, 0);
    }

    #[test]
    fn timeout_scores_zero_even_if_correct() {
        let mut round = math(4);
        let outcome = round.record_answer(Address::repeat_byte(1), 4, 10_001);
        assert!(!outcome.correct);
        assert_eq!(outcome.delta, 0);
    }

    #[test]
    fn reaction_too_early_counts_as_answered_zero() {
        let mut round = SpeedRound {
            task: SpeedTask::Reaction { delay_ms: 3_000 },
            submissions: BTreeMap::new(),
        };
        let p = Address::repeat_byte(1);
        let outcome = round.record_answer(p, 0, 2_999);
        assert!(!outcome.correct);
        assert_eq!(outcome.delta, 0);
        assert!(round.has_answered(&p));
    }

    #[test]
    fn reaction_scores_from_go_signal() {
        let mut round = SpeedRound {
            task: SpeedTask::Reaction { delay_ms: 3_000 },
            submissions: BTreeMap::new(),
        };
        // 250 ms after the signal: 100 − 250/50 = 95.
        let outcome = round.record_answer(Address::repeat_byte(1), 0, 3_250);
        assert!(outcome.correct);
        assert_eq!(outcome.delta, 95);
    }

    #[test]
    fn generated_math_answers_are_consistent() {
        for seed in 0..50u64 {
            let round = SpeedRound::generate(&mut StdRng::seed_from_u64(seed));
            if let SpeedTask::Math { question, answer } = &round.task {
                // Re-derive the arithmetic from the rendered question.
                let parts: Vec<&str> = question
                    .trim_start_matches("What is ")
                    .trim_end_matches('?')
                    .split_whitespace()
                    .collect();
                let a: i64 = parts[0].parse().unwrap();
                let b: i64 = parts[2].parse().unwrap();
                let expected = match parts[1] {
                    "+" => a + b,
                    "-" => a - b,
                    _ => a * b,
                };
                assert_eq!(*answer, expected);
            }
        }
    }

    #[test]
    fn auto_answer_always_scores() {
        for seed in 0..50u64 {
            let mut round = SpeedRound::generate(&mut StdRng::seed_from_u64(seed));
            let mut rng = StdRng::seed_from_u64(seed + 1);
            let (answer, elapsed) = round.auto_answer(&mut rng);
            let outcome = round.record_answer(Address::repeat_byte(1), answer, elapsed);
            assert!(outcome.correct, "seed {seed}");
            assert!(outcome.delta >= 10);
        }
    }
}
