//! Game engine hosting the four Claw Arena mini-game protocols.
//!
//! The engine is pure: it never reads a clock, performs I/O, or draws
//! ambient randomness. The orchestrator owns timing and feeds in
//! millisecond timestamps; every random draw comes from the game seed.
//!
//! ## Protocols
//!
//! | Game       | Rounds | Shape |
//! |------------|--------|-------|
//! | Claw       | 1      | 5 grabs each over a shared prize field |
//! | Prediction | 3      | hidden numeric target, closeness scoring |
//! | Speed      | 10     | math / pattern / reaction, speed scoring |
//! | Blackjack  | 5      | fresh deck per hand, dealer draws to 17 |

pub mod blackjack;
pub mod cards;
pub mod claw;
pub mod game;
pub mod prediction;
pub mod seed;
pub mod speed;

pub use game::{BlackjackAction, Challenge, Game, Move, MoveOutcome, PlayerState, RoundOutcome};
pub use seed::GameSeed;

use claw_types::Address;
use thiserror::Error;

/// Move and lifecycle validation failures. Surfaced to the caller; the game
/// state is untouched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("game is not active (phase: {0})")]
    NotActive(&'static str),
    #[error("player {0:#x} is not in this game")]
    NotAParticipant(Address),
    #[error("move already submitted for this round")]
    MoveAlreadySubmitted,
    #[error("no grab attempts remaining")]
    AttemptsExhausted,
    #[error("hand is already complete")]
    HandComplete,
    #[error("wrong move payload for a {expected} game")]
    WrongMoveType { expected: &'static str },
    #[error("no active challenge")]
    NoChallenge,
    #[error("invalid move: {0}")]
    InvalidMove(String),
}
