//! Game-type metadata shared by the engine and orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four tournament protocols. Every arena is bound to exactly one at
/// creation and the binding never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Claw,
    Prediction,
    Speed,
    Blackjack,
}

impl GameType {
    pub const ALL: [GameType; 4] = [
        GameType::Claw,
        GameType::Prediction,
        GameType::Speed,
        GameType::Blackjack,
    ];

    /// Rounds (or hands) in a full game.
    pub fn max_rounds(&self) -> u32 {
        match self {
            GameType::Claw => 1,
            GameType::Prediction => 3,
            GameType::Speed => 10,
            GameType::Blackjack => 5,
        }
    }

    /// Default per-round deadline. Speed challenges carry their own tighter
    /// limits; this is the ceiling the scheduler falls back to.
    pub fn round_time_limit_ms(&self) -> u64 {
        match self {
            GameType::Claw => 120_000,
            GameType::Prediction => 45_000,
            GameType::Speed => 15_000,
            GameType::Blackjack => 30_000,
        }
    }

    /// Participation bounds for lobby sizing.
    pub fn player_bounds(&self) -> (u32, u32) {
        match self {
            GameType::Claw => (2, 16),
            GameType::Prediction => (2, 32),
            GameType::Speed => (2, 16),
            GameType::Blackjack => (2, 8),
        }
    }

    /// Display name used in lobby listings.
    pub fn display_name(&self) -> &'static str {
        match self {
            GameType::Claw => "Claw Machine Madness",
            GameType::Prediction => "Prediction Arena",
            GameType::Speed => "Speed Challenge",
            GameType::Blackjack => "Blackjack Showdown",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Claw => "claw",
            GameType::Prediction => "prediction",
            GameType::Speed => "speed",
            GameType::Blackjack => "blackjack",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a running game, as seen by the engine.
///
/// Distinct from the arena-level `GameStatus`: an arena can be `Cancelled`
/// before a game ever exists, so cancellation is not a game phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Waiting,
    Learning,
    Active,
    Finished,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Waiting => "waiting",
            GamePhase::Learning => "learning",
            GamePhase::Active => "active",
            GamePhase::Finished => "finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_counts_per_protocol() {
        assert_eq!(GameType::Claw.max_rounds(), 1);
        assert_eq!(GameType::Prediction.max_rounds(), 3);
        assert_eq!(GameType::Speed.max_rounds(), 10);
        assert_eq!(GameType::Blackjack.max_rounds(), 5);
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        let json = serde_json::to_string(&GameType::Blackjack).unwrap();
        assert_eq!(json, "\"blackjack\"");
        let back: GameType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, GameType::Blackjack);
    }
}
