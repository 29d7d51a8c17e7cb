//! Deterministic randomness for games.
//!
//! Every game owns a 32-byte seed derived from its arena and creation
//! instant. Challenges and auto-moves draw from RNGs keyed off that seed
//! with domain separators, so a replay with identical inputs reproduces the
//! exact challenge stream, auto-moves, scores and winners.
//!
//! Derivation contract (stable; external verifiers rely on it):
//! ```text
//! game_seed        = keccak256("claw-arena/game-seed/v1" ‖ arena ‖ created_at_ms_be)
//! round_seed[r]    = keccak256(game_seed ‖ r_be ‖ "round")
//! auto_seed[r, p]  = keccak256(game_seed ‖ r_be ‖ p ‖ "auto")
//! ```

use claw_types::Address;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

pub const SEED_LEN: usize = 32;

/// Per-game master seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSeed(pub [u8; SEED_LEN]);

impl GameSeed {
    /// Derive the master seed for a game.
    pub fn derive(arena: &Address, created_at_ms: u64) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(b"claw-arena/game-seed/v1");
        hasher.update(arena.as_bytes());
        hasher.update(created_at_ms.to_be_bytes());
        Self(hasher.finalize().into())
    }

    /// Short hex identifier used as the game id.
    pub fn short_id(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// RNG for generating the round's challenge.
    pub fn round_rng(&self, round: u32) -> StdRng {
        StdRng::from_seed(self.derive_sub(round, b"round", None))
    }

    /// RNG for a player's auto-move in a round. Pre-registered: the seed
    /// depends only on (game, round, player), never on arrival timing.
    pub fn auto_rng(&self, round: u32, player: &Address) -> StdRng {
        StdRng::from_seed(self.derive_sub(round, b"auto", Some(player)))
    }

    fn derive_sub(&self, round: u32, domain: &[u8], player: Option<&Address>) -> [u8; SEED_LEN] {
        let mut hasher = Keccak256::new();
        hasher.update(self.0);
        hasher.update(round.to_be_bytes());
        if let Some(player) = player {
            hasher.update(player.as_bytes());
        }
        hasher.update(domain);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn arena() -> Address {
        Address::repeat_byte(0xab)
    }

    #[test]
    fn seed_is_deterministic() {
        let a = GameSeed::derive(&arena(), 1_000);
        let b = GameSeed::derive(&arena(), 1_000);
        assert_eq!(a, b);
        assert_eq!(a.short_id(), b.short_id());
    }

    #[test]
    fn seed_varies_with_inputs() {
        let base = GameSeed::derive(&arena(), 1_000);
        assert_ne!(base, GameSeed::derive(&arena(), 1_001));
        assert_ne!(base, GameSeed::derive(&Address::repeat_byte(0xcd), 1_000));
    }

    #[test]
    fn round_streams_are_independent() {
        let seed = GameSeed::derive(&arena(), 1);
        let a: u64 = seed.round_rng(1).gen();
        let b: u64 = seed.round_rng(2).gen();
        assert_ne!(a, b);
        // Re-creating the RNG replays the stream.
        let again: u64 = seed.round_rng(1).gen();
        assert_eq!(a, again);
    }

    #[test]
    fn auto_rng_is_per_player() {
        let seed = GameSeed::derive(&arena(), 1);
        let p1 = Address::repeat_byte(1);
        let p2 = Address::repeat_byte(2);
        let a: u64 = seed.auto_rng(3, &p1).gen();
        let b: u64 = seed.auto_rng(3, &p2).gen();
        assert_ne!(a, b);
    }
}
