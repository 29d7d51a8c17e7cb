//! The arena aggregate: one tournament instance with its own escrow,
//! lifecycle and result.
//!
//! All mutation goes through guard methods that enforce the lifecycle
//! invariants; callers (the orchestrator's arena actor) decide *when* to
//! call them, this module decides *whether* the call is legal. Violations
//! are structured errors, never silent normalization.

use crate::address::Address;
use crate::constants::{MAX_PLAYERS, MAX_PROTOCOL_FEE_BPS, MIN_PLAYERS};
use crate::error::{ArenaError, InvariantViolation};
use crate::game::GameType;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    Admin,
    Agent,
}

/// Arena-level view of the game lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    None,
    Waiting,
    Learning,
    Active,
    Finished,
    Cancelled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::None => "none",
            GameStatus::Waiting => "waiting",
            GameStatus::Learning => "learning",
            GameStatus::Active => "active",
            GameStatus::Finished => "finished",
            GameStatus::Cancelled => "cancelled",
        }
    }
}

/// How the net pool is divided among winners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutScheme {
    /// Equal shares, remainder front-loaded one unit per top rank.
    #[default]
    EqualSplit,
    /// 60/40 for two winners, 70/20/10 for three; equal split otherwise.
    RankWeighted,
}

/// Immutable arena parameters, fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub name: String,
    /// Entry fee in the chain's smallest unit.
    pub entry_fee: U256,
    pub max_players: u32,
    pub protocol_fee_bps: u16,
    pub treasury: Address,
    /// Absolute registration cutoff in epoch milliseconds, if any.
    pub registration_deadline_ms: Option<u64>,
    pub game_type: GameType,
    pub network: Network,
    pub created_by: CreatedBy,
    pub creation_reason: Option<String>,
    #[serde(default)]
    pub payout_scheme: PayoutScheme,
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.name.is_empty() {
            return Err(ArenaError::InvalidConfig("name must not be empty".into()));
        }
        if self.max_players < MIN_PLAYERS || self.max_players > MAX_PLAYERS {
            return Err(ArenaError::InvalidConfig(format!(
                "max_players {} outside {}..={}",
                self.max_players, MIN_PLAYERS, MAX_PLAYERS
            )));
        }
        if self.protocol_fee_bps > MAX_PROTOCOL_FEE_BPS {
            return Err(ArenaError::InvalidConfig(format!(
                "protocol_fee_bps {} exceeds {}",
                self.protocol_fee_bps, MAX_PROTOCOL_FEE_BPS
            )));
        }
        if self.entry_fee.is_zero() {
            return Err(ArenaError::InvalidConfig("entry_fee must be non-zero".into()));
        }
        Ok(())
    }
}

/// Final per-player scoring, archived onto the arena when its game ends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResults {
    pub scores: BTreeMap<Address, i64>,
    pub rounds_played: u32,
}

/// The root aggregate. See the guard methods for the legal transitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arena {
    pub address: Address,
    pub config: ArenaConfig,

    /// First-join order; preserved for deterministic tie-breaks.
    pub players: Vec<Address>,

    pub is_closed: bool,
    pub is_finalized: bool,
    pub game_status: GameStatus,
    /// Set after an invariant violation; a frozen arena accepts no mutation.
    #[serde(default)]
    pub frozen: bool,

    pub created_at_ms: u64,
    pub closed_at_ms: Option<u64>,
    pub learning_started_at_ms: Option<u64>,
    pub active_started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    pub finalized_at_ms: Option<u64>,

    pub game_id: Option<String>,
    /// Final rank order.
    pub winners: Vec<Address>,
    /// Same length and order as `winners`, smallest units.
    pub payouts: Vec<U256>,
    pub game_results: Option<GameResults>,

    /// Last consumed finalize nonce; 0 before the first authorization.
    pub used_nonce: u64,
    /// 65-byte (r, s, v) authorization once obtained.
    pub finalize_signature: Option<Vec<u8>>,
}

impl Arena {
    pub fn new(address: Address, config: ArenaConfig, now_ms: u64) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            address,
            config,
            players: Vec::new(),
            is_closed: false,
            is_finalized: false,
            game_status: GameStatus::None,
            frozen: false,
            created_at_ms: now_ms,
            closed_at_ms: None,
            learning_started_at_ms: None,
            active_started_at_ms: None,
            finished_at_ms: None,
            finalized_at_ms: None,
            game_id: None,
            winners: Vec::new(),
            payouts: Vec::new(),
            game_results: None,
            used_nonce: 0,
            finalize_signature: None,
        })
    }

    pub fn player_count(&self) -> u32 {
        self.players.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= self.config.max_players
    }

    /// Filled fraction of the lobby, used by the host agent's analysis.
    pub fn fill_rate(&self) -> f64 {
        if self.config.max_players == 0 {
            return 0.0;
        }
        self.player_count() as f64 / self.config.max_players as f64
    }

    /// Terminal states accept no further lifecycle events.
    pub fn is_terminal(&self) -> bool {
        self.is_finalized || self.game_status == GameStatus::Cancelled
    }

    /// "Active" from the host agent's perspective: still counts toward the
    /// open-arena depth target.
    pub fn counts_as_active(&self) -> bool {
        !self.is_terminal() && !self.frozen
    }

    fn ensure_mutable(&self) -> Result<(), ArenaError> {
        if self.frozen {
            return Err(ArenaError::Frozen);
        }
        Ok(())
    }

    /// Guard for `player_join`. Join at exactly the registration deadline is
    /// accepted; one tick past is rejected.
    pub fn ensure_can_join(&self, player: Address, now_ms: u64) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if self.is_finalized {
            return Err(ArenaError::AlreadyFinalized);
        }
        if self.game_status == GameStatus::Cancelled {
            return Err(ArenaError::Cancelled);
        }
        if self.players.contains(&player) {
            return Err(ArenaError::AlreadyJoined(player));
        }
        // Fullness outranks closedness: a lobby that closed *because* it
        // filled reports `ArenaFull` to the racing join that lost.
        if self.is_full() {
            return Err(ArenaError::ArenaFull {
                max_players: self.config.max_players,
            });
        }
        if self.is_closed {
            return Err(ArenaError::RegistrationClosed);
        }
        if let Some(deadline) = self.config.registration_deadline_ms {
            if now_ms > deadline {
                return Err(ArenaError::DeadlinePassed);
            }
        }
        Ok(())
    }

    pub fn record_join(&mut self, player: Address, now_ms: u64) -> Result<(), ArenaError> {
        self.ensure_can_join(player, now_ms)?;
        self.players.push(player);
        Ok(())
    }

    pub fn close(&mut self, now_ms: u64) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if self.is_closed {
            return Err(ArenaError::RegistrationClosed);
        }
        self.is_closed = true;
        self.closed_at_ms = Some(now_ms);
        self.game_status = GameStatus::Waiting;
        Ok(())
    }

    pub fn cancel(&mut self, now_ms: u64) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if self.is_finalized {
            return Err(ArenaError::AlreadyFinalized);
        }
        self.game_status = GameStatus::Cancelled;
        self.is_closed = true;
        self.closed_at_ms.get_or_insert(now_ms);
        Ok(())
    }

    pub fn begin_learning(&mut self, game_id: String, now_ms: u64) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if !self.is_closed {
            return Err(ArenaError::InvalidConfig("arena must be closed first".into()));
        }
        if self.game_status != GameStatus::Waiting {
            return Err(ArenaError::GameNotActive(self.game_status.as_str()));
        }
        self.game_id = Some(game_id);
        self.game_status = GameStatus::Learning;
        self.learning_started_at_ms = Some(now_ms);
        Ok(())
    }

    pub fn begin_active(&mut self, now_ms: u64) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if self.game_status != GameStatus::Learning {
            return Err(ArenaError::GameNotActive(self.game_status.as_str()));
        }
        self.game_status = GameStatus::Active;
        self.active_started_at_ms = Some(now_ms);
        Ok(())
    }

    pub fn finish(
        &mut self,
        winners: Vec<Address>,
        results: GameResults,
        now_ms: u64,
    ) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if self.game_status != GameStatus::Active {
            return Err(ArenaError::GameNotActive(self.game_status.as_str()));
        }
        self.game_status = GameStatus::Finished;
        self.finished_at_ms = Some(now_ms);
        self.winners = winners;
        self.game_results = Some(results);
        Ok(())
    }

    /// Record a successful finalize authorization. The caller has already
    /// validated the nonce and payout bounds through the signer.
    pub fn record_finalization(
        &mut self,
        payouts: Vec<U256>,
        signature: Vec<u8>,
        nonce: u64,
        now_ms: u64,
    ) -> Result<(), ArenaError> {
        self.ensure_mutable()?;
        if self.is_finalized {
            return Err(ArenaError::AlreadyFinalized);
        }
        self.payouts = payouts;
        self.finalize_signature = Some(signature);
        self.used_nonce = nonce;
        self.is_finalized = true;
        self.finalized_at_ms = Some(now_ms);
        Ok(())
    }

    /// Freeze after an internal bug; only a diagnostic path, never business
    /// logic, calls this.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Structural invariants that must hold at every persistence point.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = std::collections::HashSet::new();
        for p in &self.players {
            if !seen.insert(p) {
                return Err(InvariantViolation(format!("duplicate player {p:#x}")));
            }
        }
        if self.player_count() > self.config.max_players {
            return Err(InvariantViolation(format!(
                "{} players exceeds max {}",
                self.player_count(),
                self.config.max_players
            )));
        }
        if self.winners.len() != self.payouts.len() && self.is_finalized {
            return Err(InvariantViolation(format!(
                "{} winners vs {} payouts",
                self.winners.len(),
                self.payouts.len()
            )));
        }
        let mut winner_seen = std::collections::HashSet::new();
        for w in &self.winners {
            if !self.players.contains(w) {
                return Err(InvariantViolation(format!("winner {w:#x} is not a player")));
            }
            if !winner_seen.insert(w) {
                return Err(InvariantViolation(format!("duplicate winner {w:#x}")));
            }
        }
        if self.is_finalized && self.game_status != GameStatus::Finished {
            return Err(InvariantViolation(format!(
                "finalized arena in game_status {}",
                self.game_status.as_str()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::synthetic_address;

    fn test_config() -> ArenaConfig {
        ArenaConfig {
            name: "Arena Clash #1".into(),
            entry_fee: U256::exp10(15),
            max_players: 4,
            protocol_fee_bps: 250,
            treasury: Address::zero(),
            registration_deadline_ms: None,
            game_type: GameType::Prediction,
            network: Network::Testnet,
            created_by: CreatedBy::Admin,
            creation_reason: None,
            payout_scheme: PayoutScheme::EqualSplit,
        }
    }

    fn player(n: u64) -> Address {
        synthetic_address("player", n)
    }

    #[test]
    fn join_preserves_first_join_order() {
        let mut arena = Arena::new(Address::repeat_byte(1), test_config(), 0).unwrap();
        for n in 0..3 {
            arena.record_join(player(n), 10).unwrap();
        }
        assert_eq!(arena.players, vec![player(0), player(1), player(2)]);
    }

    #[test]
    fn double_join_rejected() {
        let mut arena = Arena::new(Address::repeat_byte(1), test_config(), 0).unwrap();
        arena.record_join(player(1), 10).unwrap();
        assert_eq!(
            arena.record_join(player(1), 11),
            Err(ArenaError::AlreadyJoined(player(1)))
        );
    }

    #[test]
    fn join_rejected_when_full() {
        let mut arena = Arena::new(Address::repeat_byte(1), test_config(), 0).unwrap();
        for n in 0..4 {
            arena.record_join(player(n), 10).unwrap();
        }
        assert_eq!(
            arena.record_join(player(9), 11),
            Err(ArenaError::ArenaFull { max_players: 4 })
        );
    }

    #[test]
    fn join_at_deadline_accepted_one_past_rejected() {
        let mut config = test_config();
        config.registration_deadline_ms = Some(5_000);
        let mut arena = Arena::new(Address::repeat_byte(1), config, 0).unwrap();
        assert!(arena.record_join(player(1), 5_000).is_ok());
        assert_eq!(arena.record_join(player(2), 5_001), Err(ArenaError::DeadlinePassed));
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut arena = Arena::new(Address::repeat_byte(1), test_config(), 0).unwrap();
        arena.record_join(player(1), 10).unwrap();
        arena.record_join(player(2), 11).unwrap();
        arena.close(20).unwrap();
        arena.begin_learning("g1".into(), 30).unwrap();
        arena.begin_active(90).unwrap();
        arena
            .finish(vec![player(1)], GameResults::default(), 200)
            .unwrap();
        arena
            .record_finalization(vec![U256::from(1)], vec![0u8; 65], 1, 210)
            .unwrap();
        assert!(arena.is_finalized);
        assert_eq!(arena.used_nonce, 1);
        assert_eq!(
            arena.record_finalization(vec![U256::from(1)], vec![0u8; 65], 2, 220),
            Err(ArenaError::AlreadyFinalized)
        );
    }

    #[test]
    fn cancelled_arena_rejects_joins() {
        let mut arena = Arena::new(Address::repeat_byte(1), test_config(), 0).unwrap();
        arena.cancel(50).unwrap();
        assert!(arena.is_terminal());
        assert_eq!(arena.record_join(player(1), 60), Err(ArenaError::Cancelled));
    }

    #[test]
    fn frozen_arena_rejects_everything() {
        let mut arena = Arena::new(Address::repeat_byte(1), test_config(), 0).unwrap();
        arena.freeze();
        assert_eq!(arena.record_join(player(1), 10), Err(ArenaError::Frozen));
        assert_eq!(arena.close(10), Err(ArenaError::Frozen));
    }

    #[test]
    fn invariants_catch_foreign_winner() {
        let mut arena = Arena::new(Address::repeat_byte(1), test_config(), 0).unwrap();
        arena.record_join(player(1), 10).unwrap();
        arena.winners = vec![player(9)];
        assert!(arena.check_invariants().is_err());
    }

    #[test]
    fn config_validation_bounds() {
        let mut config = test_config();
        config.max_players = 1;
        assert!(config.validate().is_err());
        let mut config = test_config();
        config.protocol_fee_bps = 1_001;
        assert!(config.validate().is_err());
        let mut config = test_config();
        config.entry_fee = U256::zero();
        assert!(config.validate().is_err());
    }

    #[test]
    fn arena_document_round_trips_through_json() {
        let mut arena = Arena::new(Address::repeat_byte(7), test_config(), 123).unwrap();
        arena.record_join(player(1), 200).unwrap();
        let json = serde_json::to_string(&arena).unwrap();
        let back: Arena = serde_json::from_str(&json).unwrap();
        assert_eq!(back, arena);
    }
}
