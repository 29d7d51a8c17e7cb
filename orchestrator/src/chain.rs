//! On-chain adapter boundary.
//!
//! The orchestrator never executes transactions; it asks thin questions
//! (did this player pay in? did the finalize land?) and hands off refund
//! intents. The production adapter wraps an RPC client; [`NullChain`] is
//! the permissive stand-in for tests and off-chain arenas.

use claw_types::{Address, H256, U256};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain adapter unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalizationReceipt {
    pub tx_hash: H256,
    pub success: bool,
}

pub trait ChainAdapter: Send + Sync {
    /// Optional pre-join sanity check against the escrow.
    fn has_player_joined(&self, arena: &Address, player: &Address) -> Result<bool, ChainError>;

    /// Polled after a finalize authorization has been handed off for
    /// submission.
    fn observe_finalization(
        &self,
        arena: &Address,
    ) -> Result<Option<FinalizationReceipt>, ChainError>;

    /// Hand a refund intent to the escrow path. Execution is out of scope.
    fn request_refund(
        &self,
        arena: &Address,
        player: &Address,
        amount: U256,
    ) -> Result<(), ChainError>;
}

/// Accepts everything, observes nothing. Suitable for testnet dress
/// rehearsals and unit tests.
#[derive(Default)]
pub struct NullChain {
    refunds: Mutex<HashMap<Address, Vec<(Address, U256)>>>,
}

impl NullChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refunds_requested(&self, arena: &Address) -> Vec<(Address, U256)> {
        self.refunds
            .lock()
            .expect("chain lock")
            .get(arena)
            .cloned()
            .unwrap_or_default()
    }
}

impl ChainAdapter for NullChain {
    fn has_player_joined(&self, _arena: &Address, _player: &Address) -> Result<bool, ChainError> {
        Ok(true)
    }

    fn observe_finalization(
        &self,
        _arena: &Address,
    ) -> Result<Option<FinalizationReceipt>, ChainError> {
        Ok(None)
    }

    fn request_refund(
        &self,
        arena: &Address,
        player: &Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        self.refunds
            .lock()
            .expect("chain lock")
            .entry(*arena)
            .or_default()
            .push((*player, amount));
        Ok(())
    }
}
