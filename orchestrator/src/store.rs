//! Persistence boundary.
//!
//! The real store is an external collaborator; the core only needs CAS-style
//! document updates keyed by arena address plus append-only payout/refund
//! records and leaderboard deltas. [`MemStore`] is the in-memory
//! implementation used by tests and the dev binary.

use claw_types::{Address, Arena, StoreError, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub arena: Address,
    pub winner: Address,
    pub amount: U256,
    pub recorded_at_ms: u64,
}

/// Off-chain record that a cancelled arena owes its sole player their entry
/// fee back. Execution is the escrow's business, not ours.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundIntent {
    pub arena: Address,
    pub player: Address,
    pub amount: U256,
    pub recorded_at_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub total_wins: u64,
    pub total_payouts: U256,
    pub games_played: u64,
}

/// CAS-versioned arena documents plus write-through aggregates.
///
/// Concurrent writers to the same arena are forbidden (one orchestrator
/// leads each arena); a version conflict therefore signals either a retryable
/// infrastructure hiccup or an operator intervention, and surfaces as
/// [`StoreError::Conflict`].
pub trait ArenaStore: Send + Sync {
    /// Insert a fresh document; returns its initial version.
    fn insert_arena(&self, arena: &Arena) -> Result<u64, StoreError>;

    fn load_arena(&self, address: &Address) -> Result<(Arena, u64), StoreError>;

    fn list_arenas(&self) -> Result<Vec<Arena>, StoreError>;

    /// Replace the document iff the stored version equals `expected_version`;
    /// returns the new version.
    fn update_arena(
        &self,
        address: &Address,
        expected_version: u64,
        arena: &Arena,
    ) -> Result<u64, StoreError>;

    fn append_payout_record(&self, record: PayoutRecord) -> Result<(), StoreError>;

    fn append_refund_intent(&self, intent: RefundIntent) -> Result<(), StoreError>;

    fn update_leaderboard(
        &self,
        player: &Address,
        delta_wins: u64,
        delta_payouts: U256,
        delta_games: u64,
    ) -> Result<(), StoreError>;

    fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StoreError>;

    fn payouts_for(&self, arena: &Address) -> Result<Vec<PayoutRecord>, StoreError>;

    fn refunds_for(&self, arena: &Address) -> Result<Vec<RefundIntent>, StoreError>;
}

#[derive(Default)]
struct MemStoreInner {
    arenas: HashMap<Address, (u64, Arena)>,
    payouts: Vec<PayoutRecord>,
    refunds: Vec<RefundIntent>,
    leaderboard: HashMap<Address, LeaderboardEntry>,
}

/// In-memory reference store.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemStoreInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArenaStore for MemStore {
    fn insert_arena(&self, arena: &Arena) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.arenas.contains_key(&arena.address) {
            return Err(StoreError::Backend(format!(
                "arena {:#x} already exists",
                arena.address
            )));
        }
        inner.arenas.insert(arena.address, (1, arena.clone()));
        Ok(1)
    }

    fn load_arena(&self, address: &Address) -> Result<(Arena, u64), StoreError> {
        let inner = self.inner.lock().expect("store lock");
        inner
            .arenas
            .get(address)
            .map(|(version, arena)| (arena.clone(), *version))
            .ok_or(StoreError::NotFound)
    }

    fn list_arenas(&self) -> Result<Vec<Arena>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        let mut arenas: Vec<Arena> = inner.arenas.values().map(|(_, a)| a.clone()).collect();
        arenas.sort_by_key(|a| a.created_at_ms);
        Ok(arenas)
    }

    fn update_arena(
        &self,
        address: &Address,
        expected_version: u64,
        arena: &Arena,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        let slot = inner.arenas.get_mut(address).ok_or(StoreError::NotFound)?;
        if slot.0 != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: slot.0,
            });
        }
        slot.0 += 1;
        slot.1 = arena.clone();
        Ok(slot.0)
    }

    fn append_payout_record(&self, record: PayoutRecord) -> Result<(), StoreError> {
        self.inner.lock().expect("store lock").payouts.push(record);
        Ok(())
    }

    fn append_refund_intent(&self, intent: RefundIntent) -> Result<(), StoreError> {
        self.inner.lock().expect("store lock").refunds.push(intent);
        Ok(())
    }

    fn update_leaderboard(
        &self,
        player: &Address,
        delta_wins: u64,
        delta_payouts: U256,
        delta_games: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        let entry = inner
            .leaderboard
            .entry(*player)
            .or_insert_with(|| LeaderboardEntry {
                address: *player,
                ..Default::default()
            });
        entry.total_wins += delta_wins;
        entry.total_payouts = entry.total_payouts.saturating_add(delta_payouts);
        entry.games_played += delta_games;
        Ok(())
    }

    fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        let mut rows: Vec<LeaderboardEntry> = inner.leaderboard.values().cloned().collect();
        rows.sort_by(|a, b| b.total_payouts.cmp(&a.total_payouts));
        Ok(rows)
    }

    fn payouts_for(&self, arena: &Address) -> Result<Vec<PayoutRecord>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .payouts
            .iter()
            .filter(|r| &r.arena == arena)
            .cloned()
            .collect())
    }

    fn refunds_for(&self, arena: &Address) -> Result<Vec<RefundIntent>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .refunds
            .iter()
            .filter(|r| &r.arena == arena)
            .cloned()
            .collect())
    }
}
