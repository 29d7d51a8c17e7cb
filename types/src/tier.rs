//! Tier policy table for the autonomous host agent.
//!
//! The table is bit-exact so agent behavior can be seeded and asserted in
//! tests:
//!
//! | Tier   | Entry-fee range (wei) | Players  | Fee bps | Availability |
//! |--------|-----------------------|----------|---------|--------------|
//! | MICRO  | 10^15 .. 10^16        | 4, 8, 16 | 200     | always |
//! | SMALL  | 10^16 .. 10^17        | 4, 8, 16 | 250     | always |
//! | MEDIUM | 10^17 .. 10^18        | 4, 8     | 250     | peak only |
//! | LARGE  | 10^18 .. 10^19        | 4, 8     | 300     | peak, SMALL fill ≥ 0.5 over 24 h |
//! | WHALE  | ≥ 10^19               | 4        | 300     | weekend peak, fill ≥ 0.7 |

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Micro,
    Small,
    Medium,
    Large,
    Whale,
}

/// Demand signals the availability predicate consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TierSignals {
    pub peak: bool,
    pub weekend: bool,
    /// Fill rate of SMALL-tier arenas over the trailing 24 h window.
    pub small_fill_24h: f64,
    /// Overall recent fill rate across tiers.
    pub overall_fill: f64,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::Micro, Tier::Small, Tier::Medium, Tier::Large, Tier::Whale];

    /// Inclusive lower bound of the entry-fee decade.
    pub fn fee_floor(&self) -> U256 {
        match self {
            Tier::Micro => U256::exp10(15),
            Tier::Small => U256::exp10(16),
            Tier::Medium => U256::exp10(17),
            Tier::Large => U256::exp10(18),
            Tier::Whale => U256::exp10(19),
        }
    }

    /// Exclusive upper bound; `None` for the open-ended WHALE tier.
    pub fn fee_ceiling(&self) -> Option<U256> {
        match self {
            Tier::Micro => Some(U256::exp10(16)),
            Tier::Small => Some(U256::exp10(17)),
            Tier::Medium => Some(U256::exp10(18)),
            Tier::Large => Some(U256::exp10(19)),
            Tier::Whale => None,
        }
    }

    /// Entry fees the agent samples from: 1× and 5× the decade floor.
    pub fn fee_options(&self) -> [U256; 2] {
        let floor = self.fee_floor();
        [floor, floor * U256::from(5u64)]
    }

    pub fn player_options(&self) -> &'static [u32] {
        match self {
            Tier::Micro | Tier::Small => &[4, 8, 16],
            Tier::Medium | Tier::Large => &[4, 8],
            Tier::Whale => &[4],
        }
    }

    pub fn protocol_fee_bps(&self) -> u16 {
        match self {
            Tier::Micro => 200,
            Tier::Small | Tier::Medium => 250,
            Tier::Large | Tier::Whale => 300,
        }
    }

    /// Availability per the policy table.
    pub fn is_available(&self, signals: &TierSignals) -> bool {
        match self {
            Tier::Micro | Tier::Small => true,
            Tier::Medium => signals.peak,
            Tier::Large => signals.peak && signals.small_fill_24h >= 0.5,
            Tier::Whale => signals.weekend && signals.peak && signals.overall_fill >= 0.7,
        }
    }

    /// Classify an entry fee into its tier.
    pub fn classify(entry_fee: U256) -> Tier {
        if entry_fee < U256::exp10(16) {
            Tier::Micro
        } else if entry_fee < U256::exp10(17) {
            Tier::Small
        } else if entry_fee < U256::exp10(18) {
            Tier::Medium
        } else if entry_fee < U256::exp10(19) {
            Tier::Large
        } else {
            Tier::Whale
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Micro => "micro",
            Tier::Small => "small",
            Tier::Medium => "medium",
            Tier::Large => "large",
            Tier::Whale => "whale",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
