//! Payout arithmetic.
//!
//! All money math is unsigned 256-bit integer arithmetic in the chain's
//! smallest unit; nothing here ever touches floating point. Fees are
//! basis-point multiply-then-divide, splits conserve the pool exactly:
//! `fee + Σ payouts = entry_fee · n_players` always.

use crate::arena::PayoutScheme;
use crate::constants::BPS_DENOMINATOR;
use crate::error::InvariantViolation;
use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};

/// Rank-weighted percentages for two and three winners.
const WEIGHTS_TWO: [u64; 2] = [60, 40];
const WEIGHTS_THREE: [u64; 3] = [70, 20, 10];

/// The result of dividing a prize pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSplit {
    /// Gross pool: `entry_fee · n_players`.
    pub pool: U256,
    /// Protocol take: `⌊pool · fee_bps / 10000⌋`.
    pub fee: U256,
    /// Net pool available to winners.
    pub available: U256,
    /// Per-winner amounts in rank order; same length as the winner list.
    pub payouts: Vec<U256>,
}

/// Gross prize pool. Overflow is an internal bug (entry fees are bounded by
/// chain supply), so it surfaces as an invariant violation.
pub fn prize_pool(entry_fee: U256, n_players: u32) -> Result<U256, InvariantViolation> {
    entry_fee
        .checked_mul(U256::from(n_players))
        .ok_or_else(|| InvariantViolation("prize pool overflow".into()))
}

/// Basis-point fee on the pool, rounded down.
pub fn protocol_fee(pool: U256, fee_bps: u16) -> U256 {
    let scaled: U512 = pool.full_mul(U256::from(fee_bps)) / U512::from(BPS_DENOMINATOR);
    // fee_bps ≤ 10000, so the quotient is bounded by the pool and fits.
    U256::try_from(scaled).unwrap_or(pool)
}

/// Split a pool among `winner_count` ranked winners.
pub fn split(
    entry_fee: U256,
    n_players: u32,
    fee_bps: u16,
    winner_count: usize,
    scheme: PayoutScheme,
) -> Result<PayoutSplit, InvariantViolation> {
    if winner_count == 0 {
        return Err(InvariantViolation("payout split with zero winners".into()));
    }
    let pool = prize_pool(entry_fee, n_players)?;
    let fee = protocol_fee(pool, fee_bps);
    let available = pool - fee;

    let payouts = match scheme {
        PayoutScheme::RankWeighted if winner_count == 2 => weighted(available, &WEIGHTS_TWO),
        PayoutScheme::RankWeighted if winner_count == 3 => weighted(available, &WEIGHTS_THREE),
        // RankWeighted has no table for other counts; equal split is the
        // documented fallback and the default scheme.
        _ => equal(available, winner_count),
    };

    debug_assert_eq!(
        payouts.iter().fold(U256::zero(), |acc, p| acc + p) + fee,
        pool
    );

    Ok(PayoutSplit {
        pool,
        fee,
        available,
        payouts,
    })
}

/// Equal shares; the remainder goes to the highest-ranked winners, one unit
/// each, so the distribution is deterministic and verifiable.
fn equal(available: U256, winner_count: usize) -> Vec<U256> {
    let k = U256::from(winner_count);
    let per_winner = available / k;
    let remainder = (available - per_winner * k).as_usize();
    (0..winner_count)
        .map(|i| {
            if i < remainder {
                per_winner + U256::one()
            } else {
                per_winner
            }
        })
        .collect()
}

/// Percentage split; rank 0 absorbs the rounding remainder so conservation
/// holds and the top rank never trails.
fn weighted(available: U256, weights: &[u64]) -> Vec<U256> {
    let mut payouts = vec![U256::zero(); weights.len()];
    let mut rest = U256::zero();
    for (i, w) in weights.iter().enumerate().skip(1) {
        let share = available * U256::from(*w) / U256::from(100u64);
        payouts[i] = share;
        rest += share;
    }
    payouts[0] = available - rest;
    payouts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(payouts: &[U256]) -> U256 {
        payouts.iter().fold(U256::zero(), |acc, p| acc + p)
    }

    #[test]
    fn two_winner_happy_path() {
        // entry_fee = 10^15, 2 players, 250 bps.
        let split = split(U256::exp10(15), 2, 250, 2, PayoutScheme::EqualSplit).unwrap();
        assert_eq!(split.pool, U256::exp10(15) * U256::from(2u64));
        assert_eq!(split.fee, U256::from(5u64) * U256::exp10(13));
        assert_eq!(split.available, U256::from(195u64) * U256::exp10(13));
        assert_eq!(
            split.payouts,
            vec![
                U256::from(975u64) * U256::exp10(12),
                U256::from(975u64) * U256::exp10(12)
            ]
        );
    }

    #[test]
    fn remainder_is_front_loaded() {
        // 3 players, fee 1 each, no protocol fee, two winners: 3 / 2 = 1 r 1.
        let split1 = split(U256::one(), 3, 0, 2, PayoutScheme::EqualSplit).unwrap();
        assert_eq!(split1.payouts, vec![U256::from(2u64), U256::one()]);

        // 4 players, three winners: 4 / 3 = 1 r 1.
        let split2 = split(U256::one(), 4, 0, 3, PayoutScheme::EqualSplit).unwrap();
        assert_eq!(split2.payouts, vec![U256::from(2u64), U256::one(), U256::one()]);
    }

    #[test]
    fn fee_edge_cases() {
        let zero = split(U256::exp10(15), 4, 0, 2, PayoutScheme::EqualSplit).unwrap();
        assert_eq!(zero.fee, U256::zero());
        assert_eq!(zero.available, zero.pool);

        let max = split(U256::exp10(15), 4, 1_000, 2, PayoutScheme::EqualSplit).unwrap();
        assert_eq!(max.fee, max.pool / U256::from(10u64));
    }

    #[test]
    fn conservation_and_rank_monotonicity() {
        let fees = [U256::one(), U256::from(7u64), U256::exp10(15), U256::exp10(18)];
        for entry_fee in fees {
            for n_players in 2..=16u32 {
                for fee_bps in [0u16, 1, 250, 999, 1_000] {
                    for winners in 1..=4usize {
                        for scheme in [PayoutScheme::EqualSplit, PayoutScheme::RankWeighted] {
                            let s = split(entry_fee, n_players, fee_bps, winners, scheme).unwrap();
                            assert_eq!(s.fee + sum(&s.payouts), s.pool, "conservation");
                            for pair in s.payouts.windows(2) {
                                assert!(pair[0] >= pair[1], "rank monotonicity");
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn rank_weighted_tables() {
        let s = split(U256::from(50u64), 2, 0, 2, PayoutScheme::RankWeighted).unwrap();
        assert_eq!(s.payouts, vec![U256::from(60u64), U256::from(40u64)]);

        let s = split(U256::from(25u64), 4, 0, 3, PayoutScheme::RankWeighted).unwrap();
        assert_eq!(
            s.payouts,
            vec![U256::from(70u64), U256::from(20u64), U256::from(10u64)]
        );

        // No table for four winners: falls back to equal.
        let s = split(U256::from(25u64), 4, 0, 4, PayoutScheme::RankWeighted).unwrap();
        assert_eq!(s.payouts, vec![U256::from(25u64); 4]);
    }

    #[test]
    fn zero_winners_is_an_invariant_violation() {
        assert!(split(U256::one(), 2, 0, 0, PayoutScheme::EqualSplit).is_err());
    }

    #[test]
    fn pool_overflow_is_caught() {
        assert!(prize_pool(U256::MAX, 2).is_err());
    }
}
