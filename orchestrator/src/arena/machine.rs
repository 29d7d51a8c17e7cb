//! Pure arena lifecycle transitions.
//!
//! Given an arena, an event and the current instant, these functions
//! mutate the aggregate and report the timer work the caller owes the
//! scheduler. No I/O, no clock reads: the actor supplies `now_ms` and
//! executes the effects.

use claw_types::constants::{COUNTDOWN_SECONDS, IDLE_REAP_SECONDS, LEARNING_SECONDS};
use claw_types::{Address, Arena, ArenaError, GameStatus};

/// Lifecycle durations. Production values come from the protocol constants;
/// tests compress them to keep end-to-end runs fast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    pub countdown_ms: u64,
    pub learning_ms: u64,
    pub idle_reap_ms: u64,
    /// Ceiling applied to per-round deadlines; production leaves the
    /// challenge-supplied windows alone.
    pub round_cap_ms: Option<u64>,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            countdown_ms: COUNTDOWN_SECONDS * 1_000,
            learning_ms: LEARNING_SECONDS * 1_000,
            idle_reap_ms: IDLE_REAP_SECONDS * 1_000,
            round_cap_ms: None,
        }
    }
}

impl Timings {
    /// Clamp an engine-supplied round deadline to the configured ceiling.
    pub fn cap_round_deadline(&self, now_ms: u64, deadline_ms: u64) -> u64 {
        match self.round_cap_ms {
            Some(cap) => now_ms + deadline_ms.saturating_sub(now_ms).min(cap),
            None => deadline_ms,
        }
    }
}

/// Timer work owed after a successful join.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinEffect {
    /// Lobby filled: cancel any pending idle reap, start the countdown.
    LobbyFull { countdown_at_ms: u64 },
    /// First player arrived: start the idle-reap window.
    FirstJoin { reap_at_ms: u64 },
    /// Mid-lobby join, nothing to schedule.
    None,
}

/// Outcome of an idle reap or registration deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nobody paid in; the arena is cancelled outright.
    CancelledEmpty,
    /// One player paid in; cancelled, and they are owed a refund.
    CancelledRefund { player: Address },
    /// Enough players; registration closed, countdown scheduled.
    Closed { countdown_at_ms: u64 },
    /// The timer raced a state change (already closed or terminal); no-op.
    Lapsed,
}

/// `player_join`: append the player and report what to schedule.
pub fn apply_join(
    arena: &mut Arena,
    player: Address,
    now_ms: u64,
    timings: &Timings,
) -> Result<JoinEffect, ArenaError> {
    arena.record_join(player, now_ms)?;

    if arena.is_full() {
        arena.close(now_ms)?;
        Ok(JoinEffect::LobbyFull {
            countdown_at_ms: now_ms + timings.countdown_ms,
        })
    } else if arena.player_count() <= 1 {
        Ok(JoinEffect::FirstJoin {
            reap_at_ms: now_ms + timings.idle_reap_ms,
        })
    } else {
        Ok(JoinEffect::None)
    }
}

/// `idle_reap` fired: cancel an under-filled lobby, or short-circuit a
/// viable one straight to its countdown (zero wait).
pub fn apply_idle_reap(arena: &mut Arena, now_ms: u64) -> Result<CloseOutcome, ArenaError> {
    close_or_cancel(arena, now_ms, now_ms)
}

/// Registration deadline passed: same cancellation policy as the reap, but
/// a viable lobby gets the full countdown.
pub fn apply_registration_deadline(
    arena: &mut Arena,
    now_ms: u64,
    timings: &Timings,
) -> Result<CloseOutcome, ArenaError> {
    close_or_cancel(arena, now_ms, now_ms + timings.countdown_ms)
}

fn close_or_cancel(
    arena: &mut Arena,
    now_ms: u64,
    countdown_at_ms: u64,
) -> Result<CloseOutcome, ArenaError> {
    if arena.is_terminal() || arena.is_closed {
        return Ok(CloseOutcome::Lapsed);
    }
    match arena.player_count() {
        0 => {
            arena.cancel(now_ms)?;
            Ok(CloseOutcome::CancelledEmpty)
        }
        1 => {
            let player = arena.players[0];
            arena.cancel(now_ms)?;
            Ok(CloseOutcome::CancelledRefund { player })
        }
        _ => {
            arena.close(now_ms)?;
            Ok(CloseOutcome::Closed { countdown_at_ms })
        }
    }
}

/// `game_start_countdown` fired: the arena enters the learning phase. The
/// caller creates the game and schedules the learning-end deadline.
pub fn apply_countdown(
    arena: &mut Arena,
    game_id: String,
    now_ms: u64,
    timings: &Timings,
) -> Result<u64, ArenaError> {
    if arena.game_status != GameStatus::Waiting {
        return Err(ArenaError::GameNotActive(arena.game_status.as_str()));
    }
    arena.begin_learning(game_id, now_ms)?;
    Ok(now_ms + timings.learning_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_types::arena::{ArenaConfig, CreatedBy, Network, PayoutScheme};
    use claw_types::{GameType, U256};

    fn arena(max_players: u32) -> Arena {
        Arena::new(
            Address::repeat_byte(0xee),
            ArenaConfig {
                name: "machine test".into(),
                entry_fee: U256::exp10(15),
                max_players,
                protocol_fee_bps: 250,
                treasury: Address::zero(),
                registration_deadline_ms: None,
                game_type: GameType::Speed,
                network: Network::Testnet,
                created_by: CreatedBy::Admin,
                creation_reason: None,
                payout_scheme: PayoutScheme::EqualSplit,
            },
            0,
        )
        .unwrap()
    }

    fn player(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    #[test]
    fn first_join_schedules_idle_reap() {
        let mut a = arena(4);
        let effect = apply_join(&mut a, player(1), 1_000, &Timings::default()).unwrap();
        assert_eq!(effect, JoinEffect::FirstJoin { reap_at_ms: 21_000 });
    }

    #[test]
    fn mid_lobby_join_schedules_nothing() {
        let mut a = arena(4);
        apply_join(&mut a, player(1), 1_000, &Timings::default()).unwrap();
        let effect = apply_join(&mut a, player(2), 2_000, &Timings::default()).unwrap();
        assert_eq!(effect, JoinEffect::None);
    }

    #[test]
    fn filling_join_closes_and_starts_countdown() {
        let mut a = arena(2);
        let timings = Timings::default();
        apply_join(&mut a, player(1), 1_000, &timings).unwrap();
        let effect = apply_join(&mut a, player(2), 5_000, &timings).unwrap();
        assert_eq!(
            effect,
            JoinEffect::LobbyFull {
                countdown_at_ms: 15_000
            }
        );
        assert!(a.is_closed);
        assert_eq!(a.game_status, GameStatus::Waiting);
        // The racing join that lost the last slot sees a full arena.
        assert_eq!(
            apply_join(&mut a, player(3), 6_000, &timings),
            Err(ArenaError::ArenaFull { max_players: 2 })
        );
    }

    #[test]
    fn reap_empty_lobby_cancels() {
        let mut a = arena(4);
        assert_eq!(
            apply_idle_reap(&mut a, 21_000).unwrap(),
            CloseOutcome::CancelledEmpty
        );
        assert_eq!(a.game_status, GameStatus::Cancelled);
    }

    #[test]
    fn reap_sole_player_cancels_with_refund() {
        let mut a = arena(4);
        apply_join(&mut a, player(1), 1_000, &Timings::default()).unwrap();
        assert_eq!(
            apply_idle_reap(&mut a, 21_000).unwrap(),
            CloseOutcome::CancelledRefund { player: player(1) }
        );
        assert!(a.is_terminal());
    }

    #[test]
    fn reap_viable_lobby_short_circuits_to_countdown() {
        let mut a = arena(8);
        let timings = Timings::default();
        apply_join(&mut a, player(1), 1_000, &timings).unwrap();
        apply_join(&mut a, player(2), 2_000, &timings).unwrap();
        // Countdown fires at the reap instant: zero wait.
        assert_eq!(
            apply_idle_reap(&mut a, 21_000).unwrap(),
            CloseOutcome::Closed {
                countdown_at_ms: 21_000
            }
        );
        assert!(a.is_closed);
    }

    #[test]
    fn deadline_viable_lobby_gets_full_countdown() {
        let mut a = arena(8);
        let timings = Timings::default();
        apply_join(&mut a, player(1), 1_000, &timings).unwrap();
        apply_join(&mut a, player(2), 2_000, &timings).unwrap();
        assert_eq!(
            apply_registration_deadline(&mut a, 30_000, &timings).unwrap(),
            CloseOutcome::Closed {
                countdown_at_ms: 40_000
            }
        );
    }

    #[test]
    fn deadline_under_two_players_refunds() {
        let mut a = arena(8);
        let timings = Timings::default();
        apply_join(&mut a, player(1), 1_000, &timings).unwrap();
        assert_eq!(
            apply_registration_deadline(&mut a, 30_000, &timings).unwrap(),
            CloseOutcome::CancelledRefund { player: player(1) }
        );
    }

    #[test]
    fn stale_reap_after_close_is_a_noop() {
        let mut a = arena(2);
        let timings = Timings::default();
        apply_join(&mut a, player(1), 1_000, &timings).unwrap();
        apply_join(&mut a, player(2), 2_000, &timings).unwrap(); // closes
        let before = a.clone();
        assert_eq!(
            apply_idle_reap(&mut a, 21_000).unwrap(),
            CloseOutcome::Lapsed
        );
        assert_eq!(a, before);
    }

    #[test]
    fn countdown_moves_closed_arena_into_learning() {
        let mut a = arena(2);
        let timings = Timings::default();
        apply_join(&mut a, player(1), 1_000, &timings).unwrap();
        apply_join(&mut a, player(2), 2_000, &timings).unwrap();
        let learning_end = apply_countdown(&mut a, "g1".into(), 12_000, &timings).unwrap();
        assert_eq!(learning_end, 72_000);
        assert_eq!(a.game_status, GameStatus::Learning);
        // A duplicate countdown is rejected by the guard.
        assert!(apply_countdown(&mut a, "g2".into(), 13_000, &timings).is_err());
    }
}
