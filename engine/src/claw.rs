//! Claw machine rounds.
//!
//! A single long round: the challenge is a field of prizes at 2-D percent
//! coordinates, each player gets a fixed number of grab attempts, and a grab
//! lands on the nearest still-present prize within the claw radius. Grabs
//! are deterministic; aim decides, not luck.

use claw_types::Address;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prizes laid out per round.
pub const PRIZES_PER_ROUND: usize = 12;

/// Grab attempts per player.
pub const ATTEMPTS_PER_PLAYER: u32 = 5;

/// Maximum distance (percent units) at which the claw still catches a prize.
pub const GRAB_RADIUS: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrizeKind {
    Common,
    Uncommon,
    Rare,
    Golden,
}

impl PrizeKind {
    pub fn value(&self) -> i64 {
        match self {
            PrizeKind::Common => 10,
            PrizeKind::Uncommon => 25,
            PrizeKind::Rare => 50,
            PrizeKind::Golden => 100,
        }
    }

    /// Rarity roll with weights 50/30/15/5.
    fn roll(rng: &mut StdRng) -> Self {
        match rng.gen_range(0..100u32) {
            0..=49 => PrizeKind::Common,
            50..=79 => PrizeKind::Uncommon,
            80..=94 => PrizeKind::Rare,
            _ => PrizeKind::Golden,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    pub id: u32,
    pub kind: PrizeKind,
    pub value: i64,
    pub x: f64,
    pub y: f64,
    pub grabbed: bool,
}

/// What a single grab attempt did.
#[derive(Clone, Debug, PartialEq)]
pub enum GrabResult {
    Grabbed { prize_id: u32, value: i64 },
    Missed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClawRound {
    pub prizes: Vec<Prize>,
    pub attempts_per_player: u32,
    pub attempts: BTreeMap<Address, u32>,
    /// Monotonic grab sequence per player; earliest *last* grab wins ties.
    pub last_grab_seq: BTreeMap<Address, u64>,
    next_seq: u64,
    pub time_limit_ms: u64,
}

impl ClawRound {
    pub fn generate(rng: &mut StdRng, time_limit_ms: u64) -> Self {
        let prizes = (0..PRIZES_PER_ROUND as u32)
            .map(|id| {
                let kind = PrizeKind::roll(rng);
                Prize {
                    id,
                    kind,
                    value: kind.value(),
                    x: rng.gen_range(10..=90u32) as f64,
                    y: rng.gen_range(20..=80u32) as f64,
                    grabbed: false,
                }
            })
            .collect();
        Self {
            prizes,
            attempts_per_player: ATTEMPTS_PER_PLAYER,
            attempts: BTreeMap::new(),
            last_grab_seq: BTreeMap::new(),
            next_seq: 0,
            time_limit_ms,
        }
    }

    pub fn attempts_used(&self, player: &Address) -> u32 {
        self.attempts.get(player).copied().unwrap_or(0)
    }

    pub fn attempts_exhausted(&self, player: &Address) -> bool {
        self.attempts_used(player) >= self.attempts_per_player
    }

    pub fn all_prizes_grabbed(&self) -> bool {
        self.prizes.iter().all(|p| p.grabbed)
    }

    /// One grab attempt at `(x, y)`. Catches the nearest un-grabbed prize
    /// iff its Euclidean distance is within [`GRAB_RADIUS`].
    ///
    /// The caller has already checked the attempt budget.
    pub fn grab(&mut self, player: Address, x: f64, y: f64) -> GrabResult {
        *self.attempts.entry(player).or_insert(0) += 1;
        self.next_seq += 1;

        let nearest = self
            .prizes
            .iter_mut()
            .filter(|p| !p.grabbed)
            .map(|p| {
                let dist = ((p.x - x).powi(2) + (p.y - y).powi(2)).sqrt();
                (dist, p)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((dist, prize)) if dist <= GRAB_RADIUS => {
                prize.grabbed = true;
                self.last_grab_seq.insert(player, self.next_seq);
                GrabResult::Grabbed {
                    prize_id: prize.id,
                    value: prize.value,
                }
            }
            _ => GrabResult::Missed,
        }
    }

    /// Auto-grab target: a deterministic pick among remaining prizes, aimed
    /// dead-on so the grab lands.
    pub fn auto_target(&self, rng: &mut StdRng) -> (f64, f64) {
        let remaining: Vec<&Prize> = self.prizes.iter().filter(|p| !p.grabbed).collect();
        if remaining.is_empty() {
            // Nothing left to catch; any aim is a miss.
            return (50.0, 50.0);
        }
        let prize = remaining[rng.gen_range(0..remaining.len())];
        (prize.x, prize.y)
    }

    /// Tie-break key: the sequence number of the player's final grab, or
    /// `u64::MAX` for players who never grabbed.
    pub fn tie_break_seq(&self, player: &Address) -> u64 {
        self.last_grab_seq.get(player).copied().unwrap_or(u64::MAX)
    }
}
