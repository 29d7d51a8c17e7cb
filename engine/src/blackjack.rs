//! Blackjack hands.
//!
//! Five hands per game, each dealt from a fresh shuffled 52-card deck.
//! Players hit or stand; the dealer draws to 17 at resolution. Hand deltas:
//! bust −10, two-card blackjack +30, beat the dealer (or dealer bust) +20,
//! push +5, loss 0.

use crate::cards::{self, BLACKJACK};
use claw_types::Address;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dealer stands at this total or higher.
const DEALER_STAND: u32 = 17;

pub const BUST_DELTA: i64 = -10;
pub const WIN_DELTA: i64 = 20;
pub const PUSH_DELTA: i64 = 5;
pub const LOSS_DELTA: i64 = 0;
pub const NATURAL_DELTA: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandStatus {
    Playing,
    Stand,
    Bust,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    pub cards: Vec<u8>,
    pub status: HandStatus,
}

impl Hand {
    pub fn total(&self) -> u32 {
        cards::hand_total(&self.cards)
    }
}

/// Per-hand outcome, kept for result reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandOutcome {
    Bust,
    Blackjack,
    Win,
    Push,
    Loss,
}

impl HandOutcome {
    pub fn delta(&self) -> i64 {
        match self {
            HandOutcome::Bust => BUST_DELTA,
            HandOutcome::Blackjack => NATURAL_DELTA,
            HandOutcome::Win => WIN_DELTA,
            HandOutcome::Push => PUSH_DELTA,
            HandOutcome::Loss => LOSS_DELTA,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackjackRound {
    deck: Vec<u8>,
    deck_pos: usize,
    pub dealer: Vec<u8>,
    pub hands: BTreeMap<Address, Hand>,
    pub time_limit_ms: u64,
}

impl BlackjackRound {
    /// Deal a fresh hand: two cards to each player in join order, then two
    /// to the dealer.
    pub fn deal(rng: &mut StdRng, players: &[Address], time_limit_ms: u64) -> Self {
        let deck = cards::shuffled_deck(rng);
        let mut deck_pos = 0;
        let mut draw = |pos: &mut usize| {
            let card = deck[*pos];
            *pos += 1;
            card
        };

        let mut hands = BTreeMap::new();
        for player in players {
            let cards = vec![draw(&mut deck_pos), draw(&mut deck_pos)];
            hands.insert(
                *player,
                Hand {
                    cards,
                    status: HandStatus::Playing,
                },
            );
        }
        let dealer = vec![draw(&mut deck_pos), draw(&mut deck_pos)];

        Self {
            deck,
            deck_pos,
            dealer,
            hands,
            time_limit_ms,
        }
    }

    pub fn hand(&self, player: &Address) -> Option<&Hand> {
        self.hands.get(player)
    }

    pub fn is_playing(&self, player: &Address) -> bool {
        matches!(
            self.hands.get(player).map(|h| h.status),
            Some(HandStatus::Playing)
        )
    }

    pub fn all_hands_done(&self) -> bool {
        self.hands.values().all(|h| h.status != HandStatus::Playing)
    }

    /// Draw one card. Returns the new total; a total over 21 busts the hand.
    ///
    /// The caller has already checked the hand is still playing.
    pub fn hit(&mut self, player: &Address) -> (u32, bool) {
        let card = self.deck[self.deck_pos];
        self.deck_pos += 1;
        let hand = self.hands.get_mut(player).expect("hand exists");
        hand.cards.push(card);
        let total = hand.total();
        let bust = total > BLACKJACK;
        if bust {
            hand.status = HandStatus::Bust;
        }
        (total, bust)
    }

    pub fn stand(&mut self, player: &Address) -> u32 {
        let hand = self.hands.get_mut(player).expect("hand exists");
        hand.status = HandStatus::Stand;
        hand.total()
    }

    /// Stand-in play for an absent hand: hit below 17, then stand.
    pub fn auto_play(&mut self, player: &Address) {
        while self.is_playing(player) {
            let total = self.hands[player].total();
            if total < DEALER_STAND {
                self.hit(player);
            } else {
                self.stand(player);
                break;
            }
        }
    }

    /// Dealer draws to 17+, then every hand is compared. Returns each
    /// player's outcome; score deltas are `outcome.delta()`.
    pub fn resolve(&mut self) -> BTreeMap<Address, HandOutcome> {
        while cards::hand_total(&self.dealer) < DEALER_STAND {
            let card = self.deck[self.deck_pos];
            self.deck_pos += 1;
            self.dealer.push(card);
        }
        let dealer_total = cards::hand_total(&self.dealer);
        let dealer_bust = dealer_total > BLACKJACK;

        self.hands
            .iter()
            .map(|(player, hand)| {
                let outcome = if hand.status == HandStatus::Bust {
                    HandOutcome::Bust
                } else if cards::is_natural(&hand.cards) {
                    HandOutcome::Blackjack
                } else if dealer_bust || hand.total() > dealer_total {
                    HandOutcome::Win
                } else if hand.total() == dealer_total {
                    HandOutcome::Push
                } else {
                    HandOutcome::Loss
                };
                (*player, outcome)
            })
            .collect()
    }
}
