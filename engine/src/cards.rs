//! Playing-card helpers.
//!
//! Cards are encoded as `0..=51`, where:
//! - suit = card / 13 (0..=3)
//! - rank = card % 13 (0..=12, 0 is Ace)

use rand::{seq::SliceRandom, RngCore};

/// Total cards in a standard deck.
pub const CARDS_PER_DECK: u8 = 52;

/// Ranks per suit.
pub const RANKS_PER_SUIT: u8 = 13;

/// Hand total above which a hand busts.
pub const BLACKJACK: u32 = 21;

/// Returns the 0-based rank (0..=12), where 0 is Ace.
pub fn card_rank(card: u8) -> u8 {
    card % RANKS_PER_SUIT
}

/// Returns the suit (0..=3).
pub fn card_suit(card: u8) -> u8 {
    card / RANKS_PER_SUIT
}

/// Blackjack value of a single card before ace adjustment: Ace 11, face
/// cards 10, pips at face value.
fn card_value(card: u8) -> u32 {
    match card_rank(card) {
        0 => 11,
        r @ 1..=9 => r as u32 + 1,
        _ => 10,
    }
}

/// Blackjack hand total with soft-ace adjustment: each Ace counts 11 until
/// the total exceeds 21, then drops to 1.
pub fn hand_total(cards: &[u8]) -> u32 {
    let mut total = 0;
    let mut aces = 0;
    for &card in cards {
        let value = card_value(card);
        if value == 11 {
            aces += 1;
        }
        total += value;
    }
    while total > BLACKJACK && aces > 0 {
        total -= 10;
        aces -= 1;
    }
    total
}

/// A natural: 21 on the first two cards.
pub fn is_natural(cards: &[u8]) -> bool {
    cards.len() == 2 && hand_total(cards) == BLACKJACK
}

/// A fresh shuffled 52-card deck.
pub fn shuffled_deck(rng: &mut impl RngCore) -> Vec<u8> {
    let mut deck: Vec<u8> = (0..CARDS_PER_DECK).collect();
    deck.shuffle(rng);
    deck
}

/// Human-readable card label, e.g. `A♠`, `10♥`.
pub fn card_label(card: u8) -> String {
    const RANKS: [&str; 13] = [
        "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
    ];
    const SUITS: [&str; 4] = ["♠", "♥", "♦", "♣"];
    format!(
        "{}{}",
        RANKS[card_rank(card) as usize],
        SUITS[card_suit(card) as usize]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    // Card constructors for tests: suit 0, given rank (0 = Ace).
    fn c(rank: u8) -> u8 {
        rank
    }

    #[test]
    fn hand_totals() {
        assert_eq!(hand_total(&[c(9), c(10)]), 20); // 10 + J
        assert_eq!(hand_total(&[c(0), c(12)]), 21); // A + K
        assert_eq!(hand_total(&[c(0), c(0)]), 12); // A + A = 11 + 1
        assert_eq!(hand_total(&[c(0), c(7), c(9)]), 19); // A + 8 + 10 → ace soft
        assert_eq!(hand_total(&[c(10), c(11), c(4)]), 25); // J + Q + 5 bust
    }

    #[test]
    fn natural_requires_two_cards() {
        assert!(is_natural(&[c(0), c(12)]));
        assert!(!is_natural(&[c(0), c(4), c(4)])); // A + 5 + 5 = 21 but three cards
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = shuffled_deck(&mut rng);
        assert_eq!(deck.len(), 52);
        let mut sorted = deck.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..52).collect::<Vec<u8>>());
    }

    #[test]
    fn shuffle_is_seed_deterministic() {
        let a = shuffled_deck(&mut StdRng::seed_from_u64(9));
        let b = shuffled_deck(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
