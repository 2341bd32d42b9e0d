use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::cards::{Card, Rank, Suit};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("a deck needs 52 cards, got {0}")]
    WrongSize(usize),
    #[error("duplicate card in deck: {0}")]
    Duplicate(Card),
}

/// An ordered run of 52 unique cards, consumed strictly front to back.
/// Cards are never returned to the deck.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    next: usize,
}

impl Deck {
    /// Validate an ordered card list as a full deck.
    pub fn try_new(cards: Vec<Card>) -> Result<Self, DeckError> {
        if cards.len() != 52 {
            return Err(DeckError::WrongSize(cards.len()));
        }
        let mut seen = HashSet::with_capacity(52);
        for &card in &cards {
            if !seen.insert(card) {
                return Err(DeckError::Duplicate(card));
            }
        }
        Ok(Self { cards, next: 0 })
    }

    /// Draw the next card from the front.
    pub fn draw(&mut self) -> Option<Card> {
        let card = self.cards.get(self.next).copied();
        if card.is_some() {
            self.next += 1;
        }
        card
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.next
    }
}

/// All 52 cards in rank-within-suit order. Providers start from this and
/// reorder; tests splice known cards onto the front.
pub fn full_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(52);
    for &suit in &Suit::ALL {
        for &rank in &Rank::ALL {
            cards.push(Card::new(rank, suit));
        }
    }
    cards
}

/// Source of the ordered deck a hand starts from. Implemented for any
/// `FnMut() -> Vec<Card>` closure, so tests can inject a fixed arrangement.
pub trait DeckProvider {
    fn provide(&mut self) -> Vec<Card>;
}

impl<F> DeckProvider for F
where
    F: FnMut() -> Vec<Card>,
{
    fn provide(&mut self) -> Vec<Card> {
        self()
    }
}

/// Production provider: a full deck shuffled with ChaCha8 from a fresh
/// random seed per call.
#[derive(Debug, Default)]
pub struct ShuffledDeck;

impl DeckProvider for ShuffledDeck {
    fn provide(&mut self) -> Vec<Card> {
        shuffled(rand::rng().random())
    }
}

/// Reproducible provider: same seed, same deal order.
#[derive(Debug, Clone, Copy)]
pub struct SeededDeck(pub u64);

impl DeckProvider for SeededDeck {
    fn provide(&mut self) -> Vec<Card> {
        shuffled(self.0)
    }
}

fn shuffled(seed: u64) -> Vec<Card> {
    let mut cards = full_deck();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    cards.shuffle(&mut rng);
    cards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_deck_is_a_valid_deck() {
        let deck = Deck::try_new(full_deck()).unwrap();
        assert_eq!(deck.remaining(), 52);
    }

    #[test]
    fn short_and_duplicated_decks_are_rejected() {
        let mut cards = full_deck();
        cards.pop();
        assert!(matches!(Deck::try_new(cards), Err(DeckError::WrongSize(51))));

        let mut cards = full_deck();
        cards[51] = cards[0];
        assert!(matches!(Deck::try_new(cards), Err(DeckError::Duplicate(_))));
    }

    #[test]
    fn draw_consumes_front_to_back() {
        let cards = full_deck();
        let first = cards[0];
        let second = cards[1];
        let mut deck = Deck::try_new(cards).unwrap();
        assert_eq!(deck.draw(), Some(first));
        assert_eq!(deck.draw(), Some(second));
        assert_eq!(deck.remaining(), 50);
    }

    #[test]
    fn seeded_provider_is_reproducible() {
        let a = SeededDeck(42).provide();
        let b = SeededDeck(42).provide();
        let c = SeededDeck(7).provide();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Deck::try_new(a).is_ok());
    }

    #[test]
    fn closures_act_as_providers() {
        let fixed = full_deck();
        let mut provider = {
            let fixed = fixed.clone();
            move || fixed.clone()
        };
        assert_eq!(provider.provide(), fixed);
    }
}
