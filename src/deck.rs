use crate::cards::{Card, Rank, Suit};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// Number of cards in a freshly built deck.
pub const DECK_SIZE: usize = 52;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck exhausted after {dealt} cards")]
    Exhausted { dealt: usize },
    #[error("duplicate card in stacked deck: {0}")]
    DuplicateCard(Card),
}

/// A standard 52-card deck. The top of the deck is the end of the vector.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    dealt: usize,
}

impl Deck {
    /// ```
    /// use blackjack_rs::deck::Deck;
    ///
    /// let deck = Deck::standard();
    /// assert_eq!(deck.remaining(), 52);
    /// ```
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for &s in &Suit::ALL {
            for &r in &Rank::ALL {
                cards.push(Card::new(r, s));
            }
        }
        Self { cards, dealt: 0 }
    }

    /// Build a full deck whose first draws are `order`, followed by every
    /// remaining card in canonical order.
    ///
    /// ```
    /// use blackjack_rs::cards::Card;
    /// use blackjack_rs::deck::Deck;
    ///
    /// let ace: Card = "AS".parse().unwrap();
    /// let mut deck = Deck::stacked(&[ace]).unwrap();
    /// assert_eq!(deck.draw().unwrap(), ace);
    /// assert_eq!(deck.remaining(), 51);
    /// ```
    pub fn stacked(order: &[Card]) -> Result<Self, DeckError> {
        let mut seen = HashSet::with_capacity(order.len());
        for &c in order {
            if !seen.insert(c) {
                return Err(DeckError::DuplicateCard(c));
            }
        }
        let mut cards: Vec<Card> =
            Self::standard().cards.into_iter().filter(|c| !seen.contains(c)).rev().collect();
        cards.extend(order.iter().rev());
        Ok(Self { cards, dealt: 0 })
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Cards drawn since the deck was built.
    pub fn dealt(&self) -> usize {
        self.dealt
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards still in the deck, bottom first.
    pub fn as_slice(&self) -> &[Card] {
        &self.cards
    }

    /// Shuffle using a seeded RNG for reproducibility.
    pub fn shuffle_seeded(&mut self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.shuffle_with(&mut rng);
    }

    /// Fisher–Yates: walk from the last index down to 1, swapping each slot
    /// with a uniformly chosen index in `0..=i`.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.cards.len()).rev() {
            let j = rng.random_range(0..=i);
            self.cards.swap(i, j);
        }
    }

    /// Draw one card from the top of the deck.
    pub fn draw(&mut self) -> Result<Card, DeckError> {
        let card = self.cards.pop().ok_or(DeckError::Exhausted { dealt: self.dealt })?;
        self.dealt += 1;
        Ok(card)
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::standard()
    }
}

/// Where the table gets a fresh deck at the start of each round.
pub trait DeckSource {
    fn next_deck(&mut self) -> Result<Deck, DeckError>;
}

/// Builds a standard deck each round and shuffles it `passes` times with the
/// injected random source.
#[derive(Debug)]
pub struct ShuffledDecks<R> {
    rng: R,
    passes: u32,
}

impl<R: Rng> ShuffledDecks<R> {
    pub fn new(rng: R, passes: u32) -> Self {
        Self { rng, passes: passes.max(1) }
    }
}

impl ShuffledDecks<ChaCha8Rng> {
    pub fn seeded(seed: u64, passes: u32) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed), passes)
    }
}

impl<R: Rng> DeckSource for ShuffledDecks<R> {
    fn next_deck(&mut self) -> Result<Deck, DeckError> {
        let mut deck = Deck::standard();
        for _ in 0..self.passes {
            deck.shuffle_with(&mut self.rng);
        }
        Ok(deck)
    }
}

/// Hands out pre-arranged decks in order. Once the queue runs dry the last
/// deck is reused, so a scripted table can keep playing.
#[derive(Debug, Clone)]
pub struct StackedDecks {
    decks: std::collections::VecDeque<Deck>,
    last: Option<Deck>,
}

impl StackedDecks {
    pub fn new(decks: Vec<Deck>) -> Self {
        Self { decks: decks.into(), last: None }
    }

    /// Convenience: one stacked deck per draw order.
    pub fn from_orders(orders: &[Vec<Card>]) -> Result<Self, DeckError> {
        let decks = orders.iter().map(|o| Deck::stacked(o)).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(decks))
    }
}

impl DeckSource for StackedDecks {
    fn next_deck(&mut self) -> Result<Deck, DeckError> {
        if let Some(deck) = self.decks.pop_front() {
            self.last = Some(deck.clone());
            return Ok(deck);
        }
        match &self.last {
            Some(deck) => Ok(deck.clone()),
            None => Ok(Deck::standard()),
        }
    }
}
