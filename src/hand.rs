use crate::cards::Card;
use crate::config::BetLimits;
use crate::money::Money;
use std::fmt;

/// A hand can never legitimately hold more cards than this without busting.
pub const MAX_CARDS: usize = 21;

/// Highest score that does not bust.
pub const BLACKJACK: u8 = 21;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandError {
    #[error("hand is busted and cannot take another card")]
    AlreadyBusted,
    #[error("hand already holds the maximum of 21 cards")]
    Full,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BetError {
    #[error("invalid bet {amount}: minimum is {min} in steps of {step}")]
    Invalid { amount: Money, min: Money, step: Money },
    #[error("insufficient funds: bet {amount}, bankroll {money}")]
    InsufficientFunds { amount: Money, money: Money },
}

/// What a seat did with its bet prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wager {
    Placed(Money),
    Leave,
}

/// Result of a seat's hand against the house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win,
    Push,
    Lose,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Push => "PUSH",
            Outcome::Lose => "LOSE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score of a set of cards after soft-ace adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub total: u8,
    pub busted: bool,
}

/// Sum primary values, then count Aces low one at a time until the total
/// fits under 21 or every Ace is low.
///
/// ```
/// use blackjack_rs::cards::parse_cards;
/// use blackjack_rs::hand::score_cards;
///
/// let s = score_cards(&parse_cards("AS AH 9C").unwrap());
/// assert_eq!(s.total, 21);
/// assert!(!s.busted);
/// ```
pub fn score_cards(cards: &[Card]) -> Score {
    let mut total: u32 = cards.iter().map(|c| u32::from(c.primary_value())).sum();
    let mut soft_aces = cards.iter().filter(|c| c.is_ace()).count();
    while total > u32::from(BLACKJACK) && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    Score { total: total.min(u32::from(u8::MAX)) as u8, busted: total > u32::from(BLACKJACK) }
}

/// Cards, score and stake for one participant. The house has one too; its
/// money and bet simply stay at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hand {
    cards: Vec<Card>,
    score: u8,
    busted: bool,
    money: Money,
    bet: Money,
}

impl Hand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_money(money: Money) -> Self {
        Self { money, ..Self::default() }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn is_busted(&self) -> bool {
        self.busted
    }

    pub fn money(&self) -> Money {
        self.money
    }

    pub fn bet(&self) -> Money {
        self.bet
    }

    pub(crate) fn set_money(&mut self, money: Money) {
        self.money = money;
    }

    /// Clear cards, bet and bust state for a new round. Money is kept.
    pub fn reset(&mut self) {
        self.cards.clear();
        self.score = 0;
        self.busted = false;
        self.bet = Money::ZERO;
    }

    /// Take a card and rescore. A busted hand refuses the card.
    pub fn add_card(&mut self, card: Card) -> Result<(), HandError> {
        if self.busted {
            return Err(HandError::AlreadyBusted);
        }
        if self.cards.len() >= MAX_CARDS {
            return Err(HandError::Full);
        }
        self.cards.push(card);
        let Score { total, busted } = score_cards(&self.cards);
        self.score = total;
        self.busted = busted;
        Ok(())
    }

    /// Stake `amount` for this round. Zero means the seat leaves the table.
    ///
    /// ```
    /// use blackjack_rs::config::BetLimits;
    /// use blackjack_rs::hand::{BetError, Hand, Wager};
    /// use blackjack_rs::money::Money;
    ///
    /// let mut hand = Hand::with_money(Money::from_dollars(20));
    /// let limits = BetLimits::default();
    /// assert_eq!(hand.place_bet(Money::ZERO, limits), Ok(Wager::Leave));
    /// assert!(matches!(hand.place_bet(Money::from_dollars(7), limits), Err(BetError::Invalid { .. })));
    /// assert_eq!(hand.place_bet(Money::from_dollars(10), limits), Ok(Wager::Placed(Money::from_dollars(10))));
    /// assert_eq!(hand.money(), Money::from_dollars(10));
    /// ```
    pub fn place_bet(&mut self, amount: Money, limits: BetLimits) -> Result<Wager, BetError> {
        if amount.is_zero() {
            return Ok(Wager::Leave);
        }
        if amount < limits.min || !amount.is_multiple_of(limits.step) {
            return Err(BetError::Invalid { amount, min: limits.min, step: limits.step });
        }
        let rest = self
            .money
            .checked_sub(amount)
            .ok_or(BetError::InsufficientFunds { amount, money: self.money })?;
        self.money = rest;
        self.bet = amount;
        Ok(Wager::Placed(amount))
    }

    /// Credit a settled round and clear the stake. `None` on overflow.
    pub(crate) fn collect(&mut self, credit: Money) -> Option<Money> {
        self.money = self.money.checked_add(credit)?;
        self.bet = Money::ZERO;
        Some(self.money)
    }

    /// Hand the current stake back (used when a round is abandoned).
    pub(crate) fn refund_bet(&mut self) -> Option<Money> {
        let bet = self.bet;
        self.collect(bet)?;
        Some(bet)
    }

    pub fn compare_to_house(&self, house: &Hand) -> Outcome {
        if self.busted {
            Outcome::Lose
        } else if house.busted || self.score > house.score {
            Outcome::Win
        } else if self.score == house.score {
            Outcome::Push
        } else {
            Outcome::Lose
        }
    }

    /// Wire form: `[7C,6D]`.
    pub fn cards_repr(&self) -> String {
        format_cards(&self.cards)
    }
}

pub fn format_cards(cards: &[Card]) -> String {
    let inner: Vec<String> = cards.iter().map(Card::to_string).collect();
    format!("[{}]", inner.join(","))
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hand(score={}, money={}, bet={}, busted={}, cards={})",
            self.score,
            self.money,
            self.bet,
            self.busted,
            self.cards_repr()
        )
    }
}
