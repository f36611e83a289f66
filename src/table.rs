//! The house: a state machine that runs a whole table.
//!
//! `Seating` happens once. After that every round walks
//! `Betting → PlayerTurns → HouseTurn → Settlement → Elimination` and either
//! starts over or ends in `Terminated` once no seat is left. Each seat is
//! driven through its own [`Channel`] one request at a time, in seat order.
//!
//! Anything a single seat does wrong, from a bad bet to a dropped
//! connection, removes that seat and nothing else. Running out of
//! cards or breaking a money invariant is a bug, and ends the table with a
//! [`TableError`].

use crate::cards::Card;
use crate::channel::{Channel, ChannelError};
use crate::config::{ConfigError, TableConfig};
use crate::control::TableControl;
use crate::deck::{Deck, DeckError, DeckSource, ShuffledDecks};
use crate::hand::{BetError, Hand, Outcome, Wager, BLACKJACK};
use crate::money::{Money, MoneyError};
use crate::protocol::{is_hit_reply, parse_money_reply, Request};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableState {
    Seating,
    Betting,
    PlayerTurns,
    HouseTurn,
    Settlement,
    Elimination,
    Terminated,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableError {
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("seats can only join before the table starts")]
    SeatingClosed,
}

/// Why a seat left the table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LeaveReason {
    /// Bet 0.
    Left,
    /// Money fell below the minimum bet.
    Broke,
    Bet(BetError),
    Malformed(MoneyError),
    Disconnected(ChannelError),
    Shutdown,
    TableError,
}

impl LeaveReason {
    /// Whether the seat was removed because something went wrong rather
    /// than by the rules of the game.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            LeaveReason::Bet(_) | LeaveReason::Malformed(_) | LeaveReason::Disconnected(_)
        )
    }
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveReason::Left => f.write_str("left the table"),
            LeaveReason::Broke => f.write_str("not enough money for the minimum bet"),
            LeaveReason::Bet(e) => write!(f, "{e}"),
            LeaveReason::Malformed(e) => write!(f, "{e}"),
            LeaveReason::Disconnected(e) => write!(f, "{e}"),
            LeaveReason::Shutdown => f.write_str("table shutting down"),
            LeaveReason::TableError => f.write_str("table closed after an internal error"),
        }
    }
}

/// Why the table stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EndReason {
    NoSeatsLeft,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableEvent {
    Seated { seat: usize, bankroll: Money },
    RoundStarted { seats: usize },
    BetPlaced { seat: usize, amount: Money },
    Hit { seat: usize, card: Card, score: u8 },
    Stood { seat: usize, score: u8 },
    Busted { seat: usize, score: u8 },
    HouseHit { card: Card, score: u8 },
    HouseStood { score: u8 },
    HouseBusted { score: u8 },
    Settled { seat: usize, outcome: Outcome, credited: Money, money: Money },
    SeatRemoved { seat: usize, reason: LeaveReason, money: Money },
    StopIgnored { seats: usize },
    Terminated { reason: EndReason },
}

impl fmt::Display for TableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableEvent::Seated { seat, bankroll } => {
                write!(f, "Player {seat} playing with ${bankroll}")
            }
            TableEvent::RoundStarted { seats } => write!(f, "Starting new round with {seats} seats"),
            TableEvent::BetPlaced { seat, amount } => write!(f, "Player {seat} bet ${amount}"),
            TableEvent::Hit { seat, card, score } => {
                write!(f, "Player {seat} hit and got [{card}] giving score of {score}")
            }
            TableEvent::Stood { seat, score } => write!(f, "Player {seat} stood with score {score}"),
            TableEvent::Busted { seat, score } => write!(f, "Player {seat} busted with {score}"),
            TableEvent::HouseHit { card, score } => {
                write!(f, "House hit and got [{card}] giving score of {score}")
            }
            TableEvent::HouseStood { score } => write!(f, "House stood with score {score}"),
            TableEvent::HouseBusted { score } => write!(f, "House busted with {score}"),
            TableEvent::Settled { seat, outcome, credited, money } => write!(
                f,
                "Player {seat}: {outcome}, credited ${credited}, now has ${money}"
            ),
            TableEvent::SeatRemoved { seat, reason, money } => {
                write!(f, "Player {seat} removed ({reason}) with ${money}")
            }
            TableEvent::StopIgnored { seats } => {
                write!(f, "Stop request ignored, {seats} seats still playing")
            }
            TableEvent::Terminated { reason } => write!(f, "Table terminated: {reason:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct HistoryEntry {
    /// 0 while seating.
    pub round: u32,
    pub event: TableEvent,
}

/// A seat as the house sees it: id, hand and the house end of its channel.
pub struct Seat {
    id: usize,
    hand: Hand,
    channel: Box<dyn Channel>,
}

impl Seat {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }
}

impl fmt::Debug for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seat").field("id", &self.id).field("hand", &self.hand).finish()
    }
}

/// A seat that is no longer at the table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Departure {
    pub seat: usize,
    pub round: u32,
    pub money: Money,
    pub reason: LeaveReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct TableSummary {
    /// Rounds that reached settlement.
    pub rounds: u32,
    pub reason: EndReason,
    pub departures: Vec<Departure>,
}

impl TableSummary {
    pub fn departure(&self, seat: usize) -> Option<&Departure> {
        self.departures.iter().find(|d| d.seat == seat)
    }
}

/// Work a stake out against the house: the outcome and how much goes back
/// to the seat's bankroll (stake included). A winning 21 pays
/// `natural.0 / natural.1` of the bet, any other win pays even money.
///
/// ```
/// use blackjack_rs::cards::parse_cards;
/// use blackjack_rs::config::BetLimits;
/// use blackjack_rs::hand::{Hand, Outcome};
/// use blackjack_rs::money::Money;
/// use blackjack_rs::table::settlement;
///
/// let mut seat = Hand::with_money(Money::from_dollars(20));
/// seat.place_bet(Money::from_dollars(10), BetLimits::default()).unwrap();
/// for c in parse_cards("AS KD").unwrap() { seat.add_card(c).unwrap(); }
/// let mut house = Hand::new();
/// for c in parse_cards("10C 8H").unwrap() { house.add_card(c).unwrap(); }
///
/// assert_eq!(settlement(&seat, &house, (3, 2)), Some((Outcome::Win, Money::from_dollars(25))));
/// ```
pub fn settlement(hand: &Hand, house: &Hand, natural: (u64, u64)) -> Option<(Outcome, Money)> {
    let outcome = hand.compare_to_house(house);
    let bet = hand.bet();
    let credit = match outcome {
        Outcome::Win => {
            let payout = if hand.score() == BLACKJACK {
                bet.checked_ratio(natural.0, natural.1)?
            } else {
                bet
            };
            bet.checked_add(payout)?
        }
        Outcome::Push => bet,
        Outcome::Lose => Money::ZERO,
    };
    Some((outcome, credit))
}

/// Internal early exit: a shutdown request or a fatal error.
enum Halt {
    Shutdown,
    Fatal(TableError),
}

impl From<TableError> for Halt {
    fn from(e: TableError) -> Self {
        Halt::Fatal(e)
    }
}

impl From<DeckError> for Halt {
    fn from(e: DeckError) -> Self {
        Halt::Fatal(TableError::Deck(e))
    }
}

const ALREADY_FAILED: &str = "table already failed";

fn already_failed() -> Halt {
    invariant(ALREADY_FAILED)
}

fn invariant(msg: impl Into<String>) -> Halt {
    Halt::Fatal(TableError::Invariant(msg.into()))
}

pub struct Table<D = ShuffledDecks<ChaCha8Rng>> {
    config: TableConfig,
    decks: D,
    deck: Deck,
    house: Hand,
    seats: Vec<Seat>,
    next_id: usize,
    state: TableState,
    round: u32,
    played: u32,
    control: TableControl,
    history: Vec<HistoryEntry>,
    departures: Vec<Departure>,
    ended: Option<EndReason>,
}

impl Table {
    /// A table shuffling with `ChaCha8Rng`, seeded from `config.seed` or
    /// from the OS when no seed is set.
    pub fn new(config: TableConfig) -> Result<Self, TableError> {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        let passes = config.shuffle_passes;
        Self::with_decks(config, ShuffledDecks::new(rng, passes))
    }
}

impl<D: DeckSource> Table<D> {
    pub fn with_decks(config: TableConfig, decks: D) -> Result<Self, TableError> {
        config.validate()?;
        Ok(Self {
            config,
            decks,
            deck: Deck::standard(),
            house: Hand::new(),
            seats: Vec::new(),
            next_id: 1,
            state: TableState::Seating,
            round: 0,
            played: 0,
            control: TableControl::new(),
            history: Vec::new(),
            departures: Vec::new(),
            ended: None,
        })
    }

    /// Attach a seat before the table starts. Ids start at 1; the house is 0.
    pub fn add_seat<C: Channel + 'static>(&mut self, channel: C) -> Result<usize, TableError> {
        if self.state != TableState::Seating || self.round > 0 {
            return Err(TableError::SeatingClosed);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.seats.push(Seat { id, hand: Hand::new(), channel: Box::new(channel) });
        Ok(id)
    }

    /// Share the table's interrupt hook with a signal handler.
    pub fn control(&self) -> TableControl {
        self.control.clone()
    }

    /// Use an existing interrupt hook instead of the table's own.
    pub fn set_control(&mut self, control: TableControl) {
        self.control = control;
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn house(&self) -> &Hand {
        &self.house
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn departures(&self) -> &[Departure] {
        &self.departures
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn history_recent(&self, n: usize) -> Vec<HistoryEntry> {
        let start = self.history.len().saturating_sub(n);
        self.history[start..].to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Seat everyone, then play rounds until no seat is left or a shutdown
    /// is requested.
    pub fn run(&mut self) -> Result<TableSummary, TableError> {
        let outcome = self.run_rounds();
        self.finish(outcome)
    }

    /// Play a single round, seating first if that has not happened yet.
    /// Returns `None` while the table is still open, or the summary once it
    /// has terminated.
    pub fn play_round(&mut self) -> Result<Option<TableSummary>, TableError> {
        if let Some(reason) = self.ended {
            return Ok(Some(self.summary(reason)));
        }
        if self.state == TableState::Terminated {
            return Err(TableError::Invariant(ALREADY_FAILED.to_string()));
        }
        let outcome = self.seat_if_needed().and_then(|_| self.round_inner());
        match outcome {
            Ok(()) if !self.seats.is_empty() => Ok(None),
            Ok(()) => self.finish(Ok(EndReason::NoSeatsLeft)).map(Some),
            Err(halt) => self.finish(Err(halt)).map(Some),
        }
    }

    fn run_rounds(&mut self) -> Result<EndReason, Halt> {
        if let Some(reason) = self.ended {
            return Ok(reason);
        }
        if self.state == TableState::Terminated {
            return Err(already_failed());
        }
        self.seat_if_needed()?;
        while !self.seats.is_empty() {
            self.round_inner()?;
        }
        Ok(EndReason::NoSeatsLeft)
    }

    fn seat_if_needed(&mut self) -> Result<(), Halt> {
        if self.state == TableState::Seating {
            self.seat_players()?;
        }
        Ok(())
    }

    fn finish(&mut self, outcome: Result<EndReason, Halt>) -> Result<TableSummary, TableError> {
        if let Some(reason) = self.ended {
            return Ok(self.summary(reason));
        }
        let reason = match outcome {
            Ok(reason) => {
                self.close_all(LeaveReason::Left);
                reason
            }
            Err(Halt::Shutdown) => {
                info!(target: "blackjack_rs::table", round = self.round, "shutdown requested");
                self.close_all(LeaveReason::Shutdown);
                EndReason::Shutdown
            }
            Err(Halt::Fatal(e)) => {
                error!(target: "blackjack_rs::table", round = self.round, error = %e, "table failed");
                self.close_all(LeaveReason::TableError);
                self.state = TableState::Terminated;
                return Err(e);
            }
        };
        self.state = TableState::Terminated;
        self.ended = Some(reason);
        self.record(TableEvent::Terminated { reason });
        Ok(self.summary(reason))
    }

    fn summary(&self, reason: EndReason) -> TableSummary {
        TableSummary { rounds: self.played, reason, departures: self.departures.clone() }
    }

    /// Return in-flight stakes and dismiss every remaining seat.
    fn close_all(&mut self, reason: LeaveReason) {
        while !self.seats.is_empty() {
            let _ = self.seats[0].hand.refund_bet();
            self.remove_seat(0, reason.clone());
        }
    }

    fn transition(&mut self, next: TableState) -> Result<(), Halt> {
        debug!(target: "blackjack_rs::table", round = self.round, state = ?next, "transition");
        self.state = next;
        if self.control.shutdown_requested() {
            return Err(Halt::Shutdown);
        }
        if self.control.take_stop() && !self.seats.is_empty() {
            self.record(TableEvent::StopIgnored { seats: self.seats.len() });
        }
        Ok(())
    }

    fn record(&mut self, event: TableEvent) {
        match &event {
            TableEvent::SeatRemoved { reason, .. } if reason.is_fault() => {
                warn!(target: "blackjack_rs::table", round = self.round, "{event}")
            }
            TableEvent::Hit { .. } | TableEvent::HouseHit { .. } => {
                debug!(target: "blackjack_rs::table", round = self.round, "{event}")
            }
            _ => info!(target: "blackjack_rs::table", round = self.round, "{event}"),
        }
        self.history.push(HistoryEntry { round: self.round, event });
    }

    fn remove_seat(&mut self, idx: usize, reason: LeaveReason) {
        let mut seat = self.seats.remove(idx);
        let _ = seat.channel.send(&Request::Bye(reason.to_string()).to_string());
        seat.channel.close();
        let money = seat.hand.money();
        self.departures.push(Departure {
            seat: seat.id,
            round: self.round,
            money,
            reason: reason.clone(),
        });
        self.record(TableEvent::SeatRemoved { seat: seat.id, reason, money });
    }

    /// Send a request that expects a reply. `None` means the seat's channel
    /// failed and the seat is gone.
    fn ask(&mut self, idx: usize, request: &Request) -> Result<Option<String>, Halt> {
        if self.control.shutdown_requested() {
            return Err(Halt::Shutdown);
        }
        match self.seats[idx].channel.request(&request.to_string()) {
            Ok(reply) => Ok(Some(reply)),
            Err(e) => {
                self.remove_seat(idx, LeaveReason::Disconnected(e));
                Ok(None)
            }
        }
    }

    /// Push an informational request. `false` means the seat is gone.
    fn tell(&mut self, idx: usize, request: &Request) -> Result<bool, Halt> {
        if self.control.shutdown_requested() {
            return Err(Halt::Shutdown);
        }
        match self.seats[idx].channel.send(&request.to_string()) {
            Ok(_) => Ok(true),
            Err(e) => {
                self.remove_seat(idx, LeaveReason::Disconnected(e));
                Ok(false)
            }
        }
    }

    fn draw(&mut self) -> Result<Card, Halt> {
        Ok(self.deck.draw()?)
    }

    fn deal_to_seat(&mut self, idx: usize) -> Result<Card, Halt> {
        let card = self.draw()?;
        self.seats[idx]
            .hand
            .add_card(card)
            .map_err(|e| invariant(format!("seat {}: {e}", self.seats[idx].id)))?;
        Ok(card)
    }

    fn deal_to_house(&mut self) -> Result<Card, Halt> {
        let card = self.draw()?;
        self.house.add_card(card).map_err(|e| invariant(format!("house: {e}")))?;
        Ok(card)
    }

    fn seat_players(&mut self) -> Result<(), Halt> {
        self.transition(TableState::Seating)?;
        let mut i = 0;
        while i < self.seats.len() {
            let Some(reply) = self.ask(i, &Request::Amount)? else { continue };
            match parse_money_reply(&reply) {
                Ok(bankroll) if bankroll >= self.config.min_bet => {
                    let seat = &mut self.seats[i];
                    seat.hand.set_money(bankroll);
                    let id = seat.id;
                    self.record(TableEvent::Seated { seat: id, bankroll });
                    i += 1;
                }
                Ok(bankroll) => {
                    self.seats[i].hand.set_money(bankroll);
                    self.remove_seat(i, LeaveReason::Broke);
                }
                Err(e) => self.remove_seat(i, LeaveReason::Malformed(e)),
            }
        }
        Ok(())
    }

    fn round_inner(&mut self) -> Result<(), Halt> {
        if self.seats.is_empty() {
            return Ok(());
        }
        self.round += 1;
        self.transition(TableState::Betting)?;
        self.take_bets()?;
        if self.seats.is_empty() {
            return Ok(());
        }

        self.transition(TableState::PlayerTurns)?;
        let mut i = 0;
        while i < self.seats.len() {
            if self.play_turn(i)? {
                i += 1;
            }
        }

        self.transition(TableState::HouseTurn)?;
        self.play_house()?;

        self.transition(TableState::Settlement)?;
        self.settle()?;
        self.played += 1;

        self.transition(TableState::Elimination)?;
        self.eliminate();
        Ok(())
    }

    fn take_bets(&mut self) -> Result<(), Halt> {
        self.deck = self.decks.next_deck()?;
        self.house.reset();
        for seat in &mut self.seats {
            seat.hand.reset();
        }
        self.record(TableEvent::RoundStarted { seats: self.seats.len() });

        for i in 0..self.seats.len() {
            self.deal_to_seat(i)?;
            self.deal_to_seat(i)?;
        }
        self.deal_to_house()?;
        self.deal_to_house()?;

        let limits = self.config.bet_limits();
        let mut i = 0;
        while i < self.seats.len() {
            let Some(reply) = self.ask(i, &Request::Bet)? else { continue };
            let wager = parse_money_reply(&reply)
                .map_err(LeaveReason::Malformed)
                .and_then(|amount| self.seats[i].hand.place_bet(amount, limits).map_err(LeaveReason::Bet));
            match wager {
                Ok(Wager::Placed(amount)) => {
                    let id = self.seats[i].id;
                    self.record(TableEvent::BetPlaced { seat: id, amount });
                    i += 1;
                }
                Ok(Wager::Leave) => self.remove_seat(i, LeaveReason::Left),
                Err(reason) => self.remove_seat(i, reason),
            }
        }
        Ok(())
    }

    /// One seat's turn. Returns `false` if the seat dropped out mid-turn.
    fn play_turn(&mut self, idx: usize) -> Result<bool, Halt> {
        let cards = Request::Cards(self.seats[idx].hand.cards().to_vec());
        if !self.tell(idx, &cards)? {
            return Ok(false);
        }
        while !self.seats[idx].hand.is_busted() {
            let Some(reply) = self.ask(idx, &Request::Hit)? else { return Ok(false) };
            if !is_hit_reply(&reply) {
                break;
            }
            let card = self.deal_to_seat(idx)?;
            let seat = &self.seats[idx];
            let (id, score) = (seat.id, seat.hand.score());
            let cards = Request::Cards(seat.hand.cards().to_vec());
            self.record(TableEvent::Hit { seat: id, card, score });
            if !self.tell(idx, &cards)? {
                return Ok(false);
            }
        }
        let seat = &self.seats[idx];
        let (id, score) = (seat.id, seat.hand.score());
        if seat.hand.is_busted() {
            self.record(TableEvent::Busted { seat: id, score });
        } else {
            self.record(TableEvent::Stood { seat: id, score });
        }
        Ok(true)
    }

    fn play_house(&mut self) -> Result<(), Halt> {
        while !self.house.is_busted() && self.house.score() < self.config.house_stands_on {
            let card = self.deal_to_house()?;
            let score = self.house.score();
            self.record(TableEvent::HouseHit { card, score });
        }
        let score = self.house.score();
        if self.house.is_busted() {
            self.record(TableEvent::HouseBusted { score });
        } else {
            self.record(TableEvent::HouseStood { score });
        }
        let house_cards = Request::House(self.house.cards().to_vec());
        let mut i = 0;
        while i < self.seats.len() {
            if self.tell(i, &house_cards)? {
                i += 1;
            }
        }
        Ok(())
    }

    fn settle(&mut self) -> Result<(), Halt> {
        let mut i = 0;
        while i < self.seats.len() {
            let seat = &mut self.seats[i];
            let (outcome, credited) = settlement(&seat.hand, &self.house, self.config.natural_payout)
                .ok_or_else(|| invariant(format!("seat {}: payout overflow", seat.id)))?;
            let money = seat
                .hand
                .collect(credited)
                .ok_or_else(|| invariant(format!("seat {}: bankroll overflow", seat.id)))?;
            let id = seat.id;
            self.record(TableEvent::Settled { seat: id, outcome, credited, money });
            if self.tell(i, &Request::Result { outcome, money })? {
                i += 1;
            }
        }
        Ok(())
    }

    fn eliminate(&mut self) {
        let min = self.config.min_bet;
        let mut i = 0;
        while i < self.seats.len() {
            if self.seats[i].hand.money() < min {
                self.remove_seat(i, LeaveReason::Broke);
            } else {
                i += 1;
            }
        }
    }
}

impl<D> fmt::Debug for Table<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("state", &self.state)
            .field("round", &self.round)
            .field("house", &self.house)
            .field("seats", &self.seats)
            .finish()
    }
}
