//! Seats: the player side of the table.
//!
//! A seat is an actor on its own thread that answers the house's requests
//! over a [`Channel`]. What it answers is decided by a [`SeatStrategy`]; the
//! runner in this module owns the protocol loop so strategies (bots, scripted
//! test seats, a console front end) stay small.

use crate::cards::Card;
use crate::channel::{Channel, ChannelError};
use crate::hand::{score_cards, Outcome, Score};
use crate::money::Money;
use crate::protocol::{ProtocolError, Request};
use std::collections::VecDeque;
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

mod bot;

pub use bot::{BotProfile, BotSeat, Temper};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SeatError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Everything a seat has been told so far, handed to its strategy.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct SeatContext {
    pub id: usize,
    pub round: u32,
    pub cards: Vec<Card>,
    pub score: Score,
    /// Best local estimate of the bankroll; corrected by every `RESULT`.
    pub money: Option<Money>,
    pub bet: Option<Money>,
    pub house_cards: Vec<Card>,
    pub last_outcome: Option<Outcome>,
}

impl SeatContext {
    fn new(id: usize) -> Self {
        Self { id, ..Self::default() }
    }
}

/// Decides a seat's replies.
pub trait SeatStrategy: Send {
    /// Reply to `AMT`.
    fn bankroll(&mut self, ctx: &SeatContext) -> String;
    /// Reply to `BET`; `"0"` leaves the table.
    fn bet(&mut self, ctx: &SeatContext) -> String;
    /// Reply to `HIT`: draw another card?
    fn hit(&mut self, ctx: &SeatContext) -> bool;

    fn on_cards(&mut self, _ctx: &SeatContext) {}
    fn on_house(&mut self, _ctx: &SeatContext) {}
    fn on_result(&mut self, _ctx: &SeatContext) {}
    fn on_bye(&mut self, _ctx: &SeatContext, _reason: &str) {}
}

impl<S: SeatStrategy + ?Sized> SeatStrategy for Box<S> {
    fn bankroll(&mut self, ctx: &SeatContext) -> String {
        (**self).bankroll(ctx)
    }
    fn bet(&mut self, ctx: &SeatContext) -> String {
        (**self).bet(ctx)
    }
    fn hit(&mut self, ctx: &SeatContext) -> bool {
        (**self).hit(ctx)
    }
    fn on_cards(&mut self, ctx: &SeatContext) {
        (**self).on_cards(ctx)
    }
    fn on_house(&mut self, ctx: &SeatContext) {
        (**self).on_house(ctx)
    }
    fn on_result(&mut self, ctx: &SeatContext) {
        (**self).on_result(ctx)
    }
    fn on_bye(&mut self, ctx: &SeatContext, reason: &str) {
        (**self).on_bye(ctx, reason)
    }
}

/// What a seat saw over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct SeatReport {
    pub id: usize,
    pub rounds: u32,
    pub money: Option<Money>,
    /// Reason given in the house's `BYE`, if it sent one.
    pub farewell: Option<String>,
    /// Every request received, in order.
    pub transcript: Vec<Request>,
}

impl SeatReport {
    pub fn results(&self) -> impl Iterator<Item = (Outcome, Money)> + '_ {
        self.transcript.iter().filter_map(|r| match r {
            Request::Result { outcome, money } => Some((*outcome, *money)),
            _ => None,
        })
    }
}

/// Answer requests until the house says goodbye or hangs up.
///
/// An unknown request ends the seat with [`SeatError::Protocol`]; its
/// channel is dropped with it, which the house sees as a departure.
pub fn run_seat<C, S>(id: usize, channel: &mut C, strategy: &mut S) -> Result<SeatReport, SeatError>
where
    C: Channel + ?Sized,
    S: SeatStrategy + ?Sized,
{
    let mut ctx = SeatContext::new(id);
    let mut report = SeatReport { id, ..SeatReport::default() };
    loop {
        let line = match channel.receive() {
            Ok(line) => line,
            Err(ChannelError::Closed) => break,
            Err(e) => return Err(e.into()),
        };
        let request: Request = line.parse()?;
        debug!(seat = id, request = request.kind(), "seat received");
        report.transcript.push(request.clone());
        match request {
            Request::Amount => {
                let reply = strategy.bankroll(&ctx);
                ctx.money = reply.trim().parse().ok();
                channel.send(reply.trim())?;
            }
            Request::Bet => {
                ctx.round += 1;
                ctx.house_cards.clear();
                ctx.last_outcome = None;
                let reply = strategy.bet(&ctx);
                let bet: Option<Money> = reply.trim().parse().ok();
                if let (Some(m), Some(b)) = (ctx.money, bet) {
                    ctx.money = m.checked_sub(b).or(Some(m));
                }
                ctx.bet = bet;
                channel.send(reply.trim())?;
            }
            Request::Cards(cards) => {
                ctx.score = score_cards(&cards);
                ctx.cards = cards;
                strategy.on_cards(&ctx);
            }
            Request::Hit => {
                let reply = if strategy.hit(&ctx) { "Y" } else { "N" };
                channel.send(reply)?;
            }
            Request::House(cards) => {
                ctx.house_cards = cards;
                strategy.on_house(&ctx);
            }
            Request::Result { outcome, money } => {
                ctx.last_outcome = Some(outcome);
                ctx.money = Some(money);
                report.rounds += 1;
                strategy.on_result(&ctx);
            }
            Request::Bye(reason) => {
                info!(seat = id, reason = %reason, "seat dismissed");
                strategy.on_bye(&ctx, &reason);
                report.farewell = Some(reason);
                break;
            }
        }
    }
    channel.close();
    report.money = ctx.money;
    Ok(report)
}

/// Run `strategy` for seat `id` on its own thread.
pub fn spawn_seat<C, S>(
    id: usize,
    mut channel: C,
    mut strategy: S,
) -> io::Result<JoinHandle<Result<SeatReport, SeatError>>>
where
    C: Channel + 'static,
    S: SeatStrategy + 'static,
{
    thread::Builder::new()
        .name(format!("seat-{id}"))
        .spawn(move || run_seat(id, &mut channel, &mut strategy))
}

/// Replies from fixed queues. Once a queue is empty the seat stands and then
/// leaves with a `0` bet.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSeat {
    bankroll: String,
    bets: VecDeque<String>,
    hits: VecDeque<bool>,
}

impl ScriptedSeat {
    pub fn new(bankroll: impl Into<String>) -> Self {
        Self { bankroll: bankroll.into(), ..Self::default() }
    }

    pub fn bets<I, T>(mut self, bets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.bets.extend(bets.into_iter().map(Into::into));
        self
    }

    pub fn hits<I: IntoIterator<Item = bool>>(mut self, hits: I) -> Self {
        self.hits.extend(hits);
        self
    }
}

impl SeatStrategy for ScriptedSeat {
    fn bankroll(&mut self, _ctx: &SeatContext) -> String {
        self.bankroll.clone()
    }

    fn bet(&mut self, _ctx: &SeatContext) -> String {
        self.bets.pop_front().unwrap_or_else(|| "0".to_string())
    }

    fn hit(&mut self, _ctx: &SeatContext) -> bool {
        self.hits.pop_front().unwrap_or(false)
    }
}
