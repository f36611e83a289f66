use crate::config::BetLimits;
use crate::money::Money;
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

use super::{SeatContext, SeatStrategy};

/// How much risk a bot takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Temper {
    Cautious,
    Standard,
    Reckless,
}

/// Configuration for a bot seat's play style and randomness.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct BotProfile {
    pub temper: Temper,
    pub bankroll: Money,
    /// Stand once the hand reaches this score.
    pub stand_on: u8,
    /// Usual bet, in multiples of the table's bet step.
    pub bet_units: u64,
    /// Chance of deviating from the stand rule by one card.
    pub mistake_rate: f64,
    /// Leave after this many rounds, if set.
    pub max_rounds: Option<u32>,
    pub limits: BetLimits,
    pub rng_seed: Option<u64>,
}

impl BotProfile {
    /// Create a profile with tuned defaults for a temper.
    pub fn for_temper(temper: Temper) -> Self {
        let (stand_on, bet_units, mistake_rate) = match temper {
            Temper::Cautious => (15, 1, 0.02),
            Temper::Standard => (17, 2, 0.05),
            Temper::Reckless => (19, 4, 0.12),
        };
        Self {
            temper,
            bankroll: Money::from_dollars(100),
            stand_on,
            bet_units,
            mistake_rate,
            max_rounds: None,
            limits: BetLimits::default(),
            rng_seed: None,
        }
    }

    /// Set a deterministic RNG seed for reproducible decisions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_bankroll(mut self, bankroll: Money) -> Self {
        self.bankroll = bankroll;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn with_limits(mut self, limits: BetLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl Default for BotProfile {
    fn default() -> Self {
        Self::for_temper(Temper::Standard)
    }
}

/// A seat that plays a fixed stand threshold with a little noise and bets a
/// steady number of units.
#[derive(Debug)]
pub struct BotSeat {
    profile: BotProfile,
    rng: StdRng,
}

impl BotSeat {
    pub fn new(profile: BotProfile) -> Self {
        let rng = match profile.rng_seed {
            Some(v) => StdRng::seed_from_u64(v),
            None => {
                let mut seed = [0u8; 32];
                rand::rng().fill_bytes(&mut seed);
                StdRng::from_seed(seed)
            }
        };
        Self { profile, rng }
    }

    pub fn profile(&self) -> &BotProfile {
        &self.profile
    }

    fn choose_bet(&mut self, money: Money) -> Money {
        let BetLimits { min, step } = self.profile.limits;
        if money < min || step.is_zero() {
            return Money::ZERO;
        }
        // vary by one unit either way
        let jitter: i64 = self.rng.random_range(-1..=1);
        let units = (self.profile.bet_units as i64 + jitter).max(1) as u64;
        let wanted = step.checked_ratio(units, 1).unwrap_or(min).max(min);
        let affordable = Money::from_cents(money.cents() - money.cents() % step.cents());
        wanted.min(affordable)
    }
}

impl SeatStrategy for BotSeat {
    fn bankroll(&mut self, _ctx: &SeatContext) -> String {
        self.profile.bankroll.to_string()
    }

    fn bet(&mut self, ctx: &SeatContext) -> String {
        if let Some(max) = self.profile.max_rounds {
            if ctx.round > max {
                return "0".to_string();
            }
        }
        let money = ctx.money.unwrap_or(self.profile.bankroll);
        match self.choose_bet(money) {
            bet if bet.is_zero() => "0".to_string(),
            bet => bet.to_string(),
        }
    }

    fn hit(&mut self, ctx: &SeatContext) -> bool {
        let mut threshold = self.profile.stand_on;
        if self.rng.random::<f64>() < self.profile.mistake_rate {
            threshold = if self.rng.random::<bool>() {
                threshold.saturating_add(1)
            } else {
                threshold.saturating_sub(1)
            };
        }
        !ctx.score.busted && ctx.score.total < threshold
    }
}
