//! Table rules and limits.

use crate::money::Money;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("bet step must be greater than zero")]
    ZeroBetStep,
    #[error("minimum bet {min} is not a multiple of the bet step {step}")]
    MinBetOffStep { min: Money, step: Money },
    #[error("minimum bet must be greater than zero")]
    ZeroMinBet,
    #[error("at least one shuffle pass is required")]
    NoShuffle,
    #[error("payout ratio denominator must be greater than zero")]
    ZeroPayoutDenominator,
}

/// Rules a table is played under. Defaults match a $5 table where the house
/// stands on 17 and a 21 pays 3:2.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct TableConfig {
    pub min_bet: Money,
    pub bet_step: Money,
    pub house_stands_on: u8,
    /// Payout for a winning 21 as `(numerator, denominator)` of the bet.
    pub natural_payout: (u64, u64),
    pub shuffle_passes: u32,
    pub seed: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_bet: Money::from_dollars(5),
            bet_step: Money::from_dollars(5),
            house_stands_on: 17,
            natural_payout: (3, 2),
            shuffle_passes: 7,
            seed: None,
        }
    }
}

impl TableConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_min_bet(mut self, min_bet: Money) -> Self {
        self.min_bet = min_bet;
        self
    }

    pub fn with_bet_step(mut self, step: Money) -> Self {
        self.bet_step = step;
        self
    }

    pub fn with_house_stands_on(mut self, score: u8) -> Self {
        self.house_stands_on = score;
        self
    }

    pub fn with_shuffle_passes(mut self, passes: u32) -> Self {
        self.shuffle_passes = passes;
        self
    }

    pub fn with_natural_payout(mut self, num: u64, den: u64) -> Self {
        self.natural_payout = (num, den);
        self
    }

    pub fn bet_limits(&self) -> BetLimits {
        BetLimits { min: self.min_bet, step: self.bet_step }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bet_step.is_zero() {
            return Err(ConfigError::ZeroBetStep);
        }
        if self.min_bet.is_zero() {
            return Err(ConfigError::ZeroMinBet);
        }
        if !self.min_bet.is_multiple_of(self.bet_step) {
            return Err(ConfigError::MinBetOffStep { min: self.min_bet, step: self.bet_step });
        }
        if self.shuffle_passes == 0 {
            return Err(ConfigError::NoShuffle);
        }
        if self.natural_payout.1 == 0 {
            return Err(ConfigError::ZeroPayoutDenominator);
        }
        Ok(())
    }
}

/// Minimum and increment a bet must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetLimits {
    pub min: Money,
    pub step: Money,
}

impl Default for BetLimits {
    fn default() -> Self {
        TableConfig::default().bet_limits()
    }
}
