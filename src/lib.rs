//! blackjack-rs: a multi-seat blackjack table
//!
//! One house deals and settles against any number of seats. Every seat is an
//! independent actor that only talks to the house through a line-oriented
//! [`channel::Channel`], so a seat can live on a thread, behind a pipe or on
//! the other end of a socket.
//!
//! ## Quick start: a table of bots
//! ```
//! use blackjack_rs::channel::duplex;
//! use blackjack_rs::config::TableConfig;
//! use blackjack_rs::seat::{spawn_seat, BotProfile, BotSeat};
//! use blackjack_rs::table::{EndReason, Table};
//!
//! let mut table = Table::new(TableConfig::default().with_seed(7)).unwrap();
//! let mut handles = Vec::new();
//! for n in 0..3 {
//!     let (house_end, seat_end) = duplex();
//!     let id = table.add_seat(house_end).unwrap();
//!     let bot = BotSeat::new(BotProfile::default().with_seed(n).with_max_rounds(5));
//!     handles.push(spawn_seat(id, seat_end, bot).unwrap());
//! }
//!
//! let summary = table.run().unwrap();
//! assert_eq!(summary.reason, EndReason::NoSeatsLeft);
//! assert!(summary.rounds <= 5);
//! for h in handles {
//!     h.join().unwrap().unwrap();
//! }
//! ```
//!
//! ## Console
//! Play at the terminal with:
//! ```sh
//! cargo run --bin blackjack-rs -- 2
//! ```

pub mod cards;
pub mod channel;
pub mod config;
pub mod control;
pub mod deck;
pub mod hand;
pub mod money;
pub mod protocol;
pub mod seat;
pub mod table;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
