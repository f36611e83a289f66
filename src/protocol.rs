//! House→seat wire messages.
//!
//! Every line the house sends is one [`Request`]. Requests are parsed once, at
//! the seat end of the channel, into this closed enum; a kind the seat does
//! not know is a [`ProtocolError`], not something to skip over. Replies are
//! plain text and are interpreted by the helpers at the bottom of this module.

use crate::cards::{parse_cards, Card, CardParseError};
use crate::hand::{format_cards, Outcome};
use crate::money::{Money, MoneyError};
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    #[error("unknown request: '{0}'")]
    UnknownRequest(String),
    #[error("malformed {kind} payload: '{payload}'")]
    MalformedPayload { kind: &'static str, payload: String },
    #[error(transparent)]
    Card(#[from] CardParseError),
    #[error(transparent)]
    Money(#[from] MoneyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Request {
    /// Ask for the starting bankroll.
    Amount,
    /// Ask for this round's bet; `0` leaves the table.
    Bet,
    /// The seat's current cards.
    Cards(Vec<Card>),
    /// Ask whether to draw another card.
    Hit,
    /// The house's final hand for the round.
    House(Vec<Card>),
    /// Settlement result and the seat's bankroll afterwards.
    Result { outcome: Outcome, money: Money },
    /// Last message before the house closes the channel.
    Bye(String),
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Amount => "AMT",
            Request::Bet => "BET",
            Request::Cards(_) => "CARDS",
            Request::Hit => "HIT",
            Request::House(_) => "HOUSE",
            Request::Result { .. } => "RESULT",
            Request::Bye(_) => "BYE",
        }
    }

    /// Whether the house waits for a reply after sending this request.
    pub fn expects_reply(&self) -> bool {
        matches!(self, Request::Amount | Request::Bet | Request::Hit)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Amount | Request::Bet | Request::Hit => f.write_str(self.kind()),
            Request::Cards(cards) | Request::House(cards) => {
                write!(f, "{}:{}", self.kind(), format_cards(cards))
            }
            Request::Result { outcome, money } => write!(f, "RESULT:{outcome}:{money}"),
            Request::Bye(reason) => write!(f, "BYE:{reason}"),
        }
    }
}

fn parse_hand_payload(kind: &'static str, payload: &str) -> Result<Vec<Card>, ProtocolError> {
    let inner = payload
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ProtocolError::MalformedPayload { kind, payload: payload.to_string() })?;
    Ok(parse_cards(inner)?)
}

impl FromStr for Request {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        let (kind, payload) = match line.split_once(':') {
            Some((k, p)) => (k, Some(p)),
            None => (line, None),
        };
        match (kind.to_ascii_uppercase().as_str(), payload) {
            ("AMT", None) => Ok(Request::Amount),
            ("BET", None) => Ok(Request::Bet),
            ("HIT", None) => Ok(Request::Hit),
            ("CARDS", Some(p)) => Ok(Request::Cards(parse_hand_payload("CARDS", p)?)),
            ("HOUSE", Some(p)) => Ok(Request::House(parse_hand_payload("HOUSE", p)?)),
            ("RESULT", Some(p)) => {
                let malformed =
                    || ProtocolError::MalformedPayload { kind: "RESULT", payload: p.to_string() };
                let (outcome, money) = p.split_once(':').ok_or_else(malformed)?;
                let outcome = match outcome {
                    "WIN" => Outcome::Win,
                    "PUSH" => Outcome::Push,
                    "LOSE" => Outcome::Lose,
                    _ => return Err(malformed()),
                };
                Ok(Request::Result { outcome, money: money.parse()? })
            }
            ("BYE", Some(p)) => Ok(Request::Bye(p.to_string())),
            ("BYE", None) => Ok(Request::Bye(String::new())),
            _ => Err(ProtocolError::UnknownRequest(line.to_string())),
        }
    }
}

/// Interpret a bankroll or bet reply.
pub fn parse_money_reply(reply: &str) -> Result<Money, MoneyError> {
    reply.trim().parse()
}

/// `Y` or `y` draws; anything else stands.
pub fn is_hit_reply(reply: &str) -> bool {
    matches!(reply.trim(), "Y" | "y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};

    #[test]
    fn bare_requests_parse() {
        assert_eq!("AMT".parse::<Request>().unwrap(), Request::Amount);
        assert_eq!("BET\n".parse::<Request>().unwrap(), Request::Bet);
        assert_eq!("hit\r\n".parse::<Request>().unwrap(), Request::Hit);
    }

    #[test]
    fn cards_request_carries_the_hand() {
        let req: Request = "CARDS:[7C,6D]".parse().unwrap();
        assert_eq!(
            req,
            Request::Cards(vec![Card::new(Rank::Seven, Suit::Clubs), Card::new(Rank::Six, Suit::Diamonds)])
        );
        assert_eq!(req.to_string(), "CARDS:[7C,6D]");
        assert!(!req.expects_reply());
    }

    #[test]
    fn result_and_bye_format() {
        let req = Request::Result { outcome: Outcome::Win, money: Money::from_dollars(25) };
        assert_eq!(req.to_string(), "RESULT:WIN:25.00");
        assert_eq!(req.to_string().parse::<Request>().unwrap(), req);

        let bye = Request::Bye("broke".into());
        assert_eq!(bye.to_string(), "BYE:broke");
        assert_eq!("BYE".parse::<Request>().unwrap(), Request::Bye(String::new()));
    }

    #[test]
    fn unknown_and_malformed_requests_are_errors() {
        assert!(matches!("FOLD".parse::<Request>(), Err(ProtocolError::UnknownRequest(_))));
        assert!(matches!("AMT:5".parse::<Request>(), Err(ProtocolError::UnknownRequest(_))));
        assert!(matches!(
            "CARDS:7C".parse::<Request>(),
            Err(ProtocolError::MalformedPayload { kind: "CARDS", .. })
        ));
        assert!(matches!("CARDS:[ZZ]".parse::<Request>(), Err(ProtocolError::Card(_))));
        assert!(matches!(
            "RESULT:TIE:1".parse::<Request>(),
            Err(ProtocolError::MalformedPayload { kind: "RESULT", .. })
        ));
    }

    #[test]
    fn reply_helpers() {
        assert!(is_hit_reply("Y"));
        assert!(is_hit_reply("y\n"));
        assert!(!is_hit_reply("yes"));
        assert!(!is_hit_reply(""));
        assert_eq!(parse_money_reply("10\n").unwrap(), Money::from_dollars(10));
        assert!(parse_money_reply("ten").is_err());
    }
}
