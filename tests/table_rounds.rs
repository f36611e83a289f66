use blackjack_rs::cards::{parse_cards, Card};
use blackjack_rs::channel::{duplex, Channel, ChannelError};
use blackjack_rs::config::TableConfig;
use blackjack_rs::deck::{Deck, DeckError, DeckSource, StackedDecks};
use blackjack_rs::hand::{BetError, Outcome};
use blackjack_rs::money::Money;
use blackjack_rs::protocol::Request;
use blackjack_rs::seat::{spawn_seat, BotProfile, BotSeat, ScriptedSeat, SeatReport, Temper};
use blackjack_rs::table::{EndReason, LeaveReason, Table, TableError, TableEvent, TableState};
use std::thread;

fn cards(text: &str) -> Vec<Card> {
    parse_cards(text).unwrap()
}

fn dollars(n: u64) -> Money {
    Money::from_dollars(n)
}

fn join(handle: thread::JoinHandle<Result<SeatReport, blackjack_rs::seat::SeatError>>) -> SeatReport {
    handle.join().unwrap().unwrap()
}

#[test]
fn two_seats_lose_to_house_twenty_one_then_play_on() {
    // Round 1: A [7C,6D] and B [KH,9S] stand, house [5C,QD] draws 6H to 21.
    // Round 2: A gets a 21 against the house's 18, B pushes on 18.
    let decks = StackedDecks::from_orders(&[
        cards("7C 6D KH 9S 5C QD 6H"),
        cards("AS KD 9C 9D 10H 8S"),
    ])
    .unwrap();
    let mut table = Table::with_decks(TableConfig::default(), decks).unwrap();

    let (house_a, seat_a) = duplex();
    let (house_b, seat_b) = duplex();
    let a = table.add_seat(house_a).unwrap();
    let b = table.add_seat(house_b).unwrap();
    assert_eq!((a, b), (1, 2));
    let ha = spawn_seat(a, seat_a, ScriptedSeat::new("20").bets(["10", "10"])).unwrap();
    let hb = spawn_seat(b, seat_b, ScriptedSeat::new("20").bets(["10", "5"])).unwrap();

    let summary = table.run().unwrap();
    assert_eq!(summary.reason, EndReason::NoSeatsLeft);
    assert_eq!(summary.rounds, 2);
    assert_eq!(table.state(), TableState::Terminated);

    let ra = join(ha);
    let rb = join(hb);
    assert_eq!(
        ra.results().collect::<Vec<_>>(),
        vec![(Outcome::Lose, dollars(10)), (Outcome::Win, dollars(25))]
    );
    assert_eq!(
        rb.results().collect::<Vec<_>>(),
        vec![(Outcome::Lose, dollars(10)), (Outcome::Push, dollars(10))]
    );

    // seat A saw its own hand, then the house's final hand, then its result
    assert_eq!(
        &ra.transcript[..6],
        &[
            Request::Amount,
            Request::Bet,
            Request::Cards(cards("7C 6D")),
            Request::Hit,
            Request::House(cards("5C QD 6H")),
            Request::Result { outcome: Outcome::Lose, money: dollars(10) },
        ]
    );

    let da = summary.departure(a).unwrap();
    assert_eq!((da.money, &da.reason, da.round), (dollars(25), &LeaveReason::Left, 3));
    let db = summary.departure(b).unwrap();
    assert_eq!((db.money, &db.reason), (dollars(10), &LeaveReason::Left));
    assert_eq!(ra.farewell.as_deref(), Some("left the table"));
}

#[test]
fn hitting_seat_gets_updated_cards_and_can_bust() {
    // seat [10C,6D] hits KS and busts; house [10H,7S] stands on 17
    let decks = StackedDecks::from_orders(&[cards("10C 6D 10H 7S KS")]).unwrap();
    let mut table = Table::with_decks(TableConfig::default(), decks).unwrap();
    let (house_end, seat_end) = duplex();
    let id = table.add_seat(house_end).unwrap();
    let handle =
        spawn_seat(id, seat_end, ScriptedSeat::new("10").bets(["10"]).hits([true])).unwrap();

    let summary = table.run().unwrap();
    let report = join(handle);

    assert!(report.transcript.contains(&Request::Cards(cards("10C 6D KS"))));
    assert_eq!(report.results().collect::<Vec<_>>(), vec![(Outcome::Lose, Money::ZERO)]);
    let departure = summary.departure(id).unwrap();
    assert_eq!(departure.reason, LeaveReason::Broke);
    assert!(table
        .history()
        .iter()
        .any(|e| matches!(e.event, TableEvent::Busted { seat, score: 26 } if seat == id)));
    assert!(table
        .history()
        .iter()
        .any(|e| matches!(e.event, TableEvent::HouseStood { score: 17 })));
}

#[test]
fn bad_bets_remove_only_the_offending_seat() {
    let decks =
        StackedDecks::from_orders(&[cards("2C 3C 4C 5C 6C 7C 10H 8S 10D 7S")]).unwrap();
    let mut table = Table::with_decks(TableConfig::default(), decks).unwrap();
    let mut handles = Vec::new();
    for script in [
        ScriptedSeat::new("20").bets(["7"]),
        ScriptedSeat::new("20").bets(["25"]),
        ScriptedSeat::new("20").bets(["ten"]),
        ScriptedSeat::new("20").bets(["10"]),
    ] {
        let (house_end, seat_end) = duplex();
        let id = table.add_seat(house_end).unwrap();
        handles.push(spawn_seat(id, seat_end, script).unwrap());
    }

    let summary = table.run().unwrap();
    let reports: Vec<SeatReport> = handles.into_iter().map(join).collect();

    assert!(matches!(summary.departure(1).unwrap().reason, LeaveReason::Bet(BetError::Invalid { .. })));
    assert!(matches!(
        summary.departure(2).unwrap().reason,
        LeaveReason::Bet(BetError::InsufficientFunds { .. })
    ));
    assert!(matches!(summary.departure(3).unwrap().reason, LeaveReason::Malformed(_)));
    for r in &reports[..3] {
        assert_eq!(r.rounds, 0);
        assert!(r.farewell.is_some());
    }
    // the fourth seat still played the round, [10H,8S] against the house's [10D,7S]
    assert_eq!(reports[3].results().collect::<Vec<_>>(), vec![(Outcome::Win, dollars(30))]);
    assert_eq!(summary.rounds, 1);
}

#[test]
fn unusable_bankrolls_are_turned_away_at_seating() {
    let mut table = Table::with_decks(TableConfig::default(), StackedDecks::new(Vec::new())).unwrap();
    let mut handles = Vec::new();
    for bankroll in ["lots", "3", "-5"] {
        let (house_end, seat_end) = duplex();
        let id = table.add_seat(house_end).unwrap();
        handles.push(spawn_seat(id, seat_end, ScriptedSeat::new(bankroll)).unwrap());
    }
    let summary = table.run().unwrap();
    assert_eq!(summary.rounds, 0);
    assert_eq!(summary.reason, EndReason::NoSeatsLeft);
    assert!(matches!(summary.departure(1).unwrap().reason, LeaveReason::Malformed(_)));
    assert_eq!(summary.departure(2).unwrap().reason, LeaveReason::Broke);
    assert!(matches!(summary.departure(3).unwrap().reason, LeaveReason::Malformed(_)));
    for h in handles {
        assert_eq!(join(h).transcript[0], Request::Amount);
    }
}

#[test]
fn losing_bots_eventually_leave_the_table() {
    let mut table = Table::new(TableConfig::default().with_seed(2024)).unwrap();
    let mut handles = Vec::new();
    for (n, temper) in [Temper::Cautious, Temper::Standard, Temper::Reckless].into_iter().enumerate() {
        let (house_end, seat_end) = duplex();
        let id = table.add_seat(house_end).unwrap();
        let profile = BotProfile::for_temper(temper)
            .with_seed(n as u64)
            .with_bankroll(dollars(30))
            .with_max_rounds(40);
        handles.push(spawn_seat(id, seat_end, BotSeat::new(profile)).unwrap());
    }

    let summary = table.run().unwrap();
    assert_eq!(summary.reason, EndReason::NoSeatsLeft);
    assert!(summary.rounds <= 40);
    assert_eq!(summary.departures.len(), 3);
    for h in handles {
        let report = join(h);
        let departure = summary.departure(report.id).unwrap();
        assert_eq!(report.money, Some(departure.money));
    }
}

#[test]
fn a_vanished_seat_is_removed_and_the_rest_play_on() {
    let decks = StackedDecks::from_orders(&[cards("10C 8D 10H 8S")]).unwrap();
    let mut table = Table::with_decks(TableConfig::default(), decks).unwrap();

    let (house_gone, seat_gone) = duplex();
    table.add_seat(house_gone).unwrap();
    drop(seat_gone);

    let (house_end, seat_end) = duplex();
    let id = table.add_seat(house_end).unwrap();
    let handle = spawn_seat(id, seat_end, ScriptedSeat::new("50").bets(["20"])).unwrap();

    let summary = table.run().unwrap();
    assert_eq!(summary.departure(1).unwrap().reason, LeaveReason::Disconnected(ChannelError::Closed));
    let report = join(handle);
    assert_eq!(report.results().collect::<Vec<_>>(), vec![(Outcome::Push, dollars(50))]);
}

#[test]
fn shutdown_refunds_stakes_and_dismisses_everyone() {
    // Drive the seat side by hand so the shutdown lands mid-round.
    let mut table = Table::with_decks(TableConfig::default(), StackedDecks::new(Vec::new())).unwrap();
    let control = table.control();
    let (house_end, mut seat_end) = duplex();
    let id = table.add_seat(house_end).unwrap();

    let player = thread::spawn(move || {
        let mut seen = Vec::new();
        loop {
            let line = match seat_end.receive() {
                Ok(line) => line,
                Err(_) => break,
            };
            let request: Request = line.parse().unwrap();
            seen.push(request.clone());
            match request {
                Request::Amount => {
                    seat_end.send("40").unwrap();
                }
                Request::Bet => {
                    seat_end.send("15").unwrap();
                }
                Request::Hit => {
                    // the house asks to hit only after the bet is placed
                    control.request_shutdown();
                    seat_end.send("y").unwrap();
                }
                Request::Bye(_) => break,
                _ => {}
            }
        }
        seen
    });

    let summary = table.run().unwrap();
    let seen = player.join().unwrap();

    assert_eq!(summary.reason, EndReason::Shutdown);
    assert_eq!(summary.rounds, 0);
    let departure = summary.departure(id).unwrap();
    assert_eq!(departure.reason, LeaveReason::Shutdown);
    assert_eq!(departure.money, dollars(40));
    assert_eq!(seen.last(), Some(&Request::Bye("table shutting down".to_string())));
    assert_eq!(table.state(), TableState::Terminated);
}

#[test]
fn stop_is_ignored_while_seats_remain() {
    let mut table = Table::with_decks(TableConfig::default(), StackedDecks::new(Vec::new())).unwrap();
    table.control().request_stop();
    let (house_end, seat_end) = duplex();
    let id = table.add_seat(house_end).unwrap();
    let handle = spawn_seat(id, seat_end, ScriptedSeat::new("20").bets(["5"])).unwrap();

    let summary = table.run().unwrap();
    join(handle);

    assert_eq!(summary.reason, EndReason::NoSeatsLeft);
    assert_eq!(summary.rounds, 1);
    let ignored = table
        .history()
        .iter()
        .filter(|e| matches!(e.event, TableEvent::StopIgnored { .. }))
        .count();
    assert_eq!(ignored, 1);
}

struct EmptyShoe;

impl DeckSource for EmptyShoe {
    fn next_deck(&mut self) -> Result<Deck, DeckError> {
        Err(DeckError::Exhausted { dealt: 0 })
    }
}

#[test]
fn running_out_of_cards_is_fatal() {
    let mut table = Table::with_decks(TableConfig::default(), EmptyShoe).unwrap();
    let (house_end, seat_end) = duplex();
    table.add_seat(house_end).unwrap();
    let handle = spawn_seat(1, seat_end, ScriptedSeat::new("20").bets(["5"])).unwrap();

    let err = table.run().unwrap_err();
    assert_eq!(err, TableError::Deck(DeckError::Exhausted { dealt: 0 }));
    assert_eq!(table.state(), TableState::Terminated);

    let report = join(handle);
    assert_eq!(report.farewell.as_deref(), Some("table closed after an internal error"));
    assert_eq!(table.departures()[0].reason, LeaveReason::TableError);
}

#[test]
fn play_round_steps_one_round_at_a_time() {
    let mut table = Table::with_decks(TableConfig::default(), StackedDecks::new(Vec::new())).unwrap();
    let (house_end, seat_end) = duplex();
    table.add_seat(house_end).unwrap();
    let handle = spawn_seat(1, seat_end, ScriptedSeat::new("100").bets(["5", "5"])).unwrap();

    assert_eq!(table.play_round().unwrap(), None);
    assert_eq!(table.round(), 1);
    assert_eq!(table.state(), TableState::Elimination);
    assert_eq!(table.play_round().unwrap(), None);
    let summary = table.play_round().unwrap().expect("seat leaves in round three");
    assert_eq!(summary.rounds, 2);
    assert_eq!(table.play_round().unwrap(), Some(summary));

    let recent = table.history_recent(2);
    assert!(matches!(recent[1].event, TableEvent::Terminated { reason: EndReason::NoSeatsLeft }));
    join(handle);
}

#[test]
fn seat_hanging_up_mid_turn_forfeits_and_the_next_seat_plays() {
    // seat 1 [10C,6D] hangs up at its first HIT; seat 2 [10H,9S] beats the house's [10D,8S]
    let decks = StackedDecks::from_orders(&[cards("10C 6D 10H 9S 10D 8S")]).unwrap();
    let mut table = Table::with_decks(TableConfig::default(), decks).unwrap();
    assert_eq!(table.config().min_bet, dollars(5));

    let (house_a, mut seat_a) = duplex();
    let (house_b, seat_b) = duplex();
    let a = table.add_seat(house_a).unwrap();
    let b = table.add_seat(house_b).unwrap();
    assert_eq!(table.seats().iter().map(|s| s.id()).collect::<Vec<_>>(), vec![a, b]);

    let quitter = thread::spawn(move || loop {
        let Ok(line) = seat_a.receive() else { break };
        match line.parse::<Request>().unwrap() {
            Request::Amount => {
                seat_a.send("50").unwrap();
            }
            Request::Bet => {
                seat_a.send("10").unwrap();
            }
            Request::Hit => break,
            _ => {}
        }
    });
    let hb = spawn_seat(b, seat_b, ScriptedSeat::new("50").bets(["10"])).unwrap();

    assert_eq!(table.play_round().unwrap(), None);
    quitter.join().unwrap();

    let gone = &table.departures()[0];
    assert_eq!(gone.seat, a);
    assert_eq!(gone.reason, LeaveReason::Disconnected(ChannelError::Closed));
    assert_eq!(gone.money, dollars(40));

    assert_eq!(table.seats().len(), 1);
    assert_eq!(table.seats()[0].id(), b);
    assert_eq!(table.seats()[0].hand().money(), dollars(60));
    assert_eq!(table.house().score(), 18);
    assert_eq!(table.deck().dealt(), 6);
    assert_eq!(table.history_len(), table.history().len());

    let summary = table.run().unwrap();
    assert_eq!(summary.rounds, 1);
    let rb = join(hb);
    assert_eq!(rb.results().collect::<Vec<_>>(), vec![(Outcome::Win, dollars(60))]);
}

#[test]
fn a_failed_table_cannot_be_run_again() {
    let mut table = Table::with_decks(TableConfig::default(), EmptyShoe).unwrap();
    let (house_end, seat_end) = duplex();
    table.add_seat(house_end).unwrap();
    let handle = spawn_seat(1, seat_end, ScriptedSeat::new("20").bets(["5"])).unwrap();

    assert!(matches!(table.run(), Err(TableError::Deck(_))));
    join(handle);
    assert!(matches!(table.run(), Err(TableError::Invariant(_))));
    assert!(matches!(table.play_round(), Err(TableError::Invariant(_))));
}
