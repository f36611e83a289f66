use blackjack_rs::cards::Card;
use blackjack_rs::channel::duplex;
use blackjack_rs::config::TableConfig;
use blackjack_rs::control::TableControl;
use blackjack_rs::hand::{score_cards, Outcome};
use blackjack_rs::money::Money;
use blackjack_rs::seat::{spawn_seat, BotProfile, BotSeat, SeatContext, SeatStrategy, Temper};
use blackjack_rs::table::{EndReason, Table, TableSummary};
use clap::Parser;
use crossterm::style::{StyledContent, Stylize};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "blackjack-rs")]
#[command(about = "Blackjack against the house, one thread per seat")]
#[command(version)]
struct Cli {
    /// Number of seats at the table (the house is extra)
    #[arg(value_parser = clap::value_parser!(u8).range(1..=12))]
    players: u8,

    /// Fill every seat with a bot instead of asking at the console
    #[arg(long)]
    bots: bool,

    /// Bots leave after this many rounds
    #[arg(long, requires = "bots")]
    rounds: Option<u32>,

    /// RNG seed for reproducible shuffles and bot play
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "5")]
    min_bet: Money,

    #[arg(long, default_value = "5")]
    bet_step: Money,

    #[arg(long, default_value_t = 17)]
    house_stands_on: u8,

    #[arg(long, default_value_t = 7)]
    shuffle_passes: u32,
}

impl Cli {
    fn table_config(&self, game: u64) -> TableConfig {
        let mut config = TableConfig::default()
            .with_min_bet(self.min_bet)
            .with_bet_step(self.bet_step)
            .with_house_stands_on(self.house_stands_on)
            .with_shuffle_passes(self.shuffle_passes);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed.wrapping_add(game));
        }
        config
    }

    fn bot(&self, seat: usize, game: u64) -> BotSeat {
        let temper = match seat % 3 {
            0 => Temper::Reckless,
            1 => Temper::Cautious,
            _ => Temper::Standard,
        };
        let config = self.table_config(game);
        let mut profile = BotProfile::for_temper(temper).with_limits(config.bet_limits());
        if let Some(seed) = self.seed {
            profile = profile.with_seed(seed.wrapping_add(game).wrapping_mul(31).wrapping_add(seat as u64));
        }
        if let Some(rounds) = self.rounds {
            profile = profile.with_max_rounds(rounds);
        }
        BotSeat::new(profile)
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,blackjack_rs=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn glyph(card: Card) -> StyledContent<String> {
    let text = format!("{}{}", card.rank().label(), card.suit().symbol());
    if card.suit().is_red() {
        text.red().bold()
    } else {
        text.bold()
    }
}

fn show_cards(cards: &[Card]) -> String {
    let parts: Vec<String> = cards.iter().map(|c| glyph(*c).to_string()).collect();
    parts.join(" ")
}

/// Read one trimmed line; `None` at end of input.
fn prompt(text: &str) -> Option<String> {
    let mut stdout = io::stdout();
    let _ = write!(stdout, "{text}");
    let _ = stdout.flush();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// A human at the terminal. Typing `q` at the bet prompt shuts the table down.
struct ConsoleSeat {
    id: usize,
    control: TableControl,
}

impl SeatStrategy for ConsoleSeat {
    fn bankroll(&mut self, _ctx: &SeatContext) -> String {
        prompt(&format!("Player {}: how much money do you have? ", self.id)).unwrap_or_default()
    }

    fn bet(&mut self, ctx: &SeatContext) -> String {
        let money = ctx.money.map(|m| format!(" You have ${m}.")).unwrap_or_default();
        let reply = prompt(&format!(
            "Player {}:{money} Place a bet in multiples of 5, 0 to leave, q to shut down: ",
            self.id
        ));
        match reply.as_deref() {
            Some("q" | "Q") => {
                self.control.request_shutdown();
                "0".to_string()
            }
            Some(bet) => bet.to_string(),
            None => "0".to_string(),
        }
    }

    fn hit(&mut self, ctx: &SeatContext) -> bool {
        let reply = prompt(&format!("Player {} at {}: hit? [y/N] ", self.id, ctx.score.total));
        matches!(reply.as_deref(), Some("y" | "Y"))
    }

    fn on_cards(&mut self, ctx: &SeatContext) {
        let score = score_cards(&ctx.cards);
        let total = if score.busted {
            format!("{} BUST", score.total).red().to_string()
        } else {
            score.total.to_string()
        };
        println!("Player {}: {}  ({total})", self.id, show_cards(&ctx.cards));
    }

    fn on_house(&mut self, ctx: &SeatContext) {
        let score = score_cards(&ctx.house_cards);
        println!("House: {}  ({})", show_cards(&ctx.house_cards), score.total);
    }

    fn on_result(&mut self, ctx: &SeatContext) {
        let Some(outcome) = ctx.last_outcome else { return };
        let label = match outcome {
            Outcome::Win => outcome.label().green().bold(),
            Outcome::Push => outcome.label().yellow().bold(),
            Outcome::Lose => outcome.label().red().bold(),
        };
        let money = ctx.money.unwrap_or(Money::ZERO);
        println!("Player {}: {label}, you now have ${money}", self.id);
    }

    fn on_bye(&mut self, _ctx: &SeatContext, reason: &str) {
        println!("Player {}: {}", self.id, format!("goodbye ({reason})").dim());
    }
}

fn play_game(cli: &Cli, control: &TableControl, game: u64) -> Result<TableSummary, Box<dyn Error>> {
    let mut table = Table::new(cli.table_config(game))?;
    table.set_control(control.clone());

    let mut handles = Vec::with_capacity(usize::from(cli.players));
    for _ in 0..cli.players {
        let (house_end, seat_end) = duplex();
        let id = table.add_seat(house_end)?;
        let strategy: Box<dyn SeatStrategy> = if cli.bots {
            Box::new(cli.bot(id, game))
        } else {
            Box::new(ConsoleSeat { id, control: control.clone() })
        };
        handles.push(spawn_seat(id, seat_end, strategy)?);
    }

    let result = table.run();
    for handle in handles {
        match handle.join() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "seat ended with an error"),
            Err(_) => warn!("seat thread panicked"),
        }
    }
    Ok(result?)
}

fn print_summary(summary: &TableSummary) {
    let ending = match summary.reason {
        EndReason::NoSeatsLeft => "every seat has left",
        EndReason::Shutdown => "the table was shut down",
        _ => "the table closed",
    };
    println!();
    println!("{}", format!("Game over after {} rounds: {ending}.", summary.rounds).bold());
    for d in &summary.departures {
        println!("  Player {:>2}: ${:>8}  round {:>3}  {}", d.seat, d.money, d.round, d.reason);
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let control = TableControl::new();

    let mut game: u64 = 0;
    loop {
        match play_game(&cli, &control, game) {
            Ok(summary) => print_summary(&summary),
            Err(e) => {
                eprintln!("blackjack-rs: {e}");
                return ExitCode::FAILURE;
            }
        }
        let again = prompt("Start a new game (n) or shut down (s)? ");
        if !matches!(again.as_deref(), Some("n" | "N")) {
            break;
        }
        control.reset();
        game += 1;
    }
    ExitCode::SUCCESS
}
