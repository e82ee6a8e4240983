//! Command-line probe for the scoreboard core.
//!
//! # Responsibility
//! - Drive the player actions (refresh, delete all, stress test) from a shell.
//! - Print live snapshots to verify observation end to end.

use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use scoreboard_core::{
    init_logging_from_config, open_store, CoreConfig, PlayerOrdering, PlayerQuery, Players,
    Snapshot, StoreBackend,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "scoreboard", version, about = "Player store with live queries")]
struct Cli {
    /// JSON config file; flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Use the in-memory backend instead of SQLite.
    #[arg(long, global = true)]
    memory: bool,

    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Seed an empty table or shuffle existing players.
    Refresh,
    /// Remove every player.
    DeleteAll,
    /// Run many refreshes, one transaction each.
    Stress {
        #[arg(long)]
        count: Option<usize>,
    },
    /// Print the current players.
    List {
        #[arg(long, value_enum, default_value_t = Order::Id)]
        order: Order,
    },
    /// Print every snapshot while running refreshes.
    Watch {
        #[arg(long, value_enum, default_value_t = Order::Score)]
        order: Order,
        #[arg(long, default_value_t = 5)]
        rounds: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    Id,
    Name,
    Score,
}

impl From<Order> for PlayerOrdering {
    fn from(value: Order) -> Self {
        match value {
            Order::Id => Self::ById,
            Order::Name => Self::ByName,
            Order::Score => Self::ByScore,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_exit module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(&cli)?;
    init_logging_from_config(&config)?;

    let store = open_store(&config).map_err(|err| err.to_string())?;
    let players = Players::with_config(store, &config).map_err(|err| err.to_string())?;

    match cli.command {
        Command::Refresh => players.refresh().wait().map_err(|err| err.to_string())?,
        Command::DeleteAll => players.delete_all().wait().map_err(|err| err.to_string())?,
        Command::Stress { count } => {
            let completion = match count {
                Some(runs) => players.stress_test_runs(runs),
                None => players.stress_test(),
            };
            completion.wait().map_err(|err| err.to_string())?;
        }
        Command::List { order } => {
            let mut stream = players.observe_players(PlayerQuery::all().ordered_by(order.into()));
            match stream.try_next() {
                Some(Ok(snapshot)) => print_snapshot(&snapshot),
                Some(Err(err)) => return Err(err.to_string()),
                None => {}
            }
        }
        Command::Watch { order, rounds } => {
            let mut stream = players.observe_players(PlayerQuery::all().ordered_by(order.into()));
            for _ in 0..rounds {
                players.refresh().wait().map_err(|err| err.to_string())?;
            }
            for item in stream.drain() {
                print_snapshot(&item.map_err(|err| err.to_string())?);
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<CoreConfig, String> {
    let mut config = match cli.config.as_ref() {
        Some(path) => CoreConfig::from_json_file(path).map_err(|err| err.to_string())?,
        None => CoreConfig::default(),
    };
    if cli.memory {
        config.backend = StoreBackend::Memory;
        config.database_path = None;
    }
    if let Some(db) = cli.db.as_ref() {
        config.backend = StoreBackend::Sqlite;
        config.database_path = Some(db.clone());
    }
    if let Some(log_dir) = cli.log_dir.as_ref() {
        config.log_dir = Some(log_dir.clone());
    }
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("-- revision {} ({} players)", snapshot.revision, snapshot.len());
    for player in &snapshot.players {
        println!(
            "{:>6}  {:<12} {:>5}",
            player.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            player.name,
            player.score
        );
    }
}
