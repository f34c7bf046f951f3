use std::error::Error;
use std::io::Write;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use botfight_arena::arena::{Arena, ArenaError, RoundResult};
use botfight_arena::config::Config;
use botfight_arena::db::Database;
use botfight_arena::engine::battle::{Battle, BattleError};
use botfight_arena::engine::opponent::SeededRandom;
use botfight_arena::metrics;
use botfight_arena::registration::{self, RegistrationError, RegistrationForm};
use botfight_arena::session::{
    PendingPlayerRecord, ReconcileError, SessionRecordBridge, SessionScope,
};
use botfight_arena::storage::{Note, PlayerStorage};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Config::load()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn Error>> {
    metrics::register_metrics();

    let db = Database::new(&config.database_url).await?;
    tracing::info!(database = %config.database_url, "player storage ready");

    let battle = Battle::with_log_capacity(&config.player, &config.opponent, config.log_capacity)?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    // The registration step hands its record over through the session scope.
    let mut session = SessionScope::new();
    let pending = read_registration(&mut input, &db).await?;
    session.store_pending(&pending)?;

    let record = session
        .take_pending()?
        .ok_or(ReconcileError::MissingRecord)?;
    let bridge = SessionRecordBridge::with_pending(db, record);

    let mut arena = Arena::new(
        battle,
        bridge,
        Box::new(SeededRandom::new(config.seed)),
        config.opponent_delay,
    );
    arena.open()?;

    println!(
        "\n{} VS {}  (type a move number or name, q to leave)",
        config.player, config.opponent
    );
    let mut round = arena.start().await?;
    print_log(&arena);

    while !round.is_finished() {
        print_status(&arena);
        let choice = prompt(&mut input, "Your move").await?;
        if choice.eq_ignore_ascii_case("q") {
            if arena.abandon() {
                println!("Battle abandoned, results were not saved.");
            }
            return Ok(());
        }

        let move_name = resolve_choice(&arena, &choice);
        round = match arena.player_move(&move_name).await {
            Ok(round) => round,
            Err(ArenaError::Battle(BattleError::InvalidMove { .. })) => {
                print_log(&arena);
                continue;
            }
            Err(ArenaError::Battle(e @ BattleError::UnknownMove { .. })) => {
                println!("{e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        print_log(&arena);
    }

    if let RoundResult::Finished { outcome, .. } = &round {
        let summary = serde_json::to_string(outcome)?;
        tracing::info!(%summary, "battle finished");
    }

    if let RoundResult::Finished { save: Err(_), .. } = round {
        loop {
            let answer = prompt(&mut input, "Saving failed. Retry? [y/N]").await?;
            if !answer.eq_ignore_ascii_case("y") {
                break;
            }
            let retried = arena.retry_save().await;
            print_log(&arena);
            if retried.is_ok() {
                break;
            }
        }
    }

    print_leaderboard(arena.bridge().storage(), config.leaderboard_limit).await?;
    tracing::debug!("metrics:\n{}", metrics::gather_metrics());
    Ok(())
}

async fn prompt(input: &mut Input, label: &str) -> Result<String, Box<dyn Error>> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    match input.next_line().await? {
        Some(line) => Ok(line.trim().to_string()),
        None => Err("input closed".into()),
    }
}

/// Ask for the registration form until it validates.
async fn read_registration(
    input: &mut Input,
    db: &Database,
) -> Result<PendingPlayerRecord, Box<dyn Error>> {
    loop {
        let name = prompt(input, "Name").await?;
        let display_name = prompt(input, "Username").await?;
        let email = prompt(input, "Email").await?;
        let note_text = prompt(input, "How was it? [Pas-ouf/sympa/Trop-Top]").await?;
        let note = if note_text.is_empty() {
            Note::default()
        } else {
            match note_text.parse::<Note>() {
                Ok(note) => note,
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            }
        };

        let form = RegistrationForm {
            name,
            display_name,
            email,
            note,
        };
        match registration::register(&form, db).await {
            Ok(record) => {
                if record.is_existing {
                    println!("Welcome back, {}!", record.display_name);
                }
                return Ok(record);
            }
            Err(RegistrationError::Validation(msg)) => println!("{msg}"),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Map a numeric menu choice to its move name; anything else is passed through.
fn resolve_choice<S: PlayerStorage>(arena: &Arena<S>, choice: &str) -> String {
    let moves = arena.battle().player_moves();
    choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| moves.get(i))
        .map(|mv| mv.name.to_string())
        .unwrap_or_else(|| choice.to_string())
}

fn print_status<S: PlayerStorage>(arena: &Arena<S>) {
    let battle = arena.battle();
    for c in [battle.player(), battle.opponent()] {
        println!("  {:<8} HP {:>3}  EN {:>2}", c.name, c.health, c.energy);
    }
    for (i, mv) in battle.player_moves().iter().enumerate() {
        let marker = if battle.can_use(mv) { ' ' } else { 'x' };
        let damage = mv.damage.map(|d| format!(", {d} dmg")).unwrap_or_default();
        println!("  {marker}{}. {} ({} energy{damage})", i + 1, mv.name, mv.energy_cost);
    }
}

fn print_log<S: PlayerStorage>(arena: &Arena<S>) {
    println!();
    for line in arena.battle().log().lines() {
        println!("  {line}");
    }
}

async fn print_leaderboard(storage: &Database, limit: usize) -> Result<(), Box<dyn Error>> {
    println!("\nLeaderboard");
    for (rank, p) in storage.leaderboard(limit).await?.iter().enumerate() {
        println!(
            "  {:>2}. {:<16} {:>6} pts  {}W/{}L",
            rank + 1,
            p.display_name,
            p.score,
            p.wins,
            p.losses
        );
    }
    Ok(())
}
