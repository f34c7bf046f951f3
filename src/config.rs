// Application configuration, loaded from environment variables and CLI flags.

use std::time::Duration;

use crate::engine::config::{BATTLE_LOG_CAPACITY, MAX_BATTLE_LOG_CAPACITY, OPPONENT_DELAY_MS};
use crate::storage::DEFAULT_LEADERBOARD_LIMIT;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:botfight.db?mode=rwc";
pub const DEFAULT_PLAYER: &str = "Bot-1";
pub const DEFAULT_OPPONENT: &str = "Bot-2";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Pause before the opponent plays each half-turn.
    pub opponent_delay: Duration,
    /// Seed for the opponent's RNG. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Number of lines kept in the battle log.
    pub log_capacity: usize,
    pub player: String,
    pub opponent: String,
    /// Rows shown in the leaderboard after a battle.
    pub leaderboard_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            opponent_delay: Duration::from_millis(OPPONENT_DELAY_MS),
            seed: None,
            log_capacity: BATTLE_LOG_CAPACITY,
            player: DEFAULT_PLAYER.to_string(),
            opponent: DEFAULT_OPPONENT.to_string(),
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:botfight.db?mode=rwc`)
    /// - `ARENA_OPPONENT_DELAY_MS` - Opponent delay in milliseconds (default: 1000)
    /// - `ARENA_SEED` - Fixed RNG seed for reproducible opponents
    /// - `ARENA_LOG_CAPACITY` - Battle log length, 1 to 500 (default: 15)
    ///
    /// CLI flags:
    /// - `--delay-ms <MS>` - Override the opponent delay
    /// - `--seed <N>` - Override the RNG seed
    /// - `--player <NAME>` / `--opponent <NAME>` - Pick the characters
    /// - `--leaderboard <N>` - Leaderboard rows to print (default: 10)
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a config from explicit arguments and an environment lookup.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        let database_url = env("DATABASE_URL").unwrap_or(defaults.database_url);

        // CLI flag takes precedence, then env var, then default
        let opponent_delay = Self::parse_cli_value(args, "--delay-ms")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("ARENA_OPPONENT_DELAY_MS").and_then(|v| v.parse().ok()))
            .map(Duration::from_millis)
            .unwrap_or(defaults.opponent_delay);

        let seed = Self::parse_cli_value(args, "--seed")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("ARENA_SEED").and_then(|v| v.parse().ok()));

        // Out-of-range capacities fall back to the default
        let log_capacity = env("ARENA_LOG_CAPACITY")
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| (1..=MAX_BATTLE_LOG_CAPACITY).contains(n))
            .unwrap_or(defaults.log_capacity);

        let player = Self::parse_cli_value(args, "--player").unwrap_or(defaults.player);
        let opponent = Self::parse_cli_value(args, "--opponent").unwrap_or(defaults.opponent);

        let leaderboard_limit = Self::parse_cli_value(args, "--leaderboard")
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.leaderboard_limit);

        Config {
            database_url,
            opponent_delay,
            seed,
            log_capacity,
            player,
            opponent,
            leaderboard_limit,
        }
    }

    /// Parse a CLI flag value like `--seed 42`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
