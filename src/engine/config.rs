// Energy
pub const MAX_ENERGY: i32 = 10;
pub const REST_ENERGY_GAIN: i32 = 5;

// Universal moves
pub const DEFEND_MOVE: &str = "Defend";
pub const REST_MOVE: &str = "Rest";
pub const DEFEND_COST: i32 = 2;
pub const REST_COST: i32 = 0;

// Opponent policy: chance of picking Defend when damaging moves are available
pub const OPPONENT_DEFEND_CHANCE: f64 = 0.2;

// Opponent "thinking time" between half-turns, in milliseconds
pub const OPPONENT_DELAY_MS: u64 = 1000;

// Battle log retention (most recent entries kept)
pub const BATTLE_LOG_CAPACITY: usize = 15;
pub const MAX_BATTLE_LOG_CAPACITY: usize = 500;

// Scoring
pub const SCORE_WIN_BASE: i32 = 100;
pub const SCORE_LOSS_BASE: i32 = 25;
pub const SCORE_DEALT_DIVISOR: i32 = 2;
pub const SCORE_RECEIVED_DIVISOR: i32 = 4;
pub const SCORE_EFFICIENCY_BONUS: i32 = 20;
pub const SCORE_EFFICIENCY_MAX_MOVES: u32 = 10;
