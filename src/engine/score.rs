// Final score formula.

use super::config::*;

/// Accumulated battle statistics the score is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreInput {
    pub won: bool,
    /// Player's remaining health; only counted on a win.
    pub remaining_health: i32,
    pub damage_dealt: i32,
    pub damage_received: i32,
    pub moves_used: u32,
}

/// Compute the final score. Never negative.
pub fn calculate_score(input: &ScoreInput) -> i32 {
    let mut score = if input.won {
        SCORE_WIN_BASE + input.remaining_health
    } else {
        SCORE_LOSS_BASE
    };

    score += input.damage_dealt / SCORE_DEALT_DIVISOR;
    score -= input.damage_received / SCORE_RECEIVED_DIVISOR;

    if input.moves_used < SCORE_EFFICIENCY_MAX_MOVES {
        score += SCORE_EFFICIENCY_BONUS;
    }

    score.max(0)
}
