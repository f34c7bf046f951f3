// Opponent move selection.
//
// The heuristic is fixed and reproducible; all randomness goes through
// `RandomSource` so tests can script it.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::catalog::{Move, DEFEND, REST};
use super::config::{DEFEND_COST, OPPONENT_DEFEND_CHANCE};

/// Source of the opponent's random choices.
pub trait RandomSource {
    /// Uniform value in `[0, 1)`.
    fn roll(&mut self) -> f64;
    /// Uniform index in `0..len`. `len` is never 0.
    fn pick(&mut self, len: usize) -> usize;
}

/// `StdRng`-backed source, optionally seeded for reproducible sessions.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl RandomSource for SeededRandom {
    fn roll(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays fixed rolls and picks. Once a queue runs dry, rolls return 0.99
/// (never defend) and picks return 0.
#[derive(Debug, Default, Clone)]
pub struct ScriptedRandom {
    rolls: VecDeque<f64>,
    picks: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new(rolls: &[f64], picks: &[usize]) -> Self {
        Self {
            rolls: rolls.iter().copied().collect(),
            picks: picks.iter().copied().collect(),
        }
    }

    /// A source that never defends and always picks the first damaging move.
    pub fn aggressive() -> Self {
        Self::default()
    }
}

impl RandomSource for ScriptedRandom {
    fn roll(&mut self) -> f64 {
        self.rolls.pop_front().unwrap_or(0.99)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.picks.pop_front().unwrap_or(0).min(len.saturating_sub(1))
    }
}

/// Choose the opponent's next move given its current energy and move set.
///
/// Order of checks:
/// 1. only Rest is affordable -> Rest;
/// 2. roll < 0.2 with energy >= 2 -> Defend;
/// 3. no affordable damaging move -> Rest;
/// 4. otherwise a uniformly random affordable damaging move.
pub fn choose_move(energy: i32, moves: &[Move], rng: &mut dyn RandomSource) -> Move {
    let usable: Vec<Move> = moves
        .iter()
        .copied()
        .filter(|m| energy >= m.energy_cost)
        .collect();

    if usable.len() == 1 && usable[0].is_rest() {
        return REST;
    }

    if rng.roll() < OPPONENT_DEFEND_CHANCE && energy >= DEFEND_COST {
        return DEFEND;
    }

    let offensive: Vec<Move> = usable
        .into_iter()
        .filter(|m| !m.is_rest() && !m.is_defend())
        .collect();

    if offensive.is_empty() {
        return REST;
    }

    offensive[rng.pick(offensive.len())]
}
