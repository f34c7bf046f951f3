// Turn-based battle state machine: one player-controlled combatant against
// one opponent-controlled combatant, resolved one half-turn at a time.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::metrics;

use super::catalog::{self, CharacterDef, Move};
use super::config::*;
use super::opponent::{self, RandomSource};
use super::score::{calculate_score, ScoreInput};

/// Which side of the battle acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Player,
    Opponent,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }

    /// Label used for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Side::Player => "player",
            Side::Opponent => "opponent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleState {
    NotStarted,
    InProgress,
    Over,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    #[error("{character} doesn't have enough energy for {move_name} ({energy}/{cost})")]
    InvalidMove {
        character: String,
        move_name: String,
        energy: i32,
        cost: i32,
    },
    #[error("{character} has no move named {move_name}")]
    UnknownMove {
        character: String,
        move_name: String,
    },
    #[error("unknown character: {0}")]
    UnknownCharacter(String),
    #[error("it is not the {} side's turn", .0.label())]
    OutOfTurn(Side),
    #[error("battle is not in progress")]
    NotInProgress,
    #[error("battle already started")]
    AlreadyStarted,
}

/// One side's live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combatant {
    pub name: String,
    pub health: i32,
    pub energy: i32,
    pub defense_rating: i32,
    pub is_defending: bool,
}

impl Combatant {
    fn from_def(def: &CharacterDef) -> Self {
        Self {
            name: def.name.to_string(),
            health: def.base_health,
            energy: def.base_energy.min(MAX_ENERGY),
            defense_rating: def.defense_rating,
            is_defending: false,
        }
    }

    pub fn is_down(&self) -> bool {
        self.health == 0
    }
}

/// Final result of a finished battle, from the player's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleOutcome {
    pub winner: String,
    pub winning_side: Side,
    pub player_won: bool,
    pub score: i32,
    pub damage_dealt: i32,
    pub damage_received: i32,
    pub moves_used: u32,
    pub character_used: String,
}

/// Result of an accepted half-turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue,
    Finished(BattleOutcome),
}

/// Bounded narrative log; the oldest line is dropped on overflow.
#[derive(Debug, Clone)]
pub struct BattleLog {
    lines: VecDeque<String>,
    capacity: usize,
}

impl BattleLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

pub struct Battle {
    player_def: &'static CharacterDef,
    opponent_def: &'static CharacterDef,
    player: Combatant,
    opponent: Combatant,
    log: BattleLog,
    state: BattleState,
    next_turn: Side,
    damage_dealt: i32,
    damage_received: i32,
    moves_used: u32,
    outcome: Option<BattleOutcome>,
    started_at: Option<Instant>,
}

impl Battle {
    /// Set up a battle between two catalog characters.
    pub fn new(player: &str, opponent: &str) -> Result<Self, BattleError> {
        Self::with_log_capacity(player, opponent, BATTLE_LOG_CAPACITY)
    }

    pub fn with_log_capacity(
        player: &str,
        opponent: &str,
        log_capacity: usize,
    ) -> Result<Self, BattleError> {
        let player_def = catalog::get_character(player)
            .ok_or_else(|| BattleError::UnknownCharacter(player.to_string()))?;
        let opponent_def = catalog::get_character(opponent)
            .ok_or_else(|| BattleError::UnknownCharacter(opponent.to_string()))?;

        Ok(Self {
            player_def,
            opponent_def,
            player: Combatant::from_def(player_def),
            opponent: Combatant::from_def(opponent_def),
            log: BattleLog::new(log_capacity),
            state: BattleState::NotStarted,
            next_turn: Side::Opponent,
            damage_dealt: 0,
            damage_received: 0,
            moves_used: 0,
            outcome: None,
            started_at: None,
        })
    }

    pub fn player(&self) -> &Combatant {
        &self.player
    }

    pub fn opponent(&self) -> &Combatant {
        &self.opponent
    }

    pub fn log(&self) -> &BattleLog {
        &self.log
    }

    pub fn state(&self) -> BattleState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state != BattleState::NotStarted
    }

    pub fn is_over(&self) -> bool {
        self.state == BattleState::Over
    }

    /// Side owed the next half-turn while the battle is in progress.
    pub fn next_turn(&self) -> Side {
        self.next_turn
    }

    pub fn winner(&self) -> Option<&str> {
        self.outcome.as_ref().map(|o| o.winner.as_str())
    }

    pub fn outcome(&self) -> Option<&BattleOutcome> {
        self.outcome.as_ref()
    }

    pub fn damage_dealt(&self) -> i32 {
        self.damage_dealt
    }

    pub fn damage_received(&self) -> i32 {
        self.damage_received
    }

    pub fn moves_used(&self) -> u32 {
        self.moves_used
    }

    /// The player's move set: signature moves, then Defend and Rest.
    pub fn player_moves(&self) -> Vec<Move> {
        catalog::moves_for(self.player_def.name)
    }

    /// Whether the player could play `mv` right now.
    pub fn can_use(&self, mv: &Move) -> bool {
        self.state == BattleState::InProgress && self.player.energy >= mv.energy_cost
    }

    /// Append a line to the battle log.
    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line);
    }

    /// Begin the battle. The opponent plays the first half-turn.
    pub fn start(&mut self) -> Result<(), BattleError> {
        if self.state != BattleState::NotStarted {
            return Err(BattleError::AlreadyStarted);
        }

        self.state = BattleState::InProgress;
        self.next_turn = Side::Opponent;
        self.player.is_defending = false;
        self.opponent.is_defending = false;
        self.damage_dealt = 0;
        self.damage_received = 0;
        self.moves_used = 0;
        self.outcome = None;
        self.started_at = Some(Instant::now());
        self.log.clear();
        self.log.push("The battle begins!");
        self.log
            .push(format!("{} VS {}", self.player.name, self.opponent.name));

        metrics::BATTLES_STARTED_TOTAL.inc();
        tracing::info!(
            player = %self.player.name,
            opponent = %self.opponent.name,
            "battle started"
        );
        Ok(())
    }

    /// Resolve the player's half-turn with the named move.
    pub fn perform_move(&mut self, move_name: &str) -> Result<TurnOutcome, BattleError> {
        self.ensure_turn(Side::Player)?;
        let mv = catalog::find_move(self.player_def.name, move_name).ok_or_else(|| {
            BattleError::UnknownMove {
                character: self.player.name.clone(),
                move_name: move_name.to_string(),
            }
        })?;
        self.resolve(Side::Player, mv)
    }

    /// Resolve the opponent's half-turn, choosing its move with `rng`.
    pub fn opponent_turn(&mut self, rng: &mut dyn RandomSource) -> Result<TurnOutcome, BattleError> {
        self.ensure_turn(Side::Opponent)?;
        let moves = catalog::moves_for(self.opponent_def.name);
        let mv = opponent::choose_move(self.opponent.energy, &moves, rng);
        self.resolve(Side::Opponent, mv)
    }

    /// Restore both combatants to base stats and return to `NotStarted`.
    pub fn reset(&mut self) {
        self.player = Combatant::from_def(self.player_def);
        self.opponent = Combatant::from_def(self.opponent_def);
        self.state = BattleState::NotStarted;
        self.next_turn = Side::Opponent;
        self.damage_dealt = 0;
        self.damage_received = 0;
        self.moves_used = 0;
        self.outcome = None;
        self.started_at = None;
        self.log.clear();
    }

    fn ensure_turn(&self, side: Side) -> Result<(), BattleError> {
        if self.state != BattleState::InProgress {
            return Err(BattleError::NotInProgress);
        }
        if self.next_turn != side {
            return Err(BattleError::OutOfTurn(side));
        }
        Ok(())
    }

    fn sides_mut(&mut self, actor: Side) -> (&mut Combatant, &mut Combatant) {
        match actor {
            Side::Player => (&mut self.player, &mut self.opponent),
            Side::Opponent => (&mut self.opponent, &mut self.player),
        }
    }

    fn resolve(&mut self, side: Side, mv: Move) -> Result<TurnOutcome, BattleError> {
        let (actor, target) = self.sides_mut(side);

        if actor.energy < mv.energy_cost {
            let err = BattleError::InvalidMove {
                character: actor.name.clone(),
                move_name: mv.name.to_string(),
                energy: actor.energy,
                cost: mv.energy_cost,
            };
            let line = format!("{} doesn't have enough energy!", actor.name);
            self.log.push(line);
            metrics::MOVES_REJECTED_TOTAL.inc();
            tracing::debug!(side = side.label(), "{err}");
            return Err(err);
        }

        actor.energy -= mv.energy_cost;

        if mv.is_rest() {
            let before = actor.energy;
            actor.energy = (actor.energy + REST_ENERGY_GAIN).min(MAX_ENERGY);
            actor.is_defending = false;
            let line = format!(
                "{} rests and recovers energy (+{})",
                actor.name,
                actor.energy - before
            );
            return Ok(self.finish_half_turn(side, mv, line, 0));
        }

        if mv.is_defend() {
            actor.is_defending = true;
            let line = format!(
                "{} takes a defensive stance! (blocks {} damage)",
                actor.name, actor.defense_rating
            );
            return Ok(self.finish_half_turn(side, mv, line, 0));
        }

        let mut applied = mv.damage();
        if target.is_defending {
            applied = 0;
            target.is_defending = false;
            let line = format!("{} completely blocked the attack!", target.name);
            self.log.push(line);
        }

        let (actor, target) = self.sides_mut(side);
        target.health = (target.health - applied).max(0);
        actor.is_defending = false;
        let line = format!(
            "{} uses {}! (-{} energy, {} damage)",
            actor.name, mv.name, mv.energy_cost, applied
        );

        match side {
            Side::Player => self.damage_dealt += applied,
            Side::Opponent => self.damage_received += applied,
        }

        Ok(self.finish_half_turn(side, mv, line, applied))
    }

    fn finish_half_turn(&mut self, side: Side, mv: Move, line: String, applied: i32) -> TurnOutcome {
        self.log.push(line);
        if side == Side::Player {
            self.moves_used += 1;
        }
        metrics::MOVES_PLAYED_TOTAL
            .with_label_values(&[side.label()])
            .inc();
        tracing::debug!(
            side = side.label(),
            move_name = mv.name,
            damage = applied,
            player_health = self.player.health,
            opponent_health = self.opponent.health,
            "half-turn resolved"
        );

        if self.player.is_down() || self.opponent.is_down() {
            TurnOutcome::Finished(self.finalize())
        } else {
            self.next_turn = side.other();
            TurnOutcome::Continue
        }
    }

    fn finalize(&mut self) -> BattleOutcome {
        let player_won = self.opponent.is_down();
        let (winner, winning_side) = if player_won {
            (self.player.name.clone(), Side::Player)
        } else {
            (self.opponent.name.clone(), Side::Opponent)
        };

        let score = calculate_score(&ScoreInput {
            won: player_won,
            remaining_health: self.player.health,
            damage_dealt: self.damage_dealt,
            damage_received: self.damage_received,
            moves_used: self.moves_used,
        });

        self.state = BattleState::Over;
        self.log.push(format!("{winner} wins!"));
        self.log.push("-------------------");
        self.log.push(format!("Final score: {score} points"));
        self.log.push(format!("Damage dealt: {}", self.damage_dealt));
        self.log
            .push(format!("Damage received: {}", self.damage_received));

        let result_label = if player_won { "win" } else { "loss" };
        metrics::BATTLES_COMPLETED_TOTAL
            .with_label_values(&[result_label])
            .inc();
        if let Some(started) = self.started_at.take() {
            metrics::BATTLE_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        }
        tracing::info!(
            winner = %winner,
            score,
            damage_dealt = self.damage_dealt,
            damage_received = self.damage_received,
            moves_used = self.moves_used,
            "battle over"
        );

        let outcome = BattleOutcome {
            winner,
            winning_side,
            player_won,
            score,
            damage_dealt: self.damage_dealt,
            damage_received: self.damage_received,
            moves_used: self.moves_used,
            character_used: self.player.name.clone(),
        };
        self.outcome = Some(outcome.clone());
        outcome
    }
}
