// Arena: drives one battle round by round and saves the result when it ends.

use std::time::Duration;

use thiserror::Error;

use crate::engine::battle::{Battle, BattleError, BattleOutcome, TurnOutcome};
use crate::engine::opponent::RandomSource;
use crate::session::{GameResult, ReconcileError, ReconcileOutcome, SessionRecordBridge};
use crate::storage::PlayerStorage;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error(transparent)]
    Battle(#[from] BattleError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Result of a player action, including the opponent's reply.
#[derive(Debug)]
pub enum RoundResult {
    Continue,
    /// The battle ended; `save` is the outcome of persisting it.
    Finished {
        outcome: BattleOutcome,
        save: Result<ReconcileOutcome, ReconcileError>,
    },
}

impl RoundResult {
    pub fn is_finished(&self) -> bool {
        matches!(self, RoundResult::Finished { .. })
    }
}

pub struct Arena<S> {
    battle: Battle,
    bridge: SessionRecordBridge<S>,
    rng: Box<dyn RandomSource>,
    opponent_delay: Duration,
}

impl<S: PlayerStorage> Arena<S> {
    pub fn new(
        battle: Battle,
        bridge: SessionRecordBridge<S>,
        rng: Box<dyn RandomSource>,
        opponent_delay: Duration,
    ) -> Self {
        Self {
            battle,
            bridge,
            rng,
            opponent_delay,
        }
    }

    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    pub fn bridge(&self) -> &SessionRecordBridge<S> {
        &self.bridge
    }

    pub fn into_storage(self) -> S {
        self.bridge.into_storage()
    }

    /// Refuse to open without a pending player record.
    pub fn open(&self) -> Result<(), ArenaError> {
        if !self.bridge.has_pending_record() {
            return Err(ReconcileError::MissingRecord.into());
        }
        Ok(())
    }

    /// Start the battle and play the opponent's opening half-turn.
    pub async fn start(&mut self) -> Result<RoundResult, ArenaError> {
        self.open()?;
        self.battle.start()?;
        self.opponent_reply().await
    }

    /// Play the player's move, then the opponent's reply if the battle goes on.
    pub async fn player_move(&mut self, move_name: &str) -> Result<RoundResult, ArenaError> {
        match self.battle.perform_move(move_name)? {
            TurnOutcome::Finished(outcome) => Ok(self.settle(outcome).await),
            TurnOutcome::Continue => self.opponent_reply().await,
        }
    }

    /// Try saving a finished battle again after a storage failure.
    pub async fn retry_save(&mut self) -> Result<ReconcileOutcome, ArenaError> {
        let outcome = self
            .battle
            .outcome()
            .cloned()
            .ok_or(BattleError::NotInProgress)?;
        let saved = self.bridge.reconcile(&GameResult::from(&outcome)).await;
        self.log_save(&saved);
        Ok(saved?)
    }

    /// Leave the arena. A battle in progress forfeits its pending record.
    /// Returns whether the record was discarded.
    pub fn abandon(&mut self) -> bool {
        if self.battle.is_started() && !self.battle.is_over() {
            tracing::info!("battle abandoned, results will not be saved");
            return self.bridge.discard_pending_record().is_some();
        }
        false
    }

    /// Back to a fresh, unstarted battle with the same characters.
    pub fn reset(&mut self) {
        self.battle.reset();
    }

    async fn opponent_reply(&mut self) -> Result<RoundResult, ArenaError> {
        if !self.opponent_delay.is_zero() {
            tokio::time::sleep(self.opponent_delay).await;
        }
        match self.battle.opponent_turn(self.rng.as_mut())? {
            TurnOutcome::Finished(outcome) => Ok(self.settle(outcome).await),
            TurnOutcome::Continue => Ok(RoundResult::Continue),
        }
    }

    async fn settle(&mut self, outcome: BattleOutcome) -> RoundResult {
        let save = self.bridge.reconcile(&GameResult::from(&outcome)).await;
        self.log_save(&save);
        RoundResult::Finished { outcome, save }
    }

    fn log_save(&mut self, save: &Result<ReconcileOutcome, ReconcileError>) {
        match save {
            Ok(_) => self.battle.push_log("Results saved!"),
            Err(e) => self
                .battle
                .push_log(format!("Error while saving results: {e}")),
        }
    }
}
