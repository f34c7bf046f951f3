// Pending player records and their reconciliation with player storage.
//
// The registration step produces an owned `PendingPlayerRecord`; the bridge
// holds it for the lifetime of one battle and merges the outcome into
// storage exactly once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::battle::BattleOutcome;
use crate::metrics;
use crate::storage::{NewPlayer, Note, PlayerStorage, ProfileUpdate, StorageError};

/// Session key holding the JSON-encoded pending record.
pub const PLAYER_DATA_KEY: &str = "playerData";
/// Session key holding the stored id of a returning player.
pub const EXISTING_PLAYER_ID_KEY: &str = "existingPlayerId";

/// Profile captured before a battle, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlayerRecord {
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "username")]
    pub display_name: String,
    pub email: String,
    #[serde(rename = "avis", default)]
    pub note: Note,
    #[serde(rename = "isExisting", default)]
    pub is_existing: bool,
    /// Stored under its own session key, never inside `playerData`.
    #[serde(skip)]
    pub existing_id: Option<String>,
}

impl PendingPlayerRecord {
    pub fn new_player(name: &str, display_name: &str, email: &str, note: Note) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            note,
            is_existing: false,
            existing_id: None,
        }
    }

    pub fn returning_player(
        name: &str,
        display_name: &str,
        email: &str,
        note: Note,
        existing_id: &str,
    ) -> Self {
        Self {
            is_existing: true,
            existing_id: Some(existing_id.to_string()),
            ..Self::new_player(name, display_name, email, note)
        }
    }
}

/// Key-value scope with session lifetime, for handing a pending record across
/// a page boundary.
#[derive(Debug, Clone, Default)]
pub struct SessionScope {
    values: HashMap<String, String>,
}

impl SessionScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn has_pending(&self) -> bool {
        self.values.contains_key(PLAYER_DATA_KEY)
    }

    /// Store `record` under `playerData`, and its id under `existingPlayerId`
    /// for a returning player.
    pub fn store_pending(&mut self, record: &PendingPlayerRecord) -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(record)?;
        self.set(PLAYER_DATA_KEY, json);
        match (&record.existing_id, record.is_existing) {
            (Some(id), true) => self.set(EXISTING_PLAYER_ID_KEY, id.clone()),
            _ => {
                self.remove(EXISTING_PLAYER_ID_KEY);
            }
        }
        Ok(())
    }

    /// Read the pending record without clearing it.
    pub fn load_pending(&self) -> Result<Option<PendingPlayerRecord>, serde_json::Error> {
        let Some(json) = self.get(PLAYER_DATA_KEY) else {
            return Ok(None);
        };
        let mut record: PendingPlayerRecord = serde_json::from_str(json)?;
        if record.is_existing {
            record.existing_id = self.get(EXISTING_PLAYER_ID_KEY).map(str::to_string);
        }
        Ok(Some(record))
    }

    /// Read the pending record and clear both session keys.
    pub fn take_pending(&mut self) -> Result<Option<PendingPlayerRecord>, serde_json::Error> {
        let record = self.load_pending()?;
        self.clear_pending();
        Ok(record)
    }

    pub fn clear_pending(&mut self) {
        self.remove(PLAYER_DATA_KEY);
        self.remove(EXISTING_PLAYER_ID_KEY);
    }
}

/// What a finished battle contributes to the player's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    pub won: bool,
    pub score_earned: i32,
    pub character_used: String,
}

impl From<&BattleOutcome> for GameResult {
    fn from(outcome: &BattleOutcome) -> Self {
        Self {
            won: outcome.player_won,
            score_earned: outcome.score,
            character_used: outcome.character_used.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created { id: String },
    Updated { id: String },
}

impl ReconcileOutcome {
    pub fn id(&self) -> &str {
        match self {
            ReconcileOutcome::Created { id } | ReconcileOutcome::Updated { id } => id,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no player data found, fill in the registration form first")]
    MissingRecord,
    #[error("returning player has no stored id")]
    MissingExistingId,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Holds the pending record for one battle and merges the battle's result
/// into player storage.
pub struct SessionRecordBridge<S> {
    storage: S,
    pending: Option<PendingPlayerRecord>,
}

impl<S: PlayerStorage> SessionRecordBridge<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            pending: None,
        }
    }

    pub fn with_pending(storage: S, record: PendingPlayerRecord) -> Self {
        let mut bridge = Self::new(storage);
        bridge.set_pending(record);
        bridge
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give the storage back, dropping any unsaved record.
    pub fn into_storage(mut self) -> S {
        self.discard_pending_record();
        self.storage
    }

    /// Replace the pending record.
    pub fn set_pending(&mut self, record: PendingPlayerRecord) {
        if self.pending.is_none() {
            metrics::PENDING_RECORDS.inc();
        }
        self.pending = Some(record);
    }

    pub fn has_pending_record(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_record(&self) -> Option<&PendingPlayerRecord> {
        self.pending.as_ref()
    }

    /// Drop the pending record, e.g. when the player abandons the battle.
    pub fn discard_pending_record(&mut self) -> Option<PendingPlayerRecord> {
        let record = self.pending.take();
        if record.is_some() {
            metrics::PENDING_RECORDS.dec();
            tracing::debug!("pending player record discarded");
        }
        record
    }

    /// Merge a finished game into storage: update a returning player or create
    /// a new one. The pending record is consumed on success and kept on failure.
    pub async fn reconcile(&mut self, result: &GameResult) -> Result<ReconcileOutcome, ReconcileError> {
        let pending = self.pending.as_ref().ok_or(ReconcileError::MissingRecord)?;

        let persisted = self.persist(pending, result).await;
        match persisted {
            Ok(outcome) => {
                let label = match outcome {
                    ReconcileOutcome::Created { .. } => "created",
                    ReconcileOutcome::Updated { .. } => "updated",
                };
                metrics::RECONCILIATIONS_TOTAL.with_label_values(&[label]).inc();
                tracing::info!(
                    id = outcome.id(),
                    won = result.won,
                    score = result.score_earned,
                    "game result saved ({label})"
                );
                self.discard_pending_record();
                Ok(outcome)
            }
            Err(e) => {
                metrics::RECONCILIATIONS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!("failed to save game result: {e}");
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        pending: &PendingPlayerRecord,
        result: &GameResult,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let points = i64::from(result.score_earned);

        if pending.is_existing {
            let id = pending
                .existing_id
                .clone()
                .ok_or(ReconcileError::MissingExistingId)?;

            self.storage
                .update_profile(
                    &id,
                    ProfileUpdate {
                        name: Some(pending.name.clone()),
                        display_name: Some(pending.display_name.clone()),
                        note: Some(pending.note),
                        selected_character: Some(result.character_used.clone()),
                        email: None,
                    },
                )
                .await?;
            self.storage.update_score(&id, result.won, points).await?;
            return Ok(ReconcileOutcome::Updated { id });
        }

        let id = self
            .storage
            .create(NewPlayer {
                name: pending.name.clone(),
                display_name: pending.display_name.clone(),
                email: pending.email.clone(),
                note: pending.note,
                selected_character: Some(result.character_used.clone()),
                score: points,
                games_played: 1,
                wins: i64::from(result.won),
                losses: i64::from(!result.won),
            })
            .await?;
        Ok(ReconcileOutcome::Created { id })
    }
}
