// Player storage contract and an in-memory implementation.
//
// The arena only needs create/read/update; delete, list and leaderboard round
// out the collaborator's surface for the binary and the admin use cases.

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Free-text opinion collected by the registration form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Note {
    #[serde(rename = "Pas-ouf")]
    PasOuf,
    #[default]
    #[serde(rename = "sympa")]
    Sympa,
    #[serde(rename = "Trop-Top")]
    TropTop,
}

impl Note {
    pub fn as_str(self) -> &'static str {
        match self {
            Note::PasOuf => "Pas-ouf",
            Note::Sympa => "sympa",
            Note::TropTop => "Trop-Top",
        }
    }
}

impl FromStr for Note {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pas-ouf" => Ok(Note::PasOuf),
            "sympa" => Ok(Note::Sympa),
            "Trop-Top" => Ok(Note::TropTop),
            other => Err(StorageError::Validation(format!(
                "note must be one of Pas-ouf, sympa, Trop-Top (got {other})"
            ))),
        }
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: String,
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "username")]
    pub display_name: String,
    pub email: String,
    #[serde(rename = "avis")]
    pub note: Note,
    pub selected_character: Option<String>,
    pub score: i64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for creating a player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPlayer {
    pub name: String,
    pub display_name: String,
    pub email: String,
    pub note: Note,
    pub selected_character: Option<String>,
    pub score: i64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
}

/// Partial profile update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub note: Option<Note>,
    pub selected_character: Option<String>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("player not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("player storage unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Leaderboard size when the caller does not pick one.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Operations the arena needs from player storage.
#[allow(async_fn_in_trait)]
pub trait PlayerStorage {
    /// Create a player and return its id.
    async fn create(&self, player: NewPlayer) -> Result<String, StorageError>;
    async fn get(&self, id: &str) -> Result<Option<PlayerRecord>, StorageError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<PlayerRecord>, StorageError>;
    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<PlayerRecord, StorageError>;
    /// Record one finished game: bumps games played, wins or losses, and adds
    /// `points` to the running score.
    async fn update_score(
        &self,
        id: &str,
        won: bool,
        points: i64,
    ) -> Result<PlayerRecord, StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
    /// All players, best score first.
    async fn list(&self) -> Result<Vec<PlayerRecord>, StorageError>;
    /// Top `limit` players by score.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerRecord>, StorageError>;
}

/// Trim and lower-case an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Reject payloads missing a name, display name or email.
pub fn validate_new_player(player: &NewPlayer) -> Result<(), StorageError> {
    if player.name.trim().is_empty()
        || player.display_name.trim().is_empty()
        || player.email.trim().is_empty()
    {
        return Err(StorageError::Validation(
            "name, display name and email are required".to_string(),
        ));
    }
    Ok(())
}

/// Trim the fields of a profile update and reject any that were blanked out.
pub fn normalize_profile_update(mut update: ProfileUpdate) -> Result<ProfileUpdate, StorageError> {
    for (field, label) in [
        (&mut update.name, "name"),
        (&mut update.display_name, "display name"),
    ] {
        if let Some(value) = field {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                return Err(StorageError::Validation(format!("{label} cannot be blank")));
            }
            *value = trimmed;
        }
    }
    if let Some(email) = &mut update.email {
        *email = normalize_email(email);
        if email.is_empty() {
            return Err(StorageError::Validation("email cannot be blank".to_string()));
        }
    }
    Ok(update)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// In-memory player storage, insertion ordered.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    players: Mutex<Vec<PlayerRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn players(&self) -> MutexGuard<'_, Vec<PlayerRecord>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.players().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players().is_empty()
    }
}

impl PlayerStorage for MemoryStorage {
    async fn create(&self, player: NewPlayer) -> Result<String, StorageError> {
        validate_new_player(&player)?;
        let email = normalize_email(&player.email);
        let mut players = self.players();

        if players.iter().any(|p| p.email == email) {
            return Err(StorageError::Conflict(
                "a player with this email already exists".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let ts = now();
        players.push(PlayerRecord {
            id: id.clone(),
            name: player.name.trim().to_string(),
            display_name: player.display_name.trim().to_string(),
            email,
            note: player.note,
            selected_character: player.selected_character,
            score: player.score,
            games_played: player.games_played,
            wins: player.wins,
            losses: player.losses,
            created_at: ts.clone(),
            updated_at: ts,
        });
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        Ok(self.players().iter().find(|p| p.id == id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<PlayerRecord>, StorageError> {
        let email = normalize_email(email);
        Ok(self.players().iter().find(|p| p.email == email).cloned())
    }

    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<PlayerRecord, StorageError> {
        let update = normalize_profile_update(update)?;
        let mut players = self.players();

        let email = update.email;
        if let Some(email) = &email {
            if players.iter().any(|p| p.id != id && &p.email == email) {
                return Err(StorageError::Conflict(
                    "another player already uses this email".to_string(),
                ));
            }
        }

        let player = players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if let Some(name) = update.name {
            player.name = name;
        }
        if let Some(display_name) = update.display_name {
            player.display_name = display_name;
        }
        if let Some(email) = email {
            player.email = email;
        }
        if let Some(note) = update.note {
            player.note = note;
        }
        if let Some(character) = update.selected_character {
            player.selected_character = Some(character);
        }
        player.updated_at = now();
        Ok(player.clone())
    }

    async fn update_score(
        &self,
        id: &str,
        won: bool,
        points: i64,
    ) -> Result<PlayerRecord, StorageError> {
        let mut players = self.players();
        let player = players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        player.games_played += 1;
        player.score += points;
        if won {
            player.wins += 1;
        } else {
            player.losses += 1;
        }
        player.updated_at = now();
        Ok(player.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let mut players = self.players();
        let before = players.len();
        players.retain(|p| p.id != id);
        if players.len() == before {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PlayerRecord>, StorageError> {
        let mut players = self.players().clone();
        // Stable sort keeps insertion order between equal scores.
        players.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(players)
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerRecord>, StorageError> {
        let mut players = self.list().await?;
        players.truncate(limit);
        Ok(players)
    }
}
