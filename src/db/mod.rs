// Database access layer (SQLite via sqlx) backing `PlayerStorage`.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::storage::{
    normalize_email, normalize_profile_update, validate_new_player, NewPlayer, Note,
    PlayerRecord, PlayerStorage, ProfileUpdate, StorageError,
};

const PLAYER_COLUMNS: &str = "id, name, display_name, email, note, selected_character, score, games_played, wins, losses, created_at, updated_at";

/// The email pre-check can race a concurrent write; the UNIQUE index still
/// rejects the duplicate, and that must surface as a conflict.
fn email_conflict(e: sqlx::Error, message: &str) -> StorageError {
    let unique = e
        .as_database_error()
        .is_some_and(|d| d.is_unique_violation());
    if unique {
        StorageError::Conflict(message.to_string())
    } else {
        StorageError::Database(e)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PlayerRow {
    id: String,
    name: String,
    display_name: String,
    email: String,
    note: String,
    selected_character: Option<String>,
    score: i64,
    games_played: i64,
    wins: i64,
    losses: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PlayerRow> for PlayerRecord {
    type Error = StorageError;

    fn try_from(row: PlayerRow) -> Result<Self, Self::Error> {
        Ok(PlayerRecord {
            note: row.note.parse::<Note>()?,
            id: row.id,
            name: row.name,
            display_name: row.display_name,
            email: row.email,
            selected_character: row.selected_character,
            score: row.score,
            games_played: row.games_played,
            wins: row.wins,
            losses: row.losses,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<PlayerRow>) -> Result<Vec<PlayerRecord>, StorageError> {
    rows.into_iter().map(PlayerRecord::try_from).collect()
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // Every connection to `sqlite::memory:` opens its own empty database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                note TEXT NOT NULL DEFAULT 'sympa'
                    CHECK (note IN ('Pas-ouf', 'sympa', 'Trop-Top')),
                selected_character TEXT,
                score INTEGER NOT NULL DEFAULT 0,
                games_played INTEGER NOT NULL DEFAULT 0,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_players_score ON players (score DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_player(&self, id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PlayerRecord::try_from).transpose()
    }

    async fn email_taken(&self, email: &str, except_id: Option<&str>) -> Result<bool, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM players WHERE email = ? AND id != COALESCE(?, '')",
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

impl PlayerStorage for Database {
    async fn create(&self, player: NewPlayer) -> Result<String, StorageError> {
        validate_new_player(&player)?;
        let email = normalize_email(&player.email);

        if self.email_taken(&email, None).await? {
            return Err(StorageError::Conflict(
                "a player with this email already exists".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO players (id, name, display_name, email, note, selected_character, score, games_played, wins, losses) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(player.name.trim())
        .bind(player.display_name.trim())
        .bind(&email)
        .bind(player.note.as_str())
        .bind(&player.selected_character)
        .bind(player.score)
        .bind(player.games_played)
        .bind(player.wins)
        .bind(player.losses)
        .execute(&self.pool)
        .await
        .map_err(|e| email_conflict(e, "a player with this email already exists"))?;

        tracing::debug!(%id, %email, "player created");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<PlayerRecord>, StorageError> {
        self.fetch_player(id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<PlayerRecord>, StorageError> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE email = ?"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        row.map(PlayerRecord::try_from).transpose()
    }

    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<PlayerRecord, StorageError> {
        let update = normalize_profile_update(update)?;
        let email = update.email;
        if let Some(email) = &email {
            if self.email_taken(email, Some(id)).await? {
                return Err(StorageError::Conflict(
                    "another player already uses this email".to_string(),
                ));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE players SET
                name = COALESCE(?, name),
                display_name = COALESCE(?, display_name),
                email = COALESCE(?, email),
                note = COALESCE(?, note),
                selected_character = COALESCE(?, selected_character),
                updated_at = datetime('now')
            WHERE id = ?
        "#,
        )
        .bind(&update.name)
        .bind(&update.display_name)
        .bind(&email)
        .bind(update.note.map(Note::as_str))
        .bind(&update.selected_character)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| email_conflict(e, "another player already uses this email"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }

        self.fetch_player(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn update_score(
        &self,
        id: &str,
        won: bool,
        points: i64,
    ) -> Result<PlayerRecord, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE players SET
                games_played = games_played + 1,
                score = score + ?,
                wins = wins + ?,
                losses = losses + ?,
                updated_at = datetime('now')
            WHERE id = ?
        "#,
        )
        .bind(points)
        .bind(i64::from(won))
        .bind(i64::from(!won))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }

        self.fetch_player(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM players WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PlayerRecord>, StorageError> {
        let rows = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players ORDER BY score DESC, rowid"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_records(rows)
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerRecord>, StorageError> {
        let rows = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players ORDER BY score DESC, rowid LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        into_records(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    fn player(email: &str) -> NewPlayer {
        NewPlayer {
            name: "Alice".into(),
            display_name: "ali".into(),
            email: email.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get_player() {
        let db = test_db().await;

        let id = db.create(player("Alice@Example.com")).await.unwrap();
        let fetched = db.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.note, Note::Sympa);
        assert_eq!(fetched.score, 0);

        let by_email = db.get_by_email("ALICE@example.com ").await.unwrap();
        assert_eq!(by_email.unwrap().id, id);

        assert!(db.get("missing").await.unwrap().is_none());
        assert!(db.get_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_validation_and_conflict() {
        let db = test_db().await;

        let err = db.create(player("")).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        db.create(player("alice@example.com")).await.unwrap();
        let err = db.create(player("ALICE@example.com")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let db = test_db().await;
        let id = db.create(player("alice@example.com")).await.unwrap();
        let other = db.create(player("bob@example.com")).await.unwrap();

        let updated = db
            .update_profile(
                &id,
                ProfileUpdate {
                    name: Some("Alicia".into()),
                    note: Some(Note::PasOuf),
                    selected_character: Some("Bot-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.display_name, "ali");
        assert_eq!(updated.note, Note::PasOuf);
        assert_eq!(updated.selected_character.as_deref(), Some("Bot-1"));

        let err = db
            .update_profile(
                &other,
                ProfileUpdate {
                    email: Some("alice@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        // Re-saving a player's own email is not a conflict.
        db.update_profile(
            &id,
            ProfileUpdate {
                email: Some("Alice@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = db
            .update_profile("missing", ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_profile_rejects_blank_names() {
        let db = test_db().await;
        let id = db.create(player("alice@example.com")).await.unwrap();

        let err = db
            .update_profile(
                &id,
                ProfileUpdate {
                    name: Some("   ".into()),
                    display_name: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        let stored = db.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Alice");
        assert_eq!(stored.display_name, "ali");

        let updated = db
            .update_profile(
                &id,
                ProfileUpdate {
                    display_name: Some("  ali2  ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name, "ali2");
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_conflict() {
        let db = test_db().await;
        db.create(player("alice@example.com")).await.unwrap();

        // Write the duplicate directly, as a racing writer would.
        let err = sqlx::query(
            "INSERT INTO players (id, name, display_name, email, note) VALUES ('dup', 'A', 'a', 'alice@example.com', 'sympa')",
        )
        .execute(&db.pool)
        .await
        .unwrap_err();
        assert!(matches!(
            email_conflict(err, "taken"),
            StorageError::Conflict(msg) if msg == "taken"
        ));

        let err = sqlx::query("SELECT * FROM no_such_table")
            .execute(&db.pool)
            .await
            .unwrap_err();
        assert!(matches!(email_conflict(err, "taken"), StorageError::Database(_)));
    }

    #[tokio::test]
    async fn test_update_score() {
        let db = test_db().await;
        let id = db.create(player("alice@example.com")).await.unwrap();

        db.update_score(&id, true, 185).await.unwrap();
        let p = db.update_score(&id, false, 20).await.unwrap();
        assert_eq!(p.games_played, 2);
        assert_eq!(p.wins, 1);
        assert_eq!(p.losses, 1);
        assert_eq!(p.score, 205);

        let err = db.update_score("missing", true, 1).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_player() {
        let db = test_db().await;
        let id = db.create(player("alice@example.com")).await.unwrap();
        db.delete(&id).await.unwrap();
        assert!(db.get(&id).await.unwrap().is_none());
        assert!(matches!(
            db.delete(&id).await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_list_and_leaderboard() {
        let db = test_db().await;
        for (i, score) in [40, 400, 4].into_iter().enumerate() {
            db.create(NewPlayer {
                score,
                ..player(&format!("p{i}@example.com"))
            })
            .await
            .unwrap();
        }

        let all = db.list().await.unwrap();
        let scores: Vec<i64> = all.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![400, 40, 4]);

        let top = db.leaderboard(1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].email, "p1@example.com");
    }
}
