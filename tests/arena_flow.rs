// End-to-end battles against SQLite player storage: registration, the
// session handoff, the battle itself and reconciliation of the result.

use std::time::Duration;

use botfight_arena::arena::{Arena, ArenaError, RoundResult};
use botfight_arena::db::Database;
use botfight_arena::engine::battle::{Battle, BattleOutcome, BattleState};
use botfight_arena::engine::opponent::SeededRandom;
use botfight_arena::registration::{register, RegistrationForm};
use botfight_arena::session::{
    ReconcileError, ReconcileOutcome, SessionRecordBridge, SessionScope, PLAYER_DATA_KEY,
};
use botfight_arena::storage::{MemoryStorage, Note, PlayerStorage};

async fn memory_db() -> Database {
    Database::new("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database")
}

fn form(display_name: &str, email: &str, note: Note) -> RegistrationForm {
    RegistrationForm {
        name: "Alice".into(),
        display_name: display_name.into(),
        email: email.into(),
        note,
    }
}

/// Register through the session scope, the way the binary hands the record
/// from the form to the arena.
async fn open_arena<S: PlayerStorage>(storage: S, form: &RegistrationForm, seed: u64) -> Arena<S> {
    let pending = register(form, &storage).await.unwrap();

    let mut session = SessionScope::new();
    session.store_pending(&pending).unwrap();
    assert!(session.get(PLAYER_DATA_KEY).is_some());

    let mut bridge = SessionRecordBridge::new(storage);
    bridge.set_pending(session.take_pending().unwrap().unwrap());
    assert!(!session.has_pending());

    let battle = Battle::new("Bot-1", "Bot-2").unwrap();
    let arena = Arena::new(
        battle,
        bridge,
        Box::new(SeededRandom::new(Some(seed))),
        Duration::ZERO,
    );
    arena.open().unwrap();
    arena
}

/// Greedy player: hardest affordable hit, otherwise rest.
async fn play_out<S: PlayerStorage>(
    arena: &mut Arena<S>,
) -> (BattleOutcome, Result<ReconcileOutcome, ReconcileError>) {
    let mut round = arena.start().await.unwrap();
    for _ in 0..200 {
        if let RoundResult::Finished { outcome, save } = round {
            return (outcome, save);
        }
        let battle = arena.battle();
        let name = battle
            .player_moves()
            .into_iter()
            .filter(|m| m.is_damaging() && battle.can_use(m))
            .max_by_key(|m| m.damage())
            .map(|m| m.name)
            .unwrap_or("Rest");
        round = arena.player_move(name).await.unwrap();
    }
    panic!("battle did not finish");
}

#[tokio::test]
async fn test_first_battle_creates_player() {
    let db = memory_db().await;
    let mut arena = open_arena(db, &form("ali", "alice@example.com", Note::TropTop), 1).await;

    let (outcome, save) = play_out(&mut arena).await;
    let saved = save.unwrap();
    assert!(matches!(saved, ReconcileOutcome::Created { .. }));
    assert!(arena.battle().log().contains("Results saved!"));
    assert!(!arena.bridge().has_pending_record());

    let storage = arena.bridge().storage();
    let player = storage.get(saved.id()).await.unwrap().unwrap();
    assert_eq!(player.display_name, "ali");
    assert_eq!(player.note, Note::TropTop);
    assert_eq!(player.selected_character.as_deref(), Some("Bot-1"));
    assert_eq!(player.games_played, 1);
    assert_eq!(player.score, i64::from(outcome.score));
    assert_eq!(player.wins + player.losses, 1);
    assert_eq!(player.wins == 1, outcome.player_won);

    let board = storage.leaderboard(10).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].id, saved.id());
}

#[tokio::test]
async fn test_returning_player_accumulates() {
    let db = memory_db().await;
    let mut first = open_arena(db, &form("ali", "alice@example.com", Note::Sympa), 2).await;
    let (first_outcome, save) = play_out(&mut first).await;
    let id = save.unwrap().id().to_string();

    // Same email, different case and a new display name.
    let db = first.into_storage();
    let mut second = open_arena(db, &form("alice2", "Alice@Example.com", Note::PasOuf), 3).await;
    let pending = second.bridge().pending_record().unwrap();
    assert!(pending.is_existing);
    assert_eq!(pending.existing_id.as_deref(), Some(id.as_str()));

    let (second_outcome, save) = play_out(&mut second).await;
    assert_eq!(save.unwrap(), ReconcileOutcome::Updated { id: id.clone() });

    let storage = second.bridge().storage();
    assert_eq!(storage.list().await.unwrap().len(), 1);
    let player = storage.get(&id).await.unwrap().unwrap();
    assert_eq!(player.display_name, "alice2");
    assert_eq!(player.note, Note::PasOuf);
    assert_eq!(player.email, "alice@example.com");
    assert_eq!(player.games_played, 2);
    assert_eq!(
        player.score,
        i64::from(first_outcome.score) + i64::from(second_outcome.score)
    );
    assert_eq!(player.wins + player.losses, 2);
}

#[tokio::test]
async fn test_abandoned_battle_saves_nothing() {
    let db = memory_db().await;
    let mut arena = open_arena(db, &form("ali", "alice@example.com", Note::Sympa), 4).await;
    arena.start().await.unwrap();
    arena.player_move("QuadPunch").await.unwrap();

    assert!(arena.abandon());
    assert!(!arena.bridge().has_pending_record());
    assert!(arena.bridge().storage().list().await.unwrap().is_empty());

    // Without a record the arena refuses to start again.
    arena.reset();
    assert!(matches!(
        arena.start().await.unwrap_err(),
        ArenaError::Reconcile(ReconcileError::MissingRecord)
    ));
    assert_eq!(arena.battle().state(), BattleState::NotStarted);
}

#[tokio::test]
async fn test_same_seed_replays_same_battle() {
    let mut logs = Vec::new();
    for _ in 0..2 {
        let storage = MemoryStorage::new();
        let mut arena = open_arena(storage, &form("ali", "alice@example.com", Note::Sympa), 42).await;
        let (outcome, _) = play_out(&mut arena).await;
        let lines: Vec<String> = arena.battle().log().lines().map(str::to_string).collect();
        logs.push((outcome, lines));
    }
    assert_eq!(logs[0], logs[1]);
}
