// Battle rules across the whole roster, driven by seeded opponents on both
// sides.

use botfight_arena::engine::battle::{Battle, BattleError, BattleState, Side, TurnOutcome};
use botfight_arena::engine::catalog::{self, CharacterDef};
use botfight_arena::engine::config::{BATTLE_LOG_CAPACITY, MAX_ENERGY};
use botfight_arena::engine::opponent::{RandomSource, ScriptedRandom, SeededRandom};
use botfight_arena::engine::score::{calculate_score, ScoreInput};

fn base(name: &str) -> &'static CharacterDef {
    catalog::get_character(name).unwrap()
}

fn check_invariants(battle: &Battle) {
    for c in [battle.player(), battle.opponent()] {
        assert!(c.health >= 0 && c.health <= base(&c.name).base_health, "{c:?}");
        assert!(c.energy >= 0 && c.energy <= MAX_ENERGY, "{c:?}");
    }
    let someone_down = battle.player().is_down() || battle.opponent().is_down();
    assert_eq!(battle.is_over(), someone_down);
    assert!(battle.log().len() <= BATTLE_LOG_CAPACITY);
}

/// Play a battle to the end with random moves for the player.
fn play_random(player: &str, opponent: &str, seed: u64) {
    let mut battle = Battle::new(player, opponent).unwrap();
    let mut opponent_rng = SeededRandom::new(Some(seed));
    let mut player_rng = SeededRandom::new(Some(seed.wrapping_mul(31).wrapping_add(7)));
    battle.start().unwrap();

    for _ in 0..1000 {
        let outcome = match battle.next_turn() {
            Side::Opponent => battle.opponent_turn(&mut opponent_rng).unwrap(),
            Side::Player => {
                let moves = battle.player_moves();
                let mv = moves[player_rng.pick(moves.len())];
                match battle.perform_move(mv.name) {
                    Ok(o) => o,
                    Err(BattleError::InvalidMove { .. }) => TurnOutcome::Continue,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        };
        check_invariants(&battle);

        if let TurnOutcome::Finished(o) = outcome {
            let (winner, loser) = match o.winning_side {
                Side::Player => (battle.player(), battle.opponent()),
                Side::Opponent => (battle.opponent(), battle.player()),
            };
            assert_eq!(loser.health, 0);
            assert!(!winner.is_down());
            assert_eq!(o.player_won, o.winning_side == Side::Player);
            assert_eq!(battle.winner(), Some(winner.name.as_str()));
            assert_eq!(o.character_used, player);

            let expected = calculate_score(&ScoreInput {
                won: o.player_won,
                remaining_health: battle.player().health,
                damage_dealt: o.damage_dealt,
                damage_received: o.damage_received,
                moves_used: o.moves_used,
            });
            assert_eq!(o.score, expected);
            assert!(battle.log().contains(&format!("Final score: {} points", o.score)));

            // Nothing moves once the battle is over.
            assert_eq!(battle.perform_move("Rest"), Err(BattleError::NotInProgress));
            return;
        }
    }
    panic!("{player} vs {opponent} (seed {seed}) did not finish");
}

#[test]
fn test_every_pairing_finishes_within_rules() {
    let names: Vec<&str> = catalog::characters().iter().map(|c| c.name).collect();
    for player in &names {
        for opponent in &names {
            for seed in 0..25 {
                play_random(player, opponent, seed);
            }
        }
    }
}

#[test]
fn test_defend_blocks_one_attack_only() {
    let mut battle = Battle::new("Bot-1", "Bot-2").unwrap();
    // Opponent: rest, defend, then attack.
    let mut rng = ScriptedRandom::new(&[0.9, 0.0, 0.9], &[]);
    battle.start().unwrap();
    battle.opponent_turn(&mut rng).unwrap();

    battle.perform_move("Defend").unwrap();
    battle.opponent_turn(&mut rng).unwrap();
    assert!(battle.opponent().is_defending);

    // Second Defend in a row: still a single block.
    battle.perform_move("Defend").unwrap();
    battle.opponent_turn(&mut rng).unwrap();
    assert_eq!(battle.player().health, 100);
    assert!(!battle.player().is_defending);
    assert!(battle.log().contains("Bot-1 completely blocked the attack!"));

    // The opponent needs two rests before it can punch again; that one lands.
    for _ in 0..3 {
        battle.perform_move("Rest").unwrap();
        battle.opponent_turn(&mut rng).unwrap();
    }
    assert_eq!(battle.player().health, 70);
    assert_eq!(battle.damage_received(), 30);
}

#[test]
fn test_rest_at_full_energy_stays_capped() {
    let mut battle = Battle::new("Bot-1", "Bot-2").unwrap();
    let mut rng = ScriptedRandom::aggressive();
    battle.start().unwrap();
    battle.opponent_turn(&mut rng).unwrap();

    battle.perform_move("Rest").unwrap();
    assert_eq!(battle.player().energy, MAX_ENERGY);
    assert!(battle.log().contains("Bot-1 rests and recovers energy (+0)"));
    assert_eq!(battle.moves_used(), 1);
}

#[test]
fn test_turn_order_enforced() {
    let mut battle = Battle::new("Bot-2", "Bot-1").unwrap();
    let mut rng = ScriptedRandom::aggressive();
    battle.start().unwrap();
    assert_eq!(battle.state(), BattleState::InProgress);

    assert_eq!(
        battle.perform_move("Rest"),
        Err(BattleError::OutOfTurn(Side::Player))
    );
    battle.opponent_turn(&mut rng).unwrap();
    assert!(matches!(
        battle.opponent_turn(&mut rng),
        Err(BattleError::OutOfTurn(Side::Opponent))
    ));
}
