// Static character roster and move tables.

use super::config::*;

/// A move a combatant can play. Shared by every battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub name: &'static str,
    pub energy_cost: i32,
    /// `None` for non-damaging moves.
    pub damage: Option<i32>,
    pub description: &'static str,
}

impl Move {
    /// Damage dealt when unblocked (0 for utility moves).
    pub fn damage(&self) -> i32 {
        self.damage.unwrap_or(0)
    }

    pub fn is_damaging(&self) -> bool {
        self.damage() > 0
    }

    pub fn is_rest(&self) -> bool {
        self.name == REST_MOVE
    }

    pub fn is_defend(&self) -> bool {
        self.name == DEFEND_MOVE
    }
}

/// Base stats and signature moves of a playable character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterDef {
    pub name: &'static str,
    pub base_health: i32,
    pub base_energy: i32,
    /// Narrated only; Defend is a full block regardless of this value.
    pub defense_rating: i32,
    pub moves: &'static [Move],
    pub art: &'static str,
}

pub const DEFEND: Move = Move {
    name: DEFEND_MOVE,
    energy_cost: DEFEND_COST,
    damage: None,
    description: "Takes a defensive stance",
};

pub const REST: Move = Move {
    name: REST_MOVE,
    energy_cost: REST_COST,
    damage: Some(0),
    description: "Recovers 5 energy",
};

/// Moves every character can play, in display order.
pub const UNIVERSAL_MOVES: [Move; 2] = [DEFEND, REST];

const QUAD_PUNCH: Move = Move {
    name: "QuadPunch",
    energy_cost: 3,
    damage: Some(20),
    description: "Bot-1's quick punch",
};

const CROSS_PUNCH: Move = Move {
    name: "Cross Punch",
    energy_cost: 7,
    damage: Some(30),
    description: "Bot-2's heavy punch",
};

const CHARACTERS: [CharacterDef; 2] = [
    CharacterDef {
        name: "Bot-1",
        base_health: 100,
        base_energy: 10,
        defense_rating: 40,
        moves: &[QUAD_PUNCH],
        art: "assets/images/Posing__Tower.webp",
    },
    CharacterDef {
        name: "Bot-2",
        base_health: 100,
        base_energy: 5,
        defense_rating: 20,
        moves: &[CROSS_PUNCH],
        art: "assets/images/Posing_Pion.webp",
    },
];

/// The full roster.
pub fn characters() -> &'static [CharacterDef] {
    &CHARACTERS
}

pub fn get_character(name: &str) -> Option<&'static CharacterDef> {
    CHARACTERS.iter().find(|c| c.name == name)
}

/// Signature moves first, then Defend and Rest.
/// Unknown names only get the universal moves.
pub fn moves_for(name: &str) -> Vec<Move> {
    let specific = get_character(name).map(|c| c.moves).unwrap_or(&[]);
    specific
        .iter()
        .copied()
        .chain(UNIVERSAL_MOVES.iter().copied())
        .collect()
}

/// Look up one of a character's moves by name.
pub fn find_move(character: &str, move_name: &str) -> Option<Move> {
    moves_for(character)
        .into_iter()
        .find(|m| m.name == move_name)
}
