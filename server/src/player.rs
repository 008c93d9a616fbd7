use soccer_shared::protocol::{Controls, PlayerWire, MAX_NAME_CHARS};
use soccer_shared::vec2::Vec2;

/// Name given to players who have not set one
pub const DEFAULT_NAME: &str = "unnamed";

/// Team membership, derived from id parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn from_id(id: u32) -> Self {
        if id % 2 == 0 {
            Team::Red
        } else {
            Team::Blue
        }
    }

    /// Index into the score pair
    pub fn index(self) -> usize {
        match self {
            Team::Red => 0,
            Team::Blue => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub team: Team,
    pub pos: Vec2,
    pub vel: Vec2,
    pub controls: Controls,
}

impl Player {
    pub fn new(id: u32, pos: Vec2) -> Self {
        Self {
            id,
            name: DEFAULT_NAME.to_string(),
            team: Team::from_id(id),
            pos,
            vel: Vec2::ZERO,
            controls: Controls::default(),
        }
    }

    pub fn set_name(&mut self, raw: &str) {
        self.name = sanitize_name(raw);
    }

    pub fn to_wire(&self) -> PlayerWire {
        PlayerWire {
            id: self.id,
            name: self.name.clone(),
            team: self.team.index() as u8,
            pos: self.pos,
            vel: self.vel,
            controls: self.controls,
        }
    }
}

/// Cut to the first `MAX_NAME_CHARS` characters, then trim. Empty falls back
/// to the default name.
pub fn sanitize_name(raw: &str) -> String {
    let capped: String = raw.chars().take(MAX_NAME_CHARS).collect();
    let trimmed = capped.trim();
    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
