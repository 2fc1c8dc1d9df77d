use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::piece::Side;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> PlayerId {
        PlayerId(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        PlayerId::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A participant in a match. Everyone joins as a spectator; taking a seat
/// makes them a player for that side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub side: Option<Side>,
    pub ready: bool,
    pub connected: bool,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Player {
        Player {
            id: PlayerId::new(),
            name: name.into(),
            side: None,
            ready: false,
            connected: true,
        }
    }

    pub fn is_spectator(&self) -> bool {
        self.side.is_none()
    }
}
