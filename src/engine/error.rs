use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single intent was turned away. All of these are local to the
/// offending intent; none of them end the match.
#[derive(Error, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveError {
    #[error("piece is on cooldown for another {remaining_ms}ms")]
    CooldownActive { remaining_ms: u64 },
    #[error("move rate limit reached for this window")]
    RateLimited,
    #[error("piece does not belong to the submitting player")]
    NotOwner,
    #[error("destination is not reachable for this piece")]
    IllegalPattern,
    #[error("destination or path is blocked")]
    Blocked,
    #[error("intent no longer matches the resolved board")]
    Stale,
    #[error("settings cannot be changed by this player now")]
    InvalidSettings,
}

/// Failures of lobby-phase operations (joining, seating, readying,
/// surrendering). Distinct from intent rejections: these never touch the
/// board.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyError {
    #[error("no such player in this match")]
    UnknownPlayer,
    #[error("seat is already taken")]
    SeatTaken,
    #[error("not valid in the current match phase")]
    WrongPhase,
    #[error("spectators cannot do that")]
    NotSeated,
}
