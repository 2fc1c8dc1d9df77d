//! Real-time chess without turns: any eligible piece may move at any
//! moment, gated by a per-piece cooldown and a per-player rate window,
//! with simultaneous intents resolved in a deterministic total order.

pub mod clock;
pub mod engine;
pub mod models;
pub mod room;

pub use clock::{ClockSource, ManualClock, SystemClock, Timestamp};
pub use engine::error::{LobbyError, MoveError};
pub use engine::machine::GameStateMachine;
pub use engine::planner::AIPlanner;
pub use engine::state::{EndReason, MatchStatus};
pub use room::GameRoom;
