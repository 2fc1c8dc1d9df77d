pub mod messages;
pub mod piece;
pub mod player;
pub mod settings;

// Re-export important types
pub use messages::*;
pub use piece::*;
pub use player::*;
pub use settings::*;
