use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

pub const MOVES_PER_PERIOD_RANGE: (u32, u32) = (1, 10);
pub const COOLDOWN_SECS_RANGE: (u32, u32) = (1, 30);

/// Match configuration. Edited freely before the match starts, frozen the
/// moment it transitions to playing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Moves a player may land inside any rolling 10 second window.
    pub max_moves_per_period: u32,
    /// Minimum seconds between two moves of the same piece.
    pub cooldown_secs: u32,
    /// Periodically drop a random piece onto an empty square.
    pub random_spawns: bool,
    /// Captures chip hit points instead of removing pieces outright.
    pub hit_points: bool,
}

impl Default for GameSettings {
    fn default() -> GameSettings {
        GameSettings {
            max_moves_per_period: 3,
            cooldown_secs: 10,
            random_spawns: false,
            hit_points: false,
        }
    }
}

impl GameSettings {
    /// Boundary rule: out-of-range numbers are clamped, never rejected.
    pub fn clamped(mut self) -> GameSettings {
        self.max_moves_per_period = self
            .max_moves_per_period
            .clamp(MOVES_PER_PERIOD_RANGE.0, MOVES_PER_PERIOD_RANGE.1);
        self.cooldown_secs = self
            .cooldown_secs
            .clamp(COOLDOWN_SECS_RANGE.0, COOLDOWN_SECS_RANGE.1);
        self
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_secs as u64 * 1000
    }

    /// Hit points a piece starts with under these settings.
    pub fn starting_hp(&self) -> u8 {
        if self.hit_points {
            3
        } else {
            1
        }
    }

    /// Last-writer-wins merge of two timestamped settings values. An equal
    /// timestamp favors the incoming write, which is what a debounced
    /// editor expects.
    pub fn merge(
        current: (GameSettings, Timestamp),
        incoming: (GameSettings, Timestamp),
    ) -> (GameSettings, Timestamp) {
        if incoming.1 >= current.1 {
            incoming
        } else {
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let s = GameSettings {
            max_moves_per_period: 99,
            cooldown_secs: 0,
            random_spawns: true,
            hit_points: false,
        }
        .clamped();
        assert_eq!(s.max_moves_per_period, 10);
        assert_eq!(s.cooldown_secs, 1);
    }

    #[test]
    fn in_range_values_pass_through() {
        let s = GameSettings::default().clamped();
        assert_eq!(s, GameSettings::default());
    }

    #[test]
    fn merge_is_last_writer_wins() {
        let older = (
            GameSettings {
                cooldown_secs: 5,
                ..GameSettings::default()
            },
            Timestamp(100),
        );
        let newer = (
            GameSettings {
                cooldown_secs: 7,
                ..GameSettings::default()
            },
            Timestamp(200),
        );
        assert_eq!(GameSettings::merge(older, newer).0.cooldown_secs, 7);
        assert_eq!(GameSettings::merge(newer, older).0.cooldown_secs, 7);

        // Equal timestamps: the incoming write sticks.
        let tied = (
            GameSettings {
                cooldown_secs: 9,
                ..GameSettings::default()
            },
            Timestamp(200),
        );
        assert_eq!(GameSettings::merge(newer, tied).0.cooldown_secs, 9);
    }

    #[test]
    fn starting_hp_follows_variant() {
        let mut s = GameSettings::default();
        assert_eq!(s.starting_hp(), 1);
        s.hit_points = true;
        assert_eq!(s.starting_hp(), 3);
    }
}
