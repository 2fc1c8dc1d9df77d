use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Timestamp;
use crate::engine::board::Board;
use crate::engine::cooldown::CooldownTracker;
use crate::engine::error::MoveError;
use crate::engine::rate_limit::RateLimiter;
use crate::engine::rules::MoveValidator;
use crate::engine::state::LogEntry;
use crate::models::piece::{PieceId, PieceKind, Side, Square};
use crate::models::player::PlayerId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntentId(pub Uuid);

impl IntentId {
    pub fn new() -> IntentId {
        IntentId(Uuid::new_v4())
    }
}

impl Default for IntentId {
    fn default() -> Self {
        IntentId::new()
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A gated move waiting for the next resolution pass. Ephemeral: created
/// at intake, consumed by resolution, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveIntent {
    pub id: IntentId,
    /// Intake sequence number; the deterministic tie-breaker.
    pub seq: u64,
    pub player: PlayerId,
    pub side: Side,
    pub piece: PieceId,
    pub from: Square,
    pub to: Square,
    /// Canonical receipt timestamp. Client clocks are never used for
    /// ordering.
    pub received_at: Timestamp,
}

/// What resolution decided about one intent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved {
        from: Square,
        to: Square,
        captured: Option<PieceId>,
        promoted: Option<PieceKind>,
        castle_rook: Option<(Square, Square)>,
    },
    Rejected {
        reason: MoveError,
    },
}

impl MoveOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub intent: IntentId,
    pub player: PlayerId,
    pub outcome: MoveOutcome,
}

/// Applies a pass's intents one at a time, each against the board as the
/// earlier intents left it. The total order is (receipt timestamp, intake
/// sequence); player identity never participates, so neither side gets a
/// structural edge on ties.
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn order(intents: &mut [MoveIntent]) {
        intents.sort_by_key(|i| (i.received_at, i.seq));
    }

    /// Re-validate and apply one intent. Every intent in the queue already
    /// passed the intake gate, so a failure here means an earlier intent
    /// invalidated it: those reject as stale. The one exception is a
    /// surviving hit-points defender, which surfaces as blocked.
    pub fn apply(
        board: &mut Board,
        validator: &MoveValidator,
        cooldown: &CooldownTracker,
        rate: &mut RateLimiter,
        intent: &MoveIntent,
    ) -> (MoveOutcome, Option<LogEntry>) {
        let rejected = |reason| (MoveOutcome::Rejected { reason }, None);

        let legal = match validator.validate(board, intent.side, intent.piece, intent.from, intent.to)
        {
            Ok(legal) => legal,
            Err(_) => return rejected(MoveError::Stale),
        };

        // An earlier intent in this pass may have spent this piece's
        // action (a strike leaves the piece in place but on cooldown).
        let piece = match board.piece(intent.piece) {
            Some(p) => *p,
            None => return rejected(MoveError::Stale),
        };
        if !cooldown.is_eligible(&piece, intent.received_at) {
            return rejected(MoveError::Stale);
        }
        if !rate.can_move(intent.player, intent.received_at) {
            return rejected(MoveError::RateLimited);
        }

        if let Some(target) = legal.capture {
            let hp_left = board.strike_at(legal.to).unwrap_or(0);
            if hp_left > 0 {
                // Defender survives: the mover stays put but its action is
                // spent, and the strike is a state change the log keeps.
                board.touch(legal.from, intent.received_at);
                rate.record(intent.player, intent.received_at);
                let entry = LogEntry::Struck {
                    at: intent.received_at,
                    attacker: intent.piece,
                    from: legal.from,
                    target,
                    to: legal.to,
                    hp_left,
                };
                return (
                    MoveOutcome::Rejected {
                        reason: MoveError::Blocked,
                    },
                    Some(entry),
                );
            }
        }

        board.advance(legal.from, legal.to, intent.received_at);
        if let Some(kind) = legal.promotion {
            board.promote_at(legal.to, kind);
        }
        if let Some((rook_from, rook_to)) = legal.castle_rook {
            board.advance(rook_from, rook_to, intent.received_at);
        }
        rate.record(intent.player, intent.received_at);

        let outcome = MoveOutcome::Moved {
            from: legal.from,
            to: legal.to,
            captured: legal.capture,
            promoted: legal.promotion,
            castle_rook: legal.castle_rook,
        };
        let entry = LogEntry::Moved {
            at: intent.received_at,
            piece: intent.piece,
            from: legal.from,
            to: legal.to,
            captured: legal.capture,
            promoted: legal.promotion,
            castle_rook: legal.castle_rook,
        };
        (outcome, Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::piece::{Piece, PieceKind};

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn intent(
        seq: u64,
        player: PlayerId,
        side: Side,
        piece: PieceId,
        from: &str,
        to: &str,
        at: u64,
    ) -> MoveIntent {
        MoveIntent {
            id: IntentId::new(),
            seq,
            player,
            side,
            piece,
            from: sq(from),
            to: sq(to),
            received_at: Timestamp(at),
        }
    }

    #[test]
    fn ordering_is_by_timestamp_then_sequence() {
        let player = PlayerId::new();
        let piece = PieceId::new();
        let mut intents = vec![
            intent(3, player, Side::White, piece, "a2", "a3", 200),
            intent(2, player, Side::White, piece, "b2", "b3", 100),
            intent(1, player, Side::White, piece, "c2", "c3", 200),
        ];
        ConflictResolver::order(&mut intents);
        let order: Vec<u64> = intents.iter().map(|i| i.seq).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn surviving_defender_blocks_and_spends_the_striker() {
        let mut board = Board::empty();
        let rook = Piece::new(PieceKind::Rook, Side::White, sq("a1"), 3);
        let rook_id = rook.id;
        board.place(rook);
        let defender = Piece::new(PieceKind::Rook, Side::Black, sq("a8"), 3);
        let defender_id = defender.id;
        board.place(defender);
        board.place(Piece::new(PieceKind::King, Side::White, sq("e1"), 3));
        board.place(Piece::new(PieceKind::King, Side::Black, sq("e8"), 3));

        let validator = MoveValidator::new(true);
        let cooldown = CooldownTracker::new(1000);
        let mut rate = RateLimiter::new(10);
        let player = PlayerId::new();

        let (outcome, entry) = ConflictResolver::apply(
            &mut board,
            &validator,
            &cooldown,
            &mut rate,
            &intent(1, player, Side::White, rook_id, "a1", "a8", 50),
        );
        assert_eq!(
            outcome,
            MoveOutcome::Rejected {
                reason: MoveError::Blocked
            }
        );
        assert!(matches!(
            entry,
            Some(LogEntry::Struck { hp_left: 2, .. })
        ));
        // Defender stands, attacker stands, but the attacker's action is
        // spent and its quota consumed.
        assert_eq!(board.piece(defender_id).unwrap().hp, 2);
        let attacker = board.piece(rook_id).unwrap();
        assert_eq!(attacker.square, sq("a1"));
        assert_eq!(attacker.last_move_at, Some(Timestamp(50)));
        assert_eq!(rate.moves_in_window(player, Timestamp(60)), 1);
    }

    #[test]
    fn second_intent_for_a_spent_piece_goes_stale() {
        let mut board = Board::standard(1);
        let pawn_id = board.piece_at(sq("e2")).unwrap().id;
        let validator = MoveValidator::new(false);
        let cooldown = CooldownTracker::new(5000);
        let mut rate = RateLimiter::new(10);
        let player = PlayerId::new();

        let first = intent(1, player, Side::White, pawn_id, "e2", "e4", 100);
        let second = intent(2, player, Side::White, pawn_id, "e2", "e3", 101);

        let (outcome, _) =
            ConflictResolver::apply(&mut board, &validator, &cooldown, &mut rate, &first);
        assert!(outcome.is_applied());
        let (outcome, entry) =
            ConflictResolver::apply(&mut board, &validator, &cooldown, &mut rate, &second);
        assert_eq!(
            outcome,
            MoveOutcome::Rejected {
                reason: MoveError::Stale
            }
        );
        assert!(entry.is_none());
    }
}
