use log::debug;

use crate::clock::ClockSource;
use crate::engine::board::Board;
use crate::engine::machine::GameStateMachine;
use crate::engine::rules::{self, LegalMove, MoveValidator};
use crate::models::piece::{Piece, PieceId, PieceKind, Side, Square};
use crate::models::player::PlayerId;

const DEFAULT_BUDGET_MS: u64 = 25;
const DEFAULT_MAX_CANDIDATES: usize = 256;

/// A candidate the planner settled on, with its score and a short
/// explanation a human can read in the move feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub piece: PieceId,
    pub from: Square,
    pub to: Square,
    pub score: i32,
    pub rationale: String,
}

/// Heuristic move selection for an automated side. The planner goes
/// through exactly the gates a human does — cooldown, rate window, the
/// validator — and declines to act when nothing is eligible or nothing
/// scores at least even.
pub struct AIPlanner {
    side: Side,
    budget_ms: u64,
    max_candidates: usize,
}

impl AIPlanner {
    pub fn new(side: Side) -> AIPlanner {
        AIPlanner {
            side,
            budget_ms: DEFAULT_BUDGET_MS,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Tighter or looser bounds for one invocation context. Both limits
    /// cap the same loop; whichever trips first wins.
    pub fn with_limits(side: Side, budget_ms: u64, max_candidates: usize) -> AIPlanner {
        AIPlanner {
            side,
            budget_ms,
            max_candidates,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Produce at most one intent for the current state. Invoked whenever
    /// the room schedules the automated side; there is no hidden polling
    /// loop inside.
    pub fn plan(
        &self,
        machine: &mut GameStateMachine,
        player: PlayerId,
        clock: &dyn ClockSource,
    ) -> Option<PlannedMove> {
        let now = clock.now();
        if !machine.can_player_move(player, now) {
            debug!("planner({}): rate window exhausted", self.side);
            return None;
        }
        let eligible = machine.eligible_pieces(self.side, now);
        if eligible.is_empty() {
            debug!("planner({}): no piece off cooldown", self.side);
            return None;
        }
        let (board, validator, _, _) = machine.components();
        self.evaluate(board, validator, &eligible, clock)
    }

    /// Score every legal move of the eligible pieces and keep the best
    /// non-negative one. Bounded by wall clock and candidate count.
    pub fn evaluate(
        &self,
        board: &Board,
        validator: &MoveValidator,
        eligible: &[Piece],
        clock: &dyn ClockSource,
    ) -> Option<PlannedMove> {
        let deadline = clock.now().plus_ms(self.budget_ms);
        let under_check = rules::in_check(board, self.side);
        let mut best: Option<PlannedMove> = None;
        let mut considered = 0usize;

        'pieces: for piece in eligible {
            if clock.now() >= deadline {
                debug!("planner({}): budget spent after {} candidates", self.side, considered);
                break;
            }
            for mv in validator.legal_moves_for(board, piece) {
                considered += 1;
                if considered > self.max_candidates {
                    break 'pieces;
                }
                let (score, rationale) =
                    score_move(board, validator.hp_mode(), piece, &mv, under_check);
                if score >= 0 && best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(PlannedMove {
                        piece: piece.id,
                        from: mv.from,
                        to: mv.to,
                        score,
                        rationale,
                    });
                }
            }
        }
        if let Some(ref planned) = best {
            debug!(
                "planner({}): {} -> {} ({}, score {})",
                self.side, planned.from, planned.to, planned.rationale, planned.score
            );
        }
        best
    }
}

/// Material first, finishing blows over fresh targets, king strikes above
/// ordinary chip damage, then safety and a mild central pull so the
/// opening does not stall.
fn score_move(
    board: &Board,
    hp_mode: bool,
    piece: &Piece,
    mv: &LegalMove,
    under_check: bool,
) -> (i32, String) {
    let mut score = 0;
    let mut reasons: Vec<String> = Vec::new();

    if let Some(target) = mv.capture.and_then(|id| board.piece(id)) {
        if target.kind == PieceKind::King {
            if target.hp <= 1 {
                score += 1000;
                reasons.push("takes the king".to_string());
            } else {
                score += 60;
                reasons.push(format!("strikes the king, {} hp left", target.hp - 1));
            }
        } else if target.hp <= 1 {
            score += target.kind.value() * 10 + 4;
            if hp_mode {
                reasons.push(format!("finishing blow on the {}", target.kind));
            } else {
                reasons.push(format!("captures the {}", target.kind));
            }
        } else {
            score += target.kind.value() * 10 / target.hp as i32 + 2;
            reasons.push(format!("chips the {}, {} hp left", target.kind, target.hp - 1));
        }
    }

    if mv.promotion.is_some() {
        score += 80;
        reasons.push("promotes".to_string());
    }

    if under_check {
        score += if piece.kind == PieceKind::King { 30 } else { 20 };
        reasons.push("answers the check".to_string());
    }

    // Landing on a covered square risks the piece; the king most of all
    // since its material value is zero.
    if rules::is_square_attacked(board, mv.to, piece.side.opponent()) {
        score -= if piece.kind == PieceKind::King {
            100
        } else {
            piece.kind.value() * 5
        };
    }

    let center_distance =
        (2 * mv.to.file as i32 - 7).abs() + (2 * mv.to.rank as i32 - 7).abs();
    score += (14 - center_distance) / 4;

    if reasons.is_empty() {
        reasons.push(format!("develops the {}", piece.kind));
    }
    (score, reasons.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::cooldown::CooldownTracker;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn eligible(board: &Board, side: Side) -> Vec<Piece> {
        let cooldown = CooldownTracker::new(1000);
        board
            .side_pieces(side)
            .filter(|p| cooldown.is_eligible(p, crate::clock::Timestamp(0)))
            .copied()
            .collect()
    }

    #[test]
    fn prefers_the_biggest_capture() {
        let mut board = Board::empty();
        board.place(Piece::new(PieceKind::King, Side::White, sq("a1"), 1));
        board.place(Piece::new(PieceKind::King, Side::Black, sq("h8"), 1));
        board.place(Piece::new(PieceKind::Rook, Side::White, sq("d1"), 1));
        board.place(Piece::new(PieceKind::Queen, Side::Black, sq("d5"), 1));
        board.place(Piece::new(PieceKind::Pawn, Side::Black, sq("a5"), 1));

        let planner = AIPlanner::new(Side::White);
        let clock = ManualClock::new(0);
        let validator = MoveValidator::new(false);
        let planned = planner
            .evaluate(&board, &validator, &eligible(&board, Side::White), &clock)
            .expect("a capture is available");
        assert_eq!(planned.to, sq("d5"));
        assert!(planned.rationale.contains("captures the queen"));
    }

    #[test]
    fn prioritizes_finishing_blows_in_hp_mode() {
        let mut board = Board::empty();
        board.place(Piece::new(PieceKind::King, Side::White, sq("a1"), 3));
        board.place(Piece::new(PieceKind::King, Side::Black, sq("h8"), 3));
        board.place(Piece::new(PieceKind::Rook, Side::White, sq("d1"), 3));
        let mut wounded = Piece::new(PieceKind::Rook, Side::Black, sq("d5"), 3);
        wounded.hp = 1;
        board.place(wounded);
        board.place(Piece::new(PieceKind::Rook, Side::Black, sq("h1"), 3));

        let planner = AIPlanner::new(Side::White);
        let clock = ManualClock::new(0);
        let validator = MoveValidator::new(true);
        let planned = planner
            .evaluate(&board, &validator, &eligible(&board, Side::White), &clock)
            .expect("targets exist");
        assert_eq!(planned.to, sq("d5"));
        assert!(planned.rationale.contains("finishing blow"));
    }

    #[test]
    fn declines_when_nothing_is_eligible() {
        let board = Board::standard(1);
        let planner = AIPlanner::new(Side::White);
        let clock = ManualClock::new(0);
        let validator = MoveValidator::new(false);
        assert!(planner.evaluate(&board, &validator, &[], &clock).is_none());
    }

    #[test]
    fn candidate_cap_bounds_the_search() {
        let board = Board::standard(1);
        let planner = AIPlanner::with_limits(Side::White, 1000, 4);
        let clock = ManualClock::new(0);
        let validator = MoveValidator::new(false);
        // Still produces something from the few candidates it saw.
        assert!(planner
            .evaluate(&board, &validator, &eligible(&board, Side::White), &clock)
            .is_some());
    }

    #[test]
    fn finds_an_opening_move_through_the_machine() {
        use crate::engine::machine::GameStateMachine;
        use crate::models::settings::GameSettings;

        let mut machine = GameStateMachine::with_seed(3);
        let white = machine.add_player("bot").unwrap();
        let black = machine.add_player("human").unwrap();
        machine.choose_side(white, Side::White).unwrap();
        machine.choose_side(black, Side::Black).unwrap();
        machine
            .mark_ready(white, crate::clock::Timestamp(0))
            .unwrap();
        machine
            .mark_ready(black, crate::clock::Timestamp(0))
            .unwrap();

        let planner = AIPlanner::new(Side::White);
        let clock = ManualClock::new(5);
        let planned = planner.plan(&mut machine, white, &clock).expect("opening move");
        assert!(!planned.rationale.is_empty());
        machine
            .submit(white, planned.piece, planned.from, planned.to, clock.now())
            .expect("planner output passes the same gates");
    }
}
