//! Match lifecycle semantics: phases, settings handling, and the
//! terminal conditions reached through actual play.

use kungfu_chess::clock::Timestamp;
use kungfu_chess::engine::error::MoveError;
use kungfu_chess::engine::machine::GameStateMachine;
use kungfu_chess::engine::state::{EndReason, LogEntry, MatchStatus};
use kungfu_chess::models::piece::{PieceId, Side, Square};
use kungfu_chess::models::player::PlayerId;
use kungfu_chess::models::settings::GameSettings;

fn sq(s: &str) -> Square {
    s.parse().unwrap()
}

fn start_match(settings: GameSettings) -> (GameStateMachine, PlayerId, PlayerId) {
    let mut machine = GameStateMachine::with_seed(9);
    let white = machine.add_player("white").unwrap();
    let black = machine.add_player("black").unwrap();
    machine.choose_side(white, Side::White).unwrap();
    machine.choose_side(black, Side::Black).unwrap();
    machine
        .update_settings(white, settings, Timestamp(0))
        .unwrap();
    machine.mark_ready(white, Timestamp(0)).unwrap();
    machine.mark_ready(black, Timestamp(0)).unwrap();
    (machine, white, black)
}

fn piece_at(machine: &GameStateMachine, s: &str) -> PieceId {
    machine.state().board.piece_at(sq(s)).unwrap().id
}

fn play(
    machine: &mut GameStateMachine,
    player: PlayerId,
    from: &str,
    to: &str,
    at: u64,
) -> kungfu_chess::engine::resolver::Resolution {
    let piece = piece_at(machine, from);
    machine
        .submit(player, piece, sq(from), sq(to), Timestamp(at))
        .unwrap();
    machine.resolve_pass(Timestamp(at + 20))[0]
}

#[test]
fn phases_advance_one_way_through_the_lobby() {
    let mut machine = GameStateMachine::with_seed(9);
    assert_eq!(machine.status(), MatchStatus::Lobby);

    let white = machine.add_player("white").unwrap();
    let black = machine.add_player("black").unwrap();
    let watcher = machine.add_player("watcher").unwrap();
    assert_eq!(machine.status(), MatchStatus::Lobby);

    machine.choose_side(white, Side::White).unwrap();
    assert_eq!(machine.status(), MatchStatus::SideSelection);
    machine.choose_side(black, Side::Black).unwrap();
    assert_eq!(machine.status(), MatchStatus::ReadyWait);

    // Only the seated players gate the start; the spectator never readies.
    machine.mark_ready(white, Timestamp(5)).unwrap();
    assert_eq!(machine.status(), MatchStatus::ReadyWait);
    machine.mark_ready(black, Timestamp(6)).unwrap();
    assert_eq!(machine.status(), MatchStatus::Playing);
    assert!(machine.state().player(watcher).unwrap().is_spectator());
}

#[test]
fn settings_are_clamped_and_merged_last_writer_wins() {
    let mut machine = GameStateMachine::with_seed(9);
    let white = machine.add_player("white").unwrap();
    machine.choose_side(white, Side::White).unwrap();

    // Out-of-range values clamp instead of failing.
    let merged = machine
        .update_settings(
            white,
            GameSettings {
                max_moves_per_period: 99,
                cooldown_secs: 0,
                ..GameSettings::default()
            },
            Timestamp(500),
        )
        .unwrap();
    assert_eq!(merged.max_moves_per_period, 10);
    assert_eq!(merged.cooldown_secs, 1);

    // An older write loses to the one already applied.
    let merged = machine
        .update_settings(
            white,
            GameSettings {
                cooldown_secs: 20,
                ..GameSettings::default()
            },
            Timestamp(400),
        )
        .unwrap();
    assert_eq!(merged.cooldown_secs, 1);

    // A newer write replaces it.
    let merged = machine
        .update_settings(
            white,
            GameSettings {
                cooldown_secs: 20,
                ..GameSettings::default()
            },
            Timestamp(600),
        )
        .unwrap();
    assert_eq!(merged.cooldown_secs, 20);
}

#[test]
fn fools_mate_ends_the_classic_match() {
    let settings = GameSettings {
        cooldown_secs: 1,
        max_moves_per_period: 10,
        ..GameSettings::default()
    };
    let (mut machine, white, black) = start_match(settings);

    assert!(play(&mut machine, white, "f2", "f3", 100).outcome.is_applied());
    assert!(play(&mut machine, black, "e7", "e5", 1200).outcome.is_applied());
    assert!(play(&mut machine, white, "g2", "g4", 2300).outcome.is_applied());
    assert!(play(&mut machine, black, "d8", "h4", 3400).outcome.is_applied());

    assert_eq!(
        machine.status(),
        MatchStatus::Ended {
            reason: EndReason::Checkmate {
                winner: Side::Black
            }
        }
    );
    assert!(matches!(
        machine.state().log.last(),
        Some(LogEntry::Ended { .. })
    ));

    // The match only ends through the transition; later intents are
    // stale, never fatal.
    let pawn = piece_at(&machine, "a2");
    assert_eq!(
        machine
            .submit(white, pawn, sq("a2"), sq("a3"), Timestamp(4500))
            .unwrap_err(),
        MoveError::Stale
    );
}

#[test]
fn king_depletion_ends_the_hit_points_match() {
    let settings = GameSettings {
        cooldown_secs: 1,
        max_moves_per_period: 10,
        hit_points: true,
        ..GameSettings::default()
    };
    let (mut machine, white, _) = start_match(settings);
    let queen = piece_at(&machine, "d1");

    // March the queen in: e4 opens the diagonal, then grind down f7 and
    // finally the king, three hit points each.
    assert!(play(&mut machine, white, "e2", "e4", 100).outcome.is_applied());
    assert!(play(&mut machine, white, "d1", "h5", 1200).outcome.is_applied());

    let f7 = piece_at(&machine, "f7");
    for at in [2300u64, 3400, 4500] {
        machine
            .submit(white, queen, sq("h5"), sq("f7"), Timestamp(at))
            .unwrap();
        machine.resolve_pass(Timestamp(at + 20));
    }
    assert!(machine.state().board.piece(f7).is_none());
    assert_eq!(machine.state().board.piece(queen).unwrap().square, sq("f7"));
    // A pawn died, but no king did: still playing.
    assert_eq!(machine.status(), MatchStatus::Playing);

    let king = piece_at(&machine, "e8");
    for at in [5600u64, 6700, 7800] {
        machine
            .submit(white, queen, sq("f7"), sq("e8"), Timestamp(at))
            .unwrap();
        machine.resolve_pass(Timestamp(at + 20));
        let hp = machine.state().board.piece(king).map(|k| k.hp);
        match at {
            5600 => assert_eq!(hp, Some(2)),
            6700 => assert_eq!(hp, Some(1)),
            _ => assert_eq!(hp, None),
        }
    }

    assert_eq!(
        machine.status(),
        MatchStatus::Ended {
            reason: EndReason::KingDepleted {
                winner: Side::White
            }
        }
    );
}

#[test]
fn spawned_pieces_are_immediately_eligible() {
    let settings = GameSettings {
        cooldown_secs: 30,
        random_spawns: true,
        ..GameSettings::default()
    };
    let (mut machine, _, _) = start_match(settings);

    let spawned = machine
        .maybe_spawn(Timestamp(kungfu_chess::engine::machine::SPAWN_INTERVAL_MS))
        .expect("cadence reached");
    let eligible = machine.eligible_pieces(
        spawned.side,
        Timestamp(kungfu_chess::engine::machine::SPAWN_INTERVAL_MS + 1),
    );
    assert!(eligible.iter().any(|p| p.id == spawned.id));
    assert!(matches!(
        machine.state().log.last(),
        Some(LogEntry::Spawned { .. })
    ));
}

#[test]
fn rejections_never_end_the_match() {
    let settings = GameSettings {
        cooldown_secs: 5,
        max_moves_per_period: 1,
        ..GameSettings::default()
    };
    let (mut machine, white, black) = start_match(settings);
    let pawn = piece_at(&machine, "e2");

    // A stack of rejections of every flavor.
    machine
        .submit(black, pawn, sq("e2"), sq("e4"), Timestamp(100))
        .unwrap_err();
    machine
        .submit(white, pawn, sq("e2"), sq("d4"), Timestamp(200))
        .unwrap_err();
    machine
        .submit(white, pawn, sq("e3"), sq("e4"), Timestamp(300))
        .unwrap_err();

    assert_eq!(machine.status(), MatchStatus::Playing);
    assert!(machine.state().log.is_empty());
}
