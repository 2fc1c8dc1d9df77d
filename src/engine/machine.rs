use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::Timestamp;
use crate::engine::cooldown::CooldownTracker;
use crate::engine::error::{LobbyError, MoveError};
use crate::engine::rate_limit::RateLimiter;
use crate::engine::resolver::{ConflictResolver, IntentId, MoveIntent, MoveOutcome, Resolution};
use crate::engine::rules::{self, MoveValidator};
use crate::engine::state::{EndReason, GameState, LogEntry, MatchStatus};
use crate::models::piece::{Piece, PieceId, PieceKind, Side, Square};
use crate::models::player::PlayerId;
use crate::models::settings::GameSettings;

/// How often a random piece may drop when the variant is on. The cadence
/// belongs to the machine, not the validator; spawned pieces are ordinary
/// pieces from the moment they land.
pub const SPAWN_INTERVAL_MS: u64 = 15_000;

const SPAWN_KINDS: [PieceKind; 5] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Pawn,
];

/// Single owner of a match's canonical state. All mutation funnels through
/// here: lobby operations, the intent intake gate, resolution passes, the
/// spawn roll, and the terminal transitions.
pub struct GameStateMachine {
    state: GameState,
    validator: MoveValidator,
    cooldown: CooldownTracker,
    rate: RateLimiter,
    pending: Vec<MoveIntent>,
    next_seq: u64,
    last_spawn_at: Timestamp,
    rng: StdRng,
}

impl GameStateMachine {
    pub fn new() -> GameStateMachine {
        GameStateMachine::from_rng(StdRng::from_entropy())
    }

    /// Seeded constructor so spawn rolls are reproducible.
    pub fn with_seed(seed: u64) -> GameStateMachine {
        GameStateMachine::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> GameStateMachine {
        let settings = GameSettings::default();
        GameStateMachine {
            state: GameState::new(),
            validator: MoveValidator::new(settings.hit_points),
            cooldown: CooldownTracker::new(settings.cooldown_ms()),
            rate: RateLimiter::new(settings.max_moves_per_period),
            pending: Vec::new(),
            next_seq: 0,
            last_spawn_at: Timestamp::ZERO,
            rng,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn status(&self) -> MatchStatus {
        self.state.status
    }

    pub fn validator(&self) -> &MoveValidator {
        &self.validator
    }

    // ---- lobby ----

    /// Everyone enters as a spectator; seats are claimed separately.
    pub fn add_player(&mut self, name: impl Into<String>) -> Result<PlayerId, LobbyError> {
        if self.state.status.is_terminal() {
            return Err(LobbyError::WrongPhase);
        }
        let player = crate::models::player::Player::new(name);
        let id = player.id;
        info!("player {} ({}) joined the match", player.name, id);
        self.state.players.push(player);
        Ok(id)
    }

    pub fn choose_side(&mut self, player: PlayerId, side: Side) -> Result<(), LobbyError> {
        match self.state.status {
            MatchStatus::Lobby | MatchStatus::SideSelection => {}
            _ => return Err(LobbyError::WrongPhase),
        }
        match self.state.seat_holder(side) {
            Some(holder) if holder.id == player => return Ok(()),
            Some(_) => return Err(LobbyError::SeatTaken),
            None => {}
        }
        let entry = self
            .state
            .player_mut(player)
            .ok_or(LobbyError::UnknownPlayer)?;
        entry.side = Some(side);
        info!("player {} seated as {}", player, side);

        if self.state.status == MatchStatus::Lobby {
            self.state.status = MatchStatus::SideSelection;
        }
        if self.state.seat_holder(Side::White).is_some()
            && self.state.seat_holder(Side::Black).is_some()
        {
            info!("both seats filled, waiting for ready");
            self.state.status = MatchStatus::ReadyWait;
        }
        Ok(())
    }

    pub fn mark_ready(&mut self, player: PlayerId, now: Timestamp) -> Result<(), LobbyError> {
        if self.state.status != MatchStatus::ReadyWait {
            return Err(LobbyError::WrongPhase);
        }
        let entry = self
            .state
            .player_mut(player)
            .ok_or(LobbyError::UnknownPlayer)?;
        if entry.is_spectator() {
            return Err(LobbyError::NotSeated);
        }
        entry.ready = true;
        if self.state.seated_players().all(|p| p.ready) {
            self.start(now);
        }
        Ok(())
    }

    /// Freeze settings, build the timing components from them, and open
    /// play. From here on the settings value is immutable.
    fn start(&mut self, now: Timestamp) {
        let settings = self.state.settings;
        self.validator = MoveValidator::new(settings.hit_points);
        self.cooldown = CooldownTracker::new(settings.cooldown_ms());
        self.rate = RateLimiter::new(settings.max_moves_per_period);
        self.state.board = crate::engine::board::Board::standard(settings.starting_hp());
        self.state.status = MatchStatus::Playing;
        self.state.started_at = Some(now);
        self.last_spawn_at = now;
        info!(
            "match started at {:?}: cooldown {}s, {} moves per window, spawns {}, hit points {}",
            now,
            settings.cooldown_secs,
            settings.max_moves_per_period,
            settings.random_spawns,
            settings.hit_points
        );
    }

    /// Timestamped last-writer-wins settings edit. Only seated players may
    /// edit, and only before the match starts; numeric fields are clamped,
    /// not rejected.
    pub fn update_settings(
        &mut self,
        player: PlayerId,
        settings: GameSettings,
        at: Timestamp,
    ) -> Result<GameSettings, MoveError> {
        if self.state.status.rank() >= MatchStatus::Playing.rank() {
            return Err(MoveError::InvalidSettings);
        }
        match self.state.player(player) {
            Some(p) if !p.is_spectator() => {}
            _ => return Err(MoveError::InvalidSettings),
        }
        let (merged, merged_at) = GameSettings::merge(
            (self.state.settings, self.state.settings_updated_at),
            (settings.clamped(), at),
        );
        self.state.settings = merged;
        self.state.settings_updated_at = merged_at;
        debug!("settings now {:?} (as of {:?})", merged, merged_at);
        Ok(merged)
    }

    // ---- intake ----

    /// The intake gate: phase, ownership, cooldown, rate, then full
    /// legality, all against the pre-pass snapshot. A passing intent is
    /// queued for the next resolution pass; a failing one is rejected
    /// here and never retried.
    pub fn submit(
        &mut self,
        player_id: PlayerId,
        piece_id: PieceId,
        from: Square,
        to: Square,
        now: Timestamp,
    ) -> Result<IntentId, MoveError> {
        if self.state.status != MatchStatus::Playing {
            return Err(MoveError::Stale);
        }
        let side = self
            .state
            .player(player_id)
            .and_then(|p| p.side)
            .ok_or(MoveError::NotOwner)?;
        let piece = match self.state.board.piece(piece_id) {
            Some(p) => *p,
            None => return Err(MoveError::Stale),
        };
        if piece.square != from {
            return Err(MoveError::Stale);
        }
        if piece.side != side {
            return Err(MoveError::NotOwner);
        }
        if !self.cooldown.is_eligible(&piece, now) {
            return Err(MoveError::CooldownActive {
                remaining_ms: self.cooldown.remaining_ms(&piece, now),
            });
        }
        if !self.rate.can_move(player_id, now) {
            return Err(MoveError::RateLimited);
        }
        self.validator
            .validate(&self.state.board, side, piece_id, from, to)?;

        self.next_seq += 1;
        let intent = MoveIntent {
            id: IntentId::new(),
            seq: self.next_seq,
            player: player_id,
            side,
            piece: piece_id,
            from,
            to,
            received_at: now,
        };
        debug!(
            "queued intent {} ({} {} -> {}) at {:?}",
            intent.id, side, from, to, now
        );
        self.pending.push(intent);
        Ok(intent.id)
    }

    // ---- resolution ----

    /// Drain the pending queue in total order, applying each intent against
    /// the board the earlier ones produced. Terminal conditions are
    /// re-evaluated after every applied change; intents arriving after the
    /// end are stale.
    pub fn resolve_pass(&mut self, now: Timestamp) -> Vec<Resolution> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let mut intents = std::mem::take(&mut self.pending);
        ConflictResolver::order(&mut intents);

        let mut resolutions = Vec::with_capacity(intents.len());
        for intent in &intents {
            if self.state.status.is_terminal() {
                resolutions.push(Resolution {
                    intent: intent.id,
                    player: intent.player,
                    outcome: MoveOutcome::Rejected {
                        reason: MoveError::Stale,
                    },
                });
                continue;
            }
            let (outcome, entry) = ConflictResolver::apply(
                &mut self.state.board,
                &self.validator,
                &self.cooldown,
                &mut self.rate,
                intent,
            );
            if let Some(entry) = entry {
                self.state.log.push(entry);
                self.check_terminal(now);
            }
            debug!("intent {} resolved: {:?}", intent.id, outcome);
            resolutions.push(Resolution {
                intent: intent.id,
                player: intent.player,
                outcome,
            });
        }
        resolutions
    }

    fn check_terminal(&mut self, now: Timestamp) {
        if self.state.status.is_terminal() {
            return;
        }
        for side in [Side::White, Side::Black] {
            if self.state.board.king(side).is_none() {
                self.end(
                    EndReason::KingDepleted {
                        winner: side.opponent(),
                    },
                    now,
                );
                return;
            }
        }
        if !self.state.settings.hit_points {
            for side in [Side::White, Side::Black] {
                if rules::in_check(&self.state.board, side) && !self.side_has_escape(side) {
                    self.end(
                        EndReason::Checkmate {
                            winner: side.opponent(),
                        },
                        now,
                    );
                    return;
                }
            }
        }
        if self.state.board.has_insufficient_material() {
            self.end(EndReason::Draw, now);
        }
    }

    fn side_has_escape(&self, side: Side) -> bool {
        self.state
            .board
            .side_pieces(side)
            .any(|p| !self.validator.legal_moves_for(&self.state.board, p).is_empty())
    }

    fn end(&mut self, reason: EndReason, now: Timestamp) {
        if self.state.status.is_terminal() {
            return;
        }
        info!("match ended: {:?}", reason);
        self.state.status = MatchStatus::Ended { reason };
        self.state.log.push(LogEntry::Ended { at: now, reason });
    }

    // ---- timers and terminal operations ----

    /// Roll a random piece onto an empty square if the variant is on and
    /// the cadence allows. The spawned piece is logged whole so replays
    /// never have to re-roll.
    pub fn maybe_spawn(&mut self, now: Timestamp) -> Option<Piece> {
        if self.state.status != MatchStatus::Playing || !self.state.settings.random_spawns {
            return None;
        }
        if now.since(self.last_spawn_at) < SPAWN_INTERVAL_MS {
            return None;
        }
        self.last_spawn_at = now;
        let empties = self.state.board.empty_squares();
        if empties.is_empty() {
            return None;
        }
        let square = empties[self.rng.gen_range(0..empties.len())];
        let kind = SPAWN_KINDS[self.rng.gen_range(0..SPAWN_KINDS.len())];
        let side = if self.rng.gen_bool(0.5) {
            Side::White
        } else {
            Side::Black
        };
        let piece = Piece::new(kind, side, square, self.state.settings.starting_hp());
        info!("spawned a {} {:?} on {}", side, kind, square);
        self.state.board.place(piece);
        self.state.log.push(LogEntry::Spawned { at: now, piece });
        Some(piece)
    }

    pub fn surrender(&mut self, player: PlayerId, now: Timestamp) -> Result<EndReason, LobbyError> {
        if self.state.status != MatchStatus::Playing {
            return Err(LobbyError::WrongPhase);
        }
        let side = self
            .state
            .player(player)
            .ok_or(LobbyError::UnknownPlayer)?
            .side
            .ok_or(LobbyError::NotSeated)?;
        let reason = EndReason::Surrender {
            winner: side.opponent(),
        };
        self.end(reason, now);
        Ok(reason)
    }

    pub fn set_connected(&mut self, player: PlayerId, connected: bool) {
        if let Some(entry) = self.state.player_mut(player) {
            entry.connected = connected;
        }
    }

    /// Called when a disconnect grace period expires. Only a seated,
    /// still-disconnected player forfeits; a reconnect in the meantime
    /// makes this a no-op.
    pub fn timeout_disconnect(&mut self, player: PlayerId, now: Timestamp) -> Option<EndReason> {
        if self.state.status != MatchStatus::Playing {
            return None;
        }
        let side = match self.state.player(player) {
            Some(p) if !p.connected => p.side?,
            _ => return None,
        };
        let reason = EndReason::DisconnectTimeout {
            winner: side.opponent(),
        };
        self.end(reason, now);
        Some(reason)
    }

    // ---- queries for the planner and room ----

    /// Cooldown-eligible pieces of one side; the rate limit is a separate,
    /// player-level check.
    pub fn eligible_pieces(&self, side: Side, now: Timestamp) -> Vec<Piece> {
        self.state
            .board
            .side_pieces(side)
            .filter(|p| self.cooldown.is_eligible(p, now))
            .copied()
            .collect()
    }

    pub fn can_player_move(&mut self, player: PlayerId, now: Timestamp) -> bool {
        self.rate.can_move(player, now)
    }

    pub(crate) fn components(
        &mut self,
    ) -> (
        &crate::engine::board::Board,
        &MoveValidator,
        &CooldownTracker,
        &mut RateLimiter,
    ) {
        (
            &self.state.board,
            &self.validator,
            &self.cooldown,
            &mut self.rate,
        )
    }
}

impl Default for GameStateMachine {
    fn default() -> Self {
        GameStateMachine::new()
    }
}
