use std::collections::HashMap;
use std::time::Duration;

use actix::prelude::*;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{ClockSource, SystemClock, Timestamp};
use crate::engine::error::{LobbyError, MoveError};
use crate::engine::machine::GameStateMachine;
use crate::engine::planner::AIPlanner;
use crate::engine::resolver::IntentId;
use crate::engine::state::{EndReason, MatchStatus};
use crate::models::messages::{
    ChooseSide, ClientRequest, ClientText, ConnectionChanged, Join, MarkReady, MoveRequest,
    RelayMessage, ServerEvent, SubmitMove, Surrender, UpdateSettings,
};
use crate::models::piece::Side;
use crate::models::player::PlayerId;
use crate::models::settings::GameSettings;

/// The contention window: intents landing within one tick contend and are
/// totally ordered by their canonical receipt stamps.
pub const RESOLUTION_TICK: Duration = Duration::from_millis(50);
/// How often automated sides get a chance to act.
pub const AI_TICK: Duration = Duration::from_millis(500);
/// The spawn cadence itself lives in the machine; the room only polls it.
const SPAWN_POLL: Duration = Duration::from_secs(1);
/// How long a disconnected seat survives before the match forfeits.
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(30);

/// One match, end to end. The actor mailbox is the serialization point:
/// intents arrive from players, planners and timers concurrently, but the
/// canonical state only ever changes inside this actor.
pub struct GameRoom {
    id: String,
    machine: GameStateMachine,
    clock: SystemClock,
    subscribers: HashMap<PlayerId, Recipient<RelayMessage>>,
    planners: Vec<(PlayerId, AIPlanner)>,
    grace_timers: HashMap<PlayerId, SpawnHandle>,
    announced_end: bool,
}

impl GameRoom {
    pub fn new() -> GameRoom {
        GameRoom {
            id: Uuid::new_v4().to_string(),
            machine: GameStateMachine::new(),
            clock: SystemClock::new(),
            subscribers: HashMap::new(),
            planners: Vec::new(),
            grace_timers: HashMap::new(),
            announced_end: false,
        }
    }

    /// Seat an automated player. It submits through the same gates as a
    /// human and is marked ready as soon as the match can accept it.
    pub fn add_ai(&mut self, side: Side) -> Result<PlayerId, LobbyError> {
        let player = self.machine.add_player(format!("ai-{}", side))?;
        self.machine.choose_side(player, side)?;
        self.planners.push((player, AIPlanner::new(side)));
        self.auto_ready_ais();
        Ok(player)
    }

    /// Pre-start wiring access for embedders (initial settings, seeded
    /// machines). Once the actor runs, go through messages.
    pub fn machine_mut(&mut self) -> &mut GameStateMachine {
        &mut self.machine
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn auto_ready_ais(&mut self) {
        if self.machine.status() != MatchStatus::ReadyWait {
            return;
        }
        for i in 0..self.planners.len() {
            let player = self.planners[i].0;
            if let Err(err) = self.machine.mark_ready(player, self.now()) {
                warn!("room {}: could not ready ai {}: {}", self.id, player, err);
            }
        }
    }

    fn send_to(&self, player: PlayerId, event: &ServerEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(err) => {
                warn!("room {}: error serializing event: {}", self.id, err);
                return;
            }
        };
        if let Some(recipient) = self.subscribers.get(&player) {
            recipient.do_send(RelayMessage(text));
        }
    }

    fn broadcast(&self, event: &ServerEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(err) => {
                warn!("room {}: error serializing event: {}", self.id, err);
                return;
            }
        };
        // Serialize once, then fan out to every subscriber.
        for recipient in self.subscribers.values() {
            recipient.do_send(RelayMessage(text.clone()));
        }
    }

    fn push_snapshot(&self) {
        self.broadcast(&ServerEvent::StateSnapshot(self.machine.state().snapshot()));
    }

    fn announce_end(&mut self, reason: EndReason) {
        if self.announced_end {
            return;
        }
        self.announced_end = true;
        info!("room {}: match ended: {:?}", self.id, reason);
        self.push_snapshot();
        self.broadcast(&ServerEvent::MatchEnded { reason });
    }

    /// Drain the pending queue. Applied moves broadcast; rejections go to
    /// the submitter alone, so the other side never learns about failed
    /// attempts.
    fn resolve_tick(&mut self) {
        let log_before = self.machine.state().log.len();
        let resolutions = self.machine.resolve_pass(self.now());
        for resolution in &resolutions {
            let event = ServerEvent::MoveResolved {
                intent_id: resolution.intent,
                outcome: resolution.outcome,
            };
            if resolution.outcome.is_applied() {
                self.broadcast(&event);
            } else {
                self.send_to(resolution.player, &event);
            }
        }
        // Strikes change state without an applied outcome, so go by the
        // log, not the resolutions.
        if self.machine.state().log.len() > log_before {
            self.push_snapshot();
        }
        if let MatchStatus::Ended { reason } = self.machine.status() {
            self.announce_end(reason);
        }
    }

    fn ai_tick(&mut self) {
        if self.machine.status() != MatchStatus::Playing {
            return;
        }
        for i in 0..self.planners.len() {
            let player = self.planners[i].0;
            let planned = {
                let (machine, clock) = (&mut self.machine, &self.clock);
                self.planners[i].1.plan(machine, player, clock)
            };
            let Some(planned) = planned else {
                continue;
            };
            match self
                .machine
                .submit(player, planned.piece, planned.from, planned.to, self.clock.now())
            {
                Ok(intent) => debug!(
                    "room {}: ai queued {} ({})",
                    self.id, intent, planned.rationale
                ),
                Err(err) => debug!("room {}: ai intent rejected at intake: {}", self.id, err),
            }
        }
    }

    fn spawn_tick(&mut self) {
        if self.machine.maybe_spawn(self.now()).is_some() {
            self.push_snapshot();
        }
    }

    fn do_move(&mut self, player: PlayerId, request: MoveRequest) -> Result<IntentId, MoveError> {
        let now = self.now();
        if let Some(client_ts) = request.client_timestamp {
            // Client clocks never order anything; they are only worth a
            // diagnostic line.
            debug!(
                "room {}: intent from {} stamped {} by the client, {:?} canonically",
                self.id, player, client_ts, now
            );
        }
        let result = self
            .machine
            .submit(player, request.piece_id, request.from, request.to, now);
        if let Err(reason) = result {
            // Intake rejections still reach only the submitter.
            self.send_to(
                player,
                &ServerEvent::MoveResolved {
                    intent_id: IntentId::new(),
                    outcome: crate::engine::resolver::MoveOutcome::Rejected { reason },
                },
            );
        }
        result
    }

    fn do_choose_side(&mut self, player: PlayerId, side: Side) -> Result<(), LobbyError> {
        self.machine.choose_side(player, side)?;
        self.auto_ready_ais();
        self.push_snapshot();
        Ok(())
    }

    fn do_ready(&mut self, player: PlayerId) -> Result<(), LobbyError> {
        self.machine.mark_ready(player, self.now())?;
        self.push_snapshot();
        Ok(())
    }

    fn do_update_settings(
        &mut self,
        player: PlayerId,
        settings: GameSettings,
    ) -> Result<GameSettings, MoveError> {
        self.machine.update_settings(player, settings, self.now())
    }

    fn do_surrender(&mut self, player: PlayerId) -> Result<(), LobbyError> {
        let reason = self.machine.surrender(player, self.now())?;
        self.announce_end(reason);
        Ok(())
    }
}

impl Default for GameRoom {
    fn default() -> Self {
        GameRoom::new()
    }
}

impl Actor for GameRoom {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("game room {} started", self.id);
        ctx.run_interval(RESOLUTION_TICK, |room, _| room.resolve_tick());
        ctx.run_interval(AI_TICK, |room, _| room.ai_tick());
        ctx.run_interval(SPAWN_POLL, |room, _| room.spawn_tick());
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        info!("game room {} stopped", self.id);
    }
}

impl Handler<Join> for GameRoom {
    type Result = Result<PlayerId, LobbyError>;

    fn handle(&mut self, msg: Join, _: &mut Self::Context) -> Self::Result {
        let player = self.machine.add_player(msg.name)?;
        self.subscribers.insert(player, msg.recipient);
        info!(
            "room {}: player {} joined ({} subscribers)",
            self.id,
            player,
            self.subscribers.len()
        );
        // Late joiners and reconnecting spectators start from a snapshot.
        self.send_to(
            player,
            &ServerEvent::StateSnapshot(self.machine.state().snapshot()),
        );
        Ok(player)
    }
}

impl Handler<ClientText> for GameRoom {
    type Result = ();

    fn handle(&mut self, msg: ClientText, _: &mut Self::Context) {
        // A malformed or out-of-schema request dies here, before any of
        // it reaches the machine.
        let request = match serde_json::from_str::<ClientRequest>(&msg.text) {
            Ok(request) => request,
            Err(err) => {
                warn!("room {}: dropping malformed request: {}", self.id, err);
                return;
            }
        };
        match request {
            ClientRequest::Move(request) => {
                let _ = self.do_move(msg.player, request);
            }
            ClientRequest::ChooseSide { side } => {
                if let Err(err) = self.do_choose_side(msg.player, side) {
                    warn!("room {}: choose_side: {}", self.id, err);
                }
            }
            ClientRequest::Ready => {
                if let Err(err) = self.do_ready(msg.player) {
                    warn!("room {}: ready: {}", self.id, err);
                }
            }
            ClientRequest::UpdateSettings { settings } => {
                if let Err(err) = self.do_update_settings(msg.player, settings) {
                    debug!("room {}: settings edit refused: {}", self.id, err);
                }
            }
            ClientRequest::Surrender => {
                if let Err(err) = self.do_surrender(msg.player) {
                    warn!("room {}: surrender: {}", self.id, err);
                }
            }
        }
    }
}

impl Handler<SubmitMove> for GameRoom {
    type Result = Result<IntentId, MoveError>;

    fn handle(&mut self, msg: SubmitMove, _: &mut Self::Context) -> Self::Result {
        self.do_move(msg.player, msg.request)
    }
}

impl Handler<ChooseSide> for GameRoom {
    type Result = Result<(), LobbyError>;

    fn handle(&mut self, msg: ChooseSide, _: &mut Self::Context) -> Self::Result {
        self.do_choose_side(msg.player, msg.side)
    }
}

impl Handler<MarkReady> for GameRoom {
    type Result = Result<(), LobbyError>;

    fn handle(&mut self, msg: MarkReady, _: &mut Self::Context) -> Self::Result {
        self.do_ready(msg.player)
    }
}

impl Handler<UpdateSettings> for GameRoom {
    type Result = Result<GameSettings, MoveError>;

    fn handle(&mut self, msg: UpdateSettings, _: &mut Self::Context) -> Self::Result {
        self.do_update_settings(msg.player, msg.settings)
    }
}

impl Handler<Surrender> for GameRoom {
    type Result = Result<(), LobbyError>;

    fn handle(&mut self, msg: Surrender, _: &mut Self::Context) -> Self::Result {
        self.do_surrender(msg.player)
    }
}

impl Handler<ConnectionChanged> for GameRoom {
    type Result = ();

    fn handle(&mut self, msg: ConnectionChanged, ctx: &mut Self::Context) {
        self.machine.set_connected(msg.player, msg.connected);
        if msg.connected {
            if let Some(handle) = self.grace_timers.remove(&msg.player) {
                ctx.cancel_future(handle);
                info!("room {}: player {} reconnected in time", self.id, msg.player);
            }
            return;
        }

        let seated = self
            .machine
            .state()
            .player(msg.player)
            .map(|p| !p.is_spectator())
            .unwrap_or(false);
        if !seated || self.machine.status() != MatchStatus::Playing {
            return;
        }
        info!(
            "room {}: player {} disconnected, grace period {}s",
            self.id,
            msg.player,
            DISCONNECT_GRACE.as_secs()
        );
        let player = msg.player;
        let handle = ctx.run_later(DISCONNECT_GRACE, move |room, _| {
            room.grace_timers.remove(&player);
            let now = room.clock.now();
            if let Some(reason) = room.machine.timeout_disconnect(player, now) {
                room.announce_end(reason);
            }
        });
        if let Some(previous) = self.grace_timers.insert(player, handle) {
            ctx.cancel_future(previous);
        }
    }
}

/// Snapshot of the room's status for supervisors and tests.
#[derive(Message)]
#[rtype(result = "MatchStatus")]
pub struct GetStatus;

impl Handler<GetStatus> for GameRoom {
    type Result = MessageResult<GetStatus>;

    fn handle(&mut self, _: GetStatus, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.machine.status())
    }
}
