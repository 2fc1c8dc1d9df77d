use actix::{Message, Recipient};
use serde::{Deserialize, Serialize};

use crate::engine::error::{LobbyError, MoveError};
use crate::engine::resolver::{IntentId, MoveOutcome};
use crate::engine::state::{EndReason, StateSnapshot};
use crate::models::piece::{PieceId, Side, Square};
use crate::models::player::PlayerId;
use crate::models::settings::GameSettings;

/// A move as the relay delivers it. The client timestamp is kept for
/// latency diagnostics only; ordering always uses the canonical receipt
/// stamp taken inside the room.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveRequest {
    pub piece_id: PieceId,
    pub from: Square,
    pub to: Square,
    pub client_timestamp: Option<u64>,
}

/// Everything a client may say to a match over the relay.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Move(MoveRequest),
    ChooseSide { side: Side },
    Ready,
    UpdateSettings { settings: GameSettings },
    Surrender,
}

/// Everything the core emits for the relay to deliver. Rejected moves go
/// to the submitter alone; snapshots and endings go to the whole room.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    MoveResolved {
        intent_id: IntentId,
        outcome: MoveOutcome,
    },
    StateSnapshot(StateSnapshot),
    MatchEnded {
        reason: EndReason,
    },
}

/// A serialized event on its way to one relay subscriber.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct RelayMessage(pub String);

// Actor messages into the room. The room stamps its own clock on receipt;
// none of these carry a trusted time.

#[derive(Message)]
#[rtype(result = "Result<PlayerId, LobbyError>")]
pub struct Join {
    pub name: String,
    pub recipient: Recipient<RelayMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ClientText {
    pub player: PlayerId,
    pub text: String,
}

#[derive(Message)]
#[rtype(result = "Result<IntentId, MoveError>")]
pub struct SubmitMove {
    pub player: PlayerId,
    pub request: MoveRequest,
}

#[derive(Message)]
#[rtype(result = "Result<(), LobbyError>")]
pub struct ChooseSide {
    pub player: PlayerId,
    pub side: Side,
}

#[derive(Message)]
#[rtype(result = "Result<(), LobbyError>")]
pub struct MarkReady {
    pub player: PlayerId,
}

#[derive(Message)]
#[rtype(result = "Result<GameSettings, MoveError>")]
pub struct UpdateSettings {
    pub player: PlayerId,
    pub settings: GameSettings,
}

#[derive(Message)]
#[rtype(result = "Result<(), LobbyError>")]
pub struct Surrender {
    pub player: PlayerId,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ConnectionChanged {
    pub player: PlayerId,
    pub connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requests_parse_from_relay_json() {
        let text = r#"{"type":"move","piece_id":"00000000-0000-0000-0000-000000000010","from":"e2","to":"e4","client_timestamp":123}"#;
        match serde_json::from_str::<ClientRequest>(text).unwrap() {
            ClientRequest::Move(req) => {
                assert_eq!(req.from, "e2".parse().unwrap());
                assert_eq!(req.client_timestamp, Some(123));
            }
            other => panic!("parsed as {:?}", other),
        }

        let ready: ClientRequest = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert!(matches!(ready, ClientRequest::Ready));

        assert!(serde_json::from_str::<ClientRequest>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn server_events_tag_their_type() {
        let event = ServerEvent::MatchEnded {
            reason: EndReason::Draw,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"match_ended""#));
        assert!(json.contains(r#""reason":"draw""#));
    }
}
