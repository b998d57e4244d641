//! Wire protocol: JSON frames of the shape `{ "type": string, "payload": any }`
//! (spec §6). Reserved type strings are closed enums tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessageKind {
    NewPost,
    PostLiked,
    PostCommented,
    UserFollowed,
    CommentLiked,
    PresenceUpdate,
    PlayCountUpdate,
    LikeCountUpdate,
    FollowerCountUpdate,
    UserTyping,
    UserStopTyping,
    Pong,
    Error,
    /// Audio ingest pipeline completion event (spec §4.1 step 7):
    /// published to `user:{owner}` with the job id, sound id, and match
    /// confidence.
    IngestCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessageKind {
    Heartbeat,
    TypingStart,
    TypingStop,
    PresenceSet,
}

/// A server-to-client frame ready for JSON serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: ServerMessageKind,
    pub payload: Value,
}

impl ServerMessage {
    pub fn new(kind: ServerMessageKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A client-to-server frame as decoded off the wire. `type` is kept as a
/// raw string (rather than `ClientMessageKind`) so unknown kinds can be
/// reported back as an `error` frame instead of failing the whole
/// deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_round_trips_as_type_payload() {
        let msg = ServerMessage::new(
            ServerMessageKind::Pong,
            serde_json::json!({"ts": 1}),
        );
        let json = msg.to_json();
        assert!(json.contains("\"type\":\"pong\""));
    }

    #[test]
    fn client_frame_parses_unknown_kind_without_failing() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"something_new","payload":{}}"#).unwrap();
        assert_eq!(frame.kind, "something_new");
    }
}
