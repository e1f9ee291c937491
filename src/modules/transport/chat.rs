use crate::modules::{error::BridgeResult, identity::VirtualIdentity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const ROOM_MESSAGE_EVENT: &str = "m.room.message";

/// A room event as pushed by the homeserver.
///
/// `content` is kept as raw JSON because state and custom events carry
/// arbitrary shapes that must not fail deserialization of the whole batch.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl RoomEvent {
    /// Text body of a message event, if the content carries one.
    pub fn body(&self) -> Option<&str> {
        self.content.as_ref()?.get("body")?.as_str()
    }
}

/// Outcome of making sure a chat user exists.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provisioning {
    Created,
    AlreadyExists,
}

/// Posts text into a room on behalf of a user the bridge controls.
#[async_trait]
pub trait RoomSink: Send + Sync {
    async fn send_text(
        &self,
        sender: &VirtualIdentity,
        room_id: &str,
        text: &str,
    ) -> BridgeResult<()>;
}

/// The chat side operations the session needs during bring-up.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Verifies the application credentials with the homeserver.
    async fn register(&self) -> BridgeResult<()>;

    /// Starts accepting pushed events. Resolves once the listener is bound;
    /// serving continues in the background.
    async fn listen(&self) -> BridgeResult<()>;

    async fn ensure_registered(&self, user: &VirtualIdentity) -> BridgeResult<Provisioning>;

    async fn join_room(&self, user: &VirtualIdentity, room_id: &str) -> BridgeResult<()>;

    async fn send_text(
        &self,
        user: &VirtualIdentity,
        room_id: &str,
        text: &str,
    ) -> BridgeResult<()>;
}
