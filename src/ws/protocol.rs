//! WebSocket protocol message definitions
//! These are the wire types the client receives from the session server

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::{EntityUpdate, Vec3};

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        server_time: u64,
    },

    /// Player joined the session
    PlayerJoined {
        player: PlayerInfo,
    },

    /// Player left the session
    PlayerLeft {
        user_id: Uuid,
        reason: String,
    },

    /// Single player's state changed
    EntityUpdate(EntityState),

    /// Batched player states (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        players: Vec<EntityState>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player info for lobby/join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: Uuid,
    pub display_name: String,
    /// Spawn position
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Spawn heading in radians
    #[serde(default)]
    pub rotation: f32,
}

impl PlayerInfo {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Player transform as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub user_id: Uuid,
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    /// Position Z
    pub z: f32,
    /// Yaw in radians
    pub rotation: f32,
    /// Per-player sequence number, increasing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
    /// Animation state label ("idle", "walk", "run", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

impl EntityState {
    pub fn into_update(self) -> (Uuid, EntityUpdate) {
        let update = EntityUpdate {
            position: Vec3::new(self.x, self.y, self.z),
            rotation: self.rotation,
            seq: self.seq,
            animation: self.animation,
        };
        (self.user_id, update)
    }
}

/// Wire decoding errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed server message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Non-finite value in {field} for {user_id}")]
    NonFinite { user_id: Uuid, field: &'static str },
}

/// Decode a text frame into a server message
pub fn decode_server_msg(text: &str) -> Result<ServerMsg, ProtocolError> {
    let msg: ServerMsg = serde_json::from_str(text)?;

    match &msg {
        ServerMsg::EntityUpdate(state) => validate(state)?,
        ServerMsg::Snapshot { players, .. } => {
            for state in players {
                validate(state)?;
            }
        }
        _ => {}
    }

    Ok(msg)
}

/// Encode a server message into a text frame
pub fn encode_server_msg(msg: &ServerMsg) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

fn validate(state: &EntityState) -> Result<(), ProtocolError> {
    let fields = [
        ("x", state.x),
        ("y", state.y),
        ("z", state.z),
        ("rotation", state.rotation),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(ProtocolError::NonFinite {
                user_id: state.user_id,
                field,
            });
        }
    }
    Ok(())
}
