//! Wire protocol shared by the arena server, its test client and the integration tests.
//!
//! Every WebSocket text frame carries a JSON envelope `{"event": <name>, "data": <payload>}`.
//! Outbound events are modelled by [`ServerEvent`]; inbound frames are parsed into [`Frame`]
//! and their payloads into [`Movement`], [`Hit`] or a free-form shot object.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const SPAWN_X: f64 = 100.0;
pub const SPAWN_Y: f64 = 100.0;
pub const STARTING_HEALTH: f64 = 100.0;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;

/// Handshake frame sent to a single connection carrying its session id.
pub const SESSION_EVENT: &str = "session";

pub const PLAYER_MOVEMENT: &str = "playerMovement";
pub const SHOOT: &str = "shoot";
pub const PLAYER_HIT: &str = "playerHit";
pub const RESTART_GAME: &str = "restartGame";

/// Opaque identifier assigned to a connection by the transport.
pub type SessionId = String;

/// Registry snapshot as sent in `currentPlayers` and `gameRestarted`, in connect order.
pub type PlayerSnapshot = IndexMap<SessionId, Player>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(with = "number")]
    pub x: f64,
    #[serde(with = "number")]
    pub y: f64,
    pub block: bool,
    #[serde(with = "number")]
    pub last_shot: f64,
    #[serde(with = "number")]
    pub health: f64,
    pub alive: bool,
    pub number: u64,
    pub upgrade: i64,
}

impl Player {
    pub fn new(number: u64) -> Self {
        Self {
            x: SPAWN_X,
            y: SPAWN_Y,
            block: false,
            last_shot: 0.0,
            health: STARTING_HEALTH,
            alive: true,
            number,
            upgrade: 0,
        }
    }

    /// Puts the player back at the spawn point with full health.
    ///
    /// `block`, `last_shot`, `number` and `upgrade` survive a restart.
    pub fn respawn(&mut self) {
        self.health = STARTING_HEALTH;
        self.alive = true;
        self.x = SPAWN_X;
        self.y = SPAWN_Y;
    }
}

/// Events broadcast by the server to every connected session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    CurrentPlayers(PlayerSnapshot),
    PlayerDisconnected(SessionId),
    PlayerMoved(PlayerMoved),
    BulletShot(Map<String, Value>),
    PlayerDied(SessionId),
    UpdateHealth(HealthUpdate),
    GameOver(SessionId),
    GameRestarted(PlayerSnapshot),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::CurrentPlayers(_) => "currentPlayers",
            ServerEvent::PlayerDisconnected(_) => "playerDisconnected",
            ServerEvent::PlayerMoved(_) => "playerMoved",
            ServerEvent::BulletShot(_) => "bulletShot",
            ServerEvent::PlayerDied(_) => "playerDied",
            ServerEvent::UpdateHealth(_) => "updateHealth",
            ServerEvent::GameOver(_) => "gameOver",
            ServerEvent::GameRestarted(_) => "gameRestarted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMoved {
    pub id: SessionId,
    #[serde(with = "number")]
    pub x: f64,
    #[serde(with = "number")]
    pub y: f64,
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthUpdate {
    pub id: SessionId,
    #[serde(with = "number")]
    pub health: f64,
}

/// A raw inbound or outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new<T: Serialize>(event: &str, data: T) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn session(id: &str) -> Self {
        Self {
            event: SESSION_EVENT.to_string(),
            data: Value::String(id.to_string()),
        }
    }
}

/// `playerMovement` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(with = "number")]
    pub x: f64,
    #[serde(with = "number")]
    pub y: f64,
    #[serde(default, deserialize_with = "null_as_false")]
    pub block: bool,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// `playerHit` payload.
///
/// `target` stays a raw JSON value: anything that is not the string id of a
/// connected player simply misses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(default)]
    pub target: Option<Value>,
    #[serde(default, with = "number")]
    pub damage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shooter: Option<Value>,
}

impl Hit {
    pub fn target_id(&self) -> Option<&str> {
        self.target.as_ref().and_then(Value::as_str)
    }
}

/// Serializes whole doubles as JSON integers so `100.0` goes out as `100`.
pub mod number {
    use serde::{Deserialize, Deserializer, Serializer};

    // Largest magnitude where every integer is exactly representable in an f64.
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT {
            serializer.serialize_i64(*value as i64)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        f64::deserialize(deserializer)
    }
}
