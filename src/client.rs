//! Game Protocol Client Seam
//!
//! Narrow interface over the game-protocol client. The agent core never
//! talks to a socket directly: a [`GameConnector`] produces, per
//! connection attempt, an action handle ([`GameActions`]) plus a stream
//! of [`GameEvent`]s, and everything else in this crate is written
//! against those two. Real protocol adapters implement the traits in
//! their own crate; [`crate::sim`] provides the in-process
//! implementation used for offline runs and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Entity identifier as reported by the protocol client.
pub type EntityId = u64;

/// Error types for protocol-client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("World query failed: {0}")]
    QueryFailed(String),

    #[error("Container operation failed: {0}")]
    Container(String),
}

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Movement and jump controls the agent can drive directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    Forward,
    Back,
    Left,
    Right,
    Jump,
}

impl Control {
    /// The four horizontal movement inputs.
    pub const MOVEMENT: [Control; 4] =
        [Control::Forward, Control::Back, Control::Left, Control::Right];

    /// Every control, movement plus jump. Used when resetting to neutral.
    pub const ALL: [Control; 5] = [
        Control::Forward,
        Control::Back,
        Control::Left,
        Control::Right,
        Control::Jump,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Control::Forward => "forward",
            Control::Back => "back",
            Control::Left => "left",
            Control::Right => "right",
            Control::Jump => "jump",
        }
    }
}

/// A block as returned by a world query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub kind: String,
    pub position: Vec3,
    /// Growth stage for crops; `None` for blocks without one.
    pub growth_stage: Option<u8>,
}

/// Another player known to the client, with a position when their entity
/// is currently loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub username: String,
    pub entity_id: Option<EntityId>,
    pub position: Option<Vec3>,
}

/// An entity known to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub kind: String,
    pub position: Vec3,
}

/// An inventory item stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub count: u32,
}

/// Filter for [`GameActions::query_blocks`].
#[derive(Debug, Clone)]
pub struct BlockQuery {
    /// Block kinds to match, e.g. crop or container names.
    pub kinds: Vec<String>,
    /// Search radius around the agent, in blocks.
    pub radius: f64,
}

/// Handle for an opened storage container.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub id: u64,
    pub position: Vec3,
}

/// Terminal status of a navigation goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavStatus {
    Success,
    NoPath,
    Stopped,
}

/// Events delivered by the protocol client for one connection.
///
/// Every external signal the agent reacts to arrives through this one
/// stream, consumed a single event at a time by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameEvent {
    /// The agent's entity spawned into the world.
    Spawned,
    /// A chat message was received.
    Chat { sender: String, text: String },
    /// An entity picked up a dropped item.
    ItemCollected { collector: EntityId, item: Item },
    /// The server kicked the agent.
    Kicked { reason: String },
    /// A fatal protocol-level error.
    ProtocolError { message: String },
    /// The connection ended.
    Disconnected { reason: String },
    /// A navigation goal reached a terminal status.
    Navigation { goal_id: u64, status: NavStatus },
    /// The combat collaborator lost or dropped its target.
    CombatDisengaged,
    /// One world tick elapsed.
    Tick,
}

/// Credentials sent once on connect, fire-and-forget.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Actions and world queries available while a connection is live.
///
/// Queries are synchronous reads of the client's cached world view;
/// actions go to the server and may fail.
#[async_trait]
pub trait GameActions: Send + Sync {
    /// The agent's own entity id.
    fn self_id(&self) -> EntityId;

    /// The agent's position, if its entity is loaded.
    fn self_position(&self) -> Option<Vec3>;

    /// Server/world version tag, for logging.
    fn world_version(&self) -> String;

    async fn set_control(&self, control: Control, state: bool) -> Result<(), ClientError>;

    /// Current state of a control, as last driven.
    fn control_state(&self, control: Control) -> bool;

    async fn face_direction(&self, position: Vec3) -> Result<(), ClientError>;

    async fn trigger_interact(&self, block: &BlockInfo) -> Result<(), ClientError>;

    async fn send_chat(&self, text: &str) -> Result<(), ClientError>;

    async fn drop_item(&self, item: &Item) -> Result<(), ClientError>;

    fn query_players(&self) -> Vec<PlayerInfo>;

    /// Entities within `radius` of the agent.
    fn query_entities(&self, radius: f64) -> Vec<EntityInfo>;

    fn query_blocks(&self, query: &BlockQuery) -> Vec<BlockInfo>;

    fn inventory(&self) -> Vec<Item>;

    /// External signal: no free inventory slot remains.
    fn inventory_full(&self) -> bool;

    async fn open_container(&self, position: Vec3) -> Result<ContainerHandle, ClientError>;

    async fn deposit_item(
        &self,
        container: &ContainerHandle,
        item: &Item,
    ) -> Result<(), ClientError>;

    /// Close the connection with a reason. Best-effort.
    async fn disconnect(&self, reason: &str);
}

/// Factory for connections. The supervisor is the only caller.
#[async_trait]
pub trait GameConnector: Send + Sync {
    /// Open a connection, sending `credentials` once during the
    /// handshake. Yields the action handle and the event stream for this
    /// connection; the stream closing is equivalent to a disconnect.
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
    ) -> Result<(Arc<dyn GameActions>, mpsc::Receiver<GameEvent>), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance_to(b), 5.0);
        assert_eq!(b.distance_to(a), 5.0);
    }

    #[test]
    fn test_control_sets() {
        assert_eq!(Control::MOVEMENT.len(), 4);
        assert!(!Control::MOVEMENT.contains(&Control::Jump));
        assert!(Control::ALL.contains(&Control::Jump));
    }
}
