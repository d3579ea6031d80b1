//! fieldbot
//!
//! Persistent, auto-reconnecting game-world agent. Connects to a game
//! server, authenticates, and runs a small set of autonomous behaviors
//! while staying responsive to chat commands and console input. Every
//! agent variant is this one crate with a different behavior profile.
//!
//! # Architecture
//!
//! ```text
//! Game server ──► protocol client ──► Supervisor ──► Session
//!                  (GameConnector)        │             │
//!                                         │             ├── Behavior Arbiter (movement slot)
//!                                         │             ├── Wander / ProximityJump
//!                                         │             ├── Harvest-and-Store
//!                                         │             └── Guard/Patrol/Follow (sentry)
//!                                         ├── Command Surface (chat + console)
//!                                         └── Liveness endpoint (GET /)
//! ```
//!
//! The supervisor owns the one logical connection and the reconnect
//! loop; the session is per-connection state that never survives a
//! disconnect; the arbiter keeps behaviors from fighting over movement
//! controls. Pathfinding and combat targeting are external collaborators
//! behind the [`nav::Navigator`] and [`combat::Combat`] traits.

pub mod arbiter;
pub mod behaviors;
pub mod client;
pub mod combat;
pub mod commands;
pub mod config;
pub mod liveness;
pub mod nav;
pub mod session;
pub mod sim;
pub mod supervisor;

pub use arbiter::{BehaviorKind, MovementSlot, SlotGuard};
pub use behaviors::{ActiveBehaviors, BehaviorProfile};
pub use client::{
    ClientError, Control, GameActions, GameConnector, GameEvent, NavStatus, Vec3,
};
pub use combat::Combat;
pub use config::Config;
pub use nav::{Goal, Navigator};
pub use session::{MovementProfile, Session};
pub use supervisor::{Phase, PhaseCell, SessionEnd, Supervisor};
