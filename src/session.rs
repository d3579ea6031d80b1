//! Session State
//!
//! Per-connection mutable context. A [`Session`] becomes valid only after
//! a successful spawn and is discarded entirely on disconnect; nothing
//! in it survives a reconnect. Behaviors receive the session as an
//! explicit `Arc` and must check [`Session::is_ready`] before every
//! action; there is no ambient global bot state.

use crate::arbiter::MovementSlot;
use crate::client::{ClientError, GameActions, Vec3};
use crate::combat::Combat;
use crate::config::Config;
use crate::nav::Navigator;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Movement capabilities handed to the navigation engine.
///
/// Read-only after initialization. The defaults are a deliberate safety
/// policy: the agent may jump, parkour, and move freely, but must never
/// modify world terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementProfile {
    pub can_jump_while_moving: bool,
    pub allow_parkour: bool,
    pub allow_free_motion: bool,
    pub can_dig: bool,
    pub can_build: bool,
}

impl Default for MovementProfile {
    fn default() -> Self {
        Self {
            can_jump_while_moving: true,
            allow_parkour: true,
            allow_free_motion: true,
            can_dig: false,
            can_build: false,
        }
    }
}

/// Live context for one connection.
pub struct Session {
    pub id: Uuid,
    pub actions: Arc<dyn GameActions>,
    pub nav: Arc<dyn Navigator>,
    pub combat: Arc<dyn Combat>,
    pub slot: Arc<MovementSlot>,
    pub profile: MovementProfile,
    pub config: Arc<Config>,
    pub connected_at: DateTime<Utc>,
    alive: AtomicBool,
    initialized: AtomicBool,
    spawn_position: Mutex<Option<Vec3>>,
}

impl Session {
    pub fn new(
        actions: Arc<dyn GameActions>,
        nav: Arc<dyn Navigator>,
        combat: Arc<dyn Combat>,
        config: Arc<Config>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            actions,
            nav,
            combat,
            slot: MovementSlot::new(),
            profile: MovementProfile::default(),
            config,
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
            initialized: AtomicBool::new(false),
            spawn_position: Mutex::new(None),
        })
    }

    /// Spawn-time initialization. Called once per Active phase; a
    /// duplicate spawn signal is ignored. On error the session stays
    /// alive but is never marked ready, so the agent remains connected in
    /// a degraded mode without autonomous behaviors.
    pub fn on_spawn(&self) -> Result<bool, ClientError> {
        if self.initialized.load(Ordering::Acquire) {
            warn!("Duplicate spawn signal ignored (session {})", self.id);
            return Ok(false);
        }

        self.nav.set_capability_profile(&self.profile);

        let position = self
            .actions
            .self_position()
            .ok_or_else(|| ClientError::QueryFailed("own entity not loaded at spawn".into()))?;
        *self.spawn_position.lock() = Some(position);

        let others = self
            .actions
            .query_players()
            .iter()
            .filter(|p| p.entity_id != Some(self.actions.self_id()))
            .count();
        info!(
            "Spawned at {} in world version {} ({} other players connected)",
            position,
            self.actions.world_version(),
            others
        );

        self.initialized.store(true, Ordering::Release);
        Ok(true)
    }

    /// Whether the connection backing this session is still live.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Alive and spawn initialization completed, so safe to act on.
    pub fn is_ready(&self) -> bool {
        self.is_alive() && self.initialized.load(Ordering::Acquire)
    }

    /// Position recorded at spawn, the anchor for patrol endpoints.
    pub fn spawn_position(&self) -> Option<Vec3> {
        *self.spawn_position.lock()
    }

    /// Mark the session dead. Idempotent; late timer firings observe this
    /// and no-op.
    pub fn shut_down(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            let lifetime = Utc::now().signed_duration_since(self.connected_at);
            info!(
                "Session {} destroyed after {}s",
                self.id,
                lifetime.num_seconds()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHarness;

    #[tokio::test]
    async fn test_on_spawn_is_idempotent() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        let session = &harness.session;

        assert!(session.on_spawn().expect("first spawn initializes"));
        assert!(session.is_ready());

        // Duplicate spawn signal must not double-initialize.
        assert!(!session.on_spawn().expect("duplicate spawn is a no-op"));
        assert!(session.is_ready());
    }

    #[test]
    fn test_capability_profile_is_fixed_policy() {
        let profile = MovementProfile::default();
        assert!(profile.can_jump_while_moving);
        assert!(profile.allow_parkour);
        assert!(profile.allow_free_motion);
        assert!(!profile.can_dig);
        assert!(!profile.can_build);
    }

    #[tokio::test]
    async fn test_on_spawn_hands_profile_to_navigator() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");

        let profile = harness.nav.profile().expect("profile installed");
        assert_eq!(profile, MovementProfile::default());
    }

    #[tokio::test]
    async fn test_setup_fault_leaves_session_unready() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.set_self_loaded(false);

        assert!(harness.session.on_spawn().is_err());
        assert!(harness.session.is_alive(), "still connected");
        assert!(!harness.session.is_ready(), "but never ready");
    }

    #[tokio::test]
    async fn test_shut_down_clears_ready() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        let session = &harness.session;

        session.on_spawn().expect("spawn");
        assert!(session.is_ready());

        session.shut_down();
        assert!(!session.is_alive());
        assert!(!session.is_ready());
        session.shut_down(); // idempotent
    }
}
