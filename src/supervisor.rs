//! Connection Supervisor
//!
//! Owns the one logical connection to the game server and drives the
//! lifecycle: `Disconnected → Connecting → Authenticating → Active →
//! Disconnecting → Disconnected`, then reconnect after a fixed delay,
//! forever. This is the only code path that creates connections, and
//! teardown always completes (idempotently) before the next attempt, so
//! two live connections are structurally impossible.
//!
//! Every external signal for a connection arrives on one event stream
//! and is consumed a single event at a time; each maps to exactly one
//! state transition or one behavior-module notification.

use crate::behaviors::{self, ActiveBehaviors};
use crate::client::{
    Credentials, EntityId, GameActions, GameConnector, GameEvent, Item, NavStatus,
};
use crate::combat::Combat;
use crate::commands;
use crate::config::Config;
use crate::nav::Navigator;
use crate::session::Session;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Connection lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Disconnected = 0,
    Connecting = 1,
    Authenticating = 2,
    Active = 3,
    Disconnecting = 4,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Disconnected => "disconnected",
            Phase::Connecting => "connecting",
            Phase::Authenticating => "authenticating",
            Phase::Active => "active",
            Phase::Disconnecting => "disconnecting",
        }
    }

    fn from_u8(v: u8) -> Phase {
        match v {
            1 => Phase::Connecting,
            2 => Phase::Authenticating,
            3 => Phase::Active,
            4 => Phase::Disconnecting,
            _ => Phase::Disconnected,
        }
    }
}

/// Shared, lock-free view of the current phase.
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(Phase::Disconnected as u8)))
    }

    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, phase: Phase) {
        let old = self.0.swap(phase as u8, Ordering::AcqRel);
        if old != phase as u8 {
            debug!(
                "Connection phase: {} -> {}",
                Phase::from_u8(old).as_str(),
                phase.as_str()
            );
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Kicked(String),
    Disconnected(String),
    ProtocolError(String),
    EndOfStream,
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Kicked(reason) => write!(f, "kicked ({reason})"),
            SessionEnd::Disconnected(reason) => write!(f, "disconnected ({reason})"),
            SessionEnd::ProtocolError(message) => write!(f, "protocol error ({message})"),
            SessionEnd::EndOfStream => write!(f, "event stream closed"),
            SessionEnd::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// Long-running connection owner.
pub struct Supervisor {
    connector: Arc<dyn GameConnector>,
    nav: Arc<dyn Navigator>,
    combat: Arc<dyn Combat>,
    config: Arc<Config>,
    phase: Arc<PhaseCell>,
    console_rx: Option<mpsc::Receiver<String>>,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn GameConnector>,
        nav: Arc<dyn Navigator>,
        combat: Arc<dyn Combat>,
        config: Arc<Config>,
        console_rx: mpsc::Receiver<String>,
    ) -> Self {
        Self {
            connector,
            nav,
            combat,
            config,
            phase: PhaseCell::new(),
            console_rx: Some(console_rx),
        }
    }

    /// Cloneable handle to the current phase, for observers.
    pub fn phase(&self) -> Arc<PhaseCell> {
        Arc::clone(&self.phase)
    }

    /// Run until shutdown is signalled. Connection failures and session
    /// ends are never fatal: the supervisor logs, waits the configured
    /// delay, and tries again, with no retry cap.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut console_rx = self.console_rx.take();

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.phase.set(Phase::Connecting);
            let address = self.config.address();
            let credentials = Credentials {
                username: self.config.username.clone(),
                password: self.config.password.clone(),
            };
            info!("Connecting to {} as {}", address, credentials.username);

            match self.connector.connect(&address, &credentials).await {
                Ok((actions, events)) => {
                    // Credentials went out with the handshake; nothing to
                    // wait for but the spawn signal.
                    self.phase.set(Phase::Authenticating);
                    let end = self
                        .drive_session(actions, events, &mut console_rx, &mut shutdown)
                        .await;
                    info!("Session over: {end}");
                    if end == SessionEnd::Shutdown {
                        break;
                    }
                }
                Err(e) => error!("Connection attempt failed: {e}"),
            }

            self.phase.set(Phase::Disconnected);
            info!(
                "Reconnecting in {} seconds",
                self.config.reconnect_delay.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        self.phase.set(Phase::Disconnected);
        info!("Supervisor stopped");
    }

    /// Consume one connection's events until a terminal signal, then
    /// tear the session down. Always returns with teardown completed.
    async fn drive_session(
        &self,
        actions: Arc<dyn GameActions>,
        mut events: mpsc::Receiver<GameEvent>,
        console_rx: &mut Option<mpsc::Receiver<String>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let session = Session::new(
            Arc::clone(&actions),
            Arc::clone(&self.nav),
            Arc::clone(&self.combat),
            Arc::clone(&self.config),
        );
        let mut behaviors = ActiveBehaviors::none();

        let end = loop {
            tokio::select! {
                event = events.recv() => match event {
                    None => break SessionEnd::EndOfStream,
                    Some(GameEvent::Kicked { reason }) => break SessionEnd::Kicked(reason),
                    Some(GameEvent::Disconnected { reason }) => break SessionEnd::Disconnected(reason),
                    Some(GameEvent::ProtocolError { message }) => break SessionEnd::ProtocolError(message),
                    Some(event) => self.dispatch(&session, &mut behaviors, event).await,
                },
                line = recv_console(console_rx) => match line {
                    Some(line) => commands::handle_console_line(&session, &line).await,
                    None => *console_rx = None,
                },
                _ = recv_shutdown(shutdown) => break SessionEnd::Shutdown,
            }
        };

        self.teardown(&session, &mut behaviors, &end).await;
        end
    }

    /// Map one non-terminal event to its transition or notification.
    async fn dispatch(
        &self,
        session: &Arc<Session>,
        behaviors: &mut ActiveBehaviors,
        event: GameEvent,
    ) {
        match event {
            GameEvent::Spawned => match session.on_spawn() {
                Ok(true) => {
                    self.phase.set(Phase::Active);
                    *behaviors = ActiveBehaviors::start(session);
                }
                Ok(false) => {}
                Err(e) => {
                    // Degraded but alive: stay connected, run nothing.
                    error!("Spawn setup failed, staying connected without behaviors: {e}");
                }
            },
            GameEvent::Chat { sender, text } => {
                commands::handle_chat(session, behaviors.sentry.as_ref(), &sender, &text).await;
            }
            GameEvent::ItemCollected { collector, item } => {
                self.on_item_collected(session, collector, item).await;
            }
            GameEvent::Navigation { goal_id, status } => match status {
                NavStatus::Success => info!("Navigation goal {goal_id} reached"),
                NavStatus::NoPath => warn!("No path found for navigation goal {goal_id}"),
                NavStatus::Stopped => info!("Navigation goal {goal_id} stopped"),
            },
            GameEvent::CombatDisengaged => {
                if let Some(sentry) = behaviors.sentry.as_ref() {
                    sentry.on_disengaged(session);
                }
            }
            GameEvent::Tick => {
                if let Some(sentry) = behaviors.sentry.as_ref() {
                    sentry.on_tick(session).await;
                }
            }
            // Terminal events are matched in the session loop.
            GameEvent::Kicked { .. }
            | GameEvent::Disconnected { .. }
            | GameEvent::ProtocolError { .. } => {}
        }
    }

    /// Profiles without the harvest module do not manage inventory:
    /// anything the agent picks up is tossed back.
    async fn on_item_collected(&self, session: &Arc<Session>, collector: EntityId, item: Item) {
        if collector != session.actions.self_id() || self.config.profile.keeps_inventory() {
            return;
        }
        if let Err(e) = session.actions.drop_item(&item).await {
            warn!("Failed to toss collected {}: {e}", item.name);
        }
    }

    /// Destroy the session, stop behaviors, neutralize all controls,
    /// free the movement slot. Idempotent, and no step can prevent the
    /// later ones, so the reconnect timer is always armed afterwards.
    async fn teardown(
        &self,
        session: &Arc<Session>,
        behaviors: &mut ActiveBehaviors,
        end: &SessionEnd,
    ) {
        self.phase.set(Phase::Disconnecting);
        session.shut_down();
        behaviors.stop();
        self.combat.stop_attacking();
        self.nav.set_goal(None);
        behaviors::clear_controls(&session.actions).await;
        session.slot.clear();
        if *end == SessionEnd::Shutdown {
            session.actions.disconnect("Shutting down").await;
        }
    }
}

/// Receive a console line, or park forever once the console is gone.
async fn recv_console(rx: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Resolve once shutdown is signalled. The `watch::Ref` guard returned by
/// `wait_for` is dropped here rather than surfaced to the `select!`, so the
/// enclosing future stays `Send` (the guard is `!Send`).
async fn recv_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
