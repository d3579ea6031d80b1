//! Behavior Modules
//!
//! Each module is a self-contained policy that decides what movement or
//! interaction to request next while it is active. Modules are pluggable:
//! the startup profile selects which set runs, and every variant of the
//! agent is this one crate with a different profile, not a fork.
//!
//! All module state lives inside the per-session tasks or the session
//! context, so destroying the session resets every behavior to inactive.

pub mod harvest;
pub mod proximity_jump;
pub mod sentry;
pub mod wander;

use crate::client::{Control, GameActions};
use crate::session::Session;
use self::sentry::Sentry;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Duration of one world tick. Tick-denominated settings (e.g. the
/// random-move hold) are converted through this.
pub const TICK: std::time::Duration = std::time::Duration::from_millis(50);

/// Drive every control to neutral. A failure on one control is logged
/// and the remaining controls are still released.
pub async fn clear_controls(actions: &Arc<dyn GameActions>) {
    for control in Control::ALL {
        if let Err(e) = actions.set_control(control, false).await {
            warn!("Failed to release {} control: {e}", control.as_str());
        }
    }
}

/// Which behavior set an agent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorProfile {
    /// Idle wandering and the proximity-jump reflex.
    Wanderer,
    /// Wanderer plus crop harvesting and storage.
    Farmhand,
    /// Proximity-jump plus guard/patrol/follow combat behaviors.
    Sentry,
}

impl BehaviorProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorProfile::Wanderer => "wanderer",
            BehaviorProfile::Farmhand => "farmhand",
            BehaviorProfile::Sentry => "sentry",
        }
    }

    /// Whether the harvest module manages inventory for this profile.
    /// When it does not, collected items are tossed back.
    pub fn keeps_inventory(&self) -> bool {
        matches!(self, BehaviorProfile::Farmhand)
    }
}

impl FromStr for BehaviorProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wanderer" => Ok(BehaviorProfile::Wanderer),
            "farmhand" => Ok(BehaviorProfile::Farmhand),
            "sentry" => Ok(BehaviorProfile::Sentry),
            other => Err(format!(
                "unknown profile '{other}' (expected wanderer, farmhand, or sentry)"
            )),
        }
    }
}

/// The running behavior set for one session.
///
/// Dropping the handles does not stop the tasks; [`ActiveBehaviors::stop`]
/// aborts them explicitly during teardown.
pub struct ActiveBehaviors {
    tasks: Vec<JoinHandle<()>>,
    /// Present only for the sentry profile; command handlers and event
    /// dispatch reach the mode machine through this.
    pub sentry: Option<Arc<Sentry>>,
}

impl ActiveBehaviors {
    /// No behaviors running (degraded mode after a setup fault).
    pub fn none() -> Self {
        Self {
            tasks: Vec::new(),
            sentry: None,
        }
    }

    /// Start the behavior set selected by the session's profile.
    pub fn start(session: &Arc<Session>) -> Self {
        let profile = session.config.profile;
        let mut tasks = Vec::new();
        let mut sentry_handle = None;

        // Proximity jump runs in every profile.
        tasks.push(tokio::spawn(proximity_jump::run(Arc::clone(session))));

        match profile {
            BehaviorProfile::Wanderer => {
                tasks.push(tokio::spawn(wander::run(Arc::clone(session))));
            }
            BehaviorProfile::Farmhand => {
                tasks.push(tokio::spawn(wander::run(Arc::clone(session))));
                tasks.push(tokio::spawn(harvest::run(Arc::clone(session))));
            }
            BehaviorProfile::Sentry => {
                let sentry = Sentry::start(session);
                tasks.push(tokio::spawn(sentry::patrol_loop(
                    Arc::clone(&sentry),
                    Arc::clone(session),
                )));
                sentry_handle = Some(sentry);
            }
        }

        info!(
            "Behaviors started for session {} ({} profile)",
            session.id,
            profile.as_str()
        );

        Self {
            tasks,
            sentry: sentry_handle,
        }
    }

    /// Abort every behavior task. Idempotent; part of session teardown.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.sentry = None;
    }
}
