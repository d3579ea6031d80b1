//! Idle Wandering
//!
//! Periodically shuffles the agent around: pick one of the four movement
//! directions at random, sometimes jump, hold the input for a fixed
//! number of ticks, then return everything to neutral. Only acts when
//! the movement slot is free and no navigation goal is active.

use crate::arbiter::BehaviorKind;
use crate::behaviors::{clear_controls, TICK};
use crate::client::{ClientError, Control};
use crate::session::Session;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

/// Wander scheduling loop. Aborted with the session.
pub async fn run(session: Arc<Session>) {
    let mut interval = tokio::time::interval(session.config.wander_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        wander_once(&session).await;
    }
}

/// One scheduling cycle. Returns whether a move was performed.
///
/// The slot guard and the unconditional control reset together guarantee
/// that a failure mid-move still leaves neutral inputs and a free slot.
pub(crate) async fn wander_once(session: &Arc<Session>) -> bool {
    if !session.is_ready() || session.nav.is_navigating() {
        return false;
    }
    let Some(_guard) = session.slot.guard(BehaviorKind::Wander) else {
        return false;
    };

    if let Err(e) = burst(session).await {
        warn!("Wander: random move failed: {e}");
    }
    clear_controls(&session.actions).await;
    true
}

async fn burst(session: &Session) -> Result<(), ClientError> {
    let (direction, jump) = {
        let mut rng = rand::thread_rng();
        let direction = Control::MOVEMENT[rng.gen_range(0..Control::MOVEMENT.len())];
        (direction, rng.gen_bool(0.5))
    };
    let ticks = session.config.random_move_ticks;
    debug!(
        "Wander: moving {} for {} ticks (jump: {})",
        direction.as_str(),
        ticks,
        jump
    );

    session.actions.set_control(direction, true).await?;
    if jump {
        session.actions.set_control(Control::Jump, true).await?;
    }
    tokio::time::sleep(TICK * ticks).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GameActions;
    use crate::config::Config;
    use crate::nav::Navigator;
    use crate::sim::SimHarness;

    #[tokio::test(start_paused = true)]
    async fn test_wander_resets_controls_and_slot() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");

        assert!(wander_once(&harness.session).await);

        for control in Control::ALL {
            assert!(
                !harness.actions.control_state(control),
                "{} still engaged after wander",
                control.as_str()
            );
        }
        assert!(!harness.session.slot.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wander_backs_off_when_slot_held() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");

        assert!(harness.session.slot.acquire(BehaviorKind::Harvest));
        assert!(!wander_once(&harness.session).await);
        for control in Control::ALL {
            assert!(!harness.actions.control_state(control));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wander_skips_while_navigating() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");

        harness
            .nav
            .set_goal(Some(crate::nav::Goal::MoveTo(crate::client::Vec3::new(
                1.0, 0.0, 1.0,
            ))));
        assert!(!wander_once(&harness.session).await);
        assert!(!harness.session.slot.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wander_noops_before_spawn() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        assert!(!wander_once(&harness.session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wander_failure_still_frees_slot() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");
        harness.actions.set_fail_actions(true);

        assert!(wander_once(&harness.session).await);
        assert!(!harness.session.slot.is_held(), "slot leaked on failure");
    }
}
