//! Proximity Jump
//!
//! Reflex that hops when another player stands close. Deliberately
//! independent of the movement slot: it only toggles the jump control,
//! which is safe to run alongside most other behaviors; serializing it
//! through the slot would stop the agent from jumping while wandering.

use crate::client::{Control, Vec3};
use crate::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long the jump control stays engaged once triggered.
pub const JUMP_HOLD: Duration = Duration::from_millis(100);

/// Whether any position is within `radius` of `self_pos`. The boundary
/// is inclusive: a player at exactly `radius` triggers.
pub fn any_within(self_pos: Vec3, positions: &[Vec3], radius: f64) -> bool {
    positions.iter().any(|p| self_pos.distance_to(*p) <= radius)
}

/// Jump-check scheduling loop. Aborted with the session.
pub async fn run(session: Arc<Session>) {
    let mut interval = tokio::time::interval(session.config.jump_check_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        check_once(&session).await;
    }
}

/// One check cycle: engage jump if a player is close and it is not
/// already engaged; otherwise make sure it is released.
pub(crate) async fn check_once(session: &Arc<Session>) {
    if !session.is_ready() || session.nav.is_navigating() {
        return;
    }
    let Some(self_pos) = session.actions.self_position() else {
        return;
    };

    let self_id = session.actions.self_id();
    let positions: Vec<Vec3> = session
        .actions
        .query_players()
        .iter()
        .filter(|p| p.entity_id != Some(self_id))
        .filter_map(|p| p.position)
        .collect();

    if any_within(self_pos, &positions, session.config.jump_radius) {
        if !session.actions.control_state(Control::Jump) {
            debug!(
                "ProximityJump: player within {} blocks, jumping",
                session.config.jump_radius
            );
            if let Err(e) = session.actions.set_control(Control::Jump, true).await {
                warn!("ProximityJump: failed to engage jump: {e}");
                return;
            }
            tokio::time::sleep(JUMP_HOLD).await;
            if let Err(e) = session.actions.set_control(Control::Jump, false).await {
                warn!("ProximityJump: failed to release jump: {e}");
            }
        }
    } else if session.actions.control_state(Control::Jump) {
        if let Err(e) = session.actions.set_control(Control::Jump, false).await {
            warn!("ProximityJump: failed to release jump: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GameActions;
    use crate::config::Config;
    use crate::nav::Navigator;
    use crate::sim::SimHarness;

    fn positions(distances: &[f64]) -> Vec<Vec3> {
        // Place each player along the x axis at the given distance.
        distances.iter().map(|d| Vec3::new(*d, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_triggers_inside_radius() {
        let origin = Vec3::new(0.0, 0.0, 0.0);
        assert!(any_within(origin, &positions(&[5.0, 2.9, 10.0]), 3.0));
    }

    #[test]
    fn test_ignores_outside_radius() {
        let origin = Vec3::new(0.0, 0.0, 0.0);
        assert!(!any_within(origin, &positions(&[5.0, 3.1, 10.0]), 3.0));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let origin = Vec3::new(0.0, 0.0, 0.0);
        assert!(any_within(origin, &positions(&[3.0]), 3.0));
    }

    #[test]
    fn test_no_players_never_triggers() {
        let origin = Vec3::new(0.0, 0.0, 0.0);
        assert!(!any_within(origin, &[], 3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_player_triggers_jump_pulse() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.add_player("visitor", 2, Vec3::new(2.0, 64.0, 0.0));
        harness.session.on_spawn().expect("spawn");

        check_once(&harness.session).await;

        let log = harness.actions.control_log();
        assert!(log.contains(&(Control::Jump, true)), "jump never engaged");
        assert_eq!(
            log.last(),
            Some(&(Control::Jump, false)),
            "jump left engaged after the pulse"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stray_jump_released_when_alone() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.session.on_spawn().expect("spawn");
        harness
            .actions
            .set_control(Control::Jump, true)
            .await
            .expect("set");

        check_once(&harness.session).await;

        assert!(!harness.actions.control_state(Control::Jump));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_while_navigating() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.add_player("visitor", 2, Vec3::new(2.0, 64.0, 0.0));
        harness.session.on_spawn().expect("spawn");
        harness
            .nav
            .set_goal(Some(crate::nav::Goal::MoveTo(Vec3::new(9.0, 64.0, 0.0))));

        check_once(&harness.session).await;

        assert!(!harness.actions.control_log().contains(&(Control::Jump, true)));
    }
}
