//! Harvest and Store
//!
//! Scans for fully-grown crops, collects them, and carries the loot to
//! the nearest storage container. One harvest may be in flight at a
//! time; the in-flight flag is cleared on every exit path so a failed
//! interaction never wedges the module.

use crate::client::{BlockInfo, BlockQuery, ClientError};
use crate::nav::{await_navigation, Goal};
use crate::session::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Crop kinds worth harvesting.
pub const CROP_KINDS: [&str; 4] = ["wheat", "carrots", "potatoes", "beetroots"];

/// Storage container kinds accepted for deposits.
pub const CONTAINER_KINDS: [&str; 2] = ["chest", "barrel"];

/// Growth stage at which a crop counts as fully grown.
pub const GROWN_STAGE: u8 = 7;

/// Reach within which the agent interacts instead of walking closer.
pub const INTERACT_RANGE: f64 = 4.0;

/// Pause between breaking a crop and heading for storage, letting the
/// drop land and get picked up.
const COLLECT_DELAY: Duration = Duration::from_millis(1_000);

const NAV_POLL: Duration = Duration::from_millis(250);

/// First fully-grown crop in query order. The tie-break is first match,
/// not nearest.
pub fn select_target(blocks: &[BlockInfo]) -> Option<&BlockInfo> {
    blocks.iter().find(|b| b.growth_stage == Some(GROWN_STAGE))
}

/// Harvest scheduling loop. Aborted with the session; the in-flight
/// flag dies with it, so nothing persists across reconnects.
pub async fn run(session: Arc<Session>) {
    let in_flight = AtomicBool::new(false);
    let mut interval = tokio::time::interval(session.config.harvest_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        harvest_tick(&session, &in_flight).await;
    }
}

/// One scheduling cycle. Skips when a harvest is in flight, inventory is
/// full, or an approach from a previous cycle is still navigating; the
/// next tick re-evaluates from scratch.
pub(crate) async fn harvest_tick(session: &Arc<Session>, in_flight: &AtomicBool) {
    if !session.is_ready() || in_flight.load(Ordering::Acquire) {
        return;
    }
    if session.actions.inventory_full() {
        debug!("Harvest: inventory full, waiting for a deposit");
        return;
    }
    if session.nav.is_navigating() {
        return;
    }

    let blocks = session.actions.query_blocks(&BlockQuery {
        kinds: CROP_KINDS.iter().map(|k| k.to_string()).collect(),
        radius: session.config.harvest_radius,
    });
    let Some(target) = select_target(&blocks).cloned() else {
        return;
    };

    in_flight.store(true, Ordering::Release);
    let _clear = InFlightGuard(in_flight);

    if let Err(e) = harvest_once(session, &target).await {
        warn!(
            "Harvest: {} at {} failed: {e}",
            target.kind, target.position
        );
    }
}

async fn harvest_once(session: &Arc<Session>, block: &BlockInfo) -> Result<(), ClientError> {
    let self_pos = session
        .actions
        .self_position()
        .ok_or(ClientError::NotConnected)?;

    if self_pos.distance_to(block.position) <= INTERACT_RANGE {
        session.actions.face_direction(block.position).await?;
        session.actions.trigger_interact(block).await?;
        debug!("Harvest: collected {} at {}", block.kind, block.position);
        tokio::time::sleep(COLLECT_DELAY).await;
        deposit_all(session).await
    } else {
        debug!("Harvest: approaching {} at {}", block.kind, block.position);
        session.nav.set_goal(Some(Goal::MoveTo(block.position)));
        Ok(())
    }
}

/// Walk to the nearest container and deposit everything carried.
async fn deposit_all(session: &Arc<Session>) -> Result<(), ClientError> {
    let carried = session.actions.inventory();
    if carried.is_empty() {
        return Ok(());
    }
    let self_pos = session
        .actions
        .self_position()
        .ok_or(ClientError::NotConnected)?;

    let containers = session.actions.query_blocks(&BlockQuery {
        kinds: CONTAINER_KINDS.iter().map(|k| k.to_string()).collect(),
        radius: session.config.harvest_radius,
    });
    let Some(container) = containers.iter().min_by(|a, b| {
        self_pos
            .distance_to(a.position)
            .partial_cmp(&self_pos.distance_to(b.position))
            .unwrap_or(std::cmp::Ordering::Equal)
    }) else {
        debug!("Harvest: no storage container in range, keeping the loot");
        return Ok(());
    };

    session.nav.set_goal(Some(Goal::MoveTo(container.position)));
    await_navigation(session.nav.as_ref(), NAV_POLL).await;

    let handle = session.actions.open_container(container.position).await?;
    let mut deposited = 0usize;
    for item in &carried {
        session.actions.deposit_item(&handle, item).await?;
        deposited += 1;
    }
    info!(
        "Harvest: deposited {} stacks into {} at {}",
        deposited, container.kind, container.position
    );
    Ok(())
}

/// Clears the in-flight flag when the harvest scope exits, by any path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Item, Vec3};
    use crate::config::Config;
    use crate::sim::SimHarness;

    fn crop(kind: &str, x: f64, stage: u8) -> BlockInfo {
        BlockInfo {
            kind: kind.to_string(),
            position: Vec3::new(x, 0.0, 0.0),
            growth_stage: Some(stage),
        }
    }

    #[test]
    fn test_select_target_first_grown_in_order() {
        let blocks = vec![
            crop("wheat", 1.0, 3),
            crop("wheat", 2.0, 7),
            crop("wheat", 3.0, 7),
            crop("wheat", 4.0, 5),
        ];
        let target = select_target(&blocks).expect("a grown crop exists");
        assert_eq!(target.position.x, 2.0);
    }

    #[test]
    fn test_select_target_none_grown() {
        let blocks = vec![crop("wheat", 1.0, 3), crop("carrots", 2.0, 6)];
        assert!(select_target(&blocks).is_none());
    }

    #[test]
    fn test_select_target_ignores_stageless_blocks() {
        let blocks = vec![BlockInfo {
            kind: "chest".to_string(),
            position: Vec3::new(1.0, 0.0, 0.0),
            growth_stage: None,
        }];
        assert!(select_target(&blocks).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_harvest_interacts_and_deposits() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.add_block("wheat", Vec3::new(2.0, 64.0, 0.0), Some(GROWN_STAGE));
        harness.world.add_block("chest", Vec3::new(3.0, 64.0, 0.0), None);
        harness.world.set_inventory(vec![Item {
            name: "wheat".to_string(),
            count: 12,
        }]);
        harness.session.on_spawn().expect("spawn");

        let in_flight = AtomicBool::new(false);
        harvest_tick(&harness.session, &in_flight).await;

        assert_eq!(harness.actions.interactions().len(), 1);
        assert_eq!(harness.world.deposited().len(), 1);
        assert!(!in_flight.load(Ordering::Acquire), "in-flight flag leaked");
    }

    #[tokio::test(start_paused = true)]
    async fn test_harvest_approaches_distant_crop() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.add_block("wheat", Vec3::new(10.0, 64.0, 0.0), Some(GROWN_STAGE));
        harness.session.on_spawn().expect("spawn");

        let in_flight = AtomicBool::new(false);
        harvest_tick(&harness.session, &in_flight).await;

        assert!(harness.actions.interactions().is_empty());
        assert_eq!(
            harness.nav.current_goal(),
            Some(Goal::MoveTo(Vec3::new(10.0, 64.0, 0.0)))
        );
        assert!(!in_flight.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn test_harvest_skips_when_inventory_full() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.add_block("wheat", Vec3::new(2.0, 64.0, 0.0), Some(GROWN_STAGE));
        harness.world.set_inventory_full(true);
        harness.session.on_spawn().expect("spawn");

        let in_flight = AtomicBool::new(false);
        harvest_tick(&harness.session, &in_flight).await;

        assert!(harness.actions.interactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_harvest_failure_clears_in_flight_flag() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.add_block("wheat", Vec3::new(2.0, 64.0, 0.0), Some(GROWN_STAGE));
        harness.session.on_spawn().expect("spawn");
        harness.actions.set_fail_actions(true);

        let in_flight = AtomicBool::new(false);
        harvest_tick(&harness.session, &in_flight).await;

        assert!(!in_flight.load(Ordering::Acquire), "in-flight flag leaked");
        assert!(harness.world.deposited().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_harvest_skips_ungrown_crops() {
        let harness = SimHarness::new(Arc::new(Config::default()));
        harness.world.add_block("wheat", Vec3::new(2.0, 64.0, 0.0), Some(4));
        harness.session.on_spawn().expect("spawn");

        let in_flight = AtomicBool::new(false);
        harvest_tick(&harness.session, &in_flight).await;

        assert!(harness.actions.interactions().is_empty());
        assert!(harness.nav.current_goal().is_none());
    }
}
