//! Navigation Engine Seam
//!
//! Interface over the pathfinding collaborator. Goal-directed movement is
//! planned and driven entirely by the engine; the agent only sets goals,
//! clears them, and polls progress. No timeout is imposed on a goal; it
//! runs until it succeeds, fails with no-path, or is superseded.

use crate::client::{EntityId, Vec3};
use crate::session::MovementProfile;
use std::time::Duration;

/// A navigation goal handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Goal {
    /// Move to a block position.
    MoveTo(Vec3),
    /// Continuously track an entity, keeping roughly `keep_distance`.
    FollowEntity { id: EntityId, keep_distance: f64 },
}

/// Pathfinding collaborator contract.
pub trait Navigator: Send + Sync {
    /// Install the session's movement capability profile. Called once per
    /// spawn, before any goal is set.
    fn set_capability_profile(&self, profile: &MovementProfile);

    /// Replace the current goal. `None` cancels any in-flight goal.
    fn set_goal(&self, goal: Option<Goal>);

    /// Whether a goal is currently being pursued.
    fn is_navigating(&self) -> bool;
}

/// Wait until the engine reports no active goal.
///
/// The single place navigation completion is polled; behaviors that need
/// to wait for arrival use this instead of inlining their own loops.
pub async fn await_navigation(nav: &dyn Navigator, poll: Duration) {
    while nav.is_navigating() {
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountdownNav(AtomicU32);

    impl Navigator for CountdownNav {
        fn set_capability_profile(&self, _profile: &MovementProfile) {}
        fn set_goal(&self, _goal: Option<Goal>) {}
        fn is_navigating(&self) -> bool {
            // Reports "navigating" for the first few polls.
            self.0
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[tokio::test]
    async fn test_await_navigation_returns_when_idle() {
        let nav = CountdownNav(AtomicU32::new(3));
        await_navigation(&nav, Duration::from_millis(1)).await;
        assert!(!nav.is_navigating());
    }
}
