//! Guard / Patrol / Follow
//!
//! Combat-adjacent navigation behaviors behind a single mode field, so
//! no two of them can ever be active together:
//!
//! - **patrolling**: walk back and forth between two points near spawn
//! - **guarding**: hold an anchor position, returning after fights
//! - **following**: track a player who asked to be followed
//! - **none**: stand down entirely
//!
//! Chat commands drive the transitions (see [`crate::commands`]). Two
//! per-tick scans run regardless of mode: aggression targeting, and a
//! cosmetic look-at-nearest when nothing else is happening.

use crate::arbiter::BehaviorKind;
use crate::client::{EntityId, EntityInfo, Vec3};
use crate::nav::Goal;
use crate::session::Session;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entity kinds never handed to the combat collaborator.
pub const PASSIVE_KINDS: &[&str] = &[
    "villager",
    "cow",
    "sheep",
    "chicken",
    "pig",
    "cat",
    "wolf",
    "item",
    "armor_stand",
];

/// Distance kept from a followed player.
const FOLLOW_DISTANCE: f64 = 2.0;

/// How often the patrol driver checks for arrival.
const PATROL_POLL: Duration = Duration::from_millis(250);

/// What the sentry is currently doing. Never more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    None,
    Guarding,
    Patrolling,
    Following,
}

#[derive(Debug)]
struct SentryState {
    mode: Mode,
    guard_anchor: Option<Vec3>,
    patrol_a: Vec3,
    patrol_b: Vec3,
    next_leg_a: bool,
    follow_target: Option<EntityId>,
}

/// The guard/patrol/follow mode machine for one session.
pub struct Sentry {
    state: Mutex<SentryState>,
}

impl Sentry {
    /// Build the mode machine and begin patrolling between two points
    /// computed relative to the spawn position.
    pub fn start(session: &Arc<Session>) -> Arc<Self> {
        let spawn = session.spawn_position().unwrap_or(Vec3::new(0.0, 0.0, 0.0));
        let sentry = Arc::new(Self {
            state: Mutex::new(SentryState {
                mode: Mode::Patrolling,
                guard_anchor: None,
                patrol_a: spawn,
                patrol_b: spawn.offset(session.config.patrol_span, 0.0, 0.0),
                next_leg_a: false,
                follow_target: None,
            }),
        });
        sentry.issue_patrol_leg(session);
        sentry
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    pub fn guard_anchor(&self) -> Option<Vec3> {
        self.state.lock().guard_anchor
    }

    pub fn follow_target(&self) -> Option<EntityId> {
        self.state.lock().follow_target
    }

    /// Hand the next patrol waypoint to the navigator and flip the leg.
    fn issue_patrol_leg(&self, session: &Session) {
        let target = {
            let mut st = self.state.lock();
            if st.mode != Mode::Patrolling {
                return;
            }
            let target = if st.next_leg_a { st.patrol_a } else { st.patrol_b };
            st.next_leg_a = !st.next_leg_a;
            target
        };
        session.nav.set_goal(Some(Goal::MoveTo(target)));
        debug!("Sentry: patrol leg to {}", target);
    }

    /// Explicit commands outrank autonomous behaviors: free any idle
    /// holds before taking our own.
    fn preempt_autonomous(&self, session: &Session) {
        session.slot.release(BehaviorKind::Wander);
        session.slot.release(BehaviorKind::Harvest);
    }

    /// "guard": anchor on the commander's position and hold it.
    pub fn command_guard(&self, session: &Session, anchor: Vec3) {
        self.preempt_autonomous(session);
        let was_patrolling = {
            let mut st = self.state.lock();
            let was = st.mode == Mode::Patrolling;
            st.mode = Mode::Guarding;
            st.guard_anchor = Some(anchor);
            st.follow_target = None;
            was
        };
        if was_patrolling && session.nav.is_navigating() {
            session.nav.set_goal(None);
        }
        session.slot.acquire(BehaviorKind::Sentry);
        if session.combat.current_target().is_none() {
            session.nav.set_goal(Some(Goal::MoveTo(anchor)));
        }
        info!("Sentry: guarding {}", anchor);
    }

    /// "stop": stand down from combat and resume patrolling.
    pub fn command_stop(&self, session: &Session) {
        self.preempt_autonomous(session);
        session.combat.stop_attacking();
        session.nav.set_goal(None);
        session.slot.release(BehaviorKind::Sentry);
        {
            let mut st = self.state.lock();
            st.mode = Mode::Patrolling;
            st.guard_anchor = None;
            st.follow_target = None;
        }
        self.issue_patrol_leg(session);
        info!("Sentry: standing down, resuming patrol");
    }

    /// "follow me": track the commander with a continuously-updating
    /// goal.
    pub fn command_follow(&self, session: &Session, target: EntityId) {
        self.preempt_autonomous(session);
        {
            let mut st = self.state.lock();
            st.mode = Mode::Following;
            st.guard_anchor = None;
            st.follow_target = Some(target);
        }
        session.slot.acquire(BehaviorKind::Sentry);
        session.nav.set_goal(Some(Goal::FollowEntity {
            id: target,
            keep_distance: FOLLOW_DISTANCE,
        }));
        info!("Sentry: following entity {}", target);
    }

    /// "stay": stand still until told otherwise.
    pub fn command_stay(&self, session: &Session) {
        self.preempt_autonomous(session);
        {
            let mut st = self.state.lock();
            st.mode = Mode::None;
            st.guard_anchor = None;
            st.follow_target = None;
        }
        session.nav.set_goal(None);
        session.slot.release(BehaviorKind::Sentry);
        info!("Sentry: staying put");
    }

    /// Combat ended: a guard walks back to its anchor.
    pub fn on_disengaged(&self, session: &Session) {
        let anchor = {
            let st = self.state.lock();
            if st.mode == Mode::Guarding {
                st.guard_anchor
            } else {
                None
            }
        };
        if let Some(anchor) = anchor {
            session.nav.set_goal(Some(Goal::MoveTo(anchor)));
            debug!("Sentry: combat over, returning to guard anchor {}", anchor);
        }
    }

    /// Per-world-tick work, independent of navigation and mode.
    pub async fn on_tick(&self, session: &Session) {
        self.aggression_scan(session);
        self.look_at_nearest(session).await;
    }

    /// Hand the nearest hostile-eligible entity to the combat
    /// collaborator.
    fn aggression_scan(&self, session: &Session) {
        let Some(self_pos) = session.actions.self_position() else {
            return;
        };
        let entities = session
            .actions
            .query_entities(session.config.aggression_radius);
        if let Some(target) = nearest_hostile(self_pos, &entities) {
            session.combat.attack(target);
        }
    }

    /// Cosmetic: face the nearest entity when neither combat nor
    /// navigation is active. Never touches the movement slot.
    async fn look_at_nearest(&self, session: &Session) {
        if session.combat.current_target().is_some() || session.nav.is_navigating() {
            return;
        }
        let Some(self_pos) = session.actions.self_position() else {
            return;
        };
        let entities = session
            .actions
            .query_entities(session.config.aggression_radius);
        let nearest = entities.iter().min_by(|a, b| {
            self_pos
                .distance_to(a.position)
                .partial_cmp(&self_pos.distance_to(b.position))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(entity) = nearest {
            if let Err(e) = session.actions.face_direction(entity.position).await {
                warn!("Sentry: failed to face {}: {e}", entity.kind);
            }
        }
    }
}

/// Nearest entity eligible for aggression, excluding passive kinds.
pub fn nearest_hostile(self_pos: Vec3, entities: &[EntityInfo]) -> Option<&EntityInfo> {
    entities
        .iter()
        .filter(|e| !PASSIVE_KINDS.contains(&e.kind.as_str()))
        .min_by(|a, b| {
            self_pos
                .distance_to(a.position)
                .partial_cmp(&self_pos.distance_to(b.position))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Patrol driver: when a leg finishes, settle briefly and walk the
/// opposite one, for as long as the mode stays patrolling.
pub async fn patrol_loop(sentry: Arc<Sentry>, session: Arc<Session>) {
    let mut interval = tokio::time::interval(PATROL_POLL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if !session.is_ready() || sentry.mode() != Mode::Patrolling {
            continue;
        }
        if session.nav.is_navigating() {
            continue;
        }
        tokio::time::sleep(session.config.patrol_settle).await;
        if session.is_ready() && sentry.mode() == Mode::Patrolling {
            sentry.issue_patrol_leg(&session);
        }
    }
}
