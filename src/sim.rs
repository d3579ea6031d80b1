//! Simulated World
//!
//! In-process implementation of the three collaborator seams
//! ([`GameConnector`]/[`GameActions`], [`Navigator`], [`Combat`]) backed
//! by a scriptable world. Two consumers:
//!
//! - the binary's offline mode, where no real protocol adapter is wired
//! - tests, which use it to drive spawns, kicks, chat, and transport
//!   faults deterministically and to observe every action the agent took
//!
//! Everything here is plain shared state behind locks; nothing touches
//! the network.

use crate::client::{
    BlockInfo, BlockQuery, ClientError, ContainerHandle, Control, Credentials, EntityId,
    EntityInfo, GameActions, GameConnector, GameEvent, Item, PlayerInfo, Vec3,
};
use crate::combat::Combat;
use crate::config::Config;
use crate::nav::{Goal, Navigator};
use crate::session::{MovementProfile, Session};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
// Timestamp connect attempts on tokio's clock so timing assertions hold under
// the paused test clock (std `Instant` does not advance when time is paused).
use tokio::time::Instant;
use tokio::sync::mpsc;

/// The agent's own entity id in every simulated world.
pub const SELF_ID: EntityId = 1;

#[derive(Debug, Default)]
struct WorldInner {
    self_position: Option<Vec3>,
    players: Vec<PlayerInfo>,
    entities: Vec<EntityInfo>,
    blocks: Vec<BlockInfo>,
    inventory: Vec<Item>,
    inventory_full: bool,
    deposited: Vec<Item>,
}

/// Shared, scriptable world state.
#[derive(Clone)]
pub struct SimWorld {
    inner: Arc<Mutex<WorldInner>>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(WorldInner {
                self_position: Some(Vec3::new(0.0, 64.0, 0.0)),
                ..WorldInner::default()
            })),
        }
    }

    pub fn set_self_position(&self, position: Vec3) {
        self.inner.lock().self_position = Some(position);
    }

    /// Simulate the agent's own entity not being loaded (spawn setup
    /// then fails).
    pub fn set_self_loaded(&self, loaded: bool) {
        let mut inner = self.inner.lock();
        if loaded && inner.self_position.is_none() {
            inner.self_position = Some(Vec3::new(0.0, 64.0, 0.0));
        } else if !loaded {
            inner.self_position = None;
        }
    }

    pub fn add_player(&self, username: &str, entity_id: EntityId, position: Vec3) {
        self.inner.lock().players.push(PlayerInfo {
            username: username.to_string(),
            entity_id: Some(entity_id),
            position: Some(position),
        });
    }

    pub fn add_entity(&self, id: EntityId, kind: &str, position: Vec3) {
        self.inner.lock().entities.push(EntityInfo {
            id,
            kind: kind.to_string(),
            position,
        });
    }

    pub fn add_block(&self, kind: &str, position: Vec3, growth_stage: Option<u8>) {
        self.inner.lock().blocks.push(BlockInfo {
            kind: kind.to_string(),
            position,
            growth_stage,
        });
    }

    pub fn set_inventory(&self, items: Vec<Item>) {
        self.inner.lock().inventory = items;
    }

    pub fn set_inventory_full(&self, full: bool) {
        self.inner.lock().inventory_full = full;
    }

    /// Items deposited into containers so far.
    pub fn deposited(&self) -> Vec<Item> {
        self.inner.lock().deposited.clone()
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// [`GameActions`] over a [`SimWorld`], recording everything the agent
/// does for later inspection.
pub struct SimActions {
    world: SimWorld,
    controls: Mutex<HashMap<Control, bool>>,
    control_log: Mutex<Vec<(Control, bool)>>,
    chat_sent: Mutex<Vec<String>>,
    dropped: Mutex<Vec<Item>>,
    interactions: Mutex<Vec<BlockInfo>>,
    faced: Mutex<Vec<Vec3>>,
    disconnects: Mutex<Vec<String>>,
    fail_actions: AtomicBool,
    next_container_id: AtomicU64,
}

impl SimActions {
    pub fn new(world: SimWorld) -> Arc<Self> {
        Arc::new(Self {
            world,
            controls: Mutex::new(HashMap::new()),
            control_log: Mutex::new(Vec::new()),
            chat_sent: Mutex::new(Vec::new()),
            dropped: Mutex::new(Vec::new()),
            interactions: Mutex::new(Vec::new()),
            faced: Mutex::new(Vec::new()),
            disconnects: Mutex::new(Vec::new()),
            fail_actions: AtomicBool::new(false),
            next_container_id: AtomicU64::new(1),
        })
    }

    /// Make every subsequent action return an error.
    pub fn set_fail_actions(&self, fail: bool) {
        self.fail_actions.store(fail, Ordering::SeqCst);
    }

    pub fn chat_sent(&self) -> Vec<String> {
        self.chat_sent.lock().clone()
    }

    /// Every control transition ever driven, in order.
    pub fn control_log(&self) -> Vec<(Control, bool)> {
        self.control_log.lock().clone()
    }

    pub fn dropped_items(&self) -> Vec<Item> {
        self.dropped.lock().clone()
    }

    pub fn interactions(&self) -> Vec<BlockInfo> {
        self.interactions.lock().clone()
    }

    pub fn faced(&self) -> Vec<Vec3> {
        self.faced.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.disconnects.lock().clone()
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.fail_actions.load(Ordering::SeqCst) {
            Err(ClientError::ActionFailed("simulated failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GameActions for SimActions {
    fn self_id(&self) -> EntityId {
        SELF_ID
    }

    fn self_position(&self) -> Option<Vec3> {
        self.world.inner.lock().self_position
    }

    fn world_version(&self) -> String {
        "sim-1.0".to_string()
    }

    async fn set_control(&self, control: Control, state: bool) -> Result<(), ClientError> {
        self.check()?;
        self.controls.lock().insert(control, state);
        self.control_log.lock().push((control, state));
        Ok(())
    }

    fn control_state(&self, control: Control) -> bool {
        *self.controls.lock().get(&control).unwrap_or(&false)
    }

    async fn face_direction(&self, position: Vec3) -> Result<(), ClientError> {
        self.check()?;
        self.faced.lock().push(position);
        Ok(())
    }

    async fn trigger_interact(&self, block: &BlockInfo) -> Result<(), ClientError> {
        self.check()?;
        self.interactions.lock().push(block.clone());
        Ok(())
    }

    async fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        self.check()?;
        self.chat_sent.lock().push(text.to_string());
        Ok(())
    }

    async fn drop_item(&self, item: &Item) -> Result<(), ClientError> {
        self.check()?;
        self.dropped.lock().push(item.clone());
        Ok(())
    }

    fn query_players(&self) -> Vec<PlayerInfo> {
        self.world.inner.lock().players.clone()
    }

    fn query_entities(&self, radius: f64) -> Vec<EntityInfo> {
        let inner = self.world.inner.lock();
        let Some(self_pos) = inner.self_position else {
            return Vec::new();
        };
        inner
            .entities
            .iter()
            .filter(|e| self_pos.distance_to(e.position) <= radius)
            .cloned()
            .collect()
    }

    fn query_blocks(&self, query: &BlockQuery) -> Vec<BlockInfo> {
        let inner = self.world.inner.lock();
        let Some(self_pos) = inner.self_position else {
            return Vec::new();
        };
        inner
            .blocks
            .iter()
            .filter(|b| {
                query.kinds.iter().any(|k| *k == b.kind)
                    && self_pos.distance_to(b.position) <= query.radius
            })
            .cloned()
            .collect()
    }

    fn inventory(&self) -> Vec<Item> {
        self.world.inner.lock().inventory.clone()
    }

    fn inventory_full(&self) -> bool {
        self.world.inner.lock().inventory_full
    }

    async fn open_container(&self, position: Vec3) -> Result<ContainerHandle, ClientError> {
        self.check()?;
        Ok(ContainerHandle {
            id: self.next_container_id.fetch_add(1, Ordering::SeqCst),
            position,
        })
    }

    async fn deposit_item(
        &self,
        _container: &ContainerHandle,
        item: &Item,
    ) -> Result<(), ClientError> {
        self.check()?;
        let mut inner = self.world.inner.lock();
        if let Some(index) = inner.inventory.iter().position(|i| i.name == item.name) {
            inner.inventory.remove(index);
        }
        inner.deposited.push(item.clone());
        Ok(())
    }

    async fn disconnect(&self, reason: &str) {
        self.disconnects.lock().push(reason.to_string());
    }
}

/// [`Navigator`] double. A goal "arrives" after a fixed number of
/// `is_navigating` polls, so behaviors that wait for arrival terminate
/// deterministically.
pub struct SimNavigator {
    goal: Mutex<Option<Goal>>,
    goals: Mutex<Vec<Goal>>,
    profile: Mutex<Option<MovementProfile>>,
    navigating: AtomicBool,
    pending_polls: AtomicU32,
    arrival_polls: AtomicU32,
    clears: AtomicUsize,
}

impl SimNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            goal: Mutex::new(None),
            goals: Mutex::new(Vec::new()),
            profile: Mutex::new(None),
            navigating: AtomicBool::new(false),
            pending_polls: AtomicU32::new(0),
            arrival_polls: AtomicU32::new(3),
            clears: AtomicUsize::new(0),
        })
    }

    /// How many `is_navigating` polls a goal stays in flight for.
    pub fn set_arrival_polls(&self, polls: u32) {
        self.arrival_polls.store(polls, Ordering::SeqCst);
    }

    /// Force the current goal to finish now.
    pub fn finish_goal(&self) {
        self.navigating.store(false, Ordering::SeqCst);
    }

    /// The goal as last set (cleared goals show as `None`).
    pub fn current_goal(&self) -> Option<Goal> {
        self.goal.lock().clone()
    }

    /// Every non-`None` goal ever set, in order.
    pub fn goals(&self) -> Vec<Goal> {
        self.goals.lock().clone()
    }

    pub fn goal_count(&self) -> usize {
        self.goals.lock().len()
    }

    /// How many times the goal was explicitly cancelled.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn profile(&self) -> Option<MovementProfile> {
        *self.profile.lock()
    }
}

impl Navigator for SimNavigator {
    fn set_capability_profile(&self, profile: &MovementProfile) {
        *self.profile.lock() = Some(*profile);
    }

    fn set_goal(&self, goal: Option<Goal>) {
        match goal {
            Some(goal) => {
                self.goals.lock().push(goal.clone());
                *self.goal.lock() = Some(goal);
                self.navigating.store(true, Ordering::SeqCst);
                self.pending_polls
                    .store(self.arrival_polls.load(Ordering::SeqCst), Ordering::SeqCst);
            }
            None => {
                self.clears.fetch_add(1, Ordering::SeqCst);
                *self.goal.lock() = None;
                self.navigating.store(false, Ordering::SeqCst);
            }
        }
    }

    fn is_navigating(&self) -> bool {
        if !self.navigating.load(Ordering::SeqCst) {
            return false;
        }
        let remaining = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_err() {
            self.navigating.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }
}

/// [`Combat`] double recording targeting calls.
pub struct SimCombat {
    target: Mutex<Option<EntityId>>,
    attacks: Mutex<Vec<EntityId>>,
    stops: AtomicUsize,
}

impl SimCombat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            target: Mutex::new(None),
            attacks: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn attacked(&self) -> Vec<EntityId> {
        self.attacks.lock().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn set_target(&self, target: Option<EntityId>) {
        *self.target.lock() = target;
    }
}

impl Combat for SimCombat {
    fn attack(&self, target: &EntityInfo) {
        self.attacks.lock().push(target.id);
        *self.target.lock() = Some(target.id);
    }

    fn stop_attacking(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.target.lock() = None;
    }

    fn current_target(&self) -> Option<EntityId> {
        *self.target.lock()
    }
}

/// Everything a unit test needs to exercise one session directly,
/// without going through a connector.
pub struct SimHarness {
    pub world: SimWorld,
    pub actions: Arc<SimActions>,
    pub nav: Arc<SimNavigator>,
    pub combat: Arc<SimCombat>,
    pub session: Arc<Session>,
}

impl SimHarness {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_world(SimWorld::new(), config)
    }

    pub fn with_world(world: SimWorld, config: Arc<Config>) -> Self {
        let actions = SimActions::new(world.clone());
        let nav = SimNavigator::new();
        let combat = SimCombat::new();
        let session = Session::new(
            actions.clone() as Arc<dyn GameActions>,
            nav.clone() as Arc<dyn Navigator>,
            combat.clone() as Arc<dyn Combat>,
            config,
        );
        Self {
            world,
            actions,
            nav,
            combat,
            session,
        }
    }
}

/// Handle into a live simulated connection, for injecting events.
#[derive(Clone)]
pub struct SimLink {
    pub actions: Arc<SimActions>,
    events: mpsc::Sender<GameEvent>,
}

impl SimLink {
    pub async fn send(&self, event: GameEvent) {
        // A closed channel just means the session already ended.
        let _ = self.events.send(event).await;
    }

    pub async fn kick(&self, reason: &str) {
        self.send(GameEvent::Kicked {
            reason: reason.to_string(),
        })
        .await;
    }

    pub async fn chat(&self, sender: &str, text: &str) {
        self.send(GameEvent::Chat {
            sender: sender.to_string(),
            text: text.to_string(),
        })
        .await;
    }

    pub async fn tick(&self) {
        self.send(GameEvent::Tick).await;
    }

    pub async fn disconnect(&self, reason: &str) {
        self.send(GameEvent::Disconnected {
            reason: reason.to_string(),
        })
        .await;
    }
}

/// [`GameConnector`] over a shared [`SimWorld`].
///
/// Each successful `connect` yields a fresh [`SimActions`] and event
/// channel; the latest link is kept for event injection. Spawn is
/// emitted automatically (the simulated server always accepts the
/// credential string).
pub struct SimConnector {
    world: SimWorld,
    fail_remaining: AtomicUsize,
    connects: AtomicUsize,
    connect_times: Mutex<Vec<Instant>>,
    link: Mutex<Option<SimLink>>,
    tick_interval: Mutex<Option<Duration>>,
}

impl SimConnector {
    pub fn new(world: SimWorld) -> Arc<Self> {
        Arc::new(Self {
            world,
            fail_remaining: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            connect_times: Mutex::new(Vec::new()),
            link: Mutex::new(None),
            tick_interval: Mutex::new(None),
        })
    }

    /// World with a few neighbors, crops, and storage: what the binary
    /// runs against in offline mode.
    pub fn demo() -> Arc<Self> {
        let world = SimWorld::new();
        world.add_player("visitor", 2, Vec3::new(2.5, 64.0, 0.0));
        world.add_player("stranger", 3, Vec3::new(20.0, 64.0, 5.0));
        world.add_entity(10, "zombie", Vec3::new(12.0, 64.0, 3.0));
        world.add_entity(11, "cow", Vec3::new(4.0, 64.0, 2.0));
        world.add_block("wheat", Vec3::new(3.0, 64.0, 1.0), Some(7));
        world.add_block("wheat", Vec3::new(3.0, 64.0, 2.0), Some(4));
        world.add_block("chest", Vec3::new(1.0, 64.0, -2.0), None);
        let connector = Self::new(world);
        *connector.tick_interval.lock() = Some(Duration::from_secs(1));
        connector
    }

    /// Emit world ticks at this interval on every connection.
    pub fn set_tick_interval(&self, interval: Option<Duration>) {
        *self.tick_interval.lock() = interval;
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Instants at which connect attempts were made.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.connect_times.lock().clone()
    }

    /// Link to the most recent connection, for event injection.
    pub fn link(&self) -> Option<SimLink> {
        self.link.lock().clone()
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }
}

#[async_trait]
impl GameConnector for SimConnector {
    async fn connect(
        &self,
        _address: &str,
        _credentials: &Credentials,
    ) -> Result<(Arc<dyn GameActions>, mpsc::Receiver<GameEvent>), ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connect_times.lock().push(Instant::now());

        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::ConnectionFailed(
                "simulated refusal".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        let actions = SimActions::new(self.world.clone());
        let link = SimLink {
            actions: actions.clone(),
            events: tx.clone(),
        };
        *self.link.lock() = Some(link);

        let _ = tx.send(GameEvent::Spawned).await;
        if let Some(interval) = *self.tick_interval.lock() {
            let tick_tx = tx.clone();
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(interval);
                timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    timer.tick().await;
                    if tick_tx.send(GameEvent::Tick).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok((actions as Arc<dyn GameActions>, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connector_fails_then_recovers() {
        let connector = SimConnector::new(SimWorld::new());
        connector.fail_next_connects(1);
        let credentials = Credentials {
            username: "a".to_string(),
            password: "a".to_string(),
        };

        assert!(connector.connect("sim:0", &credentials).await.is_err());
        assert!(connector.connect("sim:0", &credentials).await.is_ok());
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_navigator_goal_arrives_after_polls() {
        let nav = SimNavigator::new();
        nav.set_arrival_polls(2);
        nav.set_goal(Some(Goal::MoveTo(Vec3::new(1.0, 0.0, 0.0))));

        assert!(nav.is_navigating());
        assert!(nav.is_navigating());
        assert!(!nav.is_navigating());
    }

    #[tokio::test]
    async fn test_deposit_moves_items_out_of_inventory() {
        let world = SimWorld::new();
        world.set_inventory(vec![Item {
            name: "wheat".to_string(),
            count: 3,
        }]);
        let actions = SimActions::new(world.clone());

        let handle = actions
            .open_container(Vec3::new(0.0, 0.0, 0.0))
            .await
            .expect("open");
        actions
            .deposit_item(
                &handle,
                &Item {
                    name: "wheat".to_string(),
                    count: 3,
                },
            )
            .await
            .expect("deposit");

        assert!(actions.inventory().is_empty());
        assert_eq!(world.deposited().len(), 1);
    }
}
