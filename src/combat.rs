//! Combat Targeting Seam
//!
//! Interface over the combat collaborator. The agent hands it targets and
//! tells it to stand down; everything about reach, weapon choice, and
//! swing timing is the collaborator's business. Disengagement is reported
//! back through [`crate::client::GameEvent::CombatDisengaged`].

use crate::client::{EntityId, EntityInfo};

/// Combat-targeting collaborator contract.
pub trait Combat: Send + Sync {
    /// Hand an entity to the targeting system. Repeated calls with the
    /// same target are harmless.
    fn attack(&self, target: &EntityInfo);

    /// Drop the current target, if any. Always safe to call.
    fn stop_attacking(&self);

    /// The entity currently being fought, if any.
    fn current_target(&self) -> Option<EntityId>;
}
