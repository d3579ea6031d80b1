//! Behavior Arbiter
//!
//! Mutual exclusion for the movement controls. At most one behavior may
//! drive movement input at a time; the slot is the single contended
//! resource between behaviors and is advisory: every module is written
//! to respect it, nothing enforces it at the OS level.
//!
//! The arbiter is priority-agnostic: preemption is the callers' policy
//! (command handlers release autonomous holds before taking their own).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// The behaviors that can hold the movement slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BehaviorKind {
    Wander = 1,
    ProximityJump = 2,
    Harvest = 3,
    Sentry = 4,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Wander => "wander",
            BehaviorKind::ProximityJump => "proximity-jump",
            BehaviorKind::Harvest => "harvest",
            BehaviorKind::Sentry => "sentry",
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(BehaviorKind::Wander),
            2 => Some(BehaviorKind::ProximityJump),
            3 => Some(BehaviorKind::Harvest),
            4 => Some(BehaviorKind::Sentry),
            _ => None,
        }
    }
}

const FREE: u8 = 0;

/// The movement/action authority.
///
/// Holder identity lives in one atomic cell, so acquisition is a single
/// compare-exchange and the advisory protocol stays race-free on the
/// multi-threaded runtime.
pub struct MovementSlot {
    holder: AtomicU8,
    acquired_at: Mutex<Option<Instant>>,
}

impl MovementSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            holder: AtomicU8::new(FREE),
            acquired_at: Mutex::new(None),
        })
    }

    /// Try to take the slot for `kind`. Returns whether the slot was free
    /// and is now held. Non-blocking: callers back off and retry on their
    /// next scheduling cycle.
    pub fn acquire(&self, kind: BehaviorKind) -> bool {
        let taken = self
            .holder
            .compare_exchange(FREE, kind as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if taken {
            *self.acquired_at.lock() = Some(Instant::now());
            debug!("Movement slot acquired by {}", kind.as_str());
        }
        taken
    }

    /// Release the slot if `kind` holds it. No-op otherwise; always safe
    /// to call, including when the slot is already free.
    pub fn release(&self, kind: BehaviorKind) {
        let released = self
            .holder
            .compare_exchange(kind as u8, FREE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if released {
            *self.acquired_at.lock() = None;
            debug!("Movement slot released by {}", kind.as_str());
        }
    }

    /// Force the slot free regardless of holder. Teardown only.
    pub fn clear(&self) {
        self.holder.store(FREE, Ordering::Release);
        *self.acquired_at.lock() = None;
    }

    pub fn is_held(&self) -> bool {
        self.holder.load(Ordering::Acquire) != FREE
    }

    pub fn holder(&self) -> Option<BehaviorKind> {
        BehaviorKind::from_u8(self.holder.load(Ordering::Acquire))
    }

    /// How long the current holder has had the slot.
    pub fn held_for(&self) -> Option<std::time::Duration> {
        self.acquired_at.lock().map(|t| t.elapsed())
    }

    /// Acquire with scoped release: the returned guard releases on drop,
    /// on every exit path including panics and task aborts.
    pub fn guard(self: &Arc<Self>, kind: BehaviorKind) -> Option<SlotGuard> {
        if self.acquire(kind) {
            Some(SlotGuard {
                slot: Arc::clone(self),
                kind,
            })
        } else {
            None
        }
    }
}

/// Guard that releases the movement slot automatically.
pub struct SlotGuard {
    slot: Arc<MovementSlot>,
    kind: BehaviorKind,
}

impl SlotGuard {
    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.release(self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_excludes_others() {
        let slot = MovementSlot::new();

        assert!(slot.acquire(BehaviorKind::Wander));
        assert!(!slot.acquire(BehaviorKind::Harvest));
        assert!(!slot.acquire(BehaviorKind::Wander)); // not reentrant
        assert_eq!(slot.holder(), Some(BehaviorKind::Wander));

        slot.release(BehaviorKind::Wander);
        assert!(slot.acquire(BehaviorKind::Harvest));
    }

    #[test]
    fn test_release_wrong_kind_is_noop() {
        let slot = MovementSlot::new();

        assert!(slot.acquire(BehaviorKind::Wander));
        slot.release(BehaviorKind::Harvest);
        assert!(slot.is_held());
        assert_eq!(slot.holder(), Some(BehaviorKind::Wander));
    }

    #[test]
    fn test_release_when_free_is_noop() {
        let slot = MovementSlot::new();
        slot.release(BehaviorKind::Wander);
        slot.release(BehaviorKind::Sentry);
        assert!(!slot.is_held());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let slot = MovementSlot::new();

        {
            let guard = slot.guard(BehaviorKind::Wander).expect("slot was free");
            assert_eq!(guard.kind(), BehaviorKind::Wander);
            assert!(slot.guard(BehaviorKind::Harvest).is_none());
        }

        assert!(!slot.is_held());
        assert!(slot.guard(BehaviorKind::Harvest).is_some());
    }

    #[test]
    fn test_held_for_tracks_acquisition() {
        let slot = MovementSlot::new();
        assert!(slot.held_for().is_none());

        slot.acquire(BehaviorKind::Sentry);
        assert!(slot.held_for().is_some());

        slot.release(BehaviorKind::Sentry);
        assert!(slot.held_for().is_none());
    }

    #[test]
    fn test_clear_frees_any_holder() {
        let slot = MovementSlot::new();
        slot.acquire(BehaviorKind::Sentry);
        slot.clear();
        assert!(!slot.is_held());
    }

    /// Hammer the slot from many tasks; at no instant may two tasks both
    /// believe they hold it.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_concurrent_holders() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let slot = MovementSlot::new();
        let inside = Arc::new(AtomicU32::new(0));
        let mut tasks = Vec::new();

        for i in 0..8u8 {
            let slot = Arc::clone(&slot);
            let inside = Arc::clone(&inside);
            let kind = match i % 4 {
                0 => BehaviorKind::Wander,
                1 => BehaviorKind::ProximityJump,
                2 => BehaviorKind::Harvest,
                _ => BehaviorKind::Sentry,
            };
            tasks.push(tokio::spawn(async move {
                for _ in 0..200 {
                    if let Some(_guard) = slot.guard(kind) {
                        let n = inside.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(n, 0, "two holders inside the slot at once");
                        tokio::task::yield_now().await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        for t in tasks {
            t.await.expect("task panicked");
        }
        assert!(!slot.is_held());
    }
}
