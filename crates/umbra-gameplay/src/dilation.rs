//! Global time-dilation ("ultimate") broadcast.
//!
//! Activating the ultimate slows every subscribed enemy at once: each
//! subscriber halves its movement speed, doubles its timing constants and
//! goes blind until the effect wears off. The broadcaster only delivers
//! edge events over per-subscriber channels; subscribers apply them at the
//! top of their own tick, so a change never lands mid-calculation.
//!
//! Subscriptions are keyed by entity and removed on despawn, so no channel
//! outlives its owner.

use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use umbra_common::EntityId;

/// Capacity of each subscriber channel. Dilation edges are rare; a full
/// channel drops the event rather than blocking the simulation.
const CHANNEL_CAPACITY: usize = 8;

/// Edge events delivered to each subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DilationEvent {
    /// Dilation switched on: scale your constants and remember the originals.
    Activated,
    /// Dilation wore off: restore the exact originals.
    Deactivated,
}

/// Process-wide time-dilation state and subscriber registry.
#[derive(Debug)]
pub struct TimeDilation {
    /// Whether dilation is currently running.
    active: bool,
    /// Seconds left on the current activation.
    remaining: f32,
    /// Length of one activation.
    duration: f32,
    /// One channel per subscribed entity.
    subscribers: AHashMap<EntityId, Sender<DilationEvent>>,
}

impl TimeDilation {
    /// Creates an inactive broadcaster with the given activation length.
    #[must_use]
    pub fn new(duration: f32) -> Self {
        Self {
            active: false,
            remaining: 0.0,
            duration,
            subscribers: AHashMap::new(),
        }
    }

    /// Whether dilation is currently running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Seconds left on the current activation; zero while inactive.
    #[must_use]
    pub const fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Registers a subscriber and returns its event channel. An entity that
    /// subscribes while dilation is already running receives `Activated`
    /// immediately so it never runs unscaled next to scaled peers.
    pub fn subscribe(&mut self, entity: EntityId) -> Receiver<DilationEvent> {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        if self.active {
            let _ = sender.try_send(DilationEvent::Activated);
        }
        self.subscribers.insert(entity, sender);
        receiver
    }

    /// Removes a subscriber; its channel closes with the sender.
    pub fn unsubscribe(&mut self, entity: EntityId) {
        self.subscribers.remove(&entity);
    }

    /// Switches dilation on. A no-op returning false while already active.
    pub fn activate(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.remaining = self.duration;
        info!("time dilation activated for {}s", self.duration);
        self.broadcast(DilationEvent::Activated);
        true
    }

    /// Switches dilation off. A no-op while already inactive.
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.remaining = 0.0;
        info!("time dilation ended");
        self.broadcast(DilationEvent::Deactivated);
    }

    /// Counts the activation down, deactivating when it expires. Returns
    /// true on the tick the effect wore off.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.active {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.deactivate();
            return true;
        }
        false
    }

    fn broadcast(&self, event: DilationEvent) {
        for (entity, sender) in &self.subscribers {
            if sender.try_send(event).is_err() {
                debug!("dilation channel full for {:?}, event dropped", entity);
            }
        }
    }
}

/// Cloneable handle sharing one broadcaster between the simulation tick and
/// the input edge that fires the ultimate.
#[derive(Debug, Clone)]
pub struct DilationHandle {
    inner: Arc<Mutex<TimeDilation>>,
}

impl DilationHandle {
    /// Wraps a broadcaster in a shareable handle.
    #[must_use]
    pub fn new(dilation: TimeDilation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dilation)),
        }
    }

    /// See [`TimeDilation::activate`].
    pub fn activate(&self) -> bool {
        self.inner.lock().activate()
    }

    /// See [`TimeDilation::deactivate`].
    pub fn deactivate(&self) {
        self.inner.lock().deactivate();
    }

    /// See [`TimeDilation::tick`].
    pub fn tick(&self, dt: f32) -> bool {
        self.inner.lock().tick(dt)
    }

    /// See [`TimeDilation::is_active`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lock().is_active()
    }

    /// See [`TimeDilation::subscribe`].
    pub fn subscribe(&self, entity: EntityId) -> Receiver<DilationEvent> {
        self.inner.lock().subscribe(entity)
    }

    /// See [`TimeDilation::unsubscribe`].
    pub fn unsubscribe(&self, entity: EntityId) {
        self.inner.lock().unsubscribe(entity);
    }

    /// See [`TimeDilation::subscriber_count`].
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_broadcasts_to_all() {
        let mut dilation = TimeDilation::new(5.0);
        let rx_a = dilation.subscribe(EntityId::from_raw(1));
        let rx_b = dilation.subscribe(EntityId::from_raw(2));

        assert!(dilation.activate());
        assert_eq!(rx_a.try_recv(), Ok(DilationEvent::Activated));
        assert_eq!(rx_b.try_recv(), Ok(DilationEvent::Activated));
    }

    #[test]
    fn test_activate_while_active_is_noop() {
        let mut dilation = TimeDilation::new(5.0);
        let rx = dilation.subscribe(EntityId::from_raw(1));

        assert!(dilation.activate());
        assert!(!dilation.activate());

        // Exactly one event reached the subscriber.
        assert_eq!(rx.try_recv(), Ok(DilationEvent::Activated));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_expiry_deactivates_once() {
        let mut dilation = TimeDilation::new(1.0);
        let rx = dilation.subscribe(EntityId::from_raw(1));
        dilation.activate();
        let _ = rx.try_recv();

        assert!(!dilation.tick(0.5));
        assert!(dilation.tick(0.6));
        assert!(!dilation.is_active());
        assert_eq!(rx.try_recv(), Ok(DilationEvent::Deactivated));

        // Further ticks do nothing.
        assert!(!dilation.tick(1.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_late_subscriber_catches_up() {
        let mut dilation = TimeDilation::new(5.0);
        dilation.activate();

        let rx = dilation.subscribe(EntityId::from_raw(7));
        assert_eq!(rx.try_recv(), Ok(DilationEvent::Activated));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut dilation = TimeDilation::new(5.0);
        let rx = dilation.subscribe(EntityId::from_raw(1));
        dilation.unsubscribe(EntityId::from_raw(1));
        assert_eq!(dilation.subscriber_count(), 0);

        dilation.activate();
        // Channel is disconnected, not holding a stale event.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handle_shares_state() {
        let handle = DilationHandle::new(TimeDilation::new(3.0));
        let clone = handle.clone();

        assert!(handle.activate());
        assert!(clone.is_active());
        clone.deactivate();
        assert!(!handle.is_active());
    }

    #[test]
    fn test_repeated_cycles_deliver_matched_pairs() {
        let mut dilation = TimeDilation::new(1.0);
        let rx = dilation.subscribe(EntityId::from_raw(1));

        for _ in 0..3 {
            dilation.activate();
            dilation.tick(2.0);
        }

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                DilationEvent::Activated,
                DilationEvent::Deactivated,
                DilationEvent::Activated,
                DilationEvent::Deactivated,
                DilationEvent::Activated,
                DilationEvent::Deactivated,
            ]
        );
    }
}
