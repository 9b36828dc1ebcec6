//! Event bus for inter-system communication.
//!
//! The session publishes gameplay facts here; the presentation layer drains
//! them once per frame to drive effects the narrow collaborator traits do
//! not cover (kill feed, music stingers, analytics).

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use umbra_common::{EntityId, SceneId};

use crate::agent::DeathKind;
use crate::boss::AbilityColor;

/// Event types that can be sent through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameEvent {
    /// An agent entered the simulation.
    AgentSpawned {
        /// Agent entity
        entity_id: EntityId,
    },
    /// An agent died.
    AgentDied {
        /// Agent entity
        entity_id: EntityId,
        /// How the agent was defeated
        kind: DeathKind,
    },
    /// An agent's attention bar filled; the player is fully detected.
    PlayerFullyDetected {
        /// Agent that latched detection
        entity_id: EntityId,
    },
    /// An agent fired its attack at the player.
    AgentAttacked {
        /// Attacking agent
        entity_id: EntityId,
    },
    /// The boss began a sub-ability windup.
    BossAbilityStarted {
        /// Which sub-ability
        color: AbilityColor,
    },
    /// A boss sub-ability connected with the player.
    BossAbilityHit {
        /// Which sub-ability
        color: AbilityColor,
        /// Damage applied
        damage: f32,
    },
    /// The boss entered its recharge state.
    BossRecharging,
    /// The boss was defeated.
    BossDefeated,
    /// The player died.
    PlayerDied,
    /// The time-dilation ultimate switched on.
    TimeDilationStarted,
    /// The time-dilation ultimate wore off.
    TimeDilationEnded,
    /// The core asked the platform to change scenes.
    SceneRequested {
        /// Scene to load
        scene: SceneId,
    },
    /// Custom mod event
    Custom {
        /// Event name
        name: String,
        /// JSON payload
        payload: String,
    },
}

/// Event bus for broadcasting events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<GameEvent>,
    /// Receiver for collecting events
    receiver: Receiver<GameEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: GameEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<GameEvent> {
        self.sender.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        bus.publish(GameEvent::PlayerDied);
        bus.publish(GameEvent::BossDefeated);

        assert_eq!(bus.pending_count(), 2);
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], GameEvent::PlayerDied));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_events() {
        let bus = EventBus::new(1);
        bus.publish(GameEvent::PlayerDied);
        bus.publish(GameEvent::BossDefeated);
        assert_eq!(bus.drain().len(), 1);
    }

    #[test]
    fn test_detached_sender() {
        let bus = EventBus::new(8);
        let sender = bus.sender();
        let _ = sender.try_send(GameEvent::TimeDilationStarted);
        assert_eq!(bus.pending_count(), 1);
    }
}
