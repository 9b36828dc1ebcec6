//! ID types for entities and scenes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for entity IDs.
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an entity in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new unique entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an entity ID from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) entity ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier for a loadable scene, matching the build order of the
/// presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(pub u32);

impl SceneId {
    /// Main menu scene.
    pub const MAIN_MENU: Self = Self(0);
    /// City mission scene.
    pub const CITY: Self = Self(1);
    /// Boss arena scene.
    pub const BOSS_ARENA: Self = Self(2);
    /// Victory scene, entered when the boss encounter ends.
    pub const VICTORY: Self = Self(3);
    /// Defeat scene, entered when the player dies.
    pub const DEFEAT: Self = Self(4);

    /// Returns the raw scene index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Reference to an animation state, trigger, effect, or sound owned by the
/// presentation layer. The core never interprets the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef(pub u32);

impl AssetRef {
    /// Creates a new asset reference.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Placeholder for an unassigned binding.
    pub const UNASSIGNED: Self = Self(u32::MAX);

    /// Checks whether the binding has been assigned.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != u32::MAX
    }
}
