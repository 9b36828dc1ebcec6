//! Collaborator interfaces between the gameplay core and the platform.
//!
//! The core never touches rendering, animation playback, audio, physics or
//! navigation directly. It reads world state through [`WorldQuery`], writes
//! movement intents through [`Navigation`], and pushes presentation effects
//! through [`Presentation`]. Mock implementations for tests live at the
//! bottom of this module.

use glam::Vec3;
use umbra_common::{AssetRef, EntityId, SceneId};

/// A candidate target returned by a spatial visibility query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetHandle {
    /// Entity the handle refers to.
    pub entity: EntityId,
    /// World position at query time.
    pub position: Vec3,
}

/// Read-only world state queries.
pub trait WorldQuery {
    /// All candidate targets within `radius` of `position`, ordered
    /// nearest-first.
    fn visible_targets(&self, position: Vec3, radius: f32) -> Vec<TargetHandle>;

    /// Whether something opaque blocks the segment from `from` to `to`.
    fn raycast_obstruction(&self, from: Vec3, to: Vec3) -> bool;

    /// Whether a downward probe from `point` finds walkable ground.
    fn ground_below(&self, point: Vec3) -> bool;

    /// Current world position of an entity, if it still exists.
    fn position_of(&self, entity: EntityId) -> Option<Vec3>;

    /// Current facing direction of an entity, if it still exists.
    fn facing_of(&self, entity: EntityId) -> Option<Vec3>;
}

/// Movement intents the core hands to the navigation collaborator.
pub trait Navigation {
    /// Starts or retargets navigation toward a destination.
    fn navigate_to(&mut self, agent: EntityId, destination: Vec3);

    /// Halts navigation, keeping the agent in place.
    fn stop_navigation(&mut self, agent: EntityId);

    /// Scales the agent's movement speed; 1.0 is the authored speed.
    fn set_speed_scale(&mut self, agent: EntityId, scale: f32);

    /// Turns the agent toward a yaw angle in degrees.
    fn set_facing(&mut self, agent: EntityId, yaw_deg: f32);

    /// Removes the agent from navigation and collision entirely (death).
    fn disable(&mut self, agent: EntityId);
}

/// Player ability slots with a bound cooldown indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbilitySlot {
    /// The dash ability.
    Dash,
    /// The time-dilation ultimate.
    Ultimate,
}

/// Presentation effects the core requests. Implementations are free to drop
/// requests whose bindings are missing; the core already skips requests for
/// unassigned [`AssetRef`]s.
pub trait Presentation {
    /// Sets a boolean animation state on an entity.
    fn play_animation_state(&mut self, agent: EntityId, state: AssetRef, value: bool);

    /// Fires a one-shot animation trigger on an entity.
    fn play_animation_trigger(&mut self, agent: EntityId, trigger: AssetRef);

    /// Spawns a visual effect at a world position.
    fn spawn_effect(&mut self, effect: AssetRef, position: Vec3);

    /// Plays a sound clip.
    fn play_sound(&mut self, clip: AssetRef);

    /// Updates a health bar.
    fn update_health_display(&mut self, agent: EntityId, current: f32, max: f32);

    /// Updates the attention fill over an enemy's head, `ratio` in `[0, 1]`.
    fn update_attention_display(&mut self, agent: EntityId, ratio: f32);

    /// Updates an ability cooldown fill, `ratio` in `[0, 1]`.
    fn update_cooldown_display(&mut self, slot: AbilitySlot, ratio: f32);

    /// Requests a scene change (boss-victory and player-defeat only).
    fn request_scene(&mut self, scene: SceneId);
}

/// Input actions forwarded from the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    /// Melee attack / stealth-kill button.
    Attack,
    /// Dash ability.
    Dash,
    /// Time-dilation ultimate.
    Ultimate,
    /// Raise the block.
    Block,
}

/// Tag describing what dealt a hit, forwarded from collision callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DamageTag {
    /// The player's swung weapon.
    Weapon,
    /// The hidden blade used from behind.
    BackstabKnife,
    /// Boss ability or other enemy attack.
    EnemyAttack,
    /// Environmental hazard.
    Hazard,
}

/// Anything that can take damage: regular agents, the boss, and the player.
pub trait Damageable {
    /// Applies damage. Returns true when the hit was accepted, false when it
    /// was dropped (immunity window, already dead, or blocked).
    fn take_damage(&mut self, amount: f32) -> bool;

    /// Whether the entity has died.
    fn is_dead(&self) -> bool;
}

// ============================================================================
// Mock collaborators for testing
// ============================================================================

/// Mock world for testing: fixed entity positions, optional obstruction, and
/// ground everywhere unless marked bare.
#[derive(Debug, Default)]
pub struct MockWorld {
    entities: Vec<(EntityId, Vec3, Vec3)>,
    obstructed: bool,
    bare_ground: bool,
}

impl MockWorld {
    /// Creates an empty mock world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or moves an entity.
    pub fn place(&mut self, entity: EntityId, position: Vec3, facing: Vec3) {
        if let Some(slot) = self.entities.iter_mut().find(|(id, _, _)| *id == entity) {
            slot.1 = position;
            slot.2 = facing;
        } else {
            self.entities.push((entity, position, facing));
        }
    }

    /// Removes an entity.
    pub fn remove(&mut self, entity: EntityId) {
        self.entities.retain(|(id, _, _)| *id != entity);
    }

    /// Makes every obstruction ray report a blocker.
    pub fn set_obstructed(&mut self, obstructed: bool) {
        self.obstructed = obstructed;
    }

    /// Makes every ground probe fail.
    pub fn set_bare_ground(&mut self, bare: bool) {
        self.bare_ground = bare;
    }
}

impl WorldQuery for MockWorld {
    fn visible_targets(&self, position: Vec3, radius: f32) -> Vec<TargetHandle> {
        let mut hits: Vec<TargetHandle> = self
            .entities
            .iter()
            .filter(|(_, pos, _)| pos.distance(position) <= radius)
            .map(|&(entity, pos, _)| TargetHandle {
                entity,
                position: pos,
            })
            .collect();
        hits.sort_by(|a, b| {
            a.position
                .distance(position)
                .total_cmp(&b.position.distance(position))
        });
        hits
    }

    fn raycast_obstruction(&self, _from: Vec3, _to: Vec3) -> bool {
        self.obstructed
    }

    fn ground_below(&self, _point: Vec3) -> bool {
        !self.bare_ground
    }

    fn position_of(&self, entity: EntityId) -> Option<Vec3> {
        self.entities
            .iter()
            .find(|(id, _, _)| *id == entity)
            .map(|(_, pos, _)| *pos)
    }

    fn facing_of(&self, entity: EntityId) -> Option<Vec3> {
        self.entities
            .iter()
            .find(|(id, _, _)| *id == entity)
            .map(|(_, _, facing)| *facing)
    }
}

/// Mock navigation recording the last intent per entity.
#[derive(Debug, Default)]
pub struct MockNavigation {
    /// Last destination per entity, `None` after a stop.
    pub destinations: ahash::AHashMap<EntityId, Option<Vec3>>,
    /// Last speed scale per entity.
    pub speed_scales: ahash::AHashMap<EntityId, f32>,
    /// Entities removed from navigation.
    pub disabled: Vec<EntityId>,
}

impl MockNavigation {
    /// Creates a new mock navigation recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last speed scale set for an entity, defaulting to 1.0.
    #[must_use]
    pub fn speed_scale(&self, agent: EntityId) -> f32 {
        self.speed_scales.get(&agent).copied().unwrap_or(1.0)
    }
}

impl Navigation for MockNavigation {
    fn navigate_to(&mut self, agent: EntityId, destination: Vec3) {
        self.destinations.insert(agent, Some(destination));
    }

    fn stop_navigation(&mut self, agent: EntityId) {
        self.destinations.insert(agent, None);
    }

    fn set_speed_scale(&mut self, agent: EntityId, scale: f32) {
        self.speed_scales.insert(agent, scale);
    }

    fn set_facing(&mut self, _agent: EntityId, _yaw_deg: f32) {}

    fn disable(&mut self, agent: EntityId) {
        self.disabled.push(agent);
    }
}

/// Mock presentation recording every request for assertions.
#[derive(Debug, Default)]
pub struct MockPresentation {
    /// `(entity, state, value)` triples in call order.
    pub animation_states: Vec<(EntityId, AssetRef, bool)>,
    /// `(entity, trigger)` pairs in call order.
    pub animation_triggers: Vec<(EntityId, AssetRef)>,
    /// Spawned effects.
    pub effects: Vec<(AssetRef, Vec3)>,
    /// Played sounds.
    pub sounds: Vec<AssetRef>,
    /// Latest health display per entity.
    pub health_displays: ahash::AHashMap<EntityId, (f32, f32)>,
    /// Latest attention fill per entity.
    pub attention_displays: ahash::AHashMap<EntityId, f32>,
    /// Latest cooldown fill per slot.
    pub cooldown_displays: ahash::AHashMap<AbilitySlot, f32>,
    /// Requested scene changes in order.
    pub scene_requests: Vec<SceneId>,
}

impl MockPresentation {
    /// Creates a new mock presentation recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Presentation for MockPresentation {
    fn play_animation_state(&mut self, agent: EntityId, state: AssetRef, value: bool) {
        self.animation_states.push((agent, state, value));
    }

    fn play_animation_trigger(&mut self, agent: EntityId, trigger: AssetRef) {
        self.animation_triggers.push((agent, trigger));
    }

    fn spawn_effect(&mut self, effect: AssetRef, position: Vec3) {
        self.effects.push((effect, position));
    }

    fn play_sound(&mut self, clip: AssetRef) {
        self.sounds.push(clip);
    }

    fn update_health_display(&mut self, agent: EntityId, current: f32, max: f32) {
        self.health_displays.insert(agent, (current, max));
    }

    fn update_attention_display(&mut self, agent: EntityId, ratio: f32) {
        self.attention_displays.insert(agent, ratio);
    }

    fn update_cooldown_display(&mut self, slot: AbilitySlot, ratio: f32) {
        self.cooldown_displays.insert(slot, ratio);
    }

    fn request_scene(&mut self, scene: SceneId) {
        self.scene_requests.push(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_world_orders_targets_by_distance() {
        let mut world = MockWorld::new();
        let near = EntityId::from_raw(1);
        let far = EntityId::from_raw(2);
        world.place(far, Vec3::new(8.0, 0.0, 0.0), Vec3::Z);
        world.place(near, Vec3::new(2.0, 0.0, 0.0), Vec3::Z);

        let hits = world.visible_targets(Vec3::ZERO, 10.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entity, near);
        assert_eq!(hits[1].entity, far);
    }

    #[test]
    fn test_mock_world_radius_filter() {
        let mut world = MockWorld::new();
        world.place(EntityId::from_raw(1), Vec3::new(20.0, 0.0, 0.0), Vec3::Z);
        assert!(world.visible_targets(Vec3::ZERO, 10.0).is_empty());
    }
}
