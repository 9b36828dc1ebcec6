//! Enemy agents: the patrol/chase/attack loop over the perception tracker.
//!
//! Each agent re-evaluates one transition rule per tick: visible and in
//! attack range means attack, visible means chase, anything else means
//! patrol. Death is terminal from every state and schedules removal after a
//! delay that depends on how the agent was defeated. Civilians run the same
//! machine but never leave the patrol branch.

use ahash::AHashMap;
use crossbeam_channel::Receiver;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use umbra_common::coords::{distance, face_toward_deg, is_behind_within};
use umbra_common::{AssetRef, EntityId};

use crate::config::{AgentConfig, DilationConfig};
use crate::dilation::{DilationEvent, DilationHandle};
use crate::events::{EventBus, GameEvent};
use crate::perception::{PerceptionEvent, PerceptionTracker};
use crate::timer::Cooldown;
use crate::world::{Damageable, Navigation, Presentation, WorldQuery};

/// Error types for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent not found
    #[error("agent not found: {0:?}")]
    NotFound(EntityId),
    /// Agent already registered
    #[error("agent already registered: {0:?}")]
    AlreadyRegistered(EntityId),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Kind of agent, selecting which branches of the machine are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Armed enemy: patrols, chases, attacks.
    Soldier,
    /// Unarmed wanderer: only patrols.
    Civilian,
}

/// Behavior state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Wandering between random points near spawn.
    Patrol,
    /// Closing on the player's last position.
    Chase,
    /// In range: halted, facing the player, firing on cooldown.
    Attack,
    /// Terminal.
    Dead,
}

/// How an agent was defeated; selects the removal delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathKind {
    /// Killed from the front.
    Frontal,
    /// Killed through the stealth finisher.
    Backstab,
}

/// Presentation bindings for one agent. Unassigned bindings degrade to a
/// log line instead of a presentation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBindings {
    /// Walk animation state.
    pub walk: AssetRef,
    /// Run animation state.
    pub run: AssetRef,
    /// Death animation state.
    pub dead: AssetRef,
    /// Attack animation trigger.
    pub attack: AssetRef,
    /// Muzzle/swing effect.
    pub attack_effect: AssetRef,
    /// Attack sound clip.
    pub attack_sound: AssetRef,
    /// Death effect.
    pub death_effect: AssetRef,
}

impl Default for AgentBindings {
    fn default() -> Self {
        Self {
            walk: AssetRef::UNASSIGNED,
            run: AssetRef::UNASSIGNED,
            dead: AssetRef::UNASSIGNED,
            attack: AssetRef::UNASSIGNED,
            attack_effect: AssetRef::UNASSIGNED,
            attack_sound: AssetRef::UNASSIGNED,
            death_effect: AssetRef::UNASSIGNED,
        }
    }
}

/// State of an individual agent.
#[derive(Debug)]
pub struct Agent {
    /// Entity this agent drives.
    entity: EntityId,
    /// Soldier or civilian.
    kind: AgentKind,
    /// Current behavior state.
    state: AgentState,
    /// Remaining health.
    health: f32,
    /// Starting health, for the health display.
    max_health: f32,
    /// Visibility and attention state.
    perception: PerceptionTracker,
    /// Gate between attacks.
    attack_cooldown: Cooldown,
    /// Invulnerability window after an accepted hit.
    immunity: Cooldown,
    /// Removal countdown once dead.
    death_timer: Cooldown,
    /// How the agent died, once dead.
    death_kind: Option<DeathKind>,
    /// Current wander destination.
    walk_point: Option<Vec3>,
    /// Spawn position wander points are sampled around.
    spawn_point: Vec3,
    /// Whether the target currently stands in the rear arc.
    exposed_back: bool,
    /// Whether dilation scaling is applied.
    dilated: bool,
    /// Seconds between attacks, possibly scaled by dilation.
    time_between_attacks: f32,
    /// Pre-dilation value restored exactly on deactivation.
    base_time_between_attacks: f32,
    /// Last attention fill pushed to the display.
    displayed_attention: f32,
    /// Presentation bindings.
    bindings: AgentBindings,
    /// Tuning this agent was built from.
    config: AgentConfig,
    /// Dilation channel; civilians are not subscribed.
    dilation_rx: Option<Receiver<DilationEvent>>,
}

impl Agent {
    fn new(
        entity: EntityId,
        kind: AgentKind,
        config: &AgentConfig,
        spawn_point: Vec3,
        bindings: AgentBindings,
        dilation_rx: Option<Receiver<DilationEvent>>,
    ) -> Self {
        Self {
            entity,
            kind,
            state: AgentState::Patrol,
            health: config.health,
            max_health: config.health,
            perception: PerceptionTracker::new(
                config.sight_radius,
                config.sight_angle,
                config.attention_time,
            ),
            attack_cooldown: Cooldown::new(),
            immunity: Cooldown::new(),
            death_timer: Cooldown::new(),
            death_kind: None,
            walk_point: None,
            spawn_point,
            exposed_back: false,
            dilated: false,
            time_between_attacks: config.time_between_attacks,
            base_time_between_attacks: config.time_between_attacks,
            displayed_attention: 0.0,
            bindings,
            config: config.clone(),
            dilation_rx,
        }
    }

    /// Entity this agent drives.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Soldier or civilian.
    #[must_use]
    pub const fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Current behavior state.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Remaining health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Whether the target currently stands in the rear arc.
    #[must_use]
    pub const fn exposed_back(&self) -> bool {
        self.exposed_back
    }

    /// Whether this agent has fully detected the player.
    #[must_use]
    pub const fn fully_detected(&self) -> bool {
        self.perception.fully_detected()
    }

    /// Whether dilation scaling is currently applied.
    #[must_use]
    pub const fn is_time_dilated(&self) -> bool {
        self.dilated
    }

    /// Seconds between attacks under the current scaling.
    #[must_use]
    pub const fn time_between_attacks(&self) -> f32 {
        self.time_between_attacks
    }

    /// Read access to the perception state.
    #[must_use]
    pub const fn perception(&self) -> &PerceptionTracker {
        &self.perception
    }
}

impl Damageable for Agent {
    fn take_damage(&mut self, amount: f32) -> bool {
        if self.state == AgentState::Dead {
            return false;
        }
        if !self.immunity.is_ready() {
            debug!(
                "hit on {:?} dropped inside immunity window ({}s left)",
                self.entity,
                self.immunity.remaining()
            );
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        self.immunity.start(self.config.damage_immunity);
        debug!(
            "agent {:?} took {} damage, {} health left",
            self.entity, amount, self.health
        );
        true
    }

    fn is_dead(&self) -> bool {
        self.state == AgentState::Dead
    }
}

/// Manager driving every agent in the simulation.
#[derive(Debug)]
pub struct AgentManager {
    /// All registered agents.
    agents: AHashMap<EntityId, Agent>,
    /// Shared agent tuning.
    config: AgentConfig,
    /// Dilation scales applied on activation.
    dilation_config: DilationConfig,
    /// RNG state for wander sampling.
    rng_state: u64,
}

impl AgentManager {
    /// Creates a manager from validated tuning.
    #[must_use]
    pub fn new(config: AgentConfig, dilation_config: DilationConfig) -> Self {
        Self {
            agents: AHashMap::new(),
            config,
            dilation_config,
            rng_state: 12345,
        }
    }

    /// Replaces the wander RNG seed, for deterministic tests.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.rng_state = seed;
        self
    }

    /// Returns the number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns whether there are no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Gets an agent's state.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&Agent> {
        self.agents.get(&entity)
    }

    /// Gets mutable agent state.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Agent> {
        self.agents.get_mut(&entity)
    }

    /// Returns iterator over all agents.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Agent)> {
        self.agents.iter().map(|(&id, agent)| (id, agent))
    }

    /// Registers an entity as an agent. Soldiers subscribe to dilation;
    /// civilians are left out, matching their missing combat constants.
    pub fn register(
        &mut self,
        entity: EntityId,
        kind: AgentKind,
        spawn_point: Vec3,
        bindings: AgentBindings,
        dilation: &DilationHandle,
        bus: &EventBus,
    ) -> AgentResult<()> {
        if self.agents.contains_key(&entity) {
            return Err(AgentError::AlreadyRegistered(entity));
        }
        let rx = match kind {
            AgentKind::Soldier => Some(dilation.subscribe(entity)),
            AgentKind::Civilian => None,
        };
        let agent = Agent::new(entity, kind, &self.config, spawn_point, bindings, rx);
        self.agents.insert(entity, agent);
        bus.publish(GameEvent::AgentSpawned { entity_id: entity });
        Ok(())
    }

    /// Removes an agent immediately, dropping its dilation subscription.
    pub fn remove(&mut self, entity: EntityId, dilation: &DilationHandle) -> AgentResult<Agent> {
        dilation.unsubscribe(entity);
        self.agents
            .remove(&entity)
            .ok_or(AgentError::NotFound(entity))
    }

    /// Alive agents currently exposing their backs, nearest to `origin`
    /// first.
    pub fn exposed_targets<W: WorldQuery>(&self, world: &W, origin: Vec3) -> Vec<EntityId> {
        let mut exposed: Vec<(f32, EntityId)> = self
            .agents
            .values()
            .filter(|agent| agent.state != AgentState::Dead && agent.exposed_back)
            .filter_map(|agent| {
                world
                    .position_of(agent.entity)
                    .map(|pos| (distance(origin, pos), agent.entity))
            })
            .collect();
        exposed.sort_by(|a, b| a.0.total_cmp(&b.0));
        exposed.into_iter().map(|(_, entity)| entity).collect()
    }

    /// Applies damage to an agent, honoring the immunity window. Returns
    /// true when the hit was accepted.
    pub fn apply_damage<W: WorldQuery, N: Navigation, P: Presentation>(
        &mut self,
        entity: EntityId,
        amount: f32,
        world: &W,
        nav: &mut N,
        pres: &mut P,
        bus: &EventBus,
    ) -> bool {
        let Some(agent) = self.agents.get_mut(&entity) else {
            warn!("damage for unknown agent {:?} ignored", entity);
            return false;
        };
        if !agent.take_damage(amount) {
            return false;
        }
        pres.update_health_display(entity, agent.health, agent.max_health);
        if agent.health <= 0.0 {
            Self::kill(agent, DeathKind::Frontal, world, nav, pres, bus);
        }
        true
    }

    /// Kills an agent through the stealth finisher, bypassing immunity.
    pub fn finisher_kill<W: WorldQuery, N: Navigation, P: Presentation>(
        &mut self,
        entity: EntityId,
        world: &W,
        nav: &mut N,
        pres: &mut P,
        bus: &EventBus,
    ) {
        let Some(agent) = self.agents.get_mut(&entity) else {
            warn!("finisher for unknown agent {:?} ignored", entity);
            return;
        };
        agent.health = 0.0;
        pres.update_health_display(entity, 0.0, agent.max_health);
        Self::kill(agent, DeathKind::Backstab, world, nav, pres, bus);
    }

    /// Transitions an agent to Dead exactly once.
    fn kill<W: WorldQuery, N: Navigation, P: Presentation>(
        agent: &mut Agent,
        kind: DeathKind,
        world: &W,
        nav: &mut N,
        pres: &mut P,
        bus: &EventBus,
    ) {
        if agent.state == AgentState::Dead {
            return;
        }
        debug!("agent {:?} died ({:?})", agent.entity, kind);
        agent.state = AgentState::Dead;
        agent.death_kind = Some(kind);
        agent.perception.reset();
        agent.attack_cooldown.cancel();
        agent.walk_point = None;
        agent.exposed_back = false;

        nav.stop_navigation(agent.entity);
        nav.disable(agent.entity);
        set_animation_state(pres, agent.entity, agent.bindings.dead, true);
        if agent.bindings.death_effect.is_assigned() {
            if let Some(pos) = world.position_of(agent.entity) {
                pres.spawn_effect(agent.bindings.death_effect, pos);
            }
        }
        let delay = match kind {
            DeathKind::Frontal => agent.config.frontal_death_delay,
            DeathKind::Backstab => agent.config.backstab_death_delay,
        };
        agent.death_timer.start(delay);
        bus.publish(GameEvent::AgentDied {
            entity_id: agent.entity,
            kind,
        });
    }

    /// Updates all agents. Removes corpses whose removal delay expired and
    /// returns the agents that fired an attack this tick.
    pub fn update<W: WorldQuery, N: Navigation, P: Presentation>(
        &mut self,
        dt: f32,
        player: EntityId,
        world: &W,
        nav: &mut N,
        pres: &mut P,
        bus: &EventBus,
        dilation: &DilationHandle,
    ) -> Vec<EntityId> {
        let mut rng = self.rng_state;
        let mut expired = Vec::new();
        let mut shots = Vec::new();

        let ids: Vec<EntityId> = self.agents.keys().copied().collect();
        for id in ids {
            let Some(agent) = self.agents.get_mut(&id) else {
                continue;
            };
            let scales = (
                self.dilation_config.timing_scale,
                self.dilation_config.speed_scale,
            );
            let mut ctx = TickContext {
                shots: &mut shots,
                rng: &mut rng,
            };
            if update_agent(agent, dt, player, scales, world, nav, pres, bus, &mut ctx) {
                expired.push(id);
            }
        }

        self.rng_state = rng;
        for id in expired {
            dilation.unsubscribe(id);
            self.agents.remove(&id);
        }
        shots
    }
}

/// Mutable per-tick scratch shared across the manager's agents.
struct TickContext<'a> {
    /// Agents that fired an attack this tick.
    shots: &'a mut Vec<EntityId>,
    /// Wander-sampling RNG state.
    rng: &'a mut u64,
}

/// Advances one agent by one tick. Returns true when the corpse's removal
/// delay expired.
#[allow(clippy::too_many_arguments)]
fn update_agent<W: WorldQuery, N: Navigation, P: Presentation>(
    agent: &mut Agent,
    dt: f32,
    player: EntityId,
    (timing_scale, speed_scale): (f32, f32),
    world: &W,
    nav: &mut N,
    pres: &mut P,
    bus: &EventBus,
    ctx: &mut TickContext<'_>,
) -> bool {
    // Dilation edges apply at the top of the tick, never mid-calculation.
    drain_dilation(agent, nav, (timing_scale, speed_scale));

    if agent.state == AgentState::Dead {
        return agent.death_timer.tick(dt);
    }

    agent.attack_cooldown.tick(dt);
    agent.immunity.tick(dt);

    let Some(position) = world.position_of(agent.entity) else {
        debug!("agent {:?} has no transform this tick, skipping", agent.entity);
        return false;
    };
    let facing = world.facing_of(agent.entity).unwrap_or(Vec3::Z);
    let player_pos = world.position_of(player);

    agent.exposed_back = player_pos
        .is_some_and(|pp| is_behind_within(position, facing, pp, agent.config.back_exposure_range));

    if agent.kind == AgentKind::Soldier {
        for event in agent.perception.tick(dt, position, facing, player, world) {
            match event {
                PerceptionEvent::Spotted => {
                    debug!("agent {:?} spotted the player", agent.entity);
                }
                PerceptionEvent::Lost => {
                    debug!("agent {:?} lost the player", agent.entity);
                }
                PerceptionEvent::FullyDetected => {
                    bus.publish(GameEvent::PlayerFullyDetected {
                        entity_id: agent.entity,
                    });
                }
            }
        }
        let ratio = agent.perception.attention_ratio();
        if (ratio - agent.displayed_attention).abs() > f32::EPSILON {
            pres.update_attention_display(agent.entity, ratio);
            agent.displayed_attention = ratio;
        }
    }

    let visible = agent.perception.can_see_target();
    let in_attack_range = player_pos
        .is_some_and(|pp| distance(position, pp) <= agent.config.attack_range);

    let next = match agent.kind {
        AgentKind::Civilian => AgentState::Patrol,
        AgentKind::Soldier => {
            if visible && in_attack_range {
                AgentState::Attack
            } else if visible {
                AgentState::Chase
            } else {
                AgentState::Patrol
            }
        }
    };
    if next != agent.state {
        debug!("agent {:?}: {:?} -> {:?}", agent.entity, agent.state, next);
        set_animation_state(pres, agent.entity, agent.bindings.walk, next == AgentState::Patrol);
        set_animation_state(pres, agent.entity, agent.bindings.run, next == AgentState::Chase);
        agent.state = next;
    }

    match agent.state {
        AgentState::Patrol => patrol(agent, position, world, nav, ctx.rng),
        AgentState::Chase => {
            if let Some(pp) = player_pos {
                nav.navigate_to(agent.entity, pp);
            }
        }
        AgentState::Attack => {
            nav.stop_navigation(agent.entity);
            if let Some(pp) = player_pos {
                if let Some(yaw) = face_toward_deg(position, pp) {
                    nav.set_facing(agent.entity, yaw);
                }
                if agent.attack_cooldown.is_ready() {
                    fire_attack(agent, position, pres, bus);
                    ctx.shots.push(agent.entity);
                }
            }
        }
        AgentState::Dead => {}
    }

    false
}

/// Applies queued dilation edges, scaling constants on activation and
/// restoring the exact originals on deactivation.
fn drain_dilation<N: Navigation>(agent: &mut Agent, nav: &mut N, (timing_scale, speed_scale): (f32, f32)) {
    let Some(rx) = &agent.dilation_rx else {
        return;
    };
    let mut pending = Vec::new();
    while let Ok(event) = rx.try_recv() {
        pending.push(event);
    }
    for event in pending {
        match event {
            DilationEvent::Activated if !agent.dilated => {
                agent.dilated = true;
                agent.base_time_between_attacks = agent.time_between_attacks;
                agent.time_between_attacks *= timing_scale;
                nav.set_speed_scale(agent.entity, speed_scale);
                agent.perception.set_suppressed(true);
                debug!("agent {:?} slowed by time dilation", agent.entity);
            }
            DilationEvent::Deactivated if agent.dilated => {
                agent.dilated = false;
                agent.time_between_attacks = agent.base_time_between_attacks;
                nav.set_speed_scale(agent.entity, 1.0);
                agent.perception.set_suppressed(false);
                debug!("agent {:?} restored from time dilation", agent.entity);
            }
            _ => {}
        }
    }
}

/// Patrol: wander between validated random points near spawn.
fn patrol<W: WorldQuery, N: Navigation>(
    agent: &mut Agent,
    position: Vec3,
    world: &W,
    nav: &mut N,
    rng: &mut u64,
) {
    if agent.walk_point.is_none() {
        let range = agent.config.walk_point_range;
        let candidate = agent.spawn_point
            + Vec3::new(
                (next_random(rng) * 2.0 - 1.0) * range,
                0.0,
                (next_random(rng) * 2.0 - 1.0) * range,
            );
        // Only accept points a downward probe confirms are walkable.
        if world.ground_below(candidate) {
            agent.walk_point = Some(candidate);
        }
    }

    if let Some(walk_point) = agent.walk_point {
        nav.navigate_to(agent.entity, walk_point);
        if distance(position, walk_point) < 1.0 {
            agent.walk_point = None;
        }
    }
}

/// Fires one attack and starts the cooldown.
fn fire_attack<P: Presentation>(agent: &mut Agent, position: Vec3, pres: &mut P, bus: &EventBus) {
    debug!("agent {:?} attacks", agent.entity);
    if agent.bindings.attack.is_assigned() {
        pres.play_animation_trigger(agent.entity, agent.bindings.attack);
    }
    if agent.bindings.attack_effect.is_assigned() {
        pres.spawn_effect(agent.bindings.attack_effect, position);
    }
    if agent.bindings.attack_sound.is_assigned() {
        pres.play_sound(agent.bindings.attack_sound);
    }
    bus.publish(GameEvent::AgentAttacked {
        entity_id: agent.entity,
    });
    agent.attack_cooldown.start(agent.time_between_attacks);
}

/// Sets a boolean animation state, degrading to a log line when unbound.
fn set_animation_state<P: Presentation>(
    pres: &mut P,
    entity: EntityId,
    binding: AssetRef,
    value: bool,
) {
    if binding.is_assigned() {
        pres.play_animation_state(entity, binding, value);
    } else {
        debug!("animation binding missing for {:?}, skipping", entity);
    }
}

/// Gets a random value 0..1.
fn next_random(state: &mut u64) -> f32 {
    // Simple LCG
    *state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
    ((*state >> 16) & 0x7fff) as f32 / 32767.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{MockNavigation, MockPresentation, MockWorld};
    use crate::dilation::TimeDilation;

    const DT: f32 = 0.2;

    struct Rig {
        manager: AgentManager,
        world: MockWorld,
        nav: MockNavigation,
        pres: MockPresentation,
        bus: EventBus,
        dilation: DilationHandle,
        agent: EntityId,
        player: EntityId,
    }

    impl Rig {
        fn new() -> Self {
            let config = AgentConfig::default();
            let dilation_config = DilationConfig::default();
            let dilation = DilationHandle::new(TimeDilation::new(dilation_config.duration));
            let mut manager = AgentManager::new(config, dilation_config).with_seed(7);
            let bus = EventBus::default();

            let agent = EntityId::from_raw(1);
            let player = EntityId::from_raw(2);

            let mut world = MockWorld::new();
            world.place(agent, Vec3::ZERO, Vec3::Z);
            // Player far away and out of sight by default.
            world.place(player, Vec3::new(0.0, 0.0, 100.0), Vec3::Z);

            manager
                .register(
                    agent,
                    AgentKind::Soldier,
                    Vec3::ZERO,
                    AgentBindings::default(),
                    &dilation,
                    &bus,
                )
                .expect("register");

            Self {
                manager,
                world,
                nav: MockNavigation::new(),
                pres: MockPresentation::new(),
                bus,
                dilation,
                agent,
                player,
            }
        }

        fn tick(&mut self, dt: f32) {
            self.manager.update(
                dt,
                self.player,
                &self.world,
                &mut self.nav,
                &mut self.pres,
                &self.bus,
                &self.dilation,
            );
        }

        fn ticks(&mut self, count: usize) {
            for _ in 0..count {
                self.tick(DT);
            }
        }

        fn state(&self) -> AgentState {
            self.manager.get(self.agent).expect("agent").state()
        }

        fn place_player(&mut self, position: Vec3) {
            self.world.place(self.player, position, Vec3::Z);
        }
    }

    #[test]
    fn test_patrols_when_player_unseen() {
        let mut rig = Rig::new();
        rig.ticks(3);
        assert_eq!(rig.state(), AgentState::Patrol);
        // A wander destination was issued.
        assert!(matches!(
            rig.nav.destinations.get(&rig.agent),
            Some(Some(_))
        ));
    }

    #[test]
    fn test_no_walk_point_without_ground() {
        let mut rig = Rig::new();
        rig.world.set_bare_ground(true);
        rig.ticks(3);
        // Probe keeps failing; no destination is ever issued.
        assert!(rig.nav.destinations.get(&rig.agent).is_none());
    }

    #[test]
    fn test_chases_visible_player_out_of_attack_range() {
        let mut rig = Rig::new();
        rig.place_player(Vec3::new(0.0, 0.0, 10.0));
        rig.ticks(2);
        assert_eq!(rig.state(), AgentState::Chase);
        assert_eq!(
            rig.nav.destinations.get(&rig.agent),
            Some(&Some(Vec3::new(0.0, 0.0, 10.0)))
        );
    }

    #[test]
    fn test_attacks_visible_player_in_range() {
        let mut rig = Rig::new();
        rig.place_player(Vec3::new(0.0, 0.0, 5.0));
        rig.ticks(2);
        assert_eq!(rig.state(), AgentState::Attack);
        // Halted and fired exactly once so far.
        assert_eq!(rig.nav.destinations.get(&rig.agent), Some(&None));
        let attacks = rig
            .bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::AgentAttacked { .. }))
            .count();
        assert_eq!(attacks, 1);
    }

    #[test]
    fn test_attack_cooldown_spaces_shots() {
        let mut rig = Rig::new();
        rig.place_player(Vec3::new(0.0, 0.0, 5.0));
        // 2.0s between attacks at DT ticks: 12 ticks is 2.4s, enough for a
        // second shot and no third.
        rig.ticks(12);
        let attacks = rig
            .bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::AgentAttacked { .. }))
            .count();
        assert_eq!(attacks, 2);
    }

    #[test]
    fn test_returns_to_patrol_when_sight_lost() {
        let mut rig = Rig::new();
        rig.place_player(Vec3::new(0.0, 0.0, 10.0));
        rig.ticks(2);
        assert_eq!(rig.state(), AgentState::Chase);

        rig.place_player(Vec3::new(0.0, 0.0, 100.0));
        rig.ticks(2);
        assert_eq!(rig.state(), AgentState::Patrol);
    }

    #[test]
    fn test_civilian_never_chases() {
        let mut rig = Rig::new();
        let civilian = EntityId::from_raw(3);
        rig.world.place(civilian, Vec3::ZERO, Vec3::Z);
        rig.manager
            .register(
                civilian,
                AgentKind::Civilian,
                Vec3::ZERO,
                AgentBindings::default(),
                &rig.dilation,
                &rig.bus,
            )
            .expect("register");

        rig.place_player(Vec3::new(0.0, 0.0, 5.0));
        rig.ticks(4);
        assert_eq!(
            rig.manager.get(civilian).expect("civilian").state(),
            AgentState::Patrol
        );
    }

    #[test]
    fn test_damage_immunity_window_drops_hits() {
        let mut rig = Rig::new();
        let Rig {
            manager,
            world,
            nav,
            pres,
            bus,
            agent,
            ..
        } = &mut rig;

        assert!(manager.apply_damage(*agent, 10.0, world, nav, pres, bus));
        // Inside the 0.5s window: dropped.
        assert!(!manager.apply_damage(*agent, 10.0, world, nav, pres, bus));
        assert_eq!(manager.get(*agent).expect("agent").health(), 20.0);

        // After the window passes the next hit lands.
        rig.tick(0.6);
        let Rig {
            manager,
            world,
            nav,
            pres,
            bus,
            agent,
            ..
        } = &mut rig;
        assert!(manager.apply_damage(*agent, 10.0, world, nav, pres, bus));
        assert_eq!(manager.get(*agent).expect("agent").health(), 10.0);
    }

    #[test]
    fn test_lethal_damage_kills_once() {
        let mut rig = Rig::new();
        let Rig {
            manager,
            world,
            nav,
            pres,
            bus,
            agent,
            ..
        } = &mut rig;

        assert!(manager.apply_damage(*agent, 50.0, world, nav, pres, bus));
        assert_eq!(manager.get(*agent).expect("agent").state(), AgentState::Dead);
        assert!(nav.disabled.contains(agent));

        // Damage after death is a no-op.
        assert!(!manager.apply_damage(*agent, 50.0, world, nav, pres, bus));

        let deaths = bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::AgentDied { .. }))
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_backstab_death_removes_faster() {
        let mut rig = Rig::new();
        let Rig {
            manager,
            world,
            nav,
            pres,
            bus,
            agent,
            ..
        } = &mut rig;
        manager.finisher_kill(*agent, world, nav, pres, bus);
        assert_eq!(manager.get(*agent).expect("agent").state(), AgentState::Dead);

        // Backstab delay is 2.0s; corpse is gone shortly after.
        rig.ticks(11);
        assert!(rig.manager.get(rig.agent).is_none());
        assert_eq!(rig.dilation.subscriber_count(), 0);
    }

    #[test]
    fn test_exposed_back_tracks_player_position() {
        let mut rig = Rig::new();
        // Agent faces +Z; player right behind it.
        rig.place_player(Vec3::new(0.0, 0.0, -1.0));
        rig.tick(DT);
        assert!(rig.manager.get(rig.agent).expect("agent").exposed_back());
        assert_eq!(
            rig.manager.exposed_targets(&rig.world, Vec3::ZERO),
            vec![rig.agent]
        );

        // In front: not exposed.
        rig.place_player(Vec3::new(0.0, 0.0, 1.0));
        rig.tick(DT);
        assert!(!rig.manager.get(rig.agent).expect("agent").exposed_back());
        assert!(rig.manager.exposed_targets(&rig.world, Vec3::ZERO).is_empty());
    }

    #[test]
    fn test_full_detection_publishes_event() {
        let mut rig = Rig::new();
        rig.place_player(Vec3::new(0.0, 0.0, 5.0));
        // attention_time is 5s; stare for 6s.
        rig.ticks(30);
        let detected = rig
            .bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::PlayerFullyDetected { .. }))
            .count();
        assert_eq!(detected, 1);
        assert!(rig.manager.get(rig.agent).expect("agent").fully_detected());
    }

    #[test]
    fn test_dilation_blinds_and_slows() {
        let mut rig = Rig::new();
        rig.place_player(Vec3::new(0.0, 0.0, 5.0));
        rig.ticks(2);
        assert_eq!(rig.state(), AgentState::Attack);

        rig.dilation.activate();
        rig.tick(DT);
        let agent = rig.manager.get(rig.agent).expect("agent");
        assert!(agent.is_time_dilated());
        assert_eq!(agent.time_between_attacks(), 4.0);
        assert!(!agent.perception().can_see_target());
        assert_eq!(rig.nav.speed_scale(rig.agent), 0.5);

        // Blind means the agent falls back to patrol.
        rig.ticks(2);
        assert_eq!(rig.state(), AgentState::Patrol);
    }

    #[test]
    fn test_dilation_round_trip_restores_exactly() {
        let mut rig = Rig::new();
        let original = rig
            .manager
            .get(rig.agent)
            .expect("agent")
            .time_between_attacks();

        for _ in 0..5 {
            rig.dilation.activate();
            rig.tick(DT);
            rig.dilation.deactivate();
            rig.tick(DT);
        }

        let agent = rig.manager.get(rig.agent).expect("agent");
        assert!(!agent.is_time_dilated());
        assert_eq!(agent.time_between_attacks(), original);
        assert_eq!(rig.nav.speed_scale(rig.agent), 1.0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut rig = Rig::new();
        let result = rig.manager.register(
            rig.agent,
            AgentKind::Soldier,
            Vec3::ZERO,
            AgentBindings::default(),
            &rig.dilation,
            &rig.bus,
        );
        assert!(matches!(result, Err(AgentError::AlreadyRegistered(_))));
    }
}
