//! Game flow and the session container.
//!
//! [`GameFlow`] owns the cross-scene lifecycle rule: the session persists
//! through mission scenes and tears down when the menu, victory or defeat
//! scene loads. It is constructed once and passed down, never reached
//! through a global.
//!
//! [`Session`] owns every gameplay system and advances them in a fixed
//! order per simulation tick.

use tracing::{debug, info, warn};

use umbra_common::{EntityId, SceneId, UmbraError, UmbraResult};

use crate::agent::{AgentBindings, AgentKind, AgentManager, AgentResult};
use crate::boss::{Boss, BossBindings};
use crate::combo::{AttackOutcome, ComboEvent, ComboResolver};
use crate::config::GameConfig;
use crate::dilation::{DilationHandle, TimeDilation};
use crate::events::{EventBus, GameEvent};
use crate::player::PlayerState;
use crate::world::{Damageable, DamageTag, InputAction, Navigation, Presentation, WorldQuery};

/// What the embedding application should do with the session after a scene
/// load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirective {
    /// Keep the session running.
    Persist,
    /// Drop the session; the new scene starts fresh.
    TearDown,
}

/// Cross-scene lifecycle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameFlow {
    /// Scene currently loaded.
    current_scene: SceneId,
}

impl GameFlow {
    /// Creates the flow context for an initial scene.
    #[must_use]
    pub const fn new(initial_scene: SceneId) -> Self {
        Self {
            current_scene: initial_scene,
        }
    }

    /// Scene currently loaded.
    #[must_use]
    pub const fn current_scene(&self) -> SceneId {
        self.current_scene
    }

    /// Whether the gameplay session survives into a scene. Mission scenes
    /// keep it; menu and both ending scenes start over.
    #[must_use]
    pub fn session_persists_in(scene: SceneId) -> bool {
        !matches!(
            scene,
            SceneId::MAIN_MENU | SceneId::VICTORY | SceneId::DEFEAT
        )
    }

    /// Records a scene load and reports whether the session survives it.
    pub fn on_scene_loaded(&mut self, scene: SceneId) -> FlowDirective {
        self.current_scene = scene;
        if Self::session_persists_in(scene) {
            FlowDirective::Persist
        } else {
            info!("scene {:?} tears the session down", scene);
            FlowDirective::TearDown
        }
    }
}

/// The complete gameplay simulation for one mission.
#[derive(Debug)]
pub struct Session {
    /// Validated tuning.
    config: GameConfig,
    /// Scene lifecycle rules.
    flow: GameFlow,
    /// Player health, block and abilities.
    player: PlayerState,
    /// Player combo resolver.
    combo: ComboResolver,
    /// Every regular agent.
    agents: AgentManager,
    /// The boss encounter, when one is present.
    boss: Option<Boss>,
    /// Time-dilation broadcaster.
    dilation: DilationHandle,
    /// Outward event bus.
    bus: EventBus,
    /// The defeat scene was already requested.
    defeat_requested: bool,
}

impl Session {
    /// Builds a session from tuning, failing fast on invalid values.
    pub fn new(
        config: GameConfig,
        initial_scene: SceneId,
        player_entity: EntityId,
    ) -> UmbraResult<Self> {
        config
            .validate()
            .map_err(|e| UmbraError::Config(e.to_string()))?;

        let dilation = DilationHandle::new(TimeDilation::new(config.dilation.duration));
        let player = PlayerState::new(player_entity, config.player);
        let combo = ComboResolver::new(config.combo.clone());
        let agents = AgentManager::new(config.agent.clone(), config.dilation);

        Ok(Self {
            config,
            flow: GameFlow::new(initial_scene),
            player,
            combo,
            agents,
            boss: None,
            dilation,
            bus: EventBus::default(),
            defeat_requested: false,
        })
    }

    /// Scene lifecycle rules.
    #[must_use]
    pub const fn flow(&self) -> &GameFlow {
        &self.flow
    }

    /// Records a scene load; see [`GameFlow::on_scene_loaded`].
    pub fn on_scene_loaded(&mut self, scene: SceneId) -> FlowDirective {
        self.flow.on_scene_loaded(scene)
    }

    /// Player state.
    #[must_use]
    pub const fn player(&self) -> &PlayerState {
        &self.player
    }

    /// Agent manager.
    #[must_use]
    pub const fn agents(&self) -> &AgentManager {
        &self.agents
    }

    /// Boss state, when an encounter is running.
    #[must_use]
    pub const fn boss(&self) -> Option<&Boss> {
        self.boss.as_ref()
    }

    /// Time-dilation broadcaster handle.
    #[must_use]
    pub const fn dilation(&self) -> &DilationHandle {
        &self.dilation
    }

    /// Combo resolver.
    #[must_use]
    pub const fn combo(&self) -> &ComboResolver {
        &self.combo
    }

    /// Drains the outward event bus.
    pub fn drain_events(&self) -> Vec<GameEvent> {
        self.bus.drain()
    }

    /// Registers an enemy agent.
    pub fn spawn_agent(
        &mut self,
        entity: EntityId,
        kind: AgentKind,
        spawn_point: glam::Vec3,
        bindings: AgentBindings,
    ) -> AgentResult<()> {
        self.agents
            .register(entity, kind, spawn_point, bindings, &self.dilation, &self.bus)
    }

    /// Removes an agent immediately (scripted despawn, scene teardown),
    /// dropping its dilation subscription with it.
    pub fn despawn_agent(&mut self, entity: EntityId) -> AgentResult<()> {
        self.agents.remove(entity, &self.dilation).map(|_| ())
    }

    /// Starts a boss encounter.
    pub fn spawn_boss(&mut self, entity: EntityId, bindings: BossBindings) {
        self.boss = Some(Boss::new(
            entity,
            self.config.boss.clone(),
            self.config.dilation,
            bindings,
            &self.dilation,
        ));
    }

    /// Handles one input action from the platform layer.
    pub fn on_input_action<W: WorldQuery, P: Presentation>(
        &mut self,
        action: InputAction,
        world: &W,
        pres: &mut P,
    ) {
        match action {
            InputAction::Attack => self.on_attack_input(world, pres),
            InputAction::Dash => {
                let _ = self.player.try_dash();
            }
            InputAction::Ultimate => {
                if self.player.try_ultimate(&self.dilation) {
                    self.bus.publish(GameEvent::TimeDilationStarted);
                }
            }
            InputAction::Block => self.player.raise_block(),
        }
    }

    fn on_attack_input<W: WorldQuery, P: Presentation>(&mut self, world: &W, pres: &mut P) {
        let Some(player_pos) = world.position_of(self.player.entity()) else {
            debug!("attack input with no player transform, skipped");
            return;
        };
        let exposed = self.agents.exposed_targets(world, player_pos);
        match self.combo.on_attack_input(&exposed) {
            AttackOutcome::Swing { index, step } => {
                debug!("combo swing {}", index);
                if step.animation.is_assigned() {
                    pres.play_animation_trigger(self.player.entity(), step.animation);
                }
            }
            AttackOutcome::FinisherStarted { target } => {
                debug!("finisher started on {:?}", target);
                let animation = self.config.combo.finisher_animation;
                if animation.is_assigned() {
                    pres.play_animation_trigger(self.player.entity(), animation);
                }
            }
            outcome => debug!("attack input ignored: {:?}", outcome),
        }
    }

    /// Routes a damage report from the collision layer to its target.
    pub fn on_damage_received<W: WorldQuery, N: Navigation, P: Presentation>(
        &mut self,
        entity: EntityId,
        amount: f32,
        tag: DamageTag,
        world: &W,
        nav: &mut N,
        pres: &mut P,
    ) {
        debug!("{:?} damage {} on {:?}", tag, amount, entity);
        if entity == self.player.entity() {
            self.damage_player(amount, pres);
            return;
        }
        if let Some(boss) = &mut self.boss {
            if boss.entity() == entity {
                boss.apply_damage(amount, nav, pres, &self.bus);
                return;
            }
        }
        if self.agents.get(entity).is_some() {
            self.agents
                .apply_damage(entity, amount, world, nav, pres, &self.bus);
        } else {
            warn!("damage for unknown entity {:?} dropped", entity);
        }
    }

    /// Advances the whole simulation by one tick.
    pub fn on_simulation_tick<W: WorldQuery, N: Navigation, P: Presentation>(
        &mut self,
        dt: f32,
        world: &W,
        nav: &mut N,
        pres: &mut P,
    ) {
        let player_entity = self.player.entity();

        // Dilation expiry first so every subscriber sees the edge at the
        // top of this tick.
        if self.dilation.tick(dt) {
            self.bus.publish(GameEvent::TimeDilationEnded);
        }

        self.player.tick(dt, pres);

        for event in self.combo.tick(dt) {
            match event {
                ComboEvent::FinisherKill { target } => {
                    self.agents
                        .finisher_kill(target, world, nav, pres, &self.bus);
                }
                ComboEvent::FinisherEnded => debug!("finisher ended"),
                ComboEvent::ChainReset => debug!("combo chain reset"),
            }
        }

        let shots = self
            .agents
            .update(dt, player_entity, world, nav, pres, &self.bus, &self.dilation);
        for shooter in shots {
            // Hitscan shot: blocked rays miss.
            let hit = match (world.position_of(shooter), world.position_of(player_entity)) {
                (Some(from), Some(to)) => !world.raycast_obstruction(from, to),
                _ => false,
            };
            if hit {
                self.damage_player(self.config.agent.attack_damage, pres);
            }
        }

        if let Some(boss) = &mut self.boss {
            let strikes = boss.update(dt, player_entity, world, nav, pres, &self.bus);
            for strike in strikes {
                self.damage_player(strike.damage, pres);
            }
        }
    }

    /// Applies damage to the player, requesting the defeat scene exactly
    /// once when it proves lethal.
    fn damage_player<P: Presentation>(&mut self, amount: f32, pres: &mut P) {
        if !self.player.take_damage(amount) {
            return;
        }
        pres.update_health_display(
            self.player.entity(),
            self.player.health(),
            self.player.max_health(),
        );
        if self.player.is_dead() && !self.defeat_requested {
            self.defeat_requested = true;
            self.bus.publish(GameEvent::PlayerDied);
            pres.request_scene(SceneId::DEFEAT);
            self.bus.publish(GameEvent::SceneRequested {
                scene: SceneId::DEFEAT,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::world::{MockNavigation, MockPresentation, MockWorld};
    use glam::Vec3;

    struct Rig {
        session: Session,
        world: MockWorld,
        nav: MockNavigation,
        pres: MockPresentation,
        player: EntityId,
    }

    impl Rig {
        fn new() -> Self {
            let player = EntityId::from_raw(2);
            let session = Session::new(GameConfig::default(), SceneId::CITY, player)
                .expect("valid default config");

            let mut world = MockWorld::new();
            world.place(player, Vec3::new(0.0, 0.0, 20.0), Vec3::Z);

            Self {
                session,
                world,
                nav: MockNavigation::new(),
                pres: MockPresentation::new(),
                player,
            }
        }

        fn with_agent(mut self, entity: EntityId, position: Vec3) -> Self {
            self.world.place(entity, position, Vec3::Z);
            self.session
                .spawn_agent(entity, AgentKind::Soldier, position, AgentBindings::default())
                .expect("spawn agent");
            self
        }

        fn tick(&mut self, dt: f32) {
            self.session
                .on_simulation_tick(dt, &self.world, &mut self.nav, &mut self.pres);
        }

        fn run_for(&mut self, seconds: f32) {
            let steps = (seconds / 0.1).round() as usize;
            for _ in 0..steps {
                self.tick(0.1);
            }
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GameConfig::default();
        config.player.dash_cooldown = -1.0;
        let result = Session::new(config, SceneId::CITY, EntityId::from_raw(2));
        assert!(matches!(result, Err(UmbraError::Config(_))));
    }

    #[test]
    fn test_flow_rules() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.session.on_scene_loaded(SceneId::BOSS_ARENA),
            FlowDirective::Persist
        );
        assert_eq!(
            rig.session.on_scene_loaded(SceneId::VICTORY),
            FlowDirective::TearDown
        );
        assert!(!GameFlow::session_persists_in(SceneId::MAIN_MENU));
        assert!(!GameFlow::session_persists_in(SceneId::DEFEAT));
    }

    #[test]
    fn test_finisher_kills_exposed_agent() {
        let enemy = EntityId::from_raw(5);
        // Enemy faces +Z; player at z=20... move player right behind it.
        let mut rig = Rig::new().with_agent(enemy, Vec3::new(0.0, 0.0, 21.0));
        rig.world.place(enemy, Vec3::new(0.0, 0.0, 21.0), Vec3::Z);
        rig.world.place(rig.player, Vec3::new(0.0, 0.0, 20.0), Vec3::Z);

        // One tick so the agent computes its exposed back.
        rig.tick(0.1);
        rig.session
            .on_input_action(InputAction::Attack, &rig.world, &mut rig.pres);
        assert!(rig.session.combo().is_finisher_active());

        // Kill beat lands 0.5s in.
        rig.run_for(0.7);
        assert_eq!(
            rig.session.agents().get(enemy).expect("agent").state(),
            AgentState::Dead
        );
        let events = rig.session.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::AgentDied { .. })));
    }

    #[test]
    fn test_combo_swing_plays_step_animation() {
        let mut rig = Rig::new();
        rig.session
            .on_input_action(InputAction::Attack, &rig.world, &mut rig.pres);
        assert_eq!(rig.pres.animation_triggers.len(), 1);
    }

    #[test]
    fn test_ultimate_slows_agents_and_restores() {
        let enemy = EntityId::from_raw(5);
        let mut rig = Rig::new().with_agent(enemy, Vec3::new(0.0, 0.0, 40.0));

        rig.session
            .on_input_action(InputAction::Ultimate, &rig.world, &mut rig.pres);
        rig.tick(0.1);
        assert!(rig.session.agents().get(enemy).expect("agent").is_time_dilated());

        // The effect lasts 6 seconds, then every constant is restored.
        rig.run_for(6.5);
        let agent = rig.session.agents().get(enemy).expect("agent");
        assert!(!agent.is_time_dilated());
        assert_eq!(agent.time_between_attacks(), 2.0);

        let events = rig.session.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::TimeDilationStarted)));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::TimeDilationEnded)));
    }

    #[test]
    fn test_agent_shot_damages_player() {
        let enemy = EntityId::from_raw(5);
        // Enemy sees the player inside attack range.
        let mut rig = Rig::new().with_agent(enemy, Vec3::new(0.0, 0.0, 15.0));

        rig.run_for(0.5);
        assert!(rig.session.player().health() < 100.0);
    }

    #[test]
    fn test_blocked_player_takes_no_shot_damage() {
        let enemy = EntityId::from_raw(5);
        let mut rig = Rig::new().with_agent(enemy, Vec3::new(0.0, 0.0, 15.0));

        rig.session
            .on_input_action(InputAction::Block, &rig.world, &mut rig.pres);
        // Shots land within the block window (1.0s) and are absorbed.
        rig.run_for(0.4);
        assert_eq!(rig.session.player().health(), 100.0);
    }

    #[test]
    fn test_player_death_requests_defeat_scene_once() {
        let mut rig = Rig::new();
        let player = rig.player;
        rig.session.on_damage_received(
            player,
            250.0,
            DamageTag::Hazard,
            &rig.world,
            &mut rig.nav,
            &mut rig.pres,
        );
        assert!(rig.session.player().is_dead());
        assert_eq!(rig.pres.scene_requests, vec![SceneId::DEFEAT]);

        // More damage never re-requests the scene.
        rig.session.on_damage_received(
            player,
            50.0,
            DamageTag::Hazard,
            &rig.world,
            &mut rig.nav,
            &mut rig.pres,
        );
        assert_eq!(rig.pres.scene_requests.len(), 1);
    }

    #[test]
    fn test_damage_routes_to_boss() {
        let boss_id = EntityId::from_raw(10);
        let mut rig = Rig::new();
        rig.world.place(boss_id, Vec3::new(0.0, 0.0, 50.0), Vec3::Z);
        rig.session.spawn_boss(boss_id, BossBindings::default());

        rig.session.on_damage_received(
            boss_id,
            10.0,
            DamageTag::BackstabKnife,
            &rig.world,
            &mut rig.nav,
            &mut rig.pres,
        );
        assert_eq!(rig.session.boss().expect("boss").health(), 90.0);
    }

    #[test]
    fn test_unknown_entity_damage_dropped() {
        let mut rig = Rig::new();
        rig.session.on_damage_received(
            EntityId::from_raw(77),
            10.0,
            DamageTag::Weapon,
            &rig.world,
            &mut rig.nav,
            &mut rig.pres,
        );
        assert_eq!(rig.session.player().health(), 100.0);
    }
}
