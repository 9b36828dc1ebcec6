//! Boss encounter: a continuously-running sense/chase/attack cycle.
//!
//! The attack sequence is strictly ordered: Red, Blue, Purple, then a long
//! recharge, with a range re-check between every step. Leaving attack range
//! at a checkpoint aborts the sequence back to the outer loop; staying in
//! range through the recharge re-enters the sequence at Red. Every windup,
//! cooldown and the recharge stretch while time dilation is active.
//!
//! Unlike regular agents the boss has no damage-immunity window: every hit
//! is applied the moment it lands.

use crossbeam_channel::Receiver;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use umbra_common::coords::{distance, face_toward_deg};
use umbra_common::{AssetRef, EntityId, SceneId};

use crate::config::{BossAbilityConfig, BossConfig, DilationConfig};
use crate::dilation::{DilationEvent, DilationHandle};
use crate::events::{EventBus, GameEvent};
use crate::timer::Cooldown;
use crate::world::{Damageable, Navigation, Presentation, WorldQuery};

/// The boss's three sub-abilities, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityColor {
    /// Forward beam, first in the sequence.
    Red,
    /// Close radial burst, second.
    Blue,
    /// Long-reach beam, third.
    Purple,
}

impl AbilityColor {
    /// The ability that follows this one, or `None` after the last.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Red => Some(Self::Blue),
            Self::Blue => Some(Self::Purple),
            Self::Purple => None,
        }
    }
}

/// Stage within one sub-ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackStage {
    /// Playing the ability animation.
    Windup,
    /// Waiting out the ability's cooldown before the next range check.
    Cooldown,
}

/// Top-level phase of the encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossPhase {
    /// Player out of sight; standing still.
    Idle,
    /// Player in sight but out of attack range; closing in.
    Chasing,
    /// Running the ordered attack sequence.
    Attacking(AbilityColor, AttackStage),
    /// Between sequences, vulnerable and charging up.
    Recharging,
    /// Terminal.
    Dead,
}

/// A sub-ability strike that connected with the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossStrike {
    /// Which ability hit.
    pub color: AbilityColor,
    /// Damage to apply.
    pub damage: f32,
}

/// A scheduled damage application partway into a windup.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingStrike {
    color: AbilityColor,
    elapsed: f32,
    delay: f32,
}

/// Presentation bindings for the boss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossBindings {
    /// Run animation state.
    pub run: AssetRef,
    /// Red ability animation state.
    pub red: AssetRef,
    /// Blue ability animation state.
    pub blue: AssetRef,
    /// Purple ability animation state.
    pub purple: AssetRef,
    /// Recharge animation state.
    pub charge: AssetRef,
    /// Death animation state.
    pub dead: AssetRef,
    /// Red strike effect.
    pub red_effect: AssetRef,
    /// Blue strike effect.
    pub blue_effect: AssetRef,
    /// Purple strike effect.
    pub purple_effect: AssetRef,
    /// Recharge aura effect.
    pub recharge_effect: AssetRef,
    /// Red ability sound.
    pub red_sound: AssetRef,
    /// Blue ability sound.
    pub blue_sound: AssetRef,
    /// Purple ability sound.
    pub purple_sound: AssetRef,
    /// Recharge sound.
    pub recharge_sound: AssetRef,
}

impl Default for BossBindings {
    fn default() -> Self {
        Self {
            run: AssetRef::UNASSIGNED,
            red: AssetRef::UNASSIGNED,
            blue: AssetRef::UNASSIGNED,
            purple: AssetRef::UNASSIGNED,
            charge: AssetRef::UNASSIGNED,
            dead: AssetRef::UNASSIGNED,
            red_effect: AssetRef::UNASSIGNED,
            blue_effect: AssetRef::UNASSIGNED,
            purple_effect: AssetRef::UNASSIGNED,
            recharge_effect: AssetRef::UNASSIGNED,
            red_sound: AssetRef::UNASSIGNED,
            blue_sound: AssetRef::UNASSIGNED,
            purple_sound: AssetRef::UNASSIGNED,
            recharge_sound: AssetRef::UNASSIGNED,
        }
    }
}

impl BossBindings {
    /// Animation state for a sub-ability.
    #[must_use]
    pub const fn state_for(&self, color: AbilityColor) -> AssetRef {
        match color {
            AbilityColor::Red => self.red,
            AbilityColor::Blue => self.blue,
            AbilityColor::Purple => self.purple,
        }
    }

    /// Strike effect for a sub-ability.
    #[must_use]
    pub const fn effect_for(&self, color: AbilityColor) -> AssetRef {
        match color {
            AbilityColor::Red => self.red_effect,
            AbilityColor::Blue => self.blue_effect,
            AbilityColor::Purple => self.purple_effect,
        }
    }

    /// Sound for a sub-ability.
    #[must_use]
    pub const fn sound_for(&self, color: AbilityColor) -> AssetRef {
        match color {
            AbilityColor::Red => self.red_sound,
            AbilityColor::Blue => self.blue_sound,
            AbilityColor::Purple => self.purple_sound,
        }
    }
}

/// The boss state machine.
#[derive(Debug)]
pub struct Boss {
    /// Entity the boss drives.
    entity: EntityId,
    /// Encounter tuning.
    config: BossConfig,
    /// Remaining health.
    health: f32,
    /// Current phase.
    phase: BossPhase,
    /// Time spent in the current phase stage.
    phase_time: f32,
    /// Duration of the current phase stage, scaled at entry.
    phase_duration: f32,
    /// Damage application in flight.
    pending_strike: Option<PendingStrike>,
    /// Whether dilation scaling is applied.
    dilated: bool,
    /// Multiplier on every wait while dilation is active.
    timing_scale: f32,
    /// Dilation tuning (scales to apply).
    dilation_config: DilationConfig,
    /// Removal countdown once dead.
    death_timer: Cooldown,
    /// The encounter-end scene was already requested.
    scene_requested: bool,
    /// Presentation bindings.
    bindings: BossBindings,
    /// Dilation channel.
    dilation_rx: Receiver<DilationEvent>,
}

impl Boss {
    /// Creates the boss and subscribes it to time dilation.
    #[must_use]
    pub fn new(
        entity: EntityId,
        config: BossConfig,
        dilation_config: DilationConfig,
        bindings: BossBindings,
        dilation: &DilationHandle,
    ) -> Self {
        let health = config.max_health;
        Self {
            entity,
            config,
            health,
            phase: BossPhase::Idle,
            phase_time: 0.0,
            phase_duration: 0.0,
            pending_strike: None,
            dilated: false,
            timing_scale: 1.0,
            dilation_config,
            death_timer: Cooldown::new(),
            scene_requested: false,
            bindings,
            dilation_rx: dilation.subscribe(entity),
        }
    }

    /// Entity the boss drives.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BossPhase {
        self.phase
    }

    /// Remaining health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Whether dilation scaling is applied.
    #[must_use]
    pub const fn is_time_dilated(&self) -> bool {
        self.dilated
    }

    fn ability(&self, color: AbilityColor) -> BossAbilityConfig {
        match color {
            AbilityColor::Red => self.config.red,
            AbilityColor::Blue => self.config.blue,
            AbilityColor::Purple => self.config.purple,
        }
    }

    /// Applies damage with presentation side effects. The boss has no
    /// immunity window; every call lands.
    pub fn apply_damage<N: Navigation, P: Presentation>(
        &mut self,
        amount: f32,
        nav: &mut N,
        pres: &mut P,
        bus: &EventBus,
    ) -> bool {
        if !self.take_damage(amount) {
            return false;
        }
        pres.update_health_display(self.entity, self.health, self.config.max_health);
        if self.health <= 0.0 {
            self.die(nav, pres, bus);
        }
        true
    }

    /// Transitions to the terminal death sequence exactly once.
    fn die<N: Navigation, P: Presentation>(&mut self, nav: &mut N, pres: &mut P, bus: &EventBus) {
        if self.phase == BossPhase::Dead {
            return;
        }
        info!("boss defeated");
        self.clear_phase_animations(pres);
        self.phase = BossPhase::Dead;
        self.pending_strike = None;
        nav.stop_navigation(self.entity);
        nav.disable(self.entity);
        if self.bindings.dead.is_assigned() {
            pres.play_animation_state(self.entity, self.bindings.dead, true);
        }
        self.death_timer.start(self.config.death_delay);
        bus.publish(GameEvent::BossDefeated);
    }

    /// Drops every phase-driven animation flag.
    fn clear_phase_animations<P: Presentation>(&mut self, pres: &mut P) {
        for binding in [
            self.bindings.run,
            self.bindings.red,
            self.bindings.blue,
            self.bindings.purple,
            self.bindings.charge,
        ] {
            if binding.is_assigned() {
                pres.play_animation_state(self.entity, binding, false);
            }
        }
    }

    /// Advances the encounter by one tick. Returns strikes that connected
    /// with the player this tick.
    pub fn update<W: WorldQuery, N: Navigation, P: Presentation>(
        &mut self,
        dt: f32,
        player: EntityId,
        world: &W,
        nav: &mut N,
        pres: &mut P,
        bus: &EventBus,
    ) -> Vec<BossStrike> {
        // Dilation edges apply at the top of the tick, never mid-wait.
        self.drain_dilation(nav);

        if self.phase == BossPhase::Dead {
            if self.death_timer.tick(dt) && !self.scene_requested {
                self.scene_requested = true;
                pres.request_scene(SceneId::VICTORY);
                bus.publish(GameEvent::SceneRequested {
                    scene: SceneId::VICTORY,
                });
            }
            return Vec::new();
        }

        let position = world.position_of(self.entity);
        let player_pos = world.position_of(player);

        let (in_sight, in_attack) = match (position, player_pos) {
            (Some(pos), Some(pp)) => {
                let dist = distance(pos, pp);
                (
                    dist <= self.config.sight_range,
                    dist <= self.config.attack_range,
                )
            }
            // No resolvable target this tick: treat as out of range and
            // retry next tick.
            _ => (false, false),
        };

        // Always face the player while alive.
        if let (Some(pos), Some(pp)) = (position, player_pos) {
            if let Some(yaw) = face_toward_deg(pos, pp) {
                nav.set_facing(self.entity, yaw);
            }
        }

        let strikes = self.tick_pending_strike(dt, position, player_pos, world, pres, bus);

        self.phase_time += dt;
        match self.phase {
            BossPhase::Idle => {
                if in_sight && in_attack {
                    self.begin_ability(AbilityColor::Red, nav, pres, bus);
                } else if in_sight {
                    self.begin_chase(pres);
                }
            }
            BossPhase::Chasing => {
                if in_sight && in_attack {
                    self.begin_ability(AbilityColor::Red, nav, pres, bus);
                } else if in_sight {
                    if let Some(pp) = player_pos {
                        nav.navigate_to(self.entity, pp);
                    }
                } else {
                    self.begin_idle(pres);
                }
            }
            BossPhase::Attacking(color, stage) => {
                if self.phase_time >= self.phase_duration {
                    match stage {
                        AttackStage::Windup => {
                            if self.bindings.state_for(color).is_assigned() {
                                pres.play_animation_state(
                                    self.entity,
                                    self.bindings.state_for(color),
                                    false,
                                );
                            }
                            let cooldown = self.ability(color).cooldown;
                            self.enter_phase(
                                BossPhase::Attacking(color, AttackStage::Cooldown),
                                cooldown,
                            );
                        }
                        AttackStage::Cooldown => {
                            // Range re-check between every step.
                            if !in_attack {
                                debug!("target left attack range, sequence aborted");
                                self.begin_idle(pres);
                            } else if let Some(next) = color.next() {
                                self.begin_ability(next, nav, pres, bus);
                            } else {
                                self.begin_recharge(pres, bus);
                            }
                        }
                    }
                }
            }
            BossPhase::Recharging => {
                if self.phase_time >= self.phase_duration {
                    if self.bindings.charge.is_assigned() {
                        pres.play_animation_state(self.entity, self.bindings.charge, false);
                    }
                    if in_attack {
                        // Still in range after recharging: run the whole
                        // sequence again.
                        self.begin_ability(AbilityColor::Red, nav, pres, bus);
                    } else {
                        self.begin_idle(pres);
                    }
                }
            }
            BossPhase::Dead => {}
        }

        strikes
    }

    fn drain_dilation<N: Navigation>(&mut self, nav: &mut N) {
        let mut pending = Vec::new();
        while let Ok(event) = self.dilation_rx.try_recv() {
            pending.push(event);
        }
        for event in pending {
            match event {
                DilationEvent::Activated if !self.dilated => {
                    self.dilated = true;
                    self.timing_scale = self.dilation_config.timing_scale;
                    nav.set_speed_scale(self.entity, self.dilation_config.speed_scale);
                    debug!("boss slowed by time dilation");
                }
                DilationEvent::Deactivated if self.dilated => {
                    self.dilated = false;
                    self.timing_scale = 1.0;
                    nav.set_speed_scale(self.entity, 1.0);
                    debug!("boss restored from time dilation");
                }
                _ => {}
            }
        }
    }

    fn enter_phase(&mut self, phase: BossPhase, duration: f32) {
        self.phase = phase;
        self.phase_time = 0.0;
        self.phase_duration = duration * self.timing_scale;
    }

    fn begin_idle<P: Presentation>(&mut self, pres: &mut P) {
        if self.bindings.run.is_assigned() {
            pres.play_animation_state(self.entity, self.bindings.run, false);
        }
        self.enter_phase(BossPhase::Idle, 0.0);
    }

    fn begin_chase<P: Presentation>(&mut self, pres: &mut P) {
        debug!("boss chasing player");
        if self.bindings.run.is_assigned() {
            pres.play_animation_state(self.entity, self.bindings.run, true);
        }
        self.enter_phase(BossPhase::Chasing, 0.0);
    }

    fn begin_ability<N: Navigation, P: Presentation>(
        &mut self,
        color: AbilityColor,
        nav: &mut N,
        pres: &mut P,
        bus: &EventBus,
    ) {
        debug!("boss ability {:?} windup", color);
        nav.stop_navigation(self.entity);
        if self.bindings.run.is_assigned() {
            pres.play_animation_state(self.entity, self.bindings.run, false);
        }
        if self.bindings.state_for(color).is_assigned() {
            pres.play_animation_state(self.entity, self.bindings.state_for(color), true);
        }
        if self.bindings.sound_for(color).is_assigned() {
            pres.play_sound(self.bindings.sound_for(color));
        }
        bus.publish(GameEvent::BossAbilityStarted { color });

        let ability = self.ability(color);
        self.pending_strike = Some(PendingStrike {
            color,
            elapsed: 0.0,
            delay: ability.strike_delay * self.timing_scale,
        });
        self.enter_phase(
            BossPhase::Attacking(color, AttackStage::Windup),
            ability.windup,
        );
    }

    fn begin_recharge<P: Presentation>(&mut self, pres: &mut P, bus: &EventBus) {
        debug!("boss recharging");
        if self.bindings.charge.is_assigned() {
            pres.play_animation_state(self.entity, self.bindings.charge, true);
        }
        if self.bindings.recharge_sound.is_assigned() {
            pres.play_sound(self.bindings.recharge_sound);
        }
        bus.publish(GameEvent::BossRecharging);
        self.enter_phase(BossPhase::Recharging, self.config.recharge_time);
    }

    /// Counts a scheduled strike down and applies its hit test when due.
    fn tick_pending_strike<W: WorldQuery, P: Presentation>(
        &mut self,
        dt: f32,
        position: Option<Vec3>,
        player_pos: Option<Vec3>,
        world: &W,
        pres: &mut P,
        bus: &EventBus,
    ) -> Vec<BossStrike> {
        let mut strikes = Vec::new();
        let Some(strike) = &mut self.pending_strike else {
            return strikes;
        };
        strike.elapsed += dt;
        if strike.elapsed < strike.delay {
            return strikes;
        }
        let color = strike.color;
        self.pending_strike = None;

        let (Some(pos), Some(pp)) = (position, player_pos) else {
            debug!("boss {:?} strike found no target", color);
            return strikes;
        };
        let ability = self.ability(color);
        let in_reach = distance(pos, pp) <= ability.range;
        // The beam abilities also need a clear line; the burst does not.
        let clear = match color {
            AbilityColor::Red | AbilityColor::Purple => !world.raycast_obstruction(pos, pp),
            AbilityColor::Blue => true,
        };
        if in_reach && clear {
            debug!("boss ability {:?} hit for {}", color, ability.damage);
            if self.bindings.effect_for(color).is_assigned() {
                pres.spawn_effect(self.bindings.effect_for(color), pp);
            }
            bus.publish(GameEvent::BossAbilityHit {
                color,
                damage: ability.damage,
            });
            strikes.push(BossStrike {
                color,
                damage: ability.damage,
            });
        }
        strikes
    }
}

impl Damageable for Boss {
    fn take_damage(&mut self, amount: f32) -> bool {
        if self.phase == BossPhase::Dead {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        debug!("boss took {} damage, {} health left", amount, self.health);
        true
    }

    fn is_dead(&self) -> bool {
        self.phase == BossPhase::Dead
    }
}
