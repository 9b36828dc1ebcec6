//! Tuning tables for the gameplay systems.
//!
//! All timing constants live here so designers can edit them as RON text.
//! Validation is strict: a negative or non-finite duration is a
//! configuration bug and fails loading outright rather than being clamped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use umbra_common::AssetRef;

/// Error types for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration or range field failed validation.
    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f32,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The combo table has no steps.
    #[error("combo step list is empty")]
    EmptyCombo,
    /// RON parse failure.
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    /// JSON parse failure.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

fn non_negative(field: &'static str, value: f32) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must be finite",
        });
    }
    if value < 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must not be negative",
        });
    }
    Ok(())
}

fn positive(field: &'static str, value: f32) -> ConfigResult<()> {
    non_negative(field, value)?;
    if value == 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must be greater than zero",
        });
    }
    Ok(())
}

// ============================================================================
// Agent tuning
// ============================================================================

/// Tuning for regular enemy agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Starting health.
    pub health: f32,
    /// Perception radius.
    pub sight_radius: f32,
    /// Full field-of-view cone angle in degrees.
    pub sight_angle: f32,
    /// Seconds of continuous visibility to fully detect the player.
    pub attention_time: f32,
    /// Distance at which the agent switches to attacking.
    pub attack_range: f32,
    /// Seconds between attacks.
    pub time_between_attacks: f32,
    /// Damage one attack deals to the player.
    pub attack_damage: f32,
    /// Radius around spawn for wander points.
    pub walk_point_range: f32,
    /// Seconds of immunity after an accepted hit.
    pub damage_immunity: f32,
    /// Distance behind the agent where its back is exposed.
    pub back_exposure_range: f32,
    /// Seconds from a frontal death until removal.
    pub frontal_death_delay: f32,
    /// Seconds from a backstab death until removal.
    pub backstab_death_delay: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            health: 30.0,
            sight_radius: 12.0,
            sight_angle: 120.0,
            attention_time: 5.0,
            attack_range: 8.0,
            time_between_attacks: 2.0,
            attack_damage: 10.0,
            walk_point_range: 10.0,
            damage_immunity: 0.5,
            back_exposure_range: 1.5,
            frontal_death_delay: 4.0,
            backstab_death_delay: 2.0,
        }
    }
}

impl AgentConfig {
    /// Validates every timing and range field.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("agent.health", self.health)?;
        non_negative("agent.sight_radius", self.sight_radius)?;
        non_negative("agent.sight_angle", self.sight_angle)?;
        positive("agent.attention_time", self.attention_time)?;
        non_negative("agent.attack_range", self.attack_range)?;
        non_negative("agent.time_between_attacks", self.time_between_attacks)?;
        non_negative("agent.attack_damage", self.attack_damage)?;
        non_negative("agent.walk_point_range", self.walk_point_range)?;
        non_negative("agent.damage_immunity", self.damage_immunity)?;
        non_negative("agent.back_exposure_range", self.back_exposure_range)?;
        non_negative("agent.frontal_death_delay", self.frontal_death_delay)?;
        non_negative("agent.backstab_death_delay", self.backstab_death_delay)?;
        Ok(())
    }
}

// ============================================================================
// Boss tuning
// ============================================================================

/// Tuning for one boss sub-ability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BossAbilityConfig {
    /// Reach of the ability.
    pub range: f32,
    /// Damage on hit.
    pub damage: f32,
    /// Windup (animation) duration before the next step.
    pub windup: f32,
    /// Cooldown after the windup before the next range check.
    pub cooldown: f32,
    /// Delay from windup start until the damage lands.
    pub strike_delay: f32,
}

impl BossAbilityConfig {
    fn validate(&self, field: &'static str) -> ConfigResult<()> {
        // Field names are per-ability but the checks are identical.
        non_negative(field, self.range)?;
        non_negative(field, self.damage)?;
        non_negative(field, self.windup)?;
        non_negative(field, self.cooldown)?;
        non_negative(field, self.strike_delay)?;
        Ok(())
    }
}

/// Tuning for the boss encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossConfig {
    /// Maximum (and starting) health.
    pub max_health: f32,
    /// Distance at which the boss notices the player.
    pub sight_range: f32,
    /// Distance at which the attack sequence starts.
    pub attack_range: f32,
    /// Duration of the recharge state between sequences.
    pub recharge_time: f32,
    /// Seconds from death until the encounter unloads.
    pub death_delay: f32,
    /// The forward beam ability.
    pub red: BossAbilityConfig,
    /// The radial burst ability.
    pub blue: BossAbilityConfig,
    /// The long-reach beam ability.
    pub purple: BossAbilityConfig,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            sight_range: 25.0,
            attack_range: 12.0,
            recharge_time: 5.0,
            death_delay: 2.0,
            red: BossAbilityConfig {
                range: 10.0,
                damage: 10.0,
                windup: 1.5,
                cooldown: 2.0,
                strike_delay: 0.5,
            },
            blue: BossAbilityConfig {
                range: 2.0,
                damage: 15.0,
                windup: 1.0,
                cooldown: 1.0,
                strike_delay: 0.5,
            },
            purple: BossAbilityConfig {
                range: 20.0,
                damage: 20.0,
                windup: 1.0,
                cooldown: 1.0,
                strike_delay: 0.5,
            },
        }
    }
}

impl BossConfig {
    /// Validates every timing and range field.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("boss.max_health", self.max_health)?;
        non_negative("boss.sight_range", self.sight_range)?;
        non_negative("boss.attack_range", self.attack_range)?;
        non_negative("boss.recharge_time", self.recharge_time)?;
        non_negative("boss.death_delay", self.death_delay)?;
        self.red.validate("boss.red")?;
        self.blue.validate("boss.blue")?;
        self.purple.validate("boss.purple")?;
        Ok(())
    }
}

// ============================================================================
// Combo tuning
// ============================================================================

/// One step of the player's melee chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComboStepConfig {
    /// Animation the presentation layer plays for this swing.
    pub animation: AssetRef,
    /// Damage this swing deals.
    pub damage: f32,
}

/// Tuning for the player's combo resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboConfig {
    /// Ordered attack steps; the index wraps past the end.
    pub steps: Vec<ComboStepConfig>,
    /// Per-swing cooldown.
    pub swing_cooldown: f32,
    /// Inputs closer together than this stay on the same step.
    pub min_input_spacing: f32,
    /// Idle time required after a full chain before the next one starts.
    pub rest_after_combo: f32,
    /// With no input for this long mid-chain, the chain resets to step 0.
    pub reset_timeout: f32,
    /// Total length of the stealth finisher.
    pub finisher_duration: f32,
    /// Moment within the finisher when the kill lands.
    pub finisher_kill_beat: f32,
    /// Animation the presentation layer plays for the finisher.
    pub finisher_animation: AssetRef,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                ComboStepConfig {
                    animation: AssetRef::new(101),
                    damage: 8.0,
                },
                ComboStepConfig {
                    animation: AssetRef::new(102),
                    damage: 8.0,
                },
                ComboStepConfig {
                    animation: AssetRef::new(103),
                    damage: 14.0,
                },
            ],
            swing_cooldown: 0.2,
            min_input_spacing: 0.2,
            rest_after_combo: 0.2,
            reset_timeout: 1.0,
            finisher_duration: 1.2,
            finisher_kill_beat: 0.5,
            finisher_animation: AssetRef::new(110),
        }
    }
}

impl ComboConfig {
    /// Validates timing fields and the step table.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.steps.is_empty() {
            return Err(ConfigError::EmptyCombo);
        }
        for step in &self.steps {
            non_negative("combo.steps.damage", step.damage)?;
        }
        non_negative("combo.swing_cooldown", self.swing_cooldown)?;
        non_negative("combo.min_input_spacing", self.min_input_spacing)?;
        non_negative("combo.rest_after_combo", self.rest_after_combo)?;
        non_negative("combo.reset_timeout", self.reset_timeout)?;
        positive("combo.finisher_duration", self.finisher_duration)?;
        non_negative("combo.finisher_kill_beat", self.finisher_kill_beat)?;
        if self.finisher_kill_beat > self.finisher_duration {
            return Err(ConfigError::InvalidValue {
                field: "combo.finisher_kill_beat",
                value: self.finisher_kill_beat,
                reason: "must land within the finisher",
            });
        }
        Ok(())
    }
}

// ============================================================================
// Player tuning
// ============================================================================

/// Tuning for the player's health and abilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Maximum (and starting) health.
    pub max_health: f32,
    /// Dash cooldown.
    pub dash_cooldown: f32,
    /// Ultimate cooldown.
    pub ultimate_cooldown: f32,
    /// Duration of one block window.
    pub block_duration: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            dash_cooldown: 5.0,
            ultimate_cooldown: 10.0,
            block_duration: 1.0,
        }
    }
}

impl PlayerConfig {
    /// Validates every timing field.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("player.max_health", self.max_health)?;
        non_negative("player.dash_cooldown", self.dash_cooldown)?;
        non_negative("player.ultimate_cooldown", self.ultimate_cooldown)?;
        non_negative("player.block_duration", self.block_duration)?;
        Ok(())
    }
}

// ============================================================================
// Time-dilation tuning
// ============================================================================

/// Tuning for the time-dilation ultimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DilationConfig {
    /// How long one activation lasts.
    pub duration: f32,
    /// Multiplier applied to enemy timing constants while active.
    pub timing_scale: f32,
    /// Multiplier applied to enemy movement speed while active.
    pub speed_scale: f32,
}

impl Default for DilationConfig {
    fn default() -> Self {
        Self {
            duration: 6.0,
            timing_scale: 2.0,
            speed_scale: 0.5,
        }
    }
}

impl DilationConfig {
    /// Validates the duration and scale fields.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("dilation.duration", self.duration)?;
        positive("dilation.timing_scale", self.timing_scale)?;
        positive("dilation.speed_scale", self.speed_scale)?;
        Ok(())
    }
}

// ============================================================================
// Top-level config
// ============================================================================

/// Complete gameplay tuning table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameConfig {
    /// Regular enemy tuning.
    pub agent: AgentConfig,
    /// Boss encounter tuning.
    pub boss: BossConfig,
    /// Player combo tuning.
    pub combo: ComboConfig,
    /// Player health and ability tuning.
    pub player: PlayerConfig,
    /// Time-dilation tuning.
    pub dilation: DilationConfig,
}

impl GameConfig {
    /// Validates every table; fails fast on the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        self.agent.validate()?;
        self.boss.validate()?;
        self.combo.validate()?;
        self.player.validate()?;
        self.dilation.validate()?;
        Ok(())
    }

    /// Parses and validates a RON document.
    pub fn from_ron_str(text: &str) -> ConfigResult<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
