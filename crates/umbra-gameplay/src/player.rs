//! Player state: health pool, block window, and the ability handler.
//!
//! Damage is ignored outright while the block window is up; otherwise both
//! damage and healing clamp to the pool. The dash and ultimate abilities sit
//! behind cooldowns whose fill ratios drive the HUD indicators, and the
//! ultimate forwards into the time-dilation broadcaster.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlayerConfig;
use crate::dilation::DilationHandle;
use crate::timer::Cooldown;
use crate::world::{AbilitySlot, Damageable, Presentation};
use umbra_common::EntityId;

/// Player health, block and ability state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Entity the player drives.
    entity: EntityId,
    /// Remaining health.
    health: f32,
    /// Health ceiling.
    max_health: f32,
    /// Seconds left on the active block window, if any.
    block_remaining: Option<f32>,
    /// Dash cooldown.
    dash: Cooldown,
    /// Ultimate cooldown.
    ultimate: Cooldown,
    /// Tuning.
    config: PlayerConfig,
    /// Set once when health reaches zero.
    dead: bool,
}

impl PlayerState {
    /// Creates a player at full health.
    #[must_use]
    pub fn new(entity: EntityId, config: PlayerConfig) -> Self {
        Self {
            entity,
            health: config.max_health,
            max_health: config.max_health,
            block_remaining: None,
            dash: Cooldown::new(),
            ultimate: Cooldown::new(),
            config,
            dead: false,
        }
    }

    /// Entity the player drives.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Remaining health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Health ceiling.
    #[must_use]
    pub const fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Whether the block window is currently up.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.block_remaining.is_some()
    }

    /// Dash cooldown fill in `[0, 1]`.
    #[must_use]
    pub fn dash_progress(&self) -> f32 {
        self.dash.progress()
    }

    /// Ultimate cooldown fill in `[0, 1]`.
    #[must_use]
    pub fn ultimate_progress(&self) -> f32 {
        self.ultimate.progress()
    }

    /// Heals, clamped to the pool.
    pub fn heal(&mut self, amount: f32) {
        if self.dead {
            return;
        }
        self.health = (self.health + amount).clamp(0.0, self.max_health);
    }

    /// Raises the block for the configured window. A block input while the
    /// window is already up restarts it.
    pub fn raise_block(&mut self) {
        if self.dead {
            return;
        }
        self.block_remaining = Some(self.config.block_duration);
    }

    /// Attempts the dash. Returns false while its cooldown runs.
    pub fn try_dash(&mut self) -> bool {
        if self.dead {
            return false;
        }
        if !self.dash.is_ready() {
            return false;
        }
        debug!("dash performed");
        self.dash.start(self.config.dash_cooldown);
        true
    }

    /// Attempts the ultimate, activating time dilation on success. Returns
    /// false while its cooldown runs.
    pub fn try_ultimate(&mut self, dilation: &DilationHandle) -> bool {
        if self.dead {
            return false;
        }
        if !self.ultimate.is_ready() {
            return false;
        }
        info!("ultimate performed");
        self.ultimate.start(self.config.ultimate_cooldown);
        // Re-activation while already active stays a no-op inside the
        // broadcaster.
        dilation.activate();
        true
    }

    /// Advances cooldowns and the block window, pushing the HUD fills.
    pub fn tick<P: Presentation>(&mut self, dt: f32, pres: &mut P) {
        self.dash.tick(dt);
        self.ultimate.tick(dt);
        if let Some(remaining) = &mut self.block_remaining {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.block_remaining = None;
            }
        }
        pres.update_cooldown_display(AbilitySlot::Dash, self.dash.progress());
        pres.update_cooldown_display(AbilitySlot::Ultimate, self.ultimate.progress());
    }
}

impl Damageable for PlayerState {
    fn take_damage(&mut self, amount: f32) -> bool {
        if self.dead {
            return false;
        }
        if self.block_remaining.is_some() {
            debug!("block absorbed {} damage", amount);
            return false;
        }
        self.health = (self.health - amount).clamp(0.0, self.max_health);
        if self.health <= 0.0 {
            self.dead = true;
            info!("player died");
        }
        true
    }

    fn is_dead(&self) -> bool {
        self.dead
    }
}
