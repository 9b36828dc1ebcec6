//! Player melee: the timed combo chain and the stealth-kill branch.
//!
//! Each attack input either starts the fixed backstab finisher (when some
//! nearby enemy is exposing its back) or advances the ordered combo chain.
//! The chain advances only when the per-swing cooldown and the post-combo
//! rest have both elapsed; two inputs landing closer together than the
//! minimum spacing stay on the same step. An abandoned chain snaps back to
//! the first step after the reset timeout.

use serde::{Deserialize, Serialize};
use tracing::debug;

use umbra_common::EntityId;

use crate::config::{ComboConfig, ComboStepConfig};
use crate::timer::Cooldown;

/// What an attack input resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackOutcome {
    /// A combo swing fired.
    Swing {
        /// Step index that fired.
        index: usize,
        /// The step's animation and damage.
        step: ComboStepConfig,
    },
    /// The stealth finisher started on an exposed enemy.
    FinisherStarted {
        /// Enemy being finished.
        target: EntityId,
    },
    /// Input landed inside the minimum spacing; still on the same step.
    SameStep,
    /// The per-swing cooldown is still running.
    OnCooldown {
        /// Seconds left on the swing cooldown.
        remaining: f32,
    },
    /// The post-combo rest has not elapsed yet.
    Resting {
        /// Seconds left before a new chain may start.
        remaining: f32,
    },
    /// A finisher is playing; the input was ignored.
    FinisherActive,
}

/// Timed events produced while the resolver advances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComboEvent {
    /// The finisher reached its kill beat; the target dies now.
    FinisherKill {
        /// Enemy being finished.
        target: EntityId,
    },
    /// The finisher animation completed; the blade goes away.
    FinisherEnded,
    /// The chain idled out mid-combo and snapped back to step 0.
    ChainReset,
}

/// A finisher in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ActiveFinisher {
    /// Enemy being finished.
    target: EntityId,
    /// Time since the finisher started.
    elapsed: f32,
    /// Whether the kill beat already fired.
    kill_done: bool,
}

/// Input-driven attack-chain state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboResolver {
    config: ComboConfig,
    /// Next step to fire.
    combo_index: usize,
    /// Internal clock advanced by ticks.
    clock: f64,
    /// Clock value of the last accepted swing.
    last_input_time: f64,
    /// Clock value when the last full chain completed.
    last_combo_end_time: f64,
    /// Per-swing cooldown.
    swing_cooldown: Cooldown,
    /// Finisher in flight, if any.
    finisher: Option<ActiveFinisher>,
}

impl ComboResolver {
    /// Creates a resolver from validated tuning.
    #[must_use]
    pub fn new(config: ComboConfig) -> Self {
        Self {
            config,
            combo_index: 0,
            clock: 0.0,
            last_input_time: f64::NEG_INFINITY,
            last_combo_end_time: f64::NEG_INFINITY,
            swing_cooldown: Cooldown::new(),
            finisher: None,
        }
    }

    /// Next step the chain will fire.
    #[must_use]
    pub const fn combo_index(&self) -> usize {
        self.combo_index
    }

    /// Whether a finisher is currently playing.
    #[must_use]
    pub const fn is_finisher_active(&self) -> bool {
        self.finisher.is_some()
    }

    /// Resolves one attack input. `exposed_targets` are nearby enemies
    /// currently exposing their backs, nearest first.
    pub fn on_attack_input(&mut self, exposed_targets: &[EntityId]) -> AttackOutcome {
        if self.finisher.is_some() {
            return AttackOutcome::FinisherActive;
        }

        if let Some(&target) = exposed_targets.first() {
            debug!("stealth finisher started on {:?}", target);
            self.finisher = Some(ActiveFinisher {
                target,
                elapsed: 0.0,
                kill_done: false,
            });
            return AttackOutcome::FinisherStarted { target };
        }

        if self.clock - self.last_input_time < f64::from(self.config.min_input_spacing) {
            return AttackOutcome::SameStep;
        }

        if !self.swing_cooldown.is_ready() {
            return AttackOutcome::OnCooldown {
                remaining: self.swing_cooldown.remaining(),
            };
        }

        let since_combo_end = self.clock - self.last_combo_end_time;
        if since_combo_end < f64::from(self.config.rest_after_combo) {
            return AttackOutcome::Resting {
                remaining: (f64::from(self.config.rest_after_combo) - since_combo_end) as f32,
            };
        }

        let index = self.combo_index;
        let step = self.config.steps[index];
        self.combo_index = (index + 1) % self.config.steps.len();
        if self.combo_index == 0 {
            self.last_combo_end_time = self.clock;
        }
        self.last_input_time = self.clock;
        self.swing_cooldown.start(self.config.swing_cooldown);

        AttackOutcome::Swing { index, step }
    }

    /// Advances the resolver's clock, the swing cooldown, any finisher in
    /// flight, and the idle reset.
    pub fn tick(&mut self, dt: f32) -> Vec<ComboEvent> {
        let mut events = Vec::new();
        self.clock += f64::from(dt);
        self.swing_cooldown.tick(dt);

        if let Some(finisher) = &mut self.finisher {
            finisher.elapsed += dt;
            if !finisher.kill_done && finisher.elapsed >= self.config.finisher_kill_beat {
                finisher.kill_done = true;
                events.push(ComboEvent::FinisherKill {
                    target: finisher.target,
                });
            }
            if finisher.elapsed >= self.config.finisher_duration {
                self.finisher = None;
                events.push(ComboEvent::FinisherEnded);
            }
        } else if self.combo_index != 0
            && self.clock - self.last_input_time > f64::from(self.config.reset_timeout)
        {
            self.combo_index = 0;
            events.push(ComboEvent::ChainReset);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver() -> ComboResolver {
        ComboResolver::new(ComboConfig::default())
    }

    fn swing_index(outcome: AttackOutcome) -> usize {
        match outcome {
            AttackOutcome::Swing { index, .. } => index,
            other => panic!("expected swing, got {other:?}"),
        }
    }

    #[test]
    fn test_chain_cycles_with_spaced_inputs() {
        let mut resolver = resolver();
        let mut indices = Vec::new();
        for _ in 0..6 {
            indices.push(swing_index(resolver.on_attack_input(&[])));
            resolver.tick(0.2);
        }
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_close_inputs_advance_once() {
        let mut resolver = resolver();
        assert_eq!(swing_index(resolver.on_attack_input(&[])), 0);

        resolver.tick(0.1);
        assert_eq!(resolver.on_attack_input(&[]), AttackOutcome::SameStep);
        assert_eq!(resolver.combo_index(), 1, "no skip-ahead");
    }

    #[test]
    fn test_idle_mid_chain_resets_to_zero() {
        let mut resolver = resolver();
        resolver.on_attack_input(&[]);
        assert_eq!(resolver.combo_index(), 1);

        let events = resolver.tick(1.5);
        assert!(events.contains(&ComboEvent::ChainReset));
        assert_eq!(resolver.combo_index(), 0);
    }

    #[test]
    fn test_swing_cooldown_gates_inputs() {
        let config = ComboConfig {
            swing_cooldown: 1.0,
            min_input_spacing: 0.2,
            ..ComboConfig::default()
        };
        let mut resolver = ComboResolver::new(config);

        resolver.on_attack_input(&[]);
        resolver.tick(0.5);
        assert!(matches!(
            resolver.on_attack_input(&[]),
            AttackOutcome::OnCooldown { .. }
        ));
    }

    #[test]
    fn test_rest_after_full_chain() {
        let config = ComboConfig {
            rest_after_combo: 1.0,
            ..ComboConfig::default()
        };
        let mut resolver = ComboResolver::new(config);

        for _ in 0..3 {
            resolver.on_attack_input(&[]);
            resolver.tick(0.3);
        }
        // Chain completed at the third swing; the next input is too soon.
        assert!(matches!(
            resolver.on_attack_input(&[]),
            AttackOutcome::Resting { .. }
        ));

        resolver.tick(1.0);
        assert_eq!(swing_index(resolver.on_attack_input(&[])), 0);
    }

    #[test]
    fn test_finisher_bypasses_cooldowns() {
        let mut resolver = resolver();
        let target = EntityId::from_raw(5);

        // Swing, then immediately (cooldown still running) backstab.
        resolver.on_attack_input(&[]);
        let outcome = resolver.on_attack_input(&[target]);
        assert_eq!(outcome, AttackOutcome::FinisherStarted { target });
        assert!(resolver.is_finisher_active());
    }

    #[test]
    fn test_finisher_kill_beat_fires_once_then_ends() {
        let mut resolver = resolver();
        let target = EntityId::from_raw(5);
        resolver.on_attack_input(&[target]);

        let events = resolver.tick(0.5);
        assert_eq!(events, vec![ComboEvent::FinisherKill { target }]);

        // The kill beat never repeats.
        let events = resolver.tick(0.2);
        assert!(events.is_empty());

        let events = resolver.tick(1.0);
        assert_eq!(events, vec![ComboEvent::FinisherEnded]);
        assert!(!resolver.is_finisher_active());
    }

    #[test]
    fn test_input_ignored_during_finisher() {
        let mut resolver = resolver();
        resolver.on_attack_input(&[EntityId::from_raw(5)]);

        assert_eq!(resolver.on_attack_input(&[]), AttackOutcome::FinisherActive);
        assert_eq!(
            resolver.on_attack_input(&[EntityId::from_raw(6)]),
            AttackOutcome::FinisherActive
        );
    }

    #[test]
    fn test_combo_resumes_after_finisher() {
        let mut resolver = resolver();
        resolver.on_attack_input(&[EntityId::from_raw(5)]);
        resolver.tick(2.0);
        assert!(!resolver.is_finisher_active());

        assert_eq!(swing_index(resolver.on_attack_input(&[])), 0);
    }

    proptest! {
        #[test]
        fn prop_combo_index_stays_in_bounds(
            spacings in proptest::collection::vec(0.0f32..1.5, 1..60)
        ) {
            let mut resolver = resolver();
            let len = ComboConfig::default().steps.len();
            for dt in spacings {
                resolver.tick(dt);
                let _ = resolver.on_attack_input(&[]);
                prop_assert!(resolver.combo_index() < len);
            }
        }

        #[test]
        fn prop_spaced_inputs_always_swing(
            extra in proptest::collection::vec(0.0f32..0.5, 1..40)
        ) {
            let mut resolver = resolver();
            let mut expected = 0usize;
            for pad in extra {
                // Every input arrives at least the minimum spacing apart.
                resolver.tick(0.2 + pad);
                let index = match resolver.on_attack_input(&[]) {
                    AttackOutcome::Swing { index, .. } => index,
                    other => return Err(TestCaseError::fail(format!("{other:?}"))),
                };
                prop_assert_eq!(index, expected);
                expected = (expected + 1) % 3;
            }
        }
    }
}
