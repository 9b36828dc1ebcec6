//! Enemy perception: instantaneous visibility plus gradual attention.
//!
//! Visibility is re-evaluated on a fixed cadence rather than every frame,
//! matching how often a guard "glances" for the player. While the target
//! stays visible, attention accumulates in fixed increments; the instant
//! visibility is lost the whole accumulation resets to zero. Detection is a
//! one-way latch once attention fills.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use umbra_common::coords::{angle_between_deg, distance};
use umbra_common::EntityId;

use crate::world::WorldQuery;

/// Seconds between field-of-view evaluations.
pub const POLL_INTERVAL: f32 = 0.2;

/// Seconds between attention increments while the target is visible.
pub const ATTENTION_INTERVAL: f32 = 0.1;

/// Attention gained per increment.
pub const ATTENTION_INCREMENT: f32 = 0.1;

/// State changes reported by a perception tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerceptionEvent {
    /// The target became visible this evaluation.
    Spotted,
    /// The target was lost; attention has been reset to zero.
    Lost,
    /// Attention filled; the owner is now permanently alerted.
    FullyDetected,
}

/// Per-agent visibility and attention state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionTracker {
    /// Perception radius.
    sight_radius: f32,
    /// Full field-of-view cone angle in degrees.
    sight_angle: f32,
    /// Attention required for full detection.
    attention_time: f32,
    /// Accumulated time toward the next evaluation.
    poll_timer: f32,
    /// Accumulated visible time toward the next attention increment.
    attention_timer: f32,
    /// Attention increments earned so far.
    attention_ticks: u32,
    /// Increments required for full detection.
    required_ticks: u32,
    /// Whether the target passed the last evaluation.
    can_see_target: bool,
    /// One-way latch set when attention fills.
    fully_detected: bool,
    /// Perception is switched off entirely while time-dilated.
    suppressed: bool,
}

impl PerceptionTracker {
    /// Creates a tracker from its tuning values.
    #[must_use]
    pub fn new(sight_radius: f32, sight_angle: f32, attention_time: f32) -> Self {
        Self {
            sight_radius,
            sight_angle,
            attention_time,
            poll_timer: 0.0,
            attention_timer: 0.0,
            attention_ticks: 0,
            required_ticks: (attention_time / ATTENTION_INCREMENT).ceil() as u32,
            can_see_target: false,
            fully_detected: false,
            suppressed: false,
        }
    }

    /// Whether the target passed the last field-of-view evaluation.
    #[must_use]
    pub const fn can_see_target(&self) -> bool {
        self.can_see_target
    }

    /// Current attention level.
    #[must_use]
    pub fn attention_level(&self) -> f32 {
        (self.attention_ticks as f32 * ATTENTION_INCREMENT).min(self.attention_time)
    }

    /// Attention as a `[0, 1]` fill ratio for the overhead bar.
    #[must_use]
    pub fn attention_ratio(&self) -> f32 {
        (self.attention_level() / self.attention_time).clamp(0.0, 1.0)
    }

    /// Whether the owner has fully detected the target.
    #[must_use]
    pub const fn fully_detected(&self) -> bool {
        self.fully_detected
    }

    /// Switches perception off or back on. Suppression blinds the owner
    /// immediately: visibility drops and accumulated attention is wiped.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        if suppressed && !self.suppressed {
            self.lose_target();
        }
        self.suppressed = suppressed;
    }

    /// Clears visibility and accumulation, e.g. on owner death.
    pub fn reset(&mut self) {
        self.lose_target();
        self.poll_timer = 0.0;
    }

    /// Advances perception by `dt` seconds of simulated time, evaluating the
    /// field of view at the fixed cadence. `position`/`facing` are the
    /// owner's transform, `target` the entity being hunted.
    pub fn tick<W: WorldQuery>(
        &mut self,
        dt: f32,
        position: Vec3,
        facing: Vec3,
        target: EntityId,
        world: &W,
    ) -> Vec<PerceptionEvent> {
        let mut events = Vec::new();
        if self.suppressed {
            return events;
        }

        self.poll_timer += dt;
        while self.poll_timer >= POLL_INTERVAL {
            self.poll_timer -= POLL_INTERVAL;

            let visible = self.evaluate(position, facing, target, world);
            if visible && !self.can_see_target {
                self.can_see_target = true;
                self.attention_timer = 0.0;
                events.push(PerceptionEvent::Spotted);
            } else if !visible && self.can_see_target {
                self.lose_target();
                events.push(PerceptionEvent::Lost);
            }

            if self.can_see_target && self.attention_ticks < self.required_ticks {
                self.attention_timer += POLL_INTERVAL;
                while self.attention_timer >= ATTENTION_INTERVAL
                    && self.attention_ticks < self.required_ticks
                {
                    self.attention_timer -= ATTENTION_INTERVAL;
                    self.attention_ticks += 1;
                    if self.attention_ticks >= self.required_ticks && !self.fully_detected {
                        self.fully_detected = true;
                        debug!("target fully detected");
                        events.push(PerceptionEvent::FullyDetected);
                    }
                }
            }
        }

        events
    }

    /// One field-of-view evaluation: nearest candidate in radius, inside the
    /// half-angle cone, with an unobstructed line to it.
    fn evaluate<W: WorldQuery>(
        &self,
        position: Vec3,
        facing: Vec3,
        target: EntityId,
        world: &W,
    ) -> bool {
        let candidates = world.visible_targets(position, self.sight_radius);
        let nearest = candidates
            .iter()
            .filter(|handle| handle.entity == target)
            .min_by(|a, b| {
                distance(position, a.position).total_cmp(&distance(position, b.position))
            });
        let Some(handle) = nearest else {
            return false;
        };

        if angle_between_deg(facing, position, handle.position) >= self.sight_angle / 2.0 {
            return false;
        }

        !world.raycast_obstruction(position, handle.position)
    }

    /// Drops visibility and wipes accumulation. No partial credit is kept;
    /// the detection latch survives.
    fn lose_target(&mut self) {
        self.can_see_target = false;
        self.attention_ticks = 0;
        self.attention_timer = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MockWorld;

    const RADIUS: f32 = 10.0;
    const ANGLE: f32 = 120.0;
    const ATTENTION_TIME: f32 = 1.0;

    fn setup() -> (PerceptionTracker, MockWorld, EntityId) {
        let tracker = PerceptionTracker::new(RADIUS, ANGLE, ATTENTION_TIME);
        let mut world = MockWorld::new();
        let target = EntityId::from_raw(99);
        world.place(target, Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        (tracker, world, target)
    }

    #[test]
    fn test_spots_target_in_cone() {
        let (mut tracker, world, target) = setup();
        let events = tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(tracker.can_see_target());
        assert!(events.contains(&PerceptionEvent::Spotted));
    }

    #[test]
    fn test_rejects_target_behind() {
        let (mut tracker, mut world, target) = setup();
        world.place(target, Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(!tracker.can_see_target());
    }

    #[test]
    fn test_rejects_target_out_of_radius() {
        let (mut tracker, mut world, target) = setup();
        world.place(target, Vec3::new(0.0, 0.0, 50.0), Vec3::Z);
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(!tracker.can_see_target());
    }

    #[test]
    fn test_rejects_obstructed_target() {
        let (mut tracker, mut world, target) = setup();
        world.set_obstructed(true);
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(!tracker.can_see_target());
    }

    #[test]
    fn test_no_evaluation_between_polls() {
        let (mut tracker, world, target) = setup();
        // Half the poll interval: no evaluation yet.
        tracker.tick(POLL_INTERVAL / 2.0, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(!tracker.can_see_target());
    }

    #[test]
    fn test_attention_accumulates_while_visible() {
        let (mut tracker, world, target) = setup();
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        let first = tracker.attention_level();

        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(tracker.attention_level() > first);
    }

    #[test]
    fn test_attention_monotone_while_visible() {
        let (mut tracker, world, target) = setup();
        let mut last = 0.0;
        for _ in 0..20 {
            tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
            assert!(tracker.attention_level() >= last);
            last = tracker.attention_level();
        }
    }

    #[test]
    fn test_attention_resets_to_zero_on_loss() {
        let (mut tracker, mut world, target) = setup();
        tracker.tick(POLL_INTERVAL * 2.0, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(tracker.attention_level() > 0.0);

        // Target steps out of the cone.
        world.place(target, Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let events = tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(events.contains(&PerceptionEvent::Lost));
        assert_eq!(tracker.attention_level(), 0.0);
        assert!(!tracker.can_see_target());
    }

    #[test]
    fn test_full_detection_latches() {
        let (mut tracker, mut world, target) = setup();
        // Stare long enough to fill the bar.
        let mut detected = 0;
        for _ in 0..10 {
            let events = tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
            detected += events
                .iter()
                .filter(|e| **e == PerceptionEvent::FullyDetected)
                .count();
        }
        assert!(tracker.fully_detected());
        assert_eq!(detected, 1, "latch fires exactly once");

        // Losing the target resets attention but never the latch.
        world.place(target, Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert_eq!(tracker.attention_level(), 0.0);
        assert!(tracker.fully_detected());
    }

    #[test]
    fn test_detection_time_matches_attention_time() {
        let (mut tracker, world, target) = setup();
        // ATTENTION_TIME of visible time, minus one poll of slack for the
        // cadence, must fill the bar; just short of it must not.
        let polls_needed = (ATTENTION_TIME / POLL_INTERVAL).ceil() as usize;
        for _ in 0..polls_needed - 1 {
            tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        }
        assert!(!tracker.fully_detected());
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(tracker.fully_detected());
    }

    #[test]
    fn test_suppression_blinds_and_wipes() {
        let (mut tracker, world, target) = setup();
        tracker.tick(POLL_INTERVAL * 2.0, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(tracker.can_see_target());

        tracker.set_suppressed(true);
        assert!(!tracker.can_see_target());
        assert_eq!(tracker.attention_level(), 0.0);

        // No accumulation while suppressed.
        let events = tracker.tick(POLL_INTERVAL * 4.0, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(events.is_empty());
        assert_eq!(tracker.attention_level(), 0.0);

        // Sight returns after suppression ends.
        tracker.set_suppressed(false);
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(tracker.can_see_target());
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let (mut tracker, mut world, target) = setup();
        // A decoy closer than the real target must not hide it; only the
        // hunted entity is considered, nearest instance first.
        let decoy = EntityId::from_raw(5);
        world.place(decoy, Vec3::new(0.0, 0.0, 1.0), Vec3::Z);
        tracker.tick(POLL_INTERVAL, Vec3::ZERO, Vec3::Z, target, &world);
        assert!(tracker.can_see_target());
    }
}
