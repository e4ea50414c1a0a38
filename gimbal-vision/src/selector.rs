//! The Idle/Tracking target-selection state machine (SPEC_FULL.md §4.4).

use crate::grouping::ArmorGroup;
use gimbal_types::{DetectionResult, TrackId};

/// Default grace window (seconds) a tracked target is allowed to go undetected before the
/// selector falls back to re-acquisition.
pub const DEFAULT_MAX_TTL: f64 = 0.3;

/// Tracks which robot the pipeline is currently locked onto and how much longer it tolerates
/// missed detections before giving up and re-acquiring.
pub struct Selector {
    selected: Option<TrackId>,
    ttl: f64,
    max_ttl: f64,
    initial_yaw: f64,
}

impl Default for Selector {
    fn default() -> Self {
        Selector::new(DEFAULT_MAX_TTL)
    }
}

impl Selector {
    pub fn new(max_ttl: f64) -> Self {
        Selector {
            selected: None,
            ttl: 0.0,
            max_ttl,
            initial_yaw: 0.0,
        }
    }

    pub fn selected(&self) -> Option<TrackId> {
        self.selected
    }

    pub fn ttl(&self) -> f64 {
        self.ttl
    }

    /// Yaw of the first armor seen when this target was (re)acquired, kept for diagnostics and for
    /// callers that want to detect a just-happened re-acquisition (`initial_yaw` changes only on
    /// acquisition, never on a plain re-emit).
    pub fn initial_yaw(&self) -> f64 {
        self.initial_yaw
    }

    fn acquire(&mut self, groups: &[ArmorGroup]) -> &ArmorGroup {
        let best = groups
            .iter()
            .min_by(|a, b| a.mean_distance().total_cmp(&b.mean_distance()))
            .expect("acquire called with no groups");
        self.selected = Some(best.class_id);
        self.ttl = self.max_ttl;
        self.initial_yaw = best.armors[0].yaw_rad;
        best
    }

    /// Advance the selector by one detection cycle (`dt` is the frame time). Returns the armors of
    /// whichever robot is selected this cycle, or an empty slice if none is (either genuinely idle
    /// or coasting through the TTL grace window).
    pub fn update(&mut self, groups: &[ArmorGroup], dt: f64) -> Vec<DetectionResult> {
        if groups.is_empty() {
            if self.selected.is_some() {
                self.ttl -= dt;
                if self.ttl <= 0.0 {
                    self.selected = None;
                }
            }
            return Vec::new();
        }

        match self.selected {
            None => self.acquire(groups).armors.clone(),
            Some(id) => {
                if let Some(group) = groups.iter().find(|g| g.class_id == id) {
                    self.ttl = self.max_ttl;
                    group.armors.clone()
                } else if self.ttl - dt > 0.0 {
                    self.ttl -= dt;
                    Vec::new()
                } else {
                    self.acquire(groups).armors.clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimbal_types::{DetectionResult, TrackId};
    use nalgebra::Vector3;

    fn group(class_id: u32, dist: f64) -> ArmorGroup {
        ArmorGroup {
            class_id: TrackId(class_id),
            armors: vec![DetectionResult {
                class_id: TrackId(class_id),
                confidence: 1.0,
                tvec: Vector3::new(0.0, 0.0, dist),
                yaw_rad: 0.0,
            }],
        }
    }

    #[test]
    fn selector_acquisition_picks_nearest_group() {
        let mut sel = Selector::default();
        let groups = vec![group(3, 5.0), group(7, 3.0)];
        let armors = sel.update(&groups, 0.02);
        assert_eq!(sel.selected(), Some(TrackId(7)));
        assert_eq!(armors.len(), 1);
        assert_eq!(armors[0].class_id, TrackId(7));
    }

    #[test]
    fn selector_grace_window_then_clears() {
        let mut sel = Selector::new(0.3);
        sel.update(&[group(7, 3.0)], 0.02);
        assert_eq!(sel.selected(), Some(TrackId(7)));

        // Three empty frames within the grace window: id survives.
        for _ in 0..3 {
            let armors = sel.update(&[], 0.02);
            assert!(armors.is_empty());
        }
        assert_eq!(sel.selected(), Some(TrackId(7)));

        // Drain the rest of the TTL: id clears.
        for _ in 0..20 {
            sel.update(&[], 0.02);
        }
        assert_eq!(sel.selected(), None);
    }

    #[test]
    fn tracked_id_reappearing_resets_ttl() {
        let mut sel = Selector::new(0.1);
        sel.update(&[group(7, 3.0)], 0.02);
        sel.update(&[], 0.08); // ttl down to ~0.02, still tracked
        assert_eq!(sel.selected(), Some(TrackId(7)));
        sel.update(&[group(7, 2.0)], 0.02); // reappears, ttl resets
        assert_eq!(sel.ttl(), 0.1);
        // would have expired without the reset
        sel.update(&[], 0.09);
        assert_eq!(sel.selected(), Some(TrackId(7)));
    }

    #[test]
    fn tracked_id_absent_but_other_targets_present_triggers_reacquire_after_ttl() {
        let mut sel = Selector::new(0.04);
        sel.update(&[group(7, 3.0)], 0.01);
        // id 7 never reappears, but id 9 is visible the whole time.
        sel.update(&[group(9, 1.0)], 0.02);
        assert_eq!(sel.selected(), Some(TrackId(7)), "still within grace");
        sel.update(&[group(9, 1.0)], 0.02);
        assert_eq!(sel.selected(), Some(TrackId(9)), "re-acquired after ttl drained");
    }
}
