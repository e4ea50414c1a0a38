//! Grouping per-armor detections into per-robot groups by `class_id` (SPEC_FULL.md §4.4 step 4).

use gimbal_types::{DetectionResult, TrackId};
use std::collections::BTreeMap;

/// One robot's visible armor(s) this cycle. Always 1 or 2 armors; `form_robot` discards any class
/// with more than two simultaneous detections (ambiguous, cannot correspond to a real robot).
#[derive(Debug, Clone)]
pub struct ArmorGroup {
    pub class_id: TrackId,
    pub armors: Vec<DetectionResult>,
}

impl ArmorGroup {
    /// Mean distance of this group's armors from the camera, used by the selector to rank groups.
    pub fn mean_distance(&self) -> f64 {
        let sum: f64 = self.armors.iter().map(|a| a.tvec.norm()).sum();
        sum / self.armors.len() as f64
    }
}

/// Group detections by `class_id`; groups with more than two armors are dropped (SPEC_FULL.md
/// §4.4). Order of the returned groups is by ascending `class_id` for determinism.
pub fn form_robot(detections: &[DetectionResult]) -> Vec<ArmorGroup> {
    let mut by_class: BTreeMap<u32, Vec<DetectionResult>> = BTreeMap::new();
    for det in detections {
        by_class.entry(det.class_id.0).or_default().push(*det);
    }
    by_class
        .into_iter()
        .filter(|(_, armors)| !armors.is_empty() && armors.len() <= 2)
        .map(|(class_id, armors)| ArmorGroup {
            class_id: TrackId(class_id),
            armors,
        })
        .collect()
}
