//! One-armor and two-armor robot-pose reconstruction (SPEC_FULL.md §4.4).

use std::f64::consts::PI;

use gimbal_geom::{sector, wrap_pi};
use gimbal_types::{DetectionResult, PfState, RobotState, Timestamp};
use nalgebra::Vector3;

/// Candidate robot yaws consistent with a single visible armor: the previous yaw itself, or that
/// yaw offset by a quarter or half turn (the robot could have rotated onto any of its four armor
/// mounts since the last observation).
fn choose_yaw(prev_yaw: f64, det_yaw: f64) -> f64 {
    let candidates = [prev_yaw, prev_yaw + PI / 2.0, prev_yaw - PI / 2.0, prev_yaw + PI];
    let best = candidates
        .into_iter()
        .min_by(|a, b| {
            wrap_pi(*a - det_yaw)
                .abs()
                .total_cmp(&wrap_pi(*b - det_yaw).abs())
        })
        .unwrap();
    wrap_pi(best)
}

/// Reconstruct a robot pose from a single visible armor, given the previous tracked state (if
/// any). `reset` marks a selector (re)acquisition: the resulting state carries `PfState::Reset` so
/// the particle filter reinitialises from it instead of folding it in as an ordinary measurement.
pub fn from_one_armor(
    prev: Option<&RobotState>,
    det: &DetectionResult,
    timestamp: Timestamp,
    default_radius: f64,
    reset: bool,
) -> RobotState {
    let (r1, r2, chosen_yaw) = match prev {
        None => (default_radius, default_radius, wrap_pi(det.yaw_rad)),
        Some(p) => (p.r1(), p.r2(), choose_yaw(p.yaw(), det.yaw_rad)),
    };

    let s = sector(chosen_yaw);
    let r = if s % 2 == 1 { r2 } else { r1 };

    let position = Vector3::new(
        det.tvec.x - r * chosen_yaw.sin(),
        det.tvec.y,
        det.tvec.z + r * chosen_yaw.cos(),
    );

    let mut state = RobotState::zeroed(det.class_id, timestamp, default_radius);
    state.set_position(position);
    state.set_yaw(chosen_yaw);
    state.set_r1(r1);
    state.set_r2(r2);
    state.pf_state = if reset || prev.is_none() {
        PfState::Reset
    } else {
        PfState::Measurement
    };
    state
}

/// Reconstruct a robot pose from two simultaneously visible armors (SPEC_FULL.md §4.4). The two
/// armor face directions are assumed perpendicular in the horizontal plane; their own radii and a
/// shared centre are solved from that constraint. The result is invariant to which detection is
/// passed as `a` and which as `b`: the armor landing in an even yaw sector always contributes `r1`
/// and the robot's reported `yaw`, matching `from_one_armor`'s even/odd sector-to-ring convention.
pub fn from_two_armors(
    a: &DetectionResult,
    b: &DetectionResult,
    timestamp: Timestamp,
    reset: bool,
) -> RobotState {
    let face_a = a.yaw_rad;
    let face_b = b.yaw_rad;
    let (sin_a, cos_a) = face_a.sin_cos();
    let (sin_b, cos_b) = face_b.sin_cos();

    let dx = b.tvec.x - a.tvec.x;
    let dz = b.tvec.z - a.tvec.z;

    // centre = tpos - r * (sin(face), 0, -cos(face)) for each armor; equate the two centres and
    // solve the resulting 2x2 linear system for (r_a, r_b). The determinant is sin(face_a -
    // face_b), which is near +-1 when the two armors sit on perpendicular rings as expected.
    let det = sin_a * cos_b - sin_b * cos_a;
    let r_a = (-dx * cos_b - sin_b * dz) / det;
    let r_b = -(sin_a * dz + dx * cos_a) / det;

    let centre_y = (a.tvec.y + b.tvec.y) / 2.0;
    let centre_a = Vector3::new(a.tvec.x - r_a * sin_a, centre_y, a.tvec.z + r_a * cos_a);
    let centre_b = Vector3::new(b.tvec.x - r_b * sin_b, centre_y, b.tvec.z + r_b * cos_b);
    let centre = (centre_a + centre_b) / 2.0;

    let h = a.tvec.y - b.tvec.y;

    // Canonicalise so the result doesn't depend on argument order: the even-sector armor always
    // supplies r1 and the reported yaw.
    let (yaw, r1, r2) = if sector(wrap_pi(face_a)) % 2 == 0 {
        (wrap_pi(face_a), r_a, r_b)
    } else {
        (wrap_pi(face_b), r_b, r_a)
    };

    let mut state = RobotState::zeroed(a.class_id, timestamp, 0.0);
    state.set_position(centre);
    state.set_yaw(yaw);
    state.set_r1(r1);
    state.set_r2(r2);
    state.set_h(h);
    state.pf_state = if reset { PfState::Reset } else { PfState::Measurement };
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gimbal_types::TrackId;
    use std::time::Duration;

    fn det(class_id: u32, tvec: Vector3<f64>, yaw_rad: f64) -> DetectionResult {
        DetectionResult {
            class_id: TrackId(class_id),
            confidence: 1.0,
            tvec,
            yaw_rad,
        }
    }

    #[test]
    fn one_armor_with_no_prior_seeds_default_radii_and_det_yaw() {
        let d = det(1, Vector3::new(0.0, 0.0, 3.0), 0.2);
        let rs = from_one_armor(None, &d, Duration::from_secs(0), 0.15, false);
        assert_eq!(rs.r1(), 0.15);
        assert_eq!(rs.r2(), 0.15);
        assert_relative_eq!(rs.yaw(), 0.2);
        assert_eq!(rs.pf_state, PfState::Reset);
    }

    #[test]
    fn one_armor_refinement_matches_documented_scenario() {
        // prior yaw = 0, det.yaw_rad = pi/2 - 0.05 -> chosen_yaw resolves to pi/2, sector 1 (odd)
        // so r2 is used (SPEC_FULL.md §8 scenario 3).
        let prev = RobotState::zeroed(TrackId(1), Duration::from_secs(0), 0.1);
        let d = det(1, Vector3::new(1.0, 0.0, 1.0), PI / 2.0 - 0.05);
        let rs = from_one_armor(Some(&prev), &d, Duration::from_secs(1), 0.1, false);
        assert_relative_eq!(rs.yaw(), PI / 2.0, epsilon = 1e-9);
        assert_eq!(sector(rs.yaw()), 1);
    }

    #[test]
    fn two_armor_reconstruction_is_order_invariant() {
        let a = det(5, Vector3::new(0.2, 0.0, 3.0), 0.0);
        let b = det(5, Vector3::new(-0.1, 0.02, 3.3), PI / 2.0);

        let forward = from_two_armors(&a, &b, Duration::from_secs(0), true);
        let swapped = from_two_armors(&b, &a, Duration::from_secs(0), true);

        assert_relative_eq!(forward.yaw(), swapped.yaw(), epsilon = 1e-9);
        assert_relative_eq!(forward.r1(), swapped.r1(), epsilon = 1e-9);
        assert_relative_eq!(forward.r2(), swapped.r2(), epsilon = 1e-9);
        assert_relative_eq!(forward.position(), swapped.position(), epsilon = 1e-9);
    }

    #[test]
    fn two_armor_reset_flag_is_carried_through() {
        let a = det(5, Vector3::new(0.2, 0.0, 3.0), 0.0);
        let b = det(5, Vector3::new(-0.1, 0.0, 3.3), PI / 2.0);
        let rs = from_two_armors(&a, &b, Duration::from_secs(0), false);
        assert_eq!(rs.pf_state, PfState::Measurement);
    }
}
