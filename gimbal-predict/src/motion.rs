//! Constant-acceleration motion model and lead-time convergence (SPEC_FULL.md §4.6).

use gimbal_geom::{sector, yaw_restrict};
use gimbal_types::RobotState;
use nalgebra::Vector3;

const MAX_ITERATIONS: u32 = 10;
const CONVERGENCE_EPS: f64 = 0.01;

/// Project a tracked robot's state forward by `t` seconds, world frame, accounting for which
/// armor ring faces the gimbal at the projected yaw (SPEC_FULL.md §4.6).
pub fn motion_model(rs: &RobotState, t: f64) -> Vector3<f64> {
    let mut pos = rs.position() + rs.velocity() * t + rs.acceleration() * (0.5 * t * t);

    let yaw_t = rs.yaw() + rs.yaw_rate() * t + 0.5 * rs.yaw_acc() * t * t;
    let s = sector(yaw_t);
    let r = if s % 2 == 1 { rs.r2() } else { rs.r1() };
    let restricted = yaw_restrict(yaw_t);

    pos.x += r * restricted.sin();
    pos.z -= r * restricted.cos();
    pos.y += rs.h();
    pos
}

/// Iteratively solve for the lead time at which a projectile travelling at `bullet_speed` would
/// meet the target, folding in fixed processing and actuation latency. Converges when successive
/// lead-time estimates differ by less than 0.01s, or after 10 iterations, whichever comes first.
/// Returns `(t_lead, projected_world_position)`.
pub fn lead_time(rs: &RobotState, bullet_speed: f64, t_processing: f64, t_gimbal_actuation: f64) -> (f64, Vector3<f64>) {
    let mut t_lead = rs.position().norm() / bullet_speed + t_processing + t_gimbal_actuation;
    let mut pos = rs.position();

    for _ in 0..MAX_ITERATIONS {
        pos = motion_model(rs, t_lead);
        let t_new = pos.norm() / bullet_speed + t_processing + t_gimbal_actuation;
        let converged = (t_new - t_lead).abs() < CONVERGENCE_EPS;
        t_lead = t_new;
        if converged {
            break;
        }
    }
    (t_lead, pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimbal_types::TrackId;
    use std::time::Duration;

    #[test]
    fn motionless_target_projects_to_its_own_position_plus_ring_offset() {
        let mut rs = RobotState::zeroed(TrackId(1), Duration::from_secs(0), 0.2);
        rs.set_position(Vector3::new(0.0, 0.0, 3.0));
        let projected = motion_model(&rs, 0.3);
        // no velocity/acceleration/yaw motion: x/z offset comes entirely from the ring term.
        assert!((projected.z - 3.0).abs() < 0.25);
    }

    #[test]
    fn lead_time_converges_within_budgeted_iterations() {
        let mut rs = RobotState::zeroed(TrackId(1), Duration::from_secs(0), 0.2);
        rs.set_position(Vector3::new(0.0, 0.0, 5.0));
        rs.set_vx(0.5);
        let (t_lead, pos) = lead_time(&rs, 20.0, 0.01, 0.005);
        assert!(t_lead > 0.0 && t_lead < 2.0, "t_lead = {t_lead}");
        assert!(pos.z > 0.0);
    }
}
