//! Angle and rotation helpers shared by the detection and prediction stages.
//!
//! The rotation convention is fixed once here and used consistently everywhere a frame change is
//! needed, resolving the two competing `R_y` definitions noted in SPEC_FULL.md §9: yaw rotates
//! about `nalgebra`'s vertical `y` axis (positive yaw = left turn), pitch tilts about the camera's
//! right (`x`) axis (positive pitch = camera tilts down).

use nalgebra::{Rotation3, Vector3};

use std::f64::consts::{PI, TAU};

/// Wrap an angle (radians) into `(-π, π]`.
pub fn wrap_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // `rem_euclid` on `(angle + PI)` lands in `[0, TAU)`, so `wrapped` lands in `[-PI, PI)`. Nudge
    // the one excluded endpoint (-PI) up to PI to match the documented `(-PI, PI]` range.
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// Which of the four yaw quadrants `yaw` falls in, used to pick between a robot's two armor-ring
/// radii (`r1` for even sectors, `r2` for odd). Shared verbatim by one-armor reconstruction
/// (SPEC_FULL.md §4.4) and the prediction motion model (§4.6): both reduce to the same formula
/// once the extra `+ π` term in the one-armor prose (needed only to normalise `wrap_pi`'s range
/// before the modulo, which `rem_euclid` already does here) is accounted for — see DESIGN.md.
pub fn sector(yaw: f64) -> u8 {
    let shifted = (wrap_pi(yaw) + PI / 4.0).rem_euclid(TAU);
    (shifted / (PI / 2.0)).floor() as u8 & 0b11
}

/// Restrict a yaw to the `(-π/4, 3π/4]`-style single-quadrant window used by the prediction
/// motion model (SPEC_FULL.md §4.6) to decide the sign of the ring-radius offset.
pub fn yaw_restrict(yaw: f64) -> f64 {
    ((yaw + PI / 4.0).rem_euclid(PI)) - PI / 4.0
}

/// Rotation taking a vector from camera frame to world frame, given the current IMU yaw/pitch
/// (radians).
pub fn r_cam_to_world(yaw: f64, pitch: f64) -> Rotation3<f64> {
    let r_y = Rotation3::from_axis_angle(&Vector3::y_axis(), yaw);
    let r_x = Rotation3::from_axis_angle(&Vector3::x_axis(), pitch);
    r_y * r_x
}

/// Rotation taking a vector from world frame to camera frame; the transpose (inverse) of
/// [`r_cam_to_world`].
pub fn r_world_to_cam(yaw: f64, pitch: f64) -> Rotation3<f64> {
    r_cam_to_world(yaw, pitch).transpose()
}

/// Rotate a camera-frame yaw angle into world frame given the current IMU yaw: `yaw_world =
/// yaw_cam + yaw_imu` (SPEC_FULL.md §4.4).
pub fn yaw_cam_to_world(yaw_cam: f64, yaw_imu: f64) -> f64 {
    wrap_pi(yaw_cam + yaw_imu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wrap_pi_stays_in_range_for_many_inputs() {
        for i in -100..=100 {
            let angle = i as f64 * 1.3;
            let w = wrap_pi(angle);
            assert!(w > -PI && w <= PI, "wrap_pi({angle}) = {w} out of range");
        }
    }

    #[test]
    fn wrap_pi_is_identity_inside_range() {
        assert_relative_eq!(wrap_pi(0.5), 0.5);
        assert_relative_eq!(wrap_pi(PI), PI);
    }

    #[test]
    fn wrap_pi_handles_large_multiples_of_tau() {
        assert_relative_eq!(wrap_pi(0.5 + 10.0 * TAU), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn sector_is_always_in_0_to_3() {
        for i in -50..=50 {
            let yaw = i as f64 * 0.37;
            let s = sector(yaw);
            assert!(s <= 3, "sector({yaw}) = {s}");
        }
    }

    #[test]
    fn sector_matches_one_armor_refinement_scenario() {
        // prior yaw = 0, chosen_yaw resolves to pi/2 (see gimbal-vision scenario test); here we
        // check the sector formula alone against SPEC_FULL.md §8 scenario 3.
        assert_eq!(sector(PI / 2.0), 1);
    }

    #[test]
    fn r_cam_to_world_and_back_is_identity() {
        let fwd = r_cam_to_world(0.3, -0.1);
        let back = r_world_to_cam(0.3, -0.1);
        let id = fwd * back;
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(id * v, v, epsilon = 1e-9);
    }

    #[test]
    fn yaw_zero_pitch_zero_is_identity_rotation() {
        let r = r_cam_to_world(0.0, 0.0);
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(r * v, v, epsilon = 1e-9);
    }

    #[test]
    fn quarter_turn_yaw_swaps_forward_and_right_axes() {
        // Forward is +z (matches the detection/prediction convention that distance grows with
        // z). A quarter-turn yaw about the vertical axis must map +z onto the horizontal axis
        // orthogonal to it and leave the vertical component untouched.
        let r = r_cam_to_world(PI / 2.0, 0.0);
        let forward = Vector3::new(0.0, 0.0, 1.0);
        let rotated = r * forward;
        assert_relative_eq!(rotated.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(rotated.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(rotated.z, 0.0, epsilon = 1e-9);
    }
}
