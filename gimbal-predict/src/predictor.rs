//! Per-cycle prediction: smoothing, lead-time convergence, ballistic drop, and gimbal command
//! synthesis (SPEC_FULL.md §4.6).

use gimbal_geom::r_world_to_cam;
use gimbal_types::{now, PredictionOut, RobotState};

use crate::limits::GimbalLimits;
use crate::motion::lead_time;

const GRAVITY: f64 = 9.81;
const BASE_TOLERANCE: f64 = 0.13;

/// Tunables for one predictor instance, sourced from `gimbal-config` at startup.
#[derive(Debug, Clone, Copy)]
pub struct PredictConfig {
    pub smoothing_alpha: f64,
    pub t_gimbal_actuation: f64,
    pub tolerance_coeff: f64,
    pub chase_distance: f64,
    pub limits: GimbalLimits,
}

/// Holds the smoothed scalars (`bullet_speed`, `t_processing`) that persist across prediction
/// cycles; everything else is a pure function of the latest PF state.
pub struct Predictor {
    config: PredictConfig,
    bullet_speed: f64,
    t_processing: f64,
}

impl Predictor {
    pub fn new(config: PredictConfig, initial_bullet_speed: f64, initial_t_processing: f64) -> Self {
        Predictor {
            config,
            bullet_speed: initial_bullet_speed,
            t_processing: initial_t_processing,
        }
    }

    pub fn bullet_speed(&self) -> f64 {
        self.bullet_speed
    }

    fn smooth(value: f64, measured: f64, alpha: f64) -> f64 {
        alpha * measured + (1.0 - alpha) * value
    }

    /// Run one full prediction cycle against the latest PF state.
    pub fn update(&mut self, rs: &RobotState, yaw_imu: f64, pitch_imu: f64, measured_bullet_speed: f64) -> PredictionOut {
        let alpha = self.config.smoothing_alpha;
        self.bullet_speed = Self::smooth(self.bullet_speed, measured_bullet_speed, alpha);

        let observed_ts = now();
        let proc = observed_ts.saturating_sub(rs.timestamp).as_secs_f64();
        self.t_processing = Self::smooth(self.t_processing, proc, alpha);

        let (_, pos_world) = lead_time(rs, self.bullet_speed, self.t_processing, self.config.t_gimbal_actuation);

        let mut pos_cam = r_world_to_cam(yaw_imu, pitch_imu) * pos_world;

        let d = pos_cam.norm();
        if self.bullet_speed > 0.0 {
            pos_cam.y += 0.5 * GRAVITY * d * d / (self.bullet_speed * self.bullet_speed);
        }

        let yaw_cmd = self.config.limits.clamp_yaw(pos_cam.x.atan2(pos_cam.z));
        let pitch_cmd = self.config.limits.clamp_pitch(pos_cam.y.atan2(pos_cam.z));

        let tol = BASE_TOLERANCE * self.config.tolerance_coeff;
        let fire = pos_cam.x.abs() < tol / 2.0 && pos_cam.y.abs() < tol / 2.0;
        let chase = pos_cam.z > self.config.chase_distance;

        PredictionOut {
            yaw_cmd,
            pitch_cmd,
            fire,
            chase,
            aim: true,
            timestamp: observed_ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimbal_types::TrackId;
    use nalgebra::Vector3;
    use std::time::Duration;

    fn config() -> PredictConfig {
        PredictConfig {
            smoothing_alpha: 0.1,
            t_gimbal_actuation: 0.01,
            tolerance_coeff: 1.0,
            chase_distance: 6.0,
            limits: GimbalLimits {
                pitch_min: -1.0,
                pitch_max: 1.0,
                yaw_min: -3.0,
                yaw_max: 3.0,
                has_yaw_limits: false,
                safety_margin: 0.02,
            },
        }
    }

    #[test]
    fn stationary_centered_target_fires() {
        let mut predictor = Predictor::new(config(), 20.0, 0.01);
        let mut rs = RobotState::zeroed(TrackId(1), Duration::from_secs(0), 0.2);
        rs.set_position(Vector3::new(0.0, 0.0, 3.0));
        let out = predictor.update(&rs, 0.0, 0.0, 20.0);
        assert!(out.fire, "expected fire=true for a centered stationary target");
        assert!(!out.chase);
    }

    #[test]
    fn far_target_triggers_chase() {
        let mut predictor = Predictor::new(config(), 20.0, 0.01);
        let mut rs = RobotState::zeroed(TrackId(1), Duration::from_secs(0), 0.2);
        rs.set_position(Vector3::new(0.0, 0.0, 8.0));
        let out = predictor.update(&rs, 0.0, 0.0, 20.0);
        assert!(out.chase);
    }

    #[test]
    fn bullet_speed_smooths_toward_measurement() {
        let mut predictor = Predictor::new(config(), 10.0, 0.01);
        let mut rs = RobotState::zeroed(TrackId(1), Duration::from_secs(0), 0.2);
        rs.set_position(Vector3::new(0.0, 0.0, 3.0));
        predictor.update(&rs, 0.0, 0.0, 30.0);
        assert!(predictor.bullet_speed() > 10.0 && predictor.bullet_speed() < 30.0);
    }
}
