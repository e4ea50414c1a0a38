//! Gimbal travel limits and the clamp policy applied to every outgoing command
//! (SPEC_FULL.md §6).

use gimbal_geom::wrap_pi;

/// Physical gimbal limits, produced by the `gimbal-calib` one-shot calibration tool and loaded at
/// startup by `gimbal-config`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct GimbalLimits {
    pub pitch_min: f64,
    pub pitch_max: f64,
    pub yaw_min: f64,
    pub yaw_max: f64,
    pub has_yaw_limits: bool,
    pub safety_margin: f64,
}

impl GimbalLimits {
    /// Clamp pitch to `[pitch_min + margin, pitch_max - margin]`.
    pub fn clamp_pitch(&self, pitch: f64) -> f64 {
        pitch.clamp(self.pitch_min + self.safety_margin, self.pitch_max - self.safety_margin)
    }

    /// If the gimbal has no yaw stops, wrap freely into `(-pi, pi]`; otherwise clamp with margin.
    pub fn clamp_yaw(&self, yaw: f64) -> f64 {
        if self.has_yaw_limits {
            yaw.clamp(self.yaw_min + self.safety_margin, self.yaw_max - self.safety_margin)
        } else {
            wrap_pi(yaw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited() -> GimbalLimits {
        GimbalLimits {
            pitch_min: -0.5,
            pitch_max: 0.5,
            yaw_min: -1.0,
            yaw_max: 1.0,
            has_yaw_limits: true,
            safety_margin: 0.05,
        }
    }

    #[test]
    fn pitch_clamps_inside_margin() {
        let limits = limited();
        assert_eq!(limits.clamp_pitch(10.0), 0.45);
        assert_eq!(limits.clamp_pitch(-10.0), -0.45);
        assert_eq!(limits.clamp_pitch(0.1), 0.1);
    }

    #[test]
    fn yaw_clamps_when_limited_and_wraps_when_unlimited() {
        let limits = limited();
        assert_eq!(limits.clamp_yaw(10.0), 0.95);

        let mut unlimited = limited();
        unlimited.has_yaw_limits = false;
        assert!((unlimited.clamp_yaw(7.0) - wrap_pi(7.0)).abs() < 1e-12);
    }
}
