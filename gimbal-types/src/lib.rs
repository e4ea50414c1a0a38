//! Shared data model for the aim-and-fire pipeline.
//!
//! These types cross worker boundaries through [`gimbal_registry::SharedLatest`] and are never
//! mutated in place once published: every producer builds a fresh value and hands it off by value
//! (or inside an `Arc`), and every consumer treats what it reads as a frozen snapshot.

use nalgebra::{SVector, Vector3};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Monotonic or wall-clock timestamp carried by every published snapshot.
///
/// Stored as a duration since [`SystemTime::UNIX_EPOCH`] so it is `Copy` and trivially
/// subtractable, which every consumer needs to compute latency.
pub type Timestamp = Duration;

/// Read the current time as a [`Timestamp`].
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
}

/// A single video frame grabbed from the camera SDK.
///
/// `raw_data` is always `width * height * 3` bytes (interleaved RGB), matching the camera driver
/// contract in SPEC_FULL.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFrame {
    pub timestamp: Timestamp,
    pub width: u32,
    pub height: u32,
    pub raw_data: std::sync::Arc<[u8]>,
}

impl CameraFrame {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Euler angles in degrees, world frame, as read off the IMU wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EulerAnglesDeg {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAnglesDeg {
    pub fn to_radians(self) -> EulerAnglesRad {
        EulerAnglesRad {
            roll: self.roll.to_radians(),
            pitch: self.pitch.to_radians(),
            yaw: self.yaw.to_radians(),
        }
    }
}

/// Euler angles in radians, world frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EulerAnglesRad {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// One IMU sample as published to the `imu` slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImuState {
    pub timestamp: Timestamp,
    /// Driver-reported sample time, distinct from `timestamp` (which is core-assigned on receipt).
    pub time: Timestamp,
    pub euler_angle: EulerAnglesDeg,
}

/// Identifier for a tracked robot (its armor `class_id`).
///
/// Always non-negative; the original source's `selected_robot_id & 0x80000000` sentinel trick is
/// replaced with `Option<TrackId>` throughout (SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

/// A 2D keypoint on the detected armor plate, in image pixel coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

/// A raw per-armor detection, already refined and confidence-filtered, but still in camera frame
/// before PnP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: TrackId,
    pub keypoints: Vec<Keypoint>,
    pub confidence: f32,
}

/// A single-armor observation after PnP solving, in camera frame (before world rotation).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectionResult {
    pub class_id: TrackId,
    pub confidence: f32,
    pub tvec: Vector3<f64>,
    pub yaw_rad: f64,
}

/// Cooperative signal carried on a [`RobotState`] telling the particle filter what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PfState {
    /// Ordinary measurement; fold into the existing particle set.
    #[default]
    Measurement,
    /// Reinitialise the particle set from this measurement (selector just (re)acquired a target).
    Reset,
}

/// Indices into [`RobotState::state`], named for readability at call sites.
pub mod state_index {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
    pub const VX: usize = 3;
    pub const VY: usize = 4;
    pub const VZ: usize = 5;
    pub const AX: usize = 6;
    pub const AY: usize = 7;
    pub const AZ: usize = 8;
    pub const YAW: usize = 9;
    pub const YAW_RATE: usize = 10;
    pub const YAW_ACC: usize = 11;
    pub const R1: usize = 12;
    pub const R2: usize = 13;
    pub const H: usize = 14;
}

/// The fused, tracked state of a single opposing robot.
///
/// `state` is the 15-slot vector `[x y z vx vy vz ax ay az yaw yaw_rate yaw_acc r1 r2 h]` described
/// in SPEC_FULL.md §3. Accessors below read/write it by name; nothing outside this module should
/// index `state` directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RobotState {
    pub class_id: TrackId,
    pub timestamp: Timestamp,
    pub pf_state: PfState,
    pub state: SVector<f64, 15>,
}

macro_rules! scalar_field {
    ($get:ident, $set:ident, $idx:path) => {
        pub fn $get(&self) -> f64 {
            self.state[$idx]
        }
        pub fn $set(&mut self, v: f64) {
            self.state[$idx] = v;
        }
    };
}

impl RobotState {
    pub fn zeroed(class_id: TrackId, timestamp: Timestamp, default_radius: f64) -> Self {
        let mut s = RobotState {
            class_id,
            timestamp,
            pf_state: PfState::Reset,
            state: SVector::<f64, 15>::zeros(),
        };
        s.set_r1(default_radius);
        s.set_r2(default_radius);
        s
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x(), self.y(), self.z())
    }

    pub fn set_position(&mut self, p: Vector3<f64>) {
        self.set_x(p.x);
        self.set_y(p.y);
        self.set_z(p.z);
    }

    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.vx(), self.vy(), self.vz())
    }

    pub fn acceleration(&self) -> Vector3<f64> {
        Vector3::new(self.ax(), self.ay(), self.az())
    }

    scalar_field!(x, set_x, state_index::X);
    scalar_field!(y, set_y, state_index::Y);
    scalar_field!(z, set_z, state_index::Z);
    scalar_field!(vx, set_vx, state_index::VX);
    scalar_field!(vy, set_vy, state_index::VY);
    scalar_field!(vz, set_vz, state_index::VZ);
    scalar_field!(ax, set_ax, state_index::AX);
    scalar_field!(ay, set_ay, state_index::AY);
    scalar_field!(az, set_az, state_index::AZ);
    scalar_field!(yaw, set_yaw, state_index::YAW);
    scalar_field!(yaw_rate, set_yaw_rate, state_index::YAW_RATE);
    scalar_field!(yaw_acc, set_yaw_acc, state_index::YAW_ACC);
    scalar_field!(r1, set_r1, state_index::R1);
    scalar_field!(r2, set_r2, state_index::R2);
    scalar_field!(h, set_h, state_index::H);
}

/// Final gimbal command, in camera/gimbal frame, emitted once per prediction cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictionOut {
    pub yaw_cmd: f64,
    pub pitch_cmd: f64,
    pub fire: bool,
    pub chase: bool,
    pub aim: bool,
    pub timestamp: Timestamp,
}

/// Errors shared across the data model (malformed payloads discovered while building a type).
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("camera frame raw_data has {actual} bytes, expected {expected} for {width}x{height}")]
    FrameSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

impl CameraFrame {
    pub fn validate(&self) -> Result<(), TypesError> {
        let expected = self.expected_len();
        if self.raw_data.len() != expected {
            return Err(TypesError::FrameSizeMismatch {
                width: self.width,
                height: self.height,
                expected,
                actual: self.raw_data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_validate_catches_size_mismatch() {
        let frame = CameraFrame {
            timestamp: Duration::from_secs(1),
            width: 4,
            height: 4,
            raw_data: std::sync::Arc::from(vec![0u8; 10]),
        };
        assert!(frame.validate().is_err());
    }

    #[test]
    fn frame_validate_accepts_correct_size() {
        let frame = CameraFrame {
            timestamp: Duration::from_secs(1),
            width: 2,
            height: 2,
            raw_data: std::sync::Arc::from(vec![0u8; 12]),
        };
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn robot_state_accessors_round_trip() {
        let mut rs = RobotState::zeroed(TrackId(7), Duration::from_secs(0), 0.2);
        rs.set_x(1.5);
        rs.set_yaw(0.3);
        assert_eq!(rs.x(), 1.5);
        assert_eq!(rs.yaw(), 0.3);
        assert_eq!(rs.r1(), 0.2);
        assert_eq!(rs.r2(), 0.2);
    }
}
