//! Trait contracts for the external collaborators named in SPEC_FULL.md §6 — camera SDK, IMU
//! driver, detector, and PnP solver — plus software-only reference implementations so the
//! workspace builds and its tests exercise real code paths without any vendor hardware present,
//! the same role `ci2-simple-demo` plays for `ci2::Camera`/`ci2::CameraModule`.

use std::time::Duration;

use gimbal_types::{CameraFrame, EulerAnglesDeg, Keypoint, RawDetection, TrackId};
use nalgebra::Vector3;

pub mod worker;
pub use worker::{spawn_camera, spawn_imu};

/// Errors a driver can surface. Transient errors (`ReadTimeout`, `MalformedFrame`) are expected to
/// be logged and retried by the calling worker loop, per SPEC_FULL.md §7; `DeviceUnavailable` on a
/// mandatory transport is fatal.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("read timed out")]
    ReadTimeout,
    #[error("malformed frame from device: {0}")]
    MalformedFrame(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Camera SDK contract (SPEC_FULL.md §6): `grab` blocks until a frame is available or the device's
/// own timeout elapses, and never blocks indefinitely.
pub trait CameraDriver: Send {
    fn grab(&mut self, timeout: Duration) -> DriverResult<(u32, u32, Vec<u8>)>;
}

/// IMU driver contract: `read` blocks until a sample is available or times out.
pub trait ImuDriver: Send {
    fn read(&mut self, timeout: Duration) -> DriverResult<(EulerAnglesDeg, Duration)>;
}

/// Detector contract, subsuming YOLO inference, keypoint refinement, and confidence filtering
/// (SPEC_FULL.md §6).
pub trait ArmorDetector: Send {
    fn detect(&self, frame: &CameraFrame) -> Vec<RawDetection>;
}

/// PnP solver contract: turns a refined detection into a camera-frame position and yaw.
pub trait PnpSolver: Send {
    fn solve(&self, frame: &CameraFrame, raw: &RawDetection) -> DriverResult<(Vector3<f64>, f64)>;
}

/// A software camera "driver" that replays a fixed sequence of frames, looping once exhausted.
/// Used by tests and by the `gimbal-run` binary's `--replay` mode when no real SDK is linked.
pub struct ReplayCameraDriver {
    frames: Vec<(u32, u32, Vec<u8>)>,
    next: usize,
}

impl ReplayCameraDriver {
    pub fn new(frames: Vec<(u32, u32, Vec<u8>)>) -> Self {
        assert!(!frames.is_empty(), "ReplayCameraDriver needs at least one frame");
        ReplayCameraDriver { frames, next: 0 }
    }

    /// A single-frame driver of blank `width x height` RGB frames, handy for smoke tests.
    pub fn blank(width: u32, height: u32) -> Self {
        let data = vec![0u8; width as usize * height as usize * 3];
        Self::new(vec![(width, height, data)])
    }
}

impl CameraDriver for ReplayCameraDriver {
    fn grab(&mut self, _timeout: Duration) -> DriverResult<(u32, u32, Vec<u8>)> {
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }
}

/// A software IMU "driver" that replays a fixed sequence of samples, looping once exhausted.
pub struct ReplayImuDriver {
    samples: Vec<EulerAnglesDeg>,
    next: usize,
}

impl ReplayImuDriver {
    pub fn new(samples: Vec<EulerAnglesDeg>) -> Self {
        assert!(!samples.is_empty(), "ReplayImuDriver needs at least one sample");
        ReplayImuDriver { samples, next: 0 }
    }

    pub fn level() -> Self {
        Self::new(vec![EulerAnglesDeg {
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
        }])
    }
}

impl ImuDriver for ReplayImuDriver {
    fn read(&mut self, _timeout: Duration) -> DriverResult<(EulerAnglesDeg, Duration)> {
        let sample = self.samples[self.next];
        self.next = (self.next + 1) % self.samples.len();
        Ok((sample, Duration::from_secs(0)))
    }
}

/// A test/demo detector that returns a fixed, caller-supplied set of raw detections regardless of
/// frame content — standing in for the YOLO + keypoint-refinement pipeline.
#[derive(Default)]
pub struct FixedDetector {
    pub detections: Vec<RawDetection>,
}

impl FixedDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        FixedDetector { detections }
    }

    pub fn single(class_id: TrackId, confidence: f32) -> Self {
        Self::new(vec![RawDetection {
            class_id,
            keypoints: vec![
                Keypoint { x: 0.0, y: 0.0 },
                Keypoint { x: 1.0, y: 0.0 },
                Keypoint { x: 1.0, y: 1.0 },
                Keypoint { x: 0.0, y: 1.0 },
            ],
            confidence,
        }])
    }
}

impl ArmorDetector for FixedDetector {
    fn detect(&self, _frame: &CameraFrame) -> Vec<RawDetection> {
        self.detections.clone()
    }
}

/// A PnP solver stand-in that looks up a fixed `(tvec, yaw_rad)` per `class_id`, falling back to
/// the coordinate origin if the class is unknown.
#[derive(Default)]
pub struct FixedPnpSolver {
    fixed: std::collections::HashMap<u32, (Vector3<f64>, f64)>,
}

impl FixedPnpSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, class_id: TrackId, tvec: Vector3<f64>, yaw_rad: f64) -> Self {
        self.fixed.insert(class_id.0, (tvec, yaw_rad));
        self
    }
}

impl PnpSolver for FixedPnpSolver {
    fn solve(&self, _frame: &CameraFrame, raw: &RawDetection) -> DriverResult<(Vector3<f64>, f64)> {
        Ok(self
            .fixed
            .get(&raw.class_id.0)
            .copied()
            .unwrap_or((Vector3::zeros(), 0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_camera_driver_loops() {
        let mut drv = ReplayCameraDriver::new(vec![(1, 1, vec![1, 2, 3]), (1, 1, vec![4, 5, 6])]);
        let (_, _, a) = drv.grab(Duration::from_millis(10)).unwrap();
        let (_, _, b) = drv.grab(Duration::from_millis(10)).unwrap();
        let (_, _, c) = drv.grab(Duration::from_millis(10)).unwrap();
        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(b, vec![4, 5, 6]);
        assert_eq!(c, vec![1, 2, 3]);
    }

    #[test]
    fn fixed_pnp_solver_falls_back_to_origin_for_unknown_class() {
        let solver = FixedPnpSolver::new();
        let frame = CameraFrame {
            timestamp: Duration::from_secs(0),
            width: 1,
            height: 1,
            raw_data: std::sync::Arc::from(vec![0u8; 3]),
        };
        let raw = RawDetection {
            class_id: TrackId(42),
            keypoints: vec![],
            confidence: 1.0,
        };
        let (tvec, yaw) = solver.solve(&frame, &raw).unwrap();
        assert_eq!(tvec, Vector3::zeros());
        assert_eq!(yaw, 0.0);
    }
}
