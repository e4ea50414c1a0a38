//! Camera and IMU ingest workers: each blocks on its driver's `grab`/`read` call and republishes
//! the result, converting device errors into retry-with-log per SPEC_FULL.md §7.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gimbal_registry::SharedLatest;
use gimbal_types::{CameraFrame, ImuState};

use crate::{CameraDriver, DriverError, ImuDriver};

const GRAB_TIMEOUT: Duration = Duration::from_millis(200);
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Spawn the Camera worker: blocks on `driver.grab`, publishes a validated [`CameraFrame`] to the
/// `camera` slot, and keeps going on transient errors. Runs until `stop` is set.
pub fn spawn_camera(
    registry: SharedLatest,
    stop: Arc<AtomicBool>,
    driver: impl CameraDriver + 'static,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("camera".to_string())
        .spawn(move || run_camera(registry, stop, driver))
}

fn run_camera(registry: SharedLatest, stop: Arc<AtomicBool>, mut driver: impl CameraDriver) {
    let span = tracing::info_span!("camera");
    let _enter = span.enter();
    tracing::info!("camera worker starting");

    while !stop.load(Ordering::Relaxed) {
        match driver.grab(GRAB_TIMEOUT) {
            Ok((width, height, raw_data)) => {
                let frame = CameraFrame {
                    timestamp: gimbal_types::now(),
                    width,
                    height,
                    raw_data: Arc::from(raw_data),
                };
                if let Err(err) = frame.validate() {
                    tracing::warn!(%err, "dropping malformed camera frame");
                    continue;
                }
                registry.camera().publish(frame);
            }
            Err(DriverError::ReadTimeout) => continue,
            Err(err) => {
                tracing::warn!(%err, "camera grab failed, retrying");
                thread::sleep(RETRY_BACKOFF);
            }
        }
    }

    tracing::info!("camera worker stopping");
}

/// Spawn the IMU worker: blocks on `driver.read`, publishes an [`ImuState`] to the `imu` slot.
/// Runs until `stop` is set.
pub fn spawn_imu(
    registry: SharedLatest,
    stop: Arc<AtomicBool>,
    driver: impl ImuDriver + 'static,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("imu".to_string())
        .spawn(move || run_imu(registry, stop, driver))
}

fn run_imu(registry: SharedLatest, stop: Arc<AtomicBool>, mut driver: impl ImuDriver) {
    let span = tracing::info_span!("imu");
    let _enter = span.enter();
    tracing::info!("imu worker starting");

    while !stop.load(Ordering::Relaxed) {
        match driver.read(GRAB_TIMEOUT) {
            Ok((euler_angle, time)) => {
                let state = ImuState {
                    timestamp: gimbal_types::now(),
                    time,
                    euler_angle,
                };
                registry.imu().publish(state);
            }
            Err(DriverError::ReadTimeout) => continue,
            Err(err) => {
                tracing::warn!(%err, "imu read failed, retrying");
                thread::sleep(RETRY_BACKOFF);
            }
        }
    }

    tracing::info!("imu worker stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReplayCameraDriver, ReplayImuDriver};

    #[test]
    fn camera_worker_publishes_at_least_one_frame() {
        let registry = SharedLatest::new();
        let stop = Arc::new(AtomicBool::new(false));
        let driver = ReplayCameraDriver::blank(4, 4);
        let handle = spawn_camera(registry.clone(), stop.clone(), driver).unwrap();

        let mut waited = Duration::ZERO;
        while registry.camera().version() == 0 && waited < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
            waited += Duration::from_millis(5);
        }
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(registry.camera().version() >= 1);
    }

    #[test]
    fn imu_worker_publishes_at_least_one_sample() {
        let registry = SharedLatest::new();
        let stop = Arc::new(AtomicBool::new(false));
        let driver = ReplayImuDriver::level();
        let handle = spawn_imu(registry.clone(), stop.clone(), driver).unwrap();

        let mut waited = Duration::ZERO;
        while registry.imu().version() == 0 && waited < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
            waited += Duration::from_millis(5);
        }
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(registry.imu().version() >= 1);
    }
}
