//! The Detection worker: camera-edge-triggered armor detection, grouping, selection, and
//! one/two-armor pose reconstruction (SPEC_FULL.md §4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gimbal_drivers::{ArmorDetector, PnpSolver};
use gimbal_registry::SharedLatest;
use gimbal_types::{DetectionResult, RobotState, Timestamp};

use crate::grouping::form_robot;
use crate::pose::{from_one_armor, from_two_armors};
use crate::selector::Selector;

const POLL_BACKOFF: Duration = Duration::from_millis(1);

/// Tunables the Detection worker needs beyond its collaborators.
#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    pub default_radius: f64,
    pub selector_max_ttl: f64,
}

/// Spawn the Detection worker on its own OS thread. Returns immediately; the worker runs until
/// `stop` is set, per SPEC_FULL.md §5's shutdown sequence.
pub fn spawn<D, P>(
    registry: SharedLatest,
    stop: Arc<AtomicBool>,
    detector: D,
    solver: P,
    config: DetectionConfig,
) -> std::io::Result<JoinHandle<()>>
where
    D: ArmorDetector + 'static,
    P: PnpSolver + 'static,
{
    thread::Builder::new()
        .name("detection".to_string())
        .spawn(move || run(registry, stop, detector, solver, config))
}

fn to_world(
    raw: &gimbal_types::RawDetection,
    frame: &gimbal_types::CameraFrame,
    solver: &impl PnpSolver,
    yaw_imu: f64,
    pitch_imu: f64,
) -> Option<DetectionResult> {
    match solver.solve(frame, raw) {
        Ok((tvec_cam, yaw_cam)) => {
            let tvec_world = gimbal_geom::r_cam_to_world(yaw_imu, pitch_imu) * tvec_cam;
            let yaw_world = gimbal_geom::yaw_cam_to_world(yaw_cam, yaw_imu);
            Some(DetectionResult {
                class_id: raw.class_id,
                confidence: raw.confidence,
                tvec: tvec_world,
                yaw_rad: yaw_world,
            })
        }
        Err(err) => {
            tracing::warn!(%err, "pnp solve failed, dropping detection");
            None
        }
    }
}

fn run(
    registry: SharedLatest,
    stop: Arc<AtomicBool>,
    detector: impl ArmorDetector,
    solver: impl PnpSolver,
    config: DetectionConfig,
) {
    let span = tracing::info_span!("detection");
    let _enter = span.enter();
    tracing::info!("detection worker starting");

    let mut selector = Selector::new(config.selector_max_ttl);
    let mut last_camera_version = 0u64;
    let mut last_frame_ts: Option<Timestamp> = None;
    let mut last_robot_state: Option<RobotState> = None;

    while !stop.load(Ordering::Relaxed) {
        let cam_slot = registry.camera();
        let version = cam_slot.version();
        if version == last_camera_version || version == 0 {
            thread::sleep(POLL_BACKOFF);
            continue;
        }
        let Some(frame_snapshot) = cam_slot.snapshot() else {
            thread::sleep(POLL_BACKOFF);
            continue;
        };
        last_camera_version = version;
        let frame = &*frame_snapshot.value;

        let dt = last_frame_ts
            .map(|prev| frame.timestamp.saturating_sub(prev).as_secs_f64())
            .unwrap_or(0.0);
        last_frame_ts = Some(frame.timestamp);

        let (yaw_imu, pitch_imu) = registry
            .imu()
            .snapshot()
            .map(|s| {
                let rad = s.value.euler_angle.to_radians();
                (rad.yaw, rad.pitch)
            })
            .unwrap_or((0.0, 0.0));

        let raw_detections = detector.detect(frame);
        let world_detections: Vec<DetectionResult> = raw_detections
            .iter()
            .filter_map(|raw| to_world(raw, frame, &solver, yaw_imu, pitch_imu))
            .collect();

        let groups = form_robot(&world_detections);
        let previously_selected = selector.selected();
        let armors = selector.update(&groups, dt);

        if armors.is_empty() {
            continue;
        }
        let reacquired = previously_selected != selector.selected();

        let rs = if armors.len() == 1 {
            from_one_armor(
                last_robot_state.as_ref(),
                &armors[0],
                frame.timestamp,
                config.default_radius,
                reacquired,
            )
        } else {
            from_two_armors(&armors[0], &armors[1], frame.timestamp, reacquired)
        };

        last_robot_state = Some(rs);
        let published = registry.detection().publish(rs);
        tracing::debug!(version = published, class_id = rs.class_id.0, "published detection");
    }

    tracing::info!(version = registry.detection().version(), "detection worker stopping");
}
