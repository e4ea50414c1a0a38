//! The Prediction worker, edge-triggered on `pf.version` (SPEC_FULL.md §4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gimbal_registry::{SharedLatest, SharedScalars};

use crate::predictor::Predictor;

const POLL_BACKOFF: Duration = Duration::from_millis(1);

pub fn spawn(
    registry: SharedLatest,
    scalars: Arc<SharedScalars>,
    stop: Arc<AtomicBool>,
    predictor: Predictor,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("prediction".to_string())
        .spawn(move || run(registry, scalars, stop, predictor))
}

fn run(registry: SharedLatest, scalars: Arc<SharedScalars>, stop: Arc<AtomicBool>, mut predictor: Predictor) {
    let span = tracing::info_span!("prediction");
    let _enter = span.enter();
    tracing::info!("prediction worker starting");

    let mut last_pf_version = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let pf_slot = registry.pf();
        let version = pf_slot.version();
        if version == last_pf_version || version == 0 {
            thread::sleep(POLL_BACKOFF);
            continue;
        }
        let Some(snapshot) = pf_slot.snapshot() else {
            thread::sleep(POLL_BACKOFF);
            continue;
        };
        last_pf_version = version;
        let rs = &*snapshot.value;

        let (yaw_imu, pitch_imu) = registry
            .imu()
            .snapshot()
            .map(|s| {
                let rad = s.value.euler_angle.to_radians();
                (rad.yaw, rad.pitch)
            })
            .unwrap_or((0.0, 0.0));

        let out = predictor.update(rs, yaw_imu, pitch_imu, scalars.bullet_speed());
        let published = registry.prediction().publish(out);
        tracing::debug!(version = published, fire = out.fire, chase = out.chase, "published prediction");
    }

    tracing::info!(version = registry.prediction().version(), "prediction worker stopping");
}
