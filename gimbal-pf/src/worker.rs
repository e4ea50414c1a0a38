//! The 100 Hz particle-filter worker (SPEC_FULL.md §4.5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use gimbal_registry::SharedLatest;
use gimbal_types::PfState;

use crate::kernel::PfKernel;

/// Fixed PF tick period (SPEC_FULL.md §4.5).
pub const K_DT: Duration = Duration::from_millis(10);

/// Spawn the PF worker on its own OS thread. Uses absolute-deadline sleep so scheduling jitter
/// does not accumulate drift; an overrun tick proceeds immediately without skipping ahead.
pub fn spawn<K>(registry: SharedLatest, stop: Arc<AtomicBool>, kernel: K) -> std::io::Result<JoinHandle<()>>
where
    K: PfKernel + Send + 'static,
{
    thread::Builder::new()
        .name("pf".to_string())
        .spawn(move || run(registry, stop, kernel))
}

fn run(registry: SharedLatest, stop: Arc<AtomicBool>, mut kernel: impl PfKernel) {
    let span = tracing::info_span!("pf");
    let _enter = span.enter();
    tracing::info!("pf worker starting");

    let mut last_detection_version = 0u64;
    let mut next_tick = Instant::now() + K_DT;
    let dt_secs = K_DT.as_secs_f64();

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now < next_tick {
            thread::sleep(next_tick - now);
        }
        next_tick += K_DT;

        let detection_slot = registry.detection();
        let version = detection_slot.version();
        if version != last_detection_version {
            if let Some(snapshot) = detection_slot.snapshot() {
                last_detection_version = version;
                let meas = &*snapshot.value;
                if meas.pf_state == PfState::Reset {
                    kernel.reset(meas);
                } else {
                    kernel.step(meas, dt_secs);
                }
            } else {
                kernel.predict(dt_secs);
            }
        } else {
            kernel.predict(dt_secs);
        }

        let published = registry.pf().publish(kernel.mean());
        tracing::trace!(version = published, "published pf mean");
    }

    tracing::info!(version = registry.pf().version(), "pf worker stopping");
}
