//! The USB worker: TX of gimbal commands edge-triggered on `prediction.version`, plus an RX path
//! parsing bullet-speed reports from the MCU (SPEC_FULL.md §4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gimbal_registry::{SharedLatest, SharedScalars};

use crate::frame::{decode_rx, encode_tx, RX_FRAME_LEN};
use crate::port::SerialPort;

const POLL_BACKOFF: Duration = Duration::from_millis(1);

pub fn spawn(
    registry: SharedLatest,
    scalars: Arc<SharedScalars>,
    stop: Arc<AtomicBool>,
    port: impl SerialPort + 'static,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("usb".to_string())
        .spawn(move || run(registry, scalars, stop, port))
}

fn run(registry: SharedLatest, scalars: Arc<SharedScalars>, stop: Arc<AtomicBool>, mut port: impl SerialPort) {
    let span = tracing::info_span!("usb");
    let _enter = span.enter();
    tracing::info!("usb worker starting");

    let mut last_prediction_version = 0u64;
    let mut rx_buf = [0u8; RX_FRAME_LEN];

    while !stop.load(Ordering::Relaxed) {
        let prediction_slot = registry.prediction();
        let version = prediction_slot.version();
        if version != last_prediction_version && version != 0 {
            if let Some(snapshot) = prediction_slot.snapshot() {
                last_prediction_version = version;
                let out = &*snapshot.value;
                let frame = encode_tx(out.yaw_cmd as f32, out.pitch_cmd as f32, out.fire);
                if let Err(err) = port.write_all(&frame) {
                    tracing::warn!(%err, "serial write failed");
                }
            }
        }

        match port.read(&mut rx_buf) {
            Ok(n) if n >= RX_FRAME_LEN => match decode_rx(&rx_buf[..n]) {
                Ok(speed) => scalars.set_bullet_speed(speed as f64),
                Err(err) => tracing::debug!(%err, "dropped malformed rx frame"),
            },
            Ok(_) => {}
            Err(err) => tracing::debug!(%err, "serial read failed"),
        }

        if version == last_prediction_version {
            thread::sleep(POLL_BACKOFF);
        }
    }

    tracing::info!(version = registry.prediction().version(), "usb worker stopping");
}
