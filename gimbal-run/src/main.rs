//! Main pipeline binary: loads configuration, spawns the six worker threads described in
//! SPEC_FULL.md §4, and runs until an operator-issued quit or a fatal startup error.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gimbal_config::Config;
use gimbal_drivers::{FixedDetector, FixedPnpSolver, ReplayCameraDriver, ReplayImuDriver};
use gimbal_pf::{BootstrapPfKernel, ProcessNoise};
use gimbal_predict::{PredictConfig as PredictorConfig, Predictor};
use gimbal_registry::{SharedLatest, SharedScalars};
use gimbal_serial::{LoopbackPort, RealSerialPort};
use gimbal_vision::DetectionConfig as DetectorConfig;

const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);
const SERIAL_OPEN_TIMEOUT: Duration = Duration::from_millis(200);

/// Errors that change the process exit code, per SPEC_FULL.md §6.
#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] gimbal_config::ConfigError),
    #[error("invalid override {key}={value}: {reason}")]
    Override { key: String, value: String, reason: String },
    #[error("failed to open serial device {device_path}: {source}")]
    SerialOpen {
        device_path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// 2 for bad configuration, 1 for a failed device open on a required transport.
    fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) | PipelineError::Override { .. } => 2,
            PipelineError::SerialOpen { .. } => 1,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gimbal-run", about = "aim-and-fire pipeline runtime")]
struct Opt {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "gimbal.yaml")]
    config: PathBuf,
    /// Repeatable `dotted.key=value` override, applied after the config file loads.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
    /// Use an in-process loopback serial port instead of opening a real device — for running the
    /// pipeline without gimbal hardware attached.
    #[arg(long)]
    replay_serial: bool,
}

fn load_config(opt: &Opt) -> Result<Config, PipelineError> {
    let mut config = if opt.config.exists() {
        gimbal_config::parse_config_file(&opt.config)?
    } else {
        tracing::warn!(path = %opt.config.display(), "config file not found, using defaults");
        Config::default()
    };

    for assignment in &opt.overrides {
        let (key, value) = assignment.split_once('=').ok_or_else(|| PipelineError::Override {
            key: assignment.clone(),
            value: String::new(),
            reason: "expected KEY=VALUE".to_string(),
        })?;
        gimbal_config::apply_override(&mut config, key, value).map_err(|err| PipelineError::Override {
            key: key.to_string(),
            value: value.to_string(),
            reason: err.to_string(),
        })?;
    }
    Ok(config)
}

fn run(opt: Opt) -> Result<(), PipelineError> {
    let config = load_config(&opt)?;

    let (_log_guard, filter_handle) = gimbal_config::init(&config.logs.level);
    let stop = Arc::new(AtomicBool::new(false));

    if opt.config.exists() {
        let _ = gimbal_config::spawn_reload_watcher(
            opt.config.clone(),
            filter_handle,
            CONFIG_POLL_INTERVAL,
            stop.clone(),
        );
    }

    tracing::info!("gimbal-run starting");

    let registry = SharedLatest::new();
    let scalars = Arc::new(SharedScalars::new(config.predict.initial_bullet_speed));

    // No vendor camera SDK or YOLO model is linked into this workspace; the replay/fixed
    // implementations in gimbal-drivers stand in for them (SPEC_FULL.md §6 external interfaces).
    let camera_driver = ReplayCameraDriver::blank(640, 480);
    let imu_driver = ReplayImuDriver::level();
    let detector = FixedDetector::default();
    let solver = FixedPnpSolver::new();

    let serial_port_real;
    let serial_port_loopback;
    if opt.replay_serial {
        serial_port_loopback = Some(LoopbackPort::pair().0);
        serial_port_real = None;
    } else {
        serial_port_real = Some(
            RealSerialPort::open(&config.serial.device_path, config.serial.baud_rate, SERIAL_OPEN_TIMEOUT).map_err(
                |source| PipelineError::SerialOpen {
                    device_path: config.serial.device_path.clone(),
                    source,
                },
            )?,
        );
        serial_port_loopback = None;
    }

    let process_noise = ProcessNoise::default();
    let pf_kernel = BootstrapPfKernel::new(
        config.pf.particle_count,
        config.pf.seed,
        process_noise,
        config.pf.measurement_std,
    );

    let predictor = Predictor::new(
        PredictorConfig {
            smoothing_alpha: config.predict.smoothing_alpha,
            t_gimbal_actuation: config.predict.t_gimbal_actuation,
            tolerance_coeff: config.predict.tolerance_coeff,
            chase_distance: config.predict.chase_distance,
            limits: config.gimbal_limits.clone(),
        },
        config.predict.initial_bullet_speed,
        0.0,
    );

    let detection_config = DetectorConfig {
        default_radius: config.detection.default_radius,
        selector_max_ttl: config.detection.selector_max_ttl,
    };

    // Spawned in dependency order; joined in the reverse order on shutdown (SPEC_FULL.md §5).
    let camera_handle = gimbal_drivers::spawn_camera(registry.clone(), stop.clone(), camera_driver)
        .expect("spawn camera worker");
    let imu_handle =
        gimbal_drivers::spawn_imu(registry.clone(), stop.clone(), imu_driver).expect("spawn imu worker");
    let detection_handle =
        gimbal_vision::spawn(registry.clone(), stop.clone(), detector, solver, detection_config)
            .expect("spawn detection worker");
    let pf_handle = gimbal_pf::spawn(registry.clone(), stop.clone(), pf_kernel).expect("spawn pf worker");
    let prediction_handle = gimbal_predict::spawn(registry.clone(), scalars.clone(), stop.clone(), predictor)
        .expect("spawn prediction worker");
    let usb_handle = if let Some(port) = serial_port_real {
        gimbal_serial::spawn(registry.clone(), scalars.clone(), stop.clone(), port).expect("spawn usb worker")
    } else {
        gimbal_serial::spawn(
            registry.clone(),
            scalars.clone(),
            stop.clone(),
            serial_port_loopback.expect("loopback port built when replay_serial is set"),
        )
        .expect("spawn usb worker")
    };

    wait_for_quit();

    tracing::info!("shutdown requested, stopping workers");
    stop.store(true, Ordering::Relaxed);

    usb_handle.join().expect("usb worker panicked");
    prediction_handle.join().expect("prediction worker panicked");
    pf_handle.join().expect("pf worker panicked");
    detection_handle.join().expect("detection worker panicked");
    imu_handle.join().expect("imu worker panicked");
    camera_handle.join().expect("camera worker panicked");

    tracing::info!("gimbal-run stopped");
    Ok(())
}

/// Blocks until the operator types `quit` (or anything) followed by Enter, or stdin closes.
/// Mirrors running an interactive pipeline binary from a terminal rather than as a daemon.
fn wait_for_quit() {
    println!("gimbal-run is running; press Enter (or type quit) to stop.");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}

fn main() {
    let opt = Opt::parse();
    match run(opt) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("gimbal-run: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
