//! One-shot calibration tool: guides the operator through recording the gimbal's pitch (and,
//! optionally, yaw) travel limits and writes a `GimbalLimits` TOML file (SPEC_FULL.md §6).

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use gimbal_drivers::{ImuDriver, ReplayImuDriver};
use gimbal_predict::GimbalLimits;

#[derive(Parser, Debug)]
#[command(name = "gimbal-calib")]
struct Opt {
    /// Where to write the resulting GimbalLimits TOML file.
    #[arg(long, default_value = "gimbal-limits.toml")]
    output: std::path::PathBuf,
    /// Number of IMU samples to median over at each limit.
    #[arg(long, default_value_t = 50)]
    samples: usize,
    /// Whether the gimbal also has hard yaw stops (most turrets free-spin in yaw).
    #[arg(long)]
    has_yaw_limits: bool,
    /// Safety margin (radians) subtracted from both ends of each recorded range.
    #[arg(long, default_value_t = 0.02)]
    safety_margin: f64,
}

fn median(mut samples: Vec<f64>) -> f64 {
    samples.sort_by(|a, b| a.total_cmp(b));
    samples[samples.len() / 2]
}

fn prompt_and_sample(imu: &mut impl ImuDriver, prompt: &str, count: usize) -> anyhow::Result<f64> {
    println!("{prompt} Press Enter when the gimbal is in position.");
    let mut line = String::new();
    std::io::stdout().flush()?;
    std::io::stdin().read_line(&mut line)?;

    let mut pitches = Vec::with_capacity(count);
    for _ in 0..count {
        let (euler, _sample_time) = imu.read(Duration::from_millis(200))?;
        pitches.push(euler.to_radians().pitch);
    }
    Ok(median(pitches))
}

fn main() -> anyhow::Result<()> {
    let (_guard, _handle) = gimbal_config::init("info");
    let opt = Opt::parse();

    tracing::info!("gimbal-calib starting, {} samples per limit", opt.samples);

    // Out-of-scope hardware IMU is modeled here by the same replay driver the pipeline ships for
    // tests; a real deployment swaps in a hardware-backed ImuDriver (SPEC_FULL.md §6).
    let mut imu = ReplayImuDriver::level();

    let pitch_min = prompt_and_sample(&mut imu, "Move the gimbal to its minimum pitch.", opt.samples)?;
    let pitch_max = prompt_and_sample(&mut imu, "Move the gimbal to its maximum pitch.", opt.samples)?;

    let (yaw_min, yaw_max) = if opt.has_yaw_limits {
        let min = prompt_and_sample(&mut imu, "Move the gimbal to its minimum yaw.", opt.samples)?;
        let max = prompt_and_sample(&mut imu, "Move the gimbal to its maximum yaw.", opt.samples)?;
        (min, max)
    } else {
        (-std::f64::consts::PI, std::f64::consts::PI)
    };

    let limits = GimbalLimits {
        pitch_min: pitch_min.min(pitch_max),
        pitch_max: pitch_min.max(pitch_max),
        yaw_min,
        yaw_max,
        has_yaw_limits: opt.has_yaw_limits,
        safety_margin: opt.safety_margin,
    };

    let toml_text = toml::to_string_pretty(&limits)?;
    std::fs::write(&opt.output, toml_text)?;
    tracing::info!(path = %opt.output.display(), "wrote gimbal limits");
    println!("Wrote {}", opt.output.display());
    Ok(())
}
