//! The particle-filter kernel interface and a reference bootstrap-filter implementation
//! (SPEC_FULL.md §4.5, §6).

use gimbal_types::{state_index, PfState, RobotState, TrackId, Timestamp};
use nalgebra::SVector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// The core's view of a particle filter: opaque process-local state that folds in measurements
/// and predicts forward. The core ships [`BootstrapPfKernel`] as the default; a CUDA-backed kernel
/// (out of scope here) would implement the same trait.
pub trait PfKernel {
    fn reset(&mut self, meas: &RobotState);
    fn predict(&mut self, dt: f64);
    fn step(&mut self, meas: &RobotState, dt: f64);
    fn mean(&self) -> RobotState;
}

/// Per-dimension standard deviation of the process noise added on every predict step.
#[derive(Debug, Clone, Copy)]
pub struct ProcessNoise {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub yaw: f64,
    pub yaw_rate: f64,
    pub yaw_acc: f64,
}

impl Default for ProcessNoise {
    fn default() -> Self {
        ProcessNoise {
            position: 0.01,
            velocity: 0.05,
            acceleration: 0.2,
            yaw: 0.01,
            yaw_rate: 0.05,
            yaw_acc: 0.2,
        }
    }
}

/// Rao-Blackwellised-style bootstrap particle filter over the 15-slot [`RobotState`] vector, with
/// systematic resampling. Default particle count 10,000 per SPEC_FULL.md §4.5.
pub struct BootstrapPfKernel {
    particles: Vec<SVector<f64, 15>>,
    weights: Vec<f64>,
    rng: ChaCha8Rng,
    process_noise: ProcessNoise,
    measurement_std: f64,
    class_id: TrackId,
    timestamp: Timestamp,
    has_state: bool,
}

impl BootstrapPfKernel {
    pub fn new(particle_count: usize, seed: u64, process_noise: ProcessNoise, measurement_std: f64) -> Self {
        assert!(particle_count > 0, "particle count must be positive");
        BootstrapPfKernel {
            particles: vec![SVector::<f64, 15>::zeros(); particle_count],
            weights: vec![1.0 / particle_count as f64; particle_count],
            rng: ChaCha8Rng::seed_from_u64(seed),
            process_noise,
            measurement_std,
            class_id: TrackId(0),
            timestamp: Timestamp::default(),
            has_state: false,
        }
    }

    fn gaussian(&mut self, std: f64) -> f64 {
        if std <= 0.0 {
            return 0.0;
        }
        // Box-Muller, avoiding log(0) by sampling u1 from (0, 1].
        let u1: f64 = 1.0 - self.rng.random::<f64>();
        let u2: f64 = self.rng.random::<f64>();
        std * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    fn propagate_one(&mut self, particle: &mut SVector<f64, 15>, dt: f64) {
        let (x, y, z) = (particle[state_index::X], particle[state_index::Y], particle[state_index::Z]);
        let (vx, vy, vz) = (particle[state_index::VX], particle[state_index::VY], particle[state_index::VZ]);
        let (ax, ay, az) = (particle[state_index::AX], particle[state_index::AY], particle[state_index::AZ]);

        particle[state_index::X] = x + vx * dt + 0.5 * ax * dt * dt;
        particle[state_index::Y] = y + vy * dt + 0.5 * ay * dt * dt;
        particle[state_index::Z] = z + vz * dt + 0.5 * az * dt * dt;
        particle[state_index::VX] = vx + ax * dt;
        particle[state_index::VY] = vy + ay * dt;
        particle[state_index::VZ] = vz + az * dt;

        let yaw = particle[state_index::YAW];
        let yaw_rate = particle[state_index::YAW_RATE];
        let yaw_acc = particle[state_index::YAW_ACC];
        particle[state_index::YAW] = yaw + yaw_rate * dt + 0.5 * yaw_acc * dt * dt;
        particle[state_index::YAW_RATE] = yaw_rate + yaw_acc * dt;

        particle[state_index::X] += self.gaussian(self.process_noise.position);
        particle[state_index::Y] += self.gaussian(self.process_noise.position);
        particle[state_index::Z] += self.gaussian(self.process_noise.position);
        particle[state_index::VX] += self.gaussian(self.process_noise.velocity);
        particle[state_index::VY] += self.gaussian(self.process_noise.velocity);
        particle[state_index::VZ] += self.gaussian(self.process_noise.velocity);
        particle[state_index::AX] += self.gaussian(self.process_noise.acceleration);
        particle[state_index::AY] += self.gaussian(self.process_noise.acceleration);
        particle[state_index::AZ] += self.gaussian(self.process_noise.acceleration);
        particle[state_index::YAW] += self.gaussian(self.process_noise.yaw);
        particle[state_index::YAW_RATE] += self.gaussian(self.process_noise.yaw_rate);
        particle[state_index::YAW_ACC] += self.gaussian(self.process_noise.yaw_acc);
    }

    fn weight_against(&mut self, meas: &RobotState) {
        let meas_pos = meas.position();
        let meas_yaw = meas.yaw();
        let std = self.measurement_std.max(1e-6);
        let mut total = 0.0;
        for (particle, weight) in self.particles.iter().zip(self.weights.iter_mut()) {
            let dx = particle[state_index::X] - meas_pos.x;
            let dy = particle[state_index::Y] - meas_pos.y;
            let dz = particle[state_index::Z] - meas_pos.z;
            let dyaw = particle[state_index::YAW] - meas_yaw;
            let sq = (dx * dx + dy * dy + dz * dz + dyaw * dyaw) / (std * std);
            let likelihood = (-0.5 * sq).exp();
            *weight *= likelihood.max(1e-300);
            total += *weight;
        }
        if total > 0.0 {
            for weight in &mut self.weights {
                *weight /= total;
            }
        } else {
            let n = self.weights.len() as f64;
            self.weights.fill(1.0 / n);
        }
        self.systematic_resample();
    }

    /// Systematic resampling: low-variance, O(n), replaces the particle set with `n` draws from
    /// the weighted empirical distribution and resets weights to uniform.
    fn systematic_resample(&mut self) {
        let n = self.particles.len();
        let mut cumulative = Vec::with_capacity(n);
        let mut acc = 0.0;
        for w in &self.weights {
            acc += w;
            cumulative.push(acc);
        }
        let start: f64 = self.rng.random::<f64>() / n as f64;
        let mut resampled = Vec::with_capacity(n);
        let mut j = 0;
        for i in 0..n {
            let target = start + i as f64 / n as f64;
            while j + 1 < n && cumulative[j] < target {
                j += 1;
            }
            resampled.push(self.particles[j]);
        }
        self.particles = resampled;
        self.weights.fill(1.0 / n as f64);
    }
}

impl PfKernel for BootstrapPfKernel {
    fn reset(&mut self, meas: &RobotState) {
        for particle in &mut self.particles {
            *particle = meas.state;
        }
        let n = self.weights.len() as f64;
        self.weights.fill(1.0 / n);
        self.class_id = meas.class_id;
        self.timestamp = meas.timestamp;
        self.has_state = true;
    }

    fn predict(&mut self, dt: f64) {
        if !self.has_state {
            return;
        }
        for i in 0..self.particles.len() {
            let mut particle = self.particles[i];
            self.propagate_one(&mut particle, dt);
            self.particles[i] = particle;
        }
    }

    fn step(&mut self, meas: &RobotState, dt: f64) {
        if !self.has_state {
            self.reset(meas);
            return;
        }
        self.predict(dt);
        self.weight_against(meas);
        self.class_id = meas.class_id;
        self.timestamp = meas.timestamp;
    }

    fn mean(&self) -> RobotState {
        let mut state = SVector::<f64, 15>::zeros();
        for (particle, weight) in self.particles.iter().zip(self.weights.iter()) {
            state += *particle * *weight;
        }
        RobotState {
            class_id: self.class_id,
            timestamp: self.timestamp,
            pf_state: PfState::Measurement,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimbal_types::TrackId;
    use nalgebra::Vector3;
    use std::time::Duration;

    fn meas_state(x: f64, timestamp: Duration) -> RobotState {
        let mut rs = RobotState::zeroed(TrackId(1), timestamp, 0.15);
        rs.set_position(Vector3::new(x, 0.0, 2.0));
        rs
    }

    #[test]
    fn reset_collapses_all_particles_onto_the_measurement() {
        let mut kernel = BootstrapPfKernel::new(200, 42, ProcessNoise::default(), 0.05);
        let meas = meas_state(1.0, Duration::from_millis(100));
        kernel.reset(&meas);
        let mean = kernel.mean();
        assert!((mean.position() - meas.position()).norm() < 1e-9);
        assert_eq!(mean.timestamp, meas.timestamp);
    }

    #[test]
    fn repeated_steps_track_a_slowly_moving_measurement() {
        let mut kernel = BootstrapPfKernel::new(500, 7, ProcessNoise::default(), 0.05);
        kernel.reset(&meas_state(0.0, Duration::from_millis(0)));
        for i in 1..=20 {
            let meas = meas_state(0.01 * i as f64, Duration::from_millis(10 * i));
            kernel.step(&meas, 0.01);
        }
        let mean = kernel.mean();
        assert!((mean.position().x - 0.2).abs() < 0.05, "mean.x = {}", mean.position().x);
    }

    #[test]
    fn predict_only_does_not_panic_before_any_reset() {
        let mut kernel = BootstrapPfKernel::new(50, 1, ProcessNoise::default(), 0.05);
        kernel.predict(0.01);
        let mean = kernel.mean();
        assert_eq!(mean.position(), Vector3::zeros());
    }
}
