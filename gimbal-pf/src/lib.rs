//! Particle-filter stage: the `PfKernel` trait, a reference bootstrap-filter implementation, and
//! the 100 Hz worker that drives it (SPEC_FULL.md §4.5).

pub mod kernel;
pub mod worker;

pub use kernel::{BootstrapPfKernel, PfKernel, ProcessNoise};
pub use worker::{spawn, K_DT};
