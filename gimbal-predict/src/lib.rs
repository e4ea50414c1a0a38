//! Lead-time prediction: motion model, ballistic drop, gimbal-limit policy, and the worker that
//! drives them (SPEC_FULL.md §4.6).

pub mod limits;
pub mod motion;
pub mod predictor;
pub mod worker;

pub use limits::GimbalLimits;
pub use motion::{lead_time, motion_model};
pub use predictor::{PredictConfig, Predictor};
pub use worker::spawn;
