//! Detection-stage domain logic: armor grouping, target selection, and pose reconstruction
//! (SPEC_FULL.md §4.4), plus the worker loop that wires them to the shared registry.

pub mod grouping;
pub mod pose;
pub mod selector;
pub mod worker;

pub use grouping::{form_robot, ArmorGroup};
pub use pose::{from_one_armor, from_two_armors};
pub use selector::Selector;
pub use worker::{spawn, DetectionConfig};
