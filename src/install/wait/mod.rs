//! Bounded polling against live cluster state.

pub mod crd;
pub mod readiness;

pub use crd::CrdWaiter;
pub use readiness::{ReadinessProbe, ReadinessWaiter};
