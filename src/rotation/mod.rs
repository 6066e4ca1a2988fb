//! Measurement scheduling and rotation.
//!
//! The rotation state is never persisted on its own: [`estimate`] folds the
//! durable result log into a run number on every iteration, and [`plan`]
//! turns that number plus the current configuration into the ordered probe
//! list. Restarts, crashes, and configuration changes therefore can never
//! desynchronize planning from what was actually measured.

pub mod estimate;
pub mod plan;

pub use self::estimate::estimate;
pub use self::plan::{plan, Target};
