//! Tracking data types shared by the optimizer and the tracker.

mod landmark;
mod observation;

pub use landmark::*;
pub use observation::*;
