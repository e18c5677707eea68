//! Recording of road-snapped tracks from raw device fixes.

mod recorder;
mod subscription;
mod tracker;

pub use recorder::{Recorder, SharedRecorder, Status};
pub use subscription::Subscription;
pub use tracker::{follow, Outcome, PositionSource, RoadSnapper, Tracker};
#[cfg(test)]
pub(crate) use tracker::stubs;
