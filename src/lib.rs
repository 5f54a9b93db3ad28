pub mod appearance;
pub mod bbox;
pub mod benchmark;
pub mod camshift;
pub mod color;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod math;
pub mod meanshift;
pub mod report;
pub mod source;
pub mod trace;
pub mod tracker;

pub use bbox::{BoundingBox, RotatedRect};
pub use benchmark::Benchmark;
pub use color::ColorSpace;
pub use detection::{Detection, DetectionTracker, Detector, ReplayDetector};
pub use error::{Error, InitializationError};
pub use frame::Frame;
pub use report::{BenchmarkResult, ErrorSummary, FrameRecord};
pub use source::FrameSource;
pub use tracker::{CamShiftTracker, HistogramTracker, MeanShiftTracker};

use nalgebra as na;

/// Single-target tracker contract.
///
/// `update` must be called with frames in sequence after a successful
/// `init`. A lost target is reported as `None` and does not end the track:
/// the next call may recover it.
pub trait Tracker: Send {
    fn name(&self) -> &str;

    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<(), InitializationError>;

    fn update(&mut self, frame: &Frame) -> Option<BoundingBox>;

    #[inline]
    fn center(&self, bbox: Option<&BoundingBox>) -> Option<na::Point2<f32>> {
        bbox.map(BoundingBox::center)
    }

    /// Back to the state before `init`
    fn reset(&mut self) {}
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    #[inline]
    fn name(&self) -> &str {
        (**self).name()
    }

    #[inline]
    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<(), InitializationError> {
        (**self).init(frame, bbox)
    }

    #[inline]
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        (**self).update(frame)
    }

    #[inline]
    fn center(&self, bbox: Option<&BoundingBox>) -> Option<na::Point2<f32>> {
        (**self).center(bbox)
    }

    #[inline]
    fn reset(&mut self) {
        (**self).reset()
    }
}
