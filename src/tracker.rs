use crate::appearance::{AppearanceModel, DEFAULT_TOLERANCE};
use crate::bbox::BoundingBox;
use crate::camshift::CamShift;
use crate::color::ColorSpace;
use crate::error::InitializationError;
use crate::frame::Frame;
use crate::meanshift::{MeanShift, TermCriteria};
use crate::Tracker;

use log::{debug, info};
use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};

/// Mode seeking over a back-projected probability map
pub trait WindowSearch: Send {
    const NAME: &'static str;

    /// Next window starting from `window`, `None` when the target is lost
    fn search(
        &self,
        prob: ArrayView2<'_, f32>,
        window: BoundingBox,
        criteria: &TermCriteria,
    ) -> Option<BoundingBox>;
}

/// Mutable per-track state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackState {
    /// Search window for the next frame
    pub window: BoundingBox,
    /// Number of update calls since init
    pub frames: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct HistogramConfig {
    pub color_space: ColorSpace,
    pub criteria: TermCriteria,
    pub tolerance: f32,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Hsv,
            criteria: TermCriteria::default(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Tracker driven by a fixed color histogram of the initial region
#[derive(Debug, Clone)]
pub struct HistogramTracker<S> {
    search: S,
    config: HistogramConfig,
    model: Option<AppearanceModel>,
    state: Option<TrackState>,
}

pub type CamShiftTracker = HistogramTracker<CamShift>;
pub type MeanShiftTracker = HistogramTracker<MeanShift>;

impl<S: WindowSearch + Default> HistogramTracker<S> {
    pub fn new(space: ColorSpace) -> Self {
        Self::from_config(HistogramConfig {
            color_space: space,
            ..Default::default()
        })
    }

    pub fn from_config(config: HistogramConfig) -> Self {
        Self {
            search: S::default(),
            config,
            model: None,
            state: None,
        }
    }
}

impl<S: WindowSearch> HistogramTracker<S> {
    pub fn with_criteria(mut self, criteria: TermCriteria) -> Self {
        self.config.criteria = criteria;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    #[inline]
    pub fn config(&self) -> &HistogramConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> Option<&TrackState> {
        self.state.as_ref()
    }

    #[inline]
    pub fn model(&self) -> Option<&AppearanceModel> {
        self.model.as_ref()
    }
}

impl<S: WindowSearch> Tracker for HistogramTracker<S> {
    fn name(&self) -> &str {
        S::NAME
    }

    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<(), InitializationError> {
        self.reset();

        let model =
            AppearanceModel::build(frame, &bbox, self.config.color_space, self.config.tolerance)?;
        let (width, height) = frame.dims();

        self.model = Some(model);
        self.state = Some(TrackState {
            window: bbox.clip(width, height),
            frames: 0,
        });

        info!(
            "{} initialized on {:?} in {:?}",
            S::NAME,
            bbox,
            self.config.color_space
        );

        Ok(())
    }

    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        let (model, state) = match (&self.model, &mut self.state) {
            (Some(model), Some(state)) => (model, state),
            _ => {
                debug!("{} updated before init", S::NAME);
                return None;
            }
        };

        let prob = model.back_project(frame);
        state.frames += 1;

        match self.search.search(prob.view(), state.window, &self.config.criteria) {
            Some(found) => {
                state.window = found;
                Some(found)
            }
            None => {
                debug!("{} lost target at frame {}", S::NAME, state.frames);
                None
            }
        }
    }

    fn reset(&mut self) {
        self.model = None;
        self.state = None;
    }
}
