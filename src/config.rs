use crate::bbox::BoundingBox;
use crate::detection::{DetectionTracker, ReplayDetector, DEFAULT_MIN_IOU};
use crate::error::Error;
use crate::source::DEFAULT_MAX_WIDTH;
use crate::tracker::{CamShiftTracker, HistogramConfig, MeanShiftTracker};
use crate::Tracker;

use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Picks the configuration whose output is the comparison baseline
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Labels starting with the prefix
    Prefix(String),
    /// Exactly this label
    Label(String),
}

impl Default for ReferencePolicy {
    fn default() -> Self {
        ReferencePolicy::Prefix("YOLOv8".into())
    }
}

impl ReferencePolicy {
    #[inline]
    pub fn matches(&self, label: &str) -> bool {
        match self {
            ReferencePolicy::Prefix(prefix) => label.starts_with(prefix.as_str()),
            ReferencePolicy::Label(name) => label == name,
        }
    }
}

fn default_min_iou() -> f32 {
    DEFAULT_MIN_IOU
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DetectionsConfig {
    /// Detection dump, one line per frame
    pub path: PathBuf,
    #[serde(default = "default_min_iou")]
    pub min_iou: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrackerConfig {
    CamShift(HistogramConfig),
    MeanShift(HistogramConfig),
    Detections(DetectionsConfig),
}

impl TrackerConfig {
    /// Detection dumps are read on first use, so a bad path fails that
    /// tracker's init rather than the whole run
    pub fn build(&self) -> Box<dyn Tracker> {
        let tracker: Box<dyn Tracker> = match self {
            TrackerConfig::CamShift(cfg) => Box::new(CamShiftTracker::from_config(*cfg)),
            TrackerConfig::MeanShift(cfg) => Box::new(MeanShiftTracker::from_config(*cfg)),
            TrackerConfig::Detections(cfg) => Box::new(
                DetectionTracker::new(ReplayDetector::deferred(cfg.path.clone()))
                    .with_min_iou(cfg.min_iou),
            ),
        };

        tracker
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LabeledTracker {
    pub label: String,
    pub tracker: TrackerConfig,
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

/// One benchmark run, usually read from a JSON file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub video_path: PathBuf,
    pub roi: BoundingBox,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    pub trackers: Vec<LabeledTracker>,
    #[serde(default)]
    pub reference: ReferencePolicy,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_json(s: &str) -> Result<Self, Error> {
        let config: RunConfig = serde_json::from_str(s)?;
        config.validate()?;

        Ok(config)
    }

    /// Reads a config file; relative paths inside it are taken relative to
    /// the file's directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut config = Self::from_json(&std::fs::read_to_string(path)?)?;

        if let Some(base) = path.parent() {
            config.rebase(base);
        }

        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let rebased = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };

        self.video_path = rebased(&self.video_path);
        for entry in &mut self.trackers {
            if let TrackerConfig::Detections(cfg) = &mut entry.tracker {
                cfg.path = rebased(&cfg.path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.roi.is_degenerate() {
            return Err(Error::Config(format!(
                "roi {:?} must have positive size",
                self.roi
            )));
        }

        if self.max_width == 0 {
            return Err(Error::Config("max_width must be positive".into()));
        }

        let roi = self.roi;
        let right = roi.x as i64 + roi.width as i64;
        let bottom = roi.y as i64 + roi.height as i64;
        if right > i32::MAX as i64 || bottom > i32::MAX as i64 {
            return Err(Error::Config(format!("roi {:?} overflows frame coordinates", roi)));
        }

        // frames reaching the trackers are at most `max_width` wide
        if right <= 0 || bottom <= 0 || roi.x as i64 >= self.max_width as i64 {
            return Err(Error::Config(format!(
                "roi {:?} lies outside any frame at most {} pixels wide",
                roi, self.max_width
            )));
        }

        if self.trackers.is_empty() {
            return Err(Error::Config("no trackers configured".into()));
        }

        let mut seen = HashSet::new();
        for entry in &self.trackers {
            if !seen.insert(entry.label.as_str()) {
                return Err(Error::Config(format!("duplicate label {:?}", entry.label)));
            }
        }

        Ok(())
    }
}
