use crate::bbox::BoundingBox;
use crate::error::{Error, InitializationError};
use crate::frame::Frame;
use crate::Tracker;

use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Minimal IoU for a detection to continue the current track
pub const DEFAULT_MIN_IOU: f32 = 0.1;

/// Contains (x,y) of the center and (width,height) of bbox
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p", default)]
    pub confidence: f32,
    #[serde(rename = "c", default)]
    pub class: i32,
}

impl Detection {
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        let c = bbox.center();

        Self {
            x: c.x,
            y: c.y,
            w: bbox.width as f32,
            h: bbox.height as f32,
            confidence: 1.0,
            class: 0,
        }
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let b1_area = (self.w + 1.) * (self.h + 1.);
        let (xmin, xmax, ymin, ymax) = (self.xmin(), self.xmax(), self.ymin(), self.ymax());

        let b2_area = (other.w + 1.) * (other.h + 1.);

        let i_xmin = xmin.max(other.xmin());
        let i_xmax = xmax.min(other.xmax());
        let i_ymin = ymin.max(other.ymin());
        let i_ymax = ymax.min(other.ymax());
        let i_area = (i_xmax - i_xmin + 1.).max(0.) * (i_ymax - i_ymin + 1.).max(0.);

        (i_area) / (b1_area + b2_area - i_area)
    }

    /// Integer box from the truncated corners
    #[inline]
    pub fn bbox(&self) -> BoundingBox {
        let (x1, y1) = (self.xmin() as i32, self.ymin() as i32);
        let (x2, y2) = (self.xmax() as i32, self.ymax() as i32);

        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline(always)]
    pub fn xmax(&self) -> f32 {
        self.x + self.w / 2.
    }

    #[inline(always)]
    pub fn ymax(&self) -> f32 {
        self.y + self.h / 2.
    }

    #[inline(always)]
    pub fn xmin(&self) -> f32 {
        self.x - self.w / 2.
    }

    #[inline(always)]
    pub fn ymin(&self) -> f32 {
        self.y - self.h / 2.
    }
}

/// Per-frame object detector
pub trait Detector: Send {
    fn name(&self) -> &str {
        "Detector"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error>;

    /// Drops any state carried between frames
    fn reset(&mut self) {}
}

/// Plays back detections dumped earlier, one line per frame:
/// `<timestamp>:<json array of detections>`.
///
/// A line without `:` holds no detections. Frames past the end of the dump
/// have no detections either.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
    pending: Option<PathBuf>,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames,
            cursor: 0,
            pending: None,
        }
    }

    /// Reads the dump at `path` on the first `detect` call. A missing or
    /// unreadable dump surfaces as a detection error at that point.
    pub fn deferred<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            pending: Some(path.into()),
            ..Default::default()
        }
    }

    fn load_pending(&mut self) -> Result<(), Error> {
        if let Some(path) = &self.pending {
            let loaded = Self::open(path).map_err(|err| {
                Error::Config(format!("detection dump {}: {}", path.display(), err))
            })?;

            self.frames = loaded.frames;
            self.pending = None;
        }

        Ok(())
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        let detector = Self::from_reader(BufReader::new(file))?;

        info!(
            "loaded {} frames of detections from {}",
            detector.len(),
            path.as_ref().display()
        );

        Ok(detector)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut frames = Vec::new();

        for (no, line) in reader.lines().enumerate() {
            let line = line?;

            let dets = match line.find(':') {
                Some(idx) => {
                    let (_, vector) = line.split_at(idx + 1);
                    match serde_json::from_str(vector.trim()) {
                        Ok(dets) => dets,
                        Err(err) => {
                            warn!("wrong file format at line {}: {}", no + 1, err);
                            Vec::new()
                        }
                    }
                }
                None => Vec::new(),
            };

            frames.push(dets);
        }

        Ok(Self::new(frames))
    }

    /// Number of recorded frames, zero while a deferred dump is not loaded
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn name(&self) -> &str {
        "Replay"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Error> {
        self.load_pending()?;

        let dets = self.frames.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;

        Ok(dets)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Follows a single detection chosen near the region of interest
#[derive(Debug, Clone)]
pub struct DetectionTracker<D> {
    detector: D,
    min_iou: f32,
    current: Option<Detection>,
}

impl<D: Detector> DetectionTracker<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            min_iou: DEFAULT_MIN_IOU,
            current: None,
        }
    }

    pub fn with_min_iou(mut self, min_iou: f32) -> Self {
        self.min_iou = min_iou;
        self
    }

    #[inline]
    pub fn current(&self) -> Option<&Detection> {
        self.current.as_ref()
    }
}

impl<D: Detector> Tracker for DetectionTracker<D> {
    fn name(&self) -> &str {
        self.detector.name()
    }

    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> Result<(), InitializationError> {
        self.current = None;

        if bbox.is_degenerate() {
            return Err(InitializationError::DegenerateRegion { bbox });
        }

        let dets = self
            .detector
            .detect(frame)
            .map_err(|err| InitializationError::Detector(err.to_string()))?;

        let c = bbox.center();
        let (w, h) = (bbox.width as f32, bbox.height as f32);

        let target = dets
            .into_iter()
            .filter(|d| (d.x - c.x).abs() < w && (d.y - c.y).abs() < h)
            .min_by(|a, b| {
                let da = (a.x - c.x).powi(2) + (a.y - c.y).powi(2);
                let db = (b.x - c.x).powi(2) + (b.y - c.y).powi(2);
                da.total_cmp(&db)
            })
            .ok_or(InitializationError::NoTarget)?;

        debug!("{} locked on {:?}", self.detector.name(), target);
        self.current = Some(target);

        Ok(())
    }

    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        let current = self.current?;

        let dets = match self.detector.detect(frame) {
            Ok(dets) => dets,
            Err(err) => {
                warn!("{} failed on frame {}: {}", self.detector.name(), frame.index, err);
                return None;
            }
        };

        let (score, best) = dets
            .into_iter()
            .map(|d| (current.iou(&d), d))
            .max_by(|a, b| a.0.total_cmp(&b.0))?;

        if score < self.min_iou {
            return None;
        }

        let bbox = best.bbox();
        if bbox.is_degenerate() {
            return None;
        }

        self.current = Some(best);

        Some(bbox)
    }

    fn reset(&mut self) {
        self.current = None;
        self.detector.reset();
    }
}
