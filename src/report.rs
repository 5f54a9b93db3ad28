use crate::bbox::BoundingBox;
use crate::config::ReferencePolicy;
use crate::error::Error;
use crate::math::Rmse;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{info, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Outcome of one update call. A lost frame carries no geometry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    pub frame: usize,
    pub cx: Option<f64>,
    pub cy: Option<f64>,
    pub area: Option<f64>,
    pub success: bool,
}

impl FrameRecord {
    pub fn tracked(frame: usize, bbox: &BoundingBox) -> Self {
        Self {
            frame,
            cx: Some(bbox.x as f64 + bbox.width as f64 / 2.0),
            cy: Some(bbox.y as f64 + bbox.height as f64 / 2.0),
            area: Some(bbox.area() as f64),
            success: true,
        }
    }

    pub fn lost(frame: usize) -> Self {
        Self {
            frame,
            cx: None,
            cy: None,
            area: None,
            success: false,
        }
    }

    #[inline]
    pub fn center(&self) -> Option<(f64, f64)> {
        Some((self.cx?, self.cy?))
    }
}

/// Root-mean-square errors against the reference.
///
/// Serialized under the historical `mse_*` names.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct ErrorSummary {
    #[serde(rename = "mse_position")]
    pub position_rmse: f64,
    #[serde(rename = "mse_area")]
    pub area_rmse: f64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct ModelRecords {
    pub frames: Vec<FrameRecord>,
}

/// Compares `candidate` with `reference` on the frames both share.
///
/// Position and area are gated independently: a frame counts toward a metric
/// only when both series have a value for it.
pub fn rmse(reference: &[FrameRecord], candidate: &[FrameRecord]) -> ErrorSummary {
    let by_frame: HashMap<usize, &FrameRecord> = reference.iter().map(|r| (r.frame, r)).collect();

    let mut position = Rmse::default();
    let mut area = Rmse::default();

    for rec in candidate {
        let reference = match by_frame.get(&rec.frame) {
            Some(r) => r,
            None => continue,
        };

        if let (Some((x1, y1)), Some((x2, y2))) = (rec.center(), reference.center()) {
            position.push((x1 - x2).powi(2) + (y1 - y2).powi(2));
        }

        if let (Some(a1), Some(a2)) = (rec.area, reference.area) {
            area.push((a1 - a2).powi(2));
        }
    }

    ErrorSummary {
        position_rmse: position.value(),
        area_rmse: area.value(),
    }
}

/// Everything one benchmark run produced
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub video_path: String,
    pub roi: BoundingBox,
    pub timestamp: DateTime<Utc>,
    pub models: IndexMap<String, ModelRecords>,
    pub errors: IndexMap<String, ErrorSummary>,
    /// Configurations that failed to initialize, with the reason
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub failures: IndexMap<String, String>,
    /// Set when the run was stopped before every configuration finished
    #[serde(skip)]
    pub cancelled: bool,
}

impl BenchmarkResult {
    pub fn new<S: Into<String>>(video_path: S, roi: BoundingBox) -> Self {
        Self {
            video_path: video_path.into(),
            roi,
            timestamp: Utc::now(),
            models: IndexMap::new(),
            errors: IndexMap::new(),
            failures: IndexMap::new(),
            cancelled: false,
        }
    }

    /// Label of the comparison baseline: the last configuration matching `policy`
    pub fn reference_label(&self, policy: &ReferencePolicy) -> Option<&str> {
        self.models
            .keys()
            .rev()
            .find(|label| policy.matches(label))
            .map(String::as_str)
    }

    /// Fills `errors` for every configuration. Every configuration matching
    /// `policy` scores zero. Nothing is computed without reference records.
    pub fn compute_errors(&mut self, policy: &ReferencePolicy) {
        self.errors.clear();

        let reference = match self.reference_label(policy) {
            Some(label) => &self.models[label].frames,
            None => {
                warn!("no configuration matches reference policy {:?}", policy);
                return;
            }
        };

        if reference.is_empty() {
            warn!("reference configuration produced no frames, errors skipped");
            return;
        }

        let errors = self
            .models
            .iter()
            .map(|(label, model)| {
                let summary = if policy.matches(label) {
                    ErrorSummary::default()
                } else {
                    rmse(reference, &model.frames)
                };

                (label.clone(), summary)
            })
            .collect();

        self.errors = errors;
    }

    /// Whether `label` ran and tracked the target on at least one frame
    pub fn has_track(&self, label: &str) -> bool {
        !self.failures.contains_key(label)
            && self
                .models
                .get(label)
                .map_or(false, |m| m.frames.iter().any(|r| r.success))
    }

    /// Configurations ordered by ascending position error, ties in input
    /// order. Configurations without a single tracked frame score 0 but come
    /// last.
    pub fn ranking(&self) -> Vec<(&str, ErrorSummary)> {
        let mut rows: Vec<_> = self
            .errors
            .iter()
            .map(|(label, summary)| (label.as_str(), *summary, !self.has_track(label)))
            .collect();

        rows.sort_by(|a, b| {
            a.2.cmp(&b.2)
                .then_with(|| a.1.position_rmse.total_cmp(&b.1.position_rmse))
        });

        rows.into_iter()
            .map(|(label, summary, _)| (label, summary))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    /// Default export file name, stamped with the local time
    pub fn default_file_name() -> String {
        format!(
            "benchmark_results_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )
    }

    /// Writes the result document and returns where it went
    pub fn export(&self, path: Option<&Path>) -> Result<PathBuf, Error> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(Self::default_file_name()));

        let export_err = |source| Error::Export {
            path: path.clone(),
            source,
        };

        let file = File::create(&path).map_err(export_err)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|err| export_err(err.into()))?;
        writer.flush().map_err(export_err)?;

        info!("benchmark results exported to {}", path.display());

        Ok(path)
    }

    pub fn import<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
