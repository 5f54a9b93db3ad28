use crate::bbox::BoundingBox;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a tracker refuses to start on a given frame and region.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InitializationError {
    #[error("Region {bbox:?} has non-positive size")]
    DegenerateRegion { bbox: BoundingBox },

    #[error("Region {bbox:?} lies outside the {width}x{height} frame")]
    OutsideFrame {
        bbox: BoundingBox,
        width: u32,
        height: u32,
    },

    #[error("No sample pixel survived gating, appearance model is empty")]
    EmptyModel,

    #[error("No detection found near the region of interest")]
    NoTarget,

    #[error("Detector failed: {0}")]
    Detector(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Initialization Error: {0}")]
    Initialization(#[from] InitializationError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("Failed to export results to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Frame source is not opened")]
    NotOpened,

    #[error("Malformed frame: {0}")]
    Frame(String),
}
