use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::preprocessor::Preprocessor;

/// Where one face image lives on disk and which class it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub path:  PathBuf,
    pub label: usize,
}

impl FaceRecord {
    pub fn new(path: impl Into<PathBuf>, label: usize) -> Self {
        Self { path: path.into(), label }
    }
}

/// One decoded, resized face image with its class label.
/// Pixels are row-major HWC RGB bytes; empty when decoding failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSample {
    pub pixels: Vec<u8>,
    pub label:  usize,
}

impl FaceSample {
    pub fn new(pixels: Vec<u8>, label: usize) -> Self {
        Self { pixels, label }
    }

    /// Placeholder for a file that could not be decoded; the batcher drops it.
    pub fn unreadable(label: usize) -> Self {
        Self { pixels: Vec::new(), label }
    }
}

/// Face images decoded on demand.
///
/// Only paths and labels are held in memory. `get` decodes and
/// resizes, so the work runs on the DataLoader's worker threads.
pub struct FaceDataset {
    records:      Vec<FaceRecord>,
    preprocessor: Preprocessor,
}

impl FaceDataset {
    pub fn new(records: Vec<FaceRecord>, preprocessor: Preprocessor) -> Self {
        Self { records, preprocessor }
    }
}

impl Dataset<FaceSample> for FaceDataset {
    fn get(&self, index: usize) -> Option<FaceSample> {
        let record = self.records.get(index)?;
        // Returning None here would end the epoch early, so a bad
        // file becomes an empty sample instead
        let sample = match image::open(&record.path) {
            Ok(image) => FaceSample::new(self.preprocessor.prepare(&image), record.label),
            Err(e) => {
                tracing::warn!("Cannot decode '{}': {}", record.path.display(), e);
                FaceSample::unreadable(record.label)
            }
        };
        Some(sample)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
