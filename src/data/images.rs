//! Labeled image folders and parallel feature extraction
//!
//! Layout: `root/<category>/<image file>`, where the category's position in
//! the category list is the class index.

use super::FeatureDataset;
use crate::core::{Result, Sample, ScanError};
use crate::features::FeatureExtractor;
use crate::preprocess::{self, Preprocessor};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// One image file and its class index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub label: usize,
}

/// An image that could not be turned into a feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSample {
    pub path: PathBuf,
    pub reason: String,
}

/// Image files found under a category-per-directory root
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    categories: Vec<String>,
    entries: Vec<ImageEntry>,
}

impl ImageFolder {
    /// List `root/<category>/*` for every category, sorted by file name
    ///
    /// Missing category directories are skipped with a warning.
    pub fn scan<P: AsRef<Path>>(root: P, categories: &[String]) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ScanError::InvalidDataset(format!(
                "Data directory not found: {}",
                root.display()
            )));
        }

        let mut entries = Vec::new();
        for (label, category) in categories.iter().enumerate() {
            let dir = root.join(category);
            if !dir.is_dir() {
                warn!("Category directory missing, skipping: {}", dir.display());
                continue;
            }

            let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file())
                .collect();
            files.sort();
            debug!("{}: {} files", category, files.len());

            entries.extend(files.into_iter().map(|path| ImageEntry { path, label }));
        }

        info!(
            "Found {} images in {} categories under {}",
            entries.len(),
            categories.len(),
            root.display()
        );
        Ok(Self {
            root: root.to_path_buf(),
            categories: categories.to_vec(),
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode, preprocess and extract one image file
pub fn extract_image(
    path: &Path,
    preprocessor: &Preprocessor,
    extractor: &FeatureExtractor,
) -> Result<Vec<f64>> {
    let rgb = preprocess::open(path)?;
    let image = preprocessor.run(&rgb);
    Ok(extractor.extract(&image))
}

/// Extract features for every image in `folder` in parallel
///
/// Output order follows the folder order. Images that fail to load are
/// reported in the second return value and left out of the dataset.
pub fn extract_folder(
    folder: &ImageFolder,
    preprocessor: &Preprocessor,
    extractor: &FeatureExtractor,
) -> (FeatureDataset, Vec<FailedSample>) {
    let dimensions = extractor.feature_len(preprocessor.config().target_size);

    let results: Vec<(usize, std::result::Result<Vec<f64>, FailedSample>)> = folder
        .entries()
        .par_iter()
        .map(|entry| {
            let outcome = extract_image(&entry.path, preprocessor, extractor).map_err(|e| {
                FailedSample {
                    path: entry.path.clone(),
                    reason: e.to_string(),
                }
            });
            (entry.label, outcome)
        })
        .collect();

    let mut dataset = FeatureDataset::new(dimensions);
    let mut failures = Vec::new();
    for (label, outcome) in results {
        match outcome {
            Ok(features) => {
                if let Err(e) = dataset.push(Sample::new(features, label)) {
                    warn!("Dropping sample with unexpected length: {e}");
                }
            }
            Err(failure) => {
                warn!("Skipping {}: {}", failure.path.display(), failure.reason);
                failures.push(failure);
            }
        }
    }

    info!(
        "Extracted {} feature vectors ({} failed)",
        dataset.samples().len(),
        failures.len()
    );
    (dataset, failures)
}
