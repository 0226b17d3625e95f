//! LibSVM text format, used as the on-disk feature cache
//!
//! Each line is a class index followed by 1-based `index:value` pairs:
//!
//! ```text
//! 2 1:0.5 2:0.0 3:1.2
//! 0 1:0.3 2:2.1 3:0.7
//! ```
//!
//! Vectors are written densely so every line has the same length. Indices
//! left out on read are treated as zero.

use super::FeatureDataset;
use crate::core::{Dataset, Result, Sample, ScanError};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Dataset loaded from a LibSVM format file
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(ScanError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut parsed = Vec::new();
        let mut max_dimension = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(ScanError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Self::parse_line(line) {
                Ok((label, pairs)) => {
                    if let Some(&(idx, _)) = pairs.last() {
                        max_dimension = max_dimension.max(idx + 1);
                    }
                    parsed.push((label, pairs));
                }
                Err(e) => {
                    return Err(ScanError::ParseError(format!(
                        "Error parsing line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }

        if parsed.is_empty() {
            return Err(ScanError::EmptyDataset);
        }

        let samples = parsed
            .into_iter()
            .map(|(label, pairs)| {
                let mut features = vec![0.0; max_dimension];
                for (idx, value) in pairs {
                    features[idx] = value;
                }
                Sample::new(features, label)
            })
            .collect();

        Ok(LibSVMDataset {
            samples,
            dimensions: max_dimension,
        })
    }

    /// Parse a single line into a label and ascending 0-based `(index, value)` pairs
    fn parse_line(line: &str) -> Result<(usize, Vec<(usize, f64)>)> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.is_empty() {
            return Err(ScanError::ParseError("Empty line".to_string()));
        }

        let label = parts[0]
            .parse::<usize>()
            .map_err(|_| ScanError::ParseError(format!("Invalid class index: {}", parts[0])))?;

        let mut pairs = Vec::with_capacity(parts.len() - 1);
        for feature_str in &parts[1..] {
            let (index, value) = feature_str.split_once(':').ok_or_else(|| {
                ScanError::ParseError(format!("Invalid feature format: {feature_str}"))
            })?;

            let index = index
                .parse::<usize>()
                .map_err(|_| ScanError::ParseError(format!("Invalid feature index: {index}")))?;
            let value = value
                .parse::<f64>()
                .map_err(|_| ScanError::ParseError(format!("Invalid feature value: {value}")))?;

            // libsvm uses 1-based indexing, convert to 0-based
            if index == 0 {
                return Err(ScanError::ParseError(
                    "Feature index must be positive: 0".to_string(),
                ));
            }
            let zero_based = index - 1;
            if let Some(&(prev, _)) = pairs.last() {
                if zero_based <= prev {
                    return Err(ScanError::ParseError(format!(
                        "Feature indices must be strictly increasing: {index}"
                    )));
                }
            }
            pairs.push((zero_based, value));
        }

        Ok((label, pairs))
    }

    pub fn into_dataset(self) -> FeatureDataset {
        // Every sample was padded to `dimensions` above
        FeatureDataset::from_samples(self.samples).unwrap_or_default()
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }
}

/// Write every sample of `dataset` as one dense LibSVM line
pub fn write_libsvm<D: Dataset, W: Write>(dataset: &D, writer: &mut W) -> Result<()> {
    for i in 0..dataset.len() {
        let sample = dataset.get_sample(i);
        write!(writer, "{}", sample.label)?;
        for (j, value) in sample.features.iter().enumerate() {
            write!(writer, " {}:{}", j + 1, value)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write `dataset` to `path`, replacing any existing file
pub fn write_libsvm_file<D: Dataset, P: AsRef<Path>>(dataset: &D, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_libsvm(dataset, &mut writer)?;
    writer.flush()?;
    Ok(())
}
