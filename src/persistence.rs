//! Model serialization and persistence
//!
//! A model directory holds up to three JSON artifacts, each loadable on its
//! own: `scaler.json`, `pca.json` and `classifier.json`. Any subset may be
//! missing; inference degrades accordingly.

use crate::core::{PipelineConfig, Result, ScanError};
use crate::pca::{Pca, PcaModel};
use crate::svm::Classifier;
use crate::utils::scaling::{ScalerParams, StandardScaler};
use crate::utils::validation;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub const SCALER_FILE: &str = "scaler.json";
pub const PCA_FILE: &str = "pca.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
const STAGING_DIR: &str = ".staging";

/// Provenance stored alongside every artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Library version used to create the artifact
    pub library_version: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Input dimensionality the artifact expects
    pub n_features: usize,
}

impl ArtifactMetadata {
    pub fn new(n_features: usize) -> Self {
        Self {
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            n_features,
        }
    }

    fn check(&self, actual: usize) -> Result<()> {
        validation::check_dim(self.n_features, actual)
    }
}

/// Serializable representation of a fitted scaler
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableScaler {
    pub params: ScalerParams,
    /// Configuration the scaler was fitted under
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
    pub metadata: ArtifactMetadata,
}

/// Serializable representation of a fitted PCA projection
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializablePca {
    pub model: PcaModel,
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
    pub metadata: ArtifactMetadata,
}

/// Serializable representation of a trained classifier
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableClassifier {
    pub classifier: Classifier,
    /// Category directory names in class-index order
    pub categories: Vec<String>,
    /// Configuration the model was trained with
    pub training_params: PipelineConfig,
    pub metadata: ArtifactMetadata,
}

fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let file = File::create(path).map_err(ScanError::IoError)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| ScanError::SerializationError(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(ScanError::IoError)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| ScanError::SerializationError(format!("{}: {}", path.display(), e)))
}

impl SerializableScaler {
    pub fn from_scaler(scaler: &StandardScaler, config: &PipelineConfig) -> Result<Self> {
        let params = scaler
            .params()
            .ok_or(ScanError::NotFitted("StandardScaler"))?
            .clone();
        let metadata = ArtifactMetadata::new(params.mean.len());
        Ok(Self {
            params,
            pipeline: Some(config.clone()),
            metadata,
        })
    }

    pub fn into_scaler(self) -> Result<StandardScaler> {
        self.metadata.check(self.params.mean.len())?;
        StandardScaler::from_params(self.params)
    }
}

impl SerializablePca {
    pub fn from_pca(pca: &Pca, config: &PipelineConfig) -> Result<Self> {
        let model = pca.model().ok_or(ScanError::NotFitted("PCA"))?.clone();
        let metadata = ArtifactMetadata::new(model.n_features());
        Ok(Self {
            model,
            pipeline: Some(config.clone()),
            metadata,
        })
    }

    pub fn into_pca(self) -> Result<Pca> {
        self.metadata.check(self.model.n_features())?;
        Pca::from_model(self.model)
    }
}

impl SerializableClassifier {
    pub fn new(classifier: &Classifier, config: &PipelineConfig) -> Result<Self> {
        classifier.validate()?;
        let n_features = classifier
            .n_features()
            .ok_or(ScanError::NotFitted("Classifier"))?;
        Ok(Self {
            classifier: classifier.clone(),
            categories: config.categories.clone(),
            training_params: config.clone(),
            metadata: ArtifactMetadata::new(n_features),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;
        validation::check_dim(self.categories.len(), self.classifier.n_classes())?;
        if let Some(n) = self.classifier.n_features() {
            self.metadata.check(n)?;
        }
        Ok(())
    }
}

/// Everything inference needs, each part optional
#[derive(Debug, Clone, Default)]
pub struct ModelArtifacts {
    pub scaler: Option<StandardScaler>,
    pub pca: Option<Pca>,
    pub classifier: Option<Classifier>,
    /// Configuration stored with the artifacts, or defaults without any
    pub config: PipelineConfig,
}

impl ModelArtifacts {
    pub fn is_empty(&self) -> bool {
        self.scaler.is_none() && self.pca.is_none() && self.classifier.is_none()
    }

    /// Check that each present stage accepts the previous stage's output
    pub fn validate(&self) -> Result<()> {
        let mut width = self.scaler.as_ref().and_then(|s| s.n_features());

        if let Some(pca) = &self.pca {
            let model = pca.model().ok_or(ScanError::NotFitted("PCA"))?;
            if let Some(w) = width {
                validation::check_dim(model.n_features(), w)?;
            }
            width = Some(model.n_components());
        }

        if let Some(classifier) = &self.classifier {
            classifier.validate()?;
            if let (Some(w), Some(n)) = (width, classifier.n_features()) {
                validation::check_dim(n, w)?;
            }
            validation::check_dim(self.config.categories.len(), classifier.n_classes())?;
        }
        Ok(())
    }

    /// Write the present artifacts into `dir`, creating it if needed
    ///
    /// Every artifact is first written into a staging directory, then moved
    /// into place. Artifacts that are `None` have their old files removed,
    /// so the directory never mixes stages from two trainings.
    pub fn save_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let staging = dir.join(STAGING_DIR);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)?;

        if let Some(scaler) = &self.scaler {
            let stored = SerializableScaler::from_scaler(scaler, &self.config)?;
            save_json(&stored, staging.join(SCALER_FILE))?;
        }
        if let Some(pca) = &self.pca {
            save_json(&SerializablePca::from_pca(pca, &self.config)?, staging.join(PCA_FILE))?;
        }
        if let Some(classifier) = &self.classifier {
            save_json(
                &SerializableClassifier::new(classifier, &self.config)?,
                staging.join(CLASSIFIER_FILE),
            )?;
        }

        for name in [SCALER_FILE, PCA_FILE, CLASSIFIER_FILE] {
            let staged = staging.join(name);
            let target = dir.join(name);
            if staged.is_file() {
                fs::rename(&staged, &target)?;
            } else if target.exists() {
                debug!("Removing stale {}", target.display());
                fs::remove_file(&target)?;
            }
        }
        fs::remove_dir(&staging)?;

        info!("Saved model artifacts to {}", dir.display());
        Ok(())
    }

    /// Load whichever artifacts exist in `dir`
    ///
    /// A missing file leaves that part `None`; a present but unreadable or
    /// inconsistent file is an error. The pipeline configuration comes from
    /// the classifier when present, else from the scaler or PCA.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut artifacts = ModelArtifacts::default();

        let path = dir.join(SCALER_FILE);
        if path.is_file() {
            let mut stored: SerializableScaler = load_json(&path)?;
            if let Some(config) = stored.pipeline.take() {
                artifacts.config = config;
            }
            artifacts.scaler = Some(stored.into_scaler()?);
        } else {
            debug!("No scaler at {}", path.display());
        }

        let path = dir.join(PCA_FILE);
        if path.is_file() {
            let mut stored: SerializablePca = load_json(&path)?;
            if let Some(config) = stored.pipeline.take() {
                artifacts.config = config;
            }
            artifacts.pca = Some(stored.into_pca()?);
        } else {
            debug!("No PCA at {}", path.display());
        }

        let path = dir.join(CLASSIFIER_FILE);
        if path.is_file() {
            let stored: SerializableClassifier = load_json(&path)?;
            stored.validate()?;
            artifacts.config = stored.training_params;
            artifacts.config.categories = stored.categories;
            artifacts.classifier = Some(stored.classifier);
        } else {
            debug!("No classifier at {}", path.display());
        }

        info!(
            "Loaded artifacts from {} (scaler: {}, pca: {}, classifier: {})",
            dir.display(),
            artifacts.scaler.is_some(),
            artifacts.pca.is_some(),
            artifacts.classifier.is_some()
        );
        artifacts.validate()?;
        Ok(artifacts)
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== Model Summary ===");
        match self.scaler.as_ref().and_then(|s| s.n_features()) {
            Some(n) => println!("Scaler: {n} features"),
            None => println!("Scaler: absent"),
        }
        match self.pca.as_ref().and_then(|p| p.model()) {
            Some(model) => println!(
                "PCA: {} -> {} components ({:.2}% variance)",
                model.n_features(),
                model.n_components(),
                model.explained_variance_ratio.iter().sum::<f64>() * 100.0
            ),
            None => println!("PCA: absent"),
        }
        match &self.classifier {
            Some(classifier) => {
                let kind = if classifier.has_probabilities() {
                    "calibrated probabilities"
                } else {
                    "decision scores"
                };
                println!(
                    "Classifier: {} classes, {} features, {}",
                    classifier.n_classes(),
                    classifier.n_features().unwrap_or(0),
                    kind
                );
                let svm = classifier.svm().config();
                println!("Training Parameters:");
                println!("  Learning rate: {}", svm.learning_rate);
                println!("  Lambda: {}", svm.lambda);
                println!("  Iterations: {}", svm.n_iters);
            }
            None => println!("Classifier: absent"),
        }
        println!("Categories: {}", self.config.categories.join(", "));
    }
}
