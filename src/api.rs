//! High-level API for training and running the scan classifier
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use brainscan::api::{InferenceContext, Trainer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Train on a directory of category folders, caching extracted features
//! let (outcome, failures) = Trainer::new()
//!     .with_n_iters(500)
//!     .with_probability(true)
//!     .train_folder("dataset/Training", Some("features.libsvm".as_ref()), false)?;
//! println!("{} images skipped", failures.len());
//! println!("{}", outcome.report.summary(&outcome.artifacts.config.categories));
//! outcome.artifacts.save_to_dir("models")?;
//!
//! // Classify an image
//! let context = InferenceContext::load("models")?;
//! let analysis = context.analyze(&std::fs::read("scan.jpg")?)?;
//! println!("{} ({:.1}%)", analysis.diagnosis.label, analysis.diagnosis.confidence * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    category_label, Dataset, FeatureMode, Matrix, PcaComponents, PipelineConfig,
    Result, ScanError, Transform, MODEL_NOT_TRAINED,
};
use crate::data::{
    extract_folder, write_libsvm_file, FailedSample, FeatureDataset, ImageFolder, LibSVMDataset,
};
use crate::features::{FeatureExtractor, HaralickStats};
use crate::metrics::EvaluationReport;
use crate::pca::Pca;
use crate::persistence::ModelArtifacts;
use crate::preprocess::{self, Preprocessor};
use crate::svm::{Classifier, OneVsRestSvm};
use crate::utils::scaling::StandardScaler;
use crate::utils::validation;
use image::{GrayImage, RgbImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Training pipeline with builder-style configuration
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: PipelineConfig,
}

/// Fitted artifacts plus their held-out evaluation
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: ModelArtifacts,
    pub report: EvaluationReport,
    pub n_train: usize,
    /// Zero when the report was computed on the training split
    pub n_test: usize,
}

impl Trainer {
    /// Create a trainer with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Set the number of passes per binary SVM
    pub fn with_n_iters(mut self, n_iters: usize) -> Self {
        self.config.svm.n_iters = n_iters;
        self
    }

    /// Set the sub-gradient step size
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.config.svm.learning_rate = learning_rate;
        self
    }

    /// Set the L2 regularization strength
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.svm.lambda = lambda;
        self
    }

    /// Reduce dimensionality with PCA before the SVM
    pub fn with_pca(mut self, components: PcaComponents) -> Self {
        self.config.pca = Some(components);
        self
    }

    /// Calibrate class probabilities after fitting
    pub fn with_probability(mut self, probability: bool) -> Self {
        self.config.svm.probability = probability;
        self
    }

    /// Set the held-out fraction
    pub fn with_test_ratio(mut self, test_ratio: f64) -> Self {
        self.config.test_ratio = test_ratio;
        self
    }

    /// Set the split seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set category names in class-index order
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.config.categories = categories;
        self
    }

    /// Choose the feature vector layout
    pub fn with_feature_mode(mut self, mode: FeatureMode) -> Self {
        self.config.features.mode = mode;
        self
    }

    /// Split, fit scaler, optional PCA and SVM on the train part, then evaluate
    pub fn train(&self, dataset: &FeatureDataset) -> Result<TrainingOutcome> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(ScanError::EmptyDataset);
        }
        let n_classes = self.config.categories.len();
        validation::validate_labels(&dataset.get_labels(), n_classes)?;

        let (train, test) = dataset.split(self.config.test_ratio, self.config.seed)?;
        if train.is_empty() {
            return Err(ScanError::InvalidDataset(
                "Split left no training samples".to_string(),
            ));
        }
        info!(
            "Training on {} samples, holding out {} ({} features)",
            train.len(),
            test.len(),
            dataset.dim()
        );
        let counts = validation::class_counts(&train.get_labels(), n_classes);
        for (category, count) in self.config.categories.iter().zip(&counts) {
            if *count == 0 {
                warn!("No training samples for category {category}");
            } else {
                debug!("{category}: {count} training samples");
            }
        }

        let mut scaler = StandardScaler::new();
        let mut train_x = scaler.fit_transform(&train.to_matrix())?;

        let pca = match self.config.pca {
            Some(components) => {
                let mut pca = Pca::new(components)?;
                train_x = pca.fit_transform(&train_x)?;
                Some(pca)
            }
            None => None,
        };

        let svm = OneVsRestSvm::new(self.config.svm.clone(), n_classes);
        let classifier = Classifier::fit(svm, &train_x, &train.get_labels())?;

        let artifacts = ModelArtifacts {
            scaler: Some(scaler),
            pca,
            classifier: Some(classifier),
            config: self.config.clone(),
        };

        let eval = if test.is_empty() {
            warn!("No held-out samples; evaluating on the training split");
            &train
        } else {
            &test
        };
        let report = evaluate(&artifacts, eval)?;
        info!("Evaluation accuracy: {:.2}%", report.accuracy * 100.0);

        Ok(TrainingOutcome {
            artifacts,
            report,
            n_train: train.len(),
            n_test: test.len(),
        })
    }

    /// Extract (or reuse cached) features for a category folder tree, then train
    ///
    /// With `cache` set, an existing cache file of the right width is reused
    /// unless `force_rescan`; freshly extracted features are written back.
    pub fn train_folder<P: AsRef<Path>>(
        &self,
        root: P,
        cache: Option<&Path>,
        force_rescan: bool,
    ) -> Result<(TrainingOutcome, Vec<FailedSample>)> {
        self.config.validate()?;
        let preprocessor = Preprocessor::new(self.config.preprocess.clone())?;
        let extractor = FeatureExtractor::new(self.config.features.clone())?;
        let expected_dim = extractor.feature_len(self.config.preprocess.target_size);

        let cached = match cache {
            Some(path) if path.is_file() && !force_rescan => {
                let dataset = LibSVMDataset::from_file(path)?.into_dataset();
                if dataset.dim() == expected_dim {
                    info!("Reusing {} cached feature vectors from {}", dataset.len(), path.display());
                    Some(dataset)
                } else {
                    warn!(
                        "Cache {} holds {}-dim vectors, expected {}; rescanning",
                        path.display(),
                        dataset.dim(),
                        expected_dim
                    );
                    None
                }
            }
            _ => None,
        };

        let (dataset, failures) = match cached {
            Some(dataset) => (dataset, Vec::new()),
            None => {
                let folder = ImageFolder::scan(root, &self.config.categories)?;
                let (dataset, failures) = extract_folder(&folder, &preprocessor, &extractor);
                if let Some(path) = cache {
                    write_libsvm_file(&dataset, path)?;
                    info!("Wrote feature cache to {}", path.display());
                }
                (dataset, failures)
            }
        };

        let outcome = self.train(&dataset)?;
        Ok((outcome, failures))
    }
}

/// Run fitted artifacts over a dataset and score the predictions
pub fn evaluate(artifacts: &ModelArtifacts, dataset: &FeatureDataset) -> Result<EvaluationReport> {
    let classifier = artifacts
        .classifier
        .as_ref()
        .ok_or(ScanError::NotFitted("Classifier"))?;

    let mut x = dataset.to_matrix();
    if let Some(scaler) = &artifacts.scaler {
        x = scaler.transform(&x)?;
    }
    if let Some(pca) = &artifacts.pca {
        x = pca.transform(&x)?;
    }

    let predictions = classifier.predict_batch(&x)?;
    let y_pred: Vec<usize> = predictions.iter().map(|p| p.class_index).collect();
    let scores: Vec<Vec<f64>> = predictions.into_iter().map(|p| p.scores).collect();
    EvaluationReport::compute(&dataset.get_labels(), &y_pred, &scores, classifier.n_classes())
}

/// Classification result for one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Display label, or "Model not trained"
    pub label: String,
    /// Category directory name of the predicted class
    pub category: Option<String>,
    pub class_index: Option<usize>,
    /// Selected class probability, 1.0 for score-only models, 0.0 when untrained
    pub confidence: f64,
    /// Per-class scores; empty when untrained
    pub scores: Vec<f64>,
}

impl Diagnosis {
    pub fn not_trained() -> Self {
        Self {
            label: MODEL_NOT_TRAINED.to_string(),
            category: None,
            class_index: None,
            confidence: 0.0,
            scores: Vec::new(),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.class_index.is_some()
    }
}

/// Everything computed for one image
#[derive(Debug, Clone)]
pub struct Analysis {
    pub diagnosis: Diagnosis,
    /// Preprocessed grayscale image
    pub preprocessed: GrayImage,
    /// Global co-occurrence matrix
    pub glcm: Matrix,
    pub haralick: HaralickStats,
    /// Gradient magnitude of the preprocessed image
    pub gradient_magnitude: Matrix,
    pub feature_len: usize,
    /// Feature vector after PCA, when a projection is loaded
    pub projected: Option<Vec<f64>>,
}

/// Immutable inference bundle, shared by reference across threads
#[derive(Debug, Clone)]
pub struct InferenceContext {
    preprocessor: Preprocessor,
    extractor: FeatureExtractor,
    scaler: Option<StandardScaler>,
    pca: Option<Pca>,
    classifier: Option<Classifier>,
    categories: Vec<String>,
}

impl InferenceContext {
    /// Build from loaded or freshly trained artifacts
    ///
    /// Without a classifier the context is untrained, and a scaler or PCA
    /// whose width does not match the extractor is dropped instead of
    /// failing the load.
    pub fn new(artifacts: ModelArtifacts) -> Result<Self> {
        artifacts.validate()?;
        let ModelArtifacts {
            mut scaler,
            mut pca,
            classifier,
            config,
        } = artifacts;
        let preprocessor = Preprocessor::new(config.preprocess.clone())?;
        let extractor = FeatureExtractor::new(config.features.clone())?;

        let expected = extractor.feature_len(config.preprocess.target_size);
        let first_stage = scaler
            .as_ref()
            .and_then(|s| s.n_features())
            .or_else(|| pca.as_ref().and_then(|p| p.model().map(|m| m.n_features())))
            .or_else(|| classifier.as_ref().and_then(|c| c.n_features()));
        if let Some(n) = first_stage {
            if let Err(e) = validation::check_dim(expected, n) {
                if classifier.is_some() {
                    return Err(e);
                }
                warn!("Ignoring preprocessing artifacts: {e}");
                scaler = None;
                pca = None;
            }
        }

        if classifier.is_none() {
            warn!("No classifier loaded; predictions will report \"{MODEL_NOT_TRAINED}\"");
        }

        Ok(Self {
            preprocessor,
            extractor,
            scaler,
            pca,
            classifier,
            categories: config.categories,
        })
    }

    /// Context with no fitted models
    pub fn untrained(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Self::new(ModelArtifacts {
            config,
            ..ModelArtifacts::default()
        })
    }

    /// Load whichever artifacts exist in `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::new(ModelArtifacts::load_from_dir(dir)?)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_trained(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn classifier(&self) -> Option<&Classifier> {
        self.classifier.as_ref()
    }

    /// Length of the vectors `extract_features` produces
    pub fn feature_len(&self) -> usize {
        self.extractor
            .feature_len(self.preprocessor.config().target_size)
    }

    pub fn preprocess(&self, image: &RgbImage) -> GrayImage {
        self.preprocessor.run(image)
    }

    pub fn extract_features(&self, image: &GrayImage) -> Vec<f64> {
        self.extractor.extract(image)
    }

    /// Apply the loaded scaler and PCA, skipping whichever is absent
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        let mut x = match &self.scaler {
            Some(scaler) => scaler.transform_row(features)?,
            None => features.to_vec(),
        };
        if let Some(pca) = &self.pca {
            x = pca.transform_row(&x)?;
        }
        Ok(x)
    }

    /// Classify a raw feature vector
    pub fn predict(&self, features: &[f64]) -> Result<Diagnosis> {
        let classifier = match &self.classifier {
            Some(c) => c,
            None => return Ok(Diagnosis::not_trained()),
        };
        let x = self.transform(features)?;
        let prediction = classifier.predict(&x)?;
        let category = self.categories.get(prediction.class_index).cloned();

        Ok(Diagnosis {
            label: category
                .as_deref()
                .map(category_label)
                .unwrap_or_else(|| format!("class {}", prediction.class_index)),
            category,
            class_index: Some(prediction.class_index),
            confidence: prediction.confidence,
            scores: prediction.scores,
        })
    }

    /// Decode, preprocess, extract and classify an encoded image
    pub fn analyze(&self, bytes: &[u8]) -> Result<Analysis> {
        let rgb = preprocess::decode(bytes)?;
        self.analyze_image(&rgb)
    }

    pub fn analyze_image(&self, image: &RgbImage) -> Result<Analysis> {
        let preprocessed = self.preprocess(image);
        let report = self.extractor.extract_with_artifacts(&preprocessed);

        let projected = match &self.pca {
            Some(_) => Some(self.transform(&report.vector)?),
            None => None,
        };
        let diagnosis = self.predict(&report.vector)?;

        Ok(Analysis {
            diagnosis,
            preprocessed,
            glcm: report.glcm,
            haralick: report.haralick,
            gradient_magnitude: report.gradient_magnitude,
            feature_len: report.vector.len(),
            projected,
        })
    }
}

/// Holder for the current inference context
///
/// Retraining builds a new context and swaps it in whole; readers keep the
/// `Arc` they already hold.
#[derive(Debug)]
pub struct ModelStore {
    current: RwLock<Arc<InferenceContext>>,
}

impl ModelStore {
    pub fn new(context: InferenceContext) -> Self {
        Self {
            current: RwLock::new(Arc::new(context)),
        }
    }

    pub fn current(&self) -> Arc<InferenceContext> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the context, returning the previous one
    pub fn swap(&self, context: InferenceContext) -> Arc<InferenceContext> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(context))
    }
}
