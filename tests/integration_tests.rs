//! End-to-end tests for the preprocessing, feature and training pipeline
//!
//! Synthetic scans stand in for MRI slices: each category gets its own
//! texture inside a bright region surrounded by a black border.

use approx::assert_abs_diff_eq;
use brainscan::api::{InferenceContext, ModelStore, Trainer};
use brainscan::core::{FeatureConfig, FeatureMode, PcaComponents, PipelineConfig};
use brainscan::features::FeatureExtractor;
use brainscan::preprocess::{crop_roi, resize_with_padding, to_grayscale, Preprocessor};
use brainscan::{Dataset, ModelArtifacts, MODEL_NOT_TRAINED};
use image::{GrayImage, Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const CATEGORIES: [&str; 4] = ["glioma", "meningioma", "notumor", "pituitary"];

/// Texture per class: horizontal stripes, vertical stripes, flat, checkerboard
fn synthetic_scan(class: usize, variant: u32) -> RgbImage {
    let border = 8 + variant % 3;
    let size = 96;
    RgbImage::from_fn(size, size, |x, y| {
        if x < border || y < border || x >= size - border || y >= size - border {
            return Rgb([0, 0, 0]);
        }
        let (sx, sy) = (x + variant, y + variant);
        let bright = match class {
            0 => (sy / 4) % 2 == 0,
            1 => (sx / 4) % 2 == 0,
            2 => true,
            _ => ((sx / 8) + (sy / 8)) % 2 == 0,
        };
        let v = match (class, bright) {
            (2, _) => 150 + (variant % 5) as u8,
            (_, true) => 220,
            (_, false) => 80,
        };
        Rgb([v, v, v])
    })
}

fn write_dataset(root: &Path, per_class: u32) {
    for (class, category) in CATEGORIES.iter().enumerate() {
        let dir = root.join(category);
        std::fs::create_dir_all(&dir).unwrap();
        for variant in 0..per_class {
            synthetic_scan(class, variant)
                .save(dir.join(format!("scan_{variant:02}.png")))
                .unwrap();
        }
    }
}

fn white_square_image() -> RgbImage {
    RgbImage::from_fn(100, 50, |x, y| {
        if (40..60).contains(&x) && (15..35).contains(&y) {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Inclusive bounding box of pixels at or above `threshold`: (x0, y0, x1, y1)
fn bright_bbox(image: &GrayImage, threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let mut bbox: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[0] >= threshold {
            bbox = Some(match bbox {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    bbox
}

#[test]
fn test_black_image_crop_is_identity() {
    let image = GrayImage::new(64, 64);
    let cropped = crop_roi(&image, 45);
    assert_eq!(cropped.dimensions(), (64, 64));
    assert_eq!(cropped, image);
}

#[test]
fn test_white_square_survives_grayscale_and_resize() {
    let gray = to_grayscale(&white_square_image());
    assert_eq!(gray.dimensions(), (100, 50));
    assert_eq!(bright_bbox(&gray, 254), Some((40, 15, 59, 34)));

    let resized = resize_with_padding(&gray, 64);
    assert_eq!(resized.dimensions(), (64, 64));

    // Landscape input: 64x32 content centered vertically
    for y in (0..16).chain(48..64) {
        for x in 0..64 {
            assert_eq!(resized.get_pixel(x, y)[0], 0, "padding pixel ({x}, {y}) is not black");
        }
    }

    let (x0, y0, x1, y1) = bright_bbox(&resized, 254).expect("square lost in resize");
    let cx = (x0 + x1) as f64 / 2.0;
    let cy = (y0 + y1) as f64 / 2.0;
    assert!((cx - 32.0).abs() <= 1.0, "square center x = {cx}");
    assert!((cy - 32.0).abs() <= 1.0, "square center y = {cy}");
    assert!((12..=14).contains(&(x1 - x0 + 1)));
}

#[test]
fn test_feature_extraction_is_deterministic() {
    let preprocessor = Preprocessor::new(Default::default()).unwrap();
    let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
    let image = preprocessor.run(&synthetic_scan(3, 1));

    let first = extractor.extract_full_features(&image);
    let second = extractor.extract_full_features(&image);
    assert_eq!(first.len(), extractor.feature_len(64));
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_preprocess_output_shape() {
    let preprocessor = Preprocessor::new(Default::default()).unwrap();
    for (w, h) in [(96, 96), (120, 40), (30, 200)] {
        let scan = RgbImage::from_fn(w, h, |x, y| {
            let v = if x > w / 4 && y > h / 4 { 200 } else { 0 };
            Rgb([v, v, v])
        });
        assert_eq!(preprocessor.run(&scan).dimensions(), (64, 64));
    }
}

#[test]
fn test_train_folder_end_to_end() {
    let data = TempDir::new().unwrap();
    write_dataset(data.path(), 8);

    let trainer = Trainer::new().with_n_iters(300).with_test_ratio(0.0);
    let (outcome, failures) = trainer.train_folder(data.path(), None, false).unwrap();

    assert!(failures.is_empty());
    assert_eq!(outcome.n_train, 32);
    assert_eq!(outcome.n_test, 0);
    assert_eq!(outcome.report.n_classes(), 4);
    assert!(
        outcome.report.accuracy >= 0.75,
        "training accuracy {}",
        outcome.report.accuracy
    );

    let context = InferenceContext::new(outcome.artifacts.clone()).unwrap();
    assert!(context.is_trained());
    let bytes = std::fs::read(data.path().join("meningioma").join("scan_03.png")).unwrap();
    let analysis = context.analyze(&bytes).unwrap();
    assert!(analysis.diagnosis.is_trained());
    assert_eq!(analysis.diagnosis.scores.len(), 4);
    assert_eq!(analysis.feature_len, context.feature_len());
    assert!(analysis.projected.is_none());
}

#[test]
fn test_saved_model_predicts_like_trained_model() {
    let data = TempDir::new().unwrap();
    let models = TempDir::new().unwrap();
    write_dataset(data.path(), 6);

    // Small compact vectors keep the covariance eigen-solve quick
    let mut config = PipelineConfig::default();
    config.features.mode = FeatureMode::Compact;
    config.features.compact_cell_size = 16;
    let trainer = Trainer::from_config(config)
        .with_n_iters(200)
        .with_pca(PcaComponents::Fixed(10))
        .with_probability(true)
        .with_test_ratio(0.25);
    let (outcome, _) = trainer.train_folder(data.path(), None, false).unwrap();
    assert_eq!(outcome.n_train + outcome.n_test, 24);
    outcome.artifacts.save_to_dir(models.path()).unwrap();

    let fresh = InferenceContext::new(outcome.artifacts).unwrap();
    let loaded = InferenceContext::load(models.path()).unwrap();
    assert!(loaded.classifier().unwrap().has_probabilities());

    for class in 0..4 {
        let scan = synthetic_scan(class, 7);
        let a = fresh.analyze_image(&scan).unwrap();
        let b = loaded.analyze_image(&scan).unwrap();

        assert_eq!(a.diagnosis.class_index, b.diagnosis.class_index);
        assert_eq!(a.diagnosis.label, b.diagnosis.label);
        assert_eq!(b.projected.as_ref().map(Vec::len), Some(10));
        assert_abs_diff_eq!(b.diagnosis.scores.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        for (x, y) in a.diagnosis.scores.iter().zip(&b.diagnosis.scores) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_untrained_context_reports_not_trained() {
    let empty = TempDir::new().unwrap();
    let context = InferenceContext::load(empty.path()).unwrap();
    assert!(!context.is_trained());

    let analysis = context.analyze_image(&synthetic_scan(0, 0)).unwrap();
    assert_eq!(analysis.diagnosis.label, MODEL_NOT_TRAINED);
    assert!(analysis.diagnosis.scores.is_empty());
    assert_eq!(analysis.preprocessed.dimensions(), (64, 64));
}

#[test]
fn test_mode_mismatch_is_rejected() {
    let data = TempDir::new().unwrap();
    write_dataset(data.path(), 4);

    let trainer = Trainer::new()
        .with_n_iters(50)
        .with_test_ratio(0.0)
        .with_feature_mode(FeatureMode::Compact);
    let (outcome, _) = trainer.train_folder(data.path(), None, false).unwrap();

    let compact = InferenceContext::new(outcome.artifacts.clone()).unwrap();
    let full_features = vec![0.0; FeatureExtractor::new(FeatureConfig::default()).unwrap().feature_len(64)];
    assert_eq!(compact.predict(&full_features).unwrap_err().code(), "shape_mismatch");

    // Artifacts fitted on compact vectors cannot drive a full-mode extractor
    let mut artifacts = outcome.artifacts;
    artifacts.config = PipelineConfig::default();
    assert_eq!(InferenceContext::new(artifacts).unwrap_err().code(), "shape_mismatch");
}

#[test]
fn test_compact_model_without_classifier_loads_untrained() {
    let data = TempDir::new().unwrap();
    let models = TempDir::new().unwrap();
    write_dataset(data.path(), 4);

    let trainer = Trainer::new()
        .with_n_iters(50)
        .with_test_ratio(0.0)
        .with_feature_mode(FeatureMode::Compact);
    let (outcome, _) = trainer.train_folder(data.path(), None, false).unwrap();
    outcome.artifacts.save_to_dir(models.path()).unwrap();
    std::fs::remove_file(models.path().join("classifier.json")).unwrap();

    let context = InferenceContext::load(models.path()).unwrap();
    assert!(!context.is_trained());
    // The scaler carries the compact configuration it was fitted under
    assert_eq!(context.feature_len(), 580);

    let analysis = context.analyze_image(&synthetic_scan(2, 1)).unwrap();
    assert_eq!(analysis.diagnosis.label, MODEL_NOT_TRAINED);
    assert_eq!(analysis.feature_len, 580);
}

#[test]
fn test_retrain_without_pca_replaces_saved_model() {
    let data = TempDir::new().unwrap();
    let models = TempDir::new().unwrap();
    write_dataset(data.path(), 4);

    let mut config = PipelineConfig::default();
    config.features.mode = FeatureMode::Compact;
    config.features.compact_cell_size = 16;
    let with_pca = Trainer::from_config(config.clone())
        .with_n_iters(50)
        .with_test_ratio(0.0)
        .with_pca(PcaComponents::Fixed(3));
    let (outcome, _) = with_pca.train_folder(data.path(), None, false).unwrap();
    outcome.artifacts.save_to_dir(models.path()).unwrap();
    assert!(models.path().join("pca.json").is_file());

    let without_pca = Trainer::from_config(config).with_n_iters(50).with_test_ratio(0.0);
    let (outcome, _) = without_pca.train_folder(data.path(), None, false).unwrap();
    outcome.artifacts.save_to_dir(models.path()).unwrap();
    assert!(!models.path().join("pca.json").exists());

    let context = InferenceContext::load(models.path()).unwrap();
    assert!(context.is_trained());
    assert_eq!(context.classifier().unwrap().n_features(), Some(148));
    let analysis = context.analyze_image(&synthetic_scan(1, 2)).unwrap();
    assert!(analysis.diagnosis.is_trained());
    assert!(analysis.projected.is_none());
}

#[test]
fn test_evaluate_requires_classifier() {
    let dataset = brainscan::FeatureDataset::new(3);
    let err = brainscan::api::evaluate(&ModelArtifacts::default(), &dataset).unwrap_err();
    assert_eq!(err.code(), "not_fitted");
    assert_eq!(dataset.dim(), 3);
}

#[test]
fn test_model_store_concurrent_readers() {
    let data = TempDir::new().unwrap();
    write_dataset(data.path(), 4);
    let (outcome, _) = Trainer::new()
        .with_n_iters(50)
        .with_test_ratio(0.0)
        .train_folder(data.path(), None, false)
        .unwrap();

    let store = Arc::new(ModelStore::new(
        InferenceContext::untrained(PipelineConfig::default()).unwrap(),
    ));
    let before = store.current();

    let readers: Vec<_> = (0..4)
        .map(|class| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let context = store.current();
                context
                    .analyze_image(&synthetic_scan(class, 2))
                    .unwrap()
                    .diagnosis
                    .label
            })
        })
        .collect();

    let old = store.swap(InferenceContext::new(outcome.artifacts).unwrap());
    assert!(Arc::ptr_eq(&old, &before));
    assert!(store.current().is_trained());
    assert!(!before.is_trained());

    for reader in readers {
        let label = reader.join().unwrap();
        assert!(!label.is_empty());
    }
}
