//! End-to-end tests: oracle, all three searches, orchestration and rendering.

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use cfx::prelude::*;
use cfx::search::Summary;
use rand::Rng;

type B = Autodiff<NdArray>;

/// Predicts class 1 with fixed confidence, whatever the input.
struct AlwaysPositive {
    logit: f32,
}

impl ScoringOracle<B> for AlwaysPositive {
    fn forward(&self, images: Tensor<B, 4>) -> cfx::core::Result<Tensor<B, 2>> {
        let [batch, channels, height, width] = images.dims();
        let zero = images
            .reshape([batch, channels * height * width])
            .sum_dim(1)
            * 0.0;
        Ok(Tensor::cat(vec![zero.clone(), zero + self.logit], 1))
    }
}

/// Always 50/50; no search can ever reach the target.
struct Undecided;

impl ScoringOracle<B> for Undecided {
    fn forward(&self, images: Tensor<B, 4>) -> cfx::core::Result<Tensor<B, 2>> {
        let [batch, channels, height, width] = images.dims();
        let zero = images
            .reshape([batch, channels * height * width])
            .sum_dim(1)
            * 0.0;
        Ok(Tensor::cat(vec![zero.clone(), zero], 1))
    }
}

/// An unreachable model endpoint.
struct Offline;

impl ScoringOracle<B> for Offline {
    fn forward(&self, _images: Tensor<B, 4>) -> cfx::core::Result<Tensor<B, 2>> {
        Err(CoreError::Oracle("connection refused".to_string()))
    }
}

fn device() -> <B as Backend>::Device {
    Default::default()
}

fn gray(shape: ImageShape) -> (ImageData, Image<B>) {
    let data = ImageData::filled(shape, 0.5);
    let image = Image::from_data(&data, &device()).unwrap();
    (data, image)
}

fn textured(shape: ImageShape, seed: u64) -> (ImageData, Image<B>) {
    let mut rng = Seed::new(seed).to_rng();
    let values = (0..shape.numel()).map(|_| rng.gen_range(0.0..1.0)).collect();
    let data = ImageData::new(shape, values).unwrap();
    let image = Image::from_data(&data, &device()).unwrap();
    (data, image)
}

fn assert_unit_range(data: &ImageData) {
    let (lo, hi) = data.min_max();
    assert!(lo >= 0.0 && hi <= 1.0, "values escaped [0, 1]: {lo}..{hi}");
}

#[test]
fn test_confident_oracle_masks_first_region() {
    let (_, image) = gray(ImageShape::new(3, 64, 64));
    let result = generate_comprehensive_counterfactuals(&AlwaysPositive { logit: 5.0 }, &image, 0).unwrap();

    assert_eq!(result.original_class, 0);
    assert_eq!(result.target_class, 1);

    // Already predicting the target: the perturbation search has nothing to do.
    assert!(matches!(
        result.outcome(Method::Adversarial),
        Some(MethodOutcome::AlreadyTarget { .. })
    ));

    let mask = result.outcome(Method::MaskBased).and_then(MethodOutcome::result).unwrap();
    assert!(mask.success);
    // Offsets 0, 16 and 32 on both axes.
    assert_eq!(mask.iterations_used, 9);
    match &mask.details {
        MethodDetails::RegionMask {
            mask_position,
            confidence_achieved,
        } => {
            assert_eq!(*mask_position, Some(MaskRect::square(0, 0, 32)));
            assert!(confidence_achieved.unwrap() > 0.99);
        }
        other => panic!("unexpected details {other:?}"),
    }
    // Masking a uniform image with its own mean changes nothing.
    assert!(mask.perturbation_magnitude.abs() < 1e-6);

    let optimization = result
        .outcome(Method::GradientOptimization)
        .and_then(MethodOutcome::result)
        .unwrap();
    assert!(optimization.success);
    assert_eq!(optimization.iterations_used, 1);

    assert_eq!(result.summary.total_methods_tried, 3);
    assert_eq!(result.summary.successful_methods, 2);
    assert!(result.best().is_some());
}

#[test]
fn test_undecided_oracle_exhausts_every_budget() {
    let (_, image) = gray(ImageShape::new(3, 32, 32));
    let result = generate_comprehensive_counterfactuals(&Undecided, &image, 0).unwrap();

    assert_eq!(result.summary.successful_methods, 0);
    assert_eq!(result.summary.best_method, None);
    assert!(result.best().is_none());

    let iterations: Vec<_> = Method::ALL
        .iter()
        .map(|m| result.outcome(*m).map(MethodOutcome::iterations_used))
        .collect();
    assert_eq!(iterations, [Some(100), Some(200), Some(1)]);

    for outcome in result.counterfactuals.values() {
        let searched = outcome.result().unwrap();
        assert!(!searched.success);
    }
}

#[test]
fn test_offline_oracle_fails_every_method() {
    let (_, image) = gray(ImageShape::new(1, 16, 16));
    let result = generate_comprehensive_counterfactuals(&Offline, &image, 1).unwrap();

    assert!(result.original_prediction.is_none());
    assert_eq!(result.counterfactuals.len(), 3);
    for outcome in result.counterfactuals.values() {
        assert!(outcome.error().unwrap().contains("connection refused"));
    }
    assert_eq!(
        result.summary,
        Summary {
            total_methods_tried: 3,
            successful_methods: 0,
            successful_method_names: Vec::new(),
            best_method: None,
        }
    );
}

fn small_model() -> ImageMlp<B> {
    ImageMlpConfig::new(1, 16)
        .with_hidden_sizes(vec![8])
        .init_seeded::<B>(Seed::new(11), &device())
}

fn small_masks() -> ExplainerConfig {
    ExplainerConfig::default()
        .with_perturbation(PerturbationConfig::default().with_max_iterations(20))
        .with_optimization(OptimizationConfig::default().with_max_iterations(40))
        .with_region_mask(RegionMaskConfig::default().with_mask_size(4))
}

#[test]
fn test_results_are_consistent_with_their_images() {
    let model = small_model();
    let (original, image) = textured(model.shape(), 3);
    let original_class = model.predict(&image).unwrap().predicted_class;

    let result = CounterfactualExplainer::new(small_masks())
        .with_oracle(&model)
        .generate(&image, original_class)
        .unwrap();

    assert_eq!(result.target_class, 1 - original_class);
    for (method, outcome) in &result.counterfactuals {
        let Some(searched) = outcome.result() else {
            // The model predicts the original class, so nothing short-circuits.
            panic!("{method} did not run: {outcome:?}");
        };
        assert_eq!(searched.method, *method);

        let Some(counterfactual) = &searched.counterfactual_image else {
            assert!(!searched.success);
            continue;
        };
        assert_unit_range(counterfactual);
        assert_eq!(counterfactual.shape(), original.shape());

        // The reported magnitude is the L2 distance to the original.
        let distance = counterfactual.difference(&original).unwrap().l2_norm();
        assert!(
            (searched.perturbation_magnitude - distance).abs() < 1e-3,
            "{method}: {} vs {distance}",
            searched.perturbation_magnitude
        );

        // The stored prediction is what the model says about the stored image.
        let check = Image::<B>::from_data(counterfactual, &device()).unwrap();
        let prediction = model.predict(&check).unwrap();
        let stored = searched.counterfactual_prediction.unwrap();
        assert_eq!(prediction.predicted_class, stored.predicted_class);
        if searched.success {
            assert_eq!(stored.predicted_class, result.target_class);
        }
    }

    if let Some(best) = result.best() {
        let best_score = best.score().unwrap();
        for outcome in result.counterfactuals.values() {
            if let Some(score) = outcome.result().filter(|r| r.success).and_then(|r| r.score()) {
                assert!(score <= best_score);
            }
        }
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let model = small_model();
    let (_, image) = textured(model.shape(), 5);
    let explainer = CounterfactualExplainer::new(small_masks()).with_oracle(&model);

    let first = explainer.generate(&image, 0).unwrap();
    let second = explainer.generate(&image, 0).unwrap();

    assert_eq!(
        serde_json::to_value(&first.counterfactuals).unwrap(),
        serde_json::to_value(&second.counterfactuals).unwrap()
    );
    assert_eq!(first.summary, second.summary);
    for method in Method::ALL {
        let images = |r: &ComprehensiveResult| {
            r.outcome(method)
                .and_then(MethodOutcome::result)
                .and_then(|s| s.counterfactual_image.clone())
        };
        assert_eq!(images(&first), images(&second));
    }
}

#[test]
fn test_report_and_visuals() {
    let model = small_model();
    let (original, image) = textured(model.shape(), 9);
    let result = CounterfactualExplainer::new(small_masks())
        .with_oracle(&model)
        .generate(&image, 0)
        .unwrap();

    let report = serde_json::to_value(&result).unwrap();
    assert_eq!(report["target_class"], 1);
    assert_eq!(report["summary"]["total_methods_tried"], 3);
    for method in Method::ALL {
        assert!(report["counterfactuals"].get(method.as_str()).is_some());
    }

    let visuals = PngRenderer::new(original).render(&result).unwrap();
    let rendered: Vec<_> = visuals.methods.keys().copied().collect();
    let produced: Vec<_> = result
        .counterfactuals
        .iter()
        .filter(|(_, o)| o.result().is_some_and(|r| r.counterfactual_image.is_some()))
        .map(|(m, _)| *m)
        .collect();
    assert_eq!(rendered, produced);
    assert!(image_decodes(&visuals.comparison));
}

fn image_decodes(bytes: &[u8]) -> bool {
    cfx::render::decode_image(bytes, ImageShape::new(1, 4, 4)).is_ok()
}
