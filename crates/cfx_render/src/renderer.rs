//! Turning a [`ComprehensiveResult`] into PNG files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cfx_core::ImageData;
use cfx_search::{ComprehensiveResult, Method};
use image::{DynamicImage, GenericImage, Rgb, RgbImage};

use crate::codec::{encode_png, image_to_png, to_dynamic};
use crate::colormap::heatmap;
use crate::error::{RenderError, Result};

/// Produces visual artefacts from a finished search.
///
/// Rendering reads the result only; a failure leaves it untouched.
pub trait Renderer {
    /// Render every method's images and a comparison overview.
    fn render(&self, result: &ComprehensiveResult) -> Result<Visualizations>;
}

/// PNG images for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodImages {
    /// The counterfactual image.
    pub counterfactual: Option<Vec<u8>>,
    /// Heat map of the perturbation or difference map.
    pub auxiliary_map: Option<Vec<u8>>,
}

/// Everything a renderer produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visualizations {
    /// Per-method images, for methods that produced a counterfactual.
    pub methods: BTreeMap<Method, MethodImages>,
    /// Grid of original, counterfactual and map, one row per successful method.
    pub comparison: Vec<u8>,
}

impl Visualizations {
    /// Write all images into `dir` and return the written paths.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        let mut write = |name: String, bytes: &[u8]| -> Result<()> {
            let path = dir.join(name);
            std::fs::write(&path, bytes)?;
            written.push(path);
            Ok(())
        };

        for (method, images) in &self.methods {
            if let Some(bytes) = &images.counterfactual {
                write(format!("{method}_counterfactual.png"), bytes)?;
            }
            if let Some(bytes) = &images.auxiliary_map {
                write(format!("{method}_map.png"), bytes)?;
            }
        }
        write("comparison.png".to_string(), &self.comparison)?;
        Ok(written)
    }
}

/// Renders PNGs against the original image.
#[derive(Debug, Clone)]
pub struct PngRenderer {
    original: ImageData,
    gap: u32,
}

const BACKGROUND: Rgb<u8> = Rgb([32, 32, 32]);

impl PngRenderer {
    /// Create a renderer for results computed on `original`.
    pub fn new(original: ImageData) -> Self {
        Self { original, gap: 4 }
    }

    /// Set the spacing between grid tiles in pixels.
    #[must_use]
    pub fn with_gap(mut self, gap: u32) -> Self {
        self.gap = gap;
        self
    }

    fn check_shape(&self, data: &ImageData) -> Result<()> {
        if data.shape() != self.original.shape() {
            return Err(RenderError::ShapeMismatch(format!(
                "{} vs original {}",
                data.shape(),
                self.original.shape()
            )));
        }
        Ok(())
    }

    fn comparison(&self, result: &ComprehensiveResult) -> Result<Vec<u8>> {
        let shape = self.original.shape();
        let (width, height) = (shape.width() as u32, shape.height() as u32);
        let original = to_dynamic(&self.original)?.to_rgb8();

        let rows: Vec<(&ImageData, Option<&ImageData>)> = result
            .counterfactuals
            .values()
            .filter_map(|outcome| outcome.result())
            .filter(|r| r.success)
            .filter_map(|r| r.counterfactual_image.as_ref().map(|img| (img, r.auxiliary_map.as_ref())))
            .collect();

        let columns = if rows.is_empty() { 1 } else { 3 };
        let n_rows = rows.len().max(1) as u32;
        let mut canvas = RgbImage::from_pixel(
            columns * width + (columns - 1) * self.gap,
            n_rows * height + (n_rows - 1) * self.gap,
            BACKGROUND,
        );

        let place = |canvas: &mut RgbImage, tile: &RgbImage, col: u32, row: u32| -> Result<()> {
            canvas
                .copy_from(tile, col * (width + self.gap), row * (height + self.gap))
                .map_err(|e| RenderError::Encode(e.to_string()))
        };

        if rows.is_empty() {
            place(&mut canvas, &original, 0, 0)?;
        }
        for (row, (counterfactual, map)) in rows.into_iter().enumerate() {
            let row = row as u32;
            place(&mut canvas, &original, 0, row)?;
            self.check_shape(counterfactual)?;
            place(&mut canvas, &to_dynamic(counterfactual)?.to_rgb8(), 1, row)?;
            if let Some(map) = map {
                self.check_shape(map)?;
                place(&mut canvas, &heatmap(map), 2, row)?;
            }
        }

        encode_png(&DynamicImage::ImageRgb8(canvas))
    }
}

impl Renderer for PngRenderer {
    fn render(&self, result: &ComprehensiveResult) -> Result<Visualizations> {
        let mut methods = BTreeMap::new();
        for (method, outcome) in &result.counterfactuals {
            let Some(search) = outcome.result() else {
                continue;
            };
            let counterfactual = match &search.counterfactual_image {
                Some(img) => {
                    self.check_shape(img)?;
                    Some(image_to_png(img)?)
                }
                None => None,
            };
            let auxiliary_map = match &search.auxiliary_map {
                Some(map) => {
                    self.check_shape(map)?;
                    Some(encode_png(&DynamicImage::ImageRgb8(heatmap(map)))?)
                }
                None => None,
            };
            if counterfactual.is_some() || auxiliary_map.is_some() {
                methods.insert(
                    *method,
                    MethodImages {
                        counterfactual,
                        auxiliary_map,
                    },
                );
            }
        }

        let comparison = self.comparison(result)?;
        tracing::debug!("Rendered {} methods and comparison grid", methods.len());
        Ok(Visualizations {
            methods,
            comparison,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfx_core::{ImageShape, Prediction};
    use cfx_search::{MethodDetails, MethodOutcome, SearchResult, Summary};
    use image::GenericImageView;

    fn shape() -> ImageShape {
        ImageShape::new(3, 10, 12)
    }

    fn prediction(class: usize) -> Prediction {
        let mut probabilities = [0.2; 2];
        probabilities[class] = 0.8;
        Prediction::from_probabilities(probabilities).unwrap()
    }

    fn result_with(outcomes: Vec<(Method, MethodOutcome)>) -> ComprehensiveResult {
        let counterfactuals: BTreeMap<_, _> = outcomes.into_iter().collect();
        ComprehensiveResult {
            original_class: 0,
            target_class: 1,
            original_prediction: Some(prediction(0)),
            summary: Summary::from_outcomes(&counterfactuals),
            counterfactuals,
            elapsed_secs: 0.5,
        }
    }

    fn searched(method: Method, image: Option<ImageData>) -> MethodOutcome {
        MethodOutcome::Searched(SearchResult {
            method,
            success: image.is_some(),
            original_prediction: prediction(0),
            counterfactual_prediction: image.as_ref().map(|_| prediction(1)),
            auxiliary_map: image.as_ref().map(|_| ImageData::filled(shape(), 0.1)),
            counterfactual_image: image,
            perturbation_magnitude: 1.0,
            iterations_used: 3,
            details: MethodDetails::Optimization { final_loss: 0.1 },
            message: None,
        })
    }

    #[test]
    fn test_renders_decodable_pngs() {
        let original = ImageData::filled(shape(), 0.5);
        let result = result_with(vec![
            (Method::Adversarial, searched(Method::Adversarial, Some(ImageData::filled(shape(), 0.6)))),
            (Method::GradientOptimization, MethodOutcome::Failed { error: "boom".to_string() }),
            (Method::MaskBased, searched(Method::MaskBased, None)),
        ]);
        let before = debug_snapshot(&result);

        let visuals = PngRenderer::new(original).with_gap(2).render(&result).unwrap();

        assert_eq!(visuals.methods.len(), 1);
        let images = &visuals.methods[&Method::Adversarial];
        let cf = image::load_from_memory(images.counterfactual.as_ref().unwrap()).unwrap();
        assert_eq!(cf.dimensions(), (12, 10));
        assert!(images.auxiliary_map.is_some());

        let grid = image::load_from_memory(&visuals.comparison).unwrap();
        assert_eq!(grid.dimensions(), (3 * 12 + 2 * 2, 10));
        assert_eq!(before, debug_snapshot(&result));
    }

    #[test]
    fn test_grid_without_counterfactuals_shows_original() {
        let result = result_with(vec![(
            Method::Adversarial,
            MethodOutcome::Failed {
                error: "boom".to_string(),
            },
        )]);
        let visuals = PngRenderer::new(ImageData::filled(shape(), 0.5)).render(&result).unwrap();
        assert!(visuals.methods.is_empty());
        let grid = image::load_from_memory(&visuals.comparison).unwrap();
        assert_eq!(grid.dimensions(), (12, 10));
    }

    #[test]
    fn test_grid_skips_unsuccessful_methods() {
        let mut failed = searched(Method::Adversarial, Some(ImageData::filled(shape(), 0.6)));
        if let MethodOutcome::Searched(r) = &mut failed {
            r.success = false;
        }
        let result = result_with(vec![
            (Method::Adversarial, failed),
            (Method::MaskBased, searched(Method::MaskBased, Some(ImageData::filled(shape(), 0.4)))),
        ]);

        let visuals = PngRenderer::new(ImageData::filled(shape(), 0.5))
            .with_gap(0)
            .render(&result)
            .unwrap();

        // Both images are still exported, but only the mask row is compared.
        assert_eq!(visuals.methods.len(), 2);
        let grid = image::load_from_memory(&visuals.comparison).unwrap();
        assert_eq!(grid.dimensions(), (3 * 12, 10));
    }

    #[test]
    fn test_shape_mismatch() {
        let result = result_with(vec![(
            Method::MaskBased,
            searched(Method::MaskBased, Some(ImageData::filled(shape(), 0.6))),
        )]);
        let renderer = PngRenderer::new(ImageData::filled(ImageShape::new(1, 10, 12), 0.5));
        assert!(matches!(renderer.render(&result), Err(RenderError::ShapeMismatch(_))));
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = result_with(vec![(
            Method::MaskBased,
            searched(Method::MaskBased, Some(ImageData::filled(shape(), 0.6))),
        )]);
        let visuals = PngRenderer::new(ImageData::filled(shape(), 0.5)).render(&result).unwrap();

        let written = visuals.write_to_dir(dir.path()).unwrap();
        let names: Vec<_> = written
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(
            names,
            ["mask_based_counterfactual.png", "mask_based_map.png", "comparison.png"]
        );
        assert!(written.iter().all(|p| p.exists()));
    }

    fn debug_snapshot(result: &ComprehensiveResult) -> String {
        format!("{result:?}")
    }
}
