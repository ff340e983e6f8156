//! Iterative graph-cut segmentation.
//!
//! The engine alternates between fitting the appearance models to the
//! current labels and re-cutting the energy graph with the new models:
//!
//! ```text
//! Initialized → Fitting → Cutting ─┬─→ Fitting   (labels still moving)
//!                                  └─→ Converged → Done
//! ```
//!
//! Each Fitting step performs one EM update starting from the previous
//! models, kept only when it lowers the cost of the class's samples. Each
//! Cutting step finds the exact minimum of the energy for fixed models, so
//! the energy never increases from one cut to the next.

use image::{Luma, Rgb};
use imageproc::definitions::Image;
use tracing::{debug, instrument, warn};

use super::gmm::{Color, GaussianMixture, ModelError};
use super::graph::{EnergyGraph, SmoothnessTerm};
use super::maxflow::CutSide;
use super::raster::{Label, LabelMap, RasterBuffer};
use super::segmenter::{SegmentationHints, Segmenter};
use super::trimap::TrimapInitializer;
use crate::config::SegmentationConfig;
use crate::error::SegmentationError;
use crate::utils::validate_non_empty_image;

/// Foreground or background, as a whole class of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Foreground,
    Background,
}

/// How a segmentation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationOutcome {
    /// At most the convergence threshold of pixels changed in the last cut
    Converged { iterations: usize },
    /// The iteration cap was reached first
    IterationLimit { iterations: usize },
    /// No usable appearance model could be fitted; the mask is uniform
    Degenerate { fill: Class },
}

/// Statistics of one Cutting step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: usize,
    /// Non-pinned pixels whose label changed in this cut
    pub changed_pixels: usize,
    /// Energy of the labelling after the cut
    pub energy: f64,
    /// Pixels connected to neither terminal, defaulted to probable background
    pub orphans: usize,
}

/// Result of [`SegmentationEngine::run`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    labels: LabelMap,
    outcome: SegmentationOutcome,
    history: Vec<IterationReport>,
}

impl Segmentation {
    pub const fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub const fn outcome(&self) -> SegmentationOutcome {
        self.outcome
    }

    pub fn history(&self) -> &[IterationReport] {
        &self.history
    }

    /// Number of Cutting steps performed.
    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    /// Binary 0/255 mask at the working resolution.
    ///
    /// A degenerate run yields a uniform mask of the majority class.
    pub fn mask(&self) -> Image<Luma<u8>> {
        let (width, height) = self.labels.dimensions();
        match self.outcome {
            SegmentationOutcome::Degenerate { fill } => {
                let value = if fill == Class::Foreground { 255 } else { 0 };
                Image::from_pixel(width, height, Luma([value]))
            }
            _ => self.labels.to_mask(),
        }
    }
}

#[derive(Debug, Clone)]
struct Models {
    foreground: GaussianMixture,
    background: GaussianMixture,
}

#[derive(Debug)]
enum EngineState {
    Initialized,
    Fitting { previous: Option<Models> },
    Cutting { models: Models },
    Converged(SegmentationOutcome),
    Done(SegmentationOutcome),
}

/// GrabCut-style segmentation engine.
///
/// # Examples
///
/// ```
/// use image::Rgb;
/// use imageops_cutout::{Image, SegmentationConfig, SegmentationEngine, SegmentationHints};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let image: Image<Rgb<u8>> = Image::from_fn(64, 64, |x, y| {
///     if (16..48).contains(&x) && (16..48).contains(&y) {
///         Rgb([220, 40, 40])
///     } else {
///         Rgb([20, 20, 160])
///     }
/// });
/// let engine = SegmentationEngine::new(SegmentationConfig::default())?;
/// let segmentation = engine.run(&image, &SegmentationHints::default())?;
/// assert_eq!(segmentation.mask().dimensions(), (64, 64));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SegmentationEngine {
    config: SegmentationConfig,
}

impl SegmentationEngine {
    /// # Errors
    ///
    /// * `SegmentationError::InvalidConfig` - `config` fails validation
    pub fn new(config: SegmentationConfig) -> Result<Self, SegmentationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segments `image` into foreground and background.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::EmptyImage` - `image` has a zero dimension
    /// * `SegmentationError::InvalidGeometry` - the initial rectangle has no area
    #[instrument(level = "debug", skip_all, fields(width = image.width(), height = image.height()))]
    pub fn run(
        &self,
        image: &Image<Rgb<u8>>,
        hints: &SegmentationHints,
    ) -> Result<Segmentation, SegmentationError> {
        let (width, height) = image.dimensions();
        validate_non_empty_image(width, height, "SegmentationEngine")
            .map_err(|_| SegmentationError::EmptyImage { width, height })?;

        let trimap = TrimapInitializer::new(self.config.margin_fraction);
        let labels = match hints.rect {
            Some(rect) => trimap.initialize_with_rect(width, height, rect)?,
            None => trimap.initialize(width, height)?,
        };
        let mut raster = RasterBuffer::new(image, labels)?;
        let mut history = Vec::new();

        let mut state = if is_flat(image) {
            let fill = majority_class(raster.labels());
            warn!(?fill, "image has a single colour, nothing to separate");
            EngineState::Done(SegmentationOutcome::Degenerate { fill })
        } else {
            EngineState::Initialized
        };

        let smoothness = SmoothnessTerm::new(image, self.config.gamma, self.config.neighborhood);
        let pixel_count = raster.labels().len() as f64;
        let stable_threshold = self.config.convergence_ratio * pixel_count;

        let outcome = loop {
            state = match state {
                EngineState::Initialized => EngineState::Fitting { previous: None },
                EngineState::Fitting { previous } => {
                    match self.fit_models(&raster, previous.as_ref()) {
                        Ok(models) => EngineState::Cutting { models },
                        Err(error) => {
                            let fill = majority_class(raster.labels());
                            warn!(%error, ?fill, "appearance model is degenerate");
                            EngineState::Done(SegmentationOutcome::Degenerate { fill })
                        }
                    }
                }
                EngineState::Cutting { models } => {
                    let report = cut(&mut raster, &smoothness, &models, history.len() + 1);
                    history.push(report);
                    let iterations = history.len();

                    if report.changed_pixels as f64 <= stable_threshold {
                        EngineState::Converged(SegmentationOutcome::Converged { iterations })
                    } else if iterations >= self.config.max_iterations {
                        EngineState::Converged(SegmentationOutcome::IterationLimit { iterations })
                    } else {
                        EngineState::Fitting {
                            previous: Some(models),
                        }
                    }
                }
                EngineState::Converged(outcome) => {
                    debug!(?outcome, "segmentation finished");
                    EngineState::Done(outcome)
                }
                EngineState::Done(outcome) => break outcome,
            };
        };

        Ok(Segmentation {
            labels: raster.into_labels(),
            outcome,
            history,
        })
    }

    fn fit_models(
        &self,
        raster: &RasterBuffer<'_>,
        previous: Option<&Models>,
    ) -> Result<Models, ModelError> {
        let foreground_samples = raster.samples(Label::is_foreground);
        let background_samples = raster.samples(|label| !label.is_foreground());

        match previous {
            None => Ok(Models {
                foreground: GaussianMixture::fit(&foreground_samples, self.config.components)?,
                background: GaussianMixture::fit(&background_samples, self.config.components)?,
            }),
            Some(models) => Ok(Models {
                foreground: refine_or_keep(
                    &models.foreground,
                    &foreground_samples,
                    Class::Foreground,
                )?,
                background: refine_or_keep(
                    &models.background,
                    &background_samples,
                    Class::Background,
                )?,
            }),
        }
    }
}

/// One EM step on `model`, unless it would raise the cost of `samples`.
///
/// Covariance regularisation and dropped components can make a step worse
/// than the model it started from. Keeping the cheaper model means the
/// energy cannot rise between cuts.
fn refine_or_keep(
    model: &GaussianMixture,
    samples: &[Color],
    class: Class,
) -> Result<GaussianMixture, ModelError> {
    let refined = model.refine(samples)?;
    let (before, after) = (model.total_cost(samples), refined.total_cost(samples));
    if after > before {
        debug!(?class, before, after, "refined model fits worse, keeping the previous one");
        Ok(model.clone())
    } else {
        Ok(refined)
    }
}

impl Segmenter for SegmentationEngine {
    fn segment(
        &self,
        image: &Image<Rgb<u8>>,
        hints: &SegmentationHints,
    ) -> Result<Image<Luma<u8>>, SegmentationError> {
        Ok(self.run(image, hints)?.mask())
    }
}

/// One Cutting step: solve the graph and relabel every non-pinned pixel.
fn cut(
    raster: &mut RasterBuffer<'_>,
    smoothness: &SmoothnessTerm,
    models: &Models,
    iteration: usize,
) -> IterationReport {
    let graph = EnergyGraph::build(raster, smoothness, &models.foreground, &models.background);
    let cut = graph.solve();

    let mut changed_pixels = 0;
    let mut orphans = 0;
    for (label, side) in raster.labels_mut().as_mut_slice().iter_mut().zip(&cut.sides) {
        if label.is_pinned() {
            continue;
        }
        let updated = match side {
            CutSide::Source => Label::ProbableForeground,
            CutSide::Sink => Label::ProbableBackground,
            CutSide::Orphan => {
                orphans += 1;
                Label::ProbableBackground
            }
        };
        if *label != updated {
            *label = updated;
            changed_pixels += 1;
        }
    }
    if orphans > 0 {
        warn!(
            iteration,
            orphans, "pixels reached neither terminal after the cut, labelled probable background"
        );
    }

    let energy = graph.energy(raster.labels());
    debug!(iteration, changed_pixels, energy, flow = cut.flow, "cut step");

    IterationReport {
        iteration,
        changed_pixels,
        energy,
        orphans,
    }
}

/// Class holding more pixels; ties go to the foreground.
fn majority_class(labels: &LabelMap) -> Class {
    let foreground = labels.count(Label::is_foreground);
    if foreground * 2 >= labels.len() {
        Class::Foreground
    } else {
        Class::Background
    }
}

fn is_flat(image: &Image<Rgb<u8>>) -> bool {
    let mut pixels = image.pixels();
    match pixels.next() {
        Some(first) => pixels.all(|pixel| pixel == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_noisy_subject_image, create_textured_gradient_image, create_two_tone_image,
        mask_agreement,
    };

    fn engine() -> SegmentationEngine {
        SegmentationEngine::new(SegmentationConfig::default()).unwrap()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = SegmentationConfig::default().with_components(0);
        assert!(matches!(
            SegmentationEngine::new(config),
            Err(SegmentationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn two_tone_subject_matches_rectangle() {
        let image = create_two_tone_image(60, 60, 3, [230, 60, 30], [30, 90, 200]);
        let segmentation = engine().run(&image, &SegmentationHints::default()).unwrap();

        assert!(matches!(
            segmentation.outcome(),
            SegmentationOutcome::Converged { iterations: 1 }
        ));
        let labels = segmentation.labels();
        assert_eq!(labels.get(1, 1), Some(Label::DefiniteBackground));
        assert_eq!(labels.get(30, 30), Some(Label::ProbableForeground));
        assert_eq!(labels.count(Label::is_foreground), 54 * 54);
    }

    #[test]
    fn flat_image_is_degenerate_foreground() {
        let image = Image::from_pixel(40, 40, Rgb([90, 90, 90]));
        let segmentation = engine().run(&image, &SegmentationHints::default()).unwrap();

        assert_eq!(
            segmentation.outcome(),
            SegmentationOutcome::Degenerate {
                fill: Class::Foreground
            }
        );
        assert_eq!(segmentation.iterations(), 0);
        assert!(segmentation.mask().pixels().all(|pixel| pixel[0] == 255));
    }

    #[test]
    fn rect_covering_whole_image_is_degenerate() {
        // 10px images floor the margin to zero, leaving no background samples
        let image = create_two_tone_image(10, 10, 2, [200, 0, 0], [0, 0, 200]);
        let segmentation = engine().run(&image, &SegmentationHints::default()).unwrap();
        assert_eq!(
            segmentation.outcome(),
            SegmentationOutcome::Degenerate {
                fill: Class::Foreground
            }
        );
    }

    #[test]
    fn collapsed_rect_is_reported() {
        let config = SegmentationConfig::default().with_margin_fraction(0.5);
        let engine = SegmentationEngine::new(config).unwrap();
        let image = create_two_tone_image(2, 2, 0, [1, 2, 3], [4, 5, 6]);
        assert!(matches!(
            engine.run(&image, &SegmentationHints::default()),
            Err(SegmentationError::InvalidGeometry { margin: 1, .. })
        ));
    }

    #[test]
    fn explicit_rect_hint_is_used() {
        let image = create_two_tone_image(30, 30, 5, [250, 250, 0], [0, 80, 0]);
        let hints = SegmentationHints::with_rect(crate::cutout::raster::Rect::new(5, 5, 20, 20));
        let segmentation = engine().run(&image, &hints).unwrap();
        assert_eq!(segmentation.labels().get(4, 4), Some(Label::DefiniteBackground));
        assert_eq!(segmentation.labels().count(Label::is_foreground), 400);
    }

    #[test]
    fn energy_never_increases() {
        let image = create_noisy_subject_image(48, 48, 7);
        let config = SegmentationConfig::default()
            .with_max_iterations(6)
            .with_convergence_ratio(0.0);
        let segmentation = SegmentationEngine::new(config)
            .unwrap()
            .run(&image, &SegmentationHints::default())
            .unwrap();
        assert_energy_non_increasing(&segmentation);
    }

    fn assert_energy_non_increasing(segmentation: &Segmentation) {
        for pair in segmentation.history().windows(2) {
            let tolerance = 1e-9 * pair[0].energy.abs().max(1.0);
            assert!(
                pair[1].energy <= pair[0].energy + tolerance,
                "energy rose from {} to {}",
                pair[0].energy,
                pair[1].energy
            );
        }
    }

    #[test]
    fn energy_never_increases_on_quantised_texture() {
        let image = create_textured_gradient_image(200, 150);
        let config = SegmentationConfig::default().with_convergence_ratio(0.0);
        let segmentation = SegmentationEngine::new(config)
            .unwrap()
            .run(&image, &SegmentationHints::default())
            .unwrap();
        assert_energy_non_increasing(&segmentation);
    }

    #[test]
    fn refine_or_keep_never_raises_the_cost() {
        // model fitted to one cluster, then refined towards a far away one
        let near: Vec<Color> = (0..40)
            .map(|i| [100.0 + f64::from(i % 5), 100.0, 100.0 + f64::from(i % 3)])
            .collect();
        let far: Vec<Color> = (0..40)
            .map(|i| [10.0, 200.0 + f64::from(i % 7), 30.0])
            .collect();
        let model = GaussianMixture::fit(&near, 3).unwrap();

        for samples in [&near, &far] {
            let kept = refine_or_keep(&model, samples, Class::Foreground).unwrap();
            assert!(kept.total_cost(samples) <= model.total_cost(samples));
        }
    }

    #[test]
    fn zero_ratio_converges_when_nothing_changes() {
        let image = create_two_tone_image(60, 60, 3, [230, 60, 30], [30, 90, 200]);
        let config = SegmentationConfig::default().with_convergence_ratio(0.0);
        let segmentation = SegmentationEngine::new(config)
            .unwrap()
            .run(&image, &SegmentationHints::default())
            .unwrap();

        assert_eq!(segmentation.history()[0].changed_pixels, 0);
        assert_eq!(
            segmentation.outcome(),
            SegmentationOutcome::Converged { iterations: 1 }
        );
    }

    #[test]
    fn pinned_background_stays_background() {
        let image = create_noisy_subject_image(40, 32, 3);
        let segmentation = engine().run(&image, &SegmentationHints::default()).unwrap();
        let margin = TrimapInitializer::new(0.05).margin(40, 32);
        let labels = segmentation.labels();

        for y in 0..32 {
            for x in 0..40 {
                let outside = x < margin || y < margin || x >= 40 - margin || y >= 32 - margin;
                if outside {
                    assert_eq!(labels.get(x, y), Some(Label::DefiniteBackground));
                }
            }
        }
    }

    #[test]
    fn runs_are_deterministic() {
        let image = create_noisy_subject_image(36, 36, 11);
        let first = engine().run(&image, &SegmentationHints::default()).unwrap();
        let second = engine().run(&image, &SegmentationHints::default()).unwrap();
        assert_eq!(first.labels(), second.labels());
        assert_eq!(first.mask(), second.mask());
    }

    #[test]
    fn segmenter_returns_the_run_mask() {
        let image = create_noisy_subject_image(32, 28, 5);
        let engine = engine();
        let hints = SegmentationHints::default();

        let from_trait = engine.segment(&image, &hints).unwrap();
        let from_run = engine.run(&image, &hints).unwrap().mask();
        assert_eq!(mask_agreement(&from_trait, &from_run), 1.0);
    }

    #[test]
    fn majority_class_ties_go_to_foreground() {
        let mut labels = LabelMap::filled(2, 1, Label::ProbableBackground);
        assert_eq!(majority_class(&labels), Class::Background);
        labels.set(0, 0, Label::ProbableForeground);
        assert_eq!(majority_class(&labels), Class::Foreground);
    }
}
