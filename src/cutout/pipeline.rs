use std::borrow::Cow;

use image::{Rgb, Rgba};
use imageproc::definitions::Image;
use tracing::{debug, info};

use super::compositor::Compositor;
use super::engine::SegmentationEngine;
use super::inter_area::InterAreaResize;
use super::segmenter::{SegmentationHints, Segmenter};
use crate::config::SegmentationConfig;
use crate::error::SegmentationError;
use crate::utils::validate_non_empty_image;

/// Dimensions that fit inside a `max`×`max` box with the aspect ratio kept.
///
/// Images already inside the box are returned unchanged; nothing is ever
/// enlarged and no side drops below one pixel.
///
/// ```
/// use imageops_cutout::working_dimensions;
///
/// assert_eq!(working_dimensions(1600, 1200, 800), (800, 600));
/// assert_eq!(working_dimensions(640, 480, 800), (640, 480));
/// ```
pub fn working_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    let fit = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max);
    (fit(width), fit(height))
}

/// The image the segmenter actually sees.
#[derive(Debug, Clone)]
pub struct WorkingImage<'a> {
    pub image: Cow<'a, Image<Rgb<u8>>>,
    /// Working size divided by original size; 1.0 when no resampling happened
    pub scale: f64,
}

/// Downscales `image` with area interpolation when it exceeds `max`.
///
/// # Errors
///
/// * `SegmentationError::EmptyImage` - `image` has a zero dimension
/// * `SegmentationError::Resize` - the area resize failed
pub fn prepare_working_image(
    image: &Image<Rgb<u8>>,
    max: u32,
) -> Result<WorkingImage<'_>, SegmentationError> {
    let (width, height) = image.dimensions();
    validate_non_empty_image(width, height, "prepare_working_image")
        .map_err(|_| SegmentationError::EmptyImage { width, height })?;

    let (target_width, target_height) = working_dimensions(width, height, max);
    if (target_width, target_height) == (width, height) {
        debug!(width, height, "image fits the working size, no resampling");
        return Ok(WorkingImage {
            image: Cow::Borrowed(image),
            scale: 1.0,
        });
    }

    info!(
        width,
        height, target_width, target_height, "downscaling to working resolution"
    );
    let resized = InterAreaResize::new(target_width, target_height)?.resize(image)?;
    Ok(WorkingImage {
        image: Cow::Owned(resized),
        scale: f64::from(target_width) / f64::from(width),
    })
}

/// End-to-end background removal: downscale, segment, composite.
///
/// # Examples
///
/// ```
/// use image::Rgb;
/// use imageops_cutout::{BackgroundRemover, Image, SegmentationConfig};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let photo: Image<Rgb<u8>> = Image::from_fn(120, 90, |x, y| {
///     if (30..90).contains(&x) && (20..70).contains(&y) {
///         Rgb([230, 180, 40])
///     } else {
///         Rgb([30, 60, 120])
///     }
/// });
///
/// let remover = BackgroundRemover::new(SegmentationConfig::default().with_max_working_dimension(64))?;
/// let cutout = remover.remove_background(&photo)?;
/// assert_eq!(cutout.dimensions(), (120, 90));
/// # Ok(())
/// # }
/// ```
pub struct BackgroundRemover {
    config: SegmentationConfig,
    segmenter: Box<dyn Segmenter>,
}

impl BackgroundRemover {
    /// Remover backed by the graph-cut [`SegmentationEngine`].
    ///
    /// # Errors
    ///
    /// * `SegmentationError::InvalidConfig` - `config` fails validation
    pub fn new(config: SegmentationConfig) -> Result<Self, SegmentationError> {
        let engine = SegmentationEngine::new(config.clone())?;
        Self::with_segmenter(config, Box::new(engine))
    }

    /// Remover backed by any [`Segmenter`].
    ///
    /// # Errors
    ///
    /// * `SegmentationError::InvalidConfig` - `config` fails validation
    pub fn with_segmenter(
        config: SegmentationConfig,
        segmenter: Box<dyn Segmenter>,
    ) -> Result<Self, SegmentationError> {
        config.validate()?;
        Ok(Self { config, segmenter })
    }

    pub const fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Returns `image` as RGBA with the background made transparent.
    ///
    /// The output always has the dimensions of `image`.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::EmptyImage` - `image` has a zero dimension
    /// * `SegmentationError::InvalidGeometry` - the working image is too small for the margin
    /// * `SegmentationError::Resize` / `SegmentationError::AlphaMask` - resampling failed
    pub fn remove_background(
        &self,
        image: &Image<Rgb<u8>>,
    ) -> Result<Image<Rgba<u8>>, SegmentationError> {
        let working = prepare_working_image(image, self.config.max_working_dimension)?;
        let mask = self
            .segmenter
            .segment(&working.image, &SegmentationHints::default())?;

        let foreground = mask.pixels().filter(|pixel| pixel[0] > 0).count();
        info!(
            scale = working.scale,
            foreground,
            total = mask.len(),
            "segmentation mask computed"
        );

        Ok(Compositor::composite(image, &mask)?)
    }
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_two_tone_image;
    use image::Luma;

    /// Marks everything foreground, to observe what the pipeline passes in.
    struct RecordingSegmenter {
        expected: (u32, u32),
    }

    impl Segmenter for RecordingSegmenter {
        fn segment(
            &self,
            image: &Image<Rgb<u8>>,
            _hints: &SegmentationHints,
        ) -> Result<Image<Luma<u8>>, SegmentationError> {
            assert_eq!(image.dimensions(), self.expected);
            Ok(Image::from_pixel(image.width(), image.height(), Luma([255])))
        }
    }

    #[test]
    fn working_dimensions_follow_thumbnail_rules() {
        assert_eq!(working_dimensions(800, 800, 800), (800, 800));
        assert_eq!(working_dimensions(801, 400, 800), (800, 400));
        assert_eq!(working_dimensions(1000, 250, 800), (800, 200));
        assert_eq!(working_dimensions(300, 1200, 800), (200, 800));
        assert_eq!(working_dimensions(5000, 1, 800), (800, 1));
    }

    #[test]
    fn image_at_max_dimension_is_borrowed() {
        let image: Image<Rgb<u8>> = Image::from_pixel(64, 40, Rgb([5, 6, 7]));
        let working = prepare_working_image(&image, 64).unwrap();
        assert!(matches!(working.image, Cow::Borrowed(_)));
        assert_eq!(working.scale, 1.0);
    }

    #[test]
    fn large_image_is_downscaled() {
        let image: Image<Rgb<u8>> = Image::from_pixel(200, 100, Rgb([5, 6, 7]));
        let working = prepare_working_image(&image, 50).unwrap();
        assert_eq!(working.image.dimensions(), (50, 25));
        assert_eq!(working.scale, 0.25);
    }

    #[test]
    fn empty_image_is_rejected() {
        let image: Image<Rgb<u8>> = Image::new(0, 10);
        assert_eq!(
            prepare_working_image(&image, 50).unwrap_err(),
            SegmentationError::EmptyImage {
                width: 0,
                height: 10
            }
        );
    }

    #[test]
    fn custom_segmenter_receives_working_image() {
        let config = SegmentationConfig::default().with_max_working_dimension(30);
        let remover = BackgroundRemover::with_segmenter(
            config,
            Box::new(RecordingSegmenter { expected: (30, 15) }),
        )
        .unwrap();

        let image: Image<Rgb<u8>> = Image::from_pixel(90, 45, Rgb([1, 2, 3]));
        let cutout = remover.remove_background(&image).unwrap();
        assert_eq!(cutout.dimensions(), (90, 45));
        assert!(cutout.pixels().all(|pixel| pixel[3] == 255));
    }

    #[test]
    fn remove_background_clears_the_border() {
        let image = create_two_tone_image(80, 60, 12, [220, 40, 40], [30, 30, 150]);
        let remover = BackgroundRemover::new(SegmentationConfig::default()).unwrap();
        let cutout = remover.remove_background(&image).unwrap();

        assert_eq!(cutout.dimensions(), (80, 60));
        assert_eq!(cutout.get_pixel(0, 0), &Rgba([30, 30, 150, 0]));
        assert_eq!(cutout.get_pixel(40, 30), &Rgba([220, 40, 40, 255]));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SegmentationConfig::default().with_max_iterations(0);
        assert!(matches!(
            BackgroundRemover::new(config),
            Err(SegmentationError::InvalidConfig(_))
        ));
    }
}
