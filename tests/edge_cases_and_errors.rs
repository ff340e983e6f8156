//! Edge case and error condition tests
//!
//! Boundary sizes, degenerate inputs and invalid parameters, checked through
//! the public API.

use image::{Luma, Rgb};
use imageops_cutout::{
    AlphaMaskError, ApplyAlphaMask, BackgroundRemover, Class, Image, InterAreaError,
    InterAreaResize, Label, Rect, SegmentationConfig, SegmentationEngine, SegmentationError,
    SegmentationHints, SegmentationOutcome, Segmenter,
};

fn engine() -> SegmentationEngine {
    SegmentationEngine::new(SegmentationConfig::default()).unwrap()
}

/// Red square in the middle of a blue field
fn create_subject_image(width: u32, height: u32) -> Image<Rgb<u8>> {
    Image::from_fn(width, height, |x, y| {
        if x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4 {
            Rgb([210, 40, 40])
        } else {
            Rgb([30, 50, 170])
        }
    })
}

#[test]
fn test_single_pixel_image_is_degenerate_foreground() {
    // margin of a 1x1 image is 0, so the only pixel is probable foreground
    let image: Image<Rgb<u8>> = Image::from_pixel(1, 1, Rgb([12, 34, 56]));
    let segmentation = engine()
        .run(&image, &SegmentationHints::default())
        .unwrap();

    assert_eq!(
        segmentation.outcome(),
        SegmentationOutcome::Degenerate {
            fill: Class::Foreground
        }
    );
    assert_eq!(segmentation.mask().get_pixel(0, 0), &Luma([255]));
}

#[test]
fn test_empty_image_is_rejected() {
    let image: Image<Rgb<u8>> = Image::new(0, 0);
    assert_eq!(
        engine()
            .run(&image, &SegmentationHints::default())
            .unwrap_err(),
        SegmentationError::EmptyImage {
            width: 0,
            height: 0
        }
    );

    let remover = BackgroundRemover::new(SegmentationConfig::default()).unwrap();
    assert!(matches!(
        remover.remove_background(&Image::new(7, 0)),
        Err(SegmentationError::EmptyImage { .. })
    ));
}

#[test]
fn test_collapsed_margin_rectangle_is_invalid_geometry() {
    let config = SegmentationConfig::default().with_margin_fraction(0.5);
    let engine = SegmentationEngine::new(config).unwrap();

    let image = create_subject_image(6, 6);
    assert_eq!(
        engine
            .run(&image, &SegmentationHints::default())
            .unwrap_err(),
        SegmentationError::InvalidGeometry {
            width: 6,
            height: 6,
            margin: 3
        }
    );
}

#[test]
fn test_rect_hint_outside_image_is_invalid_geometry() {
    let image = create_subject_image(20, 20);
    for rect in [
        Rect::new(15, 5, 10, 5),
        Rect::new(5, 5, 0, 10),
        Rect::new(20, 0, 1, 1),
    ] {
        let result = engine().run(&image, &SegmentationHints::with_rect(rect));
        assert!(
            matches!(result, Err(SegmentationError::InvalidGeometry { .. })),
            "{rect:?} should be rejected"
        );
    }
}

#[test]
fn test_rect_hint_covering_whole_image_has_no_background() {
    let image = create_subject_image(16, 16);
    let hints = SegmentationHints::with_rect(Rect::new(0, 0, 16, 16));
    let segmentation = engine().run(&image, &hints).unwrap();

    assert_eq!(
        segmentation.outcome(),
        SegmentationOutcome::Degenerate {
            fill: Class::Foreground
        }
    );
    assert!(segmentation.mask().pixels().all(|pixel| pixel[0] == 255));
}

#[test]
fn test_uniform_image_yields_uniform_mask() {
    let image: Image<Rgb<u8>> = Image::from_pixel(50, 30, Rgb([128, 128, 128]));
    let segmentation = engine()
        .run(&image, &SegmentationHints::default())
        .unwrap();

    assert_eq!(segmentation.iterations(), 0);
    let mask = segmentation.mask();
    let first = mask.get_pixel(0, 0)[0];
    assert!(first == 0 || first == 255);
    assert!(mask.pixels().all(|pixel| pixel[0] == first));

    // labels keep the trimap pinning even when the mask is filled
    assert_eq!(
        segmentation.labels().get(0, 0),
        Some(Label::DefiniteBackground)
    );
}

#[test]
fn test_thin_strip_images_segment_without_error() {
    let remover = BackgroundRemover::new(SegmentationConfig::default()).unwrap();
    for (width, height) in [(1, 40), (40, 1), (2, 2), (3, 1)] {
        let image = create_subject_image(width, height);
        let cutout = remover.remove_background(&image).unwrap();
        assert_eq!(cutout.dimensions(), (width, height));
    }
}

#[test]
fn test_invalid_config_values() {
    let cases = [
        SegmentationConfig::default().with_margin_fraction(-0.1),
        SegmentationConfig::default().with_margin_fraction(0.75),
        SegmentationConfig::default().with_margin_fraction(f64::NAN),
        SegmentationConfig::default().with_max_iterations(0),
        SegmentationConfig::default().with_components(0),
        SegmentationConfig::default().with_gamma(-1.0),
        SegmentationConfig::default().with_gamma(f64::INFINITY),
        SegmentationConfig::default().with_convergence_ratio(1.5),
        SegmentationConfig::default().with_max_working_dimension(0),
    ];
    for config in cases {
        assert!(
            matches!(
                SegmentationEngine::new(config.clone()),
                Err(SegmentationError::InvalidConfig(_))
            ),
            "{config:?} should be rejected"
        );
    }
}

#[test]
fn test_zero_gamma_still_segments() {
    let config = SegmentationConfig::default().with_gamma(0.0);
    let engine = SegmentationEngine::new(config).unwrap();
    let image = create_subject_image(32, 32);

    let mask = engine
        .segment(&image, &SegmentationHints::default())
        .unwrap();
    assert_eq!(mask.get_pixel(16, 16)[0], 255);
    assert_eq!(mask.get_pixel(0, 0)[0], 0);
}

#[test]
fn test_alpha_mask_dimension_mismatch() {
    let image: Image<Rgb<u8>> = Image::new(4, 4);
    let mask: Image<Luma<u8>> = Image::new(4, 3);
    assert_eq!(
        image.apply_alpha_mask(&mask).unwrap_err(),
        AlphaMaskError::DimensionMismatch {
            expected: (4, 4),
            actual: (4, 3)
        }
    );
}

#[test]
fn test_resize_errors_convert_into_segmentation_errors() {
    let image: Image<Rgb<u8>> = Image::new(4, 4);
    let error = InterAreaResize::new(5, 5)
        .unwrap()
        .resize(&image)
        .unwrap_err();
    assert_eq!(
        error,
        InterAreaError::UpscalingNotSupported {
            src_width: 4,
            src_height: 4,
            target_width: 5,
            target_height: 5
        }
    );
    assert_eq!(
        SegmentationError::from(error.clone()),
        SegmentationError::Resize(error)
    );
}
