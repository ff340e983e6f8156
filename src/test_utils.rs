//! Test utilities for imageops-cutout
//!
//! Synthetic images with a known subject, so segmentation results can be
//! checked without fixture files. Only compiled when running tests.

use image::{Luma, Rgb};
use imageproc::definitions::Image;

/// Creates a 2x2 RGB image with known pixel values:
/// - (0,0): [200, 150, 100]
/// - (1,0): [100, 200, 150]
/// - (0,1): [150, 100, 200]
/// - (1,1): [50, 75, 25]
pub fn create_test_rgb_image() -> Image<Rgb<u8>> {
    let mut image: Image<Rgb<u8>> = Image::new(2, 2);
    image.put_pixel(0, 0, Rgb([200, 150, 100]));
    image.put_pixel(1, 0, Rgb([100, 200, 150]));
    image.put_pixel(0, 1, Rgb([150, 100, 200]));
    image.put_pixel(1, 1, Rgb([50, 75, 25]));
    image
}

/// Solid `foreground` rectangle inset by `inset` pixels on every side,
/// painted over a solid `background`.
pub fn create_two_tone_image(
    width: u32,
    height: u32,
    inset: u32,
    foreground: [u8; 3],
    background: [u8; 3],
) -> Image<Rgb<u8>> {
    Image::from_fn(width, height, |x, y| {
        let inside = x >= inset && y >= inset && x + inset < width && y + inset < height;
        if inside {
            Rgb(foreground)
        } else {
            Rgb(background)
        }
    })
}

/// Reddish elliptical subject on a bluish background, both with independent
/// per-channel noise of up to ±40. The same `seed` always gives the same image.
pub fn create_noisy_subject_image(width: u32, height: u32, seed: u64) -> Image<Rgb<u8>> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    let mut noise = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((state >> 33) % 81) as i32 - 40
    };

    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    let (rx, ry) = (f64::from(width) * 0.3, f64::from(height) * 0.35);

    Image::from_fn(width, height, |x, y| {
        let dx = (f64::from(x) + 0.5 - cx) / rx;
        let dy = (f64::from(y) + 0.5 - cy) / ry;
        let base: [i32; 3] = if dx * dx + dy * dy <= 1.0 {
            [200, 70, 50]
        } else {
            [40, 90, 190]
        };
        Rgb(base.map(|channel| (channel + noise()).clamp(0, 255) as u8))
    })
}

/// Two regions sharing a quantised 31-step texture over horizontal and
/// vertical gradients. Few distinct colours repeat many times, which pushes
/// the appearance models into near-singular covariances.
pub fn create_textured_gradient_image(width: u32, height: u32) -> Image<Rgb<u8>> {
    let (left, top) = (width / 4, height / 4);
    Image::from_fn(width, height, |x, y| {
        let step = ((x * 7 + y * 13) % 31) as i32 * 4;
        let gx = (x * 60 / width) as i32;
        let gy = (y * 60 / height) as i32;
        let inside = x >= left && y >= top && x < width - left && y < height - top;
        let base: [i32; 3] = if inside {
            [150 + step / 2, 60 + gx, 40 + gy]
        } else {
            [40 + gy, 80 + step / 3, 120 + gx]
        };
        Rgb(base.map(|channel| channel.clamp(0, 255) as u8))
    })
}

/// Fraction of pixels on which two masks agree.
pub fn mask_agreement(a: &Image<Luma<u8>>, b: &Image<Luma<u8>>) -> f64 {
    assert_eq!(a.dimensions(), b.dimensions());
    let matching = a
        .pixels()
        .zip(b.pixels())
        .filter(|(left, right)| left == right)
        .count();
    matching as f64 / (f64::from(a.width()) * f64::from(a.height()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_tone_image_paints_inset_rectangle() {
        let image = create_two_tone_image(6, 5, 1, [255, 0, 0], [0, 0, 255]);
        let subject = image.pixels().filter(|pixel| pixel.0 == [255, 0, 0]).count();
        assert_eq!(subject, 4 * 3);
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(image.get_pixel(1, 1), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(4, 3), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(5, 4), &Rgb([0, 0, 255]));
    }

    #[test]
    fn noisy_subject_is_deterministic_per_seed() {
        let a = create_noisy_subject_image(20, 16, 3);
        let b = create_noisy_subject_image(20, 16, 3);
        let c = create_noisy_subject_image(20, 16, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn textured_gradient_repeats_a_small_palette() {
        let image = create_textured_gradient_image(40, 32);
        let mut colors: Vec<[u8; 3]> = image.pixels().map(|pixel| pixel.0).collect();
        colors.sort_unstable();
        colors.dedup();
        assert!(colors.len() < image.pixels().len());
        assert_ne!(image.get_pixel(0, 0), image.get_pixel(20, 16));
    }

    #[test]
    fn mask_agreement_counts_equal_pixels() {
        let a: Image<Luma<u8>> = Image::from_raw(2, 2, vec![0, 255, 255, 0]).unwrap();
        let b: Image<Luma<u8>> = Image::from_raw(2, 2, vec![0, 255, 0, 0]).unwrap();
        assert_eq!(mask_agreement(&a, &b), 0.75);
    }
}
