use image::{GenericImageView, Luma, Pixel, Primitive, Rgb, Rgba};
use imageproc::{definitions::Image, map::map_colors2};

use crate::{error::AlphaMaskError, utils::validate_matching_dimensions};

/// Attaches a grayscale mask to an RGB image as its alpha channel.
///
/// The colour channels are copied unchanged; the mask value becomes the
/// alpha of the corresponding output pixel.
pub trait ApplyAlphaMask {
    type Subpixel: Primitive;

    /// Produces an RGBA image whose alpha channel is `mask`.
    ///
    /// # Errors
    ///
    /// * `AlphaMaskError::DimensionMismatch` - When image and mask dimensions don't match
    ///
    /// # Examples
    ///
    /// ```
    /// use imageops_cutout::{Image, ApplyAlphaMask};
    /// use image::{Luma, Rgb, Rgba};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let photo: Image<Rgb<u8>> = Image::from_pixel(4, 4, Rgb([10, 20, 30]));
    /// let mask: Image<Luma<u8>> = Image::from_pixel(4, 4, Luma([255]));
    ///
    /// let cutout = photo.apply_alpha_mask(&mask)?;
    /// assert_eq!(cutout.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    /// # Ok(())
    /// # }
    /// ```
    fn apply_alpha_mask(
        &self,
        mask: &Image<Luma<Self::Subpixel>>,
    ) -> Result<Image<Rgba<Self::Subpixel>>, AlphaMaskError>
    where
        Rgba<Self::Subpixel>: Pixel<Subpixel = Self::Subpixel>;
}

impl<S> ApplyAlphaMask for Image<Rgb<S>>
where
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive,
{
    type Subpixel = S;

    fn apply_alpha_mask(
        &self,
        mask: &Image<Luma<S>>,
    ) -> Result<Image<Rgba<S>>, AlphaMaskError>
    where
        Rgba<S>: Pixel<Subpixel = S>,
    {
        validate_dimensions(self, mask)?;

        Ok(map_colors2(self, mask, |Rgb([red, green, blue]), Luma([alpha])| {
            Rgba([red, green, blue, alpha])
        }))
    }
}

#[inline]
fn validate_dimensions<I1, I2>(image: &I1, mask: &I2) -> Result<(), AlphaMaskError>
where
    I1: GenericImageView,
    I2: GenericImageView,
{
    let (img_w, img_h) = image.dimensions();
    let (mask_w, mask_h) = mask.dimensions();

    validate_matching_dimensions(img_w, img_h, mask_w, mask_h, "ApplyAlphaMask").map_err(|_| {
        AlphaMaskError::DimensionMismatch {
            expected: (img_w, img_h),
            actual: (mask_w, mask_h),
        }
    })
}
