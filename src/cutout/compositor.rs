use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{Luma, Rgb, Rgba};
use imageproc::{definitions::Image, map::map_colors};

use super::apply_alpha_mask::ApplyAlphaMask;
use super::raster::LabelMap;
use crate::error::AlphaMaskError;

/// Mask values above this survive resampling as foreground.
const MASK_THRESHOLD: u8 = 127;

/// Turns segmentation labels into a transparent cutout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    /// Binary mask: foreground labels become 255, background labels 0.
    pub fn mask_from_labels(labels: &LabelMap) -> Image<Luma<u8>> {
        labels.to_mask()
    }

    /// Brings `mask` to `width`×`height`.
    ///
    /// Equal dimensions borrow the mask untouched. Otherwise it is resampled
    /// bilinearly and thresholded back to 0/255.
    pub fn fit_mask(mask: &Image<Luma<u8>>, width: u32, height: u32) -> Cow<'_, Image<Luma<u8>>> {
        if mask.dimensions() == (width, height) {
            return Cow::Borrowed(mask);
        }
        let resized = imageops::resize(mask, width, height, FilterType::Triangle);
        Cow::Owned(map_colors(&resized, |Luma([value])| {
            Luma([if value > MASK_THRESHOLD { 255 } else { 0 }])
        }))
    }

    /// Attaches `mask` as the alpha channel of `image`, resizing it first
    /// when it was computed at a different resolution.
    ///
    /// # Errors
    ///
    /// * `AlphaMaskError::DimensionMismatch` - the fitted mask does not match `image`
    ///
    /// # Examples
    ///
    /// ```
    /// use image::{Luma, Rgb, Rgba};
    /// use imageops_cutout::{Compositor, Image};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let photo: Image<Rgb<u8>> = Image::from_pixel(8, 8, Rgb([90, 60, 30]));
    /// let mask: Image<Luma<u8>> = Image::from_fn(4, 4, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
    ///
    /// let cutout = Compositor::composite(&photo, &mask)?;
    /// assert_eq!(cutout.dimensions(), (8, 8));
    /// assert_eq!(cutout.get_pixel(0, 0), &Rgba([90, 60, 30, 255]));
    /// assert_eq!(cutout.get_pixel(7, 0), &Rgba([90, 60, 30, 0]));
    /// # Ok(())
    /// # }
    /// ```
    pub fn composite(
        image: &Image<Rgb<u8>>,
        mask: &Image<Luma<u8>>,
    ) -> Result<Image<Rgba<u8>>, AlphaMaskError> {
        let (width, height) = image.dimensions();
        let mask = Self::fit_mask(mask, width, height);
        image.apply_alpha_mask(&mask)
    }
}
