use image::{Luma, Rgb};
use imageproc::definitions::Image;

use crate::error::SegmentationError;
use crate::utils::validate_non_empty_image;

/// Per-pixel trimap label.
///
/// The numbering follows the classic GrabCut convention so label buffers can
/// be exchanged with other tools without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Label {
    /// Outside the initial rectangle; never reassigned
    DefiniteBackground = 0,
    /// Foreground seed; never reassigned. The trimap never produces it and
    /// [`SegmentationHints`](super::segmenter::SegmentationHints) has no way
    /// to place it, so it only appears in label maps built inside the crate.
    DefiniteForeground = 1,
    ProbableBackground = 2,
    ProbableForeground = 3,
}

impl Label {
    /// Pinned labels are fixed by the trimap and ignored by the solver.
    #[inline]
    pub const fn is_pinned(self) -> bool {
        matches!(self, Self::DefiniteBackground | Self::DefiniteForeground)
    }

    /// Whether the label belongs to the foreground class.
    #[inline]
    pub const fn is_foreground(self) -> bool {
        matches!(self, Self::DefiniteForeground | Self::ProbableForeground)
    }

    /// Alpha value of the label in a binary mask.
    #[inline]
    pub const fn alpha(self) -> u8 {
        if self.is_foreground() {
            255
        } else {
            0
        }
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }

    /// Number of pixels covered by the rectangle.
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Row-major label buffer parallel to the working image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<Label>,
}

impl LabelMap {
    /// Creates a map with every pixel set to `label`.
    pub fn filled(width: u32, height: u32, label: Label) -> Self {
        Self {
            width,
            height,
            labels: vec![label; width as usize * height as usize],
        }
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Label at `(x, y)`, or `None` outside the map.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<Label> {
        self.index(x, y).map(|i| self.labels[i])
    }

    /// Sets the label at `(x, y)`. Returns `false` when out of bounds.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, label: Label) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.labels[i] = label;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[Label] {
        &self.labels
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Label] {
        &mut self.labels
    }

    /// Number of pixels whose label satisfies `predicate`.
    pub fn count(&self, predicate: impl Fn(Label) -> bool) -> usize {
        self.labels.iter().filter(|&&label| predicate(label)).count()
    }

    /// Binary 0/255 mask of the foreground class.
    pub fn to_mask(&self) -> Image<Luma<u8>> {
        let width = self.width as usize;
        Image::from_fn(self.width, self.height, |x, y| {
            Luma([self.labels[y as usize * width + x as usize].alpha()])
        })
    }
}

/// Working image together with its label buffer.
#[derive(Debug, Clone)]
pub struct RasterBuffer<'a> {
    image: &'a Image<Rgb<u8>>,
    labels: LabelMap,
}

impl<'a> RasterBuffer<'a> {
    /// Pairs an image with a label map of the same size.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::EmptyImage` - zero width or height
    /// * `SegmentationError::InvalidGeometry` - label map size differs from the image
    pub fn new(image: &'a Image<Rgb<u8>>, labels: LabelMap) -> Result<Self, SegmentationError> {
        let (width, height) = image.dimensions();
        validate_non_empty_image(width, height, "RasterBuffer")
            .map_err(|_| SegmentationError::EmptyImage { width, height })?;
        if labels.dimensions() != (width, height) {
            return Err(SegmentationError::InvalidGeometry {
                width,
                height,
                margin: 0,
            });
        }
        Ok(Self { image, labels })
    }

    pub const fn image(&self) -> &Image<Rgb<u8>> {
        self.image
    }

    pub const fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelMap {
        &mut self.labels
    }

    pub fn into_labels(self) -> LabelMap {
        self.labels
    }

    /// Colour at `(x, y)`, or `None` outside the image.
    #[inline]
    pub fn color(&self, x: u32, y: u32) -> Option<[f64; 3]> {
        self.image
            .get_pixel_checked(x, y)
            .map(|Rgb([r, g, b])| [f64::from(*r), f64::from(*g), f64::from(*b)])
    }

    /// Colours of every pixel whose label satisfies `predicate`, in row-major order.
    pub fn samples(&self, predicate: impl Fn(Label) -> bool) -> Vec<[f64; 3]> {
        self.image
            .pixels()
            .zip(self.labels.as_slice())
            .filter(|(_, &label)| predicate(label))
            .map(|(Rgb([r, g, b]), _)| [f64::from(*r), f64::from(*g), f64::from(*b)])
            .collect()
    }
}
