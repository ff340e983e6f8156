use image::{Luma, Rgb};
use imageproc::definitions::Image;

use super::raster::Rect;
use crate::error::SegmentationError;

/// Optional guidance for a segmentation run.
///
/// Only a subject rectangle can be given. Foreground seeds are not part of
/// the public surface: the solver honours `Label::DefiniteForeground`, but
/// only label maps built inside the crate carry it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentationHints {
    /// Rectangle around the subject. When absent the margin rule of the
    /// configuration is used.
    pub rect: Option<Rect>,
}

impl SegmentationHints {
    pub const fn with_rect(rect: Rect) -> Self {
        Self { rect: Some(rect) }
    }
}

/// A background removal algorithm.
///
/// Callers hold a `Box<dyn Segmenter>` so the algorithm can be swapped
/// without touching the code that prepares inputs and encodes outputs.
pub trait Segmenter: Send + Sync {
    /// Computes a binary 0/255 foreground mask with the dimensions of `image`.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::InvalidGeometry` - the subject rectangle has no area
    /// * `SegmentationError::EmptyImage` - `image` has a zero dimension
    fn segment(
        &self,
        image: &Image<Rgb<u8>>,
        hints: &SegmentationHints,
    ) -> Result<Image<Luma<u8>>, SegmentationError>;
}
