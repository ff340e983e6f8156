use super::raster::{Label, LabelMap, Rect};
use crate::error::SegmentationError;

/// Derives the initial trimap from a rectangle around the presumed subject.
///
/// The subject is assumed to be roughly centred: everything outside the
/// rectangle is definite background, everything inside is probable
/// foreground. Off-centre subjects are a known limitation of this heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimapInitializer {
    margin_fraction: f64,
}

impl TrimapInitializer {
    pub const fn new(margin_fraction: f64) -> Self {
        Self { margin_fraction }
    }

    /// Margin in whole pixels for an image of the given size.
    pub fn margin(&self, width: u32, height: u32) -> u32 {
        (f64::from(width.min(height)) * self.margin_fraction).floor() as u32
    }

    /// Rectangle inset by the margin on every side.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::InvalidGeometry` - the inset rectangle has no area
    pub fn rect(&self, width: u32, height: u32) -> Result<Rect, SegmentationError> {
        let margin = self.margin(width, height);
        let inner_width = i64::from(width) - 2 * i64::from(margin);
        let inner_height = i64::from(height) - 2 * i64::from(margin);
        if inner_width <= 0 || inner_height <= 0 {
            return Err(SegmentationError::InvalidGeometry {
                width,
                height,
                margin,
            });
        }
        Ok(Rect::new(
            margin,
            margin,
            inner_width as u32,
            inner_height as u32,
        ))
    }

    /// Trimap for the margin rectangle.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::InvalidGeometry` - the inset rectangle has no area
    pub fn initialize(&self, width: u32, height: u32) -> Result<LabelMap, SegmentationError> {
        let rect = self.rect(width, height)?;
        Ok(labels_from_rect(width, height, rect))
    }

    /// Trimap for an explicit rectangle.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::InvalidGeometry` - the rectangle is empty or leaves the image
    pub fn initialize_with_rect(
        &self,
        width: u32,
        height: u32,
        rect: Rect,
    ) -> Result<LabelMap, SegmentationError> {
        let fits = u64::from(rect.x) + u64::from(rect.width) <= u64::from(width)
            && u64::from(rect.y) + u64::from(rect.height) <= u64::from(height);
        if rect.area() == 0 || !fits {
            return Err(SegmentationError::InvalidGeometry {
                width,
                height,
                margin: rect.x.min(rect.y),
            });
        }
        Ok(labels_from_rect(width, height, rect))
    }
}

fn labels_from_rect(width: u32, height: u32, rect: Rect) -> LabelMap {
    let mut labels = LabelMap::filled(width, height, Label::DefiniteBackground);
    let row = width as usize;
    for (i, label) in labels.as_mut_slice().iter_mut().enumerate() {
        let x = (i % row) as u32;
        let y = (i / row) as u32;
        if rect.contains(x, y) {
            *label = Label::ProbableForeground;
        }
    }
    labels
}
