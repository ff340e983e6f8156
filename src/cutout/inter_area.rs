//! Area-averaging downscaler (OpenCV `INTER_AREA`).
//!
//! Every destination pixel is the average of the source area it covers,
//! with partially covered source pixels weighted by their overlap. This is
//! the appropriate filter for shrinking photos to the working resolution:
//! it does not alias and does not ring.

use image::{Pixel, Primitive};
use imageproc::definitions::{Clamp, Image};

use crate::error::InterAreaError;
use crate::utils::clamp_f32_to_primitive;

/// Contribution of one source index to one destination index.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AreaWeight {
    destination: usize,
    source: usize,
    weight: f32,
}

/// INTER_AREA resizer for a fixed target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterAreaResize {
    new_width: u32,
    new_height: u32,
}

impl InterAreaResize {
    /// # Errors
    ///
    /// * `InterAreaError::InvalidTargetDimensions` - a target dimension is zero
    pub const fn new(new_width: u32, new_height: u32) -> Result<Self, InterAreaError> {
        if new_width == 0 || new_height == 0 {
            return Err(InterAreaError::InvalidTargetDimensions {
                width: new_width,
                height: new_height,
            });
        }
        Ok(Self {
            new_width,
            new_height,
        })
    }

    /// Shrinks `src` to the target size.
    ///
    /// # Errors
    ///
    /// * `InterAreaError::EmptyImage` - `src` has a zero dimension
    /// * `InterAreaError::UpscalingNotSupported` - the target is larger than `src`
    pub fn resize<P>(&self, src: &Image<P>) -> Result<Image<P>, InterAreaError>
    where
        P: Pixel,
        P::Subpixel: Clamp<f32> + Into<f32> + Primitive,
    {
        let (src_width, src_height) = src.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err(InterAreaError::EmptyImage {
                width: src_width,
                height: src_height,
            });
        }
        if self.new_width > src_width || self.new_height > src_height {
            return Err(InterAreaError::UpscalingNotSupported {
                src_width,
                src_height,
                target_width: self.new_width,
                target_height: self.new_height,
            });
        }
        if (self.new_width, self.new_height) == (src_width, src_height) {
            return Ok(src.clone());
        }

        let channels = usize::from(P::CHANNEL_COUNT);
        let x_weights = area_weights(src_width, self.new_width);
        let y_weights = area_weights(src_height, self.new_height);
        let dst_width = self.new_width as usize;
        let src_row = src_width as usize * channels;
        let raw = src.as_raw();

        // horizontal pass: every source row shrunk to the new width
        let mut rows = vec![0.0f32; src_height as usize * dst_width * channels];
        for (src_line, out_line) in raw
            .chunks_exact(src_row)
            .zip(rows.chunks_exact_mut(dst_width * channels))
        {
            for entry in &x_weights {
                let from = entry.source * channels;
                let to = entry.destination * channels;
                for c in 0..channels {
                    out_line[to + c] += src_line[from + c].into() * entry.weight;
                }
            }
        }

        // vertical pass
        let mut sums = vec![0.0f32; self.new_height as usize * dst_width * channels];
        let line = dst_width * channels;
        for entry in &y_weights {
            let from = entry.source * line;
            let to = entry.destination * line;
            for i in 0..line {
                sums[to + i] += rows[from + i] * entry.weight;
            }
        }

        let data = sums
            .into_iter()
            .map(|value| clamp_f32_to_primitive(value.round()))
            .collect();
        Image::from_raw(self.new_width, self.new_height, data).ok_or(
            InterAreaError::InvalidTargetDimensions {
                width: self.new_width,
                height: self.new_height,
            },
        )
    }
}

/// Weight table mapping `src_size` samples onto `dst_size` samples.
///
/// Destination cell `d` covers `[d·s, (d+1)·s)` in source coordinates with
/// `s = src_size / dst_size`; each source sample contributes its overlap
/// with that cell divided by `s`, so the weights of a cell sum to one.
fn area_weights(src_size: u32, dst_size: u32) -> Vec<AreaWeight> {
    let scale = f64::from(src_size) / f64::from(dst_size);
    let mut table = Vec::with_capacity(src_size as usize + dst_size as usize);

    for destination in 0..dst_size as usize {
        let start = destination as f64 * scale;
        let end = (start + scale).min(f64::from(src_size));
        let first = start.floor() as usize;
        let last = (end.ceil() as usize).min(src_size as usize);

        for source in first..last {
            let overlap = end.min(source as f64 + 1.0) - start.max(source as f64);
            if overlap > 1e-6 {
                table.push(AreaWeight {
                    destination,
                    source,
                    weight: (overlap / scale) as f32,
                });
            }
        }
    }
    table
}
