//! Background removal for still photos.
//!
//! A GrabCut-style engine separates the subject from the background: the
//! border of the image seeds the background, Gaussian mixture colour models
//! are fitted to both classes, and a minimum s/t cut of the pixel graph
//! relabels the uncertain interior. Fitting and cutting alternate until the
//! labelling settles. The resulting mask becomes the alpha channel of the
//! original photo.
//!
//! ```
//! use image::Rgb;
//! use imageops_cutout::{BackgroundRemover, Image, SegmentationConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let photo: Image<Rgb<u8>> = Image::from_fn(48, 48, |x, y| {
//!     if (12..36).contains(&x) && (12..36).contains(&y) {
//!         Rgb([200, 60, 40])
//!     } else {
//!         Rgb([40, 80, 180])
//!     }
//! });
//!
//! let remover = BackgroundRemover::new(SegmentationConfig::default())?;
//! let cutout = remover.remove_background(&photo)?;
//! assert_eq!(cutout.get_pixel(0, 0)[3], 0);
//! assert_eq!(cutout.get_pixel(24, 24)[3], 255);
//! # Ok(())
//! # }
//! ```

mod config;
mod cutout;
mod error;
#[cfg(test)]
mod test_utils;
mod utils;

use image::{ImageBuffer, Pixel};

pub use config::{Neighborhood, SegmentationConfig};
pub use cutout::apply_alpha_mask::ApplyAlphaMask;
pub use cutout::compositor::Compositor;
pub use cutout::engine::{
    Class, IterationReport, Segmentation, SegmentationEngine, SegmentationOutcome,
};
pub use cutout::gmm::{Color, GaussianComponent, GaussianMixture, ModelError};
pub use cutout::graph::{Cut, DataCost, EnergyGraph, NeighborEdge, SmoothnessTerm};
pub use cutout::inter_area::InterAreaResize;
pub use cutout::maxflow::{CutSide, FlowNetwork};
pub use cutout::pipeline::{
    prepare_working_image, working_dimensions, BackgroundRemover, WorkingImage,
};
pub use cutout::raster::{Label, LabelMap, RasterBuffer, Rect};
pub use cutout::segmenter::{SegmentationHints, Segmenter};
pub use cutout::trimap::TrimapInitializer;
pub use error::{AlphaMaskError, InterAreaError, SegmentationError};

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;
