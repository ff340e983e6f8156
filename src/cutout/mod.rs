//! Graph-cut background segmentation and cutout compositing.

pub mod apply_alpha_mask;
pub mod compositor;
pub mod engine;
pub mod gmm;
pub mod graph;
pub mod inter_area;
pub mod maxflow;
pub mod pipeline;
pub mod raster;
pub mod segmenter;
pub mod trimap;
