use thiserror::Error;

/// Error type for segmentation and background removal
///
/// Degenerate appearance models and min-cut inconsistencies are handled
/// inside the engine and never surface here. What remains are problems
/// with the caller's input or configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
    /// The initial rectangle has no area inside the image
    ///
    /// Returned when the margin rectangle (or an explicit rectangle hint)
    /// collapses to zero width or height, or does not fit in the image.
    #[error("Initial rectangle is empty or out of bounds for a {width}x{height} image (margin {margin}px)")]
    InvalidGeometry {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
        /// Margin in pixels that was applied on every side
        margin: u32,
    },

    /// The input image has a zero dimension
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// A configuration value is outside its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Downscaling the input to the working resolution failed
    #[error(transparent)]
    Resize(#[from] InterAreaError),

    /// Attaching the mask to the output image failed
    #[error(transparent)]
    AlphaMask(#[from] AlphaMaskError),
}

/// Error type for alpha mask operations
///
/// This error type covers failures that can occur when applying
/// alpha masks to images or performing alpha-related operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlphaMaskError {
    /// Image and mask dimensions do not match
    ///
    /// This error occurs when attempting to apply an alpha mask
    /// to an image where the dimensions don't align properly.
    #[error("Image and mask dimensions do not match: expected {expected:?}, actual {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height)
        expected: (u32, u32),
        /// Actual dimensions (width, height)
        actual: (u32, u32),
    },
}

/// Error type for INTER_AREA resizing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterAreaError {
    /// Target width or height is zero
    #[error("Target dimensions must be non-zero, got {width}x{height}")]
    InvalidTargetDimensions { width: u32, height: u32 },

    /// Source image has a zero dimension
    #[error("Source image is empty: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// Area interpolation only shrinks images
    #[error(
        "Upscaling from {src_width}x{src_height} to {target_width}x{target_height} is not supported"
    )]
    UpscalingNotSupported {
        src_width: u32,
        src_height: u32,
        target_width: u32,
        target_height: u32,
    },
}
