//! Configuration for the segmentation engine and the background removal pipeline.

use crate::error::SegmentationError;

/// Pixel neighbourhood used for the smoothness term of the energy graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Neighborhood {
    /// Left, right, up and down neighbours
    Four,
    /// Four-neighbourhood plus the diagonals
    #[default]
    Eight,
}

/// Parameters of a segmentation run.
///
/// The struct is passed into [`SegmentationEngine`](crate::SegmentationEngine)
/// and [`BackgroundRemover`](crate::BackgroundRemover) at construction, so
/// several configurations can run side by side in one process.
///
/// # Examples
///
/// ```
/// use imageops_cutout::{Neighborhood, SegmentationConfig};
///
/// let config = SegmentationConfig::default()
///     .with_max_working_dimension(512)
///     .with_max_iterations(3)
///     .with_neighborhood(Neighborhood::Four);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentationConfig {
    /// Largest width or height the engine works on; bigger inputs are downscaled
    pub max_working_dimension: u32,
    /// Fraction of `min(width, height)` left as definite background on every side
    pub margin_fraction: f64,
    /// Upper bound on Fitting/Cutting rounds
    pub max_iterations: usize,
    /// Gaussian components per appearance model
    pub components: usize,
    /// Weight of the smoothness term (lambda)
    pub gamma: f64,
    /// Fraction of pixels whose label may change while still counting as
    /// converged. The comparison is inclusive: a run converges once at most
    /// `convergence_ratio · N` labels change, so `0.0` means a cut that
    /// changes nothing.
    pub convergence_ratio: f64,
    /// Grid connectivity of the energy graph
    pub neighborhood: Neighborhood,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_working_dimension: 800,
            margin_fraction: 0.05,
            max_iterations: 5,
            components: 5,
            gamma: 50.0,
            convergence_ratio: 0.001,
            neighborhood: Neighborhood::Eight,
        }
    }
}

impl SegmentationConfig {
    #[must_use]
    pub const fn with_max_working_dimension(mut self, max_working_dimension: u32) -> Self {
        self.max_working_dimension = max_working_dimension;
        self
    }

    #[must_use]
    pub const fn with_margin_fraction(mut self, margin_fraction: f64) -> Self {
        self.margin_fraction = margin_fraction;
        self
    }

    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub const fn with_components(mut self, components: usize) -> Self {
        self.components = components;
        self
    }

    #[must_use]
    pub const fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    #[must_use]
    pub const fn with_convergence_ratio(mut self, convergence_ratio: f64) -> Self {
        self.convergence_ratio = convergence_ratio;
        self
    }

    #[must_use]
    pub const fn with_neighborhood(mut self, neighborhood: Neighborhood) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    /// Checks every field against its valid range.
    ///
    /// # Errors
    ///
    /// * `SegmentationError::InvalidConfig` - naming the first offending field
    pub fn validate(&self) -> Result<(), SegmentationError> {
        if self.max_working_dimension == 0 {
            return Err(invalid("max_working_dimension must be non-zero"));
        }
        if !self.margin_fraction.is_finite() || !(0.0..=0.5).contains(&self.margin_fraction) {
            return Err(invalid(format!(
                "margin_fraction must be in [0, 0.5], got {}",
                self.margin_fraction
            )));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1"));
        }
        if self.components == 0 {
            return Err(invalid("components must be at least 1"));
        }
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(invalid(format!(
                "gamma must be finite and non-negative, got {}",
                self.gamma
            )));
        }
        if !self.convergence_ratio.is_finite() || !(0.0..=1.0).contains(&self.convergence_ratio) {
            return Err(invalid(format!(
                "convergence_ratio must be in [0, 1], got {}",
                self.convergence_ratio
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SegmentationError {
    SegmentationError::InvalidConfig(message.into())
}
