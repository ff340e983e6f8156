//! Gaussian mixture appearance models.
//!
//! Each class (foreground, background) is described by a mixture of `K`
//! full-covariance Gaussians in RGB space. Models are seeded by a
//! deterministic k-means pass and refined with expectation-maximisation.
//! The data term of the segmentation energy is the negative log-likelihood
//! of a colour under the mixture:
//!
//! ```text
//! D(x) = -ln Σ_k w_k · N(x; μ_k, Σ_k)
//! ```
//!
//! The sum is evaluated in the log domain, so the cost stays finite even for
//! colours that are many standard deviations away from every component.

use std::f64::consts::PI;

use thiserror::Error;

/// Colour sample in RGB space.
pub type Color = [f64; 3];

/// Variance added to every channel when a covariance is (nearly) singular.
const COVARIANCE_EPSILON: f64 = 0.01;
/// Smallest determinant considered invertible without regularisation.
const SINGULAR_DETERMINANT: f64 = f64::EPSILON;
/// Lower clamp for the determinant before its logarithm is taken.
const MIN_DETERMINANT: f64 = 1e-12;
/// Components with less responsibility mass than this are dropped.
const MIN_COMPONENT_MASS: f64 = 1e-9;
const KMEANS_ITERATIONS: usize = 10;
const FIT_EM_STEPS: usize = 2;

/// Error type for mixture fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModelError {
    /// No samples were available for the class
    #[error("Cannot fit an appearance model to an empty sample set")]
    EmptySamples,
}

/// One weighted Gaussian of a mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianComponent {
    weight: f64,
    mean: Color,
    covariance: [[f64; 3]; 3],
    inverse: [[f64; 3]; 3],
    /// `ln w - ½(3 ln 2π + ln det Σ)`
    log_normalizer: f64,
}

impl GaussianComponent {
    fn new(weight: f64, mean: Color, mut covariance: [[f64; 3]; 3]) -> Self {
        let mut det = determinant(&covariance);
        if det <= SINGULAR_DETERMINANT {
            for (i, row) in covariance.iter_mut().enumerate() {
                row[i] += COVARIANCE_EPSILON;
            }
            det = determinant(&covariance);
        }
        let det = det.max(MIN_DETERMINANT);
        let inverse = invert(&covariance, det);
        let log_normalizer = weight.ln() - 0.5 * (3.0 * (2.0 * PI).ln() + det.ln());
        Self {
            weight,
            mean,
            covariance,
            inverse,
            log_normalizer,
        }
    }

    pub const fn weight(&self) -> f64 {
        self.weight
    }

    pub const fn mean(&self) -> Color {
        self.mean
    }

    pub const fn covariance(&self) -> &[[f64; 3]; 3] {
        &self.covariance
    }

    /// `ln(w · N(color; μ, Σ))`
    #[inline]
    fn weighted_log_density(&self, color: &Color) -> f64 {
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let inv = &self.inverse;
        let mahalanobis = d[0] * (inv[0][0] * d[0] + inv[0][1] * d[1] + inv[0][2] * d[2])
            + d[1] * (inv[1][0] * d[0] + inv[1][1] * d[1] + inv[1][2] * d[2])
            + d[2] * (inv[2][0] * d[0] + inv[2][1] * d[1] + inv[2][2] * d[2]);
        self.log_normalizer - 0.5 * mahalanobis
    }
}

/// Weighted sums collected for one component during an M-step.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    mass: f64,
    sum: Color,
    outer: [[f64; 3]; 3],
}

impl Accumulator {
    #[inline]
    fn add(&mut self, color: &Color, responsibility: f64) {
        self.mass += responsibility;
        for i in 0..3 {
            let weighted = responsibility * color[i];
            self.sum[i] += weighted;
            for j in 0..3 {
                self.outer[i][j] += weighted * color[j];
            }
        }
    }

    fn mean(&self) -> Color {
        [
            self.sum[0] / self.mass,
            self.sum[1] / self.mass,
            self.sum[2] / self.mass,
        ]
    }

    fn covariance(&self, mean: &Color) -> [[f64; 3]; 3] {
        let mut covariance = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                covariance[i][j] = self.outer[i][j] / self.mass - mean[i] * mean[j];
            }
            // cancellation can leave tiny negative variances
            covariance[i][i] = covariance[i][i].max(0.0);
        }
        covariance
    }
}

/// Gaussian mixture model of one pixel class.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    components: Vec<GaussianComponent>,
}

impl GaussianMixture {
    /// Fits a mixture of at most `k` components to `samples`.
    ///
    /// Seeding is deterministic (maximin k-means), so the same samples always
    /// produce the same model. Fewer than `k` components are returned when
    /// the samples contain fewer distinct colours.
    ///
    /// # Errors
    ///
    /// * `ModelError::EmptySamples` - `samples` is empty
    pub fn fit(samples: &[Color], k: usize) -> Result<Self, ModelError> {
        if samples.is_empty() {
            return Err(ModelError::EmptySamples);
        }
        let centers = kmeans(samples, k.max(1));

        let mut accumulators = vec![Accumulator::default(); centers.len()];
        for sample in samples {
            accumulators[nearest(&centers, sample)].add(sample, 1.0);
        }
        let mut model = Self::from_accumulators(&accumulators)?;

        for _ in 0..FIT_EM_STEPS {
            model = model.refine(samples)?;
        }
        Ok(model)
    }

    /// One EM step starting from `self` on a (possibly different) sample set.
    ///
    /// The returned model never assigns a lower total log-likelihood to
    /// `samples` than `self` does, up to covariance regularisation.
    ///
    /// # Errors
    ///
    /// * `ModelError::EmptySamples` - `samples` is empty
    pub fn refine(&self, samples: &[Color]) -> Result<Self, ModelError> {
        if samples.is_empty() {
            return Err(ModelError::EmptySamples);
        }
        let mut accumulators = vec![Accumulator::default(); self.components.len()];
        let mut log_terms = vec![0.0; self.components.len()];

        for sample in samples {
            for (term, component) in log_terms.iter_mut().zip(&self.components) {
                *term = component.weighted_log_density(sample);
            }
            let total = log_sum_exp(&log_terms);
            for (accumulator, term) in accumulators.iter_mut().zip(&log_terms) {
                accumulator.add(sample, (term - total).exp());
            }
        }

        Self::from_accumulators(&accumulators)
    }

    fn from_accumulators(accumulators: &[Accumulator]) -> Result<Self, ModelError> {
        let kept: Vec<&Accumulator> = accumulators
            .iter()
            .filter(|accumulator| accumulator.mass > MIN_COMPONENT_MASS)
            .collect();
        let total_mass: f64 = kept.iter().map(|accumulator| accumulator.mass).sum();
        if kept.is_empty() || total_mass <= 0.0 {
            return Err(ModelError::EmptySamples);
        }

        let components = kept
            .into_iter()
            .map(|accumulator| {
                let mean = accumulator.mean();
                let covariance = accumulator.covariance(&mean);
                GaussianComponent::new(accumulator.mass / total_mass, mean, covariance)
            })
            .collect();
        Ok(Self { components })
    }

    pub fn components(&self) -> &[GaussianComponent] {
        &self.components
    }

    /// `ln Σ_k w_k N(color; μ_k, Σ_k)`
    pub fn log_likelihood(&self, color: &Color) -> f64 {
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        // streaming log-sum-exp, avoids a scratch buffer per pixel
        for component in &self.components {
            let term = component.weighted_log_density(color);
            if term > max {
                sum = sum * (max - term).exp() + 1.0;
                max = term;
            } else {
                sum += (term - max).exp();
            }
        }
        max + sum.ln()
    }

    /// Cost of assigning `color` to this model's class; lower is a better fit.
    #[inline]
    pub fn data_cost(&self, color: &Color) -> f64 {
        -self.log_likelihood(color)
    }

    /// Sum of [`data_cost`](Self::data_cost) over `samples`.
    pub fn total_cost(&self, samples: &[Color]) -> f64 {
        samples.iter().map(|sample| self.data_cost(sample)).sum()
    }
}

fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + terms.iter().map(|term| (term - max).exp()).sum::<f64>().ln()
}

#[inline]
fn squared_distance(a: &Color, b: &Color) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

#[inline]
fn nearest(centers: &[Color], sample: &Color) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let distance = squared_distance(center, sample);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Maximin seeding followed by Lloyd iterations.
fn kmeans(samples: &[Color], k: usize) -> Vec<Color> {
    let mut centers = seed_centers(samples, k);

    let mut sums = vec![[0.0; 3]; centers.len()];
    let mut counts = vec![0usize; centers.len()];
    for _ in 0..KMEANS_ITERATIONS {
        sums.iter_mut().for_each(|sum| *sum = [0.0; 3]);
        counts.iter_mut().for_each(|count| *count = 0);

        for sample in samples {
            let i = nearest(&centers, sample);
            counts[i] += 1;
            for c in 0..3 {
                sums[i][c] += sample[c];
            }
        }

        let mut moved = false;
        for ((center, sum), &count) in centers.iter_mut().zip(&sums).zip(&counts) {
            if count == 0 {
                continue;
            }
            let updated = [
                sum[0] / count as f64,
                sum[1] / count as f64,
                sum[2] / count as f64,
            ];
            moved |= updated != *center;
            *center = updated;
        }
        if !moved {
            break;
        }
    }
    centers
}

/// First centre is the sample nearest the overall mean, each following one
/// the sample farthest from all chosen centres. Stops early once every
/// sample coincides with a centre.
fn seed_centers(samples: &[Color], k: usize) -> Vec<Color> {
    let n = samples.len() as f64;
    let mut mean = [0.0; 3];
    for sample in samples {
        for c in 0..3 {
            mean[c] += sample[c] / n;
        }
    }

    let first = samples[nearest(samples, &mean)];
    let mut centers = Vec::with_capacity(k);
    centers.push(first);

    let mut distances: Vec<f64> = samples
        .iter()
        .map(|sample| squared_distance(sample, &first))
        .collect();

    while centers.len() < k {
        let (farthest, &distance) = distances
            .iter()
            .enumerate()
            .fold((0, &0.0), |best, current| {
                if current.1 > best.1 {
                    current
                } else {
                    best
                }
            });
        if distance <= 0.0 {
            break;
        }
        let center = samples[farthest];
        centers.push(center);
        for (d, sample) in distances.iter_mut().zip(samples) {
            *d = d.min(squared_distance(sample, &center));
        }
    }
    centers
}

fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Inverse through the adjugate; `det` must be non-zero.
fn invert(m: &[[f64; 3]; 3], det: f64) -> [[f64; 3]; 3] {
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}
