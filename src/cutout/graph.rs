//! Segmentation energy and its graph construction.
//!
//! The energy of a labelling `L` under appearance models `θ` is
//!
//! ```text
//! E(L, θ) = Σ_p D_{L_p}(c_p) + Σ_{p~q, L_p ≠ L_q} V(p, q)
//! V(p, q) = γ · exp(-β ‖c_p - c_q‖²) / dist(p, q)
//! β       = 1 / (2 ⟨‖c_p - c_q‖²⟩)
//! ```
//!
//! where `D` is the negative log-likelihood under the foreground or
//! background mixture. `V` is small across strong colour edges, so cuts
//! prefer to follow them. The minimum of `E` over labellings is found as a
//! minimum s/t cut of the pixel graph.

use std::f64::consts::SQRT_2;

use image::Rgb;
use imageproc::definitions::Image;
use itertools::iproduct;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::gmm::GaussianMixture;
use super::maxflow::{CutSide, FlowNetwork};
use super::raster::{Label, LabelMap, RasterBuffer};
use crate::config::Neighborhood;

/// Undirected edge between two neighbouring pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEdge {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

/// Contrast-sensitive pairwise term of the energy.
///
/// It depends only on the image, so it is computed once per run and shared
/// by every graph built for that image.
#[derive(Debug, Clone)]
pub struct SmoothnessTerm {
    edges: Vec<NeighborEdge>,
    beta: f64,
    /// Largest total neighbour weight attached to any single pixel
    max_pixel_weight: f64,
}

impl SmoothnessTerm {
    pub fn new(image: &Image<Rgb<u8>>, gamma: f64, neighborhood: Neighborhood) -> Self {
        let (width, height) = image.dimensions();
        let pairs = neighbor_pairs(width, height, neighborhood);

        let color = |index: usize| {
            let offset = index * 3;
            let raw = &image.as_raw()[offset..offset + 3];
            [f64::from(raw[0]), f64::from(raw[1]), f64::from(raw[2])]
        };
        let squared_difference = |a: usize, b: usize| {
            let (ca, cb) = (color(a), color(b));
            (ca[0] - cb[0]).powi(2) + (ca[1] - cb[1]).powi(2) + (ca[2] - cb[2]).powi(2)
        };

        let total: f64 = pairs
            .iter()
            .map(|&(a, b, _)| squared_difference(a, b))
            .sum();
        let beta = if pairs.is_empty() || total <= 0.0 {
            0.0
        } else {
            1.0 / (2.0 * total / pairs.len() as f64)
        };

        let mut pixel_weights = vec![0.0; width as usize * height as usize];
        let edges: Vec<NeighborEdge> = pairs
            .into_iter()
            .map(|(a, b, distance)| {
                let weight = gamma * (-beta * squared_difference(a, b)).exp() / distance;
                pixel_weights[a] += weight;
                pixel_weights[b] += weight;
                NeighborEdge { a, b, weight }
            })
            .collect();
        let max_pixel_weight = pixel_weights.into_iter().fold(0.0, f64::max);

        Self {
            edges,
            beta,
            max_pixel_weight,
        }
    }

    pub fn edges(&self) -> &[NeighborEdge] {
        &self.edges
    }

    pub const fn beta(&self) -> f64 {
        self.beta
    }

    /// Terminal capacity that no cut can afford to sever.
    pub fn hard_constraint(&self) -> f64 {
        1.0 + self.max_pixel_weight
    }

    /// Sum of the weights of all edges whose endpoints fall in different classes.
    pub fn boundary_cost(&self, labels: &LabelMap) -> f64 {
        let labels = labels.as_slice();
        self.edges
            .iter()
            .filter(|edge| labels[edge.a].is_foreground() != labels[edge.b].is_foreground())
            .map(|edge| edge.weight)
            .sum()
    }
}

/// Each neighbour pair once, as `(a, b, distance)` in row-major pixel indices.
fn neighbor_pairs(width: u32, height: u32, neighborhood: Neighborhood) -> Vec<(usize, usize, f64)> {
    let w = width as usize;
    let index = |x: u32, y: u32| y as usize * w + x as usize;
    let mut pairs = Vec::with_capacity(w * height as usize * 4);

    for (y, x) in iproduct!(0..height, 0..width) {
        let here = index(x, y);
        if x > 0 {
            pairs.push((here, index(x - 1, y), 1.0));
        }
        if y > 0 {
            pairs.push((here, index(x, y - 1), 1.0));
        }
        if neighborhood == Neighborhood::Eight && y > 0 {
            if x > 0 {
                pairs.push((here, index(x - 1, y - 1), SQRT_2));
            }
            if x + 1 < width {
                pairs.push((here, index(x + 1, y - 1), SQRT_2));
            }
        }
    }
    pairs
}

/// Per-pixel data costs under both appearance models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataCost {
    pub foreground: f64,
    pub background: f64,
}

fn data_costs(
    image: &Image<Rgb<u8>>,
    foreground: &GaussianMixture,
    background: &GaussianMixture,
) -> Vec<DataCost> {
    let cost = |raw: &[u8]| {
        let color = [f64::from(raw[0]), f64::from(raw[1]), f64::from(raw[2])];
        DataCost {
            foreground: foreground.data_cost(&color),
            background: background.data_cost(&color),
        }
    };

    #[cfg(feature = "rayon")]
    {
        image.as_raw().par_chunks_exact(3).map(cost).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        image.as_raw().chunks_exact(3).map(cost).collect()
    }
}

/// Result of a minimum cut.
#[derive(Debug, Clone)]
pub struct Cut {
    /// Cut side for every pixel, row-major
    pub sides: Vec<CutSide>,
    /// Value of the maximum flow
    pub flow: f64,
}

/// Energy graph of one Cutting step.
///
/// Rebuilt on every iteration, since the data costs change with the models.
#[derive(Debug, Clone)]
pub struct EnergyGraph<'a> {
    smoothness: &'a SmoothnessTerm,
    costs: Vec<DataCost>,
    pinned: Vec<Label>,
}

impl<'a> EnergyGraph<'a> {
    pub fn build(
        raster: &RasterBuffer<'_>,
        smoothness: &'a SmoothnessTerm,
        foreground: &GaussianMixture,
        background: &GaussianMixture,
    ) -> Self {
        let costs = data_costs(raster.image(), foreground, background);
        let pinned = raster.labels().as_slice().to_vec();
        Self {
            smoothness,
            costs,
            pinned,
        }
    }

    pub fn costs(&self) -> &[DataCost] {
        &self.costs
    }

    /// Energy of `labels` under the models this graph was built from.
    pub fn energy(&self, labels: &LabelMap) -> f64 {
        let data: f64 = self
            .costs
            .iter()
            .zip(labels.as_slice())
            .map(|(cost, label)| {
                if label.is_foreground() {
                    cost.foreground
                } else {
                    cost.background
                }
            })
            .sum();
        data + self.smoothness.boundary_cost(labels)
    }

    /// Builds the flow network and computes the minimum cut.
    ///
    /// Source side is foreground. Terminal capacities are shifted per pixel
    /// by the smaller of the two costs, which keeps them non-negative and
    /// leaves the minimiser unchanged.
    pub fn solve(&self) -> Cut {
        let hard = self.smoothness.hard_constraint();
        let mut network = FlowNetwork::with_capacity(self.costs.len(), self.smoothness.edges().len());

        for (node, (cost, label)) in self.costs.iter().zip(&self.pinned).enumerate() {
            let (source, sink) = match label {
                Label::DefiniteBackground => (0.0, hard),
                Label::DefiniteForeground => (hard, 0.0),
                Label::ProbableBackground | Label::ProbableForeground => {
                    let shift = cost.foreground.min(cost.background);
                    (cost.background - shift, cost.foreground - shift)
                }
            };
            network.add_terminal_weights(node, source, sink);
        }
        for edge in self.smoothness.edges() {
            network.add_edge(edge.a, edge.b, edge.weight, edge.weight);
        }

        let flow = network.max_flow();
        Cut {
            sides: network.cut_sides(),
            flow,
        }
    }
}
