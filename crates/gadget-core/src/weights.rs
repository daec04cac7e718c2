// crates/gadget-core/src/weights.rs
//
// Sparse weight vector for the linear SVM model held by each node.
//
// A missing feature index is equivalent to a weight of 0.0. Keys are kept in a
// BTreeMap so iteration order is deterministic across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse mapping of feature index to weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    /// Explicitly stored components; absent keys read as 0.0.
    weights: BTreeMap<u32, f64>,
}

impl WeightVector {
    /// Create an empty (all-zero) weight vector.
    pub fn new() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    /// Build a weight vector from `(index, value)` pairs. Repeated indices accumulate.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, f64)>,
    {
        let mut v = Self::new();
        for (dim, value) in pairs {
            v.add(dim, value);
        }
        v
    }

    /// Read a component. Returns 0.0 for dimensions that were never set.
    pub fn get(&self, dim: u32) -> f64 {
        self.weights.get(&dim).copied().unwrap_or(0.0)
    }

    /// Whether the dimension is explicitly stored.
    pub fn contains(&self, dim: u32) -> bool {
        self.weights.contains_key(&dim)
    }

    /// Overwrite a component.
    pub fn set(&mut self, dim: u32, value: f64) {
        self.weights.insert(dim, value);
    }

    /// Add `delta` to a component, creating it at `delta` if absent.
    pub fn add(&mut self, dim: u32, delta: f64) {
        *self.weights.entry(dim).or_insert(0.0) += delta;
    }

    /// `self += factor * other`, over every dimension stored in `other`.
    pub fn add_scaled(&mut self, other: &WeightVector, factor: f64) {
        for (&dim, &value) in &other.weights {
            self.add(dim, factor * value);
        }
    }

    /// Multiply every stored component by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for value in self.weights.values_mut() {
            *value *= factor;
        }
    }

    /// Sum of squared components.
    pub fn squared_norm(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum()
    }

    /// Euclidean norm `sqrt(sum w_i^2)`.
    pub fn l2_norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// Rescale to unit L2 norm. A zero vector is left untouched.
    pub fn normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            self.scale(1.0 / norm);
        }
    }

    /// Inner product with a sparse feature vector, over the intersection of
    /// stored dimensions.
    pub fn dot(&self, features: &[(u32, f64)]) -> f64 {
        features
            .iter()
            .filter_map(|(dim, x)| self.weights.get(dim).map(|w| w * x))
            .sum()
    }

    /// Iterate `(index, weight)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.weights.iter().map(|(&d, &w)| (d, w))
    }

    /// Iterate stored indices in ascending order.
    pub fn dims(&self) -> impl Iterator<Item = u32> + '_ {
        self.weights.keys().copied()
    }

    /// Number of explicitly stored components.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True if no component is stored.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Drop every component (back to the zero vector).
    pub fn clear(&mut self) {
        self.weights.clear();
    }

    /// Largest absolute component-wise difference to `other`, treating absent
    /// components as 0.0 on both sides.
    pub fn max_abs_diff(&self, other: &WeightVector) -> f64 {
        self.dims()
            .chain(other.dims())
            .map(|dim| (self.get(dim) - other.get(dim)).abs())
            .fold(0.0, f64::max)
    }
}

impl FromIterator<(u32, f64)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}
