//! Embedding vector wrapper and similarity primitives.
//!
//! Vectors are wrapped on construction and immutable afterwards; the L2
//! magnitude is computed once and cached. Comparing vectors of different
//! dimension is a contract violation and fails with
//! [`Error::DimensionMismatch`]; similarity functions never truncate or
//! pad.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fixed-length embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    values: Vec<f32>,
    #[serde(skip)]
    magnitude: OnceCell<f32>,
}

impl Embedding {
    /// Wrap a raw vector. Fails on an empty vector.
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::Validation(
                "embedding vector must not be empty".to_string(),
            ));
        }
        Ok(Self {
            values,
            magnitude: OnceCell::new(),
        })
    }

    /// Vector dimension, fixed at construction.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Raw vector values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// L2 norm, computed on first access and cached.
    pub fn magnitude(&self) -> f32 {
        *self
            .magnitude
            .get_or_init(|| self.values.iter().map(|x| x * x).sum::<f32>().sqrt())
    }

    /// Return a unit-length copy. A zero-magnitude vector is returned
    /// unchanged rather than dividing by zero.
    pub fn normalize(&self) -> Embedding {
        let mag = self.magnitude();
        if mag == 0.0 {
            return self.clone();
        }
        let values = self.values.iter().map(|x| x / mag).collect();
        Embedding {
            values,
            magnitude: OnceCell::with_value(1.0),
        }
    }

    /// Cosine similarity against another embedding.
    pub fn cosine_similarity(&self, other: &Embedding) -> Result<f32> {
        cosine_similarity(&self.values, &other.values)
    }

    /// Euclidean distance against another embedding.
    pub fn euclidean_distance(&self, other: &Embedding) -> Result<f32> {
        euclidean_distance(&self.values, &other.values)
    }
}

impl PartialEq for Embedding {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Embedding::new(values)
    }
}

/// Cosine similarity between two raw vectors of equal dimension.
///
/// Returns 0.0 when either vector has zero magnitude: a zero vector has
/// no direction, so it is similar to nothing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (mag_a * mag_b))
}

/// Euclidean distance between two raw vectors of equal dimension.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;

    let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(sum.sqrt())
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}
