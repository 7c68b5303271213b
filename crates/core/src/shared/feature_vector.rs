use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::FEATURE_DIMENSION;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureVectorError {
    #[error("feature vector must have {expected} components, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("feature vector component {index} is not finite")]
    NonFinite { index: usize },
}

/// Face descriptor produced by the embedding model.
///
/// Always exactly [`FEATURE_DIMENSION`] finite components. Immutable once
/// built; merging produces a new vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector(Array1<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Result<Self, FeatureVectorError> {
        if values.len() != FEATURE_DIMENSION {
            return Err(FeatureVectorError::Dimension {
                expected: FEATURE_DIMENSION,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(FeatureVectorError::NonFinite { index });
        }
        Ok(Self(Array1::from_vec(values)))
    }

    pub fn values(&self) -> &[f64] {
        self.0.as_slice().unwrap_or(&[])
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &FeatureVector) -> f64 {
        (&self.0 - &other.0).mapv(|d| d * d).sum().sqrt()
    }

    /// `(self * self_weight + other * other_weight) / (self_weight + other_weight)`.
    ///
    /// The combined weight must be positive.
    pub fn weighted_mean(
        &self,
        self_weight: f64,
        other: &FeatureVector,
        other_weight: f64,
    ) -> FeatureVector {
        let total = self_weight + other_weight;
        debug_assert!(total > 0.0, "combined weight must be positive");
        FeatureVector((&self.0 * self_weight + &other.0 * other_weight) / total)
    }

    /// Little-endian `f64` bytes, the wire layout of a face code.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, FeatureVectorError> {
        if bytes.len() != FEATURE_DIMENSION * 8 {
            return Err(FeatureVectorError::Dimension {
                expected: FEATURE_DIMENSION,
                actual: bytes.len() / 8,
            });
        }
        let values = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        Self::new(values)
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = FeatureVectorError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(v: FeatureVector) -> Self {
        v.0.to_vec()
    }
}
