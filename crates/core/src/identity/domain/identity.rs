use serde::{Deserialize, Serialize};

use crate::shared::feature_vector::FeatureVector;

pub type IdentityId = u64;

/// A known person: a name and the running weighted mean of every face
/// descriptor taught or matched to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    pub centroid: FeatureVector,
    pub observation_weight: f64,
}

impl Identity {
    /// A fresh identity seeded with a single observation.
    pub fn new(id: IdentityId, name: impl Into<String>, centroid: FeatureVector) -> Self {
        Self {
            id,
            name: name.into(),
            centroid,
            observation_weight: 1.0,
        }
    }

    pub fn distance_to(&self, vector: &FeatureVector) -> f64 {
        self.centroid.distance(vector)
    }

    /// Folds `vector` into the centroid with the given weight.
    ///
    /// `centroid' = (centroid * w + vector * weight) / (w + weight)`.
    pub fn merged_with(&self, vector: &FeatureVector, weight: f64) -> Identity {
        let total = self.observation_weight + weight;
        if total <= 0.0 {
            return self.clone();
        }
        Identity {
            centroid: self
                .centroid
                .weighted_mean(self.observation_weight, vector, weight),
            observation_weight: total,
            ..self.clone()
        }
    }
}
