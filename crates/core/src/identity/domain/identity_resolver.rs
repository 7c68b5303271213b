use crate::identity::domain::identity::{Identity, IdentityId};
use crate::identity::domain::identity_error::IdentityError;
use crate::shared::feature_vector::FeatureVector;

pub const DEFAULT_TEACH_WEIGHT: f64 = 1.0;

/// Turns face descriptors into stable identities.
///
/// Implemented in-process by `IdentityStore` and over HTTP by
/// `RemoteIdentityResolver`; both apply the same distance threshold and
/// weighted-merge rules. The tracker depends only on this trait.
pub trait IdentityResolver: Send + Sync {
    /// Closest identity within the distance threshold, or a newly created
    /// `"unknown"` identity when nothing is close enough.
    fn identify(&self, vector: &FeatureVector) -> Result<Identity, IdentityError>;

    /// Merges `vector` into the identity named by `id` or `name`.
    ///
    /// Without a match, a `name` is required: a nearby unknown identity is
    /// renamed, otherwise a new identity is created.
    fn teach(
        &self,
        vector: &FeatureVector,
        name: Option<&str>,
        id: Option<IdentityId>,
        weight: f64,
    ) -> Result<Identity, IdentityError>;

    /// Exact match by id (preferred) or name.
    fn lookup(&self, name: Option<&str>, id: Option<IdentityId>)
        -> Result<Identity, IdentityError>;

    fn list(&self) -> Result<Vec<Identity>, IdentityError>;

    fn rename(&self, id: IdentityId, name: &str) -> Result<Identity, IdentityError>;

    /// Administrative removal; returns the removed identity.
    fn delete(&self, id: IdentityId) -> Result<Identity, IdentityError>;
}

/// Shared argument checks so every resolver rejects the same input.
pub fn validate_teach_weight(weight: f64) -> Result<(), IdentityError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(IdentityError::InvalidArgument(format!(
            "teach weight must be a non-negative number, got {weight}"
        )))
    }
}

pub fn validate_name(name: &str) -> Result<(), IdentityError> {
    if name.trim().is_empty() {
        Err(IdentityError::InvalidArgument(
            "identity name must not be empty".into(),
        ))
    } else {
        Ok(())
    }
}
