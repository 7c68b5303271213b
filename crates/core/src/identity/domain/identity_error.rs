use thiserror::Error;

use crate::identity::domain::identity_repository::RepositoryError;
use crate::shared::feature_vector::FeatureVectorError;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("identity storage failed: {0}")]
    Storage(#[from] RepositoryError),
    #[error("request to {url} failed: {source}")]
    Remote {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("identity server returned {status}: {message}")]
    RemoteStatus { status: u16, message: String },
}

impl From<FeatureVectorError> for IdentityError {
    fn from(e: FeatureVectorError) -> Self {
        IdentityError::InvalidArgument(e.to_string())
    }
}
