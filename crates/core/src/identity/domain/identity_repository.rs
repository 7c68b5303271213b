use std::path::PathBuf;

use thiserror::Error;

use crate::identity::domain::identity::{Identity, IdentityId};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("failed to read identities from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse identities in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode identities: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write identities to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable storage behind the identity store.
///
/// The store keeps its own cache and writes through on every change; a
/// failed write must leave the stored state untouched.
pub trait IdentityRepository: Send + Sync {
    fn load(&self) -> Result<Vec<Identity>, RepositoryError>;
    fn save(&self, identity: &Identity) -> Result<(), RepositoryError>;
    fn delete(&self, id: IdentityId) -> Result<(), RepositoryError>;
}
