use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::identity::domain::identity::{Identity, IdentityId};
use crate::identity::domain::identity_repository::{IdentityRepository, RepositoryError};

/// Volatile repository; identities live as long as the process.
#[derive(Default)]
pub struct MemoryIdentityRepository {
    identities: Mutex<BTreeMap<IdentityId, Identity>>,
}

impl MemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: Vec<Identity>) -> Self {
        Self {
            identities: Mutex::new(identities.into_iter().map(|i| (i.id, i)).collect()),
        }
    }
}

impl IdentityRepository for MemoryIdentityRepository {
    fn load(&self) -> Result<Vec<Identity>, RepositoryError> {
        let identities = self
            .identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(identities.values().cloned().collect())
    }

    fn save(&self, identity: &Identity) -> Result<(), RepositoryError> {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.id, identity.clone());
        Ok(())
    }

    fn delete(&self, id: IdentityId) -> Result<(), RepositoryError> {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        Ok(())
    }
}
