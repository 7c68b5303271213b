use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::identity::domain::identity::{Identity, IdentityId};
use crate::identity::domain::identity_error::IdentityError;
use crate::identity::domain::identity_repository::IdentityRepository;
use crate::identity::domain::identity_resolver::{
    validate_name, validate_teach_weight, IdentityResolver,
};
use crate::identity::infrastructure::memory_identity_repository::MemoryIdentityRepository;
use crate::shared::config::IdentityStoreConfig;
use crate::shared::constants::UNKNOWN_NAME;
use crate::shared::feature_vector::FeatureVector;

struct StoreState {
    identities: BTreeMap<IdentityId, Identity>,
    next_id: IdentityId,
}

impl StoreState {
    /// Closest identity strictly under `threshold` among those accepted by
    /// `filter`. Linear in the number of identities. Equal distances go to
    /// the lowest id.
    fn nearest<F>(&self, vector: &FeatureVector, threshold: f64, filter: F) -> Option<&Identity>
    where
        F: Fn(&Identity) -> bool,
    {
        self.identities
            .values()
            .filter(|identity| filter(identity))
            .map(|identity| (identity.distance_to(vector), identity))
            .filter(|(distance, _)| *distance < threshold)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, identity)| identity)
    }

    /// Names are not unique; the oldest identity carrying the name wins.
    fn find_by_name(&self, name: &str) -> Option<&Identity> {
        self.identities.values().find(|identity| identity.name == name)
    }
}

/// Online nearest-neighbour identity store.
///
/// Reads scan an in-memory cache under a shared lock; every write holds the
/// exclusive lock across the compare, the merge and the repository write,
/// so concurrent teaches of one identity never lose an observation.
pub struct IdentityStore {
    repository: Box<dyn IdentityRepository>,
    config: IdentityStoreConfig,
    state: RwLock<StoreState>,
}

impl IdentityStore {
    pub fn open(
        repository: Box<dyn IdentityRepository>,
        config: IdentityStoreConfig,
    ) -> Result<Self, IdentityError> {
        config
            .validate()
            .map_err(|e| IdentityError::InvalidArgument(e.to_string()))?;

        let identities: BTreeMap<IdentityId, Identity> = repository
            .load()?
            .into_iter()
            .map(|identity| (identity.id, identity))
            .collect();
        let next_id = identities.keys().next_back().map_or(1, |last| last + 1);
        log::info!(
            "Identity store opened with {} identities (threshold {})",
            identities.len(),
            config.distance_threshold
        );

        Ok(Self {
            repository,
            config,
            state: RwLock::new(StoreState {
                identities,
                next_id,
            }),
        })
    }

    pub fn in_memory(config: IdentityStoreConfig) -> Result<Self, IdentityError> {
        Self::open(Box::new(MemoryIdentityRepository::new()), config)
    }

    pub fn distance_threshold(&self) -> f64 {
        self.config.distance_threshold
    }

    pub fn len(&self) -> usize {
        self.read().identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes through to the repository first; the cache only changes once
    /// the identity is durable.
    fn persist(&self, state: &mut StoreState, identity: Identity) -> Result<Identity, IdentityError> {
        self.repository.save(&identity)?;
        state.next_id = state.next_id.max(identity.id + 1);
        state.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    fn create(
        &self,
        state: &mut StoreState,
        name: &str,
        vector: &FeatureVector,
    ) -> Result<Identity, IdentityError> {
        let identity = self.persist(state, Identity::new(state.next_id, name, vector.clone()))?;
        log::info!("Created identity {} '{}'", identity.id, identity.name);
        Ok(identity)
    }
}

impl IdentityResolver for IdentityStore {
    fn identify(&self, vector: &FeatureVector) -> Result<Identity, IdentityError> {
        let threshold = self.config.distance_threshold;
        if let Some(found) = self.read().nearest(vector, threshold, |_| true) {
            return Ok(found.clone());
        }

        let mut state = self.write();
        // Another caller may have created a match between the two locks.
        if let Some(found) = state.nearest(vector, threshold, |_| true) {
            return Ok(found.clone());
        }
        self.create(&mut state, UNKNOWN_NAME, vector)
    }

    fn teach(
        &self,
        vector: &FeatureVector,
        name: Option<&str>,
        id: Option<IdentityId>,
        weight: f64,
    ) -> Result<Identity, IdentityError> {
        validate_teach_weight(weight)?;
        if let Some(name) = name {
            validate_name(name)?;
        }

        let mut state = self.write();
        let existing = id
            .and_then(|id| state.identities.get(&id))
            .or_else(|| name.and_then(|n| state.find_by_name(n)))
            .cloned();

        if let Some(existing) = existing {
            let mut merged = existing.merged_with(vector, weight);
            if let Some(name) = name {
                merged.name = name.to_string();
            }
            log::debug!(
                "Taught identity {} '{}' (weight {:.2})",
                merged.id,
                merged.name,
                merged.observation_weight
            );
            return self.persist(&mut state, merged);
        }

        let Some(name) = name else {
            return Err(IdentityError::InvalidArgument(
                "cannot teach an unknown identity without a name".into(),
            ));
        };

        let threshold = self.config.distance_threshold;
        let unknown = state
            .nearest(vector, threshold, |identity| identity.name == UNKNOWN_NAME)
            .cloned();
        if let Some(unknown) = unknown {
            let mut merged = unknown.merged_with(vector, weight);
            merged.name = name.to_string();
            log::info!("Named unknown identity {} as '{}'", merged.id, name);
            return self.persist(&mut state, merged);
        }

        self.create(&mut state, name, vector)
    }

    fn lookup(
        &self,
        name: Option<&str>,
        id: Option<IdentityId>,
    ) -> Result<Identity, IdentityError> {
        let state = self.read();
        match (id, name) {
            (Some(id), _) => state
                .identities
                .get(&id)
                .cloned()
                .ok_or_else(|| IdentityError::NotFound(format!("id {id}"))),
            (None, Some(name)) => state
                .find_by_name(name)
                .cloned()
                .ok_or_else(|| IdentityError::NotFound(format!("name '{name}'"))),
            (None, None) => Err(IdentityError::InvalidArgument(
                "lookup requires a name or an id".into(),
            )),
        }
    }

    fn list(&self) -> Result<Vec<Identity>, IdentityError> {
        Ok(self.read().identities.values().cloned().collect())
    }

    fn rename(&self, id: IdentityId, name: &str) -> Result<Identity, IdentityError> {
        validate_name(name)?;
        let mut state = self.write();
        let mut identity = state
            .identities
            .get(&id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(format!("id {id}")))?;
        identity.name = name.to_string();
        self.persist(&mut state, identity)
    }

    fn delete(&self, id: IdentityId) -> Result<Identity, IdentityError> {
        let mut state = self.write();
        if !state.identities.contains_key(&id) {
            return Err(IdentityError::NotFound(format!("id {id}")));
        }
        self.repository.delete(id)?;
        let removed = state
            .identities
            .remove(&id)
            .ok_or_else(|| IdentityError::NotFound(format!("id {id}")))?;
        log::info!("Deleted identity {} '{}'", removed.id, removed.name);
        Ok(removed)
    }
}
