use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::identity::domain::identity::{Identity, IdentityId};
use crate::identity::domain::identity_repository::{IdentityRepository, RepositoryError};

#[derive(Serialize, Deserialize, Default)]
struct IdentityDocument {
    identities: Vec<Identity>,
}

/// Stores all identities in a single JSON document.
///
/// Every change rewrites the whole file through a `.part` sibling that is
/// renamed into place, so readers never see a half-written store.
pub struct JsonIdentityRepository {
    path: PathBuf,
    identities: Mutex<BTreeMap<IdentityId, Identity>>,
}

impl JsonIdentityRepository {
    /// Opens the document at `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let identities = if path.exists() {
            read_document(path)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            identities: Mutex::new(identities),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy, persists it, then commits it in memory.
    fn update<F>(&self, change: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut BTreeMap<IdentityId, Identity>),
    {
        let mut identities = self
            .identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = identities.clone();
        change(&mut next);
        write_document(&self.path, &next)?;
        *identities = next;
        Ok(())
    }
}

impl IdentityRepository for JsonIdentityRepository {
    fn load(&self) -> Result<Vec<Identity>, RepositoryError> {
        let identities = self
            .identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(identities.values().cloned().collect())
    }

    fn save(&self, identity: &Identity) -> Result<(), RepositoryError> {
        self.update(|identities| {
            identities.insert(identity.id, identity.clone());
        })
    }

    fn delete(&self, id: IdentityId) -> Result<(), RepositoryError> {
        self.update(|identities| {
            identities.remove(&id);
        })
    }
}

fn read_document(path: &Path) -> Result<BTreeMap<IdentityId, Identity>, RepositoryError> {
    let json = fs::read_to_string(path).map_err(|source| RepositoryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: IdentityDocument =
        serde_json::from_str(&json).map_err(|source| RepositoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(document
        .identities
        .into_iter()
        .map(|identity| (identity.id, identity))
        .collect())
}

fn write_document(
    path: &Path,
    identities: &BTreeMap<IdentityId, Identity>,
) -> Result<(), RepositoryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error(parent))?;
    }

    let document = IdentityDocument {
        identities: identities.values().cloned().collect(),
    };
    let json = serde_json::to_vec_pretty(&document).map_err(RepositoryError::Encode)?;

    let temp_path = path.with_extension("part");
    let mut file = fs::File::create(&temp_path).map_err(write_error(&temp_path))?;
    file.write_all(&json).map_err(write_error(&temp_path))?;
    file.sync_all().map_err(write_error(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(write_error(path))?;
    Ok(())
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> RepositoryError {
    let path = path.to_path_buf();
    move |source| RepositoryError::Write { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::FEATURE_DIMENSION;
    use crate::shared::feature_vector::FeatureVector;
    use tempfile::TempDir;

    fn identity(id: IdentityId, name: &str, code: f64) -> Identity {
        Identity::new(id, name, FeatureVector::new(vec![code; FEATURE_DIMENSION]).unwrap())
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonIdentityRepository::open(&tmp.path().join("faces.json")).unwrap();
        assert!(repo.load().unwrap().is_empty());
    }

    #[test]
    fn test_saved_identities_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("faces.json");

        let repo = JsonIdentityRepository::open(&path).unwrap();
        repo.save(&identity(1, "Ada", 0.1)).unwrap();
        repo.save(&identity(2, "Grace", 0.2)).unwrap();
        drop(repo);

        let reopened = JsonIdentityRepository::open(&path).unwrap();
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded, vec![identity(1, "Ada", 0.1), identity(2, "Grace", 0.2)]);
    }

    #[test]
    fn test_delete_is_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");

        let repo = JsonIdentityRepository::open(&path).unwrap();
        repo.save(&identity(1, "Ada", 0.1)).unwrap();
        repo.save(&identity(2, "Grace", 0.2)).unwrap();
        repo.delete(1).unwrap();

        let reopened = JsonIdentityRepository::open(&path).unwrap();
        let names: Vec<String> = reopened.load().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Grace".to_string()]);
    }

    #[test]
    fn test_no_part_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");
        let repo = JsonIdentityRepository::open(&path).unwrap();
        repo.save(&identity(1, "Ada", 0.1)).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("part").exists());
    }

    #[test]
    fn test_corrupt_file_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");
        fs::write(&path, "{\"identities\": [").unwrap();

        assert!(matches!(
            JsonIdentityRepository::open(&path),
            Err(RepositoryError::Parse { .. })
        ));
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let tmp = TempDir::new().unwrap();
        // A directory where the document should be makes the final rename fail.
        let path = tmp.path().join("faces.json");
        let repo = JsonIdentityRepository::open(&path).unwrap();
        fs::create_dir_all(path.join("blocker")).unwrap();

        assert!(repo.save(&identity(1, "Ada", 0.1)).is_err());
        assert!(repo.load().unwrap().is_empty());
    }
}
