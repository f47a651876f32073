//! JSON-file backed user store.
//!
//! [`UserStore`] is the single source of truth for user records. It keeps the whole collection
//! in memory, in insertion order, and mirrors it to one file after every mutation.
//!
//! ## Storage Layout
//!
//! ```text
//! data/
//!   users.json                        # pretty-printed JSON array of users
//!   users.json.tmp                    # transient, exists only during a write
//!   users.json.corrupt-<timestamp>    # unreadable files moved aside by StartEmpty
//! ```
//!
//! ## Persistence
//!
//! - `open` loads the file if it exists and rebuilds the issued-ID set from it; otherwise it
//!   writes an empty collection so the file exists from the first run.
//! - Every mutation rewrites the entire file. The new content is written to a sibling temp file
//!   and renamed over the old one, so readers never observe a half-written collection.
//! - If a write fails, the in-memory mutation is undone before the error is returned, so memory
//!   and disk agree on what the last successful write contained.
//!
//! ## Concurrency
//!
//! The store is a plain value with `&mut self` mutations. Callers that share it across threads
//! must wrap it in a lock so that "mutate + persist" runs as one unit.

use crate::config::{CoreConfig, CorruptDataPolicy};
use crate::constants::{CORRUPT_FILE_MARKER, CORRUPT_FILE_TIMESTAMP_FORMAT, TEMP_FILE_SUFFIX};
use crate::user::{NewUser, User, UserCriteria, UserDraft, UserPatch};
use crate::validation::{validate, ValidationMode};
use crate::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use usuarios_id::IdGenerator;

/// Summary of the store's state, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of live records.
    pub total: usize,
    /// Number of identifiers in the issued set. Equal to `total` unless something is wrong.
    pub issued_ids: usize,
    pub file_path: PathBuf,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    users: Vec<User>,
    ids: IdGenerator,
}

impl UserStore {
    /// Opens the store backed by the configured data file.
    ///
    /// If the file exists it is parsed as the full collection. If it does not, an empty
    /// collection is written immediately, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if:
    /// - the file exists but cannot be read,
    /// - the file is not a valid collection (bad JSON, invalid ids, duplicate ids, records that
    ///   fail field validation) and the policy is [`CorruptDataPolicy::Fail`]
    ///   ([`StoreError::CorruptData`]),
    /// - an unreadable file cannot be moved aside under [`CorruptDataPolicy::StartEmpty`],
    /// - the initial empty collection cannot be written.
    pub fn open(cfg: &CoreConfig) -> StoreResult<Self> {
        let mut store = Self {
            path: cfg.data_file().to_path_buf(),
            users: Vec::new(),
            ids: IdGenerator::new(),
        };

        if !store.path.exists() {
            store.persist()?;
            tracing::info!("created empty user file at {}", store.path.display());
            return Ok(store);
        }

        match store.load() {
            Ok(()) => {
                tracing::info!(
                    "loaded {} users from {}",
                    store.users.len(),
                    store.path.display()
                );
            }
            Err(e @ StoreError::CorruptData { .. }) => match cfg.corrupt_data_policy() {
                CorruptDataPolicy::Fail => return Err(e),
                CorruptDataPolicy::StartEmpty => {
                    let moved_to = store.quarantine()?;
                    tracing::warn!(
                        "{}; moved it to {} and starting with no users",
                        e,
                        moved_to.display()
                    );
                    store.users.clear();
                    store.ids.clear();
                    store.persist()?;
                }
            },
            Err(e) => return Err(e),
        }

        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Returns a copy of every record, in insertion order.
    pub fn list(&self) -> Vec<User> {
        self.users.clone()
    }

    /// Returns the record with exactly this id, if any.
    pub fn get_by_id(&self, id: &str) -> Option<User> {
        self.users.iter().find(|user| user.id.as_str() == id).cloned()
    }

    /// Stores a new record under a freshly generated id and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Id`] if no id can be generated, or a write error if the file cannot
    /// be rewritten (the record is then not kept).
    pub fn create(&mut self, new_user: NewUser) -> StoreResult<User> {
        let id = self.ids.generate()?;
        let user = new_user.with_id(id);
        self.users.push(user.clone());

        if let Err(e) = self.persist() {
            self.users.pop();
            self.ids.release(user.id.as_str());
            return Err(e);
        }

        tracing::debug!("created user {}", user.id);
        Ok(user)
    }

    /// Replaces every field except `id`. Returns `None` if no record has this id; this never
    /// creates a record.
    ///
    /// # Errors
    ///
    /// Returns a write error if the file cannot be rewritten (the old record is then restored).
    pub fn update(&mut self, id: &str, new_user: NewUser) -> StoreResult<Option<User>> {
        let Some(index) = self.position(id) else {
            return Ok(None);
        };

        let replacement = new_user.with_id(self.users[index].id.clone());
        let previous = std::mem::replace(&mut self.users[index], replacement);

        if let Err(e) = self.persist() {
            self.users[index] = previous;
            return Err(e);
        }

        tracing::debug!("updated user {}", id);
        Ok(Some(self.users[index].clone()))
    }

    /// Merges the supplied fields onto the record. Returns `None` if no record has this id.
    ///
    /// # Errors
    ///
    /// Returns a write error if the file cannot be rewritten (the old record is then restored).
    pub fn partial_update(&mut self, id: &str, patch: UserPatch) -> StoreResult<Option<User>> {
        let Some(index) = self.position(id) else {
            return Ok(None);
        };

        let previous = self.users[index].clone();
        patch.apply(&mut self.users[index]);

        if let Err(e) = self.persist() {
            self.users[index] = previous;
            return Err(e);
        }

        tracing::debug!("patched user {}", id);
        Ok(Some(self.users[index].clone()))
    }

    /// Removes the record. Returns `false` if no record has this id.
    ///
    /// # Errors
    ///
    /// Returns a write error if the file cannot be rewritten (the record is then reinserted at
    /// its old position).
    pub fn delete(&mut self, id: &str) -> StoreResult<bool> {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };

        let removed = self.users.remove(index);

        if let Err(e) = self.persist() {
            self.users.insert(index, removed);
            return Err(e);
        }

        self.ids.release(removed.id.as_str());
        tracing::debug!("deleted user {}", id);
        Ok(true)
    }

    /// Returns every record matching all supplied criteria, in insertion order.
    pub fn find(&self, criteria: &UserCriteria) -> Vec<User> {
        self.users
            .iter()
            .filter(|user| criteria.matches(user))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let last_modified = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        StoreStats {
            total: self.users.len(),
            issued_ids: self.ids.len(),
            file_path: self.path.clone(),
            last_modified,
        }
    }

    /// Removes every record and frees every id.
    ///
    /// # Errors
    ///
    /// Returns a write error if the file cannot be rewritten (the records are then kept).
    pub fn clear(&mut self) -> StoreResult<()> {
        let previous = std::mem::take(&mut self.users);

        if let Err(e) = self.persist() {
            self.users = previous;
            return Err(e);
        }

        self.ids.clear();
        tracing::info!("cleared {} users", previous.len());
        Ok(())
    }

    /// Rewrites the backing file from memory. Intended for shutdown.
    pub fn flush(&self) -> StoreResult<()> {
        self.persist()?;
        tracing::info!(
            "flushed {} users to {}",
            self.users.len(),
            self.path.display()
        );
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.users.iter().position(|user| user.id.as_str() == id)
    }

    fn load(&mut self) -> StoreResult<()> {
        let contents = fs::read_to_string(&self.path).map_err(StoreError::FileRead)?;
        let users: Vec<User> =
            serde_json::from_str(&contents).map_err(|e| StoreError::CorruptData {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let mut ids = IdGenerator::new();
        for user in &users {
            if !ids.reserve(user.id.clone()) {
                return Err(StoreError::CorruptData {
                    path: self.path.clone(),
                    reason: format!("duplicate user id {}", user.id),
                });
            }

            let errors = validate(&UserDraft::from(user), ValidationMode::Full);
            if !errors.is_empty() {
                return Err(StoreError::CorruptData {
                    path: self.path.clone(),
                    reason: format!("user {}: {}", user.id, errors.join("; ")),
                });
            }
        }

        self.users = users;
        self.ids = ids;
        Ok(())
    }

    fn persist(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(StoreError::StorageDirCreation)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.users).map_err(StoreError::Serialization)?;

        let tmp_path = self.sibling_path(TEMP_FILE_SUFFIX);
        fs::write(&tmp_path, json).map_err(StoreError::FileWrite)?;

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::FileWrite(e));
        }

        Ok(())
    }

    fn quarantine(&self) -> StoreResult<PathBuf> {
        let stamp = Utc::now().format(CORRUPT_FILE_TIMESTAMP_FORMAT).to_string();
        let target = self.sibling_path(&format!("{}{}", CORRUPT_FILE_MARKER, stamp));

        fs::rename(&self.path, &target).map_err(|source| StoreError::Quarantine {
            path: self.path.clone(),
            source,
        })?;

        Ok(target)
    }

    /// `<dir>/<file name><suffix>`, next to the data file.
    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;
    use usuarios_id::UserId;

    fn test_cfg(data_file: &Path) -> CoreConfig {
        CoreConfig::new(data_file.to_path_buf(), CorruptDataPolicy::Fail).unwrap()
    }

    fn new_user(nombre: &str, edad: u8) -> NewUser {
        NewUser {
            nombre: nombre.into(),
            apellido: "Ruiz".into(),
            edad,
            email: format!("{}@example.com", nombre.to_lowercase()),
            telefono: "555-0100".into(),
        }
    }

    fn open_in(temp: &TempDir) -> (UserStore, PathBuf) {
        let path = temp.path().join("data").join("users.json");
        let store = UserStore::open(&test_cfg(&path)).unwrap();
        (store, path)
    }

    /// Replaces the data directory with a plain file so the next write fails.
    fn break_storage(path: &Path) {
        let dir = path.parent().unwrap();
        fs::remove_dir_all(dir).unwrap();
        fs::write(dir, "not a directory").unwrap();
    }

    #[test]
    fn test_open_creates_empty_file_and_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let (store, path) = open_in(&temp);

        assert!(store.is_empty());
        assert!(path.is_file());
        let on_disk: Vec<User> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(on_disk.is_empty());
    }

    #[test]
    fn test_create_then_get_by_id() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let input = new_user("Ana", 29);
        let created = store.create(input.clone()).unwrap();

        assert!(UserId::is_canonical(created.id.as_str()));
        assert_eq!(store.get_by_id(created.id.as_str()), Some(created.clone()));
        assert_eq!(created, input.with_id(created.id.clone()));
    }

    #[test]
    fn test_ids_are_pairwise_distinct() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let mut seen = HashSet::new();
        for i in 0..200 {
            let user = store.create(new_user("Ana", (i % 150) as u8)).unwrap();
            assert!(seen.insert(user.id));
        }
        assert_eq!(store.stats().issued_ids, 200);
    }

    #[test]
    fn test_get_by_id_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let (store, _) = open_in(&temp);
        assert_eq!(store.get_by_id("NOPE0000"), None);
    }

    #[test]
    fn test_update_replaces_all_fields() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let created = store.create(new_user("Ana", 29)).unwrap();
        let replacement = NewUser {
            nombre: "Beatriz".into(),
            apellido: "Soto".into(),
            edad: 51,
            email: "bea@example.org".into(),
            telefono: "555-0199".into(),
        };

        let updated = store
            .update(created.id.as_str(), replacement.clone())
            .unwrap()
            .unwrap();

        assert_eq!(updated, replacement.with_id(created.id.clone()));
        assert_eq!(store.get_by_id(created.id.as_str()), Some(updated));
    }

    #[test]
    fn test_update_missing_is_not_an_upsert() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let result = store.update("NOPE0000", new_user("Ana", 29)).unwrap();
        assert_eq!(result, None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_partial_update_changes_only_supplied_fields() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let created = store.create(new_user("Ana", 29)).unwrap();
        let patch = UserPatch {
            edad: Some(40),
            ..Default::default()
        };

        let patched = store
            .partial_update(created.id.as_str(), patch)
            .unwrap()
            .unwrap();

        assert_eq!(patched.edad, 40);
        assert_eq!(
            User {
                edad: 29,
                ..patched.clone()
            },
            created
        );
        assert_eq!(store.get_by_id(created.id.as_str()), Some(patched));
    }

    #[test]
    fn test_partial_update_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let result = store
            .partial_update("NOPE0000", UserPatch::default())
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_delete_existing_and_missing() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let created = store.create(new_user("Ana", 29)).unwrap();
        assert!(store.delete(created.id.as_str()).unwrap());
        assert_eq!(store.get_by_id(created.id.as_str()), None);
        assert!(!store.delete(created.id.as_str()).unwrap());
        assert_eq!(store.stats().issued_ids, 0);
    }

    #[test]
    fn test_find_matches_subset() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        let ana1 = store.create(new_user("Ana", 29)).unwrap();
        store.create(new_user("Luis", 29)).unwrap();
        let ana2 = store.create(new_user("Ana", 41)).unwrap();

        let by_name = store.find(&UserCriteria {
            nombre: Some("Ana".into()),
            ..Default::default()
        });
        assert_eq!(by_name, vec![ana1.clone(), ana2]);

        let by_name_and_age = store.find(&UserCriteria {
            nombre: Some("Ana".into()),
            edad: Some(29),
            ..Default::default()
        });
        assert_eq!(by_name_and_age, vec![ana1]);

        assert_eq!(store.find(&UserCriteria::default()).len(), 3);
        assert!(store
            .find(&UserCriteria {
                nombre: Some("Nadie".into()),
                ..Default::default()
            })
            .is_empty());
    }

    #[test]
    fn test_list_is_a_defensive_copy() {
        let temp = TempDir::new().unwrap();
        let (mut store, _) = open_in(&temp);

        store.create(new_user("Ana", 29)).unwrap();
        let mut snapshot = store.list();
        snapshot.clear();
        store.create(new_user("Luis", 30)).unwrap();

        assert!(snapshot.is_empty());
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_reopen_preserves_collection_and_order() {
        let temp = TempDir::new().unwrap();
        let (mut store, path) = open_in(&temp);

        for (nombre, edad) in [("Ana", 29), ("Luis", 30), ("Marta", 31)] {
            store.create(new_user(nombre, edad)).unwrap();
        }
        let second = store.list()[1].id.clone();
        store.delete(second.as_str()).unwrap();
        let before = store.list();
        drop(store);

        let reopened = UserStore::open(&test_cfg(&path)).unwrap();
        assert_eq!(reopened.list(), before);
        assert_eq!(reopened.stats().issued_ids, before.len());
    }

    #[test]
    fn test_file_is_pretty_printed_array() {
        let temp = TempDir::new().unwrap();
        let (mut store, path) = open_in(&temp);

        let created = store.create(new_user("Ana", 29)).unwrap();
        let raw = fs::read_to_string(&path).unwrap();

        assert!(raw.starts_with("[\n"));
        assert!(raw.contains(&format!("\"id\": \"{}\"", created.id)));
        assert!(!path.with_file_name("users.json.tmp").exists());
    }

    #[test]
    fn test_reloaded_ids_are_not_reissued() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");
        fs::write(
            &path,
            r#"[{"id":"AAAAAAAA","nombre":"Ana","apellido":"Ruiz","edad":29,"email":"ana@example.com","telefono":"1"}]"#,
        )
        .unwrap();

        let mut store = UserStore::open(&test_cfg(&path)).unwrap();
        assert_eq!(store.stats().issued_ids, 1);

        let created = store.create(new_user("Luis", 30)).unwrap();
        assert_ne!(created.id.as_str(), "AAAAAAAA");
    }

    #[test]
    fn test_corrupt_file_fails_by_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");
        fs::write(&path, "{ not json").unwrap();

        let result = UserStore::open(&test_cfg(&path));
        assert!(matches!(result, Err(StoreError::CorruptData { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_duplicate_ids_are_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");
        let user = r#"{"id":"AAAAAAAA","nombre":"Ana","apellido":"Ruiz","edad":29,"email":"ana@example.com","telefono":"1"}"#;
        fs::write(&path, format!("[{user},{user}]")).unwrap();

        match UserStore::open(&test_cfg(&path)) {
            Err(StoreError::CorruptData { reason, .. }) => {
                assert!(reason.contains("duplicate user id AAAAAAAA"))
            }
            other => panic!("expected CorruptData, got {other:?}"),
        }
    }

    #[test]
    fn test_records_failing_validation_are_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");
        let raw = r#"[{"id":"AAAAAAAA","nombre":"  ","apellido":"","edad":200,"email":"nope","telefono":""}]"#;
        fs::write(&path, raw).unwrap();

        match UserStore::open(&test_cfg(&path)) {
            Err(StoreError::CorruptData { reason, .. }) => {
                assert!(reason.starts_with("user AAAAAAAA: El nombre es requerido"));
                assert!(reason.contains("La edad debe ser un número entre 0 y 150"));
                assert!(reason.contains("El teléfono es requerido"));
            }
            other => panic!("expected CorruptData, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), raw);

        let cfg = CoreConfig::new(path.clone(), CorruptDataPolicy::StartEmpty).unwrap();
        assert!(UserStore::open(&cfg).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_start_empty_moves_file_aside() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");
        fs::write(&path, "{ not json").unwrap();

        let cfg = CoreConfig::new(path.clone(), CorruptDataPolicy::StartEmpty).unwrap();
        let store = UserStore::open(&cfg).unwrap();

        assert!(store.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");

        let moved: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("users.json.corrupt-"))
            .collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(
            fs::read_to_string(temp.path().join(&moved[0])).unwrap(),
            "{ not json"
        );
    }

    #[test]
    fn test_failed_create_is_rolled_back() {
        let temp = TempDir::new().unwrap();
        let (mut store, path) = open_in(&temp);
        store.create(new_user("Ana", 29)).unwrap();
        break_storage(&path);

        let result = store.create(new_user("Luis", 30));
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().issued_ids, 1);
    }

    #[test]
    fn test_failed_update_patch_and_delete_are_rolled_back() {
        let temp = TempDir::new().unwrap();
        let (mut store, path) = open_in(&temp);
        let created = store.create(new_user("Ana", 29)).unwrap();
        let id = created.id.as_str();
        break_storage(&path);

        assert!(store.update(id, new_user("Luis", 30)).is_err());
        assert_eq!(store.get_by_id(id), Some(created.clone()));

        let patch = UserPatch {
            edad: Some(40),
            ..Default::default()
        };
        assert!(store.partial_update(id, patch).is_err());
        assert_eq!(store.get_by_id(id), Some(created.clone()));

        assert!(store.delete(id).is_err());
        assert_eq!(store.list(), vec![created.clone()]);

        assert!(store.clear().is_err());
        assert_eq!(store.list(), vec![created]);
    }

    #[test]
    fn test_clear_and_stats() {
        let temp = TempDir::new().unwrap();
        let (mut store, path) = open_in(&temp);

        store.create(new_user("Ana", 29)).unwrap();
        store.create(new_user("Luis", 30)).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.issued_ids, 2);
        assert_eq!(stats.file_path, path);
        assert!(stats.last_modified.is_some());

        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.stats().issued_ids, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_flush_rewrites_file() {
        let temp = TempDir::new().unwrap();
        let (mut store, path) = open_in(&temp);
        let created = store.create(new_user("Ana", 29)).unwrap();

        fs::remove_file(&path).unwrap();
        store.flush().unwrap();

        let reopened = UserStore::open(&test_cfg(&path)).unwrap();
        assert_eq!(reopened.list(), vec![created]);
    }
}
