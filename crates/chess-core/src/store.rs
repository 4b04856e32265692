//! JSON-file record store
//!
//! Every collection lives in `<data_dir>/<collection>.json` as a single JSON
//! array. Reads load the whole file; writes go through [`JsonStore::modify`],
//! which serializes writers behind one lock and replaces the file atomically
//! (write to a temporary sibling, then rename).

use crate::models::User;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt data in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A record kept in its own JSON collection
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// File stem of the collection
    const COLLECTION: &'static str;

    fn id(&self) -> i64;
}

/// User lookups consumed by the authentication guard
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// Flat-file store rooted at a data directory
pub struct JsonStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Open a store, creating the data directory when needed
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| StoreError::Io {
            path: data_dir.clone(),
            source: e,
        })?;

        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn collection_path<T: Record>(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", T::COLLECTION))
    }

    /// Load every record of a collection
    ///
    /// A missing file is an empty collection. A file that does not parse is
    /// reported instead of being treated as empty, so it is never overwritten.
    pub async fn load<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let path = self.collection_path::<T>();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt { path, source: e })
    }

    async fn save<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        let path = self.collection_path::<T>();
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(records)?;

        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| StoreError::Io {
                path: tmp_path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StoreError::Io { path, source: e })?;

        tracing::debug!(collection = T::COLLECTION, count = records.len(), "Collection saved");
        Ok(())
    }

    /// Point lookup by id
    pub async fn get<T: Record>(&self, id: i64) -> Result<Option<T>, StoreError> {
        self.find(|record: &T| record.id() == id).await
    }

    /// First record matching a predicate
    pub async fn find<T, F>(&self, predicate: F) -> Result<Option<T>, StoreError>
    where
        T: Record,
        F: Fn(&T) -> bool,
    {
        Ok(self.load::<T>().await?.into_iter().find(|r| predicate(r)))
    }

    /// All records matching a predicate
    pub async fn filter<T, F>(&self, predicate: F) -> Result<Vec<T>, StoreError>
    where
        T: Record,
        F: Fn(&T) -> bool,
    {
        Ok(self
            .load::<T>()
            .await?
            .into_iter()
            .filter(|r| predicate(r))
            .collect())
    }

    /// Load, mutate and save a collection as one step
    ///
    /// The collection is written back only when `f` returns `Ok`. Writers are
    /// serialized, so checks made inside `f` (uniqueness, existence) hold
    /// when the file is replaced.
    pub async fn modify<T, R, E, F>(&self, f: F) -> Result<R, E>
    where
        T: Record,
        E: From<StoreError>,
        F: FnOnce(&mut Vec<T>) -> Result<R, E>,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load::<T>().await?;
        let result = f(&mut records)?;
        self.save(&records).await?;
        Ok(result)
    }

    /// Append a record built from the next free id (max id + 1, starting at 1)
    pub async fn insert_with<T, F>(&self, build: F) -> Result<T, StoreError>
    where
        T: Record,
        F: FnOnce(i64) -> T,
    {
        self.modify(|records: &mut Vec<T>| {
            let record = build(next_id(records));
            records.push(record.clone());
            Ok(record)
        })
        .await
    }

    /// Apply `f` to the record with `id`; `None` when it does not exist
    pub async fn update<T, F>(&self, id: i64, f: F) -> Result<Option<T>, StoreError>
    where
        T: Record,
        F: FnOnce(&mut T),
    {
        self.modify(|records: &mut Vec<T>| {
            Ok(records.iter_mut().find(|r| r.id() == id).map(|record| {
                f(record);
                record.clone()
            }))
        })
        .await
    }
}

/// Next free id in a collection
pub fn next_id<T: Record>(records: &[T]) -> i64 {
    records.iter().map(Record::id).max().unwrap_or(0) + 1
}

#[async_trait]
impl UserDirectory for JsonStore {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.get::<User>(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find(|user: &User| user.email.eq_ignore_ascii_case(email))
            .await
    }
}
