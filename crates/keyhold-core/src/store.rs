//! Document store over a key-value [`StorageBackend`].
//!
//! Each [`Document`] type owns a collection stored under the key prefix
//! `<collection>/`. Values are JSON. Queries are plain predicates evaluated
//! over a prefix scan; [`FindOptions`] adds sorting and pagination.
//!
//! Atomicity is per document. `insert_many`, `delete_many` and `update_many`
//! write one key at a time, so a failure part-way leaves the earlier writes
//! in place. Callers that chain several calls (rollback in particular) get no
//! transaction around them.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use keyhold_storage::StorageBackend;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Document;

/// Sort and pagination applied to a [`Collection::find_with`] query.
pub struct FindOptions<T> {
    sort: Option<Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>>,
    skip: usize,
    limit: Option<usize>,
}

impl<T> Default for FindOptions<T> {
    fn default() -> Self {
        Self {
            sort: None,
            skip: 0,
            limit: None,
        }
    }
}

impl<T> fmt::Debug for FindOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindOptions")
            .field("sorted", &self.sort.is_some())
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<T> FindOptions<T> {
    /// Sort results with the given comparator before paginating.
    #[must_use]
    pub fn sort_by(mut self, cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        self.sort = Some(Box::new(cmp));
        self
    }

    /// Skip the first `n` matches.
    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Return at most `n` matches. `None` returns everything.
    #[must_use]
    pub fn limit(mut self, n: Option<usize>) -> Self {
        self.limit = n;
        self
    }
}

/// Handle to the shared storage backend; hands out typed collections.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn StorageBackend>,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Typed access to the collection of `T`.
    #[must_use]
    pub fn collection<T: Document>(&self) -> Collection<T> {
        Collection {
            backend: Arc::clone(&self.backend),
            _marker: PhantomData,
        }
    }
}

/// Typed access to one collection.
pub struct Collection<T> {
    backend: Arc<dyn StorageBackend>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Collection<T> {
    fn key(id: Uuid) -> String {
        format!("{}/{id}", T::COLLECTION)
    }

    fn prefix() -> String {
        format!("{}/", T::COLLECTION)
    }

    fn encode(doc: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(doc).map_err(|e| StoreError::Encode {
            collection: T::COLLECTION,
            reason: e.to_string(),
        })
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
            collection: T::COLLECTION,
            key: key.to_owned(),
            reason: e.to_string(),
        })
    }

    async fn all(&self) -> Result<Vec<T>, StoreError> {
        let entries = self.backend.scan(&Self::prefix()).await?;
        entries
            .iter()
            .map(|(key, bytes)| Self::decode(key, bytes))
            .collect()
    }

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if a document with the same id
    /// exists, or a storage/encoding error.
    pub async fn insert_one(&self, doc: &T) -> Result<(), StoreError> {
        let key = Self::key(doc.id());
        if self.backend.exists(&key).await? {
            return Err(StoreError::Duplicate {
                collection: T::COLLECTION,
                id: doc.id(),
            });
        }
        self.backend.put(&key, &Self::encode(doc)?).await?;
        Ok(())
    }

    /// Insert documents one after another, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// As [`insert_one`](Self::insert_one); documents before the failing one
    /// stay inserted.
    pub async fn insert_many(&self, docs: &[T]) -> Result<(), StoreError> {
        for doc in docs {
            self.insert_one(doc).await?;
        }
        Ok(())
    }

    /// Write a document, replacing any existing one with the same id.
    ///
    /// # Errors
    ///
    /// Returns a storage or encoding error.
    pub async fn replace_one(&self, doc: &T) -> Result<(), StoreError> {
        self.backend
            .put(&Self::key(doc.id()), &Self::encode(doc)?)
            .await?;
        Ok(())
    }

    /// Fetch a document by id.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let key = Self::key(id);
        match self.backend.get(&key).await? {
            Some(bytes) => Ok(Some(Self::decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch the documents with the given ids, in the order given. Missing
    /// ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<T>, StoreError> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.find_by_id(*id).await? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// All documents matching `filter`, in id order.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn find(&self, filter: impl Fn(&T) -> bool) -> Result<Vec<T>, StoreError> {
        self.find_with(filter, FindOptions::default()).await
    }

    /// Documents matching `filter`, sorted and paginated per `options`.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn find_with(
        &self,
        filter: impl Fn(&T) -> bool,
        options: FindOptions<T>,
    ) -> Result<Vec<T>, StoreError> {
        let mut docs: Vec<T> = self.all().await?.into_iter().filter(|d| filter(d)).collect();
        if let Some(cmp) = &options.sort {
            docs.sort_by(|a, b| cmp(a, b));
        }
        let page = docs.into_iter().skip(options.skip);
        Ok(match options.limit {
            Some(n) => page.take(n).collect(),
            None => page.collect(),
        })
    }

    /// The first document matching `filter` under the ordering `cmp`.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn find_one_sorted(
        &self,
        filter: impl Fn(&T) -> bool,
        cmp: impl Fn(&T, &T) -> Ordering,
    ) -> Result<Option<T>, StoreError> {
        let docs = self.find(filter).await?;
        Ok(docs.into_iter().min_by(|a, b| cmp(a, b)))
    }

    /// The first document matching `filter`, in id order.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn find_one(&self, filter: impl Fn(&T) -> bool) -> Result<Option<T>, StoreError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    /// Number of documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn count(&self, filter: impl Fn(&T) -> bool) -> Result<usize, StoreError> {
        Ok(self.all().await?.iter().filter(|d| filter(d)).count())
    }

    /// Delete every document matching `filter`. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error; earlier deletions stay applied.
    pub async fn delete_many(&self, filter: impl Fn(&T) -> bool) -> Result<usize, StoreError> {
        let doomed = self.find(filter).await?;
        for doc in &doomed {
            self.backend.delete(&Self::key(doc.id())).await?;
        }
        Ok(doomed.len())
    }

    /// Delete the first document matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage or decoding error.
    pub async fn delete_one(&self, filter: impl Fn(&T) -> bool) -> Result<Option<T>, StoreError> {
        let Some(doc) = self.find_one(filter).await? else {
            return Ok(None);
        };
        self.backend.delete(&Self::key(doc.id())).await?;
        Ok(Some(doc))
    }

    /// Apply `update` to every document matching `filter` and write it back.
    /// Returns how many were updated.
    ///
    /// # Errors
    ///
    /// Returns a storage or (de)serialisation error; earlier updates stay
    /// applied.
    pub async fn update_many(
        &self,
        filter: impl Fn(&T) -> bool,
        update: impl Fn(&mut T),
    ) -> Result<usize, StoreError> {
        let mut docs = self.find(filter).await?;
        for doc in &mut docs {
            update(doc);
            self.replace_one(doc).await?;
        }
        Ok(docs.len())
    }
}
