//! The document-database collaborator boundary.
//!
//! Buckets do not talk to a particular database; they talk to a [`DocumentDatabase`], an
//! object-safe trait exposing the handful of document operations the storage layer needs.
//! [`Database`] is a cheaply cloneable handle wrapping a backend, and [`Collection`] is a typed
//! view over one named collection that performs the serde/BSON mapping.

pub mod memory;

use std::{fmt, marker::PhantomData, sync::Arc};

use futures_core::future::BoxFuture;
use futures_util::{stream::BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    bson::{Bson, Document},
    error::{Error, Result},
};

/// The capabilities `gridstore` requires of a backing document database.
///
/// Implementations supply plain document CRUD; no wire format, authentication, or connection
/// lifecycle is modeled here. All methods operate on a named collection. Filters are BSON
/// documents interpreted as top-level equality criteria; sort specifications are single-key
/// documents mapping a field name to `1` (ascending) or `-1` (descending).
pub trait DocumentDatabase: Send + Sync {
    /// Inserts `document` into `collection`, returning the assigned `_id`.
    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Document,
    ) -> BoxFuture<'a, Result<Bson>>;

    /// Inserts `documents` into `collection` in order. If a later document fails after earlier
    /// ones were written, the error must be
    /// [`ErrorKind::PartialInsert`](crate::error::ErrorKind::PartialInsert) carrying the number
    /// successfully inserted.
    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, Result<()>>;

    /// Returns one document in `collection` matching `filter`, if any.
    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, Result<Option<Document>>>;

    /// Returns all documents in `collection` matching `filter`, ordered by `sort` when one is
    /// given. The returned stream is finite; each call re-issues the underlying query.
    fn find<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        sort: Option<Document>,
    ) -> BoxFuture<'a, Result<BoxStream<'static, Result<Document>>>>;

    /// Applies a partial `$set` update to the first document matching `filter`, returning the
    /// number of documents matched (`0` or `1`).
    fn update_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
    ) -> BoxFuture<'a, Result<u64>>;

    /// Deletes every document in `collection` matching `filter`, returning the deleted count.
    fn delete_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, Result<u64>>;
}

/// A handle to a document database backend.
///
/// `Database` uses `std::sync::Arc` internally, so it can be shared safely across threads and
/// cloned freely.
#[derive(Clone)]
pub struct Database {
    inner: Arc<dyn DocumentDatabase>,
}

impl Database {
    /// Wraps `backend` in a shareable handle.
    pub fn new<B: DocumentDatabase + 'static>(backend: B) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    /// Returns a typed handle to the collection with the given `name`.
    pub fn collection<T>(&self, name: impl Into<String>) -> Collection<T> {
        Collection {
            database: self.clone(),
            name: name.into(),
            phantom: PhantomData,
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// A typed view over one named collection.
///
/// Values are serialized to BSON documents on the way in and deserialized on the way out;
/// serde failures surface as
/// [`BsonSerialization`](crate::error::ErrorKind::BsonSerialization) /
/// [`BsonDeserialization`](crate::error::ErrorKind::BsonDeserialization) errors.
pub struct Collection<T> {
    database: Database,
    name: String,
    phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            name: self.name.clone(),
            phantom: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// The name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serializes `value` and inserts it, returning the assigned `_id`.
    pub async fn insert_one(&self, value: &T) -> Result<Bson> {
        let document = crate::bson::to_document(value)?;
        self.database.inner.insert_one(&self.name, document).await
    }

    /// Serializes `values` and inserts them in order.
    pub async fn insert_many(&self, values: &[T]) -> Result<()> {
        let documents = values
            .iter()
            .map(crate::bson::to_document)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.database.inner.insert_many(&self.name, documents).await
    }

    /// Returns one value matching `filter`, if any.
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        match self.database.inner.find_one(&self.name, filter).await? {
            Some(document) => Ok(Some(crate::bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Returns all values matching `filter`, ordered by `sort` when one is given.
    pub async fn find(
        &self,
        filter: Document,
        sort: impl Into<Option<Document>>,
    ) -> Result<BoxStream<'static, Result<T>>>
    where
        T: 'static,
    {
        let documents = self
            .database
            .inner
            .find(&self.name, filter, sort.into())
            .await?;
        Ok(documents
            .map(|result| {
                result.and_then(|document| {
                    crate::bson::from_document(document).map_err(Error::from)
                })
            })
            .boxed())
    }

    /// Applies a partial `$set` update to the first value matching `filter`, returning the
    /// matched count.
    pub async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        self.database
            .inner
            .update_one(&self.name, filter, update)
            .await
    }

    /// Deletes every value matching `filter`, returning the deleted count.
    pub async fn delete_many(&self, filter: Document) -> Result<u64> {
        self.database.inner.delete_many(&self.name, filter).await
    }
}
