//! A self-contained in-process [`DocumentDatabase`] used for embedded deployments and tests.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::Mutex,
};

use futures_core::future::BoxFuture;
use futures_util::{future, stream, stream::BoxStream, FutureExt, StreamExt};

use crate::{
    bson::{oid::ObjectId, Bson, Document},
    checked::Checked,
    db::DocumentDatabase,
    error::{Error, ErrorKind, Result},
};

/// An in-memory document database.
///
/// Collections are plain vectors of documents guarded by a mutex. Filters are interpreted as
/// top-level equality criteria (numeric values compare across BSON integer widths), sorts are
/// single-key, and updates support the `$set` operator — exactly the surface
/// [`DocumentDatabase`] requires. Documents inserted without an `_id` are assigned a fresh
/// [`ObjectId`]; duplicate `_id` values are rejected.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<R>(&self, name: &str, f: impl FnOnce(&mut Vec<Document>) -> R) -> R {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(collections.entry(name.to_string()).or_default())
    }

    fn insert_document(documents: &mut Vec<Document>, mut document: Document) -> Result<Bson> {
        let id = match document.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert("_id", id.clone());
                id
            }
        };
        if documents
            .iter()
            .any(|existing| existing.get("_id") == Some(&id))
        {
            return Err(Error::backend(format!("duplicate key: _id {id}")));
        }
        documents.push(document);
        Ok(id)
    }

    fn matches(document: &Document, filter: &Document) -> bool {
        filter
            .iter()
            .all(|(key, expected)| match document.get(key) {
                Some(actual) => values_equal(actual, expected),
                None => false,
            })
    }

    fn sort_documents(documents: &mut [Document], sort: &Document) -> Result<()> {
        let (key, direction) = sort
            .iter()
            .next()
            .ok_or_else(|| Error::invalid_argument("empty sort specification"))?;
        let ascending = match int_value(direction) {
            Some(1) => true,
            Some(-1) => false,
            _ => {
                return Err(Error::invalid_argument(format!(
                    "unsupported sort direction for key {key}: {direction}"
                )))
            }
        };
        documents.sort_by(|a, b| {
            let ordering = compare_values(a.get(key), b.get(key));
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        Ok(())
    }
}

impl DocumentDatabase for MemoryDatabase {
    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Document,
    ) -> BoxFuture<'a, Result<Bson>> {
        let result =
            self.with_collection(collection, |documents| Self::insert_document(documents, document));
        future::ready(result).boxed()
    }

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, Result<()>> {
        let attempted_count = documents.len();
        let result = self.with_collection(collection, |existing| {
            for (inserted_count, document) in documents.into_iter().enumerate() {
                if let Err(error) = Self::insert_document(existing, document) {
                    return Err(ErrorKind::PartialInsert {
                        inserted_count,
                        attempted_count,
                        message: error.to_string(),
                    }
                    .into());
                }
            }
            Ok(())
        });
        future::ready(result).boxed()
    }

    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        let result = self.with_collection(collection, |documents| {
            Ok(documents
                .iter()
                .find(|document| Self::matches(document, &filter))
                .cloned())
        });
        future::ready(result).boxed()
    }

    fn find<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        sort: Option<Document>,
    ) -> BoxFuture<'a, Result<BoxStream<'static, Result<Document>>>> {
        let result = self.with_collection(collection, |documents| {
            let mut matching: Vec<Document> = documents
                .iter()
                .filter(|document| Self::matches(document, &filter))
                .cloned()
                .collect();
            if let Some(ref sort) = sort {
                Self::sort_documents(&mut matching, sort)?;
            }
            Ok(stream::iter(matching.into_iter().map(Ok)).boxed())
        });
        future::ready(result).boxed()
    }

    fn update_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
    ) -> BoxFuture<'a, Result<u64>> {
        let result = self.with_collection(collection, |documents| {
            let set = match update.get_document("$set") {
                Ok(set) => set.clone(),
                Err(_) => {
                    return Err(Error::invalid_argument(
                        "only $set updates are supported",
                    ))
                }
            };
            for document in documents.iter_mut() {
                if Self::matches(document, &filter) {
                    for (key, value) in set.iter() {
                        document.insert(key, value.clone());
                    }
                    return Ok(1);
                }
            }
            Ok(0)
        });
        future::ready(result).boxed()
    }

    fn delete_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, Result<u64>> {
        let result = self.with_collection(collection, |documents| {
            let before = documents.len();
            documents.retain(|document| !Self::matches(document, &filter));
            Checked::<u64>::try_from(before - documents.len())?.get()
        });
        future::ready(result).boxed()
    }
}

// BSON stores small integers as Int32 and larger ones as Int64; equality and ordering treat
// the two widths as one numeric domain.
fn int_value(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (int_value(a), int_value(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            if let (Some(a), Some(b)) = (int_value(a), int_value(b)) {
                return a.cmp(&b);
            }
            match (a, b) {
                (Bson::String(a), Bson::String(b)) => a.cmp(b),
                (Bson::ObjectId(a), Bson::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
                (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
                _ => Ordering::Equal,
            }
        }
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}
