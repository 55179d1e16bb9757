mod codec;
mod store;

use std::sync::Mutex;

use futures_core::future::BoxFuture;
use futures_util::{stream::BoxStream, FutureExt, TryStreamExt};

use crate::{
    bson::{doc, oid::ObjectId, Bson, Document},
    db::{memory::MemoryDatabase, Collection, Database, DocumentDatabase},
    error::{ErrorKind, Result},
    gridfs::GridFsBucket,
    options::GridFsBucketOptions,
};

pub(crate) fn bucket_with_chunk_size(chunk_size_bytes: u32) -> (GridFsBucket, Database) {
    let database = Database::new(MemoryDatabase::new());
    let options = GridFsBucketOptions::builder()
        .chunk_size_bytes(chunk_size_bytes)
        .build();
    let bucket = GridFsBucket::new(database.clone(), options);
    (bucket, database)
}

pub(crate) fn default_bucket() -> (GridFsBucket, Database) {
    let database = Database::new(MemoryDatabase::new());
    let bucket = GridFsBucket::new(database.clone(), None);
    (bucket, database)
}

pub(crate) async fn all_documents(database: &Database, collection: &str) -> Vec<Document> {
    let collection: Collection<Document> = database.collection(collection);
    collection
        .find(doc! {}, None)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap()
}

pub(crate) async fn chunk_documents(database: &Database, files_id: ObjectId) -> Vec<Document> {
    let collection: Collection<Document> = database.collection("fs.chunks");
    collection
        .find(doc! { "files_id": files_id }, doc! { "n": 1 })
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap()
}

pub(crate) fn chunk_bytes(document: &Document) -> Vec<u8> {
    match document.get("data") {
        Some(Bson::Binary(binary)) => binary.bytes.clone(),
        other => panic!("expected binary chunk payload, got {other:?}"),
    }
}

/// A backend that delegates to [`MemoryDatabase`] but only allows a fixed number of documents
/// to be written through `insert_many` before failing, reporting the prefix it did write.
/// The in-process analogue of a server-side fail point.
pub(crate) struct FlakyDatabase {
    inner: MemoryDatabase,
    insert_many_budget: Mutex<usize>,
}

impl FlakyDatabase {
    pub(crate) fn with_insert_many_budget(budget: usize) -> Self {
        Self {
            inner: MemoryDatabase::new(),
            insert_many_budget: Mutex::new(budget),
        }
    }
}

impl DocumentDatabase for FlakyDatabase {
    fn insert_one<'a>(
        &'a self,
        collection: &'a str,
        document: Document,
    ) -> BoxFuture<'a, Result<Bson>> {
        self.inner.insert_one(collection, document)
    }

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let attempted_count = documents.len();
            let allowed = {
                let mut budget = self.insert_many_budget.lock().unwrap();
                let take = (*budget).min(attempted_count);
                *budget -= take;
                take
            };
            if allowed < attempted_count {
                let prefix: Vec<Document> = documents.into_iter().take(allowed).collect();
                self.inner.insert_many(collection, prefix).await?;
                return Err(ErrorKind::PartialInsert {
                    inserted_count: allowed,
                    attempted_count,
                    message: "write budget exhausted".to_string(),
                }
                .into());
            }
            self.inner.insert_many(collection, documents).await
        }
        .boxed()
    }

    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        self.inner.find_one(collection, filter)
    }

    fn find<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        sort: Option<Document>,
    ) -> BoxFuture<'a, Result<BoxStream<'static, Result<Document>>>> {
        self.inner.find(collection, filter, sort)
    }

    fn update_one<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
        update: Document,
    ) -> BoxFuture<'a, Result<u64>> {
        self.inner.update_one(collection, filter, update)
    }

    fn delete_many<'a>(
        &'a self,
        collection: &'a str,
        filter: Document,
    ) -> BoxFuture<'a, Result<u64>> {
        self.inner.delete_many(collection, filter)
    }
}
