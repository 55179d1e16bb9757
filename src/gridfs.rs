//! GridFS-style buckets: chunked storage of arbitrary-length byte streams in a pair of
//! document collections.
//!
//! A bucket stores one metadata document per file in `<bucket>.files` and the file's contents
//! as ordered, fixed-size chunk documents in `<bucket>.chunks`. Files are written and read
//! through [`GridFsStream`], and bucket-level operations (list, delete, rename, copy) live on
//! [`GridFsBucket`].

mod bucket;
pub(crate) mod codec;
pub mod options;
pub(crate) mod store;
mod stream;

pub use stream::GridFsStream;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    bson::{
        oid::ObjectId,
        serde_helpers::{serialize_u32_as_i32, serialize_u64_as_i64},
        DateTime,
        Document,
    },
    checked::Checked,
    db::Database,
    error::Result,
    gridfs::{options::GridFsBucketOptions, store::ChunkStore},
};

pub(crate) const DEFAULT_BUCKET_NAME: &str = "fs";
pub(crate) const DEFAULT_CHUNK_SIZE_BYTES: u32 = 256 * 1024;
pub(crate) const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// A collection in which information about stored files is stored. There will be one files
/// collection document per stored file.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct FilesCollectionDocument {
    /// A unique identifier for this document, assigned when the file is created and immutable
    /// thereafter.
    #[serde(rename = "_id")]
    pub id: ObjectId,

    /// The length of this stored file, in bytes. Finalized by the owning stream when it is
    /// closed; until then the persisted value may lag the bytes already flushed.
    #[serde(serialize_with = "serialize_u64_as_i64")]
    pub length: u64,

    /// The size, in bytes, of each of this file's chunks, except possibly the last. Fixed at
    /// creation.
    #[serde(serialize_with = "serialize_u32_as_i32")]
    pub chunk_size: u32,

    /// The date and time this file was created.
    pub upload_date: DateTime,

    /// The name of this stored file; not required to be unique.
    pub filename: String,

    /// The MIME type of this stored file, for application use only.
    pub content_type: String,

    /// A hex MD5 digest of the file's contents, computed when the owning stream is closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    /// Any additional application data the user wishes to store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,
}

impl FilesCollectionDocument {
    /// Returns the total number of chunks expected to be in the file.
    pub(crate) fn n(&self) -> u64 {
        Self::n_from_vals(self.length, self.chunk_size)
    }

    pub(crate) fn n_from_vals(length: u64, chunk_size: u32) -> u64 {
        length.div_ceil(u64::from(chunk_size))
    }

    /// Returns the expected length of the chunk at index `n`.
    pub(crate) fn expected_chunk_length(&self, n: u64) -> Result<u64> {
        let chunk_size = u64::from(self.chunk_size);
        let last = (Checked::new(self.n()) - 1u64).get()?;
        if n == last {
            (Checked::new(self.length) - Checked::new(n) * chunk_size).get()
        } else {
            Ok(chunk_size)
        }
    }
}

/// A chunk of a stored file, contained in a bucket's chunks collection. Chunks are written in
/// batches by a stream's flushes and never mutated afterwards.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Chunk {
    /// A unique identifier for this chunk.
    #[serde(rename = "_id")]
    pub(crate) id: ObjectId,

    /// The id of the owning files collection document.
    pub(crate) files_id: ObjectId,

    /// The index number of this chunk, zero-based.
    #[serde(serialize_with = "serialize_u32_as_i32")]
    pub(crate) n: u32,

    /// A chunk of data from the stored file.
    #[serde(with = "serde_bytes")]
    pub(crate) data: Vec<u8>,
}

/// A named pair of files/chunks collections forming one logical storage namespace.
///
/// `GridFsBucket` uses `std::sync::Arc` internally, so it can be shared safely across threads
/// and cloned freely.
#[derive(Clone, Debug)]
pub struct GridFsBucket {
    inner: Arc<GridFsBucketInner>,
}

#[derive(Debug)]
struct GridFsBucketInner {
    bucket_name: String,
    chunk_size: u32,
    store: ChunkStore,
}

impl GridFsBucket {
    /// Creates a bucket over `database` with the given options.
    pub fn new(database: Database, options: impl Into<Option<GridFsBucketOptions>>) -> Self {
        let options = options.into().unwrap_or_default();
        let bucket_name = options
            .bucket_name
            .unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string());
        let chunk_size = options.chunk_size_bytes.unwrap_or(DEFAULT_CHUNK_SIZE_BYTES);
        let store = ChunkStore::new(&database, &bucket_name);
        Self {
            inner: Arc::new(GridFsBucketInner {
                bucket_name,
                chunk_size,
                store,
            }),
        }
    }

    /// The name of this bucket.
    pub fn bucket_name(&self) -> &str {
        &self.inner.bucket_name
    }

    /// The default chunk size, in bytes, for files created in this bucket.
    pub fn chunk_size_bytes(&self) -> u32 {
        self.inner.chunk_size
    }

    pub(crate) fn store(&self) -> &ChunkStore {
        &self.inner.store
    }
}
