//! The persistence adapter pairing a bucket's files and chunks collections.

use futures_util::{stream::BoxStream, TryStreamExt};

use crate::{
    bson::{doc, oid::ObjectId, Document},
    checked::Checked,
    db::{Collection, Database},
    error::{Error, ErrorKind, GridFsErrorKind, GridFsFileIdentifier, Result},
    gridfs::{Chunk, FilesCollectionDocument},
};

/// Stores and loads file metadata records and chunk records for one bucket.
///
/// Failures from the backing database are surfaced unchanged; no retries happen at this
/// layer. The one translation performed here is mapping a partial bulk insert to
/// [`GridFsErrorKind::PartialChunkWrite`] so callers can abandon the file.
#[derive(Clone, Debug)]
pub(crate) struct ChunkStore {
    files: Collection<FilesCollectionDocument>,
    chunks: Collection<Chunk>,
}

impl ChunkStore {
    pub(crate) fn new(database: &Database, bucket_name: &str) -> Self {
        Self {
            files: database.collection(format!("{bucket_name}.files")),
            chunks: database.collection(format!("{bucket_name}.chunks")),
        }
    }

    pub(crate) async fn insert_file(&self, file: &FilesCollectionDocument) -> Result<()> {
        self.files.insert_one(file).await?;
        Ok(())
    }

    /// Finalizes the `length` and `md5` fields of the file with the given `id`.
    pub(crate) async fn update_file_length(
        &self,
        id: ObjectId,
        length: u64,
        md5: Option<String>,
    ) -> Result<()> {
        let length: i64 = Checked::new(length).try_into()?;
        let mut set = doc! { "length": length };
        if let Some(md5) = md5 {
            set.insert("md5", md5);
        }
        let matched = self
            .files
            .update_one(doc! { "_id": id }, doc! { "$set": set })
            .await?;
        if matched == 0 {
            return Err(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                identifier: GridFsFileIdentifier::Id(id),
            })
            .into());
        }
        Ok(())
    }

    pub(crate) async fn find_file_by_id(
        &self,
        id: ObjectId,
    ) -> Result<Option<FilesCollectionDocument>> {
        self.files.find_one(doc! { "_id": id }).await
    }

    /// The most recent upload wins when several files share a name.
    pub(crate) async fn find_file_by_name(
        &self,
        filename: &str,
    ) -> Result<Option<FilesCollectionDocument>> {
        let mut files = self
            .files
            .find(doc! { "filename": filename }, doc! { "uploadDate": -1 })
            .await?;
        files.try_next().await
    }

    /// Each call re-issues the underlying query.
    pub(crate) async fn list_files(
        &self,
        filter: Document,
        sort: Document,
    ) -> Result<BoxStream<'static, Result<FilesCollectionDocument>>> {
        self.files.find(filter, sort).await
    }

    pub(crate) async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        match self.chunks.insert_many(chunks).await {
            Ok(()) => Ok(()),
            Err(error) => {
                if let ErrorKind::PartialInsert { inserted_count, .. } = *error.kind {
                    let chunks_written = Checked::<u32>::try_from(inserted_count)?.get()?;
                    return Err(Error::from(ErrorKind::GridFs(
                        GridFsErrorKind::PartialChunkWrite { chunks_written },
                    ))
                    .with_source(error));
                }
                Err(error)
            }
        }
    }

    pub(crate) async fn chunk_at(&self, files_id: ObjectId, n: u32) -> Result<Option<Chunk>> {
        let n: i32 = Checked::new(n).try_into()?;
        self.chunks
            .find_one(doc! { "files_id": files_id, "n": n })
            .await
    }

    pub(crate) async fn load_chunks_ordered(
        &self,
        files_id: ObjectId,
    ) -> Result<BoxStream<'static, Result<Chunk>>> {
        self.chunks
            .find(doc! { "files_id": files_id }, doc! { "n": 1 })
            .await
    }

    pub(crate) async fn delete_chunks(&self, files_id: ObjectId) -> Result<u64> {
        self.chunks.delete_many(doc! { "files_id": files_id }).await
    }

    pub(crate) async fn delete_file(&self, id: ObjectId) -> Result<u64> {
        self.files.delete_many(doc! { "_id": id }).await
    }

    pub(crate) async fn rename_file(&self, id: ObjectId, new_filename: &str) -> Result<u64> {
        self.files
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "filename": new_filename } },
            )
            .await
    }

    /// Removes every file and chunk in the bucket.
    pub(crate) async fn drop_bucket(&self) -> Result<()> {
        self.files.delete_many(doc! {}).await?;
        self.chunks.delete_many(doc! {}).await?;
        Ok(())
    }
}
