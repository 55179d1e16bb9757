//! Bucket-level operations spanning many files: create/open, list, existence checks,
//! deletion, renaming, and copying.

use futures_util::{stream::BoxStream, StreamExt, TryStreamExt};

use crate::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    checked::Checked,
    error::{Error, ErrorKind, GridFsErrorKind, GridFsFileIdentifier, Result},
    gridfs::{
        codec,
        options::{FileAccess, FileMode, GridFsCreateOptions, GridFsFindOptions},
        Chunk,
        FilesCollectionDocument,
        GridFsBucket,
        GridFsStream,
        DEFAULT_CONTENT_TYPE,
    },
};

impl GridFsBucket {
    /// Opens a [`GridFsStream`] for the given `filename`.
    ///
    /// With the default [`FileMode::Create`], existing files of the same name are superseded:
    /// their metadata records and chunks are deleted before the new file's metadata record is
    /// inserted. [`FileMode::CreateNew`] instead fails with
    /// [`GridFsErrorKind::FileExists`] when the name is taken, and [`FileMode::Open`] opens
    /// the most recent existing file for reading.
    ///
    /// The new file's metadata record is inserted immediately; its `length` and `md5` are
    /// finalized when the returned stream is closed. If writing fails partway, callers should
    /// clean up with [`abort`](GridFsStream::abort) or [`delete`](GridFsBucket::delete).
    pub async fn create(
        &self,
        filename: impl AsRef<str>,
        options: impl Into<Option<GridFsCreateOptions>>,
    ) -> Result<GridFsStream> {
        let options = options.into().unwrap_or_default();
        let mode = options.mode.unwrap_or_default();
        let access = options.access.unwrap_or_default();
        let filename = filename.as_ref();

        let file = match mode {
            FileMode::Open => {
                if access.can_write() {
                    return Err(Error::invalid_operation(
                        "stored files are immutable and can only be opened for reading",
                    ));
                }
                return self.open(filename).await;
            }
            FileMode::CreateNew => {
                if self.exists_by_name(filename).await? {
                    return Err(ErrorKind::GridFs(GridFsErrorKind::FileExists {
                        filename: filename.to_string(),
                    })
                    .into());
                }
                self.new_file_record(filename, &options)
            }
            FileMode::Create => {
                self.delete_by_query(doc! { "filename": filename }).await?;
                self.new_file_record(filename, &options)
            }
        };

        let stream = GridFsStream::new(self.store().clone(), file, access)?;
        self.store().insert_file(stream.file()).await?;
        Ok(stream)
    }

    fn new_file_record(
        &self,
        filename: &str,
        options: &GridFsCreateOptions,
    ) -> FilesCollectionDocument {
        FilesCollectionDocument {
            id: ObjectId::new(),
            length: 0,
            chunk_size: options
                .chunk_size_bytes
                .unwrap_or_else(|| self.chunk_size_bytes()),
            upload_date: DateTime::now(),
            filename: filename.to_string(),
            content_type: options
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            md5: None,
            metadata: options.metadata.clone(),
        }
    }

    /// Opens the most recent revision of `filename` for reading.
    pub async fn open(&self, filename: impl AsRef<str>) -> Result<GridFsStream> {
        let filename = filename.as_ref();
        let file = self
            .store()
            .find_file_by_name(filename)
            .await?
            .ok_or_else(|| {
                Error::from(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                    identifier: GridFsFileIdentifier::Filename(filename.to_string()),
                }))
            })?;
        GridFsStream::new(self.store().clone(), file, FileAccess::Read)
    }

    /// Opens the file with the given `id` for reading.
    pub async fn open_by_id(&self, id: ObjectId) -> Result<GridFsStream> {
        let file = self
            .store()
            .find_file_by_id(id)
            .await?
            .ok_or_else(|| not_found_by_id(id))?;
        GridFsStream::new(self.store().clone(), file, FileAccess::Read)
    }

    /// Returns the metadata records matching `filter`, ordered by filename ascending unless
    /// the options specify otherwise. The stream is finite; each call re-issues the query.
    pub async fn find(
        &self,
        filter: Document,
        options: impl Into<Option<GridFsFindOptions>>,
    ) -> Result<BoxStream<'static, Result<FilesCollectionDocument>>> {
        let options = options.into().unwrap_or_default();
        let sort = options.sort.unwrap_or_else(|| doc! { "filename": 1 });
        let files = self.store().list_files(filter, sort).await?;
        Ok(match options.limit {
            Some(limit) => files.take(limit).boxed(),
            None => files,
        })
    }

    /// Whether a file named `filename` exists in the bucket.
    pub async fn exists_by_name(&self, filename: impl AsRef<str>) -> Result<bool> {
        Ok(self
            .store()
            .find_file_by_name(filename.as_ref())
            .await?
            .is_some())
    }

    /// Whether a file with the given `id` exists in the bucket.
    pub async fn exists_by_id(&self, id: ObjectId) -> Result<bool> {
        Ok(self.store().find_file_by_id(id).await?.is_some())
    }

    /// Deletes the file with the given `id` and all of its chunks. Fails with
    /// [`GridFsErrorKind::FileNotFound`] if the `id` does not match any file.
    pub async fn delete(&self, id: ObjectId) -> Result<()> {
        let deleted = self.store().delete_file(id).await?;
        // Delete chunks regardless of whether a metadata record was found. This also removes
        // any orphaned chunks left behind by an interrupted writer.
        self.store().delete_chunks(id).await?;
        if deleted == 0 {
            return Err(not_found_by_id(id));
        }
        Ok(())
    }

    /// Deletes every file named `filename`, chunks included. Fails with
    /// [`GridFsErrorKind::FileNotFound`] if no file matched.
    pub async fn delete_by_name(&self, filename: impl AsRef<str>) -> Result<()> {
        let filename = filename.as_ref();
        let deleted = self
            .delete_by_query(doc! { "filename": filename })
            .await?;
        if deleted == 0 {
            return Err(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                identifier: GridFsFileIdentifier::Filename(filename.to_string()),
            })
            .into());
        }
        Ok(())
    }

    /// Resolves `filter` against the files collection and deletes each matching file and its
    /// chunks, returning how many files were deleted. Matching nothing is not an error.
    pub async fn delete_by_query(&self, filter: Document) -> Result<u64> {
        let ids = self.resolve_ids(filter).await?;
        for &id in &ids {
            self.store().delete_file(id).await?;
            self.store().delete_chunks(id).await?;
        }
        Checked::<u64>::try_from(ids.len())?.get()
    }

    async fn resolve_ids(&self, filter: Document) -> Result<Vec<ObjectId>> {
        let files: Vec<FilesCollectionDocument> = self
            .store()
            .list_files(filter, doc! { "filename": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(files.into_iter().map(|file| file.id).collect())
    }

    /// Renames the file with the given `id` to `new_filename`. Chunks are untouched; they
    /// reference the file by id. Fails with [`GridFsErrorKind::FileNotFound`] if the `id`
    /// does not match any file.
    pub async fn rename(&self, id: ObjectId, new_filename: impl AsRef<str>) -> Result<()> {
        let matched = self.store().rename_file(id, new_filename.as_ref()).await?;
        if matched == 0 {
            return Err(not_found_by_id(id));
        }
        Ok(())
    }

    /// Renames every file named `filename` to `new_filename`. Fails with
    /// [`GridFsErrorKind::FileNotFound`] if no file matched.
    pub async fn rename_by_name(
        &self,
        filename: impl AsRef<str>,
        new_filename: impl AsRef<str>,
    ) -> Result<()> {
        let filename = filename.as_ref();
        let ids = self.resolve_ids(doc! { "filename": filename }).await?;
        if ids.is_empty() {
            return Err(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                identifier: GridFsFileIdentifier::Filename(filename.to_string()),
            })
            .into());
        }
        for &id in &ids {
            self.store().rename_file(id, new_filename.as_ref()).await?;
        }
        Ok(())
    }

    /// Copies the most recent revision of `src_filename` to a new file named
    /// `dest_filename`, returning the new file's id.
    ///
    /// The copy is driven client-side: the source metadata record is duplicated under a fresh
    /// id and the destination filename, then each source chunk is re-inserted under a fresh
    /// chunk id and the new file id, in order. Fails with
    /// [`GridFsErrorKind::FileNotFound`] if the source does not exist.
    pub async fn copy(
        &self,
        src_filename: impl AsRef<str>,
        dest_filename: impl AsRef<str>,
    ) -> Result<ObjectId> {
        let src_filename = src_filename.as_ref();
        let source = self
            .store()
            .find_file_by_name(src_filename)
            .await?
            .ok_or_else(|| {
                Error::from(ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
                    identifier: GridFsFileIdentifier::Filename(src_filename.to_string()),
                }))
            })?;

        if source.chunk_size == 0 {
            return Err(Error::invalid_argument(
                "chunk size must be a positive number of bytes",
            ));
        }

        let mut dest = source.clone();
        dest.id = ObjectId::new();
        dest.filename = dest_filename.as_ref().to_string();
        self.store().insert_file(&dest).await?;

        let mut chunks = self.store().load_chunks_ordered(source.id).await?;
        let mut next_n = 0u32;
        while let Some(chunk) = chunks.try_next().await? {
            if chunk.n < next_n {
                return Err(
                    ErrorKind::GridFs(GridFsErrorKind::DuplicateChunk { n: chunk.n }).into(),
                );
            }
            if chunk.n > next_n {
                return Err(
                    ErrorKind::GridFs(GridFsErrorKind::MissingChunk { n: next_n }).into(),
                );
            }
            let copy = Chunk {
                id: ObjectId::new(),
                files_id: dest.id,
                n: chunk.n,
                data: chunk.data,
            };
            self.store().insert_chunks(std::slice::from_ref(&copy)).await?;
            next_n = (Checked::new(next_n) + 1u32).get()?;
        }
        if u64::from(next_n) != source.n() {
            return Err(ErrorKind::GridFs(GridFsErrorKind::WrongNumberOfChunks {
                actual_number: next_n,
                expected_number: Checked::new(source.n()).try_into()?,
            })
            .into());
        }

        Ok(dest.id)
    }

    /// A non-throwing [`copy`](GridFsBucket::copy): failures (including a missing source) are
    /// logged and swallowed, and `None` is returned.
    pub async fn copy_best_effort(
        &self,
        src_filename: impl AsRef<str>,
        dest_filename: impl AsRef<str>,
    ) -> Option<ObjectId> {
        let src_filename = src_filename.as_ref();
        let dest_filename = dest_filename.as_ref();
        match self.copy(src_filename, dest_filename).await {
            Ok(id) => Some(id),
            Err(error) => {
                tracing::warn!(
                    src = src_filename,
                    dest = dest_filename,
                    error = %error,
                    "best-effort copy failed"
                );
                None
            }
        }
    }

    /// Reads the entire contents of the file with the given `id` into memory.
    ///
    /// For incremental access, open a stream with
    /// [`open_by_id`](GridFsBucket::open_by_id) instead.
    pub async fn download(&self, id: ObjectId) -> Result<Vec<u8>> {
        let file = self
            .store()
            .find_file_by_id(id)
            .await?
            .ok_or_else(|| not_found_by_id(id))?;
        if file.chunk_size == 0 {
            return Err(Error::invalid_argument(
                "chunk size must be a positive number of bytes",
            ));
        }

        let chunks: Vec<Chunk> = self
            .store()
            .load_chunks_ordered(id)
            .await?
            .try_collect()
            .await?;

        let expected_number: u32 = Checked::new(file.n()).try_into()?;
        let actual_number = Checked::<u32>::try_from(chunks.len())?.get()?;
        if actual_number != expected_number {
            return Err(ErrorKind::GridFs(GridFsErrorKind::WrongNumberOfChunks {
                actual_number,
                expected_number,
            })
            .into());
        }
        for chunk in &chunks {
            let expected = file.expected_chunk_length(u64::from(chunk.n))?;
            let actual = Checked::<u64>::try_from(chunk.data.len())?.get()?;
            if actual != expected {
                return Err(ErrorKind::GridFs(GridFsErrorKind::WrongSizeChunk {
                    actual_size: chunk.data.len(),
                    expected_size: Checked::new(expected).try_into()?,
                    n: chunk.n,
                })
                .into());
            }
        }

        codec::reassemble(0, chunks.into_iter().map(|chunk| (chunk.n, chunk.data)))
    }

    /// Removes every file and chunk in the bucket.
    pub async fn drop(&self) -> Result<()> {
        self.store().drop_bucket().await
    }
}

fn not_found_by_id(id: ObjectId) -> Error {
    ErrorKind::GridFs(GridFsErrorKind::FileNotFound {
        identifier: GridFsFileIdentifier::Id(id),
    })
    .into()
}
