use std::{io::SeekFrom, mem};

use md5::{Digest, Md5};

use crate::{
    bson::oid::ObjectId,
    checked::Checked,
    error::{Error, ErrorKind, GridFsErrorKind, Result},
    gridfs::{codec, options::FileAccess, store::ChunkStore, Chunk, FilesCollectionDocument},
};

/// A buffered, seekable byte stream bound to exactly one file in a bucket.
///
/// # Writing
/// Bytes passed to [`write`](GridFsStream::write) accumulate in an in-memory buffer; whenever
/// the buffer holds at least one full chunk, every full chunk is persisted in increasing index
/// order. A short trailing piece is held back until more data arrives to complete it or
/// [`close`](GridFsStream::close) writes it out as the file's final chunk and finalizes the
/// metadata record. Writes of any size are accepted; a single call may flush many chunks.
///
/// If a flush fails, the file may be left with missing chunk indices, so the stream is
/// poisoned: every subsequent write or close fails with
/// [`GridFsErrorKind::StorageWriteFailed`]. Callers should remove the incomplete file with
/// [`abort`](GridFsStream::abort) or [`GridFsBucket::delete`](crate::GridFsBucket::delete).
///
/// # Reading
/// [`seek`](GridFsStream::seek) positions the cursor and [`read`](GridFsStream::read) serves
/// bytes by point-fetching only the chunks covering the requested range; the whole file is
/// never loaded. Reading past the end of the file returns fewer bytes than requested and then
/// `0`, never an error. The read path trusts the stream's metadata record, whose `length` is
/// finalized by `close` — so a read/write stream can read back its own data after closing.
///
/// A stream instance is meant for a single logical owner; it performs no internal locking.
pub struct GridFsStream {
    store: ChunkStore,
    file: FilesCollectionDocument,
    access: FileAccess,
    state: State,
    buffer: Vec<u8>,
    next_n: u32,
    bytes_written: u64,
    position: u64,
    cached_chunk: Option<Chunk>,
    hasher: Md5,
}

enum State {
    Open,
    Closed,
    Poisoned,
}

impl std::fmt::Debug for GridFsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridFsStream")
            .field("file", &self.file)
            .field("access", &self.access)
            .field("next_n", &self.next_n)
            .field("bytes_written", &self.bytes_written)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl GridFsStream {
    pub(crate) fn new(
        store: ChunkStore,
        file: FilesCollectionDocument,
        access: FileAccess,
    ) -> Result<Self> {
        if file.chunk_size == 0 {
            return Err(Error::invalid_argument(
                "chunk size must be a positive number of bytes",
            ));
        }
        Ok(Self {
            store,
            file,
            access,
            state: State::Open,
            buffer: Vec::new(),
            next_n: 0,
            bytes_written: 0,
            position: 0,
            cached_chunk: None,
            hasher: Md5::new(),
        })
    }

    /// The unique identifier of the file this stream is bound to.
    pub fn id(&self) -> ObjectId {
        self.file.id
    }

    /// The metadata record this stream is bound to. The `length` and `md5` fields are
    /// finalized by [`close`](GridFsStream::close).
    pub fn file(&self) -> &FilesCollectionDocument {
        &self.file
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Closed => Err(ErrorKind::GridFs(GridFsErrorKind::StreamClosed).into()),
            State::Poisoned => {
                Err(ErrorKind::GridFs(GridFsErrorKind::StorageWriteFailed).into())
            }
        }
    }

    fn chunk_size_usize(&self) -> Result<usize> {
        Checked::new(self.file.chunk_size).try_into()
    }

    /// Appends `bytes` to the file.
    ///
    /// Nothing is persisted until a full chunk has accumulated; see the type-level docs for
    /// the flush discipline.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if !self.access.can_write() {
            return Err(Error::invalid_operation("stream is not open for writing"));
        }
        self.hasher.update(bytes);
        self.buffer.extend_from_slice(bytes);
        self.bytes_written =
            (Checked::new(self.bytes_written) + Checked::try_from(bytes.len())?).get()?;
        if self.buffer.len() >= self.chunk_size_usize()? {
            self.flush_full_chunks().await?;
        }
        Ok(())
    }

    // Persists every whole chunk in the buffer, retaining the remainder for the next flush.
    async fn flush_full_chunks(&mut self) -> Result<()> {
        let chunk_size = self.chunk_size_usize()?;
        let full_len = (Checked::new(self.buffer.len()) / chunk_size * chunk_size).get()?;
        if full_len == 0 {
            return Ok(());
        }
        let chunks = codec::split(&self.buffer[..full_len], self.file.chunk_size, self.next_n)?
            .into_iter()
            .map(|slice| Chunk {
                id: ObjectId::new(),
                files_id: self.file.id,
                n: slice.n,
                data: slice.bytes.to_vec(),
            })
            .collect::<Vec<_>>();
        self.persist(chunks).await?;
        self.buffer.drain(..full_len);
        Ok(())
    }

    async fn persist(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        let count = Checked::<u32>::try_from(chunks.len())?;
        match self.store.insert_chunks(&chunks).await {
            Ok(()) => {
                self.next_n = (Checked::new(self.next_n) + count).get()?;
                tracing::debug!(
                    files_id = %self.file.id,
                    chunks = chunks.len(),
                    next_n = self.next_n,
                    "flushed chunks"
                );
                Ok(())
            }
            Err(error) => {
                // The chunk range may be partially present; the file can no longer be
                // completed.
                self.state = State::Poisoned;
                Err(
                    Error::from(ErrorKind::GridFs(GridFsErrorKind::StorageWriteFailed))
                        .with_source(error),
                )
            }
        }
    }

    /// Flushes any remaining buffered bytes as the file's final chunk and finalizes the
    /// metadata record's `length` and `md5`.
    ///
    /// Closing an already-closed stream is a no-op. On a read-only stream, `close` is a state
    /// change only; the metadata record belongs to the stream that wrote it.
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            State::Closed => return Ok(()),
            State::Poisoned => {
                return Err(ErrorKind::GridFs(GridFsErrorKind::StorageWriteFailed).into())
            }
            State::Open => {}
        }
        if self.access.can_write() {
            let chunk_size = self.chunk_size_usize()?;
            self.flush_full_chunks().await?;
            if !self.buffer.is_empty() {
                debug_assert!(self.buffer.len() < chunk_size);
                let tail = mem::take(&mut self.buffer);
                let chunks = codec::split(&tail, self.file.chunk_size, self.next_n)?
                    .into_iter()
                    .map(|slice| Chunk {
                        id: ObjectId::new(),
                        files_id: self.file.id,
                        n: slice.n,
                        data: slice.bytes.to_vec(),
                    })
                    .collect::<Vec<_>>();
                self.persist(chunks).await?;
            }
            let md5 = hex::encode(mem::take(&mut self.hasher).finalize());
            self.store
                .update_file_length(self.file.id, self.bytes_written, Some(md5.clone()))
                .await?;
            self.file.length = self.bytes_written;
            self.file.md5 = Some(md5);
            tracing::debug!(files_id = %self.file.id, length = self.file.length, "finalized file");
        }
        self.state = State::Closed;
        Ok(())
    }

    /// Discards the file, deleting any chunks already persisted along with its metadata
    /// record. The stream cannot be used afterwards.
    ///
    /// Aborting is also the cleanup path for a poisoned stream. If the cleanup deletes fail,
    /// the error is [`GridFsErrorKind::AbortError`].
    pub async fn abort(&mut self) -> Result<()> {
        if matches!(self.state, State::Closed) {
            return Err(ErrorKind::GridFs(GridFsErrorKind::StreamClosed).into());
        }
        self.state = State::Closed;
        let delete_result = async {
            self.store.delete_chunks(self.file.id).await?;
            self.store.delete_file(self.file.id).await?;
            Ok(())
        }
        .await;
        match delete_result {
            Ok(()) => Ok(()),
            Err(delete_error) => {
                Err(ErrorKind::GridFs(GridFsErrorKind::AbortError { delete_error }).into())
            }
        }
    }

    /// Repositions the read cursor. No I/O is performed; seeking past the end of the file is
    /// permitted and causes the next read to return `0`.
    pub fn seek(&mut self, position: SeekFrom) -> Result<u64> {
        if !self.access.can_read() {
            return Err(Error::invalid_operation("stream is not open for reading"));
        }
        let target = match position {
            SeekFrom::Start(offset) => offset,
            SeekFrom::End(offset) => offset_position(self.file.length, offset)?,
            SeekFrom::Current(offset) => offset_position(self.position, offset)?,
        };
        self.position = target;
        Ok(target)
    }

    /// Reads up to `buf.len()` bytes from the current cursor position, returning how many
    /// bytes were read. A return of `0` indicates the end of the file.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.access.can_read() {
            return Err(Error::invalid_operation("stream is not open for reading"));
        }
        if matches!(self.state, State::Poisoned) {
            return Err(ErrorKind::GridFs(GridFsErrorKind::StorageWriteFailed).into());
        }
        let chunk_size = u64::from(self.file.chunk_size);
        let mut filled = 0usize;
        while filled < buf.len() && self.position < self.file.length {
            let n: u32 = (Checked::new(self.position) / chunk_size).try_into()?;
            let chunk = match self.cached_chunk.take() {
                Some(chunk) if chunk.n == n => chunk,
                _ => self.fetch_chunk(n).await?,
            };
            let offset: usize = (Checked::new(self.position) % chunk_size).try_into()?;
            let available = (Checked::new(chunk.data.len()) - offset).get()?;
            let wanted = (Checked::new(buf.len()) - filled).get()?;
            let count = available.min(wanted);
            let end = (Checked::new(offset) + count).get()?;
            let filled_end = (Checked::new(filled) + count).get()?;
            buf[filled..filled_end].copy_from_slice(&chunk.data[offset..end]);
            filled = filled_end;
            self.position =
                (Checked::new(self.position) + Checked::<u64>::try_from(count)?).get()?;
            self.cached_chunk = Some(chunk);
        }
        Ok(filled)
    }

    /// Reads from the current cursor position to the end of the file, appending to `buf` and
    /// returning how many bytes were read.
    pub async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let mut scratch = vec![0u8; self.chunk_size_usize()?];
        let mut total = 0usize;
        loop {
            let read = self.read(&mut scratch).await?;
            if read == 0 {
                break;
            }
            buf.extend_from_slice(&scratch[..read]);
            total = (Checked::new(total) + read).get()?;
        }
        Ok(total)
    }

    // Point lookup of one chunk, validated against the index and length the metadata record
    // implies.
    async fn fetch_chunk(&self, n: u32) -> Result<Chunk> {
        let chunk = self
            .store
            .chunk_at(self.file.id, n)
            .await?
            .ok_or_else(|| Error::from(ErrorKind::GridFs(GridFsErrorKind::MissingChunk { n })))?;
        let expected = self.file.expected_chunk_length(u64::from(n))?;
        let actual = Checked::<u64>::try_from(chunk.data.len())?.get()?;
        if actual != expected {
            return Err(ErrorKind::GridFs(GridFsErrorKind::WrongSizeChunk {
                actual_size: chunk.data.len(),
                expected_size: Checked::new(expected).try_into()?,
                n,
            })
            .into());
        }
        Ok(chunk)
    }
}

fn offset_position(base: u64, offset: i64) -> Result<u64> {
    if offset >= 0 {
        (Checked::new(base) + Checked::<u64>::try_from(offset)?).get()
    } else {
        base.checked_sub(offset.unsigned_abs()).ok_or_else(|| {
            Error::invalid_argument("cannot seek before the start of the stream")
        })
    }
}
