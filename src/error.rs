//! Contains the `Error` and `Result` types that `gridstore` uses.

use thiserror::Error;

use crate::bson::oid::ObjectId;

/// The result type for all methods that can return an error in the `gridstore` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `gridstore` crate. The inner [`ErrorKind`] is wrapped in a
/// `Box` to keep the error cheap to move and clone.
#[derive(Clone, Debug, Error)]
#[error("Kind: {kind}, source: {source:?}")]
#[non_exhaustive]
pub struct Error {
    /// The type of error that occurred.
    pub kind: Box<ErrorKind>,

    #[source]
    pub(crate) source: Option<Box<Error>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            source: None,
        }
    }

    /// Creates an `InvalidArgument` error with the provided message.
    pub(crate) fn invalid_argument(message: impl AsRef<str>) -> Self {
        ErrorKind::InvalidArgument {
            message: message.as_ref().to_string(),
        }
        .into()
    }

    /// Creates an `InvalidOperation` error with the provided message.
    pub(crate) fn invalid_operation(message: impl AsRef<str>) -> Self {
        ErrorKind::InvalidOperation {
            message: message.as_ref().to_string(),
        }
        .into()
    }

    /// Creates a `Backend` error with the provided message.
    pub(crate) fn backend(message: impl AsRef<str>) -> Self {
        ErrorKind::Backend {
            message: message.as_ref().to_string(),
        }
        .into()
    }

    pub(crate) fn with_source(mut self, source: Error) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether this error indicates that a file was not found in the bucket.
    pub fn is_file_not_found(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::GridFs(GridFsErrorKind::FileNotFound { .. })
        )
    }

    /// Whether this error indicates that a file with the requested name already exists.
    pub fn is_file_exists(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::GridFs(GridFsErrorKind::FileExists { .. })
        )
    }
}

impl<E> From<E> for Error
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        Error::new(err.into())
    }
}

impl From<crate::bson::ser::Error> for ErrorKind {
    fn from(err: crate::bson::ser::Error) -> Self {
        Self::BsonSerialization {
            message: err.to_string(),
        }
    }
}

impl From<crate::bson::de::Error> for ErrorKind {
    fn from(err: crate::bson::de::Error) -> Self {
        Self::BsonDeserialization {
            message: err.to_string(),
        }
    }
}

impl From<GridFsErrorKind> for ErrorKind {
    fn from(err: GridFsErrorKind) -> Self {
        Self::GridFs(err)
    }
}

/// The types of errors that can occur.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An invalid argument was provided.
    #[error("An invalid argument was provided: {message}")]
    #[non_exhaustive]
    InvalidArgument { message: String },

    /// An operation was attempted that the stream's access mode or state does not permit.
    #[error("The operation is not permitted: {message}")]
    #[non_exhaustive]
    InvalidOperation { message: String },

    /// The backing document database reported a failure.
    #[error("The document database reported a failure: {message}")]
    #[non_exhaustive]
    Backend { message: String },

    /// An ordered bulk insert wrote only a prefix of its documents.
    #[error(
        "Only {inserted_count} of {attempted_count} documents were inserted: {message}"
    )]
    #[non_exhaustive]
    PartialInsert {
        inserted_count: usize,
        attempted_count: usize,
        message: String,
    },

    /// A value could not be serialized to a BSON document.
    #[error("Failed to serialize a value to BSON: {message}")]
    #[non_exhaustive]
    BsonSerialization { message: String },

    /// A BSON document could not be deserialized to the expected type.
    #[error("Failed to deserialize a value from BSON: {message}")]
    #[non_exhaustive]
    BsonDeserialization { message: String },

    /// A GridFS error occurred.
    #[error("{0:?}")]
    GridFs(GridFsErrorKind),
}

/// An error that occurred during a GridFS operation.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum GridFsErrorKind {
    /// The file with the given identifier was not found.
    #[non_exhaustive]
    FileNotFound { identifier: GridFsFileIdentifier },

    /// A file with the given name already exists.
    #[non_exhaustive]
    FileExists { filename: String },

    /// The chunk at index `n` was missing.
    #[non_exhaustive]
    MissingChunk { n: u32 },

    /// The chunk at index `n` appeared more than once, or out of order.
    #[non_exhaustive]
    DuplicateChunk { n: u32 },

    /// The chunk at index `n` was the incorrect size.
    #[non_exhaustive]
    WrongSizeChunk {
        actual_size: usize,
        expected_size: u32,
        n: u32,
    },

    /// An incorrect number of chunks was present for the file.
    #[non_exhaustive]
    WrongNumberOfChunks {
        actual_number: u32,
        expected_number: u32,
    },

    /// A bulk chunk insert wrote only a prefix of its chunks. The file is missing chunk
    /// indices and can no longer be completed.
    #[non_exhaustive]
    PartialChunkWrite { chunks_written: u32 },

    /// A flush failed to persist its chunks. The stream is poisoned and the file should be
    /// deleted or aborted by the caller.
    StorageWriteFailed,

    /// An operation was attempted on a [`GridFsStream`](crate::gridfs::GridFsStream) that has
    /// already been closed or aborted.
    StreamClosed,

    /// An error occurred when cleaning up a file during an abort.
    #[non_exhaustive]
    AbortError { delete_error: Error },
}

/// An identifier for a file stored in a GridFS bucket.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum GridFsFileIdentifier {
    /// The name of the file. Not guaranteed to be unique.
    Filename(String),

    /// The file's unique id.
    Id(ObjectId),
}
