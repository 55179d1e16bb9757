use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::bson::Document;

/// Contains the options for creating a [`GridFsBucket`](crate::gridfs::GridFsBucket).
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct GridFsBucketOptions {
    /// The bucket name. Defaults to 'fs'.
    pub bucket_name: Option<String>,

    /// The chunk size in bytes used to break files into chunks. Defaults to 256 KiB.
    pub chunk_size_bytes: Option<u32>,
}

/// Contains the options for opening a file stream via
/// [`GridFsBucket::create`](crate::gridfs::GridFsBucket::create).
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct GridFsCreateOptions {
    /// How the requested filename is resolved against existing files. Defaults to
    /// [`FileMode::Create`].
    pub mode: Option<FileMode>,

    /// The I/O capabilities granted to the returned stream. Defaults to
    /// [`FileAccess::ReadWrite`].
    pub access: Option<FileAccess>,

    /// The number of bytes per chunk of this file. Defaults to the `chunk_size_bytes` of the
    /// bucket.
    pub chunk_size_bytes: Option<u32>,

    /// The MIME type of the file. Defaults to `text/plain`.
    pub content_type: Option<String>,

    /// User data for the 'metadata' field of the files collection document.
    pub metadata: Option<Document>,
}

/// How [`GridFsBucket::create`](crate::gridfs::GridFsBucket::create) treats existing files
/// with the requested name.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum FileMode {
    /// Create the file, superseding any existing files of the same name: their metadata
    /// records and chunks are deleted first.
    #[default]
    Create,

    /// Create the file, failing if a file with the requested name already exists.
    CreateNew,

    /// Open the most recent existing file with the requested name for reading, failing if
    /// none exists. Stored files are immutable, so this mode only permits
    /// [`FileAccess::Read`].
    Open,
}

/// The I/O capabilities of a [`GridFsStream`](crate::gridfs::GridFsStream).
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum FileAccess {
    /// The stream may only read.
    Read,

    /// The stream may only write.
    Write,

    /// The stream may both write and, once closed, read back what it wrote.
    #[default]
    ReadWrite,
}

impl FileAccess {
    pub(crate) fn can_read(self) -> bool {
        matches!(self, FileAccess::Read | FileAccess::ReadWrite)
    }

    pub(crate) fn can_write(self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}

/// Contains the options for finding
/// [`FilesCollectionDocument`](crate::gridfs::FilesCollectionDocument)s in a
/// [`GridFsBucket`](crate::gridfs::GridFsBucket).
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct GridFsFindOptions {
    /// The maximum number of metadata records to return.
    pub limit: Option<usize>,

    /// The order by which to sort results. Defaults to filename ascending.
    pub sort: Option<Document>,
}
