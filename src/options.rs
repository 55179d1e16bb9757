//! Contains the options structs for the operations in this crate.

pub use crate::gridfs::options::{
    FileAccess,
    FileMode,
    GridFsBucketOptions,
    GridFsCreateOptions,
    GridFsFindOptions,
};
