#![doc = include_str!("../README.md")]
#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub(crate) mod checked;
pub mod db;
pub mod error;
pub mod gridfs;
pub mod options;
#[cfg(test)]
mod test;

pub use bson;

pub use crate::{
    db::{Collection, Database, DocumentDatabase},
    error::{Error, Result},
    gridfs::{FilesCollectionDocument, GridFsBucket, GridFsStream},
};
