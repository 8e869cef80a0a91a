//! Versioned storage of bbl state directories for CI pipelines.
//!
//! A state directory is packed into a zstd-compressed tar stream, stored as a
//! single object in a bucket, and restored bit-for-bit by later pipeline
//! steps. Each stored archive is identified by a [`storage::Version`].

pub mod archive;
pub mod cli;
pub mod concourse;
pub mod error;
pub mod outrunner;
pub mod resource;
pub mod storage;

pub use error::{Result, StorageError};
pub use storage::{Storage, StorageClient, Version};
