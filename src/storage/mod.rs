//! Versioned archive storage.
//!
//! Binds one tracked directory to one remote object: `download` restores the
//! directory from the object (bootstrapping the object on first use), `upload`
//! replaces the object with the directory's current contents, and
//! `get_all_newer_versions` scans the whole bucket for fresh versions.
//!
//! The archive is piped straight between the codec and the object stream; the
//! blocking codec runs on the runtime's blocking pool and is awaited
//! immediately, so every call remains one sequential operation.

pub mod admin;
pub mod client;
pub mod object;

pub use admin::ensure_bucket;
pub use client::StorageClient;
pub use object::{StoreBucket, StoreObject};

use crate::archive::{files_from_disk, Archiver, DiskExtractor, TarZstd};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio_util::io::SyncIoBridge;

/// One observed state of one remote object.
///
/// The default version is the lowest possible watermark: every stored
/// object counts as newer than it, whatever its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "ref")]
    pub reference: String,
    #[serde(default = "earliest")]
    pub updated: DateTime<Utc>,
}

fn earliest() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

impl Default for Version {
    fn default() -> Self {
        Self::new("", "", earliest())
    }
}

impl Version {
    pub fn new(name: impl Into<String>, reference: impl Into<String>, updated: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
            updated,
        }
    }

    /// At or after `watermark`; equal timestamps count as newer.
    pub fn is_at_or_after(&self, watermark: &Version) -> bool {
        self.updated >= watermark.updated
    }
}

pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;
pub type ObjectWriter = Box<dyn ObjectWrite>;

/// Byte sink for one object. `shutdown` commits, `abort` discards.
#[async_trait]
pub trait ObjectWrite: AsyncWrite + Send + Unpin {
    /// Drop everything written so far, including any parts already sent.
    async fn abort(&mut self) -> Result<()>;
}

/// A single addressable slot in remote storage.
#[async_trait]
pub trait RemoteObject: Send + Sync {
    /// Stream the stored bytes. Fails with `ObjectNotFound` if nothing was ever written.
    async fn new_reader(&self) -> Result<ObjectReader>;

    /// Writer replacing the stored bytes; the object is only committed by `shutdown`
    /// and is released by `abort` when the write is abandoned.
    fn new_writer(&self) -> ObjectWriter;

    async fn version(&self) -> Result<Version>;
}

/// The shared namespace objects live in.
#[async_trait]
pub trait Bucket: Send + Sync {
    async fn list_objects(&self) -> Result<Vec<Arc<dyn RemoteObject>>>;
}

/// Bucket lifecycle, separate from the objects inside it.
#[async_trait]
pub trait BucketAdmin: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create `bucket`. Losing a creation race to another writer is not an error.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;
}

/// Directory-level storage for one tracked name.
#[derive(Clone)]
pub struct Storage {
    name: String,
    bucket: Arc<dyn Bucket>,
    object: Arc<dyn RemoteObject>,
    archiver: Arc<dyn Archiver>,
}

impl Storage {
    pub fn new(
        name: impl Into<String>,
        bucket: Arc<dyn Bucket>,
        object: Arc<dyn RemoteObject>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            name: name.into(),
            bucket,
            object,
            archiver,
        }
    }

    /// Storage using the default `tar` + zstd codec.
    pub fn with_default_archiver(
        name: impl Into<String>,
        bucket: Arc<dyn Bucket>,
        object: Arc<dyn RemoteObject>,
    ) -> Self {
        Self::new(name, bucket, object, Arc::new(TarZstd::default()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn version(&self) -> Result<Version> {
        self.object.version().await
    }

    /// Restore `target_dir` from the remote object.
    ///
    /// When nothing has been stored yet the object is bootstrapped from
    /// whatever `target_dir` holds, which may be nothing at all.
    pub async fn download(&self, target_dir: &Path) -> Result<Version> {
        let reader = match self.object.new_reader().await {
            Ok(reader) => reader,
            Err(err) if err.is_not_found() => {
                tokio::fs::create_dir_all(target_dir).await?;
                return self.upload(target_dir).await;
            }
            Err(err) => return Err(err),
        };

        tokio::fs::create_dir_all(target_dir).await?;

        // The reader moves into the blocking task and is dropped there on every path
        let archiver = self.archiver.clone();
        let extractor = DiskExtractor::new(target_dir);
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || {
            let mut input = SyncIoBridge::new_with_handle(reader, handle);
            archiver.extract(&mut input, None, &mut |entry| extractor.handle(entry))?;
            extractor.finish()
        })
        .await??;

        self.version().await
    }

    /// Replace the remote object with the children of `source_dir`.
    ///
    /// A failed archive write aborts the writer instead of shutting it down,
    /// so the partial object is never committed.
    pub async fn upload(&self, source_dir: &Path) -> Result<Version> {
        let writer = self.object.new_writer();

        let source = source_dir.to_path_buf();
        let files = match tokio::task::spawn_blocking(move || files_from_disk(&source)).await? {
            Ok(files) => files,
            Err(err) => return Err(abandon(writer, err).await),
        };

        let archiver = self.archiver.clone();
        let handle = Handle::current();
        let (mut writer, archived) = tokio::task::spawn_blocking(move || {
            let mut output = SyncIoBridge::new_with_handle(writer, handle);
            let archived = archiver.archive(&mut output, &files);
            (output.into_inner(), archived)
        })
        .await?;
        if let Err(err) = archived {
            return Err(abandon(writer, err).await);
        }

        writer.shutdown().await?;

        self.version().await
    }

    /// Versions of every object in the bucket updated at or after `watermark`.
    pub async fn get_all_newer_versions(&self, watermark: &Version) -> Result<Vec<Version>> {
        let objects = self.bucket.list_objects().await?;

        let mut versions = Vec::new();
        for object in objects {
            let version = object.version().await?;
            if version.is_at_or_after(watermark) {
                versions.push(version);
            }
        }
        Ok(versions)
    }
}

/// Abort `writer` and hand back the error that made the upload give up.
async fn abandon(mut writer: ObjectWriter, err: StorageError) -> StorageError {
    if let Err(abort_err) = writer.abort().await {
        tracing::warn!(error = %abort_err, "failed to abort partial upload");
    }
    err
}

#[cfg(test)]
pub(crate) mod fakes;
