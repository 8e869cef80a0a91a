//! `object_store` adapters for [`RemoteObject`] and [`Bucket`].

use super::{Bucket, ObjectReader, ObjectWrite, ObjectWriter, RemoteObject, Version};
use crate::error::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore};
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

/// One named object inside an [`ObjectStore`].
#[derive(Clone)]
pub struct StoreObject {
    store: Arc<dyn ObjectStore>,
    location: Path,
    name: String,
}

impl StoreObject {
    /// The object key is the logical name itself.
    pub fn new(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            store,
            location: Path::from(name.as_str()),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RemoteObject for StoreObject {
    async fn new_reader(&self) -> Result<ObjectReader> {
        tracing::debug!(object = %self.location, "opening reader");
        let result = self.store.get(&self.location).await?;
        let stream = result
            .into_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(stream)))
    }

    fn new_writer(&self) -> ObjectWriter {
        tracing::debug!(object = %self.location, "opening writer");
        Box::new(BufWriter::new(self.store.clone(), self.location.clone()))
    }

    async fn version(&self) -> Result<Version> {
        let meta = self.store.head(&self.location).await?;
        tracing::debug!(object = %self.location, e_tag = ?meta.e_tag, "fetched object metadata");
        Ok(version_from_meta(&self.name, &meta))
    }
}

#[async_trait]
impl ObjectWrite for BufWriter {
    async fn abort(&mut self) -> Result<()> {
        BufWriter::abort(self).await?;
        Ok(())
    }
}

/// Every object in an [`ObjectStore`].
#[derive(Clone)]
pub struct StoreBucket {
    store: Arc<dyn ObjectStore>,
}

impl StoreBucket {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Bucket for StoreBucket {
    async fn list_objects(&self) -> Result<Vec<Arc<dyn RemoteObject>>> {
        let metas: Vec<ObjectMeta> = self.store.list(None).try_collect().await?;
        tracing::debug!(count = metas.len(), "listed bucket");

        Ok(metas
            .into_iter()
            .map(|meta| {
                Arc::new(StoreObject::new(self.store.clone(), meta.location.to_string()))
                    as Arc<dyn RemoteObject>
            })
            .collect())
    }
}

/// ETag without quotes, else the store's version id, else size and timestamp.
fn version_from_meta(name: &str, meta: &ObjectMeta) -> Version {
    let reference = meta
        .e_tag
        .as_deref()
        .map(|tag| tag.trim_matches('"'))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .or_else(|| meta.version.clone())
        .unwrap_or_else(|| format!("{}-{}", meta.size, meta.last_modified.timestamp_micros()));

    Version::new(name, reference, meta.last_modified)
}
