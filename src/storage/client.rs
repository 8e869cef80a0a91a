//! Builds [`Storage`] handles from pipeline configuration.

use super::{ensure_bucket, Bucket, BucketAdmin, Storage, StoreBucket, StoreObject};
use crate::concourse::Source;
use crate::error::Result;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use std::sync::Arc;

/// Owns the connection to one bucket and hands out per-name storage.
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Connect to the GCS bucket named in `source`, creating the bucket
    /// under the key's project if it does not exist yet.
    #[cfg(feature = "gcs")]
    pub async fn from_source(source: &Source) -> Result<Self> {
        use super::admin::{project_id_from_key, GcsBucketAdmin};
        use object_store::gcp::GoogleCloudStorageBuilder;

        source.validate()?;
        tracing::debug!(bucket = %source.bucket, "connecting to GCS");
        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(&source.bucket)
            .with_service_account_key(&source.gcp_service_account_key)
            .build()?;

        let project_id = project_id_from_key(&source.gcp_service_account_key)?;
        let admin = GcsBucketAdmin::new(store.credentials().clone(), project_id);
        Self::connect(Arc::new(store), &admin, &source.bucket).await
    }

    #[cfg(not(feature = "gcs"))]
    pub async fn from_source(source: &Source) -> Result<Self> {
        source.validate()?;
        Err(crate::error::StorageError::Config(
            "built without the gcs feature; no remote store available".to_string(),
        ))
    }

    /// Wrap `store` once `bucket` is known to exist.
    pub async fn connect(
        store: Arc<dyn ObjectStore>,
        admin: &dyn BucketAdmin,
        bucket: &str,
    ) -> Result<Self> {
        ensure_bucket(admin, bucket).await?;
        Ok(Self::new(store))
    }

    /// Process-local store, empty on creation.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn bucket(&self) -> Arc<dyn Bucket> {
        Arc::new(StoreBucket::new(self.store.clone()))
    }

    /// Storage bound to the object called `name`.
    pub fn storage_for(&self, name: &str) -> Storage {
        Storage::with_default_archiver(
            name,
            self.bucket(),
            Arc::new(StoreObject::new(self.store.clone(), name)),
        )
    }
}
