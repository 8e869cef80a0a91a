//! Bucket creation on first access.
//!
//! `object_store` only reaches objects, so the bucket itself is managed
//! through the GCS JSON API with the same service-account credentials.

use super::BucketAdmin;
use crate::error::{Result, StorageError};
use serde::Deserialize;

/// Create `bucket` unless it already exists. Returns true if it was created.
pub async fn ensure_bucket(admin: &dyn BucketAdmin, bucket: &str) -> Result<bool> {
    if admin.bucket_exists(bucket).await? {
        tracing::debug!(bucket, "bucket exists");
        return Ok(false);
    }

    tracing::info!(bucket, "bucket not found, creating it");
    admin.create_bucket(bucket).await?;
    Ok(true)
}

#[derive(Deserialize)]
struct KeyProject {
    project_id: String,
}

/// The project a service-account key belongs to. New buckets are billed to it.
pub fn project_id_from_key(service_account_key: &str) -> Result<String> {
    let key: KeyProject = serde_json::from_str(service_account_key).map_err(|e| {
        StorageError::Config(format!("reading project id from service account key: {}", e))
    })?;
    if key.project_id.is_empty() {
        return Err(StorageError::Config(
            "service account key has an empty project_id".to_string(),
        ));
    }
    Ok(key.project_id)
}

#[cfg(feature = "gcs")]
pub use gcs::GcsBucketAdmin;

#[cfg(feature = "gcs")]
mod gcs {
    use super::*;
    use async_trait::async_trait;
    use object_store::gcp::GcpCredentialProvider;
    use object_store::CredentialProvider;
    use reqwest::StatusCode;

    const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

    /// Bucket metadata calls against the GCS JSON API.
    pub struct GcsBucketAdmin {
        http: reqwest::Client,
        credentials: GcpCredentialProvider,
        project_id: String,
        endpoint: String,
    }

    impl GcsBucketAdmin {
        pub fn new(credentials: GcpCredentialProvider, project_id: impl Into<String>) -> Self {
            Self {
                http: reqwest::Client::new(),
                credentials,
                project_id: project_id.into(),
                endpoint: DEFAULT_ENDPOINT.to_string(),
            }
        }

        pub fn project_id(&self) -> &str {
            &self.project_id
        }

        fn bucket_url(&self, bucket: &str) -> String {
            format!("{}/storage/v1/b/{}", self.endpoint, bucket)
        }

        fn buckets_url(&self) -> String {
            format!("{}/storage/v1/b", self.endpoint)
        }

        async fn bearer(&self) -> Result<String> {
            let credential = self.credentials.get_credential().await?;
            Ok(credential.bearer.clone())
        }
    }

    #[async_trait]
    impl BucketAdmin for GcsBucketAdmin {
        async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
            let resp = self
                .http
                .get(self.bucket_url(bucket))
                .bearer_auth(self.bearer().await?)
                .query(&[("userProject", self.project_id.as_str())])
                .send()
                .await?;

            match resp.status() {
                status if status.is_success() => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                status => Err(StorageError::Bucket(format!(
                    "failed to get bucket {}: HTTP {}",
                    bucket, status
                ))),
            }
        }

        async fn create_bucket(&self, bucket: &str) -> Result<()> {
            let resp = self
                .http
                .post(self.buckets_url())
                .bearer_auth(self.bearer().await?)
                .query(&[("project", self.project_id.as_str())])
                .json(&serde_json::json!({ "name": bucket }))
                .send()
                .await?;

            match resp.status() {
                status if status.is_success() => Ok(()),
                StatusCode::CONFLICT => {
                    tracing::debug!(bucket, "bucket created concurrently");
                    Ok(())
                }
                status => Err(StorageError::Bucket(format!(
                    "failed to create bucket {} in project {}: HTTP {}",
                    bucket, self.project_id, status
                ))),
            }
        }
    }

}
