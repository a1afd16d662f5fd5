//! [`StateStore`] backed by a versioned S3 bucket.
//!
//! Versioning must be enabled on the bucket; every `put` then yields a new
//! version id and earlier versions stay readable by id.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use strata_core::prelude::*;
use tracing::{debug, error, instrument};

#[derive(Clone)]
pub struct S3StateStore {
    client: Client,
    bucket: String,
    region: String,
}

impl S3StateStore {
    pub fn new(client: Client, bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    /// Builds a client from the ambient AWS configuration (env, profile, IMDS).
    pub async fn from_env(location: &StateLocation) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(location.region.clone()))
            .load()
            .await;
        tracing::info!(bucket = %location.bucket, region = %location.region, "S3 state store initialized");
        Self::new(Client::new(&config), &location.bucket, &location.region)
    }
}

fn to_chrono(value: Option<&AwsDateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

fn to_size(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

impl StateStore for S3StateStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn region(&self) -> &str {
        &self.region
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head(&self, key: &str) -> Result<ObjectVersion, StateStoreError> {
        debug!("Reading current state version metadata...");
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(output) => Ok(ObjectVersion {
                version_id: output.version_id().map(str::to_string),
                etag: output.e_tag().map(|e| e.trim_matches('"').to_string()),
                last_modified: to_chrono(output.last_modified()),
                size: to_size(output.content_length()),
            }),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => {
                debug!("State object not found");
                Err(StateStoreError::NotFound(format!("s3://{}/{key}", self.bucket)))
            }
            Err(e) => {
                error!("S3 Head Object Error: {:?}", e);
                Err(StateStoreError::Generic(format!("S3 Error: {e}")))
            }
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get_version(&self, key: &str, version_id: Option<&str>) -> Result<Bytes, StateStoreError> {
        debug!("Downloading state...");
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await;

        match res {
            Ok(output) => {
                let data = output.body.collect().await.map_err(|e| {
                    error!("Failed to stream body: {:?}", e);
                    StateStoreError::Generic(format!("Failed to stream S3 body: {e}"))
                })?;
                Ok(data.into_bytes())
            }
            Err(SdkError::ServiceError(err)) => {
                let inner = err.err();
                if inner.is_no_such_key() {
                    Err(StateStoreError::NotFound(format!("s3://{}/{key}", self.bucket)))
                } else if matches!(inner.code(), Some("NoSuchVersion") | Some("InvalidArgument")) {
                    Err(StateStoreError::VersionNotFound(
                        version_id.unwrap_or_default().to_string(),
                    ))
                } else {
                    error!("S3 Service Error during read: {:?}", err);
                    Err(StateStoreError::Generic(format!("S3 Service Error: {inner:?}")))
                }
            }
            Err(e) => {
                error!("Unexpected S3 Error: {:?}", e);
                Err(StateStoreError::Generic(format!("S3 Error: {e:?}")))
            }
        }
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<Option<String>, StateStoreError> {
        debug!("Uploading state as new version...");
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload state: {e:?}");
                StateStoreError::Generic(format!("S3 Upload Error: {e:?}"))
            })?;

        Ok(output.version_id().map(str::to_string))
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_versions(&self, key: &str, limit: usize) -> Result<Vec<VersionEntry>, StateStoreError> {
        let output = self
            .client
            .list_object_versions()
            .bucket(&self.bucket)
            .prefix(key)
            .max_keys(i32::try_from(limit).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to list versions: {e:?}");
                StateStoreError::Generic(format!("S3 List Versions Error: {e:?}"))
            })?;

        Ok(output
            .versions()
            .iter()
            .filter(|v| v.key() == Some(key))
            .filter_map(|v| {
                Some(VersionEntry {
                    version_id: v.version_id()?.to_string(),
                    last_modified: to_chrono(v.last_modified()),
                    size: to_size(v.size()),
                    is_latest: v.is_latest().unwrap_or(false),
                })
            })
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_sdk_timestamps() {
        let aws = AwsDateTime::from_secs(1_736_937_000);
        let converted = to_chrono(Some(&aws)).unwrap();
        assert_eq!(converted.to_rfc3339(), "2025-01-15T10:30:00+00:00");
        assert_eq!(to_size(Some(-1)), None);
        assert_eq!(to_size(Some(42)), Some(42));
    }
}
