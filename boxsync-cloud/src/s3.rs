//! S3 object store.
//!
//! Uses the AWS SDK (ListObjectsV2 for listings). Works against AWS itself or
//! any S3-compatible service via `endpoint_url` + path-style addressing.

use crate::error::{CloudError, CloudResult};
use crate::store::{ListPage, ListRequest, ObjectData, ObjectStore, ObjectSummary};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Connection settings for S3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Bucket holding every user's synced objects.
    pub bucket: String,
    /// Bucket holding per-user preferences.
    pub preferences_bucket: String,
    /// AWS region.
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint_url: Option<String>,
    /// Use path-style (`endpoint/bucket/key`) addressing.
    pub force_path_style: bool,
    /// Static access key. Falls back to the default credential chain when unset.
    pub access_key_id: Option<String>,
    /// Static secret key.
    pub secret_access_key: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            preferences_bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// Object store backed by an S3 bucket.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Builds a client from `config` and binds it to `bucket`.
    pub async fn connect(config: &S3Config, bucket: &str) -> CloudResult<Self> {
        if bucket.is_empty() {
            return Err(CloudError::Config("bucket name is empty".to_string()));
        }
        let region = Region::new(config.region.clone());

        let client = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "boxsync-static");
                let mut builder = aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
                    .force_path_style(config.force_path_style);
                if let Some(endpoint) = &config.endpoint_url {
                    builder = builder.endpoint_url(endpoint);
                }
                Client::from_conf(builder.build())
            }
            (None, None) => {
                let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
                if let Some(endpoint) = &config.endpoint_url {
                    loader = loader.endpoint_url(endpoint);
                }
                let shared = loader.load().await;
                let s3_config = aws_sdk_s3::config::Builder::from(&shared)
                    .force_path_style(config.force_path_style)
                    .build();
                Client::from_conf(s3_config)
            }
            _ => {
                return Err(CloudError::Config(
                    "access_key_id and secret_access_key must be set together".to_string(),
                ));
            }
        };

        info!("Connected to S3 bucket {} ({})", bucket, config.region);
        Ok(Self::from_client(client, bucket))
    }

    /// Wraps an already configured client.
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Returns the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn s3_error<E: std::error::Error>(operation: &str, key: &str, err: E) -> CloudError {
    CloudError::S3(format!("{operation} {key}: {}", DisplayErrorContext(err)))
}

fn to_system_time(dt: &aws_sdk_s3::primitives::DateTime) -> Option<SystemTime> {
    SystemTime::try_from(*dt).ok()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider_name(&self) -> &'static str {
        "Amazon S3"
    }

    async fn put_object(&self, key: &str, content: &[u8]) -> CloudResult<()> {
        debug!("Uploading to S3: {} ({} bytes)", key, content.len());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .map_err(|e| s3_error("put", key, e))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> CloudResult<ObjectData> {
        debug!("Downloading from S3: {}", key);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Err(CloudError::NotFound(key.to_string()));
                }
                return Err(s3_error("get", key, err));
            }
        };

        let last_modified = output.last_modified().and_then(to_system_time);
        let reported_size = output.content_length();
        let content = output
            .body
            .collect()
            .await
            .map_err(|e| s3_error("read", key, e))?
            .into_bytes()
            .to_vec();
        let size = reported_size
            .and_then(|len| u64::try_from(len).ok())
            .unwrap_or(content.len() as u64);

        Ok(ObjectData {
            content,
            size,
            last_modified,
        })
    }

    async fn list_objects(&self, request: &ListRequest) -> CloudResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_continuation_token(request.continuation_token.clone())
            .set_max_keys(request.max_keys.map(|max| i32::try_from(max).unwrap_or(i32::MAX)))
            .send()
            .await
            .map_err(|e| s3_error("list", &request.prefix, e))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                Some(ObjectSummary {
                    key,
                    size: object
                        .size()
                        .and_then(|s| u64::try_from(s).ok())
                        .unwrap_or(0),
                    last_modified: object
                        .last_modified()
                        .and_then(to_system_time)
                        .unwrap_or(UNIX_EPOCH),
                })
            })
            .collect();

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(ListPage {
            objects,
            common_prefixes,
            next_token: output.next_continuation_token().map(str::to_string),
            truncated: output.is_truncated().unwrap_or(false),
        })
    }

    async fn delete_object(&self, key: &str) -> CloudResult<()> {
        debug!("Deleting from S3: {}", key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error("delete", key, e))?;
        Ok(())
    }
}
