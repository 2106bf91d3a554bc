//! In-memory object store.
//!
//! Keeps objects in an ordered map so listings come back in key order, with
//! the same prefix, delimiter and continuation-token behaviour as S3. Every
//! call is recorded, and individual keys can be made to fail, so callers can
//! assert exactly which remote operations were issued.

use crate::error::{CloudError, CloudResult};
use crate::store::{ListPage, ListRequest, ObjectData, ObjectStore, ObjectSummary};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::time::SystemTime;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Default number of entries per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A call made against a [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Put { key: String, size: u64 },
    Get { key: String },
    List {
        prefix: String,
        continuation_token: Option<String>,
    },
    Delete { key: String },
}

#[derive(Debug, Clone)]
struct StoredObject {
    content: Vec<u8>,
    last_modified: SystemTime,
}

/// Object store held entirely in process memory.
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    calls: Mutex<Vec<StoreCall>>,
    failing: RwLock<HashSet<String>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Creates an empty store with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store that returns at most `page_size` entries per
    /// listing page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            calls: Mutex::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Seeds an object without recording a call.
    pub async fn insert(&self, key: impl Into<String>, content: &[u8], last_modified: SystemTime) {
        self.objects.write().await.insert(
            key.into(),
            StoredObject {
                content: content.to_vec(),
                last_modified,
            },
        );
    }

    /// Makes every operation on `key` (or a listing of prefix `key`) fail.
    pub async fn fail_on(&self, key: impl Into<String>) {
        self.failing.write().await.insert(key.into());
    }

    /// Returns all recorded calls, oldest first.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    /// Forgets recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Returns every stored key in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Returns the content stored at `key`, without recording a call.
    pub async fn content(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).map(|o| o.content.clone())
    }

    /// Returns the last modified time stored at `key`, without recording a call.
    pub async fn last_modified(&self, key: &str) -> Option<SystemTime> {
        self.objects.read().await.get(key).map(|o| o.last_modified)
    }

    async fn record(&self, call: StoreCall) {
        self.calls.lock().await.push(call);
    }

    async fn check_failure(&self, key: &str) -> CloudResult<()> {
        if self.failing.read().await.contains(key) {
            return Err(CloudError::Backend(format!("injected failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn provider_name(&self) -> &'static str {
        "Memory"
    }

    async fn put_object(&self, key: &str, content: &[u8]) -> CloudResult<()> {
        self.record(StoreCall::Put {
            key: key.to_string(),
            size: content.len() as u64,
        })
        .await;
        self.check_failure(key).await?;

        debug!("Storing {} ({} bytes)", key, content.len());
        self.insert(key, content, SystemTime::now()).await;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> CloudResult<ObjectData> {
        self.record(StoreCall::Get {
            key: key.to_string(),
        })
        .await;
        self.check_failure(key).await?;

        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| CloudError::NotFound(key.to_string()))?;
        Ok(ObjectData {
            content: object.content.clone(),
            size: object.content.len() as u64,
            last_modified: Some(object.last_modified),
        })
    }

    async fn list_objects(&self, request: &ListRequest) -> CloudResult<ListPage> {
        self.record(StoreCall::List {
            prefix: request.prefix.clone(),
            continuation_token: request.continuation_token.clone(),
        })
        .await;
        self.check_failure(&request.prefix).await?;

        let limit = request
            .max_keys
            .map_or(self.page_size, |max| (max as usize).min(self.page_size));
        let mut page = ListPage::default();
        if limit == 0 {
            return Ok(page);
        }

        let start = match &request.continuation_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Included(request.prefix.clone()),
        };

        let objects = self.objects.read().await;
        let mut emitted = 0usize;
        let mut last_key: Option<String> = None;

        for (key, object) in objects.range::<String, _>((start, Bound::Unbounded)) {
            if !key.starts_with(&request.prefix) {
                break;
            }

            let rolled_up = request.delimiter.as_deref().and_then(|delimiter| {
                key[request.prefix.len()..]
                    .find(delimiter)
                    .map(|idx| key[..request.prefix.len() + idx + delimiter.len()].to_string())
            });

            match rolled_up {
                Some(common) if page.common_prefixes.last() == Some(&common) => {}
                Some(common) => {
                    if emitted == limit {
                        page.truncated = true;
                        break;
                    }
                    page.common_prefixes.push(common);
                    emitted += 1;
                }
                None => {
                    if emitted == limit {
                        page.truncated = true;
                        break;
                    }
                    page.objects.push(ObjectSummary {
                        key: key.clone(),
                        size: object.content.len() as u64,
                        last_modified: object.last_modified,
                    });
                    emitted += 1;
                }
            }
            last_key = Some(key.clone());
        }

        if page.truncated {
            page.next_token = last_key;
        }
        Ok(page)
    }

    async fn delete_object(&self, key: &str) -> CloudResult<()> {
        self.record(StoreCall::Delete {
            key: key.to_string(),
        })
        .await;
        self.check_failure(key).await?;

        self.objects.write().await.remove(key);
        Ok(())
    }
}
