//! Object store abstraction trait.
//!
//! Defines the narrow interface the sync engine needs from a remote store.

use crate::error::{CloudError, CloudResult};
use async_trait::async_trait;
use boxsync_types::is_directory_key;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::warn;

/// One object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modified time reported by the store.
    pub last_modified: SystemTime,
}

impl ObjectSummary {
    /// Returns true for zero-length directory markers.
    pub fn is_marker(&self) -> bool {
        is_directory_key(&self.key) && self.size == 0
    }
}

/// Content and metadata of a downloaded object.
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// The object bytes.
    pub content: Vec<u8>,
    /// Size reported by the store.
    pub size: u64,
    /// Last modified time, when the store reports one.
    pub last_modified: Option<SystemTime>,
}

/// Parameters of a single listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Groups keys sharing a prefix up to this delimiter into common prefixes.
    pub delimiter: Option<String>,
    /// Token from the previous page's `next_token`.
    pub continuation_token: Option<String>,
    /// Upper bound on objects plus common prefixes in one page.
    pub max_keys: Option<u32>,
}

impl ListRequest {
    /// Lists everything under `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Groups child keys on `delimiter`.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Caps the page size.
    #[must_use]
    pub fn with_max_keys(mut self, max_keys: u32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects on this page, in key order.
    pub objects: Vec<ObjectSummary>,
    /// Rolled-up child prefixes (only with a delimiter).
    pub common_prefixes: Vec<String>,
    /// Token to request the next page.
    pub next_token: Option<String>,
    /// True if more pages remain.
    pub truncated: bool,
}

impl ListPage {
    /// Returns true if the page holds neither objects nor prefixes.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.common_prefixes.is_empty()
    }
}

/// Abstract object store interface.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of the storage provider.
    fn provider_name(&self) -> &'static str;

    /// Writes an object, replacing any existing object at `key`.
    async fn put_object(&self, key: &str, content: &[u8]) -> CloudResult<()>;

    /// Writes a zero-length directory marker. The key must end with `/`.
    async fn put_marker(&self, key: &str) -> CloudResult<()> {
        if !is_directory_key(key) {
            return Err(CloudError::InvalidKey(format!(
                "directory marker must end with '/': {key}"
            )));
        }
        self.put_object(key, &[]).await
    }

    /// Downloads an object with its metadata.
    async fn get_object(&self, key: &str) -> CloudResult<ObjectData>;

    /// Returns one page of keys matching the request.
    async fn list_objects(&self, request: &ListRequest) -> CloudResult<ListPage>;

    /// Deletes an object. Deleting a missing key is not an error.
    async fn delete_object(&self, key: &str) -> CloudResult<()>;
}

/// Walks a listing page by page, re-issuing the request with each page's
/// continuation token until the store reports no more pages.
pub struct ObjectPager<'a> {
    store: &'a dyn ObjectStore,
    request: ListRequest,
    done: bool,
}

impl<'a> ObjectPager<'a> {
    pub fn new(store: &'a dyn ObjectStore, request: ListRequest) -> Self {
        Self {
            store,
            request,
            done: false,
        }
    }

    /// Fetches the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> CloudResult<Option<ListPage>> {
        if self.done {
            return Ok(None);
        }

        let page = self.store.list_objects(&self.request).await?;
        match (&page.next_token, page.truncated) {
            (Some(token), true) => self.request.continuation_token = Some(token.clone()),
            (None, true) => {
                warn!(
                    "Listing of {:?} reported more pages without a token; stopping",
                    self.request.prefix
                );
                self.done = true;
            }
            _ => self.done = true,
        }
        Ok(Some(page))
    }
}

/// Collects every object under `prefix` across all pages.
pub async fn list_all(store: &dyn ObjectStore, prefix: &str) -> CloudResult<Vec<ObjectSummary>> {
    let mut pager = ObjectPager::new(store, ListRequest::prefix(prefix));
    let mut objects = Vec::new();
    while let Some(page) = pager.next_page().await? {
        objects.extend(page.objects);
    }
    Ok(objects)
}
