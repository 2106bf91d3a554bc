//! Object storage backends for boxsync.
//!
//! Object stores are flat key/value spaces; boxsync only needs four
//! capabilities from them (put, get, paginated list, delete), captured by the
//! [`ObjectStore`] trait. Two backends are provided:
//! - [`S3ObjectStore`] for AWS S3 and S3-compatible services
//! - [`MemoryObjectStore`] for tests and offline use
//!
//! [`PreferenceStore`] keeps small per-user settings (such as the chosen local
//! root directory) as objects in a separate bucket.

mod error;
mod memory;
mod preferences;
mod s3;
mod store;

pub use error::{CloudError, CloudResult};
pub use memory::{MemoryObjectStore, StoreCall};
pub use preferences::{PreferenceStore, ROOT_DIRECTORY_KEY};
pub use s3::{S3Config, S3ObjectStore};
pub use store::{ListPage, ListRequest, ObjectData, ObjectPager, ObjectStore, ObjectSummary, list_all};
