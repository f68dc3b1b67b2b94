//! Versioned content tree with hierarchical access control.
//!
//! Content objects are stored as revisions sharing one id: revision `0` is
//! the work copy, higher numbers are published. Access rules are inherited
//! from the nearest ancestor with a non-empty permission set, up to the
//! domain, and are deny-by-default. Use [`ContentManager`] for reads and
//! writes and [`ContentCache`] to share hot objects between managers.
//!
//! # Examples
//!
//! Reading published content with the in-memory store (enable `memory-store`):
//! ```no_run
//! use rs_cms::{ContentCache, ContentId, ContentManagerBuilder};
//! use std::sync::Arc;
//! # #[cfg(feature = "memory-store")]
//! # {
//! use rs_cms::MemoryStore;
//! let cache = Arc::new(ContentCache::new());
//! let manager = ContentManagerBuilder::new(MemoryStore::new())
//!     .cache(Arc::clone(&cache))
//!     .build();
//! let _ = manager.get_content(None, ContentId::new(42));
//! # }
//! ```
//!
//! Deriving an admin manager that shares store and cache:
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # {
//! use rs_cms::{ContentManagerBuilder, MemoryStore};
//! let public = ContentManagerBuilder::new(MemoryStore::new()).build();
//! let admin = public.with_admin(true);
//! assert!(admin.is_admin());
//! # }
//! ```
#![forbid(unsafe_code)]

mod access;
mod cache;
mod content;
mod error;
mod manager;
mod model;
mod permission;
mod query;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

pub use crate::access::{AccessResolver, DEFAULT_MAX_PARENT_DEPTH, Resource};
pub use crate::cache::{CacheObject, ContentCache};
pub use crate::content::{
    AttributeDiff, Category, ContentId, ContentNode, ContentStatus, ELEMENT_PREFIX,
    PROPERTY_PREFIX, PROPERTY_TYPE_PREFIX, PropertyType, TextType, WORK_REVISION,
};
pub use crate::error::{Error, Result, StoreError};
pub use crate::manager::{ContentManager, ContentManagerBuilder};
pub use crate::model::{Domain, Group, Host, Lock, User};
pub use crate::permission::{AccessLevel, PermissionRef, PermissionRule, PermissionSet};
pub use crate::query::{ContentQuery, ContentSelector, SortColumn, SortKey};
pub use crate::store::{
    AttributeStore, ContentStore, DomainStore, LockStore, PermissionStore, Store, UserStore,
};
pub use crate::types::{DomainName, GroupName, HostName, UserName};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
