//! Process-local cache of domains, hosts, site lists, parent links, one
//! tracked content category and permission sets.
//!
//! Every mutating call runs inside one write critical section. Entries are
//! replaced wholesale and never mutated in place, so a reader either sees
//! the previous value or the invalidated state.

use crate::content::{Category, ContentId, ContentNode};
use crate::error::{Error, Result};
use crate::model::{Domain, Host};
use crate::permission::{PermissionRef, PermissionSet};
use crate::types::{DomainName, HostName};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace, warn};

/// Object kinds the cache knows how to key.
#[derive(Debug, Clone, Copy)]
pub enum CacheObject<'a> {
    Domain(&'a Domain),
    Host(&'a Host),
    Content(&'a ContentNode),
    Permissions(&'a PermissionSet),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PermissionKey {
    Domain(DomainName),
    Content(ContentId),
}

impl From<&PermissionRef> for PermissionKey {
    fn from(reference: &PermissionRef) -> Self {
        match reference {
            PermissionRef::Domain(domain) => Self::Domain(domain.clone()),
            PermissionRef::Content { id, .. } => Self::Content(*id),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    domains: HashMap<DomainName, Domain>,
    hosts: HashMap<HostName, Host>,
    sites: HashMap<DomainName, Vec<Arc<ContentNode>>>,
    parents: HashMap<ContentId, ContentId>,
    contents: HashMap<ContentId, Arc<ContentNode>>,
    permissions: HashMap<PermissionKey, Arc<PermissionSet>>,
    /// Bumped by every eviction.
    generation: u64,
}

impl CacheState {
    fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.domains.clear();
        self.flush_dependents();
    }

    fn flush_dependents(&mut self) {
        self.hosts.clear();
        self.sites.clear();
        self.parents.clear();
        self.contents.clear();
        self.permissions.clear();
    }

    fn evict_content(&mut self, node: &ContentNode) {
        if node.category == Category::Site {
            self.sites.remove(&node.domain);
        }
        self.parents.remove(&node.id);
        self.contents.remove(&node.id);
    }
}

/// Shared content cache.
///
/// Create one per application context and hand it to every
/// [`ContentManager`](crate::ContentManager) that must observe the same
/// invalidations.
#[derive(Debug)]
pub struct ContentCache {
    state: RwLock<CacheState>,
    tracked: Category,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    /// Creates an empty cache tracking template bodies.
    pub fn new() -> Self {
        Self::with_tracked_category(Category::Template)
    }

    /// Creates an empty cache tracking bodies of `category`.
    pub fn with_tracked_category(category: Category) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            tracked: category,
        }
    }

    /// Category whose latest published bodies are cached.
    pub fn tracked_category(&self) -> Category {
        self.tracked
    }

    fn read(&self, op: &'static str) -> RwLockReadGuard<'_, CacheState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(op, lock_kind = "rwlock.read", "recovered from poisoned cache lock");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, CacheState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(op, lock_kind = "rwlock.write", "recovered from poisoned cache lock");
                poisoned.into_inner()
            }
        }
    }

    /// Returns whether the object's own cache entry is present.
    ///
    /// Content is cached only while it is both latest and published, so
    /// other revisions always report `false`.
    pub fn is_cached(&self, object: CacheObject<'_>) -> bool {
        let state = self.read("is_cached");
        match object {
            CacheObject::Domain(domain) => state.domains.contains_key(&domain.name),
            CacheObject::Host(host) => state.hosts.contains_key(&host.name),
            CacheObject::Content(node) => {
                node.is_latest()
                    && node.is_published()
                    && state.parents.get(&node.id) == Some(&node.parent)
                    && (node.category != self.tracked || state.contents.contains_key(&node.id))
            }
            CacheObject::Permissions(set) => state
                .permissions
                .contains_key(&PermissionKey::from(set.reference())),
        }
    }

    /// Returns the eviction counter.
    ///
    /// Read it before loading an object from the store and pass it to
    /// [`ContentCache::add_if_current`] afterwards.
    pub fn generation(&self) -> u64 {
        self.read("generation").generation
    }

    /// Adds `object` unless an eviction ran since `generation` was read.
    ///
    /// Returns whether the object was added.
    pub fn add_if_current(&self, object: CacheObject<'_>, generation: u64) -> bool {
        let mut state = self.write("add_if_current");
        if state.generation != generation {
            trace!(generation, current = state.generation, "skipped stale cache add");
            return false;
        }
        self.add_locked(&mut state, object);
        true
    }

    /// Inserts or replaces the entries derived from `object`.
    pub fn add(&self, object: CacheObject<'_>) {
        let mut state = self.write("add");
        self.add_locked(&mut state, object);
    }

    /// Adds several objects in one critical section.
    pub fn add_all<'a>(&self, objects: impl IntoIterator<Item = CacheObject<'a>>) {
        let mut state = self.write("add_all");
        for object in objects {
            self.add_locked(&mut state, object);
        }
    }

    fn add_locked(&self, state: &mut CacheState, object: CacheObject<'_>) {
        match object {
            CacheObject::Domain(domain) => {
                state.domains.insert(domain.name.clone(), domain.clone());
            }
            CacheObject::Host(host) => {
                state.hosts.insert(host.name.clone(), host.clone());
            }
            CacheObject::Content(node) => {
                state.evict_content(node);
                if node.is_latest() && node.is_published() {
                    state.parents.insert(node.id, node.parent);
                    if node.category == self.tracked {
                        state.contents.insert(node.id, Arc::new(node.clone()));
                    }
                    trace!(id = %node.id, parent = %node.parent, "cached content link");
                }
            }
            CacheObject::Permissions(set) => {
                state.permissions.insert(
                    PermissionKey::from(set.reference()),
                    Arc::new(set.clone()),
                );
            }
        }
    }

    /// Stores the site list of a domain. Empty lists are not cached.
    pub fn add_sites(&self, domain: &DomainName, sites: &[ContentNode]) {
        if sites.is_empty() {
            return;
        }
        let list = sites.iter().cloned().map(Arc::new).collect();
        self.write("add_sites").sites.insert(domain.clone(), list);
    }

    /// Like [`ContentCache::add_sites`], guarded by an eviction counter.
    pub fn add_sites_if_current(&self, domain: &DomainName, sites: &[ContentNode], generation: u64) -> bool {
        if sites.is_empty() {
            return false;
        }
        let mut state = self.write("add_sites_if_current");
        if state.generation != generation {
            return false;
        }
        let list = sites.iter().cloned().map(Arc::new).collect();
        state.sites.insert(domain.clone(), list);
        true
    }

    /// Evicts the entries derived from `object`.
    ///
    /// Removing a domain flushes everything but the other domains, since
    /// permission inheritance and site lookup both depend on it.
    pub fn remove(&self, object: CacheObject<'_>) {
        let mut state = self.write("remove");
        state.generation = state.generation.wrapping_add(1);
        match object {
            CacheObject::Domain(domain) => {
                state.domains.remove(&domain.name);
                state.flush_dependents();
                debug!(domain = %domain.name, "flushed cache after domain change");
            }
            CacheObject::Host(host) => {
                state.hosts.remove(&host.name);
            }
            CacheObject::Content(node) => state.evict_content(node),
            CacheObject::Permissions(set) => {
                state
                    .permissions
                    .remove(&PermissionKey::from(set.reference()));
            }
        }
    }

    /// Flushes every entry.
    pub fn remove_all(&self) {
        self.write("remove_all").clear();
        debug!("flushed content cache");
    }

    /// Returns a cached domain.
    pub fn domain(&self, name: &str) -> Option<Domain> {
        self.read("domain").domains.get(name).cloned()
    }

    /// Returns every cached domain, sorted by name.
    pub fn all_domains(&self) -> Vec<Domain> {
        let mut domains: Vec<Domain> = self.read("all_domains").domains.values().cloned().collect();
        domains.sort_by(|left, right| left.name.cmp(&right.name));
        domains
    }

    /// Returns a cached host.
    pub fn host(&self, name: &str) -> Option<Host> {
        self.read("host").hosts.get(name).cloned()
    }

    /// Returns whether any host is cached.
    pub fn has_hosts(&self) -> bool {
        !self.read("has_hosts").hosts.is_empty()
    }

    /// Returns the domain a host name maps to.
    pub fn host_domain(&self, name: &str) -> Option<Domain> {
        let state = self.read("host_domain");
        state
            .hosts
            .get(name)
            .and_then(|host| state.domains.get(&host.domain))
            .cloned()
    }

    /// Returns the cached site list of a domain.
    pub fn sites(&self, domain: &DomainName) -> Option<Vec<Arc<ContentNode>>> {
        self.read("sites").sites.get(domain).cloned()
    }

    /// Returns the cached parent of a latest published object.
    pub fn parent(&self, id: ContentId) -> Option<ContentId> {
        self.read("parent").parents.get(&id).copied()
    }

    /// Returns a cached body of the tracked category.
    pub fn content(&self, id: ContentId) -> Option<Arc<ContentNode>> {
        self.read("content").contents.get(&id).cloned()
    }

    /// Returns the set recorded for exactly `reference`, without inheritance.
    ///
    /// `None` is a miss; `Some` of an empty set is a hit meaning "inherit".
    pub fn permissions(&self, reference: &PermissionRef) -> Option<Arc<PermissionSet>> {
        self.read("permissions")
            .permissions
            .get(&PermissionKey::from(reference))
            .cloned()
    }

    /// Resolves the effective set of a content object from cached entries.
    ///
    /// Walks own set, then cached parent links, then the domain set. Any
    /// missing hop yields `Ok(None)` so the caller falls back to the store.
    pub fn inherited_permissions(
        &self,
        domain: &DomainName,
        id: ContentId,
        max_depth: usize,
    ) -> Result<Option<Arc<PermissionSet>>> {
        let state = self.read("inherited_permissions");
        let mut visited = HashSet::new();
        let mut current = id;
        loop {
            if current.is_root() {
                let key = PermissionKey::Domain(domain.clone());
                return Ok(state.permissions.get(&key).cloned());
            }
            let Some(set) = state.permissions.get(&PermissionKey::Content(current)) else {
                return Ok(None);
            };
            if !set.is_empty() {
                return Ok(Some(Arc::clone(set)));
            }
            let Some(parent) = state.parents.get(&current).copied() else {
                return Ok(None);
            };
            if !visited.insert(current) || parent == current {
                return Err(Error::ParentCycle {
                    domain: domain.clone(),
                    id: current,
                });
            }
            if visited.len() > max_depth {
                return Err(Error::ParentDepthExceeded {
                    domain: domain.clone(),
                    id: current,
                    max_depth,
                });
            }
            current = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentStatus;
    use crate::permission::PermissionRule;

    fn domain_name() -> DomainName {
        DomainName::try_from("EXAMPLE").unwrap()
    }

    fn published(id: u32, parent: u32, category: Category) -> ContentNode {
        let mut node = ContentNode::new(domain_name(), category, format!("n{id}"))
            .with_parent(ContentId::new(parent))
            .with_status(ContentStatus::LATEST.union(ContentStatus::PUBLISHED));
        node.id = ContentId::new(id);
        node.revision = 1;
        node
    }

    fn set(reference: PermissionRef, rules: Vec<PermissionRule>) -> PermissionSet {
        PermissionSet::with_rules(reference, rules)
    }

    fn content_ref(id: u32) -> PermissionRef {
        PermissionRef::for_content(domain_name(), ContentId::new(id))
    }

    #[test]
    fn add_should_record_parent_link_only_for_latest_published() {
        let cache = ContentCache::new();
        let node = published(5, 2, Category::Folder);
        cache.add(CacheObject::Content(&node));
        assert_eq!(cache.parent(ContentId::new(5)), Some(ContentId::new(2)));
        assert!(cache.is_cached(CacheObject::Content(&node)));

        let work = published(6, 2, Category::Folder).with_status(ContentStatus::LATEST);
        cache.add(CacheObject::Content(&work));
        assert_eq!(cache.parent(ContentId::new(6)), None);
        assert!(!cache.is_cached(CacheObject::Content(&work)));
    }

    #[test]
    fn add_should_cache_body_of_tracked_category_only() {
        let cache = ContentCache::new();
        let template = published(3, 0, Category::Template);
        let folder = published(4, 0, Category::Folder);
        cache.add_all([
            CacheObject::Content(&template),
            CacheObject::Content(&folder),
        ]);
        assert!(cache.content(ContentId::new(3)).is_some());
        assert!(cache.content(ContentId::new(4)).is_none());
    }

    #[test]
    fn site_change_should_evict_domain_site_list() {
        let cache = ContentCache::new();
        let site = published(1, 0, Category::Site);
        cache.add_sites(&domain_name(), std::slice::from_ref(&site));
        assert!(cache.sites(&domain_name()).is_some());

        cache.add(CacheObject::Content(&site));
        assert!(cache.sites(&domain_name()).is_none());
    }

    #[test]
    fn add_after_concurrent_eviction_should_be_skipped() {
        let cache = ContentCache::new();
        let stale = set(content_ref(4), vec![PermissionRule::anyone().read(true)]);
        let generation = cache.generation();

        // rules rewritten while the old set was being loaded
        cache.remove(CacheObject::Permissions(&stale));
        assert!(!cache.add_if_current(CacheObject::Permissions(&stale), generation));
        assert!(cache.permissions(&content_ref(4)).is_none());

        let site = published(1, 0, Category::Site);
        assert!(!cache.add_sites_if_current(&domain_name(), std::slice::from_ref(&site), generation));
        assert!(cache.sites(&domain_name()).is_none());

        let current = cache.generation();
        assert!(cache.add_if_current(CacheObject::Permissions(&stale), current));
        assert!(cache.permissions(&content_ref(4)).is_some());
    }

    #[test]
    fn empty_site_list_should_not_be_cached() {
        let cache = ContentCache::new();
        cache.add_sites(&domain_name(), &[]);
        assert!(cache.sites(&domain_name()).is_none());
    }

    #[test]
    fn inherited_lookup_should_distinguish_miss_from_empty() {
        let cache = ContentCache::new();
        let domain_set = set(
            PermissionRef::Domain(domain_name()),
            vec![PermissionRule::anyone().read(true)],
        );
        cache.add(CacheObject::Permissions(&domain_set));
        cache.add(CacheObject::Permissions(&set(content_ref(9), Vec::new())));

        // own set empty, parent link unknown
        let miss = cache
            .inherited_permissions(&domain_name(), ContentId::new(9), 16)
            .unwrap();
        assert!(miss.is_none());

        let node = published(9, 0, Category::Folder);
        cache.add(CacheObject::Content(&node));
        let hit = cache
            .inherited_permissions(&domain_name(), ContentId::new(9), 16)
            .unwrap()
            .expect("hit");
        assert_eq!(hit.reference(), &PermissionRef::Domain(domain_name()));
    }

    #[test]
    fn inherited_lookup_should_stop_at_first_non_empty_set() {
        let cache = ContentCache::new();
        let parent_set = set(content_ref(2), vec![PermissionRule::anyone().write(true)]);
        cache.add_all([
            CacheObject::Content(&published(3, 2, Category::Page)),
            CacheObject::Permissions(&set(content_ref(3), Vec::new())),
            CacheObject::Permissions(&parent_set),
        ]);
        let resolved = cache
            .inherited_permissions(&domain_name(), ContentId::new(3), 16)
            .unwrap()
            .expect("hit");
        assert_eq!(*resolved, parent_set);
    }

    #[test]
    fn inherited_lookup_should_report_cycles() {
        let cache = ContentCache::new();
        cache.add_all([
            CacheObject::Content(&published(3, 4, Category::Folder)),
            CacheObject::Content(&published(4, 3, Category::Folder)),
            CacheObject::Permissions(&set(content_ref(3), Vec::new())),
            CacheObject::Permissions(&set(content_ref(4), Vec::new())),
        ]);
        let result = cache.inherited_permissions(&domain_name(), ContentId::new(3), 16);
        assert!(matches!(result, Err(Error::ParentCycle { .. })));
    }

    #[test]
    fn domain_removal_should_flush_dependents() {
        let cache = ContentCache::new();
        let domain = Domain::new(domain_name());
        let other = Domain::new(DomainName::try_from("OTHER").unwrap());
        let host = Host::new(domain_name(), HostName::try_from("www.example.org").unwrap());
        let site = published(1, 0, Category::Site);
        cache.add_all([
            CacheObject::Domain(&domain),
            CacheObject::Domain(&other),
            CacheObject::Host(&host),
            CacheObject::Content(&published(2, 0, Category::Template)),
            CacheObject::Permissions(&set(content_ref(2), Vec::new())),
        ]);
        cache.add_sites(&domain_name(), &[site]);

        cache.remove(CacheObject::Domain(&domain));

        assert!(cache.domain("EXAMPLE").is_none());
        assert!(cache.domain("OTHER").is_some());
        assert!(cache.host("www.example.org").is_none());
        assert!(cache.sites(&domain_name()).is_none());
        assert!(cache.parent(ContentId::new(2)).is_none());
        assert!(cache.content(ContentId::new(2)).is_none());
        assert!(cache.permissions(&content_ref(2)).is_none());
    }

    #[test]
    fn host_domain_should_resolve_through_cached_domain() {
        let cache = ContentCache::new();
        let domain = Domain::new(domain_name());
        let host = Host::new(domain_name(), HostName::try_from("www.example.org").unwrap());
        cache.add_all([CacheObject::Domain(&domain), CacheObject::Host(&host)]);
        assert_eq!(cache.host_domain("www.example.org"), Some(domain));
        assert_eq!(cache.host_domain("unknown.org"), None);
    }

    #[test]
    fn content_removal_should_only_evict_own_keys() {
        let cache = ContentCache::new();
        let node = published(7, 0, Category::Template);
        let permissions = set(content_ref(7), Vec::new());
        cache.add_all([
            CacheObject::Content(&node),
            CacheObject::Permissions(&permissions),
        ]);
        cache.remove(CacheObject::Content(&node));
        assert!(cache.parent(ContentId::new(7)).is_none());
        assert!(cache.content(ContentId::new(7)).is_none());
        assert!(cache.permissions(&content_ref(7)).is_some());
    }
}
