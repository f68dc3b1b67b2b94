//! Access resolution over domains, content trees and their satellites.

use crate::cache::{CacheObject, ContentCache};
use crate::content::{ContentId, ContentNode};
use crate::error::{Error, Result};
use crate::model::{Group, Host, Lock, User};
use crate::permission::{AccessLevel, PermissionRef, PermissionSet};
use crate::store::Store;
use crate::types::DomainName;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Default bound on the parent chain walked during inheritance.
pub const DEFAULT_MAX_PARENT_DEPTH: usize = 64;

/// Object an access check is performed against.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Domain(&'a DomainName),
    Host(&'a Host),
    Content(&'a ContentNode),
    /// A permission set, identified by the object it is bound to.
    Permissions(&'a PermissionRef),
    Lock(&'a Lock),
    User(&'a User),
    Group(&'a Group),
}

impl fmt::Display for Resource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(name) => write!(f, "domain {name}"),
            Self::Host(host) => write!(f, "{host}"),
            Self::Content(node) => write!(f, "{node}"),
            Self::Permissions(reference) => write!(f, "permissions of {reference}"),
            Self::Lock(lock) => write!(f, "{lock}"),
            Self::User(user) => write!(f, "{user}"),
            Self::Group(group) => write!(f, "{group}"),
        }
    }
}

/// Evaluates access levels for users against resources.
///
/// Permission sets are read through the shared [`ContentCache`] and loaded
/// from the store on a miss. Superusers are granted every level.
#[derive(Debug)]
pub struct AccessResolver<S> {
    store: Arc<S>,
    cache: Arc<ContentCache>,
    admin: bool,
    max_depth: usize,
}

impl<S> Clone for AccessResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            admin: self.admin,
            max_depth: self.max_depth,
        }
    }
}

impl<S> AccessResolver<S> {
    /// Creates a public-mode resolver.
    pub fn new(store: Arc<S>, cache: Arc<ContentCache>) -> Self {
        Self {
            store,
            cache,
            admin: false,
            max_depth: DEFAULT_MAX_PARENT_DEPTH,
        }
    }

    /// Resolves parents from work revisions instead of cached published links.
    pub fn admin(mut self, on: bool) -> Self {
        self.admin = on;
        self
    }

    /// Sets the maximum parent chain depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl<S> AccessResolver<S>
where
    S: Store,
{
    /// Returns whether `user` holds `level` on `resource`.
    pub async fn has_access(
        &self,
        user: Option<&User>,
        resource: Resource<'_>,
        level: AccessLevel,
    ) -> Result<bool> {
        if user.is_some_and(User::is_superuser) {
            return Ok(true);
        }
        match resource {
            Resource::Domain(domain) => Ok(self.domain_permissions(domain).await?.allows(user, level)),
            Resource::Host(host) => match level {
                AccessLevel::Read | AccessLevel::Write => {
                    Ok(self.domain_permissions(&host.domain).await?.allows(user, level))
                }
                AccessLevel::Publish | AccessLevel::Admin => Ok(false),
            },
            Resource::Content(node) => {
                let set = self.content_permissions(node).await?;
                Ok(set.allows(user, level))
            }
            Resource::Permissions(reference) => {
                let set = self
                    .effective_permissions(reference.domain(), reference.content_id())
                    .await?;
                Ok(set.allows(user, AccessLevel::Admin))
            }
            Resource::Lock(lock) => match level {
                AccessLevel::Read | AccessLevel::Write => {
                    let set = self.effective_permissions(&lock.domain, lock.content).await?;
                    Ok(set.allows(user, level))
                }
                AccessLevel::Publish | AccessLevel::Admin => Ok(false),
            },
            Resource::User(target) => match level {
                AccessLevel::Read => Ok(true),
                AccessLevel::Write => {
                    if user.is_some_and(|user| user.same_identity(target)) {
                        return Ok(true);
                    }
                    match &target.domain {
                        Some(domain) => self.is_domain_admin(user, domain).await,
                        None => Ok(false),
                    }
                }
                AccessLevel::Publish | AccessLevel::Admin => Ok(false),
            },
            Resource::Group(group) => match level {
                AccessLevel::Read => Ok(true),
                AccessLevel::Write => self.is_domain_admin(user, &group.domain).await,
                AccessLevel::Publish | AccessLevel::Admin => Ok(false),
            },
        }
    }

    /// Shorthand for [`AccessResolver::has_access`] with [`AccessLevel::Read`].
    pub async fn has_read_access(&self, user: Option<&User>, resource: Resource<'_>) -> Result<bool> {
        self.has_access(user, resource, AccessLevel::Read).await
    }

    /// Shorthand for [`AccessLevel::Write`].
    pub async fn has_write_access(&self, user: Option<&User>, resource: Resource<'_>) -> Result<bool> {
        self.has_access(user, resource, AccessLevel::Write).await
    }

    /// Shorthand for [`AccessLevel::Publish`].
    pub async fn has_publish_access(
        &self,
        user: Option<&User>,
        resource: Resource<'_>,
    ) -> Result<bool> {
        self.has_access(user, resource, AccessLevel::Publish).await
    }

    /// Shorthand for [`AccessLevel::Admin`].
    pub async fn has_admin_access(&self, user: Option<&User>, resource: Resource<'_>) -> Result<bool> {
        self.has_access(user, resource, AccessLevel::Admin).await
    }

    async fn is_domain_admin(&self, user: Option<&User>, domain: &DomainName) -> Result<bool> {
        Ok(self
            .domain_permissions(domain)
            .await?
            .allows(user, AccessLevel::Admin))
    }

    /// Fails with [`Error::AccessDenied`] unless `user` may read `resource`.
    pub async fn check_read(&self, user: Option<&User>, resource: Resource<'_>) -> Result<()> {
        self.require(user, resource, AccessLevel::Read, "read").await
    }

    /// Checks the access needed to create `resource`.
    ///
    /// Published content revisions need publish access, work revisions
    /// write access. Domains and hosts can only be created by superusers.
    pub async fn check_insert(&self, user: Option<&User>, resource: Resource<'_>) -> Result<()> {
        match resource {
            Resource::Domain(_) | Resource::Host(_) => require_superuser(user, "insert", resource),
            Resource::Content(node) => {
                let level = content_write_level(node);
                self.require(user, resource, level, "insert").await
            }
            Resource::Permissions(_) => {
                self.require(user, resource, AccessLevel::Admin, "insert").await
            }
            Resource::Lock(_) | Resource::User(_) | Resource::Group(_) => {
                self.require(user, resource, AccessLevel::Write, "insert").await
            }
        }
    }

    /// Checks the access needed to modify `resource`. Locks are immutable.
    pub async fn check_update(&self, user: Option<&User>, resource: Resource<'_>) -> Result<()> {
        match resource {
            Resource::Domain(_) | Resource::Host(_) => require_superuser(user, "update", resource),
            Resource::Content(node) => {
                let level = content_write_level(node);
                self.require(user, resource, level, "update").await
            }
            Resource::Permissions(_) => {
                self.require(user, resource, AccessLevel::Admin, "update").await
            }
            Resource::Lock(lock) => Err(Error::UnsupportedOperation(format!(
                "cannot update {lock}"
            ))),
            Resource::User(_) | Resource::Group(_) => {
                self.require(user, resource, AccessLevel::Write, "update").await
            }
        }
    }

    /// Checks the access needed to remove `resource`.
    pub async fn check_delete(&self, user: Option<&User>, resource: Resource<'_>) -> Result<()> {
        match resource {
            Resource::Domain(_) | Resource::Host(_) => require_superuser(user, "delete", resource),
            Resource::Content(_) => {
                self.require(user, resource, AccessLevel::Publish, "delete").await
            }
            Resource::Permissions(_) => {
                self.require(user, resource, AccessLevel::Admin, "delete").await
            }
            Resource::Lock(_) | Resource::User(_) | Resource::Group(_) => {
                self.require(user, resource, AccessLevel::Write, "delete").await
            }
        }
    }

    /// Restoring from a backup bypasses the normal checks and needs a superuser.
    pub fn check_restore(&self, user: Option<&User>, resource: Resource<'_>) -> Result<()> {
        require_superuser(user, "restore", resource)
    }

    async fn require(
        &self,
        user: Option<&User>,
        resource: Resource<'_>,
        level: AccessLevel,
        operation: &'static str,
    ) -> Result<()> {
        if self.has_access(user, resource, level).await? {
            return Ok(());
        }
        warn!(
            user = user.map(|user| user.name.as_str()).unwrap_or("<anonymous>"),
            operation,
            level = %level,
            target = %resource,
            "access denied"
        );
        Err(Error::access_denied(user, operation, resource))
    }

    /// Returns the permission set recorded for exactly `reference`.
    pub async fn direct_permissions(&self, reference: &PermissionRef) -> Result<Arc<PermissionSet>> {
        if let Some(set) = self.cache.permissions(reference) {
            return Ok(set);
        }
        let generation = self.cache.generation();
        let rules = self
            .store
            .find_permissions(reference)
            .await
            .map_err(Error::from)?;
        let set = PermissionSet::with_rules(reference.clone(), rules);
        self.cache
            .add_if_current(CacheObject::Permissions(&set), generation);
        Ok(Arc::new(set))
    }

    /// Returns the permission set of a domain. An empty set denies everything.
    pub async fn domain_permissions(&self, domain: &DomainName) -> Result<Arc<PermissionSet>> {
        self.direct_permissions(&PermissionRef::Domain(domain.clone()))
            .await
    }

    /// Resolves the set that governs content `id`.
    ///
    /// Returns the first non-empty set found walking from the object
    /// through its parents, or the domain set at the top. The walk is
    /// bounded and fails on cyclic parent chains.
    pub async fn effective_permissions(
        &self,
        domain: &DomainName,
        id: ContentId,
    ) -> Result<Arc<PermissionSet>> {
        if !self.admin
            && let Some(set) = self
                .cache
                .inherited_permissions(domain, id, self.max_depth)?
        {
            trace!(%domain, %id, reference = %set.reference(), "permissions resolved from cache");
            return Ok(set);
        }

        let mut visited = HashSet::new();
        let mut current = id;
        loop {
            if current.is_root() {
                return self.domain_permissions(domain).await;
            }
            let reference = PermissionRef::for_content(domain.clone(), current);
            let set = self.direct_permissions(&reference).await?;
            if !set.is_empty() {
                trace!(%domain, %id, %reference, "permissions resolved");
                return Ok(set);
            }
            if !visited.insert(current) {
                return Err(Error::ParentCycle {
                    domain: domain.clone(),
                    id: current,
                });
            }
            if visited.len() > self.max_depth {
                return Err(Error::ParentDepthExceeded {
                    domain: domain.clone(),
                    id: current,
                    max_depth: self.max_depth,
                });
            }
            let Some(parent) = self.parent_of(current).await? else {
                // dangling parent pointer: fall back to the domain
                return self.domain_permissions(domain).await;
            };
            if parent == current {
                return Err(Error::ParentCycle {
                    domain: domain.clone(),
                    id: current,
                });
            }
            current = parent;
        }
    }

    /// Resolves the set governing `node` as given, not as stored.
    ///
    /// Past the object's own set the walk continues from `node.parent`, so
    /// a node being moved is checked against its new location.
    async fn content_permissions(&self, node: &ContentNode) -> Result<Arc<PermissionSet>> {
        if !node.id.is_root() {
            let reference = PermissionRef::for_content(node.domain.clone(), node.id);
            let own = self.direct_permissions(&reference).await?;
            if !own.is_empty() {
                return Ok(own);
            }
            if node.parent == node.id {
                return Err(Error::ParentCycle {
                    domain: node.domain.clone(),
                    id: node.id,
                });
            }
        }
        self.effective_permissions(&node.domain, node.parent).await
    }

    async fn parent_of(&self, id: ContentId) -> Result<Option<ContentId>> {
        if !self.admin
            && let Some(parent) = self.cache.parent(id)
        {
            return Ok(Some(parent));
        }
        let generation = self.cache.generation();
        let mut node = self
            .store
            .find_content_by_max_revision(id, self.admin)
            .await
            .map_err(Error::from)?;
        if node.is_none() && !self.admin {
            // never published: only the work revision knows the parent
            node = self
                .store
                .find_content_by_max_revision(id, true)
                .await
                .map_err(Error::from)?;
        }
        let Some(node) = node else {
            return Ok(None);
        };
        // tracked bodies are only cached with their attributes loaded
        if node.category != self.cache.tracked_category() {
            self.cache
                .add_if_current(CacheObject::Content(&node), generation);
        }
        Ok(Some(node.parent))
    }
}

fn content_write_level(node: &ContentNode) -> AccessLevel {
    if node.is_work_revision() {
        AccessLevel::Write
    } else {
        AccessLevel::Publish
    }
}

fn require_superuser(
    user: Option<&User>,
    operation: &'static str,
    resource: Resource<'_>,
) -> Result<()> {
    if user.is_some_and(User::is_superuser) {
        return Ok(());
    }
    warn!(
        user = user.map(|user| user.name.as_str()).unwrap_or("<anonymous>"),
        operation,
        target = %resource,
        "superuser required"
    );
    Err(Error::access_denied(user, operation, resource))
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use super::*;
    use crate::content::{Category, ContentStatus};
    use crate::memory_store::MemoryStore;
    use crate::permission::PermissionRule;
    use crate::store::{ContentStore, PermissionStore};
    use crate::types::{GroupName, UserName};
    use futures::executor::block_on;

    fn domain() -> DomainName {
        DomainName::try_from("EXAMPLE").unwrap()
    }

    fn editors() -> GroupName {
        GroupName::try_from("editors").unwrap()
    }

    fn editor() -> User {
        User::new(domain(), UserName::try_from("alice").unwrap()).with_group(editors())
    }

    fn outsider() -> User {
        User::new(domain(), UserName::try_from("bob").unwrap())
    }

    fn resolver(store: &MemoryStore) -> AccessResolver<MemoryStore> {
        AccessResolver::new(Arc::new(store.clone()), Arc::new(ContentCache::new()))
    }

    fn insert_node(store: &MemoryStore, id: u32, parent: u32, category: Category) -> ContentNode {
        let mut node = ContentNode::new(domain(), category, format!("n{id}"))
            .with_parent(ContentId::new(parent));
        node.id = ContentId::new(id);
        node.revision = 1;
        block_on(store.insert_content(&node)).unwrap();
        block_on(store.update_status(node.id)).unwrap();
        node.with_status(ContentStatus::LATEST.union(ContentStatus::PUBLISHED))
    }

    fn grant(store: &MemoryStore, reference: PermissionRef, rules: Vec<PermissionRule>) {
        block_on(store.write_permissions(&reference, &rules)).unwrap();
    }

    #[test]
    fn empty_content_set_should_inherit_domain_set() {
        let store = MemoryStore::new();
        let node = insert_node(&store, 10, 0, Category::Folder);
        grant(
            &store,
            PermissionRef::Domain(domain()),
            vec![PermissionRule::for_group(editors()).read(true)],
        );
        let resolver = resolver(&store);

        let content = block_on(resolver.has_read_access(Some(&editor()), Resource::Content(&node)));
        let domain_name = domain();
        let direct = block_on(resolver.has_read_access(Some(&editor()), Resource::Domain(&domain_name)));
        assert!(content.unwrap());
        assert!(direct.unwrap());
        assert!(!block_on(resolver.has_read_access(Some(&outsider()), Resource::Content(&node))).unwrap());
    }

    #[test]
    fn non_empty_content_set_should_not_fall_through() {
        let store = MemoryStore::new();
        let node = insert_node(&store, 10, 0, Category::Folder);
        grant(
            &store,
            PermissionRef::Domain(domain()),
            vec![PermissionRule::for_group(editors()).read(true)],
        );
        grant(
            &store,
            PermissionRef::for_content(domain(), node.id),
            vec![PermissionRule::for_user(UserName::try_from("carol").unwrap()).read(true)],
        );
        let resolver = resolver(&store);
        assert!(!block_on(resolver.has_read_access(Some(&editor()), Resource::Content(&node))).unwrap());
    }

    #[test]
    fn empty_domain_set_should_deny() {
        let store = MemoryStore::new();
        let node = insert_node(&store, 10, 0, Category::Folder);
        let resolver = resolver(&store);
        assert!(!block_on(resolver.has_read_access(None, Resource::Content(&node))).unwrap());
    }

    #[test]
    fn superuser_should_bypass_rules() {
        let store = MemoryStore::new();
        let node = insert_node(&store, 10, 0, Category::Folder);
        let root = User::superuser(UserName::try_from("root").unwrap());
        let resolver = resolver(&store);
        assert!(block_on(resolver.has_admin_access(Some(&root), Resource::Content(&node))).unwrap());
        assert!(resolver.check_restore(Some(&root), Resource::Content(&node)).is_ok());
    }

    #[test]
    fn walk_should_use_nearest_ancestor_set() {
        let store = MemoryStore::new();
        insert_node(&store, 7, 0, Category::Section);
        let page = insert_node(&store, 42, 7, Category::Page);
        grant(
            &store,
            PermissionRef::for_content(domain(), ContentId::new(7)),
            vec![PermissionRule::for_group(editors()).read(true)],
        );
        let resolver = resolver(&store);
        assert!(block_on(resolver.has_read_access(Some(&editor()), Resource::Content(&page))).unwrap());
        assert!(!block_on(resolver.has_write_access(Some(&editor()), Resource::Content(&page))).unwrap());

        // second resolution is served from the cached links
        let reads = store.permission_reads();
        assert!(block_on(resolver.has_read_access(Some(&editor()), Resource::Content(&page))).unwrap());
        assert_eq!(store.permission_reads(), reads);
    }

    #[test]
    fn public_walk_should_pass_through_unpublished_ancestor() {
        let store = MemoryStore::new();
        insert_node(&store, 7, 0, Category::Section);
        let mut draft = ContentNode::new(domain(), Category::Folder, "draft")
            .with_parent(ContentId::new(7));
        draft.id = ContentId::new(20);
        block_on(store.insert_content(&draft)).unwrap();
        block_on(store.update_status(draft.id)).unwrap();
        let page = insert_node(&store, 21, 20, Category::Page);
        grant(
            &store,
            PermissionRef::for_content(domain(), ContentId::new(7)),
            vec![PermissionRule::for_group(editors()).read(true)],
        );
        let resolver = resolver(&store);
        assert!(block_on(resolver.has_read_access(Some(&editor()), Resource::Content(&page))).unwrap());
        assert!(!block_on(resolver.has_read_access(Some(&outsider()), Resource::Content(&page))).unwrap());
    }

    #[test]
    fn moved_node_should_be_checked_at_new_parent() {
        let store = MemoryStore::new();
        insert_node(&store, 2, 0, Category::Section);
        insert_node(&store, 3, 0, Category::Section);
        let mut node = insert_node(&store, 4, 2, Category::Section);
        grant(
            &store,
            PermissionRef::for_content(domain(), ContentId::new(2)),
            vec![PermissionRule::for_group(editors()).read(true).write(true).publish(true)],
        );
        grant(
            &store,
            PermissionRef::for_content(domain(), ContentId::new(3)),
            vec![PermissionRule::for_user(UserName::try_from("carol").unwrap()).read(true).write(true)],
        );
        let resolver = resolver(&store);
        assert!(block_on(resolver.check_update(Some(&editor()), Resource::Content(&node))).is_ok());

        node.parent = ContentId::new(3);
        let err = block_on(resolver.check_update(Some(&editor()), Resource::Content(&node)))
            .expect_err("must deny");
        assert!(matches!(err, Error::AccessDenied { operation: "update", .. }));
    }

    #[test]
    fn failed_permission_read_should_not_be_cached() {
        let store = MemoryStore::new();
        let reference = PermissionRef::Domain(domain());
        grant(&store, reference.clone(), vec![PermissionRule::anyone().read(true)]);
        let resolver = resolver(&store);

        store.set_failing(true);
        let result = block_on(resolver.direct_permissions(&reference));
        assert!(matches!(result, Err(Error::Store(_))));
        assert!(resolver.cache.permissions(&reference).is_none());

        store.set_failing(false);
        let set = block_on(resolver.direct_permissions(&reference)).unwrap();
        assert!(!set.is_empty());
        assert!(resolver.cache.permissions(&reference).is_some());
    }

    #[test]
    fn cyclic_parents_should_fail() {
        let store = MemoryStore::new();
        insert_node(&store, 3, 4, Category::Folder);
        let node = insert_node(&store, 4, 3, Category::Folder);
        let resolver = resolver(&store);
        let result = block_on(resolver.has_read_access(Some(&editor()), Resource::Content(&node)));
        assert!(matches!(result, Err(Error::ParentCycle { .. })));
    }

    #[test]
    fn deep_chains_should_fail_past_max_depth() {
        let store = MemoryStore::new();
        let mut last = insert_node(&store, 1, 0, Category::Folder);
        for id in 2..=6 {
            last = insert_node(&store, id, id - 1, Category::Folder);
        }
        let resolver = resolver(&store).max_depth(3);
        let result = block_on(resolver.has_read_access(None, Resource::Content(&last)));
        assert!(matches!(result, Err(Error::ParentDepthExceeded { max_depth: 3, .. })));
    }

    #[test]
    fn host_should_map_to_domain_read_write_only() {
        let store = MemoryStore::new();
        grant(
            &store,
            PermissionRef::Domain(domain()),
            vec![PermissionRule::anyone().read(true).write(true).publish(true)],
        );
        let host = Host::new(domain(), crate::types::HostName::try_from("www.example.org").unwrap());
        let resolver = resolver(&store);
        assert!(block_on(resolver.has_write_access(None, Resource::Host(&host))).unwrap());
        assert!(!block_on(resolver.has_publish_access(None, Resource::Host(&host))).unwrap());
        assert!(block_on(resolver.check_insert(Some(&editor()), Resource::Host(&host))).is_err());
    }

    #[test]
    fn permissions_should_need_admin_on_reference() {
        let store = MemoryStore::new();
        grant(
            &store,
            PermissionRef::Domain(domain()),
            vec![
                PermissionRule::anyone().read(true).write(true),
                PermissionRule::for_group(editors()).admin(true),
            ],
        );
        let reference = PermissionRef::for_content(domain(), ContentId::new(99));
        let resolver = resolver(&store);
        assert!(block_on(resolver.has_read_access(Some(&editor()), Resource::Permissions(&reference))).unwrap());
        assert!(!block_on(resolver.has_read_access(Some(&outsider()), Resource::Permissions(&reference))).unwrap());
    }

    #[test]
    fn users_should_be_readable_and_self_writable() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let target = editor();
        assert!(block_on(resolver.has_read_access(None, Resource::User(&target))).unwrap());
        assert!(block_on(resolver.has_write_access(Some(&target), Resource::User(&target))).unwrap());
        assert!(!block_on(resolver.has_write_access(Some(&outsider()), Resource::User(&target))).unwrap());

        grant(
            &store,
            PermissionRef::Domain(domain()),
            vec![PermissionRule::for_user(outsider().name).admin(true)],
        );
        let resolver = self::resolver(&store);
        assert!(block_on(resolver.has_write_access(Some(&outsider()), Resource::User(&target))).unwrap());
        let group = Group::new(domain(), editors());
        assert!(block_on(resolver.has_write_access(Some(&outsider()), Resource::Group(&group))).unwrap());
        assert!(!block_on(resolver.has_write_access(Some(&target), Resource::Group(&group))).unwrap());
    }

    #[test]
    fn published_revision_should_need_publish_to_insert() {
        let store = MemoryStore::new();
        grant(
            &store,
            PermissionRef::Domain(domain()),
            vec![PermissionRule::for_group(editors()).read(true).write(true)],
        );
        let resolver = resolver(&store);
        let mut node = ContentNode::new(domain(), Category::Folder, "docs");
        assert!(block_on(resolver.check_insert(Some(&editor()), Resource::Content(&node))).is_ok());

        node.revision = 1;
        let err = block_on(resolver.check_insert(Some(&editor()), Resource::Content(&node)))
            .expect_err("must deny");
        assert!(matches!(err, Error::AccessDenied { operation: "insert", .. }));
        assert!(block_on(resolver.check_delete(Some(&editor()), Resource::Content(&node))).is_err());
    }

    #[test]
    fn locks_should_not_be_updatable() {
        let store = MemoryStore::new();
        let resolver = resolver(&store);
        let lock = Lock {
            domain: domain(),
            content: ContentId::new(5),
            user: editor().name,
            acquired_at: time::OffsetDateTime::now_utc(),
        };
        let result = block_on(resolver.check_update(Some(&editor()), Resource::Lock(&lock)));
        assert!(matches!(result, Err(Error::UnsupportedOperation(_))));
    }
}
