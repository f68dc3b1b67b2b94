use crate::access::{AccessResolver, DEFAULT_MAX_PARENT_DEPTH, Resource};
use crate::cache::{CacheObject, ContentCache};
use crate::content::{Category, ContentId, ContentNode, WORK_REVISION};
use crate::error::{Error, Result};
use crate::model::{Domain, Group, Host, Lock, User};
use crate::permission::{PermissionRef, PermissionSet};
use crate::query::ContentSelector;
use crate::store::Store;
use crate::types::{DomainName, GroupName, HostName, UserName};
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

/// Content facade combining revision resolution, access checks and caching.
///
/// In admin mode work revisions and offline objects are visible and the
/// tracked-content cache is never consulted for reads. Public mode only
/// returns published objects inside their online window.
#[derive(Debug)]
pub struct ContentManager<S> {
    store: Arc<S>,
    cache: Arc<ContentCache>,
    access: AccessResolver<S>,
    admin: bool,
    max_parent_depth: usize,
}

/// Builder for [`ContentManager`].
pub struct ContentManagerBuilder<S> {
    store: Arc<S>,
    cache: Option<Arc<ContentCache>>,
    admin: bool,
    max_parent_depth: usize,
}

impl<S> ContentManagerBuilder<S> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Creates a builder around a store that is already shared.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            cache: None,
            admin: false,
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
        }
    }

    /// Enables or disables admin mode.
    pub fn admin(mut self, on: bool) -> Self {
        self.admin = on;
        self
    }

    /// Shares a cache with other managers. A private cache is created otherwise.
    pub fn cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets maximum parent chain depth.
    pub fn max_parent_depth(mut self, depth: usize) -> Self {
        self.max_parent_depth = depth;
        self
    }

    /// Builds the manager.
    pub fn build(self) -> ContentManager<S> {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ContentCache::new()));
        let access = AccessResolver::new(Arc::clone(&self.store), Arc::clone(&cache))
            .admin(self.admin)
            .max_depth(self.max_parent_depth);
        ContentManager {
            store: self.store,
            cache,
            access,
            admin: self.admin,
            max_parent_depth: self.max_parent_depth,
        }
    }
}

impl<S> ContentManager<S> {
    /// Returns a manager over the same store and cache in another mode.
    pub fn with_admin(&self, admin: bool) -> Self {
        ContentManagerBuilder::from_shared(Arc::clone(&self.store))
            .cache(Arc::clone(&self.cache))
            .admin(admin)
            .max_parent_depth(self.max_parent_depth)
            .build()
    }

    /// Returns whether the manager runs in admin mode.
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Returns the resolver used for every check.
    pub fn access(&self) -> &AccessResolver<S> {
        &self.access
    }

    /// Flushes the shared cache.
    pub fn reset(&self) {
        self.cache.remove_all();
    }
}

impl<S> ContentManager<S>
where
    S: Store,
{
    /// Returns the visible revision of a content object.
    ///
    /// Fails with [`Error::AccessDenied`] when the object exists but is not
    /// readable; returns `None` when it is missing or offline.
    pub async fn get_content(&self, user: Option<&User>, id: ContentId) -> Result<Option<ContentNode>> {
        if id.is_root() {
            return Ok(None);
        }
        if !self.admin
            && let Some(node) = self.cache.content(id)
        {
            return self.post_process(user, ContentNode::clone(&node)).await;
        }
        let generation = self.cache.generation();
        let node = self
            .store
            .find_content_by_max_revision(id, self.admin)
            .await
            .map_err(Error::from)?;
        let Some(node) = node else {
            return Ok(None);
        };
        let node = self.hydrate(node, generation).await?;
        self.post_process(user, node).await
    }

    /// Returns the object named `name` directly below `parent`.
    pub async fn get_content_by_name(
        &self,
        user: Option<&User>,
        domain: &DomainName,
        parent: ContentId,
        name: &str,
    ) -> Result<Option<ContentNode>> {
        let generation = self.cache.generation();
        let node = self
            .store
            .find_content_by_name(domain, parent, name, self.admin)
            .await
            .map_err(Error::from)?;
        let Some(node) = node else {
            return Ok(None);
        };
        let node = self.hydrate(node, generation).await?;
        self.post_process(user, node).await
    }

    /// Returns the child of `parent` named `name`.
    pub async fn get_content_child(
        &self,
        user: Option<&User>,
        parent: &ContentNode,
        name: &str,
    ) -> Result<Option<ContentNode>> {
        self.get_content_by_name(user, &parent.domain, parent.id, name)
            .await
    }

    /// Returns the parent object, `None` at the domain root.
    pub async fn get_content_parent(
        &self,
        user: Option<&User>,
        node: &ContentNode,
    ) -> Result<Option<ContentNode>> {
        self.get_content(user, node.parent).await
    }

    /// Lists the visible children of `parent`. Unreadable children are skipped.
    pub async fn get_content_children(
        &self,
        user: Option<&User>,
        parent: &ContentNode,
    ) -> Result<Vec<ContentNode>> {
        let selector = ContentSelector::new(parent.domain.clone()).require_parent(parent.id);
        self.get_content_objects(user, selector).await
    }

    /// Lists the visible children of one category.
    pub async fn get_content_children_by_category(
        &self,
        user: Option<&User>,
        parent: &ContentNode,
        category: Category,
    ) -> Result<Vec<ContentNode>> {
        let selector = ContentSelector::new(parent.domain.clone())
            .require_parent(parent.id)
            .require_category(category);
        self.get_content_objects(user, selector).await
    }

    /// Lists the visible objects matching `selector`.
    pub async fn get_content_objects(
        &self,
        user: Option<&User>,
        selector: ContentSelector,
    ) -> Result<Vec<ContentNode>> {
        let query = selector.into_query(self.admin);
        let generation = self.cache.generation();
        let rows = self
            .store
            .find_content_by_query(&query)
            .await
            .map_err(Error::from)?;
        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            nodes.push(self.hydrate(row, generation).await?);
        }
        self.post_process_all(user, nodes).await
    }

    /// Counts the objects matching `selector`, without access filtering.
    pub async fn count_content(&self, selector: ContentSelector) -> Result<usize> {
        let query = selector.into_query(self.admin);
        self.store
            .count_content_by_query(&query)
            .await
            .map_err(Error::from)
    }

    /// Lists the visible sites of a domain.
    pub async fn get_sites(&self, user: Option<&User>, domain: &DomainName) -> Result<Vec<ContentNode>> {
        let sites = match self.cache.sites(domain) {
            Some(sites) => sites.iter().map(|site| ContentNode::clone(site)).collect(),
            None => {
                let generation = self.cache.generation();
                let rows = self
                    .store
                    .find_sites_by_domain(domain)
                    .await
                    .map_err(Error::from)?;
                let mut sites = Vec::with_capacity(rows.len());
                for row in rows {
                    sites.push(self.hydrate(row, generation).await?);
                }
                self.cache.add_sites_if_current(domain, &sites, generation);
                sites
            }
        };
        self.post_process_all(user, sites).await
    }

    /// Returns the highest stored revision number, if any revision exists.
    pub async fn max_revision_number(&self, id: ContentId) -> Result<Option<u32>> {
        let revisions = self
            .store
            .find_content_by_id(id)
            .await
            .map_err(Error::from)?;
        Ok(revisions.iter().map(|node| node.revision).max())
    }

    /// Returns one specific revision. The online window is not applied.
    pub async fn get_content_revision(
        &self,
        user: Option<&User>,
        id: ContentId,
        revision: u32,
    ) -> Result<Option<ContentNode>> {
        let generation = self.cache.generation();
        let node = self
            .store
            .find_content_by_revision(id, revision)
            .await
            .map_err(Error::from)?;
        let Some(node) = node else {
            return Ok(None);
        };
        let node = self.hydrate(node, generation).await?;
        self.access
            .check_read(user, Resource::Content(&node))
            .await?;
        Ok(Some(node))
    }

    /// Returns every stored revision of an object, oldest first.
    pub async fn get_content_revisions(
        &self,
        user: Option<&User>,
        id: ContentId,
    ) -> Result<Vec<ContentNode>> {
        let generation = self.cache.generation();
        let rows = self
            .store
            .find_content_by_id(id)
            .await
            .map_err(Error::from)?;
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        self.access
            .check_read(user, Resource::Content(first))
            .await?;
        let mut revisions = Vec::with_capacity(rows.len());
        for row in rows {
            revisions.push(self.hydrate(row, generation).await?);
        }
        revisions.sort_by_key(|node| node.revision);
        Ok(revisions)
    }

    /// Saves a content object.
    ///
    /// New objects and revision promotions insert a row; a promoted work
    /// revision is removed after the new row is written. Unchanged stored
    /// objects are left alone.
    pub async fn save(&self, user: Option<&User>, node: &mut ContentNode) -> Result<()> {
        if node.is_persistent() && !node.is_modified() {
            return Ok(());
        }
        let stored = node.stored_revision();
        let update = stored == Some(node.revision) && !node.id.is_root();
        if update {
            self.access
                .check_update(user, Resource::Content(node))
                .await?;
        } else {
            self.access
                .check_insert(user, Resource::Content(node))
                .await?;
        }
        self.prepare(node).await?;

        node.author = user.map(|user| user.name.to_string()).unwrap_or_default();
        node.modified_at = OffsetDateTime::now_utc();
        if update {
            self.store.update_content(node).await.map_err(Error::from)?;
        } else {
            node.id = self.store.insert_content(node).await.map_err(Error::from)?;
        }
        self.write_attributes(node).await?;
        if stored == Some(WORK_REVISION) && !node.is_work_revision() {
            self.store
                .delete_content_revision(node.id, WORK_REVISION)
                .await
                .map_err(Error::from)?;
            debug!(id = %node.id, revision = node.revision, "promoted work revision");
        }
        self.finish_write(node).await
    }

    /// Re-inserts a node from a backup, keeping its author and dates.
    pub async fn restore(&self, user: Option<&User>, node: &mut ContentNode) -> Result<()> {
        self.access.check_restore(user, Resource::Content(node))?;
        node.mark_transient();
        self.prepare(node).await?;
        node.id = self.store.insert_content(node).await.map_err(Error::from)?;
        self.write_attributes(node).await?;
        self.finish_write(node).await
    }

    /// Deletes an object with every revision and every descendant.
    ///
    /// All objects in the subtree are checked for publish access before
    /// anything is removed.
    pub async fn delete(&self, user: Option<&User>, node: &mut ContentNode) -> Result<()> {
        if node.id.is_root() {
            return Ok(());
        }
        let doomed = self.subtree(node).await?;
        for target in &doomed {
            self.access
                .check_delete(user, Resource::Content(target))
                .await?;
        }
        for target in doomed.iter().rev() {
            self.store
                .delete_content(target.id)
                .await
                .map_err(Error::from)?;
            let permissions = PermissionSet::new(PermissionRef::for_content(
                target.domain.clone(),
                target.id,
            ));
            self.cache.remove(CacheObject::Content(target));
            self.cache.remove(CacheObject::Permissions(&permissions));
        }
        debug!(id = %node.id, removed = doomed.len(), "deleted content");
        node.mark_transient();
        Ok(())
    }

    /// Deletes one revision of an object.
    pub async fn delete_revision(&self, user: Option<&User>, node: &mut ContentNode) -> Result<()> {
        self.access
            .check_delete(user, Resource::Content(node))
            .await?;
        self.store
            .delete_content_revision(node.id, node.revision)
            .await
            .map_err(Error::from)?;
        self.store
            .update_status(node.id)
            .await
            .map_err(Error::from)?;
        self.cache.remove(CacheObject::Content(node));
        debug!(id = %node.id, revision = node.revision, "deleted revision");
        node.mark_transient();
        Ok(())
    }

    /// Returns the permission set of a domain or content object.
    ///
    /// With `inherit` the governing set is returned, which may be bound to
    /// an ancestor or the domain.
    pub async fn get_permissions(
        &self,
        user: Option<&User>,
        reference: &PermissionRef,
        inherit: bool,
    ) -> Result<PermissionSet> {
        self.access
            .check_read(user, Resource::Permissions(reference))
            .await?;
        let set = if inherit {
            self.access
                .effective_permissions(reference.domain(), reference.content_id())
                .await?
        } else {
            self.access.direct_permissions(reference).await?
        };
        Ok(PermissionSet::clone(&set))
    }

    /// Replaces the rules bound to the set's reference.
    pub async fn save_permissions(&self, user: Option<&User>, set: &PermissionSet) -> Result<()> {
        let reference = set.reference();
        self.access
            .check_update(user, Resource::Permissions(reference))
            .await?;
        self.store
            .write_permissions(reference, set.rules())
            .await
            .map_err(Error::from)?;
        self.cache.remove(CacheObject::Permissions(set));
        debug!(%reference, rules = set.rules().len(), "saved permissions");
        Ok(())
    }

    /// Removes every rule bound to `reference`, making it inherit again.
    pub async fn delete_permissions(&self, user: Option<&User>, reference: &PermissionRef) -> Result<()> {
        self.access
            .check_delete(user, Resource::Permissions(reference))
            .await?;
        self.store
            .delete_permissions(reference)
            .await
            .map_err(Error::from)?;
        self.cache
            .remove(CacheObject::Permissions(&PermissionSet::new(reference.clone())));
        Ok(())
    }

    /// Returns a readable domain.
    pub async fn get_domain(&self, user: Option<&User>, name: &DomainName) -> Result<Option<Domain>> {
        let Some(domain) = self.load_domain(name).await? else {
            return Ok(None);
        };
        self.access
            .check_read(user, Resource::Domain(&domain.name))
            .await?;
        Ok(Some(domain))
    }

    /// Lists the domains visible to `user`, sorted by name.
    ///
    /// Superusers see every domain; other users only their own, and only
    /// when they may read it.
    pub async fn get_domains(&self, user: Option<&User>) -> Result<Vec<Domain>> {
        let mut domains = self.store.find_domains().await.map_err(Error::from)?;
        self.cache.add_all(domains.iter().map(CacheObject::Domain));
        domains.sort_by(|left, right| left.name.cmp(&right.name));
        let mut visible = Vec::new();
        for domain in domains {
            let own = user.is_some_and(|user| user.is_superuser() || user.domain.as_ref() == Some(&domain.name));
            if own
                && self
                    .access
                    .has_read_access(user, Resource::Domain(&domain.name))
                    .await?
            {
                visible.push(domain);
            }
        }
        Ok(visible)
    }

    /// Maps a host name to its domain, falling back to the root domain.
    pub async fn get_host_domain(&self, host: &HostName) -> Result<Option<Domain>> {
        if let Some(domain) = self.cache.host_domain(host.as_str()) {
            return Ok(Some(domain));
        }
        let owner = match self.cache.host(host.as_str()) {
            Some(found) => Some(found.domain),
            None => {
                let hosts = self.store.find_hosts().await.map_err(Error::from)?;
                self.cache.add_all(hosts.iter().map(CacheObject::Host));
                hosts
                    .into_iter()
                    .find(|candidate| &candidate.name == host)
                    .map(|found| found.domain)
            }
        };
        let domain = owner.unwrap_or_else(DomainName::root);
        self.load_domain(&domain).await
    }

    /// Inserts or updates a domain. Superuser only.
    pub async fn save_domain(&self, user: Option<&User>, domain: &mut Domain) -> Result<()> {
        let exists = self.load_domain(&domain.name).await?.is_some();
        if exists {
            self.access
                .check_update(user, Resource::Domain(&domain.name))
                .await?;
        } else {
            self.access
                .check_insert(user, Resource::Domain(&domain.name))
                .await?;
        }
        domain.modified_at = OffsetDateTime::now_utc();
        if exists {
            self.store.update_domain(domain).await.map_err(Error::from)?;
        } else {
            self.store.insert_domain(domain).await.map_err(Error::from)?;
        }
        self.cache.remove(CacheObject::Domain(domain));
        self.cache.add(CacheObject::Domain(domain));
        Ok(())
    }

    /// Deletes a domain and everything it owns. Superuser only.
    pub async fn delete_domain(&self, user: Option<&User>, domain: &Domain) -> Result<()> {
        self.access
            .check_delete(user, Resource::Domain(&domain.name))
            .await?;
        self.store
            .delete_domain(&domain.name)
            .await
            .map_err(Error::from)?;
        self.cache.remove(CacheObject::Domain(domain));
        Ok(())
    }

    /// Inserts or updates a host. Superuser only.
    pub async fn save_host(&self, user: Option<&User>, host: &Host) -> Result<()> {
        let hosts = self.store.find_hosts().await.map_err(Error::from)?;
        let exists = hosts.iter().any(|candidate| candidate.name == host.name);
        if exists {
            self.access.check_update(user, Resource::Host(host)).await?;
        } else {
            self.access.check_insert(user, Resource::Host(host)).await?;
        }
        if self.load_domain(&host.domain).await?.is_none() {
            return Err(Error::validation(format!(
                "domain {} doesn't exist",
                host.domain
            )));
        }
        if exists {
            self.store.update_host(host).await.map_err(Error::from)?;
        } else {
            self.store.insert_host(host).await.map_err(Error::from)?;
        }
        self.cache.remove(CacheObject::Host(host));
        Ok(())
    }

    /// Deletes a host. Superuser only.
    pub async fn delete_host(&self, user: Option<&User>, host: &Host) -> Result<()> {
        self.access.check_delete(user, Resource::Host(host)).await?;
        self.store
            .delete_host(&host.name)
            .await
            .map_err(Error::from)?;
        self.cache.remove(CacheObject::Host(host));
        Ok(())
    }

    /// Returns the lock on a content object, if any.
    pub async fn get_lock(&self, user: Option<&User>, node: &ContentNode) -> Result<Option<Lock>> {
        let lock = self
            .store
            .find_lock_by_content(node.id)
            .await
            .map_err(Error::from)?;
        if let Some(lock) = &lock {
            self.access.check_read(user, Resource::Lock(lock)).await?;
        }
        Ok(lock)
    }

    /// Locks a content object for `user`.
    ///
    /// Re-acquiring an own lock returns it unchanged; a lock held by
    /// another user fails with [`Error::LockHeld`].
    pub async fn acquire_lock(&self, user: Option<&User>, node: &ContentNode) -> Result<Lock> {
        let Some(owner) = user else {
            return Err(Error::access_denied(None, "lock", node));
        };
        let lock = Lock {
            domain: node.domain.clone(),
            content: node.id,
            user: owner.name.clone(),
            acquired_at: OffsetDateTime::now_utc(),
        };
        self.access.check_insert(user, Resource::Lock(&lock)).await?;
        let existing = self
            .store
            .find_lock_by_content(node.id)
            .await
            .map_err(Error::from)?;
        if let Some(existing) = existing {
            if existing.is_owner(owner) {
                return Ok(existing);
            }
            return Err(Error::LockHeld {
                id: node.id,
                owner: existing.user,
            });
        }
        self.store.insert_lock(&lock).await.map_err(Error::from)?;
        debug!(id = %node.id, user = %owner.name, "acquired lock");
        Ok(lock)
    }

    /// Removes the lock on a content object. Missing locks are ignored.
    pub async fn release_lock(&self, user: Option<&User>, node: &ContentNode) -> Result<()> {
        let lock = self
            .store
            .find_lock_by_content(node.id)
            .await
            .map_err(Error::from)?;
        let Some(lock) = lock else {
            return Ok(());
        };
        self.access.check_delete(user, Resource::Lock(&lock)).await?;
        self.store
            .delete_lock(node.id)
            .await
            .map_err(Error::from)
    }

    /// Returns a user, falling back to a superuser with the same name.
    pub async fn get_user(&self, domain: Option<&DomainName>, name: &UserName) -> Result<Option<User>> {
        let user = self
            .store
            .find_user(domain, name)
            .await
            .map_err(Error::from)?;
        if user.is_some() || domain.is_none() {
            return Ok(user);
        }
        self.store
            .find_user(None, name)
            .await
            .map_err(Error::from)
    }

    /// Looks a user up by email, falling back to a superuser with that address.
    pub async fn get_user_by_email(&self, domain: Option<&DomainName>, email: &str) -> Result<Option<User>> {
        let user = self
            .store
            .find_user_by_email(domain, email)
            .await
            .map_err(Error::from)?;
        if user.is_some() || domain.is_none() {
            return Ok(user);
        }
        self.store
            .find_user_by_email(None, email)
            .await
            .map_err(Error::from)
    }

    /// Counts the users of a domain (`None` for superusers) matching `filter`.
    pub async fn get_user_count(&self, domain: Option<&DomainName>, filter: &str) -> Result<usize> {
        self.store
            .count_users(domain, filter)
            .await
            .map_err(Error::from)
    }

    /// Lists one page of matching users, ordered by name.
    pub async fn get_users(
        &self,
        domain: Option<&DomainName>,
        filter: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<User>> {
        self.store
            .find_users(domain, filter, start, count)
            .await
            .map_err(Error::from)
    }

    /// Inserts or updates a user.
    pub async fn save_user(&self, user: Option<&User>, target: &User) -> Result<()> {
        let exists = self
            .store
            .find_user(target.domain.as_ref(), &target.name)
            .await
            .map_err(Error::from)?
            .is_some();
        if exists {
            self.access.check_update(user, Resource::User(target)).await?;
        } else {
            self.access.check_insert(user, Resource::User(target)).await?;
        }
        if let Some(domain) = &target.domain
            && self.load_domain(domain).await?.is_none()
        {
            return Err(Error::validation(format!("domain {domain} doesn't exist")));
        }
        if exists {
            self.store.update_user(target).await.map_err(Error::from)
        } else {
            self.store.insert_user(target).await.map_err(Error::from)
        }
    }

    /// Deletes a user.
    pub async fn delete_user(&self, user: Option<&User>, target: &User) -> Result<()> {
        self.access.check_delete(user, Resource::User(target)).await?;
        self.store.delete_user(target).await.map_err(Error::from)
    }

    /// Returns a group.
    pub async fn get_group(&self, domain: &DomainName, name: &GroupName) -> Result<Option<Group>> {
        self.store
            .find_group(domain, name)
            .await
            .map_err(Error::from)
    }

    /// Lists the groups of a domain matching `filter`, ordered by name.
    pub async fn get_groups(&self, domain: &DomainName, filter: &str) -> Result<Vec<Group>> {
        self.store
            .find_groups(domain, filter)
            .await
            .map_err(Error::from)
    }

    /// Inserts or updates a group.
    pub async fn save_group(&self, user: Option<&User>, group: &Group) -> Result<()> {
        let exists = self
            .store
            .find_group(&group.domain, &group.name)
            .await
            .map_err(Error::from)?
            .is_some();
        if exists {
            self.access.check_update(user, Resource::Group(group)).await?;
        } else {
            self.access.check_insert(user, Resource::Group(group)).await?;
        }
        if self.load_domain(&group.domain).await?.is_none() {
            return Err(Error::validation(format!(
                "domain {} doesn't exist",
                group.domain
            )));
        }
        if exists {
            self.store.update_group(group).await.map_err(Error::from)
        } else {
            self.store.insert_group(group).await.map_err(Error::from)
        }
    }

    /// Deletes a group.
    pub async fn delete_group(&self, user: Option<&User>, group: &Group) -> Result<()> {
        self.access.check_delete(user, Resource::Group(group)).await?;
        self.store.delete_group(group).await.map_err(Error::from)
    }

    /// Loads attributes and caches the node unless the cache was
    /// invalidated after `generation` was read.
    async fn hydrate(&self, mut node: ContentNode, generation: u64) -> Result<ContentNode> {
        let attributes = self
            .store
            .find_attributes(node.id, node.revision)
            .await
            .map_err(Error::from)?;
        node.replace_attributes(attributes.into_iter().collect());
        node.mark_persisted();
        if !self.cache.is_cached(CacheObject::Content(&node)) {
            self.cache.add_if_current(CacheObject::Content(&node), generation);
        }
        Ok(node)
    }

    async fn post_process(&self, user: Option<&User>, node: ContentNode) -> Result<Option<ContentNode>> {
        self.access
            .check_read(user, Resource::Content(&node))
            .await?;
        if !self.admin && !node.is_online() {
            return Ok(None);
        }
        Ok(Some(node))
    }

    async fn post_process_all(&self, user: Option<&User>, nodes: Vec<ContentNode>) -> Result<Vec<ContentNode>> {
        let mut visible = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !self.admin && !node.is_online() {
                continue;
            }
            if self
                .access
                .has_read_access(user, Resource::Content(&node))
                .await?
            {
                visible.push(node);
            }
        }
        Ok(visible)
    }

    async fn load_domain(&self, name: &DomainName) -> Result<Option<Domain>> {
        if let Some(domain) = self.cache.domain(name.as_str()) {
            return Ok(Some(domain));
        }
        let domains = self.store.find_domains().await.map_err(Error::from)?;
        self.cache.add_all(domains.iter().map(CacheObject::Domain));
        Ok(domains.into_iter().find(|domain| &domain.name == name))
    }

    /// Applies naming rules and every store-backed validation.
    async fn prepare(&self, node: &mut ContentNode) -> Result<()> {
        let rules = node.category.rules();
        if rules.auto_name && node.name.trim().is_empty() {
            node.name = self.next_free_name(node).await?;
        }
        node.validate()?;
        if self.load_domain(&node.domain).await?.is_none() {
            return Err(Error::validation(format!(
                "domain {} doesn't exist",
                node.domain
            )));
        }
        if !node.parent.is_root() {
            let parent = self
                .store
                .find_content_by_max_revision(node.parent, true)
                .await
                .map_err(Error::from)?;
            let Some(parent) = parent else {
                return Err(Error::validation(format!(
                    "parent content {} doesn't exist",
                    node.parent
                )));
            };
            if parent.domain != node.domain {
                return Err(Error::validation(format!(
                    "parent content {} belongs to domain {}",
                    parent.id, parent.domain
                )));
            }
            if let Some(required) = rules.parent
                && parent.category != required
            {
                return Err(Error::validation(format!(
                    "{} parent must be a {required}, found {}",
                    node.category, parent.category
                )));
            }
            if !node.id.is_root() {
                self.check_not_below_itself(node, parent.parent).await?;
            }
        }
        if rules.unique_name {
            let sibling = self
                .store
                .find_content_by_name(&node.domain, node.parent, &node.name, true)
                .await
                .map_err(Error::from)?;
            if sibling.is_some_and(|sibling| sibling.id != node.id) {
                return Err(Error::validation(format!(
                    "another object named '{}' already exists here",
                    node.name
                )));
            }
        }
        Ok(())
    }

    async fn check_not_below_itself(&self, node: &ContentNode, mut current: ContentId) -> Result<()> {
        let mut depth = 1;
        while !current.is_root() {
            if current == node.id {
                return Err(Error::validation(format!(
                    "{} cannot be moved below itself",
                    node.category
                )));
            }
            depth += 1;
            if depth > self.max_parent_depth {
                return Err(Error::ParentDepthExceeded {
                    domain: node.domain.clone(),
                    id: current,
                    max_depth: self.max_parent_depth,
                });
            }
            let ancestor = self
                .store
                .find_content_by_max_revision(current, true)
                .await
                .map_err(Error::from)?;
            let Some(ancestor) = ancestor else {
                return Ok(());
            };
            current = ancestor.parent;
        }
        Ok(())
    }

    async fn next_free_name(&self, node: &ContentNode) -> Result<String> {
        let query = ContentSelector::new(node.domain.clone())
            .require_parent(node.parent)
            .require_category(node.category)
            .limit(0, usize::MAX)
            .into_query(true);
        let siblings = self
            .store
            .find_content_by_query(&query)
            .await
            .map_err(Error::from)?;
        let last = siblings
            .iter()
            .filter_map(|sibling| sibling.name.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok((last + 1).to_string())
    }

    async fn write_attributes(&self, node: &ContentNode) -> Result<()> {
        let diff = node.attribute_diff();
        if diff.is_empty() {
            return Ok(());
        }
        self.store
            .write_attributes(node.id, node.revision, &diff)
            .await
            .map_err(Error::from)
    }

    /// Refreshes status bits after a write and invalidates the cache.
    async fn finish_write(&self, node: &mut ContentNode) -> Result<()> {
        self.store
            .update_status(node.id)
            .await
            .map_err(Error::from)?;
        let row = self
            .store
            .find_content_by_revision(node.id, node.revision)
            .await
            .map_err(Error::from)?;
        if let Some(row) = row {
            node.set_status(row.status());
        }
        node.mark_persisted();
        self.cache.remove(CacheObject::Content(node));
        debug!(id = %node.id, revision = node.revision, category = %node.category, "saved content");
        Ok(())
    }

    /// Collects `node` and its descendants, parents before children.
    async fn subtree(&self, node: &ContentNode) -> Result<Vec<ContentNode>> {
        let mut visited = HashSet::from([node.id]);
        let mut nodes = vec![node.clone()];
        let mut level = vec![node.id];
        let mut depth = 0;
        while !level.is_empty() {
            depth += 1;
            if depth > self.max_parent_depth {
                return Err(Error::ParentDepthExceeded {
                    domain: node.domain.clone(),
                    id: node.id,
                    max_depth: self.max_parent_depth,
                });
            }
            let mut next = Vec::new();
            for parent in level {
                let query = ContentSelector::new(node.domain.clone())
                    .require_parent(parent)
                    .limit(0, usize::MAX)
                    .into_query(true);
                let children = self
                    .store
                    .find_content_by_query(&query)
                    .await
                    .map_err(Error::from)?;
                for child in children {
                    if !visited.insert(child.id) {
                        return Err(Error::ParentCycle {
                            domain: node.domain.clone(),
                            id: child.id,
                        });
                    }
                    next.push(child.id);
                    nodes.push(child);
                }
            }
            level = next;
        }
        Ok(nodes)
    }
}
