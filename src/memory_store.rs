use crate::content::{AttributeDiff, Category, ContentId, ContentNode, ContentStatus, WORK_REVISION};
use crate::error::StoreError;
use crate::model::{Domain, Group, Host, Lock, User};
use crate::permission::{PermissionRef, PermissionRule};
use crate::query::ContentQuery;
use crate::store::{AttributeStore, ContentStore, DomainStore, LockStore, PermissionStore, UserStore};
use crate::types::{DomainName, GroupName, HostName, UserName};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::OffsetDateTime;

type RowKey = (ContentId, u32);
type StoreResult<T> = std::result::Result<T, StoreError>;

/// In-memory store implementation for tests and demos.
///
/// Clones share the same data.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: AtomicU32,
    permission_reads: AtomicUsize,
    failing: AtomicBool,
    contents: RwLock<BTreeMap<RowKey, ContentNode>>,
    attributes: RwLock<HashMap<RowKey, BTreeMap<String, String>>>,
    permissions: RwLock<HashMap<PermissionRef, Vec<PermissionRule>>>,
    domains: RwLock<BTreeMap<DomainName, Domain>>,
    hosts: RwLock<BTreeMap<HostName, Host>>,
    locks: RwLock<HashMap<ContentId, Lock>>,
    users: RwLock<HashMap<(Option<DomainName>, UserName), User>>,
    groups: RwLock<HashMap<(DomainName, GroupName), Group>>,
}

/// Copy of a row as it is kept in the store: no attributes, no origin.
fn stored_row(node: &ContentNode, status: ContentStatus) -> ContentNode {
    let mut row = node.clone().with_status(status);
    row.replace_attributes(BTreeMap::new());
    row.mark_transient();
    row
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of permission lookups served so far.
    pub fn permission_reads(&self) -> usize {
        self.inner.permission_reads.load(Ordering::Relaxed)
    }

    /// Makes every following request fail with a store error until reset.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::Relaxed);
    }

    fn available(&self) -> StoreResult<()> {
        if self.inner.failing.load(Ordering::Relaxed) {
            return Err("memory store unavailable".into());
        }
        Ok(())
    }

    fn read<'a, T>(&self, lock: &'a RwLock<T>) -> StoreResult<RwLockReadGuard<'a, T>> {
        self.available()?;
        lock.read().map_err(|_| "poisoned memory store lock".into())
    }

    fn write<'a, T>(&self, lock: &'a RwLock<T>) -> StoreResult<RwLockWriteGuard<'a, T>> {
        self.available()?;
        lock.write().map_err(|_| "poisoned memory store lock".into())
    }

    fn revisions(&self, id: ContentId) -> StoreResult<Vec<ContentNode>> {
        let contents = self.read(&self.inner.contents)?;
        Ok(contents
            .range((id, 0)..=(id, u32::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn hydrated(&self, row: &ContentNode) -> StoreResult<ContentNode> {
        let attributes = self.read(&self.inner.attributes)?;
        let mut node = row.clone();
        if let Some(values) = attributes.get(&(row.id, row.revision)) {
            node.replace_attributes(values.clone());
        }
        Ok(node)
    }

    fn matching_users(&self, domain: Option<&DomainName>, filter: &str) -> StoreResult<Vec<User>> {
        let users = self.read(&self.inner.users)?;
        let mut found: Vec<User> = users
            .values()
            .filter(|user| user.domain.as_ref() == domain && user.matches_filter(filter))
            .cloned()
            .collect();
        found.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(found)
    }

    fn remove_content_rows(&self, ids: &[ContentId]) -> StoreResult<()> {
        let mut contents = self.write(&self.inner.contents)?;
        let mut attributes = self.write(&self.inner.attributes)?;
        let mut permissions = self.write(&self.inner.permissions)?;
        let mut locks = self.write(&self.inner.locks)?;
        contents.retain(|(id, _), _| !ids.contains(id));
        attributes.retain(|(id, _), _| !ids.contains(id));
        permissions.retain(
            |reference, _| !matches!(reference, PermissionRef::Content { id, .. } if ids.contains(id)),
        );
        locks.retain(|id, _| !ids.contains(id));
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_content_by_id(&self, id: ContentId) -> StoreResult<Vec<ContentNode>> {
        self.revisions(id)
    }

    async fn find_content_by_revision(
        &self,
        id: ContentId,
        revision: u32,
    ) -> StoreResult<Option<ContentNode>> {
        let contents = self.read(&self.inner.contents)?;
        Ok(contents.get(&(id, revision)).cloned())
    }

    async fn find_content_by_max_revision(
        &self,
        id: ContentId,
        admin: bool,
    ) -> StoreResult<Option<ContentNode>> {
        let mut revisions = self.revisions(id)?;
        if admin
            && let Some(work) = revisions.iter().position(ContentNode::is_work_revision)
        {
            return Ok(Some(revisions.swap_remove(work)));
        }
        Ok(revisions
            .into_iter()
            .rfind(|row| admin || !row.is_work_revision()))
    }

    async fn find_content_by_name(
        &self,
        domain: &DomainName,
        parent: ContentId,
        name: &str,
        admin: bool,
    ) -> StoreResult<Option<ContentNode>> {
        let status = if admin {
            ContentStatus::LATEST
        } else {
            ContentStatus::PUBLISHED
        };
        let contents = self.read(&self.inner.contents)?;
        Ok(contents
            .values()
            .find(|row| {
                &row.domain == domain
                    && row.parent == parent
                    && row.name == name
                    && row.status().contains(status)
            })
            .cloned())
    }

    async fn find_content_by_query(&self, query: &ContentQuery) -> StoreResult<Vec<ContentNode>> {
        let rows: Vec<ContentNode> = self.read(&self.inner.contents)?.values().cloned().collect();
        let now = OffsetDateTime::now_utc();
        let mut selected = Vec::new();
        for row in &rows {
            let node = self.hydrated(row)?;
            if query.matches(&node, now) {
                selected.push(node);
            }
        }
        selected.sort_by(|left, right| query.compare(left, right));
        Ok(selected
            .into_iter()
            .skip(query.start)
            .take(query.count)
            .map(|mut node| {
                node.replace_attributes(BTreeMap::new());
                node
            })
            .collect())
    }

    async fn count_content_by_query(&self, query: &ContentQuery) -> StoreResult<usize> {
        let rows: Vec<ContentNode> = self.read(&self.inner.contents)?.values().cloned().collect();
        let now = OffsetDateTime::now_utc();
        let mut count = 0;
        for row in &rows {
            if query.matches(&self.hydrated(row)?, now) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert_content(&self, node: &ContentNode) -> StoreResult<ContentId> {
        self.available()?;
        let id = if node.id.is_root() {
            ContentId::new(self.inner.last_id.fetch_add(1, Ordering::SeqCst) + 1)
        } else {
            self.inner.last_id.fetch_max(node.id.get(), Ordering::SeqCst);
            node.id
        };
        let mut contents = self.write(&self.inner.contents)?;
        if contents.contains_key(&(id, node.revision)) {
            return Err(format!("content {id} revision {} already exists", node.revision).into());
        }
        let mut row = stored_row(node, ContentStatus::NONE);
        row.id = id;
        contents.insert((id, node.revision), row);
        Ok(id)
    }

    async fn update_content(&self, node: &ContentNode) -> StoreResult<()> {
        let mut contents = self.write(&self.inner.contents)?;
        let Some(current) = contents.get_mut(&(node.id, node.revision)) else {
            return Err(format!("content {} revision {} not found", node.id, node.revision).into());
        };
        *current = stored_row(node, current.status());
        Ok(())
    }

    async fn delete_content_revision(&self, id: ContentId, revision: u32) -> StoreResult<()> {
        self.write(&self.inner.contents)?.remove(&(id, revision));
        self.write(&self.inner.attributes)?.remove(&(id, revision));
        Ok(())
    }

    async fn delete_content(&self, id: ContentId) -> StoreResult<()> {
        self.remove_content_rows(&[id])
    }

    async fn update_status(&self, id: ContentId) -> StoreResult<()> {
        let mut contents = self.write(&self.inner.contents)?;
        let keys: Vec<RowKey> = contents
            .range((id, 0)..=(id, u32::MAX))
            .map(|(key, _)| *key)
            .collect();
        let Some(&(_, max)) = keys.last() else {
            return Ok(());
        };
        let has_work = keys.iter().any(|(_, revision)| *revision == WORK_REVISION);
        let latest = if has_work { WORK_REVISION } else { max };
        for key in keys {
            let mut status = ContentStatus::NONE;
            if max > 0 && key.1 == max {
                status = status.union(ContentStatus::PUBLISHED);
            }
            if key.1 == latest {
                status = status.union(ContentStatus::LATEST);
            }
            if let Some(row) = contents.get_mut(&key) {
                row.set_status(status);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AttributeStore for MemoryStore {
    async fn find_attributes(&self, id: ContentId, revision: u32) -> StoreResult<Vec<(String, String)>> {
        let attributes = self.read(&self.inner.attributes)?;
        Ok(attributes
            .get(&(id, revision))
            .map(|values| {
                values
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn write_attributes(&self, id: ContentId, revision: u32, diff: &AttributeDiff) -> StoreResult<()> {
        let mut attributes = self.write(&self.inner.attributes)?;
        let values = attributes.entry((id, revision)).or_default();
        for name in &diff.deletes {
            values.remove(name);
        }
        for (name, value) in &diff.upserts {
            values.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_permissions(&self, reference: &PermissionRef) -> StoreResult<Vec<PermissionRule>> {
        self.inner.permission_reads.fetch_add(1, Ordering::Relaxed);
        let permissions = self.read(&self.inner.permissions)?;
        Ok(permissions.get(reference).cloned().unwrap_or_default())
    }

    async fn write_permissions(&self, reference: &PermissionRef, rules: &[PermissionRule]) -> StoreResult<()> {
        let mut permissions = self.write(&self.inner.permissions)?;
        if rules.is_empty() {
            permissions.remove(reference);
        } else {
            permissions.insert(reference.clone(), rules.to_vec());
        }
        Ok(())
    }

    async fn delete_permissions(&self, reference: &PermissionRef) -> StoreResult<()> {
        self.write(&self.inner.permissions)?.remove(reference);
        Ok(())
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn find_domains(&self) -> StoreResult<Vec<Domain>> {
        Ok(self.read(&self.inner.domains)?.values().cloned().collect())
    }

    async fn find_hosts(&self) -> StoreResult<Vec<Host>> {
        Ok(self.read(&self.inner.hosts)?.values().cloned().collect())
    }

    async fn find_sites_by_domain(&self, domain: &DomainName) -> StoreResult<Vec<ContentNode>> {
        let contents = self.read(&self.inner.contents)?;
        let mut sites: Vec<ContentNode> = contents
            .values()
            .filter(|row| {
                &row.domain == domain && row.category == Category::Site && row.is_published()
            })
            .cloned()
            .collect();
        sites.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(sites)
    }

    async fn insert_domain(&self, domain: &Domain) -> StoreResult<()> {
        let mut domains = self.write(&self.inner.domains)?;
        if domains.contains_key(&domain.name) {
            return Err(format!("domain {} already exists", domain.name).into());
        }
        domains.insert(domain.name.clone(), domain.clone());
        Ok(())
    }

    async fn update_domain(&self, domain: &Domain) -> StoreResult<()> {
        let mut domains = self.write(&self.inner.domains)?;
        let Some(current) = domains.get_mut(&domain.name) else {
            return Err(format!("domain {} not found", domain.name).into());
        };
        *current = domain.clone();
        Ok(())
    }

    async fn delete_domain(&self, domain: &DomainName) -> StoreResult<()> {
        let owned: Vec<ContentId> = self.read(&self.inner.contents)?
            .values()
            .filter(|row| &row.domain == domain)
            .map(|row| row.id)
            .collect();
        self.remove_content_rows(&owned)?;
        self.write(&self.inner.permissions)?.retain(|reference, _| reference.domain() != domain);
        self.write(&self.inner.hosts)?.retain(|_, host| &host.domain != domain);
        self.write(&self.inner.users)?.retain(|(owner, _), _| owner.as_ref() != Some(domain));
        self.write(&self.inner.groups)?.retain(|(owner, _), _| owner != domain);
        self.write(&self.inner.domains)?.remove(domain);
        Ok(())
    }

    async fn insert_host(&self, host: &Host) -> StoreResult<()> {
        let mut hosts = self.write(&self.inner.hosts)?;
        if hosts.contains_key(&host.name) {
            return Err(format!("host {} already exists", host.name).into());
        }
        hosts.insert(host.name.clone(), host.clone());
        Ok(())
    }

    async fn update_host(&self, host: &Host) -> StoreResult<()> {
        let mut hosts = self.write(&self.inner.hosts)?;
        let Some(current) = hosts.get_mut(&host.name) else {
            return Err(format!("host {} not found", host.name).into());
        };
        *current = host.clone();
        Ok(())
    }

    async fn delete_host(&self, host: &HostName) -> StoreResult<()> {
        self.write(&self.inner.hosts)?.remove(host);
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn find_lock_by_content(&self, id: ContentId) -> StoreResult<Option<Lock>> {
        Ok(self.read(&self.inner.locks)?.get(&id).cloned())
    }

    async fn insert_lock(&self, lock: &Lock) -> StoreResult<()> {
        let mut locks = self.write(&self.inner.locks)?;
        if locks.contains_key(&lock.content) {
            return Err(format!("content {} is already locked", lock.content).into());
        }
        locks.insert(lock.content, lock.clone());
        Ok(())
    }

    async fn delete_lock(&self, id: ContentId) -> StoreResult<()> {
        self.write(&self.inner.locks)?.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, domain: Option<&DomainName>, name: &UserName) -> StoreResult<Option<User>> {
        let users = self.read(&self.inner.users)?;
        Ok(users.get(&(domain.cloned(), name.clone())).cloned())
    }

    async fn find_user_by_email(&self, domain: Option<&DomainName>, email: &str) -> StoreResult<Option<User>> {
        let users = self.read(&self.inner.users)?;
        Ok(users
            .values()
            .find(|user| user.domain.as_ref() == domain && user.email == email)
            .cloned())
    }

    async fn count_users(&self, domain: Option<&DomainName>, filter: &str) -> StoreResult<usize> {
        Ok(self.matching_users(domain, filter)?.len())
    }

    async fn find_users(
        &self,
        domain: Option<&DomainName>,
        filter: &str,
        start: usize,
        count: usize,
    ) -> StoreResult<Vec<User>> {
        Ok(self
            .matching_users(domain, filter)?
            .into_iter()
            .skip(start)
            .take(count)
            .collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.write(&self.inner.users)?;
        let key = (user.domain.clone(), user.name.clone());
        if users.contains_key(&key) {
            return Err(format!("{user} already exists").into());
        }
        users.insert(key, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.write(&self.inner.users)?;
        let Some(current) = users.get_mut(&(user.domain.clone(), user.name.clone())) else {
            return Err(format!("{user} not found").into());
        };
        *current = user.clone();
        Ok(())
    }

    async fn delete_user(&self, user: &User) -> StoreResult<()> {
        self.write(&self.inner.users)?.remove(&(user.domain.clone(), user.name.clone()));
        Ok(())
    }

    async fn find_group(&self, domain: &DomainName, name: &GroupName) -> StoreResult<Option<Group>> {
        let groups = self.read(&self.inner.groups)?;
        Ok(groups.get(&(domain.clone(), name.clone())).cloned())
    }

    async fn find_groups(&self, domain: &DomainName, filter: &str) -> StoreResult<Vec<Group>> {
        let groups = self.read(&self.inner.groups)?;
        let mut found: Vec<Group> = groups
            .values()
            .filter(|group| &group.domain == domain && group.matches_filter(filter))
            .cloned()
            .collect();
        found.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(found)
    }

    async fn insert_group(&self, group: &Group) -> StoreResult<()> {
        let mut groups = self.write(&self.inner.groups)?;
        let key = (group.domain.clone(), group.name.clone());
        if groups.contains_key(&key) {
            return Err(format!("{group} already exists").into());
        }
        groups.insert(key, group.clone());
        Ok(())
    }

    async fn update_group(&self, group: &Group) -> StoreResult<()> {
        let mut groups = self.write(&self.inner.groups)?;
        let Some(current) = groups.get_mut(&(group.domain.clone(), group.name.clone())) else {
            return Err(format!("{group} not found").into());
        };
        *current = group.clone();
        Ok(())
    }

    async fn delete_group(&self, group: &Group) -> StoreResult<()> {
        self.write(&self.inner.groups)?.remove(&(group.domain.clone(), group.name.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn domain() -> DomainName {
        DomainName::try_from("EXAMPLE").unwrap()
    }

    fn row(id: u32, revision: u32) -> ContentNode {
        let mut node = ContentNode::new(domain(), Category::Folder, "docs");
        node.id = ContentId::new(id);
        node.revision = revision;
        node
    }

    fn seed(store: &MemoryStore, id: u32, revisions: &[u32]) {
        for revision in revisions {
            block_on(store.insert_content(&row(id, *revision))).unwrap();
        }
        block_on(store.update_status(ContentId::new(id))).unwrap();
    }

    #[test]
    fn max_revision_should_depend_on_mode() {
        let store = MemoryStore::new();
        seed(&store, 42, &[0, 3, 5]);
        let id = ContentId::new(42);

        let admin = block_on(store.find_content_by_max_revision(id, true)).unwrap().unwrap();
        assert_eq!(admin.revision, 0);
        let public = block_on(store.find_content_by_max_revision(id, false)).unwrap().unwrap();
        assert_eq!(public.revision, 5);

        block_on(store.delete_content_revision(id, 0)).unwrap();
        let admin = block_on(store.find_content_by_max_revision(id, true)).unwrap().unwrap();
        assert_eq!(admin.revision, 5);
    }

    #[test]
    fn public_max_revision_should_skip_work_only_objects() {
        let store = MemoryStore::new();
        seed(&store, 9, &[0]);
        let id = ContentId::new(9);
        assert!(block_on(store.find_content_by_max_revision(id, false)).unwrap().is_none());
        let admin = block_on(store.find_content_by_max_revision(id, true)).unwrap().unwrap();
        assert_eq!(admin.revision, 0);
    }

    #[test]
    fn user_listing_should_filter_and_page() {
        let store = MemoryStore::new();
        let mut alice = User::new(domain(), UserName::try_from("alice").unwrap());
        alice.real_name = "Alice Smith".to_string();
        alice.email = "alice@example.org".to_string();
        let mut bob = User::new(domain(), UserName::try_from("bob").unwrap());
        bob.email = "bob@smith.net".to_string();
        let carol = User::new(domain(), UserName::try_from("carol").unwrap());
        let other = User::new(DomainName::try_from("OTHER").unwrap(), UserName::try_from("smith").unwrap());
        for user in [&carol, &alice, &bob, &other] {
            block_on(store.insert_user(user)).unwrap();
        }

        assert_eq!(block_on(store.count_users(Some(&domain()), "")).unwrap(), 3);
        assert_eq!(block_on(store.count_users(Some(&domain()), "SMITH")).unwrap(), 2);
        let page = block_on(store.find_users(Some(&domain()), "", 1, 5)).unwrap();
        let names: Vec<&str> = page.iter().map(|user| user.name.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol"]);
        assert_eq!(
            block_on(store.find_user_by_email(Some(&domain()), "alice@example.org")).unwrap(),
            Some(alice)
        );
        assert!(block_on(store.find_user_by_email(None, "alice@example.org")).unwrap().is_none());
    }

    #[test]
    fn failing_store_should_reject_every_request() {
        let store = MemoryStore::new();
        seed(&store, 4, &[1]);
        store.set_failing(true);
        assert!(block_on(store.find_content_by_id(ContentId::new(4))).is_err());
        assert!(block_on(store.find_domains()).is_err());
        assert!(block_on(store.insert_content(&row(5, 0))).is_err());

        store.set_failing(false);
        assert_eq!(block_on(store.find_content_by_id(ContentId::new(4))).unwrap().len(), 1);
        assert!(block_on(store.find_content_by_id(ContentId::new(5))).unwrap().is_empty());
    }

    #[test]
    fn status_should_mark_work_revision_latest_and_max_published() {
        let store = MemoryStore::new();
        seed(&store, 42, &[0, 3, 5]);
        let rows = block_on(store.find_content_by_id(ContentId::new(42))).unwrap();
        let status: Vec<(u32, bool, bool)> = rows
            .iter()
            .map(|row| (row.revision, row.is_latest(), row.is_published()))
            .collect();
        assert_eq!(status, vec![(0, true, false), (3, false, false), (5, false, true)]);

        block_on(store.delete_content_revision(ContentId::new(42), 0)).unwrap();
        block_on(store.update_status(ContentId::new(42))).unwrap();
        let latest = block_on(store.find_content_by_revision(ContentId::new(42), 5))
            .unwrap()
            .unwrap();
        assert!(latest.is_latest() && latest.is_published());
    }

    #[test]
    fn insert_should_allocate_fresh_ids() {
        let store = MemoryStore::new();
        seed(&store, 10, &[1]);
        let id = block_on(store.insert_content(&row(0, 0))).unwrap();
        assert_eq!(id, ContentId::new(11));
        assert!(block_on(store.insert_content(&row(10, 1))).is_err());
    }

    #[test]
    fn delete_content_should_cascade() {
        let store = MemoryStore::new();
        seed(&store, 8, &[0]);
        let id = ContentId::new(8);
        let reference = PermissionRef::for_content(domain(), id);
        let diff = AttributeDiff {
            upserts: vec![("PROPERTY.title".to_string(), "Docs".to_string())],
            deletes: Vec::new(),
        };
        block_on(store.write_attributes(id, 0, &diff)).unwrap();
        block_on(store.write_permissions(&reference, &[PermissionRule::anyone().read(true)])).unwrap();
        block_on(store.insert_lock(&Lock {
            domain: domain(),
            content: id,
            user: UserName::try_from("alice").unwrap(),
            acquired_at: OffsetDateTime::now_utc(),
        }))
        .unwrap();

        block_on(store.delete_content(id)).unwrap();

        assert!(block_on(store.find_content_by_id(id)).unwrap().is_empty());
        assert!(block_on(store.find_attributes(id, 0)).unwrap().is_empty());
        assert!(block_on(store.find_permissions(&reference)).unwrap().is_empty());
        assert!(block_on(store.find_lock_by_content(id)).unwrap().is_none());
    }
}
