use crate::content::{AttributeDiff, ContentId, ContentNode};
use crate::error::StoreError;
use crate::model::{Domain, Group, Host, Lock, User};
use crate::permission::{PermissionRef, PermissionRule};
use crate::query::ContentQuery;
use crate::types::{DomainName, GroupName, HostName, UserName};
use async_trait::async_trait;

/// Store interface for content revision rows.
///
/// Rows are returned without attributes; status bits must reflect the
/// last [`ContentStore::update_status`] call for the id.
#[async_trait]
pub trait ContentStore {
    /// Returns every stored revision of an object.
    async fn find_content_by_id(
        &self,
        id: ContentId,
    ) -> std::result::Result<Vec<ContentNode>, StoreError>;

    /// Returns one specific revision.
    async fn find_content_by_revision(
        &self,
        id: ContentId,
        revision: u32,
    ) -> std::result::Result<Option<ContentNode>, StoreError>;

    /// Returns the work revision when `admin` is set and one exists,
    /// otherwise the highest-numbered revision. Without `admin` only
    /// published revisions (number 1 and up) qualify.
    async fn find_content_by_max_revision(
        &self,
        id: ContentId,
        admin: bool,
    ) -> std::result::Result<Option<ContentNode>, StoreError>;

    /// Returns the latest (`admin`) or published revision named `name`
    /// directly below `parent`.
    async fn find_content_by_name(
        &self,
        domain: &DomainName,
        parent: ContentId,
        name: &str,
        admin: bool,
    ) -> std::result::Result<Option<ContentNode>, StoreError>;

    /// Returns the rows selected by a composed query.
    async fn find_content_by_query(
        &self,
        query: &ContentQuery,
    ) -> std::result::Result<Vec<ContentNode>, StoreError>;

    /// Counts the rows selected by a composed query, ignoring paging.
    async fn count_content_by_query(
        &self,
        query: &ContentQuery,
    ) -> std::result::Result<usize, StoreError>;

    /// Inserts a revision row, allocating a fresh id when the node's id is root.
    async fn insert_content(&self, node: &ContentNode)
    -> std::result::Result<ContentId, StoreError>;

    /// Overwrites the row at the node's id and revision.
    async fn update_content(&self, node: &ContentNode) -> std::result::Result<(), StoreError>;

    /// Deletes one revision row and its attributes.
    async fn delete_content_revision(
        &self,
        id: ContentId,
        revision: u32,
    ) -> std::result::Result<(), StoreError>;

    /// Deletes every revision together with attributes, permissions and locks.
    async fn delete_content(&self, id: ContentId) -> std::result::Result<(), StoreError>;

    /// Recomputes the latest and published status bits of an object.
    async fn update_status(&self, id: ContentId) -> std::result::Result<(), StoreError>;
}

/// Store interface for content attributes.
#[async_trait]
pub trait AttributeStore {
    /// Returns the `(name, value)` pairs of one revision.
    async fn find_attributes(
        &self,
        id: ContentId,
        revision: u32,
    ) -> std::result::Result<Vec<(String, String)>, StoreError>;

    /// Applies upserts and deletes to one revision's attributes.
    async fn write_attributes(
        &self,
        id: ContentId,
        revision: u32,
        diff: &AttributeDiff,
    ) -> std::result::Result<(), StoreError>;
}

/// Store interface for permission rules.
#[async_trait]
pub trait PermissionStore {
    /// Returns the rules bound to a domain or content object.
    async fn find_permissions(
        &self,
        reference: &PermissionRef,
    ) -> std::result::Result<Vec<PermissionRule>, StoreError>;

    /// Replaces the rules bound to a reference.
    async fn write_permissions(
        &self,
        reference: &PermissionRef,
        rules: &[PermissionRule],
    ) -> std::result::Result<(), StoreError>;

    /// Removes every rule bound to a reference.
    async fn delete_permissions(
        &self,
        reference: &PermissionRef,
    ) -> std::result::Result<(), StoreError>;
}

/// Store interface for domains, hosts and site lookup.
#[async_trait]
pub trait DomainStore {
    async fn find_domains(&self) -> std::result::Result<Vec<Domain>, StoreError>;

    async fn find_hosts(&self) -> std::result::Result<Vec<Host>, StoreError>;

    /// Returns the highest published revision of every site in a domain.
    async fn find_sites_by_domain(
        &self,
        domain: &DomainName,
    ) -> std::result::Result<Vec<ContentNode>, StoreError>;

    async fn insert_domain(&self, domain: &Domain) -> std::result::Result<(), StoreError>;

    async fn update_domain(&self, domain: &Domain) -> std::result::Result<(), StoreError>;

    /// Deletes a domain together with everything it owns.
    async fn delete_domain(&self, domain: &DomainName) -> std::result::Result<(), StoreError>;

    async fn insert_host(&self, host: &Host) -> std::result::Result<(), StoreError>;

    async fn update_host(&self, host: &Host) -> std::result::Result<(), StoreError>;

    async fn delete_host(&self, host: &HostName) -> std::result::Result<(), StoreError>;
}

/// Store interface for content locks.
#[async_trait]
pub trait LockStore {
    async fn find_lock_by_content(
        &self,
        id: ContentId,
    ) -> std::result::Result<Option<Lock>, StoreError>;

    async fn insert_lock(&self, lock: &Lock) -> std::result::Result<(), StoreError>;

    async fn delete_lock(&self, id: ContentId) -> std::result::Result<(), StoreError>;
}

/// Store interface for users and groups.
#[async_trait]
pub trait UserStore {
    /// Returns a user; `domain` is `None` for superusers.
    async fn find_user(
        &self,
        domain: Option<&DomainName>,
        name: &UserName,
    ) -> std::result::Result<Option<User>, StoreError>;

    /// Returns the user with an exact email address in `domain`.
    async fn find_user_by_email(
        &self,
        domain: Option<&DomainName>,
        email: &str,
    ) -> std::result::Result<Option<User>, StoreError>;

    /// Counts the users of `domain` matching `filter`.
    async fn count_users(
        &self,
        domain: Option<&DomainName>,
        filter: &str,
    ) -> std::result::Result<usize, StoreError>;

    /// Returns up to `count` matching users from `start`, ordered by name.
    async fn find_users(
        &self,
        domain: Option<&DomainName>,
        filter: &str,
        start: usize,
        count: usize,
    ) -> std::result::Result<Vec<User>, StoreError>;

    async fn insert_user(&self, user: &User) -> std::result::Result<(), StoreError>;

    async fn update_user(&self, user: &User) -> std::result::Result<(), StoreError>;

    async fn delete_user(&self, user: &User) -> std::result::Result<(), StoreError>;

    async fn find_group(
        &self,
        domain: &DomainName,
        name: &GroupName,
    ) -> std::result::Result<Option<Group>, StoreError>;

    /// Returns the groups of `domain` matching `filter`, ordered by name.
    async fn find_groups(
        &self,
        domain: &DomainName,
        filter: &str,
    ) -> std::result::Result<Vec<Group>, StoreError>;

    async fn insert_group(&self, group: &Group) -> std::result::Result<(), StoreError>;

    async fn update_group(&self, group: &Group) -> std::result::Result<(), StoreError>;

    async fn delete_group(&self, group: &Group) -> std::result::Result<(), StoreError>;
}

/// Composite store trait.
pub trait Store:
    ContentStore + AttributeStore + PermissionStore + DomainStore + LockStore + UserStore + Send + Sync
{
}

impl<T> Store for T where
    T: ContentStore
        + AttributeStore
        + PermissionStore
        + DomainStore
        + LockStore
        + UserStore
        + Send
        + Sync
{
}
