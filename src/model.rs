//! Non-content records: domains, hosts, users, groups and locks.

use crate::content::ContentId;
use crate::types::{DomainName, GroupName, HostName, UserName};
use std::fmt;
use time::OffsetDateTime;

/// Top-level namespace holding a content tree, its hosts, users and groups.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Domain {
    pub name: DomainName,
    pub description: String,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

impl Domain {
    /// Creates a new, not yet persisted domain.
    pub fn new(name: DomainName) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            name,
            description: String::new(),
            created_at: now,
            modified_at: now,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain {}", self.name)
    }
}

/// Host name bound to a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Host {
    pub name: HostName,
    pub domain: DomainName,
    pub description: String,
}

impl Host {
    /// Creates a host mapped to `domain`.
    pub fn new(domain: DomainName, name: HostName) -> Self {
        Self {
            name,
            domain,
            description: String::new(),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host {}", self.name)
    }
}

/// Authenticated principal.
///
/// A user without a domain is a superuser and is granted every access
/// level everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub domain: Option<DomainName>,
    pub name: UserName,
    pub real_name: String,
    pub email: String,
    pub groups: Vec<GroupName>,
}

impl User {
    /// Creates a user belonging to `domain`.
    pub fn new(domain: DomainName, name: UserName) -> Self {
        Self {
            domain: Some(domain),
            name,
            real_name: String::new(),
            email: String::new(),
            groups: Vec::new(),
        }
    }

    /// Creates a superuser.
    pub fn superuser(name: UserName) -> Self {
        Self {
            domain: None,
            name,
            real_name: String::new(),
            email: String::new(),
            groups: Vec::new(),
        }
    }

    /// Adds a group membership.
    pub fn with_group(mut self, group: GroupName) -> Self {
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }

    /// Returns whether the user has no domain.
    pub fn is_superuser(&self) -> bool {
        self.domain.is_none()
    }

    /// Returns whether the user is a member of `group`.
    pub fn in_group(&self, group: &GroupName) -> bool {
        self.groups.iter().any(|candidate| candidate == group)
    }

    /// Returns whether both values denote the same account.
    pub fn same_identity(&self, other: &User) -> bool {
        self.domain == other.domain && self.name == other.name
    }

    /// Case-insensitive substring match on name, real name and email.
    /// An empty filter matches every user.
    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.to_lowercase();
        [self.name.as_str(), &self.real_name, &self.email]
            .iter()
            .any(|field| field.to_lowercase().contains(&filter))
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "user {}@{}", self.name, domain),
            None => write!(f, "superuser {}", self.name),
        }
    }
}

/// Named set of users within a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    pub domain: DomainName,
    pub name: GroupName,
    pub description: String,
}

impl Group {
    /// Creates an empty group.
    pub fn new(domain: DomainName, name: GroupName) -> Self {
        Self {
            domain,
            name,
            description: String::new(),
        }
    }

    /// Case-insensitive substring match on name and description.
    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.to_lowercase();
        self.name.as_str().to_lowercase().contains(&filter)
            || self.description.to_lowercase().contains(&filter)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {}@{}", self.name, self.domain)
    }
}

/// Advisory edit lock on a content object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lock {
    pub domain: DomainName,
    pub content: ContentId,
    pub user: UserName,
    pub acquired_at: OffsetDateTime,
}

impl Lock {
    /// Returns whether `user` holds the lock.
    pub fn is_owner(&self, user: &User) -> bool {
        self.user == user.name
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock on content {} held by {}", self.content, self.user)
    }
}
