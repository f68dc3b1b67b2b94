//! Content selection: filters, sort order and paging.

use crate::content::{Category, ContentId, ContentNode, ContentStatus};
use crate::types::DomainName;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::OffsetDateTime;

const DEFAULT_LIMIT: usize = 100;

/// Column a query can be sorted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortKey {
    Id,
    Revision,
    Category,
    Name,
    Parent,
    Online,
    Modified,
    Author,
    Comment,
    /// Value of a named attribute, e.g. `PROPERTY.title`.
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortColumn {
    pub key: SortKey,
    pub ascending: bool,
}

/// Caller-facing selection builder.
///
/// The mode-dependent filters (published-only, online-only) and the
/// default sort order are added by the content manager when the selector
/// is turned into a [`ContentQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSelector {
    domain: DomainName,
    parents: Vec<ContentId>,
    category: Option<Category>,
    attributes: BTreeMap<String, Vec<String>>,
    sort: Vec<SortColumn>,
    start: usize,
    count: usize,
}

impl ContentSelector {
    /// Selects every object in `domain`.
    pub fn new(domain: DomainName) -> Self {
        Self {
            domain,
            parents: Vec::new(),
            category: None,
            attributes: BTreeMap::new(),
            sort: Vec::new(),
            start: 0,
            count: DEFAULT_LIMIT,
        }
    }

    /// Restricts to objects directly below the domain root.
    pub fn require_root_parent(self) -> Self {
        self.require_parent(ContentId::ROOT)
    }

    /// Restricts to children of `parent`. Repeated calls widen the set.
    pub fn require_parent(mut self, parent: ContentId) -> Self {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    /// Restricts to one category.
    pub fn require_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Restricts to objects whose attribute equals one of the given values.
    pub fn require_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Adds a sort key; earlier keys take precedence.
    pub fn sort_by(mut self, key: SortKey, ascending: bool) -> Self {
        self.sort.push(SortColumn { key, ascending });
        self
    }

    /// Returns at most `count` rows from `start`.
    pub fn limit(mut self, start: usize, count: usize) -> Self {
        self.start = start;
        self.count = count;
        self
    }

    /// Domain searched by this selector.
    pub fn domain(&self) -> &DomainName {
        &self.domain
    }

    /// Composes the final query for a manager in `admin` or public mode.
    pub fn into_query(self, admin: bool) -> ContentQuery {
        let sort = if self.sort.is_empty() {
            if admin {
                vec![
                    SortColumn {
                        key: SortKey::Category,
                        ascending: true,
                    },
                    SortColumn {
                        key: SortKey::Name,
                        ascending: true,
                    },
                ]
            } else {
                vec![SortColumn {
                    key: SortKey::Online,
                    ascending: false,
                }]
            }
        } else {
            self.sort
        };
        ContentQuery {
            domain: self.domain,
            parents: self.parents,
            category: self.category,
            published: !admin,
            online: !admin,
            attributes: self.attributes,
            sort,
            start: self.start,
            count: self.count,
        }
    }
}

/// Fully composed query handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentQuery {
    pub domain: DomainName,
    /// Accepted parent ids; empty accepts any parent.
    pub parents: Vec<ContentId>,
    pub category: Option<Category>,
    /// Select published revisions instead of latest ones.
    pub published: bool,
    /// Select only revisions inside their online window.
    pub online: bool,
    pub attributes: BTreeMap<String, Vec<String>>,
    pub sort: Vec<SortColumn>,
    pub start: usize,
    pub count: usize,
}

impl ContentQuery {
    /// Status bit a row must carry to be selected.
    pub fn required_status(&self) -> ContentStatus {
        if self.published {
            ContentStatus::PUBLISHED
        } else {
            ContentStatus::LATEST
        }
    }

    /// Returns whether `node` passes every filter at `now`.
    ///
    /// Attribute filters are evaluated against the node's attribute map, so
    /// store implementations must hydrate attributes before calling this.
    pub fn matches(&self, node: &ContentNode, now: OffsetDateTime) -> bool {
        node.domain == self.domain
            && (self.parents.is_empty() || self.parents.contains(&node.parent))
            && self.category.is_none_or(|category| category == node.category)
            && node.status().contains(self.required_status())
            && (!self.online || node.is_online_at(now))
            && self.attributes.iter().all(|(name, values)| {
                node.attribute(name)
                    .is_some_and(|value| values.iter().any(|candidate| candidate == value))
            })
    }

    /// Orders two rows by the query's sort columns.
    pub fn compare(&self, left: &ContentNode, right: &ContentNode) -> Ordering {
        for column in &self.sort {
            let ordering = compare_key(&column.key, left, right);
            let ordering = if column.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn compare_key(key: &SortKey, left: &ContentNode, right: &ContentNode) -> Ordering {
    match key {
        SortKey::Id => left.id.cmp(&right.id),
        SortKey::Revision => left.revision.cmp(&right.revision),
        SortKey::Category => left.category.code().cmp(&right.category.code()),
        SortKey::Name => left.name.cmp(&right.name),
        SortKey::Parent => left.parent.cmp(&right.parent),
        SortKey::Online => left.online_from().cmp(&right.online_from()),
        SortKey::Modified => left.modified_at.cmp(&right.modified_at),
        SortKey::Author => left.author.cmp(&right.author),
        SortKey::Comment => left.comment.cmp(&right.comment),
        SortKey::Attribute(name) => left.attribute(name).cmp(&right.attribute(name)),
    }
}
