use crate::content::ContentId;
use crate::model::User;
use crate::types::{DomainName, GroupName, UserName};
use std::fmt;

/// Access level requested from the resolver.
///
/// Levels are independent flags on a rule; granting one never implies
/// another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessLevel {
    Read,
    Write,
    Publish,
    Admin,
}

impl AccessLevel {
    /// Verb used in audit messages.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Publish => "publish",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Single grant rule.
///
/// A rule with neither a user nor a group applies to everyone, including
/// anonymous requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PermissionRule {
    pub user: Option<UserName>,
    pub group: Option<GroupName>,
    pub read: bool,
    pub write: bool,
    pub publish: bool,
    pub admin: bool,
}

impl PermissionRule {
    /// Rule applying to every user.
    pub fn anyone() -> Self {
        Self::default()
    }

    /// Rule applying to one user.
    pub fn for_user(user: UserName) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    /// Rule applying to the members of one group.
    pub fn for_group(group: GroupName) -> Self {
        Self {
            group: Some(group),
            ..Self::default()
        }
    }

    /// Sets the read flag.
    pub fn read(mut self, on: bool) -> Self {
        self.read = on;
        self
    }

    /// Sets the write flag.
    pub fn write(mut self, on: bool) -> Self {
        self.write = on;
        self
    }

    /// Sets the publish flag.
    pub fn publish(mut self, on: bool) -> Self {
        self.publish = on;
        self
    }

    /// Sets the admin flag.
    pub fn admin(mut self, on: bool) -> Self {
        self.admin = on;
        self
    }

    /// Returns the flag for `level`.
    pub fn grants(&self, level: AccessLevel) -> bool {
        match level {
            AccessLevel::Read => self.read,
            AccessLevel::Write => self.write,
            AccessLevel::Publish => self.publish,
            AccessLevel::Admin => self.admin,
        }
    }

    /// Returns whether the rule applies to `user`.
    pub fn matches(&self, user: Option<&User>) -> bool {
        match (&self.user, &self.group) {
            (None, None) => true,
            (Some(name), group) => {
                user.is_some_and(|user| &user.name == name)
                    || group_matches(group.as_ref(), user)
            }
            (None, group) => group_matches(group.as_ref(), user),
        }
    }
}

fn group_matches(group: Option<&GroupName>, user: Option<&User>) -> bool {
    match (group, user) {
        (Some(group), Some(user)) => user.in_group(group),
        _ => false,
    }
}

impl fmt::Display for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.user, &self.group) {
            (Some(user), _) => write!(f, "user {user}")?,
            (None, Some(group)) => write!(f, "group {group}")?,
            (None, None) => f.write_str("any user")?,
        }
        let flag = |on: bool, symbol: char| if on { symbol } else { '-' };
        write!(
            f,
            " [{}{}{}{}]",
            flag(self.read, 'r'),
            flag(self.write, 'w'),
            flag(self.publish, 'p'),
            flag(self.admin, 'a'),
        )
    }
}

/// Object a permission set is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PermissionRef {
    Domain(DomainName),
    Content { domain: DomainName, id: ContentId },
}

impl PermissionRef {
    /// Returns the reference for a content id, or the domain when `id` is root.
    pub fn for_content(domain: DomainName, id: ContentId) -> Self {
        if id.is_root() {
            Self::Domain(domain)
        } else {
            Self::Content { domain, id }
        }
    }

    /// Domain the reference belongs to.
    pub fn domain(&self) -> &DomainName {
        match self {
            Self::Domain(domain) | Self::Content { domain, .. } => domain,
        }
    }

    /// Returns the content id, or root for domain references.
    pub fn content_id(&self) -> ContentId {
        match self {
            Self::Domain(_) => ContentId::ROOT,
            Self::Content { id, .. } => *id,
        }
    }
}

impl fmt::Display for PermissionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => write!(f, "domain {domain}"),
            Self::Content { id, .. } => write!(f, "content {id}"),
        }
    }
}

/// Ordered rules bound to one domain or content object.
///
/// An empty set is meaningful: the owner defers to its parent, or to its
/// domain at the top of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PermissionSet {
    reference: PermissionRef,
    rules: Vec<PermissionRule>,
}

impl PermissionSet {
    /// Creates an empty set for `reference`.
    pub fn new(reference: PermissionRef) -> Self {
        Self {
            reference,
            rules: Vec::new(),
        }
    }

    /// Creates a set with `rules`.
    pub fn with_rules(reference: PermissionRef, rules: Vec<PermissionRule>) -> Self {
        Self { reference, rules }
    }

    /// Object the set is bound to.
    pub fn reference(&self) -> &PermissionRef {
        &self.reference
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    /// Replaces all rules.
    pub fn set_rules(&mut self, rules: Vec<PermissionRule>) {
        self.rules = rules;
    }

    /// Appends a rule.
    pub fn push(&mut self, rule: PermissionRule) {
        self.rules.push(rule);
    }

    /// Returns whether the set has no rules, meaning it inherits.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns whether any rule matching `user` grants `level`.
    ///
    /// Only grants are expressible, so an empty set always denies.
    pub fn allows(&self, user: Option<&User>, level: AccessLevel) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matches(user) && rule.grants(level))
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "permissions of {}", self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DomainName {
        DomainName::try_from("EXAMPLE").unwrap()
    }

    fn editor() -> User {
        User::new(domain(), UserName::try_from("alice").unwrap())
            .with_group(GroupName::try_from("editors").unwrap())
    }

    #[test]
    fn wildcard_rule_should_match_anonymous() {
        let rule = PermissionRule::anyone().read(true);
        assert!(rule.matches(None));
        assert!(rule.matches(Some(&editor())));
    }

    #[test]
    fn group_rule_should_match_members_only() {
        let rule = PermissionRule::for_group(GroupName::try_from("editors").unwrap()).read(true);
        let outsider = User::new(domain(), UserName::try_from("bob").unwrap());

        assert!(rule.matches(Some(&editor())));
        assert!(!rule.matches(Some(&outsider)));
        assert!(!rule.matches(None));
    }

    #[test]
    fn user_rule_should_match_by_name() {
        let rule = PermissionRule::for_user(UserName::try_from("alice").unwrap());
        assert!(rule.matches(Some(&editor())));
        assert!(!rule.matches(None));
    }

    #[test]
    fn levels_should_not_imply_each_other() {
        let set = PermissionSet::with_rules(
            PermissionRef::Domain(domain()),
            vec![PermissionRule::anyone().admin(true)],
        );
        assert!(set.allows(None, AccessLevel::Admin));
        assert!(!set.allows(None, AccessLevel::Read));
        assert!(!set.allows(None, AccessLevel::Write));
    }

    #[test]
    fn empty_set_should_deny() {
        let set = PermissionSet::new(PermissionRef::Domain(domain()));
        assert!(set.is_empty());
        assert!(!set.allows(Some(&editor()), AccessLevel::Read));
    }

    #[test]
    fn reference_for_root_content_should_be_domain() {
        let reference = PermissionRef::for_content(domain(), ContentId::ROOT);
        assert_eq!(reference, PermissionRef::Domain(domain()));
    }

    #[test]
    fn rule_display_should_show_flags() {
        let rule = PermissionRule::anyone().read(true).publish(true);
        assert_eq!(rule.to_string(), "any user [r-p-]");
    }
}
