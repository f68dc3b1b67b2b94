//! Content revisions and their attribute conventions.
//!
//! Every logical object is identified by a [`ContentId`] shared by all of
//! its stored revisions. Revision `0` is the mutable work copy; revisions
//! from `1` upwards are published and immutable.

use crate::error::{Error, Result};
use crate::types::DomainName;
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// Revision number of the work copy.
pub const WORK_REVISION: u32 = 0;

/// Prefix of page and template element attributes.
pub const ELEMENT_PREFIX: &str = "ELEMENT.";
/// Prefix of document property attributes.
pub const PROPERTY_PREFIX: &str = "PROPERTY.";
/// Prefix of document property type attributes.
pub const PROPERTY_TYPE_PREFIX: &str = "PROPERTYTYPE.";

const FILE_NAME_ATTRIBUTE: &str = "FILENAME";
const TEMPLATE_ATTRIBUTE: &str = "TEMPLATE";
const SUBJECT_ATTRIBUTE: &str = "SUBJECT";
const TEXT_ATTRIBUTE: &str = "TEXT";
const TEXT_TYPE_ATTRIBUTE: &str = "TEXTTYPE";
const LOCKED_ATTRIBUTE: &str = "LOCKED";

const MAX_CONTENT_NAME_LEN: usize = 200;
const MAX_COMMENT_LEN: usize = 200;
const MAX_ATTRIBUTE_NAME_LEN: usize = 100;

/// Content object identifier. `0` denotes the domain root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ContentId(u32);

impl ContentId {
    /// Parent id of top-level objects, and id of unsaved ones.
    pub const ROOT: Self = Self(0);

    /// Wraps a raw id. `0` is the domain root.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns whether this is the domain root.
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ContentId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content category. The numeric codes are the persisted representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    Site,
    Translator,
    Folder,
    Page,
    File,
    Template,
    Section,
    Document,
    Forum,
    Thread,
    Post,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Self::Site,
        Self::Translator,
        Self::Folder,
        Self::Page,
        Self::File,
        Self::Template,
        Self::Section,
        Self::Document,
        Self::Forum,
        Self::Thread,
        Self::Post,
    ];

    /// Numeric code stored for the category.
    pub fn code(self) -> u8 {
        match self {
            Self::Site => 1,
            Self::Translator => 2,
            Self::Folder => 3,
            Self::Page => 4,
            Self::File => 5,
            Self::Template => 6,
            Self::Section => 11,
            Self::Document => 12,
            Self::Forum => 13,
            Self::Thread => 14,
            Self::Post => 15,
        }
    }

    /// Parses a stored category code.
    pub fn from_code(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| i64::from(category.code()) == code)
            .ok_or_else(|| Error::validation(format!("content category {code} hasn't been defined")))
    }

    /// Lower-case name used in messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Translator => "translator",
            Self::Folder => "folder",
            Self::Page => "page",
            Self::File => "file",
            Self::Template => "template",
            Self::Section => "section",
            Self::Document => "document",
            Self::Forum => "forum",
            Self::Thread => "thread",
            Self::Post => "post",
        }
    }

    pub(crate) fn rules(self) -> &'static CategoryRules {
        &CATEGORY_RULES[self.index()]
    }

    fn index(self) -> usize {
        match self {
            Self::Site => 0,
            Self::Translator => 1,
            Self::Folder => 2,
            Self::Page => 3,
            Self::File => 4,
            Self::Template => 5,
            Self::Section => 6,
            Self::Document => 7,
            Self::Forum => 8,
            Self::Thread => 9,
            Self::Post => 10,
        }
    }
}

impl TryFrom<u8> for Category {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(i64::from(code))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structural rules of one category.
#[derive(Debug)]
pub(crate) struct CategoryRules {
    /// Objects must live below another content object.
    pub requires_parent: bool,
    /// Required parent category, if restricted.
    pub parent: Option<Category>,
    /// Sibling names must be unique.
    pub unique_name: bool,
    /// An empty name is replaced with the next free sibling number.
    pub auto_name: bool,
    /// Free-form names (no character restriction).
    pub free_name: bool,
    check: fn(&ContentNode) -> Result<()>,
}

fn no_check(_: &ContentNode) -> Result<()> {
    Ok(())
}

fn check_elements(node: &ContentNode) -> Result<()> {
    for name in node.element_names() {
        if name.is_empty()
            || !name
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit())
        {
            return Err(Error::validation(format!(
                "element name contains invalid characters '{name}'"
            )));
        }
    }
    Ok(())
}

fn check_thread(node: &ContentNode) -> Result<()> {
    if node.subject().trim().is_empty() {
        return Err(Error::validation("no thread subject set"));
    }
    Ok(())
}

fn check_file(node: &ContentNode) -> Result<()> {
    if node.file_name().is_none_or(str::is_empty) {
        return Err(Error::validation("no file name set for file"));
    }
    Ok(())
}

const fn rules(
    requires_parent: bool,
    parent: Option<Category>,
    unique_name: bool,
    auto_name: bool,
    free_name: bool,
    check: fn(&ContentNode) -> Result<()>,
) -> CategoryRules {
    CategoryRules {
        requires_parent,
        parent,
        unique_name,
        auto_name,
        free_name,
        check,
    }
}

static CATEGORY_RULES: [CategoryRules; 11] = [
    // site
    rules(false, None, false, false, true, no_check),
    // translator
    rules(true, None, true, false, false, no_check),
    // folder
    rules(true, None, true, false, false, no_check),
    // page
    rules(true, None, true, false, false, check_elements),
    // file
    rules(true, None, true, false, false, check_file),
    // template
    rules(false, Some(Category::Template), true, false, false, check_elements),
    // section
    rules(false, Some(Category::Section), true, false, false, no_check),
    // document
    rules(true, Some(Category::Section), true, false, false, no_check),
    // forum
    rules(true, Some(Category::Section), true, false, false, no_check),
    // thread
    rules(true, Some(Category::Forum), false, true, false, check_thread),
    // post
    rules(true, Some(Category::Thread), false, true, false, no_check),
];

/// Revision status derived by the store after every write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ContentStatus(u8);

impl ContentStatus {
    pub const NONE: Self = Self(0);
    pub const LATEST: Self = Self(1);
    pub const PUBLISHED: Self = Self(2);

    /// Raw bit value.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds a status from raw bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    /// Returns whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Combines two statuses.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Type of a document property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Tagged,
    Html,
}

impl PropertyType {
    /// Stored code of the property type.
    pub fn code(self) -> u8 {
        match self {
            Self::String => 1,
            Self::Tagged => 2,
            Self::Html => 3,
        }
    }

    fn from_attribute(value: Option<&str>) -> Self {
        match value.and_then(|value| value.trim().parse::<u8>().ok()) {
            Some(2) => Self::Tagged,
            Some(3) => Self::Html,
            _ => Self::String,
        }
    }
}

/// Text encoding of a forum post body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Plain,
    Tagged,
}

/// Comparable state of a node as last read from or written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Snapshot {
    revision: u32,
    category: Category,
    name: String,
    parent: ContentId,
    online_from: Option<OffsetDateTime>,
    online_until: Option<OffsetDateTime>,
    comment: String,
    attributes: BTreeMap<String, String>,
}

/// Attribute rows to write for one save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeDiff {
    pub upserts: Vec<(String, String)>,
    pub deletes: Vec<String>,
}

impl AttributeDiff {
    /// Returns whether the diff writes nothing.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// One revision of one content object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentNode {
    pub domain: DomainName,
    pub id: ContentId,
    pub revision: u32,
    pub category: Category,
    pub name: String,
    pub parent: ContentId,
    online_from: Option<OffsetDateTime>,
    online_until: Option<OffsetDateTime>,
    pub modified_at: OffsetDateTime,
    pub author: String,
    pub comment: String,
    status: ContentStatus,
    attributes: BTreeMap<String, String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    origin: Option<Box<Snapshot>>,
}

impl ContentNode {
    /// Creates a new, unsaved work revision.
    pub fn new(domain: DomainName, category: Category, name: impl Into<String>) -> Self {
        Self {
            domain,
            id: ContentId::ROOT,
            revision: WORK_REVISION,
            category,
            name: name.into(),
            parent: ContentId::ROOT,
            online_from: None,
            online_until: None,
            modified_at: OffsetDateTime::now_utc(),
            author: String::new(),
            comment: String::new(),
            status: ContentStatus::NONE,
            attributes: BTreeMap::new(),
            origin: None,
        }
    }

    /// Creates a new work revision below `parent`.
    pub fn child_of(parent: &ContentNode, category: Category, name: impl Into<String>) -> Self {
        let mut node = Self::new(parent.domain.clone(), category, name);
        node.parent = parent.id;
        node
    }

    /// Sets the parent id.
    pub fn with_parent(mut self, parent: ContentId) -> Self {
        self.parent = parent;
        self
    }

    /// Sets the online window.
    pub fn with_online(
        mut self,
        from: Option<OffsetDateTime>,
        until: Option<OffsetDateTime>,
    ) -> Self {
        self.set_online_from(from);
        self.set_online_until(until);
        self
    }

    /// Sets the status bits; used by store implementations.
    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets an attribute on a row being built; used by store implementations.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Status bits as last derived by the store.
    pub fn status(&self) -> ContentStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: ContentStatus) {
        self.status = status;
    }

    /// Returns whether this is revision `0`.
    pub fn is_work_revision(&self) -> bool {
        self.revision == WORK_REVISION
    }

    /// Returns whether this revision is the latest one.
    pub fn is_latest(&self) -> bool {
        self.status.contains(ContentStatus::LATEST)
    }

    /// Returns whether this is the highest published revision.
    pub fn is_published(&self) -> bool {
        self.status.contains(ContentStatus::PUBLISHED)
    }

    /// Start of the online window.
    pub fn online_from(&self) -> Option<OffsetDateTime> {
        self.online_from
    }

    /// End of the online window, if any.
    pub fn online_until(&self) -> Option<OffsetDateTime> {
        self.online_until
    }

    /// Sets the online date. The epoch is treated as "no date".
    pub fn set_online_from(&mut self, from: Option<OffsetDateTime>) {
        self.online_from = from.filter(|date| *date != OffsetDateTime::UNIX_EPOCH);
    }

    /// Sets the offline date. The epoch is treated as "no date".
    pub fn set_online_until(&mut self, until: Option<OffsetDateTime>) {
        self.online_until = until.filter(|date| *date != OffsetDateTime::UNIX_EPOCH);
    }

    /// Returns whether the node is inside its online window at `now`.
    pub fn is_online_at(&self, now: OffsetDateTime) -> bool {
        self.online_from.is_some_and(|from| from < now)
            && self.online_until.is_none_or(|until| until > now)
    }

    /// Returns whether the node is online right now.
    pub fn is_online(&self) -> bool {
        self.is_online_at(OffsetDateTime::now_utc())
    }

    /// Returns whether the node mirrors a stored row.
    pub fn is_persistent(&self) -> bool {
        self.origin.is_some()
    }

    /// Returns whether the node differs from its stored row.
    pub fn is_modified(&self) -> bool {
        self.origin
            .as_deref()
            .is_none_or(|origin| *origin != self.snapshot())
    }

    /// Revision number of the stored row this node was read as.
    pub fn stored_revision(&self) -> Option<u32> {
        self.origin.as_deref().map(|origin| origin.revision)
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.origin = Some(Box::new(self.snapshot()));
    }

    pub(crate) fn mark_transient(&mut self) {
        self.origin = None;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            revision: self.revision,
            category: self.category,
            name: self.name.clone(),
            parent: self.parent,
            online_from: self.online_from,
            online_until: self.online_until,
            comment: self.comment.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Attribute rows that must be written to bring the store in line.
    ///
    /// When the revision number changed, or the node was never stored, the
    /// full attribute map is inserted.
    pub fn attribute_diff(&self) -> AttributeDiff {
        let stored = self
            .origin
            .as_deref()
            .filter(|origin| origin.revision == self.revision);
        let Some(stored) = stored else {
            return AttributeDiff {
                upserts: self
                    .attributes
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
                deletes: Vec::new(),
            };
        };
        let upserts = self
            .attributes
            .iter()
            .filter(|(name, value)| stored.attributes.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let deletes = stored
            .attributes
            .keys()
            .filter(|name| !self.attributes.contains_key(*name))
            .cloned()
            .collect();
        AttributeDiff { upserts, deletes }
    }

    /// All attributes, keyed by name.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns one attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Sets or, with `None`, removes an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match value {
            Some(value) => {
                self.attributes.insert(name, value);
            }
            None => {
                self.attributes.remove(&name);
            }
        }
    }

    pub(crate) fn replace_attributes(&mut self, attributes: BTreeMap<String, String>) {
        self.attributes = attributes;
    }

    fn prefixed<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .keys()
            .filter_map(move |name| name.strip_prefix(prefix))
    }

    /// Names of page or template elements defined on this revision.
    pub fn element_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.prefixed(ELEMENT_PREFIX)
    }

    /// Returns a page or template element body.
    pub fn element(&self, name: &str) -> Option<&str> {
        self.attribute(&format!("{ELEMENT_PREFIX}{name}"))
    }

    /// Sets or removes (`None`) an element body.
    pub fn set_element(&mut self, name: &str, body: Option<String>) {
        self.set_attribute(format!("{ELEMENT_PREFIX}{name}"), body);
    }

    /// Identifiers of document properties defined on this revision.
    pub fn property_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.prefixed(PROPERTY_PREFIX)
    }

    /// Returns a document property, or an empty string when unset.
    pub fn property(&self, id: &str) -> &str {
        self.attribute(&format!("{PROPERTY_PREFIX}{id}"))
            .unwrap_or_default()
    }

    /// Sets a document property. Removing it also removes its type.
    pub fn set_property(&mut self, id: &str, value: Option<String>) {
        if value.is_none() {
            self.set_attribute(format!("{PROPERTY_TYPE_PREFIX}{id}"), None);
        }
        self.set_attribute(format!("{PROPERTY_PREFIX}{id}"), value);
    }

    /// Returns the declared type of a document property.
    pub fn property_type(&self, id: &str) -> PropertyType {
        PropertyType::from_attribute(self.attribute(&format!("{PROPERTY_TYPE_PREFIX}{id}")))
    }

    /// Declares the type of a document property.
    pub fn set_property_type(&mut self, id: &str, kind: PropertyType) {
        self.set_attribute(
            format!("{PROPERTY_TYPE_PREFIX}{id}"),
            Some(kind.code().to_string()),
        );
    }

    /// Stored file name of a file object.
    pub fn file_name(&self) -> Option<&str> {
        self.attribute(FILE_NAME_ATTRIBUTE)
    }

    /// Sets the stored file name.
    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.set_attribute(FILE_NAME_ATTRIBUTE, Some(name.into()));
    }

    /// Template used by a page, if any.
    pub fn template_id(&self) -> Option<ContentId> {
        self.attribute(TEMPLATE_ATTRIBUTE)
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|id| *id > 0)
            .map(ContentId::new)
    }

    /// Sets or clears the page template.
    pub fn set_template_id(&mut self, template: Option<ContentId>) {
        self.set_attribute(
            TEMPLATE_ATTRIBUTE,
            template.map(|template| template.get().to_string()),
        );
    }

    /// Thread or post subject; empty when unset.
    pub fn subject(&self) -> &str {
        self.attribute(SUBJECT_ATTRIBUTE).unwrap_or_default()
    }

    /// Sets the thread or post subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.set_attribute(SUBJECT_ATTRIBUTE, Some(subject.into()));
    }

    /// Post body; empty when unset.
    pub fn text(&self) -> &str {
        self.attribute(TEXT_ATTRIBUTE).unwrap_or_default()
    }

    /// Sets the post text and its markup type.
    pub fn set_text(&mut self, text: impl Into<String>, kind: TextType) {
        self.set_attribute(TEXT_ATTRIBUTE, Some(text.into()));
        let code = match kind {
            TextType::Plain => "1",
            TextType::Tagged => "2",
        };
        self.set_attribute(TEXT_TYPE_ATTRIBUTE, Some(code.to_string()));
    }

    /// Markup type of the post text.
    pub fn text_type(&self) -> TextType {
        match self.attribute(TEXT_TYPE_ATTRIBUTE).map(str::trim) {
            Some("2") => TextType::Tagged,
            _ => TextType::Plain,
        }
    }

    /// Returns whether a forum thread is closed for new posts.
    pub fn is_thread_locked(&self) -> bool {
        self.attribute(LOCKED_ATTRIBUTE)
            .is_some_and(|value| value.trim() == "1")
    }

    /// Locks or unlocks a thread for new posts.
    pub fn set_thread_locked(&mut self, locked: bool) {
        let value = if locked { "1" } else { "0" };
        self.set_attribute(LOCKED_ATTRIBUTE, Some(value.to_string()));
    }

    /// Checks the rules that need no store access: names, comment,
    /// attribute names and the category's own check.
    pub fn validate(&self) -> Result<()> {
        let rules = self.category.rules();
        validate_size("content name", &self.name, 1, MAX_CONTENT_NAME_LEN)?;
        if !rules.free_name
            && let Some(ch) = self.name.chars().find(|ch| !is_content_name_char(*ch))
        {
            return Err(Error::validation(format!(
                "invalid character in content name: '{ch}'"
            )));
        }
        validate_size("content comment", &self.comment, 0, MAX_COMMENT_LEN)?;
        for name in self.attributes.keys() {
            validate_attribute_name(name)?;
        }
        if rules.requires_parent && self.parent.is_root() {
            return Err(Error::validation(format!(
                "no parent set for {}",
                self.category
            )));
        }
        if !self.id.is_root() && self.id == self.parent {
            return Err(Error::validation("content cannot be its own parent"));
        }
        (rules.check)(self)
    }
}

impl fmt::Display for ContentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} '{}' (revision {})",
            self.category, self.id, self.name, self.revision
        )
    }
}

fn is_content_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')
}

fn validate_size(kind: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if min > 0 && len == 0 {
        return Err(Error::validation(format!("{kind} field cannot be empty")));
    }
    if len < min {
        return Err(Error::validation(format!(
            "{kind} too short, minimum {min} character(s) required"
        )));
    }
    if len > max {
        return Err(Error::validation(format!(
            "{kind} too long, maximum {max} character(s) allowed"
        )));
    }
    Ok(())
}

fn validate_attribute_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_ATTRIBUTE_NAME_LEN {
        return Err(Error::validation(format!(
            "attribute name '{name}' must be 1 to {MAX_ATTRIBUTE_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(|ch| ch.is_ascii_graphic()) {
        return Err(Error::validation(format!(
            "attribute name '{name}' contains invalid characters"
        )));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(Error::validation(format!(
            "attribute name '{name}' is malformed"
        )));
    }
    Ok(())
}
