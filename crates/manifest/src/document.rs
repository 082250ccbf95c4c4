//! Typed view of a project manifest.
//!
//! Only `ItemGroup` elements and their items are modelled explicitly. Everything
//! else (property groups, imports, comments, item metadata) is kept as opaque
//! [`XmlNode`]s so that a rewrite preserves it.

use crate::path::MANIFEST_SEPARATOR;

pub const ITEM_GROUP: &str = "ItemGroup";
pub const INCLUDE: &str = "Include";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
    CData(String),
    ProcessingInstruction { target: String, value: Option<String> },
    /// Raw declaration body after `<!DOCTYPE `.
    DocType(String),
}

/// A single file or folder reference, e.g. `<Content Include="a\b.txt" />`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub category: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<XmlNode>,
}

impl Item {
    pub fn new(category: impl Into<String>, include: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            attributes: vec![Attribute::new(INCLUDE, include)],
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn include(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == INCLUDE)
            .map(|attr| attr.value.as_str())
    }

    fn include_matches(&self, include: &str) -> bool {
        self.include() == Some(include)
    }

    fn include_within(&self, include: &str) -> bool {
        self.include().is_some_and(|value| {
            value == include
                || value
                    .strip_prefix(include)
                    .is_some_and(|rest| rest.starts_with(MANIFEST_SEPARATOR))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEntry {
    Item(Item),
    Other(XmlNode),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemGroup {
    pub attributes: Vec<Attribute>,
    pub entries: Vec<GroupEntry>,
}

impl ItemGroup {
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.entries.iter().filter_map(|entry| match entry {
            GroupEntry::Item(item) => Some(item),
            GroupEntry::Other(_) => None,
        })
    }

    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        self.items().any(|item| item.category == category)
    }

    pub fn push(&mut self, item: Item) {
        self.entries.push(GroupEntry::Item(item));
    }

    /// Drop every item accepted by `pred`, returning how many went away.
    fn remove_where(&mut self, pred: impl Fn(&Item) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| match entry {
            GroupEntry::Item(item) => !pred(item),
            GroupEntry::Other(_) => true,
        });
        before - self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectNode {
    Group(ItemGroup),
    Other(XmlNode),
}

/// In-memory project manifest: a root element holding item groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    /// Doctype, comments and processing instructions before the root element.
    pub prolog: Vec<XmlNode>,
    pub root_name: String,
    pub root_attributes: Vec<Attribute>,
    pub children: Vec<ProjectNode>,
    /// Comments and processing instructions after the root element.
    pub epilog: Vec<XmlNode>,
}

impl ManifestDocument {
    /// Empty `<Project>` document.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            prolog: Vec::new(),
            root_name: "Project".to_string(),
            root_attributes: Vec::new(),
            children: Vec::new(),
            epilog: Vec::new(),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &ItemGroup> {
        self.children.iter().filter_map(|child| match child {
            ProjectNode::Group(group) => Some(group),
            ProjectNode::Other(_) => None,
        })
    }

    fn groups_mut(&mut self) -> impl Iterator<Item = &mut ItemGroup> {
        self.children.iter_mut().filter_map(|child| match child {
            ProjectNode::Group(group) => Some(group),
            ProjectNode::Other(_) => None,
        })
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.groups().flat_map(ItemGroup::items)
    }

    /// Exact `Include` lookup across every group.
    #[must_use]
    pub fn contains(&self, include: &str) -> bool {
        self.items().any(|item| item.include_matches(include))
    }

    /// `true` when `include` itself or anything nested below it is present.
    #[must_use]
    pub fn contains_tree(&self, include: &str) -> bool {
        self.items().any(|item| item.include_within(include))
    }

    /// Append an item to the last group already holding `category`, or to a new
    /// trailing group. Duplicates are not checked.
    pub fn insert(&mut self, category: &str, include: &str) {
        let item = Item::new(category, include);
        let target = self
            .children
            .iter_mut()
            .rev()
            .find_map(|child| match child {
                ProjectNode::Group(group) if group.has_category(category) => Some(group),
                _ => None,
            });
        match target {
            Some(group) => group.push(item),
            None => {
                let mut group = ItemGroup::default();
                group.push(item);
                self.children.push(ProjectNode::Group(group));
            }
        }
    }

    /// Remove items whose `Include` equals `include`.
    pub fn remove(&mut self, include: &str) -> bool {
        self.remove_where(|item| item.include_matches(include))
    }

    /// Remove `include` and every item below `include\`.
    pub fn remove_tree(&mut self, include: &str) -> bool {
        self.remove_where(|item| item.include_within(include))
    }

    fn remove_where(&mut self, pred: impl Fn(&Item) -> bool) -> bool {
        let mut found = false;
        for group in self.groups_mut() {
            if group.remove_where(&pred) > 0 {
                found = true;
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemGroup, ManifestDocument, ProjectNode};
    use pretty_assertions::assert_eq;

    fn includes(doc: &ManifestDocument) -> Vec<(String, String)> {
        doc.items()
            .map(|item| {
                (
                    item.category.clone(),
                    item.include().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn insert_creates_group_when_category_is_new() {
        let mut doc = ManifestDocument::empty();
        doc.insert("Compile", "a.js");
        assert_eq!(doc.groups().count(), 1);
        assert!(doc.contains("a.js"));
    }

    #[test]
    fn insert_targets_last_group_with_same_category() {
        let mut doc = ManifestDocument::empty();
        doc.insert("Compile", "a.js");
        doc.insert("Content", "b.txt");
        // A second Compile group appended by hand.
        let mut extra = ItemGroup::default();
        extra.push(super::Item::new("Compile", "c.js"));
        doc.children.push(ProjectNode::Group(extra));

        doc.insert("Compile", "d.js");
        let last = doc.groups().last().expect("group");
        let names: Vec<_> = last.items().filter_map(|item| item.include()).collect();
        assert_eq!(names, vec!["c.js", "d.js"]);
        assert_eq!(doc.groups().count(), 3);
    }

    #[test]
    fn insert_twice_duplicates() {
        let mut doc = ManifestDocument::empty();
        doc.insert("Content", "a.txt");
        doc.insert("Content", "a.txt");
        assert_eq!(
            includes(&doc),
            vec![
                ("Content".to_string(), "a.txt".to_string()),
                ("Content".to_string(), "a.txt".to_string())
            ]
        );
    }

    #[test]
    fn remove_is_exact() {
        let mut doc = ManifestDocument::empty();
        doc.insert("Content", "a\\b.txt");
        doc.insert("Content", "a\\b.txt.bak");
        assert!(doc.remove("a\\b.txt"));
        assert!(!doc.contains("a\\b.txt"));
        assert!(doc.contains("a\\b.txt.bak"));
        assert!(!doc.remove("a\\b.txt"));
    }

    #[test]
    fn remove_tree_matches_whole_segments() {
        let mut doc = ManifestDocument::empty();
        doc.insert("Folder", "a\\");
        doc.insert("Content", "a\\b.txt");
        doc.insert("Compile", "a\\c\\d.js");
        doc.insert("Content", "ab\\e.txt");

        assert!(doc.contains_tree("a"));
        assert!(doc.remove_tree("a"));
        assert_eq!(
            includes(&doc),
            vec![("Content".to_string(), "ab\\e.txt".to_string())]
        );
        assert!(!doc.remove_tree("a"));
    }
}
