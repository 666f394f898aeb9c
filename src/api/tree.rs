//! Protocol-neutral object model
//!
//! Every dialect marshals to and from [`ObjectTree`]: an ordered mapping from
//! case-sensitive field names to scalars, nested trees, or sequences.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Number;

/// A single field value inside an [`ObjectTree`]. Scalars compare by their
/// text form, since markup carries no type information.
#[derive(Debug, Clone)]
pub enum Field {
    Text(String),
    Number(Number),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<FixedOffset>),
    Null,
    /// Nested object, encoded as a child element in markup
    Tree(ObjectTree),
    /// Repeated children sharing one field name
    List(Vec<Field>),
}

/// Generic business object. Field order is preserved because the XML
/// dialects require elements in schema order, but equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct ObjectTree {
    fields: Vec<(String, Field)>,
}

impl ObjectTree {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, keeping its original position on replace
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Field>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Append a value under `name`; a second value for the same name promotes
    /// the field to a [`Field::List`] in arrival order.
    pub fn append(&mut self, name: impl Into<String>, value: Field) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, Field::List(items))) => items.push(value),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, Field::Null);
                *existing = Field::List(vec![first, value]);
            }
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        let index = self.fields.iter().position(|(key, _)| key == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Scalar field rendered as text, if present and scalar
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Field::as_text)
    }

    pub fn get_tree(&self, name: &str) -> Option<&ObjectTree> {
        match self.get(name) {
            Some(Field::Tree(tree)) => Some(tree),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Field {
    /// Text form of a scalar. Booleans are `true`/`false`, dates ISO-8601.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Field::Text(text) => Some(text.clone()),
            Field::Number(number) => Some(number.to_string()),
            Field::Bool(flag) => Some(if *flag { "true" } else { "false" }.to_string()),
            Field::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
            Field::Timestamp(timestamp) => Some(timestamp.to_rfc3339()),
            Field::Null | Field::Tree(_) | Field::List(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&ObjectTree> {
        match self {
            Field::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Flatten a field into the trees it holds. A single tree becomes a
    /// one-element sequence so collection callers see a consistent shape.
    pub fn into_trees(self) -> Vec<ObjectTree> {
        match self {
            Field::Tree(tree) => vec![tree],
            Field::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Field::Tree(tree) => Some(tree),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Field {
    /// Text used for scalar comparison; `Null` matches an empty element
    fn scalar_text(&self) -> Option<String> {
        match self {
            Field::Null => Some(String::new()),
            other => other.as_text(),
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Tree(left), Field::Tree(right)) => left == right,
            (Field::List(left), Field::List(right)) => left == right,
            (Field::Tree(_) | Field::List(_), _) | (_, Field::Tree(_) | Field::List(_)) => false,
            (left, right) => left.scalar_text() == right.scalar_text(),
        }
    }
}

impl PartialEq for ObjectTree {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name).is_some_and(|theirs| theirs == value))
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Bool(value)
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Number(value.into())
    }
}

impl From<NaiveDate> for Field {
    fn from(value: NaiveDate) -> Self {
        Field::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for Field {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Field::Timestamp(value)
    }
}

impl From<ObjectTree> for Field {
    fn from(value: ObjectTree) -> Self {
        Field::Tree(value)
    }
}

impl From<Vec<ObjectTree>> for Field {
    fn from(value: Vec<ObjectTree>) -> Self {
        Field::List(value.into_iter().map(Field::Tree).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut tree = ObjectTree::new().with("Name", "Acme").with("Active", true);
        tree.insert("Name", "Globex");

        let names: Vec<&str> = tree.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Name", "Active"]);
        assert_eq!(tree.get_text("Name"), Some("Globex".to_string()));
    }

    #[test]
    fn test_append_promotes_to_list() {
        let mut tree = ObjectTree::new();
        tree.append("Line", Field::Text("a".into()));
        tree.append("Line", Field::Text("b".into()));
        tree.append("Line", Field::Text("c".into()));

        assert_eq!(
            tree.get("Line"),
            Some(&Field::List(vec![
                Field::Text("a".into()),
                Field::Text("b".into()),
                Field::Text("c".into()),
            ]))
        );
    }

    #[test]
    fn test_equality_ignores_field_order() {
        let left = ObjectTree::new().with("A", "1").with("B", "2");
        let right = ObjectTree::new().with("B", "2").with("A", "1");
        assert_eq!(left, right);
        assert_ne!(left, ObjectTree::new().with("A", "1"));
    }

    #[test]
    fn test_scalars_compare_by_text_form() {
        assert_eq!(Field::Bool(true), Field::Text("true".into()));
        assert_eq!(Field::from(5i64), Field::Text("5".into()));
        assert_eq!(Field::Null, Field::Text(String::new()));
        assert_ne!(Field::Bool(true), Field::Text("1".into()));
        assert_ne!(Field::Tree(ObjectTree::new()), Field::Text(String::new()));
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        let tree = ObjectTree::new().with("Id", "1");
        assert!(tree.contains("Id"));
        assert!(!tree.contains("id"));
    }

    #[test]
    fn test_scalar_text_forms() {
        let date = NaiveDate::from_ymd_opt(2013, 4, 1).unwrap();
        assert_eq!(Field::Bool(false).as_text(), Some("false".to_string()));
        assert_eq!(Field::Date(date).as_text(), Some("2013-04-01".to_string()));
        assert_eq!(Field::from(42i64).as_text(), Some("42".to_string()));
        assert_eq!(Field::Null.as_text(), None);
    }

    #[test]
    fn test_single_tree_normalizes_to_sequence() {
        let field = Field::Tree(ObjectTree::new().with("Id", "7"));
        let trees = field.into_trees();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].get_text("Id"), Some("7".to_string()));
    }
}
