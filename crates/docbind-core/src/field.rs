//! Field and sort tokens.
//!
//! Queries name document fields by dotted path. Multi-field sub-fields
//! (for example a lowercase keyword copy of a text field) are reached
//! with [`Field::suffix`].

use std::fmt;

use serde_json::{json, Map, Value};

/// A document field path such as `name` or `name.lowercase`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field(String);

impl Field {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The sub-field `self.<name>`.
    pub fn suffix(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// Path segments split on `.`.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Field> for Field {
    fn from(value: &Field) -> Self {
        value.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// One sort key: a field and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: Field,
    pub direction: Direction,
}

impl Sort {
    pub fn ascending(field: impl Into<Field>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<Field>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    /// Parses `field`, `field:asc` or `field:desc`.
    pub fn parse(spec: &str) -> Option<Self> {
        let (field, dir) = match spec.rsplit_once(':') {
            Some((field, dir)) => (field, dir),
            None => (spec, "asc"),
        };
        if field.is_empty() {
            return None;
        }
        match dir {
            "asc" => Some(Self::ascending(field)),
            "desc" => Some(Self::descending(field)),
            _ => None,
        }
    }

    /// `{"<field>": {"order": "asc"|"desc"}}`
    pub fn to_json(&self) -> Value {
        let mut clause = Map::new();
        clause.insert(
            self.field.path().to_string(),
            json!({ "order": self.direction.as_str() }),
        );
        Value::Object(clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_appends_subfield() {
        let name = Field::new("name");
        assert_eq!(name.suffix("lowercase").path(), "name.lowercase");
        assert_eq!(
            name.suffix("lowercase").segments().collect::<Vec<_>>(),
            vec!["name", "lowercase"]
        );
    }

    #[test]
    fn sort_serializes_as_order_object() {
        let sort = Sort::descending(Field::new("name").suffix("lowercase"));
        assert_eq!(
            sort.to_json(),
            json!({"name.lowercase": {"order": "desc"}})
        );
    }

    #[test]
    fn sort_parse() {
        assert_eq!(Sort::parse("name"), Some(Sort::ascending("name")));
        assert_eq!(Sort::parse("name:desc"), Some(Sort::descending("name")));
        assert_eq!(Sort::parse("name:sideways"), None);
        assert_eq!(Sort::parse(":asc"), None);
    }
}
