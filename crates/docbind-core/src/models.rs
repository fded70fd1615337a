//! Document identity and write visibility.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Identifier of a stored document.
///
/// On the wire every variant travels as a string; GUIDs use the
/// hyphenated lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentId {
    Text(String),
    Guid(Uuid),
    Int(i64),
}

impl DocumentId {
    pub fn as_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Guid(g) => write!(f, "{}", g.hyphenated()),
            Self::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for DocumentId {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<Uuid> for DocumentId {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

impl From<i64> for DocumentId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for DocumentId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// A typed document that can be written to a collection.
///
/// Reads only need `DeserializeOwned`; writes need to know where the
/// document lives, hence [`Document::id`].
///
/// ```rust
/// use docbind_core::models::{Document, DocumentId};
/// use serde::{Deserialize, Serialize};
/// use uuid::Uuid;
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     id: Uuid,
///     name: String,
/// }
///
/// impl Document for Example {
///     fn id(&self) -> DocumentId {
///         self.id.into()
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> DocumentId;
}

/// Whether a write waits until it is visible to subsequent searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Block the call until the engine has refreshed the write.
    #[default]
    WaitFor,
    /// Return once the engine accepted the write.
    FireAndForget,
}

impl Visibility {
    /// Value of the engine's `refresh` query parameter.
    pub fn refresh_param(self) -> &'static str {
        match self {
            Self::WaitFor => "wait_for",
            Self::FireAndForget => "false",
        }
    }
}
