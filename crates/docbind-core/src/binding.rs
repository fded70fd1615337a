//! Collection declarations and their resolution to physical partitions.
//!
//! A context owner declares each collection explicitly as
//! `(field, document type, optional logical name)`. Resolution turns the
//! declarations into [`CollectionBinding`]s:
//!
//! 1. logical name = the override, or the field identifier lowercased
//! 2. physical name = `name_prefix + logical + name_suffix`
//! 3. the schema is looked up by logical name
//! 4. field identifiers and physical names must be unique, and physical
//!    names must be legal engine index names

use std::any::{type_name, TypeId};
use std::collections::HashSet;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::schema::{IndexSchema, SchemaRegistry};

/// One declared collection, before resolution.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub field: String,
    pub logical_name: Option<String>,
    pub type_name: &'static str,
    pub type_id: TypeId,
}

impl Declaration {
    pub fn of<T: 'static>(field: impl Into<String>, logical_name: Option<String>) -> Self {
        Self {
            field: field.into(),
            logical_name,
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// A resolved collection: names, document type and schema.
#[derive(Debug, Clone)]
pub struct CollectionBinding {
    pub field: String,
    pub logical_name: String,
    pub physical_name: String,
    pub type_name: &'static str,
    pub type_id: TypeId,
    pub schema: IndexSchema,
}

impl CollectionBinding {
    pub fn holds<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// Resolves every declaration or fails on the first bad one.
pub fn resolve(
    config: &ConnectionConfig,
    registry: &SchemaRegistry,
    declarations: &[Declaration],
) -> Result<Vec<CollectionBinding>> {
    let mut fields = HashSet::new();
    let mut physical = HashSet::new();
    let mut bindings = Vec::with_capacity(declarations.len());

    for decl in declarations {
        if decl.field.trim().is_empty() {
            return Err(Error::Configuration(
                "collection field identifier must not be empty".to_string(),
            ));
        }
        if !fields.insert(decl.field.as_str()) {
            return Err(Error::Configuration(format!(
                "collection field '{}' declared more than once",
                decl.field
            )));
        }

        let logical_name = decl
            .logical_name
            .clone()
            .unwrap_or_else(|| decl.field.to_lowercase());
        let physical_name = config.physical_name(&logical_name);
        validate_index_name(&physical_name)?;
        if !physical.insert(physical_name.clone()) {
            return Err(Error::Configuration(format!(
                "index name '{}' is bound to more than one collection",
                physical_name
            )));
        }

        let schema = registry.get(&logical_name).cloned().ok_or_else(|| {
            Error::Configuration(format!(
                "no schema registered for collection '{}' (field '{}')",
                logical_name, decl.field
            ))
        })?;

        bindings.push(CollectionBinding {
            field: decl.field.clone(),
            logical_name,
            physical_name,
            type_name: decl.type_name,
            type_id: decl.type_id,
            schema,
        });
    }
    Ok(bindings)
}

const ILLEGAL_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ' '];

/// Engine index naming rules.
pub fn validate_index_name(name: &str) -> Result<()> {
    let problem = if name.is_empty() {
        Some("is empty")
    } else if name == "." || name == ".." {
        Some("is reserved")
    } else if name.starts_with(['-', '_', '+']) {
        Some("must not start with '-', '_' or '+'")
    } else if name.chars().any(|c| c.is_uppercase()) {
        Some("must be lowercase")
    } else if name.contains(ILLEGAL_CHARS) {
        Some("contains an illegal character")
    } else if name.len() > 255 {
        Some("is longer than 255 bytes")
    } else {
        None
    };
    match problem {
        Some(p) => Err(Error::Configuration(format!(
            "index name '{}' {}",
            name, p
        ))),
        None => Ok(()),
    }
}
