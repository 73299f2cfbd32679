//! Query document AST.

use serde_json::{Map, Value};

use crate::result::Location;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub operations: Vec<OperationDefinition>,
}

impl Document {
    /// Find the operation to run: the named one, or the only one.
    pub fn operation(&self, name: Option<&str>) -> Option<&OperationDefinition> {
        match name {
            Some(name) => self
                .operations
                .iter()
                .find(|op| op.name.as_deref() == Some(name)),
            None if self.operations.len() == 1 => self.operations.first(),
            None => None,
        }
    }
}

/// A `query` operation. Shorthand `{ ... }` documents produce an anonymous one.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub name: Option<String>,
    pub selection_set: SelectionSet,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    pub fields: Vec<Field>,
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Map<String, Value>,
    pub selection_set: SelectionSet,
    pub location: Location,
}

impl Field {
    /// Key of this field in the response object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
