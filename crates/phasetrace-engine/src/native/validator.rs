use std::collections::HashSet;

use crate::ast::{Document, SelectionSet};
use crate::backend::Validator;
use crate::result::ValidationError;
use crate::schema::{ObjectType, Schema};

/// Checks operation naming and field selections against the schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeValidator;

impl Validator for NativeValidator {
    fn validate(&self, schema: &Schema, document: &Document) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        validate_operations(document, &mut errors);
        for operation in &document.operations {
            validate_selection(
                schema,
                schema.query_type(),
                &operation.selection_set,
                &mut errors,
            );
        }
        errors
    }
}

fn validate_operations(document: &Document, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for operation in &document.operations {
        match &operation.name {
            None if document.operations.len() > 1 => errors.push(
                ValidationError::new(
                    "This anonymous operation must be the only defined operation.",
                )
                .at(operation.location),
            ),
            Some(name) if !seen.insert(name.as_str()) => errors.push(
                ValidationError::new(format!(
                    "There can be only one operation named \"{name}\"."
                ))
                .at(operation.location),
            ),
            _ => {}
        }
    }
}

fn validate_selection(
    schema: &Schema,
    parent: &ObjectType,
    selection_set: &SelectionSet,
    errors: &mut Vec<ValidationError>,
) {
    for field in &selection_set.fields {
        let Some(definition) = parent.get(&field.name) else {
            errors.push(
                ValidationError::new(format!(
                    "Cannot query field \"{}\" on type \"{}\".",
                    field.name, parent.name
                ))
                .at(field.location),
            );
            continue;
        };

        match schema.object(definition.ty.base_name()) {
            Some(_) if field.selection_set.is_empty() => errors.push(
                ValidationError::new(format!(
                    "Field \"{}\" of type \"{}\" must have a selection of subfields.",
                    field.name, definition.ty
                ))
                .at(field.location),
            ),
            Some(object) => validate_selection(schema, object, &field.selection_set, errors),
            None if !field.selection_set.is_empty() => errors.push(
                ValidationError::new(format!(
                    "Field \"{}\" must not have a selection since type \"{}\" has no subfields.",
                    field.name, definition.ty
                ))
                .at(field.location),
            ),
            None => {}
        }
    }
}
