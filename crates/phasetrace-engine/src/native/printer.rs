use itertools::Itertools;

use crate::ast::{Document, Field, SelectionSet};

pub(crate) fn print_document(document: &Document) -> String {
    document
        .operations
        .iter()
        .map(|op| match &op.name {
            Some(name) => format!("query {} {}", name, print_selection_set(&op.selection_set, 0)),
            None => print_selection_set(&op.selection_set, 0),
        })
        .join("\n\n")
}

fn print_selection_set(selection_set: &SelectionSet, depth: usize) -> String {
    let indent = "  ".repeat(depth + 1);
    let body = selection_set
        .fields
        .iter()
        .map(|field| format!("{indent}{}", print_field(field, depth + 1)))
        .join("\n");
    format!("{{\n{body}\n{}}}", "  ".repeat(depth))
}

fn print_field(field: &Field, depth: usize) -> String {
    let mut out = String::new();
    if let Some(alias) = &field.alias {
        out.push_str(alias);
        out.push_str(": ");
    }
    out.push_str(&field.name);
    if !field.arguments.is_empty() {
        let args = field
            .arguments
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .join(", ");
        out.push_str(&format!("({args})"));
    }
    if !field.selection_set.is_empty() {
        out.push(' ');
        out.push_str(&print_selection_set(&field.selection_set, depth));
    }
    out
}
