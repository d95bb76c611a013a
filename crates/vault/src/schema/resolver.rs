//! Sensitive field resolution from OpenAPI schemas.
//!
//! Given a parsed [`openapiv3::OpenAPI`] document, this module produces one
//! [`EntitySchema`] per `components/schemas` entry, listing the dot-notation
//! paths of properties annotated `x-pii: true` or `x-phi: true`.

use openapiv3::{OpenAPI, ReferenceOr, Schema, SchemaKind, Type};

use super::{EntitySchema, FieldKind, FieldRule, FieldSpec};

/// Extension flags that mark a property as sensitive.
const SENSITIVE_FLAGS: [&str; 2] = ["x-pii", "x-phi"];

/// Walk an [`OpenAPI`] document and build an entity schema for every
/// component schema.
///
/// Entity names are the snake_case form of the component name
/// (`UserPersonalInfo` → `user_personal_info`). A flag on an object or array
/// property marks every scalar beneath it. Array items are represented with the
/// `[]` suffix on the array field name (e.g. `"allergies[].allergen"`).
pub fn resolve_entities(api: &OpenAPI) -> Vec<EntitySchema> {
    let components = match &api.components {
        Some(c) => c,
        None => return Vec::new(),
    };

    components
        .schemas
        .iter()
        .filter_map(|(name, schema_ref)| match schema_ref {
            ReferenceOr::Item(schema) => {
                let mut fields = Vec::new();
                walk_schema(schema, "", false, &mut fields);
                Some(EntitySchema {
                    name: snake_case(name),
                    rule: FieldRule::Paths(fields),
                })
            }
            ReferenceOr::Reference { .. } => None,
        })
        .collect()
}

/// Recursively walk a [`Schema`], appending discovered sensitive paths to `out`.
fn walk_schema(schema: &Schema, prefix: &str, inherited: bool, out: &mut Vec<FieldSpec>) {
    match &schema.schema_kind {
        SchemaKind::Type(Type::Object(obj)) => {
            for (prop_name, prop_ref) in &obj.properties {
                let path = if prefix.is_empty() {
                    prop_name.clone()
                } else {
                    format!("{prefix}.{prop_name}")
                };

                if let ReferenceOr::Item(prop_schema) = prop_ref {
                    let sensitive = inherited || is_flagged(prop_schema);
                    if sensitive && is_scalar(prop_schema) {
                        out.push(FieldSpec::new(path.clone(), kind_of(prop_schema)));
                    }
                    walk_schema(prop_schema, &path, sensitive, out);
                }
            }
        }
        SchemaKind::Type(Type::Array(arr)) => {
            if let Some(ReferenceOr::Item(items)) = &arr.items {
                let array_path = format!("{prefix}[]");
                if inherited && is_scalar(items) {
                    out.push(FieldSpec::new(array_path.clone(), kind_of(items)));
                }
                walk_schema(items, &array_path, inherited, out);
            }
        }
        _ => {}
    }
}

fn is_flagged(schema: &Schema) -> bool {
    SENSITIVE_FLAGS.iter().any(|flag| {
        schema
            .schema_data
            .extensions
            .get(*flag)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    })
}

fn is_scalar(schema: &Schema) -> bool {
    !matches!(
        schema.schema_kind,
        SchemaKind::Type(Type::Object(_)) | SchemaKind::Type(Type::Array(_))
    )
}

fn kind_of(schema: &Schema) -> FieldKind {
    match schema.schema_kind {
        SchemaKind::Type(Type::Number(_)) => FieldKind::Number,
        SchemaKind::Type(Type::Integer(_)) => FieldKind::Integer,
        _ => FieldKind::Text,
    }
}

/// `UserMedicalInfo` → `user_medical_info`; `lab-result` → `lab_result`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '-' || c == ' ' {
            out.push('_');
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}
