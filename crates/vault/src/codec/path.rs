//! Dot-notation field paths and traversal of JSON records.

use serde_json::Value;

/// Segments of a dot-notation field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSegment {
    /// Navigate into an object property by name.
    Key(String),
    /// Expand into every element of a JSON array.
    ArrayItem,
}

/// Parse a dot-notation path into a list of [`PathSegment`]s.
///
/// Array fields use the `[]` suffix before the dot separator, e.g.
/// `"allergies[].allergen"` → `[Key("allergies"), ArrayItem, Key("allergen")]`.
pub(crate) fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if let Some(key) = part.strip_suffix("[]") {
            segments.push(PathSegment::Key(key.to_owned()));
            segments.push(PathSegment::ArrayItem);
        } else {
            segments.push(PathSegment::Key(part.to_owned()));
        }
    }
    segments
}

/// Follow `segments` through `value` and call `f` on every leaf reached.
///
/// `f` receives the concrete location of the leaf with array indices filled
/// in (`"allergies[1].allergen"`). Missing keys and type mismatches along the
/// way end that branch silently: records routinely omit optional fields.
pub(crate) fn for_each_leaf<E>(
    value: &mut Value,
    segments: &[PathSegment],
    at: &str,
    f: &mut dyn FnMut(&str, &mut Value) -> Result<(), E>,
) -> Result<(), E> {
    let Some((first, rest)) = segments.split_first() else {
        return f(at, value);
    };

    match first {
        PathSegment::Key(key) => {
            if let Value::Object(map) = value {
                if let Some(child) = map.get_mut(key) {
                    let next = if at.is_empty() {
                        key.clone()
                    } else {
                        format!("{at}.{key}")
                    };
                    for_each_leaf(child, rest, &next, f)?;
                }
            }
        }
        PathSegment::ArrayItem => {
            if let Value::Array(items) = value {
                for (i, item) in items.iter_mut().enumerate() {
                    for_each_leaf(item, rest, &format!("{at}[{i}]"), f)?;
                }
            }
        }
    }
    Ok(())
}
