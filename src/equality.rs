use crate::{
    path::{Path, PathSegment},
    Blob, Value,
};

#[cfg(test)]
mod tests;

/// Deep structural equality.
///
/// Dates compare by instant and blobs by handle identity. `NaN` equals `NaN`, so every value is
/// equal to itself. `undefined` and `null` are distinct.
/// Containers of different kinds are never equal; objects ignore key order.
pub fn is_equal_deep(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Date(a), Value::Date(b)) => a == b,
        (Value::Blob(a), Value::Blob(b)) => Blob::ptr_eq(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| is_equal_deep(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| b.get(key).is_some_and(|b| is_equal_deep(a, b)))
        }
        _ => false,
    }
}

/// Lists, in left-to-right order, the dotted paths at which `a` diverges from `b`.
///
/// A leaf or kind mismatch is reported at its own path without descending. Containers whose key
/// counts differ are reported themselves and then still compared key by key. Keys present only on
/// the right side are not listed. The root path is `""`.
pub fn get_left_unequal_paths(a: &Value, b: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_unequal_paths(a, b, &mut Path::default(), &mut paths);
    paths
}

fn collect_unequal_paths(a: &Value, b: &Value, path: &mut Path, paths: &mut Vec<String>) {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                paths.push(path.to_string());
            }
            for (index, a) in a.iter().enumerate() {
                collect_child(a, b.get(index), PathSegment::Index(index), path, paths);
            }
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.len() != b.len() {
                paths.push(path.to_string());
            }
            for (key, a) in a {
                collect_child(a, b.get(key), PathSegment::Key(key.clone()), path, paths);
            }
        }
        _ => {
            if !is_equal_deep(a, b) {
                paths.push(path.to_string());
            }
        }
    }
}

fn collect_child(
    a: &Value,
    b: Option<&Value>,
    segment: PathSegment,
    path: &mut Path,
    paths: &mut Vec<String>,
) {
    path.push(segment);
    match b {
        Some(b) => collect_unequal_paths(a, b, path, paths),
        None => paths.push(path.to_string()),
    }
    path.pop();
}
