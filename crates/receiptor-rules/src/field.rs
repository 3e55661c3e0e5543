//! # Field Resolution
//!
//! Dotted-path access into nested JSON mappings, e.g.
//! `extracted_data.vendor_name`.
//!
//! Resolution never fails loudly: a missing segment, a segment that is not
//! a mapping, an empty segment, or a JSON `null` leaf all resolve to `None`.

use serde_json::{Map, Value};

/// Resolve `path` against `root`.
///
/// Returns `None` as soon as a segment is missing or the current value is
/// not an object. A `null` leaf is reported as absent.
pub fn resolve<'a>(path: &str, root: &'a Map<String, Value>) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty())?;
    let mut current = root.get(first)?;

    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Returns `false` (leaving `root` untouched past the failing segment) when
/// the path is malformed or an intermediate segment holds a non-object.
pub fn assign(path: &str, root: &mut Map<String, Value>, value: Value) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return false;
    }
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        current = match current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            Value::Object(map) => map,
            _ => return false,
        };
    }
    current.insert((*last).to_string(), value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn receipt() -> Map<String, Value> {
        match json!({
            "id": "r-1",
            "category": "meals",
            "notes": null,
            "extracted_data": {
                "vendor_name": "Blueberry Coffee House",
                "total_amount": 12.5,
                "line_items": [{"name": "latte"}]
            }
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn resolves_top_level_field() {
        let r = receipt();
        assert_eq!(resolve("category", &r), Some(&json!("meals")));
    }

    #[test]
    fn resolves_nested_field() {
        let r = receipt();
        assert_eq!(
            resolve("extracted_data.vendor_name", &r),
            Some(&json!("Blueberry Coffee House"))
        );
        assert_eq!(resolve("extracted_data.total_amount", &r), Some(&json!(12.5)));
    }

    #[test]
    fn missing_intermediate_is_absent() {
        let r = receipt();
        assert!(resolve("vendor.name", &r).is_none());
        assert!(resolve("extracted_data.missing", &r).is_none());
    }

    #[test]
    fn non_mapping_intermediate_is_absent() {
        let r = receipt();
        assert!(resolve("category.inner", &r).is_none());
        // Arrays are not traversable by index.
        assert!(resolve("extracted_data.line_items.0", &r).is_none());
    }

    #[test]
    fn null_leaf_is_absent() {
        let r = receipt();
        assert!(resolve("notes", &r).is_none());
    }

    #[test]
    fn malformed_paths_are_absent() {
        let r = receipt();
        assert!(resolve("", &r).is_none());
        assert!(resolve(".", &r).is_none());
        assert!(resolve("extracted_data..vendor_name", &r).is_none());
        assert!(resolve("extracted_data.", &r).is_none());
    }

    #[test]
    fn assign_creates_intermediate_objects() {
        let mut r = Map::new();
        assert!(assign("sync.quickbooks", &mut r, json!(true)));
        assert_eq!(resolve("sync.quickbooks", &r), Some(&json!(true)));
    }

    #[test]
    fn assign_overwrites_existing_value() {
        let mut r = receipt();
        assert!(assign("category", &mut r, json!("travel")));
        assert_eq!(resolve("category", &r), Some(&json!("travel")));
    }

    #[test]
    fn assign_rejects_non_object_intermediate() {
        let mut r = receipt();
        assert!(!assign("category.inner", &mut r, json!(1)));
        assert_eq!(resolve("category", &r), Some(&json!("meals")));
    }

    #[test]
    fn assign_rejects_malformed_path() {
        let mut r = Map::new();
        assert!(!assign("", &mut r, json!(1)));
        assert!(!assign("a..b", &mut r, json!(1)));
        assert!(r.is_empty());
    }
}
