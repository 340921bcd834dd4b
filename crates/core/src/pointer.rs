//! RFC 6901 JSON Pointer helpers over `serde_json::Value` trees.
//!
//! `serde_json` resolves pointers; this module adds what it lacks:
//! inserting, removing and enumerating every pointer of a tree.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use smallvec::SmallVec;

pub type Segments = SmallVec<[String; 8]>;

pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

pub fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Split a pointer into unescaped segments. The root pointer `""` has none.
pub fn segments(pointer: &str) -> Segments {
    if pointer.is_empty() {
        return Segments::new();
    }
    pointer.trim_start_matches('/').split('/').map(unescape).collect()
}

pub fn join(parent: &str, segment: &str) -> String {
    format!("{}/{}", parent, escape(segment))
}

/// Whether `pointer` equals `ancestor` or addresses a node below it.
pub fn is_same_or_descendant(pointer: &str, ancestor: &str) -> bool {
    pointer == ancestor || is_descendant(pointer, ancestor)
}

pub fn is_descendant(pointer: &str, ancestor: &str) -> bool {
    pointer.len() > ancestor.len()
        && pointer.starts_with(ancestor)
        && pointer.as_bytes()[ancestor.len()] == b'/'
}

/// Proper ancestors of `pointer`, outermost first, root excluded.
pub fn ancestors(pointer: &str) -> Vec<String> {
    let mut out = Vec::new();
    if !pointer.starts_with('/') {
        return out;
    }
    let mut idx = 1;
    while let Some(pos) = pointer[idx..].find('/') {
        out.push(pointer[..idx + pos].to_string());
        idx += pos + 1;
    }
    out
}

pub fn get<'a>(tree: &'a Value, pointer: &str) -> Option<&'a Value> {
    tree.pointer(pointer)
}

pub fn is_container(v: &Value) -> bool {
    matches!(v, Value::Object(_) | Value::Array(_))
}

/// Insert `value` at `pointer`, creating intermediate mappings as needed.
/// Returns false when the path runs through a scalar or an out-of-range index.
pub fn set(tree: &mut Value, pointer: &str, value: Value) -> bool {
    let segs = segments(pointer);
    let Some((last, parents)) = segs.split_last() else {
        *tree = value;
        return true;
    };
    let mut cur = tree;
    for seg in parents {
        cur = match cur {
            Value::Object(map) => map.entry(seg.clone()).or_insert_with(|| Value::Object(Map::new())),
            Value::Array(arr) => match seg.parse::<usize>().ok().and_then(|i| arr.get_mut(i)) {
                Some(v) => v,
                None => return false,
            },
            _ => return false,
        };
    }
    match cur {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        Value::Array(arr) => {
            if last == "-" {
                arr.push(value);
                return true;
            }
            match last.parse::<usize>() {
                Ok(i) if i < arr.len() => {
                    arr[i] = value;
                    true
                }
                Ok(i) if i == arr.len() => {
                    arr.push(value);
                    true
                }
                _ => false,
            }
        }
        _ => false,
    }
}

/// Remove the node at `pointer`, returning it if it existed.
pub fn remove(tree: &mut Value, pointer: &str) -> Option<Value> {
    let segs = segments(pointer);
    let (last, _) = segs.split_last()?;
    let parent_ptr = &pointer[..pointer.rfind('/')?];
    match tree.pointer_mut(parent_ptr)? {
        Value::Object(map) => map.remove(last.as_str()),
        Value::Array(arr) => {
            let i = last.parse::<usize>().ok()?;
            (i < arr.len()).then(|| arr.remove(i))
        }
        _ => None,
    }
}

/// Every pointer reaching a branch or leaf below `tree`, in pre-order.
/// Mapping keys come in map order, sequence elements by index.
pub fn walk(tree: &Value) -> Vec<String> {
    let mut out = Vec::new();
    walk_from(tree, "", &mut out);
    out
}

/// Like [`walk`] but rooted at `prefix`, which itself is not included.
pub fn walk_from(tree: &Value, prefix: &str, out: &mut Vec<String>) {
    match tree {
        Value::Object(map) => {
            for (k, v) in map {
                let p = join(prefix, k);
                out.push(p.clone());
                walk_from(v, &p, out);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                let p = format!("{}/{}", prefix, i);
                out.push(p.clone());
                walk_from(v, &p, out);
            }
        }
        _ => {}
    }
}

/// Segment-wise ordering where two numeric segments compare as numbers,
/// so `/a/10` sorts after `/a/2`.
pub fn compare(a: &str, b: &str) -> Ordering {
    let sa = segments(a);
    let sb = segments(b);
    for (x, y) in sa.iter().zip(sb.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(nx), Ok(ny)) => nx.cmp(&ny),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    sa.len().cmp(&sb.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_per_rfc6901() {
        assert_eq!(escape("a/b~c"), "a~1b~0c");
        assert_eq!(unescape("a~1b~0c"), "a/b~c");
        assert_eq!(join("/metadata/annotations", "kubectl.kubernetes.io/last-applied-configuration"),
            "/metadata/annotations/kubectl.kubernetes.io~1last-applied-configuration");
    }

    #[test]
    fn walk_lists_branches_and_leaves() {
        let v = json!({"a": {"b": 1, "c/d": [true, {"e": null}]}});
        let paths = walk(&v);
        assert_eq!(paths, vec!["/a", "/a/b", "/a/c~1d", "/a/c~1d/0", "/a/c~1d/1", "/a/c~1d/1/e"]);
        for p in &paths {
            assert!(get(&v, p).is_some(), "{} must resolve", p);
        }
    }

    #[test]
    fn set_creates_intermediate_maps() {
        let mut v = json!({"spec": {}});
        assert!(set(&mut v, "/spec/output/to/name", json!("foo:latest")));
        assert_eq!(v, json!({"spec": {"output": {"to": {"name": "foo:latest"}}}}));
        assert!(!set(&mut v, "/spec/output/to/name/x", json!(1)));
    }

    #[test]
    fn set_and_remove_on_sequences() {
        let mut v = json!({"a": [1, 2]});
        assert!(set(&mut v, "/a/2", json!(3)));
        assert!(set(&mut v, "/a/0", json!(0)));
        assert!(!set(&mut v, "/a/9", json!(9)));
        assert_eq!(remove(&mut v, "/a/1"), Some(json!(2)));
        assert_eq!(v, json!({"a": [0, 3]}));
        assert_eq!(remove(&mut v, "/a/7"), None);
        assert_eq!(remove(&mut v, "/missing/x"), None);
    }

    #[test]
    fn ancestors_are_outermost_first() {
        assert_eq!(ancestors("/a/b/c"), vec!["/a", "/a/b"]);
        assert!(ancestors("/a").is_empty());
    }

    #[test]
    fn descendant_check_respects_segment_boundaries() {
        assert!(is_descendant("/spec/host/x", "/spec/host"));
        assert!(!is_descendant("/spec/hostname", "/spec/host"));
        assert!(is_same_or_descendant("/spec/host", "/spec/host"));
    }

    #[test]
    fn compare_orders_indices_numerically() {
        assert_eq!(compare("/a/10", "/a/2"), Ordering::Greater);
        assert_eq!(compare("/a/b", "/a/b/c"), Ordering::Less);
        assert_eq!(compare("/a/x", "/a/y"), Ordering::Less);
    }
}
