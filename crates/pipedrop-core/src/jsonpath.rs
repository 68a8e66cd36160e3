//! JSONPath expressions addressing nodes inside the state tree.
//!
//! Queries follow RFC 9535 through `serde_json_path`. The leading `$` is
//! optional: `config.token`, `$.config.token` and `['config']` all address the
//! same node. Concrete paths rendered by [`format_path`] parse back with
//! [`parse`] and resolve to exactly the node they were produced from.

use std::fmt;

use serde_json::Value;
use serde_json_path::{JsonPath, PathElement};

use crate::error::{Error, Result};

/// One step of a concrete path that exists in a tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// A parsed path expression.
#[derive(Debug, Clone)]
pub struct PathExpr {
    raw: String,
    query: JsonPath,
}

impl PathExpr {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Every concrete path in `root` addressed by this expression, in
    /// document order.
    pub fn resolve(&self, root: &Value) -> Vec<Vec<Step>> {
        self.query
            .query_located(root)
            .iter()
            .map(|node| {
                node.location()
                    .iter()
                    .map(|element| match element {
                        PathElement::Name(name) => Step::Key(name.to_string()),
                        PathElement::Index(index) => Step::Index(*index),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|steps| !steps.is_empty())
            .collect()
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a path expression.
pub fn parse(expr: &str) -> Result<PathExpr> {
    let raw = expr.trim();
    let invalid = |reason: String| Error::InvalidPath {
        path: expr.to_string(),
        reason,
    };

    if raw.is_empty() || raw == "$" {
        return Err(invalid("path must address at least one key".to_string()));
    }
    let query = if raw.starts_with('$') {
        raw.to_string()
    } else if raw.starts_with('[') {
        format!("${raw}")
    } else {
        format!("$.{raw}")
    };

    let query = JsonPath::parse(&query).map_err(|err| invalid(err.to_string()))?;
    Ok(PathExpr {
        raw: raw.to_string(),
        query,
    })
}

/// Render concrete steps using the syntax accepted by [`parse`].
pub fn format_path(steps: &[Step]) -> String {
    let mut out = String::new();
    for step in steps {
        match step {
            Step::Key(key) if is_shorthand_name(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Step::Key(key) => {
                out.push_str("['");
                for c in key.chars() {
                    match c {
                        '\'' | '\\' => {
                            out.push('\\');
                            out.push(c);
                        }
                        c if u32::from(c) < 0x20 => {
                            out.push_str(&format!("\\u{:04X}", u32::from(c)));
                        }
                        c => out.push(c),
                    }
                }
                out.push_str("']");
            }
            Step::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

// member-name-shorthand: a letter, '_' or non-ASCII first, then also digits
fn is_shorthand_name(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let name_first = |c: char| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii();
    name_first(first) && chars.all(|c| name_first(c) || c.is_ascii_digit())
}

/// Remove the node addressed by `steps`. Returns false when nothing was there.
pub fn remove_at(root: &mut Value, steps: &[Step]) -> bool {
    let Some((last, parents)) = steps.split_last() else {
        return false;
    };

    let mut node = root;
    for step in parents {
        let next = match (step, node) {
            (Step::Key(key), Value::Object(map)) => map.get_mut(key),
            (Step::Index(index), Value::Array(items)) => items.get_mut(*index),
            _ => None,
        };
        match next {
            Some(child) => node = child,
            None => return false,
        }
    }

    match (last, node) {
        (Step::Key(key), Value::Object(map)) => map.remove(key).is_some(),
        (Step::Index(index), Value::Array(items)) if *index < items.len() => {
            items.remove(*index);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resolved(expr: &str, tree: &Value) -> Vec<String> {
        parse(expr)
            .expect("parse")
            .resolve(tree)
            .iter()
            .map(|steps| format_path(steps))
            .collect()
    }

    #[test]
    fn root_prefix_is_optional() {
        let tree = json!({"resources": {"my.res": [0, 1, {"a": 1, "b": 2}]}});
        for expr in [
            "$.resources['my.res'][2].*",
            "resources['my.res'][2].*",
            "['resources']['my.res'][2][*]",
        ] {
            assert_eq!(
                resolved(expr, &tree),
                vec!["resources['my.res'][2].a", "resources['my.res'][2].b"],
                "{expr}"
            );
        }
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in ["", "$", "  ", "a.", "a[", "a[x]", "a['open", "a]b", "a.[", "a-b"] {
            assert!(parse(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }

    #[test]
    fn descendant_segments_reach_nested_keys() {
        let tree = json!({
            "config": {"token": "x"},
            "resources": {"users": {"token": "y", "cursor": 1}},
        });
        assert_eq!(
            resolved("$..token", &tree),
            vec!["config.token", "resources.users.token"]
        );
    }

    #[test]
    fn resolves_only_present_nodes() {
        let tree = json!({
            "config": {"token": "x", "retries": 3},
            "items": [{"id": 1}, {"name": "n"}],
        });

        assert_eq!(resolved("items[*].id", &tree), vec!["items[0].id"]);
        assert!(resolved("config.missing", &tree).is_empty());
        assert!(resolved("config.token.deeper", &tree).is_empty());
    }

    #[test]
    fn formatted_paths_resolve_back_to_their_node() {
        let tree = json!({
            "resources": {
                "we'ird.key": [0, 1, 2, 3, "x"],
                "user-data": {"1st": true},
                "tab\there": 7,
            }
        });

        let steps = vec![
            Step::Key("resources".to_string()),
            Step::Key("we'ird.key".to_string()),
            Step::Index(4),
        ];
        let rendered = format_path(&steps);
        assert_eq!(rendered, r"resources['we\'ird.key'][4]");
        assert_eq!(parse(&rendered).unwrap().resolve(&tree), vec![steps]);

        for path in ["resources['user-data']['1st']", r"resources['tab\u0009here']"] {
            let found = parse(path).unwrap().resolve(&tree);
            assert_eq!(found.len(), 1, "{path}");
            assert_eq!(format_path(&found[0]), path);
        }
    }

    #[test]
    fn remove_at_is_a_noop_for_missing_parents() {
        let mut tree = json!({"a": {"b": 1}});
        let missing = vec![Step::Key("x".to_string()), Step::Key("y".to_string())];
        let present = vec![Step::Key("a".to_string()), Step::Key("b".to_string())];

        assert!(!remove_at(&mut tree, &missing));
        assert!(remove_at(&mut tree, &present));
        assert!(!remove_at(&mut tree, &present));
        assert_eq!(tree, json!({"a": {}}));
    }
}
