use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use pipedrop_core::jsonpath::{self, PathExpr};

use crate::errors::{PlanError, PlanResult};

/// Capability used by the planner to find state nodes to delete.
pub trait PathResolver: fmt::Debug + Send + Sync {
    /// Concrete paths present in `tree`, de-duplicated, in first-match order.
    fn resolve(&self, tree: &Value) -> Vec<String>;

    fn is_empty(&self) -> bool;
}

/// Path expressions compiled once and resolved against every source state.
#[derive(Debug, Clone, Default)]
pub struct CompiledPaths {
    exprs: Vec<PathExpr>,
}

impl CompiledPaths {
    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        self.exprs.iter().map(PathExpr::as_str)
    }
}

/// Compile state path expressions.
pub fn compile_paths<I, S>(paths: I) -> PlanResult<CompiledPaths>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let exprs = paths
        .into_iter()
        .map(|path| {
            jsonpath::parse(path.as_ref()).map_err(|err| match err {
                pipedrop_core::Error::InvalidPath { path, reason } => {
                    PlanError::InvalidPath { path, reason }
                }
                other => PlanError::Core(other),
            })
        })
        .collect::<PlanResult<Vec<_>>>()?;
    Ok(CompiledPaths { exprs })
}

impl PathResolver for CompiledPaths {
    fn resolve(&self, tree: &Value) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for expr in &self.exprs {
            for steps in expr.resolve(tree) {
                let path = jsonpath::format_path(&steps);
                if seen.insert(path.clone()) {
                    out.push(path);
                }
            }
        }
        out
    }

    fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolves_to_present_paths_without_duplicates() {
        let tree = json!({
            "config": {"token": "t", "user": "u"},
            "resources": {"users": {"cursor": 1}, "orders": {"cursor": 2}},
        });
        let paths = compile_paths(["config.token", "config.*", "resources.*.cursor", "missing.key"])
            .expect("compile");

        assert_eq!(
            paths.resolve(&tree),
            vec![
                "config.token",
                "config.user",
                "resources.orders.cursor",
                "resources.users.cursor",
            ]
        );
    }

    #[test]
    fn empty_inputs_resolve_to_nothing() {
        let none = compile_paths(Vec::<String>::new()).expect("compile");
        assert!(none.is_empty());
        assert!(none.resolve(&json!({"a": 1})).is_empty());

        let some = compile_paths(["a.b"]).expect("compile");
        assert!(some.resolve(&json!({})).is_empty());
        assert!(some.resolve(&Value::Null).is_empty());
    }

    #[test]
    fn malformed_paths_fail_to_compile() {
        let err = compile_paths(["config.token["]).expect_err("invalid path");
        assert!(matches!(err, PlanError::InvalidPath { .. }));
    }
}
