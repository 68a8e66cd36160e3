//! Resource name selectors.
//!
//! A selector is either an exact resource name, a glob using `*` and `?`, or
//! a regular expression prefixed with `re:` that must match at the start of
//! the name. A set of selectors compiles into one [`ResourcePattern`].

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde_json::Value;

use pipedrop_core::resource_keys;

use crate::errors::{PlanError, PlanResult};

const REGEX_PREFIX: &str = "re:";

/// Capability used by the planner to decide which resources are selected.
pub trait ResourceMatcher: fmt::Debug + Send + Sync {
    fn is_match(&self, resource: &str) -> bool;

    /// Human readable form of the pattern, recorded in the drop summary.
    fn describe(&self) -> String;
}

/// Compiled set of resource selectors.
#[derive(Debug, Clone)]
pub struct ResourcePattern {
    regex: Regex,
    selectors: Vec<String>,
}

impl ResourcePattern {
    /// Compile selectors into a single pattern.
    ///
    /// An empty selector set yields `None`: no resource is selected. It never
    /// means "all resources".
    pub fn compile<I, S>(selectors: I) -> PlanResult<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selectors: BTreeSet<String> = selectors
            .into_iter()
            .map(|selector| selector.as_ref().to_string())
            .collect();
        if selectors.is_empty() {
            return Ok(None);
        }

        let fragments = selectors
            .iter()
            .map(|selector| compile_selector(selector))
            .collect::<PlanResult<Vec<_>>>()?;
        let source = fragments.join("|");
        let regex =
            Regex::new(&source).map_err(|err| PlanError::pattern(&source, err.to_string()))?;

        Ok(Some(Self {
            regex,
            selectors: selectors.into_iter().collect(),
        }))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }
}

impl ResourceMatcher for ResourcePattern {
    fn is_match(&self, resource: &str) -> bool {
        self.regex.is_match(resource)
    }

    fn describe(&self) -> String {
        self.regex.as_str().to_string()
    }
}

fn compile_selector(selector: &str) -> PlanResult<String> {
    if selector.trim().is_empty() {
        return Err(PlanError::pattern(selector, "selector is empty"));
    }

    if let Some(body) = selector.strip_prefix(REGEX_PREFIX) {
        if body.is_empty() {
            return Err(PlanError::pattern(selector, "regular expression is empty"));
        }
        Regex::new(body).map_err(|err| PlanError::pattern(selector, err.to_string()))?;
        return Ok(format!("(?:^(?:{body}))"));
    }

    if selector.contains(['*', '?']) {
        let mut out = String::from("(?:^");
        for c in selector.chars() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        out.push_str("$)");
        return Ok(out);
    }

    Ok(format!("(?:^{}$)", regex::escape(selector)))
}

/// Resource keys with state in `source_state` that the matcher selects.
pub fn match_state_keys(matcher: &dyn ResourceMatcher, source_state: &Value) -> Vec<String> {
    resource_keys(source_state)
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .map(str::to_string)
        .collect()
}
