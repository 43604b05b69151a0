//! Wildcard path patterns.
//!
//! A pattern is a `/`-separated list of segments. `{name}` captures one
//! path segment under `name`, `*` captures one segment without naming it,
//! anything else must match literally. Patterns compile to an anchored
//! regular expression, so `users/{id}` never matches `users/1/posts/2`.

use std::collections::BTreeMap;

use fauxstore_core::{StoreError, StoreResult};
use regex::Regex;

/// A compiled trigger pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    /// One entry per capture group, `None` for `*`.
    captures: Vec<Option<String>>,
}

impl PathPattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPattern`] for an empty pattern, an empty
    /// segment, a segment with unbalanced or partial braces, an empty
    /// parameter name, or a parameter name used twice.
    pub fn parse(pattern: &str) -> StoreResult<Self> {
        let invalid = |reason: &str| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let mut expr = String::from("^");
        let mut captures: Vec<Option<String>> = Vec::new();
        for (idx, segment) in pattern.split('/').enumerate() {
            if idx > 0 {
                expr.push('/');
            }
            if segment.is_empty() {
                return Err(invalid("pattern contains an empty segment"));
            }
            if segment == "*" {
                expr.push_str("([^/]+)");
                captures.push(None);
                continue;
            }
            if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                if name.is_empty() {
                    return Err(invalid("parameter name is empty"));
                }
                if name.contains(['{', '}']) {
                    return Err(invalid("unbalanced braces"));
                }
                if captures.iter().flatten().any(|existing| existing == name) {
                    return Err(invalid("duplicate parameter name"));
                }
                expr.push_str("([^/]+)");
                captures.push(Some(name.to_string()));
                continue;
            }
            if segment.contains(['{', '}']) {
                return Err(invalid("braces must wrap a whole segment"));
            }
            expr.push_str(&regex::escape(segment));
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            captures,
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the parameters this pattern captures, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.captures.iter().flatten().map(String::as_str)
    }

    /// Matches `path`, returning the named captures on success.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let params = self
            .captures
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| {
                let name = name.as_ref()?;
                let value = caps.get(idx + 1)?;
                Some((name.clone(), value.as_str().to_string()))
            })
            .collect();
        Some(params)
    }
}
