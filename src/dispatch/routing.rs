//! Ordered regex routing of request paths to pools.
//!
//! Rules are evaluated in registration order and the first pattern that
//! matches the whole path wins, so a catch-all such as `.*` belongs at
//! the end. Patterns are compiled when the rule is registered; after the
//! registration phase the table is read-only and shared without locking.

use std::sync::Arc;

use regex::Regex;

use super::balancer::Pool;
use crate::error::DispatchError;

/// Compile a route pattern so that it must match the entire path.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    regex: Regex,
    pool: Arc<Pool>,
}

#[derive(Debug, Default)]
pub struct Router {
    rules: Vec<Rule>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, pattern: &str, pool: Pool) -> Result<(), DispatchError> {
        let regex = compile_pattern(pattern).map_err(|e| DispatchError::InvalidPool {
            pool: pattern.to_string(),
            reason: format!("pattern does not compile: {e}"),
        })?;
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            regex,
            pool: Arc::new(pool),
        });
        Ok(())
    }

    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<&Arc<Pool>> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(path))
            .map(|rule| &rule.pool)
    }

    /// Registered `(pattern, pool)` pairs in priority order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Arc<Pool>)> {
        self.rules.iter().map(|r| (r.pattern.as_str(), &r.pool))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
