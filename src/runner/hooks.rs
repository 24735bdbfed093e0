//! Lifecycle hooks and the label filters that scope them.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::runner::context::TestContext;
use crate::runner::flow::Step;

/// Test body or before/after hook.
pub type HookFn = Arc<dyn Fn(&TestContext) -> Step + Send + Sync>;

/// Around hook: receives a `resume` callback running before-hooks, body and
/// after-hooks. Not calling it skips all of them.
pub type AroundFn =
    Arc<dyn Fn(&TestContext, &mut dyn FnMut() -> Step) -> Step + Send + Sync>;

/// Matches a test label exactly or by pattern.
#[derive(Debug, Clone)]
pub enum LabelMatcher {
    Exact(String),
    Pattern(Regex),
}

impl LabelMatcher {
    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == label,
            Self::Pattern(pattern) => pattern.is_match(label),
        }
    }
}

impl From<&str> for LabelMatcher {
    fn from(value: &str) -> Self {
        Self::Exact(value.to_string())
    }
}

impl From<String> for LabelMatcher {
    fn from(value: String) -> Self {
        Self::Exact(value)
    }
}

impl From<Regex> for LabelMatcher {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(label) => write!(f, "{label:?}"),
            Self::Pattern(pattern) => write!(f, "/{}/", pattern.as_str()),
        }
    }
}

/// Which tests a hook applies to.
///
/// No inclusion matchers means every test; `except` matchers always win.
#[derive(Debug, Clone, Default)]
pub struct HookFilter {
    include: Vec<LabelMatcher>,
    except: Vec<LabelMatcher>,
}

impl HookFilter {
    /// Applies to every test.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Applies to tests matching `matcher`.
    #[must_use]
    pub fn only(matcher: impl Into<LabelMatcher>) -> Self {
        Self {
            include: vec![matcher.into()],
            except: Vec::new(),
        }
    }

    /// Applies to tests matching any of `matchers`.
    #[must_use]
    pub fn any_of<M: Into<LabelMatcher>>(matchers: impl IntoIterator<Item = M>) -> Self {
        Self {
            include: matchers.into_iter().map(Into::into).collect(),
            except: Vec::new(),
        }
    }

    /// Exclude tests matching `matcher`.
    #[must_use]
    pub fn except(mut self, matcher: impl Into<LabelMatcher>) -> Self {
        self.except.push(matcher.into());
        self
    }

    #[must_use]
    pub fn except_any<M: Into<LabelMatcher>>(
        mut self,
        matchers: impl IntoIterator<Item = M>,
    ) -> Self {
        self.except.extend(matchers.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        if self.except.iter().any(|m| m.matches(label)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|m| m.matches(label))
    }
}

/// Before or after hook.
#[derive(Clone)]
pub struct Hook {
    pub filter: HookFilter,
    pub run: HookFn,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Around hook.
#[derive(Clone)]
pub struct AroundHook {
    pub filter: HookFilter,
    pub run: AroundFn,
}

impl fmt::Debug for AroundHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AroundHook")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
