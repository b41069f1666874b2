use std::{fmt, str::FromStr};

/// A set of namespace name patterns.
///
/// Patterns are written as `name` (exact match), `prefix*` (prefix match) or
/// `*suffix` (suffix match). Several patterns may be joined with commas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters {
    pub exact: Vec<String>,
    pub prefix: Vec<String>,
    pub suffix: Vec<String>,
}

/// Decides whether a namespace is managed by the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceFilter {
    pub excluded: Filters,
    pub included: Filters,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid namespace filter: {0:?}")]
pub struct InvalidFilter(String);

const WILDCARD: char = '*';

// === impl Filters ===

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefix.is_empty() && self.suffix.is_empty()
    }

    fn matches_exact(&self, name: &str) -> bool {
        self.exact.iter().any(|f| f == name)
    }

    fn matches_prefix(&self, name: &str) -> bool {
        self.prefix.iter().any(|f| name.starts_with(f.as_str()))
    }

    fn matches_suffix(&self, name: &str) -> bool {
        self.suffix.iter().any(|f| name.ends_with(f.as_str()))
    }

    fn push(&mut self, entry: &str) -> Result<(), InvalidFilter> {
        let (list, pattern) = if let Some(prefix) = entry.strip_suffix(WILDCARD) {
            (&mut self.prefix, prefix)
        } else if let Some(suffix) = entry.strip_prefix(WILDCARD) {
            (&mut self.suffix, suffix)
        } else {
            (&mut self.exact, entry)
        };

        if pattern.contains(WILDCARD) || pattern.contains(char::is_whitespace) {
            return Err(InvalidFilter(entry.to_string()));
        }

        list.push(pattern.to_string());
        Ok(())
    }
}

impl FromStr for Filters {
    type Err = InvalidFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut filters = Self::default();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            filters.push(entry)?;
        }
        Ok(filters)
    }
}

impl std::iter::FromIterator<Filters> for Filters {
    fn from_iter<T: IntoIterator<Item = Filters>>(iter: T) -> Self {
        iter.into_iter().fold(Self::default(), |mut acc, f| {
            acc.exact.extend(f.exact);
            acc.prefix.extend(f.prefix);
            acc.suffix.extend(f.suffix);
            acc
        })
    }
}

impl fmt::Display for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns = self
            .exact
            .iter()
            .cloned()
            .chain(self.prefix.iter().map(|p| format!("{p}{WILDCARD}")))
            .chain(self.suffix.iter().map(|s| format!("{WILDCARD}{s}")))
            .collect::<Vec<_>>();
        patterns.join(", ").fmt(f)
    }
}

// === impl NamespaceFilter ===

impl NamespaceFilter {
    pub fn new(excluded: Filters, included: Filters) -> Self {
        Self { excluded, included }
    }

    /// Returns true if the named namespace is in scope.
    ///
    /// Exact patterns take precedence over prefix and suffix patterns, and
    /// exclusions take precedence over inclusions of the same kind. When no
    /// inclusion pattern is configured, every namespace that is not excluded
    /// is in scope.
    pub fn in_scope(&self, name: &str) -> bool {
        let Self { excluded, included } = self;

        if excluded.matches_exact(name) {
            return false;
        }
        if included.matches_exact(name) {
            return true;
        }

        if excluded.matches_prefix(name) || excluded.matches_suffix(name) {
            return false;
        }
        if included.matches_prefix(name) || included.matches_suffix(name) {
            return true;
        }

        included.is_empty()
    }
}
