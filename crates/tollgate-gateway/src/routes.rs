//! Path-prefix routing table.

use tollgate_config::RouteEntry;

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    prefix: String,
    backend: String,
}

impl Route {
    /// Create a route. Trailing slashes on `prefix` are ignored.
    pub fn new(prefix: impl Into<String>, backend: impl Into<String>) -> Self {
        let entry = RouteEntry::new(prefix, backend);
        Self {
            prefix: entry.normalized_prefix().to_string(),
            backend: entry.backend,
        }
    }

    /// Path prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Backend `host[:port]`.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// `true` if `path` is the prefix or lies beneath it.
    ///
    /// `/api/users` matches `/api/users` and `/api/users/7`, not `/api/usersx`.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Routes ordered longest prefix first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a table from config entries.
    pub fn from_entries(entries: &[RouteEntry]) -> Self {
        entries
            .iter()
            .map(|e| Route::new(e.prefix.clone(), e.backend.clone()))
            .collect()
    }

    /// Longest matching route for `path`.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Routes in match order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// `true` if the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<Route> for RouteTable {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        let mut routes: Vec<Route> = iter.into_iter().collect();
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }
}
