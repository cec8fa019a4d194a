//! Database resource paths.

use std::fmt;

/// A `/`-separated path naming a collection or document, e.g.
/// `/db/apps/invoices/2024.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceUri(String);

impl ResourceUri {
    /// Create a new resource path. Trailing separators are dropped.
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        Self(path)
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path with its last segment removed, i.e. the owning collection of
    /// a document. The root has no parent and is returned unchanged.
    pub fn parent(&self) -> ResourceUri {
        match self.0.rfind('/') {
            Some(0) if self.0.len() > 1 => ResourceUri("/".to_string()),
            Some(idx) if idx > 0 => ResourceUri(self.0[..idx].to_string()),
            _ => self.clone(),
        }
    }

    /// The last path segment, i.e. the resource name.
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceUri {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ResourceUri {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent() {
        let doc = ResourceUri::new("/db/test/doc.xml");
        assert_eq!(doc.parent(), ResourceUri::new("/db/test"));
        assert_eq!(doc.parent().parent(), ResourceUri::new("/db"));
        assert_eq!(ResourceUri::new("/db").parent(), ResourceUri::new("/"));
        assert_eq!(ResourceUri::new("/").parent(), ResourceUri::new("/"));
    }

    #[test]
    fn test_trailing_separator_and_segment() {
        let col = ResourceUri::new("/db/test/");
        assert_eq!(col.as_str(), "/db/test");
        assert_eq!(col.last_segment(), "test");
    }
}
