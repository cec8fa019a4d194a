//! Trigger configuration as supplied by the collection configuration loader.
//!
//! A [`TriggerConfig`] carries the owning collection, the declared event
//! subset and an ordered parameter map. Parameter values are usually plain
//! text; nested parameter elements (as used by the extraction filter) arrive
//! as [`ParamValue::Map`].

use crate::{error::ConfigError, event::EventSet, uri::ResourceUri};
use indexmap::IndexMap;

/// Ordered parameter map: name to ordered values.
pub type Params = IndexMap<String, Vec<ParamValue>>;

/// One parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A plain text value.
    Text(String),
    /// A nested parameter block.
    Map(Params),
}

impl ParamValue {
    /// The text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text),
            ParamValue::Map(_) => None,
        }
    }

    /// The nested parameters, if this is a map value.
    pub fn as_map(&self) -> Option<&Params> {
        match self {
            ParamValue::Map(map) => Some(map),
            ParamValue::Text(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(text: &str) -> Self {
        ParamValue::Text(text.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(text: String) -> Self {
        ParamValue::Text(text)
    }
}

impl From<Params> for ParamValue {
    fn from(map: Params) -> Self {
        ParamValue::Map(map)
    }
}

/// Configuration of a single trigger, immutable once built.
///
/// # Example
///
/// ```rust,ignore
/// let config = TriggerConfig::new("/db/invoices")
///     .with_events(EventSet::CREATE_DOCUMENT | EventSet::UPDATE_DOCUMENT)
///     .with_param("url", "xmldb:exist:///db/triggers/audit.xq")
///     .with_param("bindingPrefix", "audit");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    collection: ResourceUri,
    events: EventSet,
    params: Params,
}

impl TriggerConfig {
    /// Create an empty configuration for triggers of `collection`.
    pub fn new(collection: impl Into<ResourceUri>) -> Self {
        Self {
            collection: collection.into(),
            events: EventSet::empty(),
            params: Params::new(),
        }
    }

    /// Set the declared event subset.
    pub fn with_events(mut self, events: EventSet) -> Self {
        self.events = events;
        self
    }

    /// Append a value to parameter `name`.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Take the declared events from the `event` parameter, in addition to any
    /// already set.
    pub fn with_event_param(mut self) -> Result<Self, ConfigError> {
        let declared = EventSet::parse(self.texts("event"))?;
        self.events |= declared;
        Ok(self)
    }

    /// The collection that owns the trigger.
    pub fn collection(&self) -> &ResourceUri {
        &self.collection
    }

    /// The declared event subset.
    pub fn events(&self) -> EventSet {
        self.events
    }

    /// All parameters in declaration order.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// First text value of `name`, if any.
    pub fn first_text(&self, name: &str) -> Option<&str> {
        first_text(&self.params, name)
    }

    /// First text value of `name`, or [`ConfigError::Missing`].
    pub fn require_text(&self, name: &str) -> Result<&str, ConfigError> {
        require_text(&self.params, name)
    }

    /// All text values of `name`.
    pub fn texts<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.params
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(ParamValue::as_text)
    }

    /// All nested map values of `name`.
    pub fn maps<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Params> + use<'a> {
        self.params
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(ParamValue::as_map)
    }
}

/// First text value of `name` in a (possibly nested) parameter map.
pub fn first_text<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(|values| values.iter().find_map(ParamValue::as_text))
}

/// First text value of `name`, or [`ConfigError::Missing`].
pub fn require_text<'a>(params: &'a Params, name: &str) -> Result<&'a str, ConfigError> {
    first_text(params, name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn test_params_keep_order() {
        let config = TriggerConfig::new("/db/test")
            .with_param("b", "1")
            .with_param("a", "2")
            .with_param("b", "3");

        let names: Vec<_> = config.params().keys().map(String::as_str).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(config.texts("b").collect::<Vec<_>>(), ["1", "3"]);
        assert_eq!(config.first_text("a"), Some("2"));
    }

    #[test]
    fn test_require_missing() {
        let config = TriggerConfig::new("/db/test");
        assert_eq!(
            config.require_text("url").unwrap_err(),
            ConfigError::Missing("url".into())
        );
    }

    #[test]
    fn test_event_param() {
        let config = TriggerConfig::new("/db/test")
            .with_param("event", "create-document,update-document")
            .with_event_param()
            .unwrap();
        assert!(config.events().includes(EventKind::UPDATE_DOCUMENT));
        assert!(!config.events().includes(EventKind::DELETE_DOCUMENT));
    }

    #[test]
    fn test_nested_maps() {
        let mut nested = Params::new();
        nested.insert("xpath".into(), vec!["/a/b".into()]);
        let config = TriggerConfig::new("/db/test").with_param("path", nested);

        let maps: Vec<_> = config.maps("path").collect();
        assert_eq!(maps.len(), 1);
        assert_eq!(first_text(maps[0], "xpath"), Some("/a/b"));
        assert_eq!(config.first_text("path"), None);
    }
}
