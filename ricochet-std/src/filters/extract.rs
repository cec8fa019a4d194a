//! # Extraction Filter
//!
//! Splits delimited text found at configured element paths into separate
//! child elements.
//!
//! Given the separator `|` and a rule for `/content/properties/value` with
//! the predicate `@key eq 'product_model'`, the element
//!
//! ```xml
//! <value key="product_model">SomeName|SomeCode12345</value>
//! ```
//!
//! leaves the filter as
//!
//! ```xml
//! <value key="product_model">
//!   <product_code>SomeCode12345</product_code>
//!   <product_name>SomeName</product_name>
//! </value>
//! ```
//!
//! # Configuration
//!
//! ```text
//! separator = "|"
//! path = {
//!     xpath   = "/content/properties/value[@key eq 'product_model']"
//!     extract = { index = 0, element-name = product_name }
//!     extract = { index = 1, element-name = product_code }
//! }
//! order = descending | ascending        (optional, default descending)
//! ```
//!
//! Entries of a rule are emitted descending by index unless `order` is
//! `ascending`. Indices past the end of the split text are skipped.

use ricochet_core::{
    Attributes, ConfigError, ElementName, EventSink, Invocation, Params, StreamError,
    StructuralEvent, StructuralFilter, Trigger, TriggerConfig, TriggerError, Txn,
    config::{first_text, require_text},
};
use regex::Regex;
use std::collections::HashMap;

/// Order in which the entries of a rule are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrder {
    /// Highest index first.
    #[default]
    Descending,
    /// Lowest index first.
    Ascending,
}

/// One split field and the element it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractEntry {
    /// Position in the split text.
    pub index: usize,
    /// Local name of the synthesized element.
    pub element_name: String,
}

/// What to extract under one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRule {
    /// Attribute `(name, value)` the element must carry, if any.
    pub predicate: Option<(String, String)>,
    /// Entries in emission order.
    pub entries: Vec<ExtractEntry>,
}

impl ExtractionRule {
    fn matches(&self, attributes: &Attributes) -> bool {
        match &self.predicate {
            None => true,
            Some((name, value)) => attributes
                .iter()
                .any(|a| a.name.local_name == *name && a.value == *value),
        }
    }
}

/// Structural filter splitting captured text into child elements.
#[derive(Debug)]
pub struct ExtractionFilter {
    separator: Regex,
    rules: HashMap<String, ExtractionRule>,
    path: Vec<(String, String)>,
    capture: Option<String>,
    buffer: String,
}

impl ExtractionFilter {
    /// Build from a trigger configuration.
    pub fn from_config(config: &TriggerConfig) -> Result<Self, ConfigError> {
        Self::from_params(config.params())
    }

    /// Build from raw parameters.
    pub fn from_params(params: &Params) -> Result<Self, ConfigError> {
        let separator = separator_pattern(require_text(params, "separator")?)?;
        let order = match first_text(params, "order").map(str::trim) {
            None | Some("descending") => EntryOrder::Descending,
            Some("ascending") => EntryOrder::Ascending,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "order",
                    format!("expected 'ascending' or 'descending', got '{other}'"),
                ));
            }
        };

        let mut rules = HashMap::new();
        for path in params.get("path").into_iter().flatten() {
            let path = path
                .as_map()
                .ok_or_else(|| ConfigError::invalid("path", "expected nested parameters"))?;
            let (key, rule) = parse_rule(path, order)?;
            rules.insert(key, rule);
        }
        if rules.is_empty() {
            return Err(ConfigError::Missing("path".to_string()));
        }

        Ok(Self::new(separator, rules))
    }

    /// Build from already parsed rules keyed by path.
    pub fn new(separator: Regex, rules: HashMap<String, ExtractionRule>) -> Self {
        Self {
            separator,
            rules,
            path: Vec::new(),
            capture: None,
            buffer: String::new(),
        }
    }

    /// The rule configured for `path`.
    pub fn rule(&self, path: &str) -> Option<&ExtractionRule> {
        self.rules.get(path)
    }

    /// The current element path, e.g. `/content/properties/value`.
    pub fn current_path(&self) -> String {
        let mut out = String::new();
        for (_, local_name) in &self.path {
            out.push('/');
            out.push_str(local_name);
        }
        out
    }

    /// Whether character data is currently being captured.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn start_element(&mut self, name: &ElementName, attributes: &Attributes) {
        if let Some(open) = self.capture.take() {
            tracing::trace!(path = %open, "discarding unfinished capture");
        }
        self.path.push((name.namespace.clone(), name.local_name.clone()));

        let path = self.current_path();
        if self.rules.get(&path).is_some_and(|rule| rule.matches(attributes)) {
            self.buffer.clear();
            self.capture = Some(path);
        }
    }

    fn flush(&self, path: &str, next: &mut dyn EventSink) -> Result<(), StreamError> {
        let Some(rule) = self.rules.get(path) else {
            return Ok(());
        };
        let pieces = split(&self.separator, &self.buffer);
        for entry in &rule.entries {
            let Some(piece) = pieces.get(entry.index) else {
                continue;
            };
            let name = ElementName::local(entry.element_name.as_str());
            next.receive(StructuralEvent::start(name.clone(), Attributes::new()))?;
            next.receive(StructuralEvent::text(*piece))?;
            next.receive(StructuralEvent::end(name))?;
        }
        Ok(())
    }
}

impl StructuralFilter for ExtractionFilter {
    fn receive(
        &mut self,
        event: StructuralEvent,
        next: &mut dyn EventSink,
    ) -> Result<(), StreamError> {
        match event {
            StructuralEvent::StartDocument => {
                self.path.clear();
                self.capture = None;
                next.receive(event)
            }
            StructuralEvent::StartElement {
                ref name,
                ref attributes,
            } => {
                self.start_element(name, attributes);
                next.receive(event)
            }
            StructuralEvent::Characters(text) if self.capture.is_some() => {
                self.buffer.push_str(&text);
                Ok(())
            }
            StructuralEvent::EndElement { .. } => {
                if let Some(path) = self.capture.take() {
                    self.flush(&path, next)?;
                    self.buffer.clear();
                }
                if self.path.pop().is_none() {
                    return Err(StreamError::Malformed(
                        "end tag without matching start tag".to_string(),
                    ));
                }
                next.receive(event)
            }
            other => next.receive(other),
        }
    }
}

/// Compile the separator. Single-character separators `|`, `,`, `$` and `^`
/// are taken literally; anything else is a regular expression. An empty
/// separator is rejected, as it would split between every character.
pub fn separator_pattern(separator: &str) -> Result<Regex, ConfigError> {
    if separator.is_empty() {
        return Err(ConfigError::invalid("separator", "must not be empty"));
    }
    let pattern = match separator {
        "|" | "," | "$" | "^" => regex::escape(separator),
        other => other.to_string(),
    };
    Regex::new(&pattern).map_err(|err| ConfigError::invalid("separator", err.to_string()))
}

/// Split like `String.split` in Java: input without a match yields itself,
/// otherwise trailing empty pieces are dropped.
fn split<'t>(separator: &Regex, text: &'t str) -> Vec<&'t str> {
    if !separator.is_match(text) {
        return vec![text];
    }
    let mut pieces: Vec<&str> = separator.split(text).collect();
    while pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    pieces
}

/// Parse `/a/b/c`, optionally followed by `[@name eq 'value']` or
/// `[@name = "value"]`.
fn parse_xpath(xpath: &str) -> Result<(String, Option<(String, String)>), ConfigError> {
    let unsupported = || ConfigError::invalid("xpath", format!("unsupported expression '{xpath}'"));
    let trimmed = xpath.trim();
    let (path, predicate) = match trimmed.split_once('[') {
        None => (trimmed, None),
        Some((path, rest)) => {
            let inner = rest.trim_end().strip_suffix(']').ok_or_else(unsupported)?;
            (path, Some(parse_predicate(inner).ok_or_else(unsupported)?))
        }
    };

    let path = path.trim().trim_end_matches('/');
    if !path.starts_with('/') || path.contains(char::is_whitespace) {
        return Err(unsupported());
    }
    Ok((path.to_string(), predicate))
}

fn parse_predicate(inner: &str) -> Option<(String, String)> {
    let inner = inner.trim().strip_prefix('@')?;
    let name_end = inner
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(inner.len());
    let (name, rest) = inner.split_at(name_end);
    let rest = rest.trim_start();
    let value = rest
        .strip_prefix("eq")
        .or_else(|| rest.strip_prefix('='))?
        .trim();
    let unquoted = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))?;
    (!name.is_empty()).then(|| (name.to_string(), unquoted.to_string()))
}

fn parse_rule(
    params: &Params,
    order: EntryOrder,
) -> Result<(String, ExtractionRule), ConfigError> {
    let (path, predicate) = parse_xpath(require_text(params, "xpath")?)?;

    let mut entries = Vec::new();
    for extract in params.get("extract").into_iter().flatten() {
        let extract = extract
            .as_map()
            .ok_or_else(|| ConfigError::invalid("extract", "expected nested parameters"))?;
        let index = require_text(extract, "index")?;
        let index = index.trim().parse::<usize>().map_err(|err| {
            ConfigError::invalid("index", format!("'{index}' is not an index: {err}"))
        })?;
        let element_name = require_text(extract, "element-name")?.trim();
        if element_name.is_empty() {
            return Err(ConfigError::invalid("element-name", "must not be empty"));
        }
        entries.push(ExtractEntry {
            index,
            element_name: element_name.to_string(),
        });
    }
    if entries.is_empty() {
        return Err(ConfigError::Missing("extract".to_string()));
    }

    match order {
        EntryOrder::Descending => entries.sort_by(|a, b| b.index.cmp(&a.index)),
        EntryOrder::Ascending => entries.sort_by_key(|e| e.index),
    }

    Ok((path, ExtractionRule { predicate, entries }))
}

/// Trigger contributing an [`ExtractionFilter`] to the structural chain.
///
/// Its lifecycle calls do nothing.
#[derive(Debug)]
pub struct ExtractionTrigger {
    filter: ExtractionFilter,
}

impl ExtractionTrigger {
    /// Configure from the trigger's parameters.
    pub fn new(config: &TriggerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            filter: ExtractionFilter::from_config(config)?,
        })
    }

    /// The underlying filter.
    pub fn filter(&self) -> &ExtractionFilter {
        &self.filter
    }
}

impl Trigger for ExtractionTrigger {
    fn name(&self) -> &str {
        "extraction"
    }

    fn fire(&mut self, _txn: &Txn, _invocation: &Invocation) -> Result<(), TriggerError> {
        Ok(())
    }

    fn as_filter(&mut self) -> Option<&mut dyn StructuralFilter> {
        Some(&mut self.filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::ParamValue;

    fn extract(index: &str, name: &str) -> ParamValue {
        let mut map = Params::new();
        map.insert("index".into(), vec![index.into()]);
        map.insert("element-name".into(), vec![name.into()]);
        map.into()
    }

    fn path_rule(xpath: &str, entries: Vec<ParamValue>) -> ParamValue {
        let mut map = Params::new();
        map.insert("xpath".into(), vec![xpath.into()]);
        map.insert("extract".into(), entries);
        map.into()
    }

    fn product_config() -> TriggerConfig {
        TriggerConfig::new("/db/products")
            .with_param("separator", "|")
            .with_param(
                "path",
                path_rule(
                    "/content/properties/value[@key eq 'product_model']",
                    vec![
                        extract("0", "product_name"),
                        extract("1", "product_code"),
                        extract("2", "product_variant"),
                    ],
                ),
            )
    }

    fn value(key: &str) -> StructuralEvent {
        StructuralEvent::start(
            ElementName::local("value"),
            Attributes::new().with("key", key),
        )
    }

    fn el(name: &str) -> StructuralEvent {
        StructuralEvent::start(ElementName::local(name), Attributes::new())
    }

    fn end(name: &str) -> StructuralEvent {
        StructuralEvent::end(ElementName::local(name))
    }

    fn run(filter: &mut ExtractionFilter, events: Vec<StructuralEvent>) -> Vec<StructuralEvent> {
        let mut out: Vec<StructuralEvent> = Vec::new();
        for event in events {
            filter.receive(event, &mut out).unwrap();
        }
        out
    }

    #[test]
    fn test_rule_parsing() {
        let filter = ExtractionFilter::from_config(&product_config()).unwrap();
        let rule = filter.rule("/content/properties/value").unwrap();
        assert_eq!(
            rule.predicate,
            Some(("key".to_string(), "product_model".to_string()))
        );
        let indices: Vec<_> = rule.entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, [2, 1, 0]);
    }

    #[test]
    fn test_ascending_order_opt_in() {
        let config = product_config().with_param("order", "ascending");
        let filter = ExtractionFilter::from_config(&config).unwrap();
        let indices: Vec<_> = filter
            .rule("/content/properties/value")
            .unwrap()
            .entries
            .iter()
            .map(|e| e.index)
            .collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn test_missing_separator() {
        let config = TriggerConfig::new("/db/products").with_param(
            "path",
            path_rule("/a/b", vec![extract("0", "x")]),
        );
        assert_eq!(
            ExtractionFilter::from_config(&config).unwrap_err(),
            ConfigError::Missing("separator".into())
        );
    }

    #[test]
    fn test_empty_separator() {
        let config = TriggerConfig::new("/db/products")
            .with_param("separator", "")
            .with_param("path", path_rule("/a/b", vec![extract("0", "x")]));
        assert_eq!(
            ExtractionFilter::from_config(&config).unwrap_err(),
            ConfigError::invalid("separator", "must not be empty")
        );
    }

    #[test]
    fn test_invalid_index() {
        let config = TriggerConfig::new("/db/products")
            .with_param("separator", ",")
            .with_param("path", path_rule("/a/b", vec![extract("first", "x")]));
        assert!(matches!(
            ExtractionFilter::from_config(&config),
            Err(ConfigError::Invalid { ref name, .. }) if name == "index"
        ));
    }

    #[test]
    fn test_double_quoted_predicate() {
        let config = TriggerConfig::new("/db/x")
            .with_param("separator", ";")
            .with_param(
                "path",
                path_rule(r#"/a/b[@type = "csv"]"#, vec![extract("0", "first")]),
            );
        let filter = ExtractionFilter::from_config(&config).unwrap();
        assert_eq!(
            filter.rule("/a/b").unwrap().predicate,
            Some(("type".to_string(), "csv".to_string()))
        );
    }

    #[test]
    fn test_extraction_end_to_end() {
        let mut filter = ExtractionFilter::from_config(&product_config()).unwrap();
        let out = run(
            &mut filter,
            vec![
                StructuralEvent::StartDocument,
                el("content"),
                el("properties"),
                value("product_model"),
                StructuralEvent::text("SomeName|"),
                StructuralEvent::text("SomeCode12345"),
                end("value"),
                end("properties"),
                end("content"),
                StructuralEvent::EndDocument,
            ],
        );

        assert_eq!(
            out,
            vec![
                StructuralEvent::StartDocument,
                el("content"),
                el("properties"),
                value("product_model"),
                el("product_code"),
                StructuralEvent::text("SomeCode12345"),
                end("product_code"),
                el("product_name"),
                StructuralEvent::text("SomeName"),
                end("product_name"),
                end("value"),
                end("properties"),
                end("content"),
                StructuralEvent::EndDocument,
            ]
        );
        assert!(!filter.is_capturing());
        assert_eq!(filter.current_path(), "");
    }

    #[test]
    fn test_predicate_mismatch_passes_text_through() {
        let mut filter = ExtractionFilter::from_config(&product_config()).unwrap();
        let events = vec![
            el("content"),
            el("properties"),
            value("colour"),
            StructuralEvent::text("red|blue"),
            end("value"),
            end("properties"),
            end("content"),
        ];
        assert_eq!(run(&mut filter, events.clone()), events);
    }

    #[test]
    fn test_nested_start_discards_capture() {
        let config = TriggerConfig::new("/db/x")
            .with_param("separator", ",")
            .with_param("path", path_rule("/a", vec![extract("0", "first")]));
        let mut filter = ExtractionFilter::from_config(&config).unwrap();
        let out = run(
            &mut filter,
            vec![
                el("a"),
                StructuralEvent::text("x,y"),
                el("b"),
                StructuralEvent::text("inner"),
                end("b"),
                end("a"),
            ],
        );
        assert_eq!(
            out,
            vec![
                el("a"),
                el("b"),
                StructuralEvent::text("inner"),
                end("b"),
                end("a"),
            ]
        );
    }

    #[test]
    fn test_java_style_split() {
        let pipe = separator_pattern("|").unwrap();
        assert_eq!(split(&pipe, "a|b||"), ["a", "b"]);
        assert_eq!(split(&pipe, "a||b"), ["a", "", "b"]);
        assert_eq!(split(&pipe, ""), [""]);

        let spaces = separator_pattern(r"\s+").unwrap();
        assert_eq!(split(&spaces, "one two   three"), ["one", "two", "three"]);
    }

    #[test]
    fn test_trigger_exposes_filter() {
        let mut trigger = ExtractionTrigger::new(&product_config()).unwrap();
        assert!(trigger.as_filter().is_some());
        let inv = Invocation::new(
            ricochet_core::Phase::Before,
            ricochet_core::EventKind::CREATE_DOCUMENT,
            "/db/products/p.xml".into(),
        );
        trigger.fire(&Txn::new(1), &inv).unwrap();
    }
}
