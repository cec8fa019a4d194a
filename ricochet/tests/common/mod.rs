#![allow(dead_code)]

use ricochet::{ParamValue, Params, ResourceUri, TriggerConfig, guard};
use std::thread;

// ============================================================================
// Helpers
// ============================================================================

pub fn uri(path: &str) -> ResourceUri {
    ResourceUri::new(path)
}

/// Run `test` on a fresh thread so it starts with an empty guard, and check
/// that it leaves the guard empty.
pub fn on_fresh_thread<F>(test: F)
where
    F: FnOnce() + Send + 'static,
{
    thread::spawn(move || {
        assert!(guard::is_empty(), "fresh thread starts with a guard entry");
        test();
        assert!(guard::is_empty(), "guard left open:\n{}", guard::dump());
    })
    .join()
    .unwrap();
}

// ============================================================================
// Extraction Configuration
// ============================================================================

pub fn extract(index: &str, name: &str) -> ParamValue {
    let mut map = Params::new();
    map.insert("index".into(), vec![index.into()]);
    map.insert("element-name".into(), vec![name.into()]);
    map.into()
}

pub fn path_rule(xpath: &str, entries: Vec<ParamValue>) -> ParamValue {
    let mut map = Params::new();
    map.insert("xpath".into(), vec![xpath.into()]);
    map.insert("extract".into(), entries);
    map.into()
}

/// `value[@key eq 'product_model']` split on `|` into name, code and a
/// variant that never occurs.
pub fn product_config() -> TriggerConfig {
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
