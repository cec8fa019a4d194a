//! # Global Triggers
//!
//! Triggers configured at database level rather than on one collection.
//! They are stored as named factories and instantiated for every collection
//! dispatcher, ahead of the collection's own triggers.
//!
//! With the `inventory` feature, factories can also be submitted statically
//! with [`CollectedTrigger`] and are picked up in priority order.

use ricochet_core::{ResourceUri, Trigger, TriggerError};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Builds a trigger instance for the dispatcher of one collection.
pub type TriggerFactory =
    Arc<dyn Fn(&ResourceUri) -> Result<Box<dyn Trigger>, TriggerError> + Send + Sync>;

struct Entry {
    name: String,
    factory: TriggerFactory,
}

/// Registry of named global trigger factories, in registration order.
#[derive(Default)]
pub struct GlobalTriggers {
    entries: RwLock<Vec<Entry>>,
}

impl GlobalTriggers {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static GlobalTriggers {
        static GLOBAL: OnceLock<GlobalTriggers> = OnceLock::new();
        GLOBAL.get_or_init(GlobalTriggers::new)
    }

    /// Add a factory under `name`, replacing any factory of the same name in
    /// place.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ResourceUri) -> Result<Box<dyn Trigger>, TriggerError> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: TriggerFactory = Arc::new(factory);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.factory = factory,
            None => entries.push(Entry { name, factory }),
        }
    }

    /// Remove the factory registered under `name`.
    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.name != name);
        entries.len() != before
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Number of registered factories, excluding statically collected ones.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Instantiate every global trigger for `collection`.
    ///
    /// Registered factories come first, in registration order, followed by
    /// statically collected ones when the `inventory` feature is on.
    pub fn instantiate(
        &self,
        collection: &ResourceUri,
    ) -> Result<Vec<Box<dyn Trigger>>, TriggerError> {
        // clone the factories so none runs under the lock
        let factories: Vec<TriggerFactory> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.factory.clone())
            .collect();

        let triggers = factories
            .iter()
            .map(|factory| factory(collection))
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(feature = "inventory")]
        let triggers = {
            let mut triggers = triggers;
            triggers.extend(collected::instantiate(collection)?);
            triggers
        };

        Ok(triggers)
    }
}

#[cfg(feature = "inventory")]
pub use collected::CollectedTrigger;

#[cfg(feature = "inventory")]
mod collected {
    use ricochet_core::{ResourceUri, Trigger, TriggerError};

    /// A global trigger factory submitted through `inventory`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// inventory::submit! {
    ///     CollectedTrigger::new("audit", 10, |_| Ok(Box::new(LoggingTrigger::default())))
    /// }
    /// ```
    pub struct CollectedTrigger {
        /// Name for debugging.
        pub name: &'static str,
        /// Priority for ordering (higher runs first).
        pub priority: i32,
        /// Builds the trigger for one collection.
        pub factory: fn(&ResourceUri) -> Result<Box<dyn Trigger>, TriggerError>,
    }

    impl CollectedTrigger {
        /// Create a new collected entry.
        pub const fn new(
            name: &'static str,
            priority: i32,
            factory: fn(&ResourceUri) -> Result<Box<dyn Trigger>, TriggerError>,
        ) -> Self {
            Self {
                name,
                priority,
                factory,
            }
        }
    }

    inventory::collect!(CollectedTrigger);

    pub(super) fn instantiate(
        collection: &ResourceUri,
    ) -> Result<Vec<Box<dyn Trigger>>, TriggerError> {
        let mut entries: Vec<&CollectedTrigger> = inventory::iter::<CollectedTrigger>
            .into_iter()
            .collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));

        entries
            .into_iter()
            .map(|entry| {
                tracing::trace!(name = entry.name, "instantiating collected trigger");
                (entry.factory)(collection)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTrigger;

    #[test]
    fn test_instantiate_in_registration_order() {
        let registry = GlobalTriggers::new();
        registry.register("first", |_| Ok(Box::new(RecordingTrigger::named("first"))));
        registry.register("second", |_| Ok(Box::new(RecordingTrigger::named("second"))));

        let triggers = registry.instantiate(&ResourceUri::new("/db/x")).unwrap();
        let names: Vec<_> = triggers.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = GlobalTriggers::new();
        registry.register("audit", |_| Ok(Box::new(RecordingTrigger::named("old"))));
        registry.register("other", |_| Ok(Box::new(RecordingTrigger::named("other"))));
        registry.register("audit", |_| Ok(Box::new(RecordingTrigger::named("new"))));

        assert_eq!(registry.names(), ["audit", "other"]);
        let triggers = registry.instantiate(&ResourceUri::new("/db/x")).unwrap();
        assert_eq!(triggers[0].name(), "new");

        assert!(registry.unregister("audit"));
        assert!(!registry.unregister("audit"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_factory_error_propagates() {
        let registry = GlobalTriggers::new();
        registry.register("broken", |collection: &ResourceUri| {
            Err(TriggerError::execution(
                "broken",
                format!("cannot attach to {collection}"),
            ))
        });
        let err = registry.instantiate(&ResourceUri::new("/db/x")).err().unwrap();
        assert!(err.to_string().contains("broken"));
    }

    #[cfg(feature = "inventory")]
    mod collected {
        use super::*;

        fn low(_: &ResourceUri) -> Result<Box<dyn Trigger>, TriggerError> {
            Ok(Box::new(RecordingTrigger::named("collected-low")))
        }

        fn high(_: &ResourceUri) -> Result<Box<dyn Trigger>, TriggerError> {
            Ok(Box::new(RecordingTrigger::named("collected-high")))
        }

        inventory::submit! {
            CollectedTrigger::new("collected-low", 1, low)
        }

        inventory::submit! {
            CollectedTrigger::new("collected-high", 5, high)
        }

        #[test]
        fn test_collected_follow_registered_by_priority() {
            let registry = GlobalTriggers::new();
            registry.register("registered", |_| {
                Ok(Box::new(RecordingTrigger::named("registered")))
            });

            let triggers = registry.instantiate(&ResourceUri::new("/db/x")).unwrap();
            let names: Vec<_> = triggers
                .iter()
                .map(|t| t.name())
                .filter(|name| *name == "registered" || name.starts_with("collected-"))
                .collect();
            assert_eq!(names, ["registered", "collected-high", "collected-low"]);
        }
    }
}
