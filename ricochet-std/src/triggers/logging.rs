//! Logging trigger for lifecycle observation.

use ricochet_core::{
    ConfigError, Invocation, Phase, ResourceUri, Trigger, TriggerConfig, TriggerError, Txn,
};
use std::str::FromStr;
use tracing::Level;

macro_rules! log_at {
    ($level:expr, $($field:tt)+) => {
        match $level {
            Level::TRACE => tracing::trace!($($field)+),
            Level::DEBUG => tracing::debug!($($field)+),
            Level::INFO => tracing::info!($($field)+),
            Level::WARN => tracing::warn!($($field)+),
            _ => tracing::error!($($field)+),
        }
    };
}

/// A trigger that logs every call it receives and never fails.
///
/// The `level` parameter picks the tracing level (`trace` to `error`,
/// default `info`).
#[derive(Debug, Clone)]
pub struct LoggingTrigger {
    level: Level,
    collection: ResourceUri,
}

impl LoggingTrigger {
    /// Log at `level` for triggers attached to `collection`.
    pub fn new(collection: impl Into<ResourceUri>, level: Level) -> Self {
        Self {
            level,
            collection: collection.into(),
        }
    }

    /// Configure from trigger parameters.
    pub fn from_config(config: &TriggerConfig) -> Result<Self, ConfigError> {
        let level = match config.first_text("level") {
            Some(text) => Level::from_str(text.trim())
                .map_err(|_| ConfigError::invalid("level", format!("unknown level '{text}'")))?,
            None => Level::INFO,
        };
        Ok(Self::new(config.collection().clone(), level))
    }

    /// The level events are logged at.
    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LoggingTrigger {
    fn default() -> Self {
        Self::new("/db", Level::INFO)
    }
}

impl Trigger for LoggingTrigger {
    fn name(&self) -> &str {
        "logging"
    }

    fn fire(&mut self, txn: &Txn, invocation: &Invocation) -> Result<(), TriggerError> {
        let dst = invocation.dst.as_ref().map(ResourceUri::as_str).unwrap_or("");
        log_at!(
            self.level,
            collection = %self.collection,
            txn = txn.id(),
            phase = %invocation.phase,
            event = %invocation.event,
            src = %invocation.src,
            dst,
            "lifecycle event"
        );
        Ok(())
    }

    fn on_metadata_update(
        &mut self,
        txn: &Txn,
        phase: Phase,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        log_at!(
            self.level,
            collection = %self.collection,
            txn = txn.id(),
            %phase,
            %uri,
            "metadata update"
        );
        Ok(())
    }
}
