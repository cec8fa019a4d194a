//! # Script Trigger
//!
//! A trigger whose logic is a user script run by an external
//! [`ScriptEngine`]. It works in one of two modes per event:
//!
//! - **Whole script**: for events listed in the trigger's declared event set.
//!   The script runs once with the event described in external variables.
//! - **Function dispatch**: for every other event. The script is a module
//!   and the function `{before|after}-{action}-{target}` is called with the
//!   affected resources. A module without that function ignores the event.
//!
//! # Configuration
//!
//! | parameter       | meaning |
//! |-----------------|---------|
//! | `url`           | location of the script (preferred) |
//! | `query`         | inline script text |
//! | `bindingPrefix` | variable prefix, default `local` |
//! | `event`         | events run in whole-script mode |
//! | anything else   | bound as a string variable under the prefix |
//!
//! # Whole-script variables
//!
//! `type` (`prepare` or `finish`), `event` (e.g. `CREATE-DOCUMENT`),
//! `collection`, `uri`, `new-uri` (empty unless copying or moving), and the
//! older names `eventType`, `triggerEvent`, `collectionName` and, for
//! documents, `documentName`.

use super::engine::{ResetOnDrop, ScriptEngine, ScriptSource, ScriptValue};
use indexmap::IndexMap;
use ricochet_core::{
    ConfigError, EventKind, EventSet, Invocation, Phase, Trigger, TriggerConfig, TriggerError,
    TriggerId, Txn, UnwindScope, guard,
};
use std::sync::Arc;

const DEFAULT_BINDING_PREFIX: &str = "local:";
const RESERVED_PARAMS: [&str; 4] = ["url", "query", "bindingPrefix", "event"];

/// How a script handles one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Run the whole script with the event in external variables.
    WholeScript,
    /// Call the function named after the event.
    FunctionDispatch,
}

/// Trigger backed by a user script.
pub struct ScriptTrigger {
    id: TriggerId,
    name: String,
    engine: Arc<dyn ScriptEngine>,
    source: ScriptSource,
    binding_prefix: String,
    variables: IndexMap<String, String>,
    events: EventSet,
}

impl ScriptTrigger {
    /// Configure a script trigger.
    ///
    /// Instances configured for the same collection and script share a guard
    /// identity, so a script re-entering itself through a fresh instance is
    /// still recognised as a cycle.
    ///
    /// Fails if neither `url` nor `query` is given, or an `event` name is
    /// unknown.
    pub fn new(
        config: &TriggerConfig,
        engine: Arc<dyn ScriptEngine>,
    ) -> Result<Self, ConfigError> {
        let source = match (config.first_text("url"), config.first_text("query")) {
            (Some(url), _) => ScriptSource::Url(url.trim().to_string()),
            (None, Some(query)) => ScriptSource::Inline(query.to_string()),
            (None, None) => return Err(ConfigError::Missing("url".to_string())),
        };

        let binding_prefix = config
            .first_text("bindingPrefix")
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map_or_else(|| DEFAULT_BINDING_PREFIX.to_string(), |p| format!("{p}:"));

        let variables = config
            .params()
            .keys()
            .filter(|name| !RESERVED_PARAMS.contains(&name.as_str()))
            .filter_map(|name| Some((name.clone(), config.first_text(name)?.to_string())))
            .collect();

        let events = config.events() | EventSet::parse(config.texts("event"))?;

        let id = TriggerId::from_key(&format!("{}\u{0}{source}", config.collection()));

        Ok(Self {
            id,
            name: format!("script:{source}"),
            engine,
            source,
            binding_prefix,
            variables,
            events,
        })
    }

    /// Use `id` as guard identity instead of the one derived from the
    /// collection and script source.
    pub fn with_id(mut self, id: TriggerId) -> Self {
        self.id = id;
        self
    }

    /// The guard identity.
    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// Where the script comes from.
    pub fn source(&self) -> &ScriptSource {
        &self.source
    }

    /// The variable prefix, including the trailing `:`.
    pub fn binding_prefix(&self) -> &str {
        &self.binding_prefix
    }

    /// User variables in configuration order.
    pub fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    /// The mode used for `event`.
    pub fn mode(&self, event: EventKind) -> ScriptMode {
        if self.events.includes(event) {
            ScriptMode::WholeScript
        } else {
            ScriptMode::FunctionDispatch
        }
    }

    fn compile(&self) -> Result<ResetOnDrop, TriggerError> {
        self.engine
            .compile(&self.source)
            .map(ResetOnDrop)
            .map_err(|err| TriggerError::execution(&self.name, err))
    }

    fn declare(
        &self,
        script: &mut ResetOnDrop,
        name: &str,
        value: ScriptValue,
    ) -> Result<(), TriggerError> {
        let qualified = format!("{}{name}", self.binding_prefix);
        script
            .declare_variable(&qualified, value)
            .map_err(|err| TriggerError::execution(&self.name, err))
    }

    fn declare_user_variables(&self, script: &mut ResetOnDrop) -> Result<(), TriggerError> {
        for (name, value) in &self.variables {
            self.declare(script, name, ScriptValue::String(value.clone()))?;
        }
        Ok(())
    }

    fn run_whole_script(&self, invocation: &Invocation) -> Result<(), TriggerError> {
        let mut script = self.compile()?;
        let kind = invocation.phase.script_type();
        let event = invocation.event.to_string();
        let collection = invocation.collection();

        self.declare(&mut script, "type", kind.into())?;
        self.declare(&mut script, "event", event.as_str().into())?;
        self.declare(&mut script, "collection", collection.clone().into())?;
        self.declare(&mut script, "uri", invocation.src.clone().into())?;
        self.declare(&mut script, "new-uri", invocation.dst.clone().into())?;

        self.declare(&mut script, "eventType", kind.into())?;
        self.declare(&mut script, "triggerEvent", event.as_str().into())?;
        self.declare(&mut script, "collectionName", collection.into())?;
        if !invocation.event.is_collection() {
            self.declare(&mut script, "documentName", invocation.src.clone().into())?;
        }
        self.declare_user_variables(&mut script)?;

        script
            .execute()
            .map_err(|err| TriggerError::execution(&self.name, err))?;
        tracing::debug!(trigger = %self.name, %event, script_type = kind, "script executed");
        Ok(())
    }

    fn run_function(&self, invocation: &Invocation) -> Result<(), TriggerError> {
        let mut script = self.compile()?;
        self.declare_user_variables(&mut script)?;

        let function = invocation.event.function_name(invocation.phase);
        let src = ScriptValue::AnyUri(invocation.src.clone());
        let dst = invocation.dst.clone().map(ScriptValue::AnyUri);
        let args: Vec<ScriptValue> = match invocation.phase {
            Phase::Before => std::iter::once(src).chain(dst).collect(),
            Phase::After => dst.into_iter().chain(std::iter::once(src)).collect(),
        };

        if !script.has_function(&function, args.len()) {
            tracing::debug!(
                trigger = %self.name,
                %function,
                arity = args.len(),
                "no dispatch function declared, ignoring event"
            );
            return Ok(());
        }

        script
            .call_function(&function, args)
            .map_err(|err| TriggerError::execution(&self.name, err))?;
        tracing::debug!(trigger = %self.name, %function, "dispatch function called");
        Ok(())
    }
}

impl Trigger for ScriptTrigger {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, txn: &Txn, invocation: &Invocation) -> Result<(), TriggerError> {
        let scope = UnwindScope::new(invocation.phase);
        guard::register(
            self.id,
            invocation.phase,
            invocation.event,
            &invocation.src,
            invocation.dst.as_ref(),
        )?;

        tracing::trace!(trigger = %self.name, txn = txn.id(), "guard accepted invocation");
        let result = match self.mode(invocation.event) {
            ScriptMode::WholeScript => self.run_whole_script(invocation),
            ScriptMode::FunctionDispatch => self.run_function(invocation),
        };
        if result.is_err() {
            scope.abandon();
        }
        result
    }
}
