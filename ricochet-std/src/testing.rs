//! Testing utilities for Ricochet.
//!
//! Doubles for exercising dispatchers, filters and script triggers without a
//! storage engine or a real script engine.
//!
//! # Features
//!
//! - [`RecordingTrigger`]: A trigger that records every invocation it receives
//! - [`FailingTrigger`]: A trigger that always fails with a chosen error
//! - [`RecordingSink`]: A terminal sink that keeps the events it receives
//! - [`ScriptedEngine`]: A programmable stand-in for a script engine

use crate::script::{CompiledScript, ScriptEngine, ScriptError, ScriptSource, ScriptValue};
use ricochet_core::{
    EventSink, Invocation, Phase, ResourceUri, StreamError, StructuralEvent, Trigger, TriggerError,
    Txn,
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

// ============================================================================
// Recording Trigger
// ============================================================================

/// A trigger that records all invocations it receives.
///
/// Clones share the same record, so keep one clone for assertions and hand
/// the other to the dispatcher.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = RecordingTrigger::named("audit");
/// let mut dispatcher = LifecycleDispatcher::builder("/db/c")
///     .register(recorder.clone())
///     .build();
///
/// dispatcher.before_create_document(&txn, &uri)?;
/// assert_eq!(recorder.count(), 1);
/// ```
#[derive(Clone)]
pub struct RecordingTrigger {
    name: String,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    metadata: Arc<Mutex<Vec<(Phase, ResourceUri)>>>,
}

impl RecordingTrigger {
    /// Create a recording trigger called `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invocations: Arc::new(Mutex::new(Vec::new())),
            metadata: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get a clone of the recorded invocations.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Get the number of recorded invocations.
    pub fn count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Get the recorded metadata updates.
    pub fn metadata_updates(&self) -> Vec<(Phase, ResourceUri)> {
        self.metadata.lock().unwrap().clone()
    }

    /// Clear everything recorded so far.
    pub fn clear(&self) {
        self.invocations.lock().unwrap().clear();
        self.metadata.lock().unwrap().clear();
    }
}

impl Trigger for RecordingTrigger {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, _txn: &Txn, invocation: &Invocation) -> Result<(), TriggerError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        Ok(())
    }

    fn on_metadata_update(
        &mut self,
        _txn: &Txn,
        phase: Phase,
        uri: &ResourceUri,
    ) -> Result<(), TriggerError> {
        self.metadata.lock().unwrap().push((phase, uri.clone()));
        Ok(())
    }
}

// ============================================================================
// Failing Trigger
// ============================================================================

type ErrorFactory = Box<dyn Fn() -> TriggerError + Send>;

/// A trigger whose every invocation fails.
pub struct FailingTrigger {
    name: String,
    error: ErrorFactory,
    attempts: Arc<AtomicUsize>,
}

impl FailingTrigger {
    /// Fail with an execution error naming this trigger.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let owner = name.clone();
        Self::with_error(name, move || TriggerError::execution(&owner, "simulated failure"))
    }

    /// Fail with whatever `error` produces.
    pub fn with_error(
        name: impl Into<String>,
        error: impl Fn() -> TriggerError + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            error: Box::new(error),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A shared counter of invocations, readable after the trigger moved
    /// into a dispatcher.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

impl Trigger for FailingTrigger {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, _txn: &Txn, _invocation: &Invocation) -> Result<(), TriggerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err((self.error)())
    }
}

// ============================================================================
// Recording Sink
// ============================================================================

/// A terminal sink that records every structural event.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<StructuralEvent>>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the received events.
    pub fn events(&self) -> Vec<StructuralEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Character data received, in order.
    pub fn texts(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                StructuralEvent::Characters(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn receive(&mut self, event: StructuralEvent) -> Result<(), StreamError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

// ============================================================================
// Scripted Engine
// ============================================================================

/// One interaction between a trigger and a [`ScriptedEngine`] script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCall {
    /// An external variable was bound.
    Declare {
        /// Qualified variable name.
        name: String,
        /// Bound value.
        value: ScriptValue,
    },
    /// The whole script ran.
    Execute,
    /// A function was called.
    Call {
        /// Function name.
        name: String,
        /// Arguments in call order.
        args: Vec<ScriptValue>,
    },
}

type SideEffect = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct EngineState {
    calls: Vec<ScriptCall>,
    variables: HashMap<String, ScriptValue>,
    compiled: Vec<ScriptSource>,
    resets: usize,
}

/// A script engine whose scripts do nothing but record what they are asked.
///
/// Builder methods program the declared functions and failures. Clones share
/// the same record.
///
/// # Example
///
/// ```rust,ignore
/// let engine = ScriptedEngine::new().with_function("after-create-document", 1);
/// let trigger = ScriptTrigger::new(&config, Arc::new(engine.clone()))?;
/// // ...
/// assert_eq!(engine.resets(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<EngineState>>,
    functions: HashSet<(String, usize)>,
    compile_error: Option<String>,
    execution_error: Option<String>,
    side_effect: Option<SideEffect>,
}

impl ScriptedEngine {
    /// An engine whose scripts declare no functions and always succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare function `name` taking `arity` arguments in every script.
    pub fn with_function(mut self, name: impl Into<String>, arity: usize) -> Self {
        self.functions.insert((name.into(), arity));
        self
    }

    /// Make every compilation fail with `message`.
    pub fn failing_compile(mut self, message: impl Into<String>) -> Self {
        self.compile_error = Some(message.into());
        self
    }

    /// Make every run and function call fail with `message`.
    pub fn failing_execution(mut self, message: impl Into<String>) -> Self {
        self.execution_error = Some(message.into());
        self
    }

    /// Run `effect` inside every run and function call, before it returns.
    ///
    /// The record is not locked while `effect` runs, so it may fire other
    /// triggers backed by this engine.
    pub fn with_side_effect(mut self, effect: impl Fn() + Send + Sync + 'static) -> Self {
        self.side_effect = Some(Arc::new(effect));
        self
    }

    /// Every interaction so far, in order.
    pub fn calls(&self) -> Vec<ScriptCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// The latest value bound to each variable.
    pub fn variables(&self) -> HashMap<String, ScriptValue> {
        self.state.lock().unwrap().variables.clone()
    }

    /// Sources compiled so far.
    pub fn compiled(&self) -> Vec<ScriptSource> {
        self.state.lock().unwrap().compiled.clone()
    }

    /// How many script instances were reset.
    pub fn resets(&self) -> usize {
        self.state.lock().unwrap().resets
    }
}

impl ScriptEngine for ScriptedEngine {
    fn compile(&self, source: &ScriptSource) -> Result<Box<dyn CompiledScript>, ScriptError> {
        if let Some(message) = &self.compile_error {
            return Err(ScriptError::Compile {
                source_name: source.to_string(),
                message: message.clone(),
            });
        }
        self.state.lock().unwrap().compiled.push(source.clone());
        Ok(Box::new(self.clone()))
    }
}

impl ScriptedEngine {
    fn run(&self, call: ScriptCall) -> Result<(), ScriptError> {
        self.state.lock().unwrap().calls.push(call);
        if let Some(effect) = &self.side_effect {
            effect();
        }
        match &self.execution_error {
            Some(message) => Err(ScriptError::Execution(message.clone())),
            None => Ok(()),
        }
    }
}

impl CompiledScript for ScriptedEngine {
    fn declare_variable(&mut self, name: &str, value: ScriptValue) -> Result<(), ScriptError> {
        let mut state = self.state.lock().unwrap();
        state.variables.insert(name.to_string(), value.clone());
        state.calls.push(ScriptCall::Declare {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn execute(&mut self) -> Result<(), ScriptError> {
        self.run(ScriptCall::Execute)
    }

    fn has_function(&self, name: &str, arity: usize) -> bool {
        self.functions.contains(&(name.to_string(), arity))
    }

    fn call_function(&mut self, name: &str, args: Vec<ScriptValue>) -> Result<(), ScriptError> {
        if !self.has_function(name, args.len()) {
            return Err(ScriptError::UnknownFunction {
                name: name.to_string(),
                arity: args.len(),
            });
        }
        self.run(ScriptCall::Call {
            name: name.to_string(),
            args,
        })
    }

    fn reset(&mut self) {
        self.state.lock().unwrap().resets += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::EventKind;

    #[test]
    fn test_recording_trigger_shares_state() {
        let recorder = RecordingTrigger::named("rec");
        let mut handle: Box<dyn Trigger> = Box::new(recorder.clone());
        let inv = Invocation::new(Phase::Before, EventKind::CREATE_DOCUMENT, "/db/a.xml".into());
        handle.fire(&Txn::new(1), &inv).unwrap();
        assert_eq!(recorder.invocations(), vec![inv]);
        recorder.clear();
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_failing_trigger_counts_attempts() {
        let mut trigger = FailingTrigger::new("nope");
        let attempts = trigger.attempts();
        let inv = Invocation::new(Phase::After, EventKind::DELETE_DOCUMENT, "/db/a.xml".into());
        assert!(trigger.fire(&Txn::new(1), &inv).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scripted_engine_unknown_function() {
        let engine = ScriptedEngine::new().with_function("f", 1);
        let mut script = engine.compile(&ScriptSource::Inline("()".into())).unwrap();
        assert!(script.call_function("f", vec![ScriptValue::Empty]).is_ok());
        assert!(matches!(
            script.call_function("f", vec![]),
            Err(ScriptError::UnknownFunction { arity: 0, .. })
        ));
        assert_eq!(engine.compiled().len(), 1);
    }
}
