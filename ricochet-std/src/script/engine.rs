//! Script engine contract.
//!
//! The engine itself lives outside this crate. [`ScriptTrigger`] only needs
//! to compile a source, bind external variables, and then either run the
//! whole script or call one function of it.
//!
//! [`ScriptTrigger`]: super::ScriptTrigger

use ricochet_core::{BoxError, ResourceUri};
use std::fmt;
use thiserror::Error;

/// Where the script text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// A location the engine resolves, e.g. `xmldb:exist:///db/triggers/audit.xq`.
    Url(String),
    /// Script text given inline in the configuration.
    Inline(String),
}

impl fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptSource::Url(url) => f.write_str(url),
            ScriptSource::Inline(_) => f.write_str("<inline>"),
        }
    }
}

/// A value bound to a script variable or passed as a function argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    /// A plain string.
    String(String),
    /// A resource path.
    AnyUri(ResourceUri),
    /// The empty sequence.
    Empty,
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<ResourceUri> for ScriptValue {
    fn from(uri: ResourceUri) -> Self {
        ScriptValue::AnyUri(uri)
    }
}

impl From<Option<ResourceUri>> for ScriptValue {
    fn from(uri: Option<ResourceUri>) -> Self {
        uri.map_or(ScriptValue::Empty, ScriptValue::AnyUri)
    }
}

/// Errors reported by a script engine.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The source could not be loaded or compiled.
    #[error("failed to compile {source_name}: {message}")]
    Compile {
        /// The source that failed.
        source_name: String,
        /// Engine diagnostic.
        message: String,
    },

    /// The script raised an error while running.
    #[error("script failed: {0}")]
    Execution(String),

    /// No function with this name and arity is declared.
    #[error("no function {name}#{arity}")]
    UnknownFunction {
        /// Function name.
        name: String,
        /// Number of arguments.
        arity: usize,
    },

    /// Any other engine failure.
    #[error(transparent)]
    Other(#[from] BoxError),
}

/// Compiles scripts.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a script engine",
    label = "missing `ScriptEngine` implementation",
    note = "Engines must compile a `ScriptSource` into a `CompiledScript`."
)]
pub trait ScriptEngine: Send + Sync {
    /// Compile `source` into a fresh, independent script instance.
    fn compile(&self, source: &ScriptSource) -> Result<Box<dyn CompiledScript>, ScriptError>;
}

/// A compiled script with its own variable bindings.
pub trait CompiledScript: Send {
    /// Bind an external variable. `name` includes the binding prefix.
    fn declare_variable(&mut self, name: &str, value: ScriptValue) -> Result<(), ScriptError>;

    /// Run the script body once.
    fn execute(&mut self) -> Result<(), ScriptError>;

    /// Whether a function `name` taking `arity` arguments is declared.
    fn has_function(&self, name: &str, arity: usize) -> bool;

    /// Call function `name` with `args`.
    fn call_function(&mut self, name: &str, args: Vec<ScriptValue>) -> Result<(), ScriptError>;

    /// Release per-run state. Called once after every run, whatever its outcome.
    fn reset(&mut self);
}

/// Resets the wrapped script when dropped.
pub(crate) struct ResetOnDrop(pub(crate) Box<dyn CompiledScript>);

impl std::ops::Deref for ResetOnDrop {
    type Target = dyn CompiledScript;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl std::ops::DerefMut for ResetOnDrop {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        self.0.reset();
    }
}
