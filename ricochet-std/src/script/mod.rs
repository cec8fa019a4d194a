//! Script-backed triggers.
//!
//! - [`ScriptEngine`] / [`CompiledScript`]: the contract an external engine
//!   implements
//! - [`ScriptTrigger`]: runs a user script in whole-script or
//!   function-dispatch mode

pub mod engine;
pub mod trigger;

pub use engine::{CompiledScript, ScriptEngine, ScriptError, ScriptSource, ScriptValue};
pub use trigger::{ScriptMode, ScriptTrigger};
