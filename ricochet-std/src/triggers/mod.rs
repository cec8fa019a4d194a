//! Ready-made triggers.

mod logging;

pub use logging::LoggingTrigger;
