//! Structural filters.
//!
//! - [`DeferringFilter`]: pass-through with an on/off replay buffer
//! - [`ExtractionFilter`]: splits delimited text into child elements

pub mod deferring;
pub mod extract;

pub use deferring::{DeferringFilter, Forward, Replay};
pub use extract::{
    EntryOrder, ExtractEntry, ExtractionFilter, ExtractionRule, ExtractionTrigger,
};
