//! Selector engine - multi-entry element resolution
//!
//! Resolves a step's primary locator plus its ordered fallbacks to a live
//! element:
//! - each entry is polled for a bounded window before the chain moves on
//! - the first entry with a match wins; ties go to document order
//! - a locator the page rejects as invalid is abandoned immediately
//! - an exhausted chain is a normal [`Resolution::NotFound`], not an error

pub mod errors;
pub mod policy;
pub mod resolver;

pub use errors::*;
pub use policy::*;
pub use resolver::*;
