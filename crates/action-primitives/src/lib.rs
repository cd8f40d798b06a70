//! Action executors - perform one step's action on a resolved element
//!
//! - fill: pick a [`ValueInjector`] by field category and write the value so
//!   hosting UI frameworks observe it
//! - click: interactability check, then a synthetic click
//! - wait: plain delay
//!
//! Executors never return errors; every failure becomes an [`ActionOutcome`]
//! with `ok == false` and a reason.

pub mod injector;
mod primitives;
pub mod types;

pub use injector::*;
pub use primitives::*;
pub use types::*;
