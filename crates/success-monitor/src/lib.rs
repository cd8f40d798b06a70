//! Success monitor - post-submission completion signals
//!
//! Watches a page for one of three signals and reports a single
//! [`MonitorOutcome`](formfill_core_types::MonitorOutcome):
//! - `url_change`: location differs from the baseline (optionally containing a pattern)
//! - `text_appears`: visible text contains the pattern
//! - `element_disappears`: the selector stops matching
//!
//! Each watch is owned by a [`MonitorHandle`]; stopping or dropping the handle
//! tears the watch down without delivering anything.

pub mod conditions;
pub mod monitor;
pub mod policy;

pub use conditions::*;
pub use monitor::*;
pub use policy::*;
