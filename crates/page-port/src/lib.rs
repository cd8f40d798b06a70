//! Page port - the DOM contract the FormFill engine runs against
//!
//! The engine never talks to a concrete DOM binding. It drives a [`PageDom`]:
//! - [`MemoryPage`]: an in-memory document with a mutation feed, used by tests
//!   and dry runs
//! - [`ScriptPage`]: a live document driven through JavaScript evaluation on any
//!   [`ScriptRuntime`] (the CDP adapter provides one)

pub mod errors;
pub mod memory;
pub mod model;
pub mod ports;
pub mod script;

pub use errors::PageError;
pub use memory::{ClickEffect, MemoryNode, MemoryPage};
pub use model::*;
pub use ports::PageDom;
pub use script::{ScriptPage, ScriptRuntime};
