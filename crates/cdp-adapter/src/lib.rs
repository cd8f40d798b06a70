//! Chromium DevTools Protocol runtime.
//!
//! Launches a Chromium tab through `chromiumoxide` and exposes it as a
//! [`ScriptRuntime`](page_port::ScriptRuntime), so a
//! [`ScriptPage`](page_port::ScriptPage) can drive a real browser.

pub mod config;
pub mod error;
pub mod runtime;

pub use config::{detect_chrome_executable, CdpConfig};
pub use error::{AdapterError, AdapterErrorKind};
pub use runtime::ChromiumRuntime;
