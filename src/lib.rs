//! FormFill library
//!
//! Engine facade, message bridge, mapping files and configuration shared by the
//! `formfill` binary and the integration tests.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod errors;
pub mod mapping;
pub mod report;

pub use config::{Config, LoadedConfig};
pub use engine::{EngineRequest, EngineResponse, FillEngine};
pub use errors::EngineError;
pub use mapping::Mapping;
