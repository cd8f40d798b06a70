pub mod bridge;
pub mod config;
pub mod info;
pub mod run;
pub mod runtime;
pub mod validate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}
