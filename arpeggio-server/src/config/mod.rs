//! Server configuration: schema structs and YAML loader

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{AppConfig, SequenceConfig, WorkerSpec};
