pub mod config;
pub mod definition;
pub mod errors;
pub mod logging;
pub mod models;
pub mod registry;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use logging::StructuredLogger;
pub use registry::{
    FilterRegistry, InputRegistry, OutputRegistry, Registries, Registry, TransformerRegistry,
    TriggerRegistry,
};
