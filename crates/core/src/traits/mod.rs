pub mod broker;
pub mod executor;
pub mod plugin;
pub mod repository;
pub mod trigger;

pub use broker::*;
pub use executor::*;
pub use plugin::*;
pub use repository::*;
pub use trigger::*;
