pub mod entities;
pub mod events;
pub mod ports;
pub mod query;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use events::*;
pub use orchestrator_errors::{ErrorKind, OrchestratorError, OrchestratorResult};
pub use ports::*;
pub use query::*;
pub use repositories::*;
pub use services::*;
pub use value_objects::*;
