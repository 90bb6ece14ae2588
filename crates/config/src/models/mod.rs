pub mod app_config;
pub mod cloud;
pub mod dispatcher;
pub mod monitor;
pub mod observability;
pub mod seed;

pub use app_config::*;
pub use cloud::*;
pub use dispatcher::*;
pub use monitor::*;
pub use observability::*;
pub use seed::*;
