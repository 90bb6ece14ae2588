mod cloud_instance;
mod host;
mod job;
mod task;

pub use cloud_instance::*;
pub use host::*;
pub use job::*;
pub use task::*;
