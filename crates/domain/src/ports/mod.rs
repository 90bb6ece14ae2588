mod cloud_instance;
mod worker;

pub use cloud_instance::*;
pub use worker::*;
