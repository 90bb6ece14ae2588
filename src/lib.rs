pub mod app;
pub mod seed;
pub mod shutdown;
