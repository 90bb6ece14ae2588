mod simulated;

pub use simulated::{simulated_factory, SimulatedCloudInstanceHandler, SIMULATED_HANDLER_TYPE};
