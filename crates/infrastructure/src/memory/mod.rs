mod account_repository;
mod host_repository;
mod job_repository;
mod task_repository;

pub use account_repository::InMemoryAccountRepository;
pub use host_repository::{InMemoryGroupedHostRepository, InMemoryHostRepository};
pub use job_repository::InMemoryJobRepository;
pub use task_repository::InMemoryTaskRepository;
