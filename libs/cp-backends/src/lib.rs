//! Backend protocol abstractions: what the reconcilers need from a container-zone
//! orchestrator and a db-zone server, plus in-process reference implementations used in
//! tests (the real clusters are not yet implemented, same status as object storage).

mod container;
mod db;
mod in_memory_container;
mod in_memory_db;

pub use container::{ContainerBackend, PodObservation, WorkloadSpec, encode_image_pull_secret};
pub use db::{DbBackend, random_db_password};
pub use in_memory_container::InMemoryContainerBackend;
pub use in_memory_db::InMemoryDbBackend;
