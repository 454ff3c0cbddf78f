//! Device context, provides map, and transactional state store shared by the
//! update-client binary's deployment client and update-module driver.

pub mod artifact;
pub mod clears;
pub mod context;
pub mod deployment_status;
pub mod device_type;
pub mod provides;
pub mod store;
pub mod store_memory;
pub mod store_redb;

pub use context::Context;
pub use deployment_status::DeploymentStatus;
pub use provides::ProvidesMap;
pub use store::StateStore;
