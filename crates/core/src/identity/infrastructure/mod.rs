pub mod identity_store;
pub mod json_identity_repository;
pub mod memory_identity_repository;
pub mod remote_identity_resolver;
