pub mod identity;
pub mod identity_error;
pub mod identity_repository;
pub mod identity_resolver;
