pub mod event_dispatcher;
pub mod identification_scheduler;
pub mod track_registry;
