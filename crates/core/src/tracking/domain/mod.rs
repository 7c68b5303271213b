pub mod track;
pub mod track_associator;
pub mod track_event;
