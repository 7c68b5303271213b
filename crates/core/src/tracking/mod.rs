pub mod domain;
pub mod face_tracker;
pub mod infrastructure;
