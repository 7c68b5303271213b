pub mod bounding_box;
pub mod config;
pub mod constants;
pub mod feature_vector;
pub mod frame;
