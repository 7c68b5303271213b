/// Length of the face descriptor produced by the embedding model.
pub const FEATURE_DIMENSION: usize = 128;

/// Maximum Euclidean distance at which two descriptors are the same person.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.6;

pub const DEFAULT_MAX_RELATIVE_SHIFT: f64 = 0.8;
pub const DEFAULT_MISSING_FRAMES_TOLERANCE: u32 = 0;
pub const DEFAULT_IDENTIFICATION_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Boxes averaged into a track's smoothed position.
pub const BOX_HISTORY_LEN: usize = 5;

/// Name given to identities created from an unrecognised face.
pub const UNKNOWN_NAME: &str = "unknown";

pub const APP_DIR_NAME: &str = "facerec";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const STORE_FILE_NAME: &str = "identities.json";
