/// Server-assigned image name, e.g. `ComfyUI_00042_.png`.
pub type ImageId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
