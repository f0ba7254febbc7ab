mod duration_probe;
mod path_validator;
mod time_code;

pub use duration_probe::{MediaDuration, probe_duration, scan_duration};
pub use path_validator::{
    ensure_parent_directory_exists, validate_encode_paths, validate_file_exists,
};
pub use time_code::{TimeCode, format_ms, to_milliseconds};
