/// File written to the dist directory after the build phase.
pub const MANIFEST_FILENAME: &str = "steppack.manifest.json";

pub const STEP_MAX_MB: u64 = 250;
pub const ROUTER_MAX_MB: u64 = 150;
pub const STEP_NAME_MAX_LENGTH: usize = 40;

pub const RAM_MIN_MB: u32 = 128;
pub const RAM_MAX_MB: u32 = 10240;
pub const TIMEOUT_MIN_SECS: u32 = 1;
pub const TIMEOUT_MAX_SECS: u32 = 900;

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// messageGroupId value that partitions FIFO queues by trace and needs no schema field.
pub const TRACE_ID_GROUP: &str = "traceId";

pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BUNDLE_TIMEOUT_SECS: u64 = 120;

/// Upper bound on concurrent step builds; each Python build spawns a scanner process.
pub const MAX_PARALLELISM: usize = 8;
