/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "tagtrack.toml";

/// Per-device telemetry history bound. Appends beyond this evict the
/// oldest sample (FIFO).
pub const TELEMETRY_HISTORY_BOUND: usize = 200;

/// Default number of samples returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Well-known wallet identity names.
pub const ADMIN_IDENTITY: &str = "admin";
pub const APP_IDENTITY: &str = "app-gateway";

/// Inbound topic suffixes the ingestion adapter subscribes to.
pub const KIND_TELEMETRY: &str = "telemetry";
pub const KIND_STATUS: &str = "status";
pub const KIND_NFC: &str = "nfc";
/// Outbound command topic suffix.
pub const KIND_COMMAND: &str = "command";
