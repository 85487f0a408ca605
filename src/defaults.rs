/// The lower bound on collected activity when the configuration does not give one.
pub const DEFAULT_SINCE: &str = "2024-01-01T00:00:00Z";

/// The database file used when no datastore path is given.
pub const DEFAULT_DATASTORE_PATH: &str = "metrics.db";

/// The address the dashboard listens on by default.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";

/// The environment variable consulted for a GitHub token when the configuration has none.
pub const GITHUB_TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// The dashboard shell served for `/` and the per-metric pages.
pub static DASHBOARD_HTML: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/dashboard.html"));
