/// Application name
pub const APP_NAME: &str = "Cortado";

/// Maximum length of a request topic in characters
pub const TOPIC_MAX_LEN: usize = 100;

/// Maximum length of a request description in characters
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// Default number of rows returned by the leaderboard query
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

/// How long a request-creation prompt stays interactive before the dispatch
/// layer treats it as an implicit cancellation (seconds)
pub const PROMPT_TIMEOUT_SECS: u64 = 300;

/// Default interval between presence/status updates (seconds)
pub const STATUS_INTERVAL_SECS: u64 = 300;
