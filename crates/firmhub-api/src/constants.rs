//! API-level constants

/// Prefix of every versionless REST route.
pub const API_PREFIX: &str = "/api";

/// Maximum number of rows returned by list endpoints.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Consecutive failed authentications per client before it is throttled.
pub const AUTH_FAILURE_LIMIT: u32 = 10;

/// Window in seconds for counting failed authentications.
pub const AUTH_FAILURE_WINDOW_SECS: u64 = 900;

/// Default upper bound on concurrently served requests.
pub const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Reverse proxies in front of the API whose `X-Forwarded-For` entries are trusted.
pub const TRUSTED_PROXY_COUNT: usize = 1;

/// Longest stored original filename.
pub const MAX_FILENAME_LENGTH: usize = 255;
