//! Shared constants

/// Cache key prefix for logged-out access tokens.
pub const BLACKLIST_KEY_PREFIX: &str = "blacklist:";

/// Cache key prefix for per-user "revoke all" timestamps.
pub const REVOKED_KEY_PREFIX: &str = "revoked:";

/// Storage prefix for uploads waiting on the antivirus scan.
pub const TEMP_MEDIA_PREFIX: &str = "temp";

/// Storage prefix for scanned, publicly servable media.
pub const MEDIA_PREFIX: &str = "media";

/// Presigned download URLs stay valid for this long.
pub const PRESIGNED_URL_TTL_SECS: u64 = 900;

/// Upper bound for answers accepted in one submission batch.
pub const MAX_ANSWERS_PER_BATCH: usize = 500;

/// Upper bound for options on a single choice question.
pub const MAX_OPTIONS_PER_QUESTION: usize = 100;

/// Stripe webhook timestamps older than this are rejected.
pub const STRIPE_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Notification channel capacity per connected user.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;
