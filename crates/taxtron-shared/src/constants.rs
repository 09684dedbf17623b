/// Application name
pub const APP_NAME: &str = "TaxTron";

/// Fee charged for an ownership transfer when the initiator supplies none (PKR)
pub const DEFAULT_TRANSFER_FEE: i64 = 5000;

/// Number of digits in a CNIC once dashes are removed
pub const CNIC_DIGITS: usize = 13;

/// Lifetime of a user session token in hours
pub const USER_SESSION_HOURS: i64 = 24;

/// Lifetime of an admin session token in hours
pub const ADMIN_SESSION_HOURS: i64 = 8;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Placeholder used when a transfer's vehicle can no longer be looked up
pub const UNKNOWN_PLACEHOLDER: &str = "Unknown";
