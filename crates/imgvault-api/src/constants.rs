//! API constants

/// Versioned prefix of every public route
pub const API_PREFIX: &str = "/api/v0";

/// Prefix of operator-only routes
pub const INTERNAL_PREFIX: &str = "/internal";

/// Cookie carrying the upload session key
pub const SESSION_COOKIE: &str = "session_id";

/// Header alternative to [`SESSION_COOKIE`] for non-browser clients
pub const SESSION_HEADER: &str = "x-session-id";

/// Caller identity set by the authenticating gateway
pub const USER_ID_HEADER: &str = "x-user-id";
