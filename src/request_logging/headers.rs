//! HTTP header and path constants used by the request-logging middleware

use ::http::header;

/// Proxy-supplied chain of client addresses; the first entry is the client
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Single client address set by some reverse proxies
pub const X_REAL_IP: &str = "x-real-ip";

/// Body stored in place of anything sent to an authentication endpoint
pub const REDACTED_BODY: &str = "[REDACTED - AUTH ENDPOINT]";

/// Standard header re-exports for convenience
pub use header::{CONTENT_TYPE, USER_AGENT};

/// Well-known paths
pub mod paths {
    /// Health check endpoint prefix
    pub const HEALTH: &str = "/health";

    /// Static asset prefix
    pub const STATIC: &str = "/static/";

    /// Fragment marking authentication routes
    pub const AUTH: &str = "/auth/";

    /// Fragment marking the login route
    pub const LOGIN: &str = "/login";
}
