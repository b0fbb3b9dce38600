//! Network defaults for the Luna SDK.

use std::time::Duration;

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.eclipse.dev";

/// Path of the token refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "/v1/auth/refresh";

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("luna-sdk-rust/", env!("CARGO_PKG_VERSION"));

/// Header carrying the client- or server-assigned request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
