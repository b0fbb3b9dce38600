//! # Luna SDK
//!
//! Rust client for the Luna REST API.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Core**: Error taxonomy, shared params, pagination, redaction
//! 2. **Auth**: API-key and OAuth token providers with single-flight refresh
//! 3. **HTTP API**: `LunaHttp`: deadlines, retries with backoff, error classification
//! 4. **High-Level Client**: `LunaClient` with nested resource sub-clients
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use luna_sdk::prelude::*;
//!
//! let client = LunaClient::builder()
//!     .api_key("lk_test_...")
//!     .build()?;
//!
//! let user = client.users().get("usr_123").await?;
//! let mut projects = client.projects().iter(ListParams::limit(50));
//! while let Some(project) = projects.try_next().await? {
//!     println!("{}", project.name);
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared request parameters and ID checks.
pub mod shared;

/// Resource modules: wire types and sub-clients.
pub mod domain;

/// Unified SDK error types.
pub mod error;

/// Network constants.
pub mod network;

/// Cursor pagination.
pub mod pagination;

/// Redaction of sensitive values before they are logged.
pub mod telemetry;

// ── Layer 2: Auth ────────────────────────────────────────────────────────────

/// Credential providers.
pub mod auth;

// ── Layer 3: HTTP API ────────────────────────────────────────────────────────

/// HTTP transport with retry policies.
pub mod http;

// ── Layer 4: High-Level Client ───────────────────────────────────────────────

/// `LunaClient`: the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Resources
    pub use crate::domain::project::{Project, ProjectCreate, ProjectUpdate};
    pub use crate::domain::user::{User, UserCreate, UserUpdate};
    pub use crate::pagination::{Page, Paginator};
    pub use crate::shared::ListParams;

    // Errors
    pub use crate::error::{ApiError, ErrorKind, SdkError};

    // Network
    pub use crate::network::DEFAULT_API_URL;

    // Auth
    pub use crate::auth::{ApiKeyAuth, AuthProvider, TokenAuth, TokenPair};

    // HTTP client + sub-clients
    pub use crate::client::{LunaClient, LunaClientBuilder, ProjectsClient, UsersClient};
    pub use crate::http::{LunaHttp, RequestConfig, Response, RetryConfig, RetryPolicy};
}
