//! Shared request parameters and format checks used across resources.

use crate::error::SdkError;
use crate::http::RequestConfig;

/// Common pagination parameters for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl ListParams {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Append `limit` / `cursor` to a request's query.
    pub(crate) fn apply(&self, config: RequestConfig) -> RequestConfig {
        config
            .query_opt("limit", self.limit.filter(|l| *l > 0))
            .query_opt("cursor", self.cursor.as_deref().filter(|c| !c.is_empty()))
    }
}

/// Check that `id` looks like `<prefix>_<alphanumerics>`.
///
/// `name` is used in the error message, e.g. `"user ID"`.
pub fn validate_id(id: &str, prefix: &str, name: &str) -> Result<(), SdkError> {
    if id.is_empty() {
        return Err(SdkError::Validation(format!("{} is required", name)));
    }
    let valid = id
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric()));
    if !valid {
        return Err(SdkError::Validation(format!(
            "invalid {} format, expected: {}_<id>",
            name, prefix
        )));
    }
    Ok(())
}

/// Fail with `SdkError::Validation` when a required field is blank.
pub fn require(value: &str, field: &str) -> Result<(), SdkError> {
    if value.trim().is_empty() {
        return Err(SdkError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
