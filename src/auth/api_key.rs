use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::SharedState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Guard for endpoints that require the configured API key.
///
/// When no key is configured every request passes.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequestParts<SharedState> for ApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.api_key.as_deref() else {
            return Ok(ApiKey);
        };

        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .ok_or_else(|| {
                AppError::Unauthorized("API key required. Send it in the X-API-Key header".to_string())
            })?
            .to_str()
            .map_err(|_| AppError::Forbidden("Invalid API key".to_string()))?;

        if keys_match(provided, expected) {
            Ok(ApiKey)
        } else {
            Err(AppError::Forbidden("Invalid API key".to_string()))
        }
    }
}

fn keys_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_whole_key() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secre", "secret"));
        assert!(!keys_match("secret!", "secret"));
        assert!(!keys_match("", "secret"));
    }
}
