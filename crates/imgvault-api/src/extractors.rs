//! Request extractors for the session key and the calling user.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use imgvault_core::models::CallerIdentity;
use imgvault_core::AppError;

use crate::constants::{SESSION_COOKIE, SESSION_HEADER, USER_ID_HEADER};
use crate::error::HttpAppError;

/// Upload session key, from the `session_id` cookie or the `X-Session-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey(pub Option<String>);

impl SessionKey {
    /// A request without a key cannot have a session.
    pub fn require(self) -> Result<String, AppError> {
        self.0.ok_or(AppError::SessionNotFound)
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for SessionKey
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = cookie_value(&parts.headers, SESSION_COOKIE)
            .or_else(|| header_value(&parts.headers, SESSION_HEADER));
        Ok(SessionKey(key))
    }
}

/// Authenticated caller. Requests without `X-User-Id` are rejected with 401.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(&parts.headers, USER_ID_HEADER)
            .map(|user_id| Caller(CallerIdentity::new(user_id)))
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing caller identity".to_string(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc-123; lang=en"),
        );
        assert_eq!(cookie_value(&headers, "session_id").as_deref(), Some("abc-123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session_id="));
        headers.insert(SESSION_HEADER, HeaderValue::from_static("  "));
        assert_eq!(cookie_value(&headers, "session_id"), None);
        assert_eq!(header_value(&headers, SESSION_HEADER), None);
    }
}
