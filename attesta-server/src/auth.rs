//! Caller identity from HS256 bearer tokens.
//!
//! When `AUTH_JWT_SECRET` is unset the server runs in development mode and
//! every request is anonymous. Otherwise [`Caller`] rejects requests without
//! a valid token with 401 and an `AUTH_*` code.

use attesta_core::CurrentUser;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// `sub` may be issued as a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Subject {
    Id(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Subject,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[allow(dead_code)]
    exp: u64,
}

/// Validates caller tokens against a shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<CurrentUser, ApiError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    ApiError::auth_error("AUTH_TOKEN_EXPIRED", "Token has expired")
                }
                ErrorKind::InvalidSignature => invalid_token("Token signature does not match"),
                _ => invalid_token(format!("Token rejected: {e}")),
            })?
            .claims;

        let id = match claims.sub {
            Subject::Id(id) => id,
            Subject::Text(s) => s
                .parse()
                .map_err(|_| invalid_token("Token subject is not a user id"))?,
        };
        Ok(CurrentUser {
            id,
            nickname: claims.nickname,
            username: claims.username,
        })
    }
}

fn invalid_token(message: impl Into<String>) -> ApiError {
    ApiError::auth_error("AUTH_INVALID_TOKEN", message)
}

fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header"))?;
    header
        .to_str()
        .map_err(|_| invalid_token("Authorization header is not valid ASCII"))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| invalid_token("Expected a Bearer token"))
}

/// The authenticated caller, or `None` in development mode.
pub struct Caller(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(verifier) = state.auth.as_ref() else {
            return Ok(Caller(None));
        };
        let token = extract_bearer_token(parts)?;
        verifier.verify(token).map(|user| Caller(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &str = "test-secret";

    fn now_epoch() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn error_code(err: ApiError) -> String {
        err.error_code().to_string()
    }

    #[test]
    fn test_valid_token() {
        let verifier = JwtVerifier::new(SECRET);
        let user = verifier
            .verify(&token(
                json!({"sub": "42", "nickname": "QA", "exp": now_epoch() + 600}),
                SECRET,
            ))
            .unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.display_name(), "QA");

        let numeric = verifier
            .verify(&token(
                json!({"sub": 7, "username": "jdoe", "exp": now_epoch() + 600}),
                SECRET,
            ))
            .unwrap();
        assert_eq!(numeric.id, 7);
        assert_eq!(numeric.display_name(), "jdoe");
    }

    #[test]
    fn test_expired_token() {
        let verifier = JwtVerifier::new(SECRET);
        let err = verifier
            .verify(&token(json!({"sub": 1, "exp": now_epoch() - 3600}), SECRET))
            .unwrap_err();
        assert_eq!(error_code(err), "AUTH_TOKEN_EXPIRED");
    }

    #[test]
    fn test_wrong_secret() {
        let verifier = JwtVerifier::new(SECRET);
        let err = verifier
            .verify(&token(json!({"sub": 1, "exp": now_epoch() + 600}), "other"))
            .unwrap_err();
        assert_eq!(error_code(err), "AUTH_INVALID_TOKEN");
    }

    #[test]
    fn test_non_numeric_subject() {
        let verifier = JwtVerifier::new(SECRET);
        let err = verifier
            .verify(&token(
                json!({"sub": "user_abc", "exp": now_epoch() + 600}),
                SECRET,
            ))
            .unwrap_err();
        assert_eq!(error_code(err), "AUTH_INVALID_TOKEN");
    }

    #[test]
    fn test_extract_bearer_token() {
        let (parts, _) = Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        let err = extract_bearer_token(&parts).unwrap_err();
        assert_eq!(error_code(err), "AUTH_MISSING_TOKEN");

        let (parts, _) = Request::builder()
            .uri("/")
            .header("Authorization", "Basic abc")
            .body(())
            .unwrap()
            .into_parts();
        let err = extract_bearer_token(&parts).unwrap_err();
        assert_eq!(error_code(err), "AUTH_INVALID_TOKEN");

        let (parts, _) = Request::builder()
            .uri("/")
            .header("Authorization", "Bearer abc.def")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(extract_bearer_token(&parts).unwrap(), "abc.def");
    }
}
