use axum::http::{self, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::warn;

use crate::models::{Identity, TokenClaims};

/// Verifies bearer tokens issued by the auth service.
///
/// Verification only; token generation lives elsewhere. Constructed
/// once in main and shared through the application state, so tests can
/// build one around a known secret.
pub struct JwtVerifier {
    secret: Option<String>,
}

impl JwtVerifier {
    pub fn new(secret: Option<String>) -> Self {
        if secret.is_none() {
            warn!("No JWT secret configured - all connections will be refused");
        }
        Self { secret }
    }

    /// Validate a token and return the identity it carries.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let secret = self.secret.as_ref().ok_or(AuthError::SecretNotConfigured)?;

        let validation = Validation::new(Algorithm::HS256);
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let token_data = decode::<TokenClaims>(token, &decoding_key, &validation)
            .map_err(AuthError::InvalidToken)?;

        Ok(Identity::from(token_data.claims))
    }
}

/// Extract the credential from a connection handshake.
///
/// Checked in priority order: explicit `token` query parameter, then
/// the Authorization header, then the auth_token cookie.
pub fn extract_token(query_token: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query_token {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            return Some(
                auth_str
                    .strip_prefix("Bearer ")
                    .unwrap_or(auth_str)
                    .to_string(),
            );
        }
    }

    if let Some(cookie_header) = headers.get(http::header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie::Cookie::split_parse(cookie_str).flatten() {
                if cookie.name() == "auth_token" {
                    return Some(cookie.value().to_string());
                }
            }
        }
    }

    None
}

#[derive(Debug)]
pub enum AuthError {
    MissingCredential,
    SecretNotConfigured,
    InvalidToken(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "Authentication required"),
            AuthError::SecretNotConfigured => write!(f, "JWT secret not configured"),
            AuthError::InvalidToken(e) => write!(f, "Invalid or expired token: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn make_token(secret: &str) -> String {
        let claims = TokenClaims {
            user_id: "u1".into(),
            email: "u1@example.com".into(),
            name: Some("User One".into()),
            organization_id: "org1".into(),
            role: None,
            avatar: None,
            exp: 4102444800, // 2100-01-01
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verify_accepts_valid_token() {
        let verifier = JwtVerifier::new(Some(SECRET.into()));
        let identity = verifier.verify(&make_token(SECRET)).unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.organization_id, "org1");
    }

    #[test]
    fn verify_rejects_wrong_signature() {
        let verifier = JwtVerifier::new(Some(SECRET.into()));
        let result = verifier.verify(&make_token("other-secret"));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn verify_fails_without_secret() {
        let verifier = JwtVerifier::new(None);
        let result = verifier.verify(&make_token(SECRET));
        assert!(matches!(result, Err(AuthError::SecretNotConfigured)));
    }

    #[test]
    fn extraction_prefers_query_parameter() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        let token = extract_token(Some("query-token"), &headers);
        assert_eq!(token.as_deref(), Some("query-token"));
    }

    #[test]
    fn extraction_falls_back_to_header_then_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        assert_eq!(
            extract_token(None, &headers).as_deref(),
            Some("header-token")
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=cookie-token"),
        );
        assert_eq!(
            extract_token(None, &headers).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn extraction_returns_none_without_credential() {
        assert!(extract_token(None, &HeaderMap::new()).is_none());
    }
}
