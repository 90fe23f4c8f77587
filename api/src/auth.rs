use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::convert::Infallible;

/// Model credential carried in `Authorization: Bearer <key>`. It is passed to
/// the model services as-is and never validated here.
#[derive(Debug, Clone, Default)]
pub struct Credential(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Credential {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().trim().to_string())
            .filter(|token| !token.is_empty());

        if let Some(token) = &token {
            log::debug!("Request carries credential {}", mask(token));
        }
        Ok(Self(token))
    }
}

fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
