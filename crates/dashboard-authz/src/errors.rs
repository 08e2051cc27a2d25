use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("signing secret must not be empty")]
    EmptySecret,
}

pub type AuthzResult<T> = Result<T, AuthzError>;
