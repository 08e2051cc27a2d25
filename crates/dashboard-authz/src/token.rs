use crate::{AuthzError, AuthzResult, Role};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const LEGACY_ISSUER: &str = "karmada-dashboard";

/// Kubernetes service account a legacy token was minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountClaim {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

pub const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

impl ServiceAccountClaim {
    /// Kubernetes subject form, e.g. `system:serviceaccount:karmada-system:dashboard`.
    ///
    /// Local usernames cannot contain `:`, so subjects never collide with them.
    pub fn subject(&self) -> String {
        match self.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            Some(namespace) => format!("{SERVICE_ACCOUNT_PREFIX}{namespace}:{}", self.name),
            None => format!("{SERVICE_ACCOUNT_PREFIX}{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyClaims {
    pub iss: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serviceaccount: Option<ServiceAccountClaim>,
    pub iat: i64,
    pub exp: i64,
}

impl LegacyClaims {
    /// Username, falling back to the service account subject when the claim is empty.
    pub fn effective_username(&self) -> Option<String> {
        if !self.username.is_empty() {
            return Some(self.username.clone());
        }
        self.serviceaccount
            .as_ref()
            .filter(|sa| !sa.name.is_empty())
            .map(ServiceAccountClaim::subject)
    }

    /// Role carried by the token itself, if any parses.
    pub fn claimed_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|value| value.parse().ok())
    }
}

pub struct LegacyTokenIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl LegacyTokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> AuthzResult<Self> {
        if secret.is_empty() {
            return Err(AuthzError::EmptySecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            ttl,
        })
    }

    pub fn mint(
        &self,
        username: &str,
        role: Option<Role>,
        serviceaccount: Option<ServiceAccountClaim>,
    ) -> AuthzResult<String> {
        let now = now_epoch_seconds();
        let claims = LegacyClaims {
            iss: LEGACY_ISSUER.to_string(),
            username: username.to_string(),
            role: role.map(|role| role.as_str().to_string()),
            serviceaccount,
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        let token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }
}

pub struct LegacyTokenVerifier {
    decoding_key: DecodingKey,
    leeway: u64,
}

impl LegacyTokenVerifier {
    pub fn new(secret: &[u8], leeway: u64) -> AuthzResult<Self> {
        if secret.is_empty() {
            return Err(AuthzError::EmptySecret);
        }
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret),
            leeway,
        })
    }

    /// Verify an HS256 token and return its claims.
    ///
    /// The algorithm is pinned, so RS-signed or `none` tokens fail here even if
    /// a caller forgets to route them elsewhere first.
    pub fn verify(&self, token: &str) -> AuthzResult<LegacyClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[LEGACY_ISSUER]);
        validation.leeway = self.leeway;
        let data = jsonwebtoken::decode::<LegacyClaims>(token, &self.decoding_key, &validation)?;
        if data.claims.effective_username().is_none() {
            return Err(AuthzError::MissingClaim("username"));
        }
        Ok(data.claims)
    }
}

pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
