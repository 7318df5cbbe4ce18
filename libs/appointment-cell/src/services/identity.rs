use async_trait::async_trait;
use tracing::debug;

use shared_models::auth::Identity;
use shared_utils::jwt::resolve_identity;

use crate::models::AppointmentError;

/// Turns an opaque session token into the doctor or patient acting on it.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, AppointmentError>;
}

/// Resolves HS256 session tokens signed with the project JWT secret.
pub struct JwtIdentityResolver {
    jwt_secret: String,
}

impl JwtIdentityResolver {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
        }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<Identity, AppointmentError> {
        let identity = resolve_identity(token, &self.jwt_secret).map_err(|e| {
            debug!("Rejected session token: {}", e);
            AppointmentError::InvalidToken(e)
        })?;

        debug!("Resolved session identity {}", identity);
        Ok(identity)
    }
}
