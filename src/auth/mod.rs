use crate::errors::ServiceError;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_ADMIN: &str = "admin";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,       // Subject (customer ID)
    pub roles: Vec<String>,
    pub jti: String,       // Unique identifier for this token
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated principal extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub customer_id: Uuid,
    pub roles: Vec<String>,
    pub token_id: String,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

/// Issues and validates HS256 access tokens.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_lifetime: Duration,
    bootstrap_secret: Option<String>,
}

impl AuthService {
    pub fn new(
        jwt_secret: &str,
        token_lifetime: Duration,
        bootstrap_secret: Option<String>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_lifetime,
            bootstrap_secret,
        }
    }

    pub fn generate_token(
        &self,
        customer_id: Uuid,
        roles: Vec<String>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: customer_id.to_string(),
            roles,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(self.token_lifetime.as_secs() as i64))
                .timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {e}")))
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| ServiceError::Unauthorized("invalid or expired token".to_string()))?;

        let customer_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Unauthorized("malformed token subject".to_string()))?;

        Ok(AuthenticatedUser {
            customer_id,
            roles: data.claims.roles,
            token_id: data.claims.jti,
        })
    }

    fn check_bootstrap_secret(&self, supplied: Option<&str>) -> Result<(), ServiceError> {
        match (&self.bootstrap_secret, supplied) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            (Some(_), _) => Err(ServiceError::Unauthorized(
                "invalid bootstrap secret".to_string(),
            )),
            (None, _) => Err(ServiceError::Forbidden(
                "token minting is disabled".to_string(),
            )),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ServiceError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| ServiceError::Unauthorized("expected bearer token".to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);
        let token = bearer_token(parts)?;
        auth_service.validate_token(token)
    }
}

/// Extractor for admin-only endpoints; rejects non-admin principals.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ServiceError::Forbidden(
                "admin role required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

/// Token mint request for development and test environments.
#[derive(Debug, Deserialize)]
pub struct MintTokenRequest {
    /// Principal to mint for; a fresh id is generated when omitted
    pub customer_id: Option<Uuid>,
    /// "customer" (default) or "admin"
    pub role: Option<String>,
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct MintTokenResponse {
    pub token: String,
    pub customer_id: Uuid,
}

/// Authentication routes
pub fn auth_routes() -> Router<Arc<AuthService>> {
    Router::new().route("/token", post(mint_token_handler))
}

/// Mint a development token; guarded by the configured bootstrap secret.
async fn mint_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(request): Json<MintTokenRequest>,
) -> Result<Json<MintTokenResponse>, ServiceError> {
    auth_service.check_bootstrap_secret(Some(request.secret.as_str()))?;

    let role = request.role.unwrap_or_else(|| ROLE_CUSTOMER.to_string());
    if role != ROLE_CUSTOMER && role != ROLE_ADMIN {
        return Err(ServiceError::ValidationError(format!(
            "unknown role: {role}"
        )));
    }

    let customer_id = request.customer_id.unwrap_or_else(Uuid::new_v4);
    let token = auth_service.generate_token(customer_id, vec![role])?;

    Ok(Json(MintTokenResponse { token, customer_id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(
            "a_jwt_secret_that_is_long_enough_for_validation",
            Duration::from_secs(3600),
            Some("bootstrap".to_string()),
        )
    }

    #[test]
    fn token_round_trip() {
        let svc = service();
        let customer_id = Uuid::new_v4();

        let token = svc
            .generate_token(customer_id, vec![ROLE_CUSTOMER.to_string()])
            .unwrap();
        let user = svc.validate_token(&token).unwrap();

        assert_eq!(user.customer_id, customer_id);
        assert!(user.has_role(ROLE_CUSTOMER));
        assert!(!user.is_admin());
    }

    #[test]
    fn admin_role_recognised() {
        let svc = service();
        let token = svc
            .generate_token(Uuid::new_v4(), vec![ROLE_ADMIN.to_string()])
            .unwrap();
        assert!(svc.validate_token(&token).unwrap().is_admin());
    }

    #[test]
    fn garbage_token_rejected() {
        let svc = service();
        assert!(matches!(
            svc.validate_token("not.a.jwt"),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_from_other_secret_rejected() {
        let other = AuthService::new(
            "another_secret_that_is_also_long_enough_here",
            Duration::from_secs(3600),
            None,
        );
        let token = other
            .generate_token(Uuid::new_v4(), vec![ROLE_CUSTOMER.to_string()])
            .unwrap();

        assert!(service().validate_token(&token).is_err());
    }

    #[test]
    fn bootstrap_secret_checks() {
        let svc = service();
        assert!(svc.check_bootstrap_secret(Some("bootstrap")).is_ok());
        assert!(svc.check_bootstrap_secret(Some("wrong")).is_err());

        let disabled = AuthService::new(
            "a_jwt_secret_that_is_long_enough_for_validation",
            Duration::from_secs(3600),
            None,
        );
        assert!(matches!(
            disabled.check_bootstrap_secret(Some("anything")),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
