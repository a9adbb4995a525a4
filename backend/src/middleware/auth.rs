//! Authentication middleware
//!
//! Bearer-token verification and permission checks. Tokens are issued
//! elsewhere; this layer only decodes them.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Authenticated user information extracted from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}:{}", resource, action);
        self.permissions
            .iter()
            .any(|p| p == &permission || p == &format!("{}:*", resource) || p == "*")
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate a token, turning its claims into an `AuthUser`
pub fn authenticate(token: &str, secret: &str, leeway_secs: u64) -> Result<AuthUser, AppError> {
    let mut validation = Validation::default();
    validation.leeway = leeway_secs;

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
        permissions: claims.permissions,
    })
}

/// Authentication middleware that validates bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response();
    };

    match authenticate(token, &state.config.jwt.secret, state.config.jwt.leeway_secs) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Extractor for the authenticated user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, resource: &str, action: &str) -> Result<(), AppError> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.user_id, "permission denied: {}:{}", resource, action);
        Err(AppError::InsufficientPermissions(format!("{}:{}", resource, action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            role: "storekeeper".to_string(),
            permissions: vec!["inventory:adjust".to_string(), "request:*".to_string()],
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_user() {
        let id = Uuid::new_v4();
        let user = authenticate(&token("secret", &id.to_string(), 3600), "secret", 0).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.role, "storekeeper");
        assert!(user.has_permission("inventory", "adjust"));
        assert!(user.has_permission("request", "approve"));
        assert!(!user.has_permission("procurement", "approve"));
    }

    #[test]
    fn wrong_secret_or_expired_is_unauthorized() {
        let sub = Uuid::new_v4().to_string();
        assert!(matches!(
            authenticate(&token("secret", &sub, 3600), "other", 0),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&token("secret", &sub, -3600), "secret", 0),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        assert!(authenticate(&token("secret", "alice", 3600), "secret", 0).is_err());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: "viewer".into(),
            permissions: vec![],
        };
        assert!(matches!(
            check_permission(&user, "inventory", "adjust"),
            Err(AppError::InsufficientPermissions(_))
        ));
    }
}
