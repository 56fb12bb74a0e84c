//! Authentication and role-based access control.
//!
//! Credentials are verified against argon2 hashes; sessions are stateless
//! signed JWTs carrying {id, username, role} with an 8-hour expiry. The
//! middleware chain distinguishes a missing token (401) from an invalid or
//! expired one (403), matching the route gate's role-mismatch status.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use super::error::ApiError;
use super::validation::{validate_password, validate_username};
use crate::db::{AuthResponse, LoginRequest, RegisterRequest, Role, User, UserResponse};
use crate::AppState;

/// Decoded session token payload. Attached to the request after verification
/// and passed explicitly through the call chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub exp: i64,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Issue a signed session token for a user
pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let exp = chrono::Utc::now() + chrono::Duration::hours(ttl_hours);
    let claims = Claims {
        id: user.id.clone(),
        username: user.username.clone(),
        role: user.role,
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign session token: {}", e);
        ApiError::internal("Failed to issue session token")
    })
}

/// Verify a session token. Bad signature and expiry are both terminal and
/// reported the same way.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::forbidden("Not authorized, token failed or expired"))
}

/// Extract a bearer token from the Authorization header
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Token-verification middleware. Attaches the decoded claims to the request
/// for downstream role gates and handlers.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authorized, no token provided"))?;

    let claims = verify_token(token, &state.config.auth.jwt_secret)?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Route-layer role gate. Must run after `auth_middleware`; a request without
/// claims is treated as unauthenticated.
pub fn require_role(
    allowed: &'static [Role],
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>
       + Clone
       + Send
       + 'static {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let claims = request
                .extensions()
                .get::<Claims>()
                .ok_or_else(|| ApiError::unauthorized("Not authorized, no token provided"))?;

            if !allowed.contains(&claims.role) {
                return Err(ApiError::forbidden(format!(
                    "Role '{}' is not authorized to access this route",
                    claims.role
                )));
            }

            Ok(next.run(request).await)
        })
    }
}

/// Extractor for the verified claims attached by `auth_middleware`
#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authorized, no token provided"))
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
}

/// Register a new staff user
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let username = req.username.as_deref().unwrap_or_default();
    let password = req.password.as_deref().unwrap_or_default();
    if let Err(e) = validate_username(username) {
        return Err(ApiError::validation_field("username", e));
    }
    if let Err(e) = validate_password(password) {
        return Err(ApiError::validation_field("password", e));
    }

    // Role defaults to receptionist; an unknown role string is rejected
    let role = match &req.role {
        Some(r) => Role::from_str(r).map_err(|e| ApiError::validation_field("role", e))?,
        None => Role::Receptionist,
    };

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "User with that username already exists",
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, role, first_name, last_name, email, phone, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(username)
    .bind(&password_hash)
    .bind(role)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if super::error::is_unique_violation(&e) {
            ApiError::conflict("User with that username already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    let token = issue_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )?;

    tracing::info!(username = %user.username, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// Log in with username and password
///
/// POST /api/auth/login
///
/// Unknown usernames and wrong passwords produce the same response shape.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (username, password) = match (
        req.username.as_deref().filter(|s| !s.is_empty()),
        req.password.as_deref().filter(|s| !s.is_empty()),
    ) {
        (Some(u), Some(p)) => (u, p),
        _ => return Err(ApiError::bad_request("Username and password are required")),
    };

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Get the authenticated user's profile
///
/// GET /api/auth/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&claims.id)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ProfileResponse {
        user: UserResponse::from(user),
    }))
}
