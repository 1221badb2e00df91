//! Authentication: registration, login, staff management, and the
//! `AuthUser` extractor consumed by protected handlers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{roles, LoginRequest, LoginResponse, RegisterRequest, UpdateStaffRequest, User, UserResponse};
use crate::AppState;

use super::error::ApiError;

/// JWT payload: user id, role, and expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub exp: i64,
}

/// The authenticated principal, resolved from the request's token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMIN
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }
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

/// Sign a token for a user.
pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let exp = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(ttl_hours))
        .ok_or_else(|| ApiError::internal("Token expiry overflow"))?
        .timestamp();

    let claims = Claims {
        sub: user.id,
        role: user.role.clone(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        ApiError::internal("Failed to sign token")
    })
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("Token is not valid"))
}

/// Pull the token out of either header convention: `x-auth-token`
/// first, then `Authorization: Bearer <token>`.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers.get("x-auth-token").and_then(|h| h.to_str().ok()) {
        return Some(token.to_string());
    }

    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("No token, authorization denied"))?;
        let claims = decode_token(&token, &state.config.auth.jwt_secret)?;
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// Seed a default admin account when the users table is empty, so a
/// fresh install can log in.
pub async fn ensure_admin_user(
    pool: &crate::DbPool,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    let password_hash = hash_password(password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;

    sqlx::query(
        "INSERT INTO users (full_name, email, password_hash, role) VALUES (?, ?, ?, ?)",
    )
    .bind("Administrator")
    .bind(email)
    .bind(&password_hash)
    .bind(roles::ADMIN)
    .execute(pool)
    .await?;

    tracing::info!("Seeded default admin user: {}", email);
    Ok(())
}

/// Register a new account
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if req.full_name.trim().is_empty() {
        return Err(ApiError::validation_field("fullName", "Full name is required"));
    }
    if req.email.is_empty() || !req.email.contains('@') {
        return Err(ApiError::validation_field("email", "Invalid email address"));
    }
    if req.password.len() < 6 {
        return Err(ApiError::validation_field(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    if !roles::ALL.contains(&req.role.as_str()) {
        return Err(ApiError::validation_field(
            "role",
            format!("Role must be one of: {}", roles::ALL.join(", ")),
        ));
    }

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_some() {
        return Err(ApiError::conflict("Email already exists"));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    let result = sqlx::query(
        "INSERT INTO users (full_name, email, password_hash, role) VALUES (?, ?, ?, ?)",
    )
    .bind(&req.full_name)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.role)
    .execute(&state.db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    tracing::info!(email = %user.email, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Exchange credentials for a token
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// List all staff accounts, ordered by name (admin only)
///
/// GET /api/auth/staff
pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    auth.require_admin()?;

    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY full_name ASC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Update a staff account (admin only)
///
/// PUT /api/auth/staff/:id
pub async fn update_staff(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStaffRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    auth.require_admin()?;

    if let Some(ref role) = req.role {
        if !roles::ALL.contains(&role.as_str()) {
            return Err(ApiError::validation_field(
                "role",
                format!("Role must be one of: {}", roles::ALL.join(", ")),
            ));
        }
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    if user.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let password_hash = match req.password.as_deref() {
        Some(password) => Some(hash_password(password).map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            ApiError::internal("Failed to hash password")
        })?),
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE users SET
            full_name = COALESCE(?, full_name),
            email = COALESCE(?, email),
            role = COALESCE(?, role),
            password_hash = COALESCE(?, password_hash)
        WHERE id = ?
        "#,
    )
    .bind(&req.full_name)
    .bind(&req.email)
    .bind(&req.role)
    .bind(&password_hash)
    .bind(id)
    .execute(&state.db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// Delete a staff account (admin only, cannot delete yourself)
///
/// DELETE /api/auth/staff/:id
pub async fn delete_staff(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;

    if id == auth.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("sekret123").unwrap();
        assert!(verify_password("sekret123", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("sekret123", "not-a-hash"));
    }

    #[test]
    fn test_token_round_trip() {
        let user = User {
            id: 7,
            full_name: "Arta Krasniqi".to_string(),
            email: "arta@example.com".to_string(),
            password_hash: String::new(),
            role: roles::KAMARIER.to_string(),
            created_at: "2025-01-01 00:00:00".to_string(),
        };

        let token = issue_token(&user, "test-secret", 8).unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, "kamarier");

        assert!(decode_token(&token, "other-secret").is_err());
        assert!(decode_token("garbage", "test-secret").is_err());
    }

    #[test]
    fn test_extract_token_both_conventions() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert("x-auth-token", "xyz789".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz789"));

        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_require_admin() {
        let admin = AuthUser { id: 1, role: roles::ADMIN.to_string() };
        let waiter = AuthUser { id: 2, role: roles::KAMARIER.to_string() };
        assert!(admin.require_admin().is_ok());
        assert!(waiter.require_admin().is_err());
    }
}
