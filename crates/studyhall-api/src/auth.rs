use argon2::{
    Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;
use uuid::Uuid;

use studyhall_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};

use crate::AppState;
use crate::error::ApiError;
use crate::users::user_response;

const TOKEN_TTL_MINUTES: i64 = 60 * 24 * 8;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("email is not valid".into()));
    }
    if req.password.len() < 8 || req.password.len() > 128 {
        return Err(ApiError::Validation(
            "password must be between 8 and 128 characters".into(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let created = state
        .db
        .create_user(&user_id.to_string(), &req.name, &req.email, &password_hash)?;
    if !created {
        return Err(ApiError::Conflict("user with this email already exists"));
    }

    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    let token = create_token(&state.jwt_secret, user_id, &req.email)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user_response(user),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or(ApiError::Unauthorized("incorrect email or password"))?;

    let (verified, replacement_hash) = verify_credential(&req.password, &user.password);
    if !verified {
        return Err(ApiError::Unauthorized("incorrect email or password"));
    }

    // Lazy hash migration: re-hash with current parameters on successful
    // login. Best-effort — a failure here must not block the login.
    if let Some(new_hash) = replacement_hash {
        if let Err(e) = state.db.update_password(&user.id, &new_hash) {
            warn!("Failed to persist migrated hash for {}: {}", user.id, e);
        }
    }

    if let Err(e) = state.db.touch_last_login(&user.id) {
        warn!("Failed to update last_login for {}: {}", user.id, e);
    }

    let user_id = crate::parse_uuid("user id", &user.id);
    let token = create_token(&state.jwt_secret, user_id, &user.email)?;

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(TOKEN_TTL_MINUTES)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
}

/// Verify a password against a stored hash. Returns whether it matched and,
/// when the stored hash predates current parameters, a replacement hash the
/// caller persists on successful login.
pub fn verify_credential(password: &str, stored: &str) -> (bool, Option<String>) {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return (false, None);
    };

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_err()
    {
        return (false, None);
    }

    let current = Params::default();
    let stale = parsed.algorithm != argon2::ARGON2ID_IDENT
        || Params::try_from(&parsed)
            .map(|p| p.m_cost() < current.m_cost() || p.t_cost() < current.t_cost())
            .unwrap_or(true);

    if stale {
        (true, hash_password(password).ok())
    } else {
        (true, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct horse").unwrap();
        let (ok, replacement) = verify_credential("battery staple", &hash);
        assert!(!ok);
        assert!(replacement.is_none());
    }

    #[test]
    fn current_hash_needs_no_migration() {
        let hash = hash_password("correct horse").unwrap();
        let (ok, replacement) = verify_credential("correct horse", &hash);
        assert!(ok);
        assert!(replacement.is_none());
    }

    #[test]
    fn weak_hash_yields_replacement() {
        // Hash with deliberately low-cost parameters, as an old deployment
        // would have produced.
        let weak = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None).unwrap();
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, weak);
        let salt = SaltString::generate(&mut OsRng);
        let old_hash = argon2
            .hash_password(b"correct horse", &salt)
            .unwrap()
            .to_string();

        let (ok, replacement) = verify_credential("correct horse", &old_hash);
        assert!(ok);
        let new_hash = replacement.expect("weak hash should be re-hashed");

        // The replacement verifies with current parameters and is final
        let (ok, again) = verify_credential("correct horse", &new_hash);
        assert!(ok);
        assert!(again.is_none());
    }
}
