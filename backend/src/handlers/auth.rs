// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, LoginResponse, Role, SessionUser, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
        slug::unique_slug,
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it and derives a unique
/// profile slug from the display name (or the username).
/// Returns 201 Created and the new identity.
pub async fn register(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let slug = unique_slug(&pool, name.unwrap_or(&payload.username), None).await?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (username, password, name, slug)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, password, name, slug, bio, image, role, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(name)
    .bind(&slug)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(SessionUser {
            id: user.id,
            name: user.name,
            slug: user.slug,
            role: Role::parse(&user.role),
        }),
    ))
}

/// Authenticates a user and returns a JWT token.
///
/// The token carries the user id and role; that pair is the whole contract
/// the rest of the application relies on.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user: User = sqlx::query_as(
        r#"
        SELECT id, username, password, name, slug, bio, image, role, created_at
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let role = Role::parse(&user.role);
    let token = sign_jwt(user.id, role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        user: SessionUser {
            id: user.id,
            name: user.name,
            slug: user.slug,
            role,
        },
    }))
}
