//! Staff user management endpoints (admin-scoped except listing, which the
//! frontend uses for doctor pickers).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::str::FromStr;
use std::sync::Arc;

use super::error::{is_foreign_key_violation, ApiError};
use crate::db::{ListUsersQuery, Role, UpdateUserRequest, User, UserResponse};
use crate::AppState;

use super::DeletedResponse;

/// List users, optionally filtered by role
///
/// GET /api/users?role=doctor
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let role = match &query.role {
        Some(r) => Some(Role::from_str(r).map_err(|e| ApiError::validation_field("role", e))?),
        None => None,
    };

    let users = match role {
        Some(role) => {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = ? ORDER BY username ASC")
                .bind(role)
                .fetch_all(&state.db)
                .await?
        }
        None => {
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username ASC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get a user by id
///
/// GET /api/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(UserResponse::from(user)))
}

/// Merge-patch update of a user's role and profile fields
///
/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let _existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let role = match &req.role {
        Some(r) => Some(Role::from_str(r).map_err(|e| ApiError::validation_field("role", e))?),
        None => None,
    };

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            role = COALESCE(?, role),
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            email = COALESCE(?, email),
            phone = COALESCE(?, phone),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(role)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// Delete a user. Blocked while appointments or clinical notes still
/// reference the account.
///
/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ApiError::conflict(
                    "Cannot delete user with associated records; remove related appointments and notes first",
                )
            } else {
                ApiError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user = %id, "User deleted");

    Ok(Json(DeletedResponse { id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::test_state;

    async fn seed_user(state: &crate::AppState, username: &str, role: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role) VALUES (?, ?, 'x', ?)",
        )
        .bind(&id)
        .bind(username)
        .bind(role)
        .execute(&state.db)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn test_list_users_filters_by_role() {
        let state = test_state().await;
        seed_user(&state, "doc1", "doctor").await;
        seed_user(&state, "doc2", "doctor").await;
        seed_user(&state, "nurse1", "nurse").await;

        let Json(doctors) = list_users(
            State(state.clone()),
            Query(ListUsersQuery {
                role: Some("doctor".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(doctors.len(), 2);
        assert!(doctors.iter().all(|u| u.role == Role::Doctor));

        let err = list_users(
            State(state),
            Query(ListUsersQuery {
                role: Some("janitor".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_role() {
        let state = test_state().await;
        let id = seed_user(&state, "promoted", "receptionist").await;

        let Json(updated) = update_user(
            State(state),
            Path(id),
            Json(UpdateUserRequest {
                role: Some("nurse".to_string()),
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.role, Role::Nurse);
        assert_eq!(updated.username, "promoted");
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let state = test_state().await;
        let err = delete_user(State(state), Path("no-such-id".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
