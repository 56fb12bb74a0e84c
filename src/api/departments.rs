//! Department endpoints. Plain CRUD with a unique name.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{is_unique_violation, ApiError};
use crate::db::{CreateDepartmentRequest, Department, UpdateDepartmentRequest};
use crate::AppState;

use super::DeletedResponse;

/// Create a department
///
/// POST /api/departments
pub async fn create_department(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<Department>), ApiError> {
    let name = match req.name.as_deref().filter(|s| !s.is_empty()) {
        Some(name) => name,
        None => return Err(ApiError::validation_field("name", "Department name is required")),
    };

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM departments WHERE name = ?")
        .bind(name)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "Department with this name already exists",
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO departments (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(&req.description)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("Department with this name already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(department)))
}

/// List departments by name
///
/// GET /api/departments
pub async fn list_departments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Department>>, ApiError> {
    let departments =
        sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY name ASC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(departments))
}

/// Get a department by id
///
/// GET /api/departments/:id
pub async fn get_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Department>, ApiError> {
    let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Department not found"))?;
    Ok(Json(department))
}

/// Merge-patch update of a department
///
/// PUT /api/departments/:id
pub async fn update_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> Result<Json<Department>, ApiError> {
    let _existing = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Department not found"))?;

    if let Some(ref name) = req.name {
        let other: Option<(String,)> =
            sqlx::query_as("SELECT id FROM departments WHERE name = ? AND id != ?")
                .bind(name)
                .bind(&id)
                .fetch_optional(&state.db)
                .await?;
        if other.is_some() {
            return Err(ApiError::conflict(
                "Another department with this name already exists",
            ));
        }
    }

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE departments SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict("Another department with this name already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(department))
}

/// Delete a department
///
/// DELETE /api/departments/:id
pub async fn delete_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Department not found"));
    }

    Ok(Json(DeletedResponse { id }))
}
