//! Patient registry endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{is_foreign_key_violation, ApiError, ValidationErrorBuilder};
use super::validation::validate_date;
use crate::db::{CreatePatientRequest, Patient, UpdatePatientRequest};
use crate::AppState;

use super::DeletedResponse;

/// Register a new patient
///
/// POST /api/patients
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    let required = [
        ("first_name", &req.first_name),
        ("last_name", &req.last_name),
        ("date_of_birth", &req.date_of_birth),
        ("gender", &req.gender),
        ("contact_phone", &req.contact_phone),
    ];
    for (field, value) in required {
        if value.as_deref().map_or(true, |v| v.is_empty()) {
            errors.add(field, format!("{} is required", field));
        }
    }
    if let Some(ref dob) = req.date_of_birth {
        if !dob.is_empty() {
            if let Err(e) = validate_date(dob) {
                errors.add("date_of_birth", e);
            }
        }
    }
    errors.finish()?;

    if let Some(ref national_id) = req.national_id {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM patients WHERE national_id = ?")
                .bind(national_id)
                .fetch_optional(&state.db)
                .await?;
        if existing.is_some() {
            return Err(ApiError::conflict(
                "Patient with this national ID already exists",
            ));
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO patients
            (id, first_name, last_name, date_of_birth, gender, national_id,
             contact_phone, email, address, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.date_of_birth)
    .bind(&req.gender)
    .bind(&req.national_id)
    .bind(&req.contact_phone)
    .bind(&req.email)
    .bind(&req.address)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(patient = %patient.id, "Patient registered");

    Ok((StatusCode::CREATED, Json(patient)))
}

/// List all patients, newest first
///
/// GET /api/patients
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients =
        sqlx::query_as::<_, Patient>("SELECT * FROM patients ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(patients))
}

/// Get a patient by id
///
/// GET /api/patients/:id
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    Ok(Json(patient))
}

/// Merge-patch update of a patient
///
/// PUT /api/patients/:id
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let _existing = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    if let Some(ref dob) = req.date_of_birth {
        if let Err(e) = validate_date(dob) {
            return Err(ApiError::validation_field("date_of_birth", e));
        }
    }

    // National id uniqueness against other rows
    if let Some(ref national_id) = req.national_id {
        let other: Option<(String,)> =
            sqlx::query_as("SELECT id FROM patients WHERE national_id = ? AND id != ?")
                .bind(national_id)
                .bind(&id)
                .fetch_optional(&state.db)
                .await?;
        if other.is_some() {
            return Err(ApiError::conflict(
                "Another patient with this national ID already exists",
            ));
        }
    }

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE patients SET
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            date_of_birth = COALESCE(?, date_of_birth),
            gender = COALESCE(?, gender),
            national_id = COALESCE(?, national_id),
            contact_phone = COALESCE(?, contact_phone),
            email = COALESCE(?, email),
            address = COALESCE(?, address),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.date_of_birth)
    .bind(&req.gender)
    .bind(&req.national_id)
    .bind(&req.contact_phone)
    .bind(&req.email)
    .bind(&req.address)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if super::error::is_unique_violation(&e) {
            ApiError::conflict("This national ID is already associated with another patient")
        } else {
            ApiError::from(e)
        }
    })?;

    let patient = sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(patient))
}

/// Delete a patient. Blocked while appointments or clinical notes still
/// reference the record.
///
/// DELETE /api/patients/:id
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM patients WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ApiError::conflict(
                    "Cannot delete patient with associated records; remove related appointments and notes first",
                )
            } else {
                ApiError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Patient not found"));
    }

    tracing::info!(patient = %id, "Patient deleted");

    Ok(Json(DeletedResponse { id }))
}
