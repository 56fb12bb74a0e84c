//! Appointment scheduling rule engine.
//!
//! Enforces referential validity (patient exists, doctor exists and holds the
//! doctor role) and the double-booking invariant: at most one appointment
//! with status `scheduled` per (doctor, date, time). The availability query
//! here is advisory; the partial unique index on appointments is what
//! actually guarantees a single winner when identical requests race.

use std::str::FromStr;

use crate::api::error::{is_unique_violation, ApiError, ValidationErrorBuilder};
use crate::api::validation::{validate_date, validate_time};
use crate::db::{
    Appointment, AppointmentStatus, AppointmentWithNames, CreateAppointmentRequest, DbPool,
    ListAppointmentsQuery, Role, UpdateAppointmentRequest,
};

const SLOT_TAKEN_ON_CREATE: &str = "Doctor is already booked at this time";
const SLOT_TAKEN_ON_UPDATE: &str = "Doctor is already booked at this new time slot";
const INVALID_DOCTOR: &str = "Invalid doctor ID or user is not a doctor";

const JOINED_SELECT: &str = r#"
    SELECT
        a.id, a.patient_id, a.doctor_id, a.appointment_date, a.appointment_time,
        a.status, a.reason, a.created_at, a.updated_at,
        p.first_name AS patient_first_name, p.last_name AS patient_last_name,
        u.username AS doctor_username,
        u.first_name AS doctor_first_name, u.last_name AS doctor_last_name
    FROM appointments a
    JOIN patients p ON a.patient_id = p.id
    JOIN users u ON a.doctor_id = u.id
"#;

async fn patient_exists(db: &DbPool, patient_id: &str) -> Result<bool, ApiError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM patients WHERE id = ?")
        .bind(patient_id)
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

/// A missing user and a user with a different role are indistinguishable to
/// callers of this check.
async fn is_doctor(db: &DbPool, user_id: &str) -> Result<bool, ApiError> {
    let row: Option<(Role,)> = sqlx::query_as("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(matches!(row, Some((Role::Doctor,))))
}

/// Check whether an active appointment already holds the slot. `exclude`
/// skips the row being updated.
async fn slot_taken(
    db: &DbPool,
    doctor_id: &str,
    date: &str,
    time: &str,
    exclude: Option<&str>,
) -> Result<bool, ApiError> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT id FROM appointments
        WHERE doctor_id = ? AND appointment_date = ? AND appointment_time = ?
          AND status = 'scheduled' AND id != ?
        "#,
    )
    .bind(doctor_id)
    .bind(date)
    .bind(time)
    .bind(exclude.unwrap_or(""))
    .fetch_optional(db)
    .await?;
    Ok(row.is_some())
}

/// Create an appointment, defaulting status to scheduled.
pub async fn create_appointment(
    db: &DbPool,
    req: &CreateAppointmentRequest,
) -> Result<Appointment, ApiError> {
    let (patient_id, doctor_id, date, time) = match (
        req.patient_id.as_deref().filter(|s| !s.is_empty()),
        req.doctor_id.as_deref().filter(|s| !s.is_empty()),
        req.appointment_date.as_deref().filter(|s| !s.is_empty()),
        req.appointment_time.as_deref().filter(|s| !s.is_empty()),
    ) {
        (Some(p), Some(d), Some(date), Some(time)) => (p, d, date, time),
        _ => {
            return Err(ApiError::bad_request(
                "Missing required appointment fields: patient, doctor, date, time",
            ))
        }
    };

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_date(date) {
        errors.add("appointment_date", e);
    }
    if let Err(e) = validate_time(time) {
        errors.add("appointment_time", e);
    }
    errors.finish()?;

    if !patient_exists(db, patient_id).await? {
        return Err(ApiError::bad_request("Patient not found"));
    }
    if !is_doctor(db, doctor_id).await? {
        return Err(ApiError::bad_request(INVALID_DOCTOR));
    }
    if slot_taken(db, doctor_id, date, time, None).await? {
        return Err(ApiError::conflict(SLOT_TAKEN_ON_CREATE));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO appointments
            (id, patient_id, doctor_id, appointment_date, appointment_time, status, reason, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'scheduled', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(patient_id)
    .bind(doctor_id)
    .bind(date)
    .bind(time)
    .bind(&req.reason)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .map_err(|e| {
        // A concurrent creation can slip past the pre-check; the slot index
        // decides the winner.
        if is_unique_violation(&e) {
            ApiError::conflict(SLOT_TAKEN_ON_CREATE)
        } else {
            ApiError::from(e)
        }
    })?;

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await?;

    tracing::info!(
        appointment = %appointment.id,
        doctor = %appointment.doctor_id,
        date = %appointment.appointment_date,
        time = %appointment.appointment_time,
        "Appointment created"
    );

    Ok(appointment)
}

/// Merge-patch update. Only supplied fields overwrite existing values; if the
/// effective (doctor, date, time) changes, the conflict check re-runs against
/// all other appointments.
pub async fn update_appointment(
    db: &DbPool,
    id: &str,
    req: &UpdateAppointmentRequest,
) -> Result<Appointment, ApiError> {
    let current = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    if let Some(ref patient_id) = req.patient_id {
        if !patient_exists(db, patient_id).await? {
            return Err(ApiError::not_found("Patient not found"));
        }
    }
    if let Some(ref doctor_id) = req.doctor_id {
        if !is_doctor(db, doctor_id).await? {
            return Err(ApiError::bad_request(INVALID_DOCTOR));
        }
    }

    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref date) = req.appointment_date {
        if let Err(e) = validate_date(date) {
            errors.add("appointment_date", e);
        }
    }
    if let Some(ref time) = req.appointment_time {
        if let Err(e) = validate_time(time) {
            errors.add("appointment_time", e);
        }
    }
    errors.finish()?;

    let status = match &req.status {
        // Transitions are deliberately unconstrained; only the value itself
        // is validated.
        Some(s) => Some(
            AppointmentStatus::from_str(s).map_err(|e| ApiError::validation_field("status", e))?,
        ),
        None => None,
    };

    let doctor_id = req.doctor_id.as_deref().unwrap_or(&current.doctor_id);
    let date = req
        .appointment_date
        .as_deref()
        .unwrap_or(&current.appointment_date);
    let time = req
        .appointment_time
        .as_deref()
        .unwrap_or(&current.appointment_time);

    let slot_changed = doctor_id != current.doctor_id
        || date != current.appointment_date
        || time != current.appointment_time;

    if slot_changed && slot_taken(db, doctor_id, date, time, Some(id)).await? {
        return Err(ApiError::conflict(SLOT_TAKEN_ON_UPDATE));
    }

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE appointments SET
            patient_id = COALESCE(?, patient_id),
            doctor_id = COALESCE(?, doctor_id),
            appointment_date = COALESCE(?, appointment_date),
            appointment_time = COALESCE(?, appointment_time),
            status = COALESCE(?, status),
            reason = COALESCE(?, reason),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.patient_id)
    .bind(&req.doctor_id)
    .bind(&req.appointment_date)
    .bind(&req.appointment_time)
    .bind(status)
    .bind(&req.reason)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict(SLOT_TAKEN_ON_UPDATE)
        } else {
            ApiError::from(e)
        }
    })?;

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
        .bind(id)
        .fetch_one(db)
        .await?;

    Ok(appointment)
}

/// Hard-delete an appointment, returning the deleted id.
pub async fn delete_appointment(db: &DbPool, id: &str) -> Result<String, ApiError> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    tracing::info!(appointment = %id, "Appointment deleted");

    Ok(id.to_string())
}

/// List appointments matching all provided filters, joined with patient and
/// doctor display names, ordered by date descending then time ascending.
pub async fn list_appointments(
    db: &DbPool,
    filters: &ListAppointmentsQuery,
) -> Result<Vec<AppointmentWithNames>, ApiError> {
    let status = match &filters.status {
        Some(s) => Some(
            AppointmentStatus::from_str(s).map_err(|e| ApiError::validation_field("status", e))?,
        ),
        None => None,
    };

    let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(JOINED_SELECT);
    qb.push(" WHERE 1=1");

    if let Some(ref patient_id) = filters.patient_id {
        qb.push(" AND a.patient_id = ").push_bind(patient_id);
    }
    if let Some(ref doctor_id) = filters.doctor_id {
        qb.push(" AND a.doctor_id = ").push_bind(doctor_id);
    }
    if let Some(ref date) = filters.date {
        qb.push(" AND a.appointment_date = ").push_bind(date);
    }
    if let Some(status) = status {
        qb.push(" AND a.status = ").push_bind(status.as_str());
    }

    qb.push(" ORDER BY a.appointment_date DESC, a.appointment_time ASC");

    let appointments = qb
        .build_query_as::<AppointmentWithNames>()
        .fetch_all(db)
        .await?;

    Ok(appointments)
}

/// Fetch a single appointment with display names.
pub async fn get_appointment(db: &DbPool, id: &str) -> Result<AppointmentWithNames, ApiError> {
    let query = format!("{} WHERE a.id = ?", JOINED_SELECT);
    let appointment = sqlx::query_as::<_, AppointmentWithNames>(&query)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    Ok(appointment)
}
