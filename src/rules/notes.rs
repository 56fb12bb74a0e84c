//! Clinical note authorization rules.
//!
//! Notes may be authored by doctors and admins. Once written, a note can only
//! be modified or removed by its authoring user or an admin; the patient link
//! and authorship are immutable.

use crate::api::auth::Claims;
use crate::api::error::ApiError;
use crate::db::{
    ClinicalNote, ClinicalNoteWithAuthor, CreateClinicalNoteRequest, DbPool, Role,
    UpdateClinicalNoteRequest,
};

const JOINED_SELECT: &str = r#"
    SELECT
        cn.id, cn.patient_id, cn.doctor_id, cn.visit_datetime, cn.chief_complaint,
        cn.diagnosis, cn.medications_prescribed, cn.vitals, cn.notes,
        cn.created_at, cn.updated_at,
        u.username AS doctor_username,
        u.first_name AS doctor_first_name, u.last_name AS doctor_last_name
    FROM clinical_notes cn
    JOIN users u ON cn.doctor_id = u.id
"#;

/// The author-or-admin rule.
pub fn can_modify(actor: &Claims, author_id: &str) -> bool {
    actor.role == Role::Admin || actor.id == author_id
}

/// Create a clinical note authored by the acting user.
pub async fn create_note(
    db: &DbPool,
    actor: &Claims,
    req: &CreateClinicalNoteRequest,
) -> Result<ClinicalNote, ApiError> {
    let (patient_id, chief_complaint) = match (
        req.patient_id.as_deref().filter(|s| !s.is_empty()),
        req.chief_complaint.as_deref().filter(|s| !s.is_empty()),
    ) {
        (Some(p), Some(c)) => (p, c),
        _ => {
            return Err(ApiError::bad_request(
                "Missing required fields: patient ID, chief complaint",
            ))
        }
    };

    // The route gate already restricts this, but the rule stands on its own.
    if !actor.role.can_author_notes() {
        return Err(ApiError::forbidden(
            "Only doctors or administrators can create clinical notes",
        ));
    }

    let patient: Option<(String,)> = sqlx::query_as("SELECT id FROM patients WHERE id = ?")
        .bind(patient_id)
        .fetch_optional(db)
        .await?;
    if patient.is_none() {
        return Err(ApiError::not_found("Patient not found"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let visit_datetime = req.visit_datetime.clone().unwrap_or_else(|| now.clone());

    sqlx::query(
        r#"
        INSERT INTO clinical_notes
            (id, patient_id, doctor_id, visit_datetime, chief_complaint,
             diagnosis, medications_prescribed, vitals, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(patient_id)
    .bind(&actor.id)
    .bind(&visit_datetime)
    .bind(chief_complaint)
    .bind(&req.diagnosis)
    .bind(&req.medications_prescribed)
    .bind(&req.vitals)
    .bind(&req.notes)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    let note = sqlx::query_as::<_, ClinicalNote>("SELECT * FROM clinical_notes WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await?;

    tracing::info!(note = %note.id, patient = %note.patient_id, author = %actor.id, "Clinical note created");

    Ok(note)
}

/// Update a note's content fields. Authorship and patient linkage never change.
pub async fn update_note(
    db: &DbPool,
    actor: &Claims,
    id: &str,
    req: &UpdateClinicalNoteRequest,
) -> Result<ClinicalNote, ApiError> {
    let current: Option<(String,)> =
        sqlx::query_as("SELECT doctor_id FROM clinical_notes WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
    let (author_id,) = current.ok_or_else(|| ApiError::not_found("Clinical note not found"))?;

    if !can_modify(actor, &author_id) {
        return Err(ApiError::forbidden(
            "Only the authoring doctor or an administrator can modify this clinical note",
        ));
    }

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE clinical_notes SET
            chief_complaint = COALESCE(?, chief_complaint),
            diagnosis = COALESCE(?, diagnosis),
            medications_prescribed = COALESCE(?, medications_prescribed),
            vitals = COALESCE(?, vitals),
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.chief_complaint)
    .bind(&req.diagnosis)
    .bind(&req.medications_prescribed)
    .bind(&req.vitals)
    .bind(&req.notes)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;

    let note = sqlx::query_as::<_, ClinicalNote>("SELECT * FROM clinical_notes WHERE id = ?")
        .bind(id)
        .fetch_one(db)
        .await?;

    Ok(note)
}

/// Delete a note under the same author-or-admin rule.
pub async fn delete_note(db: &DbPool, actor: &Claims, id: &str) -> Result<String, ApiError> {
    let current: Option<(String,)> =
        sqlx::query_as("SELECT doctor_id FROM clinical_notes WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;
    let (author_id,) = current.ok_or_else(|| ApiError::not_found("Clinical note not found"))?;

    if !can_modify(actor, &author_id) {
        return Err(ApiError::forbidden(
            "Only the authoring doctor or an administrator can delete this clinical note",
        ));
    }

    sqlx::query("DELETE FROM clinical_notes WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    tracing::info!(note = %id, actor = %actor.id, "Clinical note deleted");

    Ok(id.to_string())
}

/// All notes for a patient, newest visit first.
pub async fn list_notes_by_patient(
    db: &DbPool,
    patient_id: &str,
) -> Result<Vec<ClinicalNoteWithAuthor>, ApiError> {
    let query = format!(
        "{} WHERE cn.patient_id = ? ORDER BY cn.visit_datetime DESC",
        JOINED_SELECT
    );
    let notes = sqlx::query_as::<_, ClinicalNoteWithAuthor>(&query)
        .bind(patient_id)
        .fetch_all(db)
        .await?;

    Ok(notes)
}

/// Fetch a single note with author display fields.
pub async fn get_note(db: &DbPool, id: &str) -> Result<ClinicalNoteWithAuthor, ApiError> {
    let query = format!("{} WHERE cn.id = ?", JOINED_SELECT);
    let note = sqlx::query_as::<_, ClinicalNoteWithAuthor>(&query)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Clinical note not found"))?;

    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::db::test_pool;

    async fn seed_patient(db: &DbPool) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO patients (id, first_name, last_name, date_of_birth, gender, contact_phone)
            VALUES (?, 'Jane', 'Doe', '1990-01-01', 'Female', '555-0100')
            "#,
        )
        .bind(&id)
        .execute(db)
        .await
        .unwrap();
        id
    }

    async fn seed_claims(db: &DbPool, role: Role) -> Claims {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role) VALUES (?, ?, 'x', ?)",
        )
        .bind(&id)
        .bind(format!("user-{}", &id[..8]))
        .bind(role)
        .execute(db)
        .await
        .unwrap();
        Claims {
            id: id.clone(),
            username: format!("user-{}", &id[..8]),
            role,
            exp: (chrono::Utc::now() + chrono::Duration::hours(8)).timestamp(),
        }
    }

    fn note_request(patient_id: &str) -> CreateClinicalNoteRequest {
        CreateClinicalNoteRequest {
            patient_id: Some(patient_id.to_string()),
            visit_datetime: None,
            chief_complaint: Some("Persistent cough".to_string()),
            diagnosis: None,
            medications_prescribed: None,
            vitals: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_note_defaults_visit_time() {
        let db = test_pool().await;
        let patient = seed_patient(&db).await;
        let doctor = seed_claims(&db, Role::Doctor).await;

        let note = create_note(&db, &doctor, &note_request(&patient)).await.unwrap();
        assert_eq!(note.doctor_id, doctor.id);
        assert!(!note.visit_datetime.is_empty());
    }

    #[tokio::test]
    async fn test_create_note_missing_fields() {
        let db = test_pool().await;
        let doctor = seed_claims(&db, Role::Doctor).await;
        let req = CreateClinicalNoteRequest {
            patient_id: None,
            visit_datetime: None,
            chief_complaint: None,
            diagnosis: None,
            medications_prescribed: None,
            vitals: None,
            notes: None,
        };
        let err = create_note(&db, &doctor, &req).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_create_note_unknown_patient() {
        let db = test_pool().await;
        let doctor = seed_claims(&db, Role::Doctor).await;
        let err = create_note(&db, &doctor, &note_request("no-such-patient"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_nurse_cannot_author_notes() {
        let db = test_pool().await;
        let patient = seed_patient(&db).await;
        let nurse = seed_claims(&db, Role::Nurse).await;
        let err = create_note(&db, &nurse, &note_request(&patient))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_modification_matrix() {
        let db = test_pool().await;
        let patient = seed_patient(&db).await;
        let author = seed_claims(&db, Role::Doctor).await;
        let other_doctor = seed_claims(&db, Role::Doctor).await;
        let admin = seed_claims(&db, Role::Admin).await;
        let nurse = seed_claims(&db, Role::Nurse).await;

        let update = UpdateClinicalNoteRequest {
            diagnosis: Some("Bronchitis".to_string()),
            ..Default::default()
        };

        // Update: author and admin allowed, everyone else forbidden
        for (actor, allowed) in [
            (&author, true),
            (&other_doctor, false),
            (&admin, true),
            (&nurse, false),
        ] {
            let note = create_note(&db, &author, &note_request(&patient)).await.unwrap();
            let result = update_note(&db, actor, &note.id, &update).await;
            if allowed {
                result.unwrap();
            } else {
                assert_eq!(result.unwrap_err().code(), ErrorCode::Forbidden);
            }
            delete_note(&db, &admin, &note.id).await.unwrap();
        }

        // Delete: same rule
        for (actor, allowed) in [
            (&author, true),
            (&other_doctor, false),
            (&admin, true),
            (&nurse, false),
        ] {
            let note = create_note(&db, &author, &note_request(&patient)).await.unwrap();
            let result = delete_note(&db, actor, &note.id).await;
            if allowed {
                result.unwrap();
            } else {
                assert_eq!(result.unwrap_err().code(), ErrorCode::Forbidden);
                delete_note(&db, &admin, &note.id).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_authorship_survives_admin_update() {
        let db = test_pool().await;
        let patient = seed_patient(&db).await;
        let author = seed_claims(&db, Role::Doctor).await;
        let admin = seed_claims(&db, Role::Admin).await;

        let note = create_note(&db, &author, &note_request(&patient)).await.unwrap();
        let updated = update_note(
            &db,
            &admin,
            &note.id,
            &UpdateClinicalNoteRequest {
                notes: Some("Reviewed by administration".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.doctor_id, author.id);
        assert_eq!(updated.patient_id, patient);
    }

    #[tokio::test]
    async fn test_update_missing_note() {
        let db = test_pool().await;
        let admin = seed_claims(&db, Role::Admin).await;
        let err = update_note(
            &db,
            &admin,
            "no-such-note",
            &UpdateClinicalNoteRequest::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_list_notes_newest_visit_first() {
        let db = test_pool().await;
        let patient = seed_patient(&db).await;
        let doctor = seed_claims(&db, Role::Doctor).await;

        for visit in ["2025-01-10T09:00:00Z", "2025-02-20T09:00:00Z"] {
            let req = CreateClinicalNoteRequest {
                visit_datetime: Some(visit.to_string()),
                ..note_request(&patient)
            };
            create_note(&db, &doctor, &req).await.unwrap();
        }

        let notes = list_notes_by_patient(&db, &patient).await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].visit_datetime, "2025-02-20T09:00:00Z");
        assert_eq!(notes[0].doctor_username, doctor.username);
    }
}
