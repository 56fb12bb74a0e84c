//! Clinical note models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClinicalNote {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub visit_datetime: String,
    pub chief_complaint: String,
    pub diagnosis: Option<String>,
    pub medications_prescribed: Option<String>,
    pub vitals: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Clinical note joined with the authoring doctor's display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClinicalNoteWithAuthor {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub visit_datetime: String,
    pub chief_complaint: String,
    pub diagnosis: Option<String>,
    pub medications_prescribed: Option<String>,
    pub vitals: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub doctor_username: String,
    pub doctor_first_name: Option<String>,
    pub doctor_last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClinicalNoteRequest {
    pub patient_id: Option<String>,
    pub visit_datetime: Option<String>,
    pub chief_complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub medications_prescribed: Option<String>,
    pub vitals: Option<String>,
    pub notes: Option<String>,
}

/// Only content fields are mutable; patient and author links are fixed
/// at creation.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateClinicalNoteRequest {
    pub chief_complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub medications_prescribed: Option<String>,
    pub vitals: Option<String>,
    pub notes: Option<String>,
}
