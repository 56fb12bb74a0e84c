pub mod appointments;
pub mod auth;
pub mod clinical_notes;
pub mod departments;
pub mod error;
pub mod patients;
pub mod users;
pub mod validation;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Role;
use crate::AppState;

/// Response body for successful deletions
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: String,
}

// Per-endpoint allowed-role sets
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const ADMIN_RECEPTIONIST: &[Role] = &[Role::Admin, Role::Receptionist];
const ADMIN_DOCTOR: &[Role] = &[Role::Admin, Role::Doctor];
const CLINICAL_READERS: &[Role] = &[Role::Admin, Role::Doctor, Role::Nurse];
const ALL_STAFF: &[Role] = &[Role::Admin, Role::Doctor, Role::Nurse, Role::Receptionist];

fn user_routes() -> Router<Arc<AppState>> {
    let staff = Router::new()
        .route("/users", get(users::list_users))
        .route_layer(middleware::from_fn(auth::require_role(ALL_STAFF)));

    let admin = Router::new()
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        .route_layer(middleware::from_fn(auth::require_role(ADMIN_ONLY)));

    staff.merge(admin)
}

fn patient_routes() -> Router<Arc<AppState>> {
    let registration = Router::new()
        .route("/patients", post(patients::create_patient))
        .route("/patients/:id", put(patients::update_patient))
        .route_layer(middleware::from_fn(auth::require_role(ADMIN_RECEPTIONIST)));

    let admin = Router::new()
        .route("/patients/:id", delete(patients::delete_patient))
        .route_layer(middleware::from_fn(auth::require_role(ADMIN_ONLY)));

    // Reads are open to any authenticated staff member
    let reads = Router::new()
        .route("/patients", get(patients::list_patients))
        .route("/patients/:id", get(patients::get_patient));

    registration.merge(admin).merge(reads)
}

fn appointment_routes() -> Router<Arc<AppState>> {
    let scheduling = Router::new()
        .route("/appointments", post(appointments::create_appointment))
        .route("/appointments/:id", put(appointments::update_appointment))
        .route_layer(middleware::from_fn(auth::require_role(ADMIN_RECEPTIONIST)));

    let admin = Router::new()
        .route("/appointments/:id", delete(appointments::delete_appointment))
        .route_layer(middleware::from_fn(auth::require_role(ADMIN_ONLY)));

    let reads = Router::new()
        .route("/appointments", get(appointments::list_appointments))
        .route("/appointments/:id", get(appointments::get_appointment))
        .route_layer(middleware::from_fn(auth::require_role(ALL_STAFF)));

    scheduling.merge(admin).merge(reads)
}

fn clinical_note_routes() -> Router<Arc<AppState>> {
    // Ownership (author-or-admin) is enforced in the rule layer on top of
    // this role gate.
    let authoring = Router::new()
        .route("/clinical-notes", post(clinical_notes::create_note))
        .route("/clinical-notes/:id", put(clinical_notes::update_note))
        .route("/clinical-notes/:id", delete(clinical_notes::delete_note))
        .route_layer(middleware::from_fn(auth::require_role(ADMIN_DOCTOR)));

    let reads = Router::new()
        .route(
            "/clinical-notes/patient/:patient_id",
            get(clinical_notes::list_notes_by_patient),
        )
        .route("/clinical-notes/:id", get(clinical_notes::get_note))
        .route_layer(middleware::from_fn(auth::require_role(CLINICAL_READERS)));

    authoring.merge(reads)
}

fn department_routes() -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/departments", post(departments::create_department))
        .route("/departments/:id", put(departments::update_department))
        .route("/departments/:id", delete(departments::delete_department))
        .route_layer(middleware::from_fn(auth::require_role(ADMIN_ONLY)));

    let reads = Router::new()
        .route("/departments", get(departments::list_departments))
        .route("/departments/:id", get(departments::get_department))
        .route_layer(middleware::from_fn(auth::require_role(ALL_STAFF)));

    admin.merge(reads)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Protected API routes
    let api_routes = Router::new()
        .route("/auth/profile", get(auth::profile))
        .merge(user_routes())
        .merge(patient_routes())
        .merge(appointment_routes())
        .merge(clinical_note_routes())
        .merge(department_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    async fn register_and_token(state: &Arc<AppState>, username: &str, role: &str) -> String {
        let (_, axum::Json(resp)) = auth::register(
            axum::extract::State(state.clone()),
            axum::Json(crate::db::RegisterRequest {
                username: Some(username.to_string()),
                password: Some("a-decent-password".to_string()),
                role: Some(role.to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        resp.token
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let state = test_state().await;
        let router = create_router(state);

        let response = router
            .oneshot(get_request("/api/patients", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_token_is_403() {
        let state = test_state().await;
        let router = create_router(state);

        let response = router
            .oneshot(get_request("/api/patients", Some("not-a-jwt")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_role_mismatch_is_403() {
        let state = test_state().await;
        let token = register_and_token(&state, "nurse1", "nurse").await;
        let router = create_router(state);

        // Nurses may not delete patients
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/patients/some-id")
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_allowed_role_passes_gate() {
        let state = test_state().await;
        let token = register_and_token(&state, "nurse2", "nurse").await;
        let router = create_router(state);

        let response = router
            .oneshot(get_request("/api/patients", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_receptionist_cannot_read_clinical_notes() {
        let state = test_state().await;
        let token = register_and_token(&state, "frontdesk1", "receptionist").await;
        let router = create_router(state);

        let response = router
            .oneshot(get_request(
                "/api/clinical-notes/patient/some-patient",
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let state = test_state().await;
        let token = register_and_token(&state, "dr.profile", "doctor").await;
        let router = create_router(state);

        let response = router
            .oneshot(get_request("/api/auth/profile", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["user"]["username"], "dr.profile");
        assert_eq!(json["user"]["role"], "doctor");
        assert!(json["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let state = test_state().await;
        let router = create_router(state);

        let response = router
            .oneshot(get_request("/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
