use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use base64::Engine;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::{
    brief::{generate_with_timeout, BriefGenerator},
    designers::{search, Designer, DesignerQuery},
    error::{ApiError, WizardError},
    gemini::CredentialSource,
    models::{ImageUpload, NotesRequest, SessionView, TogglePreferenceRequest, UploadImageRequest},
    submitter::RequestSubmitter,
    wizard::{GenerationOutcome, WizardSession},
};

/// Large enough for a 10MB image after base64 inflation.
const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<HashMap<Uuid, WizardSession>>>,
    pub generator: Arc<dyn BriefGenerator>,
    pub submitter: Arc<dyn RequestSubmitter>,
    pub credentials: Arc<dyn CredentialSource>,
    pub designers: Arc<Vec<Designer>>,
    pub preference_seed_count: usize,
    pub generation_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/designers", get(list_designers))
        .route("/api/requests", post(create_request))
        .route("/api/requests/:id", get(get_request).delete(abort_request))
        .route("/api/requests/:id/image", put(upload_image))
        .route("/api/requests/:id/notes", put(set_notes))
        .route("/api/requests/:id/generate", post(generate_brief))
        .route("/api/requests/:id/preferences", post(toggle_preference))
        .route("/api/requests/:id/continue", post(advance))
        .route("/api/requests/:id/back", post(back))
        .route("/api/requests/:id/submit", post(submit_request))
        .route("/api/requests/:id/return", post(finish_request))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES)),
        )
        .with_state(state)
}

fn with_session<T>(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&mut WizardSession) -> Result<T, WizardError>,
) -> Result<T, ApiError> {
    let mut guard = state.store.write();
    let session = guard.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
    Ok(f(session)?)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "sewna_requests",
        "version": env!("CARGO_PKG_VERSION"),
        "generation_configured": state.credentials.api_key().is_some(),
    }))
}

pub async fn list_designers(State(state): State<AppState>, Query(query): Query<DesignerQuery>) -> Json<Vec<Designer>> {
    Json(search(&state.designers, &query))
}

pub async fn create_request(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let session = WizardSession::new(state.preference_seed_count);
    let view = session.view();
    state.store.write().insert(session.id(), session);
    tracing::info!("🚀 Custom request session {} started", view.id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_request(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let guard = state.store.read();
    let session = guard.get(&id).ok_or(ApiError::SessionNotFound)?;
    Ok(Json(session.view()))
}

pub async fn abort_request(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.write().remove(&id).ok_or(ApiError::SessionNotFound)?;
    tracing::info!("🗑️ Custom request session {} aborted", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UploadImageRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(body.data_base64.trim())
        .map_err(|e| ApiError::BadRequest(format!("image data is not valid base64: {}", e)))?;
    let image = match body.mime_type.filter(|m| !m.trim().is_empty()) {
        Some(mime) => ImageUpload::new(body.filename, mime, data),
        None => ImageUpload::sniffed(body.filename, data),
    };
    with_session(&state, id, |s| {
        s.select_image(image)?;
        Ok(Json(s.view()))
    })
}

pub async fn set_notes(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<NotesRequest>,
) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |s| {
        s.set_notes(body.notes)?;
        Ok(Json(s.view()))
    })
}

#[axum::debug_handler]
pub async fn generate_brief(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let ticket = with_session(&state, id, WizardSession::begin_generation)?;

    // Runs detached so a dropped request still settles the session
    let task = tokio::spawn(async move {
        let result = generate_with_timeout(
            state.generator.as_ref(),
            &ticket.image,
            &ticket.notes,
            state.generation_timeout,
        )
        .await;

        let mut guard = state.store.write();
        let Some(session) = guard.get_mut(&id) else {
            tracing::warn!("Session {} was closed while its brief was generating; dropping result", id);
            return Err(ApiError::SessionNotFound);
        };
        if session.complete_generation(ticket, result)? == GenerationOutcome::Discarded {
            tracing::info!("Session {} changed image during generation; result ignored", id);
        }
        Ok::<_, ApiError>(session.view())
    });

    match task.await {
        Ok(view) => Ok(Json(view?)),
        Err(e) => {
            tracing::error!("Brief generation task for session {} failed: {}", id, e);
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

pub async fn toggle_preference(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<TogglePreferenceRequest>,
) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |s| {
        s.toggle_preference(&body.item)?;
        Ok(Json(s.view()))
    })
}

pub async fn advance(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |s| {
        s.advance()?;
        Ok(Json(s.view()))
    })
}

pub async fn back(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |s| {
        s.back()?;
        Ok(Json(s.view()))
    })
}

pub async fn submit_request(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    with_session(&state, id, |s| {
        s.submit_to(state.submitter.clone())?;
        Ok(Json(s.view()))
    })
}

pub async fn finish_request(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let mut guard = state.store.write();
    guard.get(&id).ok_or(ApiError::SessionNotFound)?.finish()?;
    guard.remove(&id);
    tracing::info!("👋 Custom request session {} closed", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designers::catalogue;
    use crate::error::{SubmitError, QUOTA_MESSAGE};
    use crate::gemini::StaticCredential;
    use crate::mock::MockBriefGenerator;
    use crate::models::{CustomRequest, DesignBrief};
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    struct QuotaExceeded;

    #[async_trait]
    impl BriefGenerator for QuotaExceeded {
        async fn generate(&self, _image: &ImageUpload, _notes: &str) -> Result<DesignBrief, crate::error::BriefError> {
            Err(crate::error::BriefError::quota())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl RequestSubmitter for Unreachable {
        async fn submit(&self, _request: &CustomRequest) -> Result<(), SubmitError> {
            Err(SubmitError::Transport("backend offline".into()))
        }
    }

    fn app_with(generator: Arc<dyn BriefGenerator>) -> Router {
        router(AppState {
            store: Arc::default(),
            generator,
            submitter: Arc::new(Unreachable),
            credentials: Arc::new(StaticCredential(None)),
            designers: Arc::new(catalogue()),
            preference_seed_count: 0,
            generation_timeout: Duration::from_secs(5),
        })
    }

    fn app() -> Router {
        app_with(Arc::new(MockBriefGenerator::new()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn start(app: &Router) -> String {
        let (status, view) = call(app, "POST", "/api/requests", None).await;
        assert_eq!(status, StatusCode::CREATED);
        format!("/api/requests/{}", view["id"].as_str().unwrap())
    }

    fn jpeg_upload(filename: &str) -> Value {
        let data = base64::engine::general_purpose::STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]);
        json!({ "filename": filename, "data_base64": data })
    }

    #[tokio::test]
    async fn full_request_flow() {
        let app = app();
        let base = start(&app).await;

        let (status, view) = call(&app, "PUT", &format!("{base}/image"), Some(jpeg_upload("boho-dress.jpg"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["image"]["mime_type"], "image/jpeg");

        call(&app, "PUT", &format!("{base}/notes"), Some(json!({ "notes": "longer sleeves" }))).await;

        let (status, view) = call(&app, "POST", &format!("{base}/generate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "preferences");
        assert_eq!(view["brief"]["style"], "Bohemian Chic");

        for item in ["Bell sleeves", "Rayon"] {
            let (status, _) = call(&app, "POST", &format!("{base}/preferences"), Some(json!({ "item": item }))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, view) = call(&app, "POST", &format!("{base}/continue"), None).await;
        assert_eq!(view["step"], "summary");

        let (status, view) = call(&app, "POST", &format!("{base}/submit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "confirmation");
        assert_eq!(view["selected_preferences"], json!(["Bell sleeves", "Rayon"]));
        assert_eq!(view["notes"], "longer sleeves");

        let (status, _) = call(&app, "POST", &format!("{base}/return"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generate_without_image_reports_validation_error() {
        let app = app();
        let base = start(&app).await;

        let (status, body) = call(&app, "POST", &format!("{base}/generate"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "no image selected");

        let (_, view) = call(&app, "GET", &base, None).await;
        assert_eq!(view["step"], "upload");
        assert_eq!(view["error"], "no image selected");
    }

    #[tokio::test]
    async fn quota_failure_keeps_session_at_upload() {
        let app = app_with(Arc::new(QuotaExceeded));
        let base = start(&app).await;
        call(&app, "PUT", &format!("{base}/image"), Some(jpeg_upload("look.jpg"))).await;

        let (status, body) = call(&app, "POST", &format!("{base}/generate"), None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], QUOTA_MESSAGE);

        let (_, view) = call(&app, "GET", &base, None).await;
        assert_eq!(view["step"], "upload");
        assert_eq!(view["error"], QUOTA_MESSAGE);
        assert_eq!(view["generating"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_generate_request_still_settles_session() {
        let app = app_with(Arc::new(MockBriefGenerator::with_delay(Duration::from_millis(300))));
        let base = start(&app).await;
        call(&app, "PUT", &format!("{base}/image"), Some(jpeg_upload("boho.jpg"))).await;

        let generate_uri = format!("{base}/generate");
        let generate = call(&app, "POST", &generate_uri, None);
        assert!(tokio::time::timeout(Duration::from_millis(50), generate).await.is_err());
        tokio::time::sleep(Duration::from_millis(600)).await;

        let (status, view) = call(&app, "GET", &base, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["generating"], false);
        assert_eq!(view["step"], "preferences");
        assert_eq!(view["brief"]["style"], "Bohemian Chic");

        let (status, view) = call(&app, "POST", &format!("{base}/back"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "upload");
        let (status, view) = call(&app, "POST", &format!("{base}/generate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "preferences");
    }

    #[tokio::test(start_paused = true)]
    async fn abort_during_generation_drops_the_result() {
        let app = app_with(Arc::new(MockBriefGenerator::with_delay(Duration::from_millis(300))));
        let base = start(&app).await;
        call(&app, "PUT", &format!("{base}/image"), Some(jpeg_upload("look.jpg"))).await;

        let pending = {
            let (app, uri) = (app.clone(), format!("{base}/generate"));
            tokio::spawn(async move { call(&app, "POST", &uri, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (status, _) = call(&app, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = pending.await.unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "request session not found");
        let (status, _) = call(&app, "GET", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn abort_destroys_session_from_any_step() {
        let app = app();
        let base = start(&app).await;
        let (status, _) = call(&app, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "POST", &format!("{base}/generate"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn out_of_order_actions_conflict() {
        let app = app();
        let base = start(&app).await;
        let (status, body) = call(&app, "POST", &format!("{base}/submit"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "cannot submit from the upload step");
        let (status, _) = call(&app, "POST", &format!("{base}/return"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let app = app();
        let base = start(&app).await;
        let body = json!({ "filename": "x.png", "mime_type": "image/png", "data_base64": "not base64!!" });
        let (status, _) = call(&app, "PUT", &format!("{base}/image"), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn designers_can_be_filtered() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/designers?specialty=Streetwear", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "John Smith");
    }

    #[tokio::test]
    async fn health_reports_generation_configuration() {
        let (status, body) = call(&app(), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generation_configured"], false);
    }
}
