use crate::error::SubmitError;
use crate::models::CustomRequest;
use async_trait::async_trait;
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Delivers a confirmed custom request to whatever backend handles it.
#[async_trait]
pub trait RequestSubmitter: Send + Sync {
    async fn submit(&self, request: &CustomRequest) -> Result<(), SubmitError>;
}

/// Best-effort submitter used when no backend is configured: the request is logged.
pub struct LogSubmitter;

#[async_trait]
impl RequestSubmitter for LogSubmitter {
    async fn submit(&self, request: &CustomRequest) -> Result<(), SubmitError> {
        let payload = serde_json::to_string(request).unwrap_or_default();
        info!("📝 Custom request {} received: {}", request.id, payload);
        Ok(())
    }
}

/// POSTs the request as JSON to a configured endpoint.
pub struct HttpSubmitter {
    client: Client,
    url: String,
}

impl HttpSubmitter {
    pub fn new(url: String, timeout: Duration) -> Result<Self, SubmitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl RequestSubmitter for HttpSubmitter {
    async fn submit(&self, request: &CustomRequest) -> Result<(), SubmitError> {
        let response = self.client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected { status: status.as_u16(), body });
        }
        info!("📨 Custom request {} delivered to {}", request.id, self.url);
        Ok(())
    }
}

/// Run the submitter in the background. The outcome is only logged; the wizard
/// has already moved on by the time it is known.
pub fn dispatch_submission(submitter: Arc<dyn RequestSubmitter>, request: CustomRequest) -> JoinHandle<()> {
    tokio::spawn(async move {
        match submitter.submit(&request).await {
            Ok(()) => info!("✅ Submission of request {} finished", request.id),
            Err(e) => error!("❌ Submission of request {} failed: {}", request.id, e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DesignBrief;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use chrono::Utc;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use uuid::Uuid;

    fn request() -> CustomRequest {
        CustomRequest {
            id: Uuid::new_v4(),
            brief: DesignBrief { style: "Vintage".into(), ..Default::default() },
            selected_preferences: vec!["Velvet".into()],
            notes: "deep green".into(),
            image: None,
            submitted_at: Utc::now(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/requests", addr)
    }

    #[tokio::test]
    async fn log_submitter_always_succeeds() {
        assert!(LogSubmitter.submit(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn http_submitter_posts_json() {
        let received: Arc<Mutex<Option<Value>>> = Arc::default();
        let sink = received.clone();
        let url = serve(Router::new().route(
            "/requests",
            post(move |Json(body): Json<Value>| async move {
                *sink.lock() = Some(body);
                StatusCode::ACCEPTED
            }),
        ))
        .await;

        let submitter = HttpSubmitter::new(url, Duration::from_secs(5)).unwrap();
        submitter.submit(&request()).await.unwrap();

        let body = received.lock().clone().unwrap();
        assert_eq!(body["brief"]["style"], "Vintage");
        assert_eq!(body["notes"], "deep green");
    }

    #[tokio::test]
    async fn http_submitter_reports_rejections() {
        let url = serve(Router::new().route(
            "/requests",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
        ))
        .await;

        let err = HttpSubmitter::new(url, Duration::from_secs(5))
            .unwrap()
            .submit(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Rejected { status: 503, ref body } if body == "down for maintenance"));
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        let submitter = HttpSubmitter::new("http://127.0.0.1:9/requests".into(), Duration::from_secs(1)).unwrap();
        dispatch_submission(Arc::new(submitter), request()).await.unwrap();
    }
}
