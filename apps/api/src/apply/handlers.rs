use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::apply::form::ApplicationForm;
use crate::errors::AppError;
use crate::state::AppState;

pub const SUCCESS_MESSAGE: &str = "Application submitted successfully!";

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub message: String,
}

/// POST /api/apply
///
/// validate → persist → notify → respond. Notifications are spawned and never
/// awaited here; only validation and the store write shape the response.
pub async fn handle_apply(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApplyResponse>), AppError> {
    let form = ApplicationForm::from_multipart(multipart?).await?;
    let (application, cv) = form.validate().inspect_err(|_| {
        warn!("Rejected incomplete application");
    })?;

    info!(
        position = %application.position,
        cv = %cv.file_name,
        cv_bytes = cv.bytes.len(),
        "Received application"
    );

    let row = state.store.insert(&application).await?;
    info!(application_id = %row.id, "Application saved");

    // Handles are dropped on purpose: delivery continues detached.
    let _ = state.notifier.dispatch(row.id, &application, cv.into());

    Ok((
        StatusCode::CREATED,
        Json(ApplyResponse {
            message: SUCCESS_MESSAGE.to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;
    use tower::ServiceExt;

    use super::*;
    use crate::apply::repository::testing::MemoryStore;
    use crate::notify::testing::{dispatcher, stalled_dispatcher, Sent};
    use crate::routes::build_router;

    const BOUNDARY: &str = "----intake-test-boundary";
    const LIMIT: usize = 1024 * 1024;

    const ADA: [(&str, &str); 4] = [
        ("name", "Ada Lovelace"),
        ("email", "ada@example.com"),
        ("phone", "555-0100"),
        ("position", "Engineer"),
    ];

    fn multipart_body(fields: &[(&str, &str)], cv: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content)) = cv {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"cv\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn apply_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/apply")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn app(
        store: Arc<MemoryStore>,
        email_fails: bool,
        messaging_fails: bool,
        limit: usize,
    ) -> (Router, UnboundedReceiver<Sent>) {
        let (notifier, rx) = dispatcher(email_fails, messaging_fails);
        let state = AppState { store, notifier };
        (build_router(state, limit), rx)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Waits for both detached notifications, in whatever order they land.
    async fn both_notifications(rx: &mut UnboundedReceiver<Sent>) -> (Sent, Sent) {
        let mut first = None;
        let mut second = None;
        for slot in [&mut first, &mut second] {
            *slot = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("notification dispatched");
        }
        (first.unwrap(), second.unwrap())
    }

    async fn assert_no_notifications(rx: &mut UnboundedReceiver<Sent>) {
        let next = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(!matches!(next, Ok(Some(_))), "unexpected notification");
    }

    #[tokio::test]
    async fn test_complete_submission_is_stored_and_notified() {
        let store = Arc::new(MemoryStore::default());
        let (router, mut rx) = app(store.clone(), false, false, LIMIT);

        let body = multipart_body(&ADA, Some(("resume.pdf", b"%PDF-1.7 resume")));
        let (status, json) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json, json!({ "message": "Application submitted successfully!" }));

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Ada Lovelace");
        assert_eq!(rows[0].email, "ada@example.com");
        assert_eq!(rows[0].phone, "555-0100");
        assert_eq!(rows[0].position, "Engineer");

        let (a, b) = both_notifications(&mut rx).await;
        let (email, message) = match (a, b) {
            (Sent::Email(e), Sent::Message(m)) | (Sent::Message(m), Sent::Email(e)) => (e, m),
            other => panic!("expected one email and one message, got {other:?}"),
        };

        assert_eq!(email.subject, "New Job Application Submitted");
        for value in ["Ada Lovelace", "ada@example.com", "555-0100", "Engineer"] {
            assert!(email.body.contains(value));
            assert!(message.body.contains(value));
        }
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].file_name, "resume.pdf");
        assert_eq!(&email.attachments[0].content[..], b"%PDF-1.7 resume");
    }

    #[tokio::test]
    async fn test_missing_phone_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let (router, mut rx) = app(store.clone(), false, false, LIMIT);

        let fields: Vec<_> = ADA.iter().copied().filter(|(k, _)| *k != "phone").collect();
        let body = multipart_body(&fields, Some(("resume.pdf", b"%PDF")));
        let (status, json) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json,
            json!({ "error": "All fields are required, including the CV." })
        );
        assert!(store.rows().is_empty());
        assert_no_notifications(&mut rx).await;
    }

    #[tokio::test]
    async fn test_any_missing_field_or_file_is_rejected() {
        for missing in ["name", "email", "phone", "position", "cv"] {
            let store = Arc::new(MemoryStore::default());
            let (router, _rx) = app(store.clone(), false, false, LIMIT);

            let fields: Vec<_> = ADA.iter().copied().filter(|(k, _)| *k != missing).collect();
            let cv: Option<(&str, &[u8])> = if missing == "cv" {
                None
            } else {
                Some(("resume.pdf", b"%PDF"))
            };
            let (status, _) = send(router, apply_request(multipart_body(&fields, cv))).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "missing {missing}");
            assert!(store.rows().is_empty(), "missing {missing}");
        }
    }

    #[tokio::test]
    async fn test_empty_file_part_counts_as_missing() {
        let store = Arc::new(MemoryStore::default());
        let (router, _rx) = app(store.clone(), false, false, LIMIT);

        let body = multipart_body(&ADA, Some(("", b"")));
        let (status, _) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_named_empty_file_is_accepted() {
        let store = Arc::new(MemoryStore::default());
        let (router, mut rx) = app(store.clone(), false, false, LIMIT);

        let body = multipart_body(&ADA, Some(("resume.pdf", b"")));
        let (status, _) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(store.rows().len(), 1);
        let (a, b) = both_notifications(&mut rx).await;
        let email = match (a, b) {
            (Sent::Email(e), _) | (_, Sent::Email(e)) => e,
            other => panic!("expected an email, got {other:?}"),
        };
        assert_eq!(email.attachments[0].file_name, "resume.pdf");
        assert!(email.attachments[0].content.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_notifications_do_not_delay_response() {
        let store = Arc::new(MemoryStore::default());
        let state = AppState {
            store: store.clone(),
            notifier: stalled_dispatcher(),
        };
        let router = build_router(state, LIMIT);

        let body = multipart_body(&ADA, Some(("resume.pdf", b"%PDF")));
        let (status, json) = timeout(Duration::from_secs(2), send(router, apply_request(body)))
            .await
            .expect("response must not wait on notification delivery");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json, json!({ "message": "Application submitted successfully!" }));
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_skips_notifications() {
        let store = Arc::new(MemoryStore::failing());
        let (router, mut rx) = app(store.clone(), false, false, LIMIT);

        let body = multipart_body(&ADA, Some(("resume.pdf", b"%PDF")));
        let (status, json) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "error": "Error submitting application" }));
        assert_no_notifications(&mut rx).await;
    }

    #[tokio::test]
    async fn test_email_failure_does_not_change_response() {
        let store = Arc::new(MemoryStore::default());
        let (router, mut rx) = app(store.clone(), true, false, LIMIT);

        let body = multipart_body(&ADA, Some(("resume.pdf", b"%PDF")));
        let (status, _) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(store.rows().len(), 1);
        // The messaging attempt still happens alongside the failed email.
        both_notifications(&mut rx).await;
    }

    #[tokio::test]
    async fn test_messaging_failure_does_not_change_response() {
        for email_fails in [false, true] {
            let store = Arc::new(MemoryStore::default());
            let (router, mut rx) = app(store.clone(), email_fails, true, LIMIT);

            let body = multipart_body(&ADA, Some(("resume.pdf", b"%PDF")));
            let (status, _) = send(router, apply_request(body)).await;

            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(store.rows().len(), 1);
            both_notifications(&mut rx).await;
        }
    }

    #[tokio::test]
    async fn test_second_cv_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let (router, _rx) = app(store.clone(), false, false, LIMIT);

        let mut body = multipart_body(&ADA, Some(("resume.pdf", b"%PDF")));
        // Splice a second file part in before the closing boundary.
        let closing = format!("--{BOUNDARY}--\r\n");
        body.truncate(body.len() - closing.len());
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"cv\"; filename=\"other.pdf\"\r\n\r\n%PDF\r\n{closing}"
            )
            .as_bytes(),
        );
        let (status, _) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let (router, _rx) = app(store.clone(), false, false, LIMIT);

        let request = Request::builder()
            .method("POST")
            .uri("/api/apply")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"Ada"}"#))
            .unwrap();
        let (status, json) = send(router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let (router, _rx) = app(store.clone(), false, false, 256);

        let resume = vec![b'x'; 4096];
        let body = multipart_body(&ADA, Some(("resume.pdf", &resume)));
        let (status, json) = send(router, apply_request(body)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json["error"].is_string());
        assert!(store.rows().is_empty());
    }
}
