use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::ActivationQueue;

pub const TRIGGER_RESPONSE: &str = "Request received";

/// Any method on any path re-activates the local config. The reply is the
/// same whatever the activation outcome; failures are only logged here.
pub async fn trigger(
    State(queue): State<ActivationQueue>,
    method: Method,
    uri: Uri,
) -> Response {
    let id = Uuid::new_v4();
    tracing::info!("Received {} request: {} (activation {})", method, uri.path(), id);

    match queue.submit(id).await {
        Ok(report) if report.succeeded() => {}
        Ok(report) => tracing::warn!("Trigger {} finished with {:?}", id, report.outcome),
        Err(e) => tracing::error!("Trigger {} could not be processed: {}", id, e),
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        TRIGGER_RESPONSE,
    )
        .into_response()
}
