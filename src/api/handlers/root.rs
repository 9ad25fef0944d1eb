use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// Service banner for the bare root path.
pub async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
