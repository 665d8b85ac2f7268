//! Success envelope for JSON responses.
//!
//! Every successful API response has the shape
//! `{"status": "success", "data": ..., "message"?: ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// A successful API response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status_code: StatusCode,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// `200 OK` with data.
    pub const fn ok(data: T) -> Self {
        Self {
            status_code: StatusCode::OK,
            status: "success",
            message: None,
            data,
        }
    }

    /// `201 Created` with data.
    pub const fn created(data: T) -> Self {
        Self {
            status_code: StatusCode::CREATED,
            status: "success",
            message: None,
            data,
        }
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// `page`/`limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    async fn body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ok_envelope() {
        let response = ApiResponse::ok(json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(response).await,
            json!({"status": "success", "data": {"id": 1}})
        );
    }

    #[tokio::test]
    async fn test_created_with_message() {
        let response = ApiResponse::created(json!([]))
            .message("Order created successfully")
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body(response).await;
        assert_eq!(json["message"], "Order created successfully");
        assert_eq!(json["data"], json!([]));
    }
}
