//! Unified application error model and its HTTP mapping.
//! Module-level failures (`UploadError`, `StoreError`, `VerifyError`) convert into `AppError`
//! at the HTTP boundary; only the public `message` ever reaches the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Unauthorized { code: String, message: String },
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    PayloadTooLarge { code: String, message: String },
    Server { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Unauthorized { code, .. }
            | AppError::BadRequest { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::PayloadTooLarge { code, .. }
            | AppError::Server { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Unauthorized { message, .. }
            | AppError::BadRequest { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::PayloadTooLarge { message, .. }
            | AppError::Server { message, .. } => message.as_str(),
        }
    }

    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn bad_request<S: Into<String>>(code: S, msg: S) -> Self { AppError::BadRequest { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn payload_too_large<S: Into<String>>(code: S, msg: S) -> Self { AppError::PayloadTooLarge { code: code.into(), message: msg.into() } }
    pub fn server<S: Into<String>>(code: S, msg: S) -> Self { AppError::Server { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Unauthorized { .. } => 401,
            AppError::BadRequest { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::PayloadTooLarge { .. } => 413,
            AppError::Server { .. } => 500,
        }
    }

    /// JSON body as seen by the caller. Server errors carry `success: false` like a failed upload.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::Server { message, .. } => json!({"success": false, "error": message}),
            _ => json!({"error": self.message()}),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::unauthorized("unauthorized", "Unauthorized").http_status(), 401);
        assert_eq!(AppError::bad_request("no_file", "No video file provided").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::payload_too_large("too_large", "Video file too large").http_status(), 413);
        assert_eq!(AppError::server("upload_failed", "Failed to upload video").http_status(), 500);
    }

    #[test]
    fn bodies_match_wire_contract() {
        let b = AppError::unauthorized("invalid_token", "Invalid token").body();
        assert_eq!(b, json!({"error": "Invalid token"}));
        assert!(b.get("success").is_none());

        let b = AppError::payload_too_large("too_large", "Video file too large").body();
        assert_eq!(b, json!({"error": "Video file too large"}));

        let b = AppError::server("upload_failed", "Failed to upload video").body();
        assert_eq!(b, json!({"success": false, "error": "Failed to upload video"}));
    }

    #[test]
    fn display_includes_code() {
        let e = AppError::bad_request("no_file", "No video file provided");
        assert_eq!(e.to_string(), "no_file: No video file provided");
        assert_eq!(e.code_str(), "no_file");
    }
}
