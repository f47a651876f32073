//! Response envelope and error mapping for the REST API.
//!
//! Every `/users` response, success or failure, is wrapped as
//! `{ success, data?, error?: { code, message, details? }, timestamp }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use usuarios_core::User;
use utoipa::ToSchema;

/// Current time as an RFC 3339 string with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(UserEnvelope = ApiResponse<User>, UserListEnvelope = ApiResponse<Vec<User>>)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// Absent on failure. `Some(())` serialises as `null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
    #[schema(example = "2026-01-01T12:00:00.000Z")]
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now_timestamp(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ApiErrorBody {
    #[schema(example = "VALIDATION_ERROR")]
    pub code: String,
    #[schema(example = "Datos de usuario inválidos")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Health check payload. Not wrapped in the envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    #[schema(example = "OK")]
    pub status: String,
    pub timestamp: String,
    #[schema(example = "User Management API")]
    pub service: String,
}

/// Failure outcomes of a request, each with a fixed status and error code.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    InvalidId,
    Validation {
        message: &'static str,
        details: Option<Vec<String>>,
    },
    UserNotFound,
    RouteNotFound,
    Internal,
}

pub const INVALID_USER_DATA: &str = "Datos de usuario inválidos";
pub const EMPTY_PATCH: &str = "Debe proporcionar al menos un campo para actualizar";

impl ApiError {
    /// Validation failure carrying the validator's messages.
    pub fn invalid_user(details: Vec<String>) -> Self {
        Self::Validation {
            message: INVALID_USER_DATA,
            details: Some(details),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidId | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::UserNotFound | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidId => "INVALID_ID",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::RouteNotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidId => "ID de usuario inválido",
            Self::Validation { message, .. } => *message,
            Self::UserNotFound => "Usuario no encontrado",
            Self::RouteNotFound => "Ruta no encontrada",
            Self::Internal => "Error interno del servidor",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiErrorBody {
            code: self.code().to_owned(),
            message: self.message().to_owned(),
            details: match self {
                Self::Validation { details, .. } => details,
                _ => None,
            },
        };
        let envelope: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(body),
            timestamp: now_timestamp(),
        };
        (status, Json(envelope)).into_response()
    }
}

impl From<usuarios_core::StoreError> for ApiError {
    fn from(e: usuarios_core::StoreError) -> Self {
        tracing::error!("store error: {}", e);
        Self::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_omits_error() {
        let value = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], serde_json::json!([1, 2]));
        assert!(value.get("error").is_none());
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_unit_data_serialises_as_null() {
        let value = serde_json::to_value(ApiResponse::ok(())).unwrap();
        assert!(value.get("data").unwrap().is_null());
    }

    #[test]
    fn test_error_status_and_codes() {
        let cases = [
            (ApiError::InvalidId, 400, "INVALID_ID"),
            (ApiError::invalid_user(vec![]), 400, "VALIDATION_ERROR"),
            (ApiError::UserNotFound, 404, "USER_NOT_FOUND"),
            (ApiError::RouteNotFound, 404, "NOT_FOUND"),
            (ApiError::Internal, 500, "INTERNAL_ERROR"),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status().as_u16(), status);
            assert_eq!(error.code(), code);
        }
    }
}
