use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ValidationErrors;

/// Envelope shared by every endpoint: `{success, data?, message?, errors?, degraded?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
    /// Set on nutrition proxy responses; `true` when served from the offline dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<bool>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            degraded: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors: None,
            degraded: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_errors(mut self, errors: ValidationErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = Some(degraded);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            errors: None,
            degraded: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted() {
        let json = serde_json::to_value(ApiResponse::message("Recipe deleted successfully")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Recipe deleted successfully");
        assert!(json.get("data").is_none());
        assert!(json.get("errors").is_none());
        assert!(json.get("degraded").is_none());
    }

    #[test]
    fn degraded_flag_is_serialized_when_set() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2]).with_degraded(false)).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["degraded"], false);
    }
}
