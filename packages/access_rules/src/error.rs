use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to the client whose request the access rules turned down
#[derive(Error, Debug)]
pub enum AccessRulesError {
    /// Access rule in a createRoom request is missing, unknown, or clashes with the request
    #[error("Invalid access rule")]
    InvalidAccessRule,

    /// `power_level_content_override` of a createRoom request breaks the rules
    #[error("Invalid power levels content override")]
    InvalidPowerLevelsOverride,

    /// Initial state `m.room.power_levels` content of a createRoom request breaks the rules
    #[error("Invalid power levels content")]
    InvalidPowerLevelsContent,

    #[error("Identity server lookup failed: {0}")]
    IdentityLookup(#[source] ServiceError),
}

impl AccessRulesError {
    /// Convert error to response parts (status, errcode, message)
    pub fn to_response_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AccessRulesError::InvalidAccessRule
            | AccessRulesError::InvalidPowerLevelsOverride
            | AccessRulesError::InvalidPowerLevelsContent => {
                (StatusCode::BAD_REQUEST, "M_INVALID_PARAM", self.to_string())
            },
            AccessRulesError::IdentityLookup(_) => {
                (StatusCode::BAD_GATEWAY, "M_UNKNOWN", "Identity server lookup failed".to_string())
            },
        }
    }
}

impl IntoResponse for AccessRulesError {
    fn into_response(self) -> Response {
        let (status, errcode, message) = self.to_response_parts();
        let body = json!({
            "errcode": errcode,
            "error": message
        });
        (status, Json(body)).into_response()
    }
}

/// Failure of a host-provided collaborator (directory, identity server, storage)
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors_with_fixed_messages() {
        let cases = [
            (AccessRulesError::InvalidAccessRule, "Invalid access rule"),
            (AccessRulesError::InvalidPowerLevelsOverride, "Invalid power levels content override"),
            (AccessRulesError::InvalidPowerLevelsContent, "Invalid power levels content"),
        ];

        for (error, message) in cases {
            let (status, errcode, text) = error.to_response_parts();
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(errcode, "M_INVALID_PARAM");
            assert_eq!(text, message);
        }
    }

    #[test]
    fn collaborator_errors_do_not_leak_details() {
        let error = AccessRulesError::IdentityLookup(ServiceError::Unavailable("10.0.0.3 refused".into()));
        let (status, _, text) = error.to_response_parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!text.contains("10.0.0.3"));
    }

    #[test]
    fn into_response_keeps_status() {
        let response = AccessRulesError::InvalidAccessRule.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
