// API response envelope and error mapping

use crate::error::TrackerError;
use crate::forms::FormErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Where clients go when the account has no usable default purse
pub const PURSE_CREATION_URL: &str = "/api/tracker/purses/create";
pub const USER_CHANGE_URL: &str = "/api/tracker/user_change";

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Field errors of an invalid form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FormErrors>,

    /// Page to visit before retrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
            errors: None,
            redirect: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(error: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(error),
            errors: None,
            redirect: None,
        }
    }
}

pub type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, TrackerError>;

impl TrackerError {
    pub fn status(&self) -> StatusCode {
        match self {
            TrackerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TrackerError::Unauthenticated | TrackerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            TrackerError::Forbidden => StatusCode::FORBIDDEN,
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::NoPurse | TrackerError::NoDefaultPurse => StatusCode::CONFLICT,
            TrackerError::Database(_)
            | TrackerError::Json(_)
            | TrackerError::Csv(_)
            | TrackerError::Io(_)
            | TrackerError::LockPoisoned
            | TrackerError::Corrupt(_)
            | TrackerError::Background(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let mut body = ApiResponse::failure(match status {
            // Internal details stay in the log
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        });

        match self {
            TrackerError::Validation(errors) => body.errors = Some(errors),
            TrackerError::NoPurse => body.redirect = Some(PURSE_CREATION_URL),
            TrackerError::NoDefaultPurse => body.redirect = Some(USER_CHANGE_URL),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(TrackerError::field("name", "bad").status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(TrackerError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(TrackerError::NotFound("Purse").status(), StatusCode::NOT_FOUND);
        assert_eq!(TrackerError::NoDefaultPurse.status(), StatusCode::CONFLICT);
        assert_eq!(TrackerError::LockPoisoned.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            TrackerError::Background("cancelled".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
