// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use code::ErrorCode;
use poem::{http::StatusCode, web::Json, IntoResponse, Response};
use serde::Serialize;
use snafu::{Location, Snafu};

pub mod code;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BridgeError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type BridgeResult<T, E = BridgeError> = std::result::Result<T, E>;

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::Generic { code, .. } => *code,
        }
    }
}

/// Error body in the shape the homeserver expects from an appservice.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub errcode: String,
    pub error: String,
}

impl ApiError {
    pub fn new(errcode: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            errcode: errcode.into(),
            error: error.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error({}): {}", self.errcode, self.error)
    }
}

impl std::error::Error for ApiError {}

pub struct ApiErrorResponse {
    status: StatusCode,
    body: ApiError,
}

impl From<BridgeError> for ApiErrorResponse {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Generic {
                message,
                location,
                code,
            } => {
                tracing::error!(
                    "API error occurred: [{:#?}] {} at {:?}",
                    code,
                    message,
                    location
                );
                ApiErrorResponse {
                    status: code.status(),
                    body: ApiError::new(code.matrix_errcode(), message),
                }
            }
        }
    }
}

impl From<ApiErrorResponse> for poem::Error {
    fn from(value: ApiErrorResponse) -> Self {
        poem::Error::from_response(value.into_response())
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        response.set_status(self.status);
        response
    }
}
