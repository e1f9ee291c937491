// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::http::StatusCode;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Configuration errors (10000–10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10020,
    RegistrationFileError = 10030,

    // Authentication and authorization errors (20000–20999)
    PermissionDenied = 20000,
    InvalidAppServiceToken = 20010,

    // Resource errors (30000–30999)
    ResourceNotFound = 30000,

    // Network connection errors (40000–40999)
    NetworkError = 40000,
    ConnectionTimeout = 40010,

    // Mail service errors (50000–50999)
    ImapCommandFailed = 50000,
    ImapAuthenticationFailed = 50010,
    ImapUnexpectedResult = 50020,
    SmtpCommandFailed = 50030,
    SmtpConnectionFailed = 50040,

    // Matrix homeserver errors (60000–60999)
    MatrixRequestFailed = 60000,
    MatrixUserProvisioningFailed = 60010,
    MatrixJoinFailed = 60020,

    // Internal system errors (70000–70999)
    InternalError = 70000,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidParameter
            | ErrorCode::MissingConfiguration
            | ErrorCode::RegistrationFileError => StatusCode::BAD_REQUEST,
            ErrorCode::PermissionDenied => StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidAppServiceToken => StatusCode::FORBIDDEN,
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError
            | ErrorCode::NetworkError
            | ErrorCode::ConnectionTimeout
            | ErrorCode::ImapCommandFailed
            | ErrorCode::ImapAuthenticationFailed
            | ErrorCode::ImapUnexpectedResult
            | ErrorCode::SmtpCommandFailed
            | ErrorCode::SmtpConnectionFailed
            | ErrorCode::MatrixRequestFailed
            | ErrorCode::MatrixUserProvisioningFailed
            | ErrorCode::MatrixJoinFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Matrix `errcode` reported to the homeserver for this code.
    pub fn matrix_errcode(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAppServiceToken => "M_FORBIDDEN",
            ErrorCode::PermissionDenied => "M_UNAUTHORIZED",
            ErrorCode::ResourceNotFound => "M_NOT_FOUND",
            ErrorCode::InvalidParameter => "M_BAD_JSON",
            _ => "M_UNKNOWN",
        }
    }
}
