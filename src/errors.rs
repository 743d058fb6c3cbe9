use std::{error, fmt};

use aws_sdk_ssm::error::{DisplayErrorContext, SdkError};
use http::StatusCode;

/// Failure classes shared by both handlers.
///
/// Messages never carry secret values; only parameter names and fixed
/// descriptions end up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field of the inbound event is missing or malformed.
    #[error("{0}")]
    Input(String),
    /// A required environment variable or stored parameter is unavailable.
    #[error("{0}")]
    Config(String),
    /// The request could not be authenticated.
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Unexpected(String),
}

impl Error {
    pub fn input(msg: impl Into<String>) -> Error {
        Error::Input(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Error {
        Error::Config(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Error {
        Error::Auth(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Error {
        Error::Unexpected(msg.into())
    }

    /// Client faults map to 400, everything else is on us.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Input(_) | Error::Auth(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) | Error::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_fault(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl<E, R> From<SdkError<E, R>> for Error
where
    E: error::Error + 'static,
    R: fmt::Debug,
{
    fn from(value: SdkError<E, R>) -> Error {
        Error::Unexpected(format!("{}", DisplayErrorContext(&value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_are_bad_requests() {
        assert_eq!(Error::input("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::auth("x").status_code(), StatusCode::BAD_REQUEST);
        assert!(Error::auth("x").is_client_fault());
    }

    #[test]
    fn server_faults_are_internal_errors() {
        assert_eq!(
            Error::config("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::unexpected("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!Error::config("x").is_client_fault());
    }

    #[test]
    fn display_is_the_bare_message() {
        let err = Error::auth("Invalid Twilio request signature");
        assert_eq!(err.to_string(), "Invalid Twilio request signature");
    }
}
