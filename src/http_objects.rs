use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

const MAX_PARAMETER_VALUE_LEN: usize = 2028;
const MAX_DESCRIPTION_LEN: usize = 1024;

pub const VALUE_TOO_LARGE: &str = "The parameter value is too large";
pub const VALUE_TOO_SMALL: &str = "The parameter value is too small";
pub const PARAMETER_CANNOT_BE_NULL: &str = "The parameter cannot be null";
pub const INVALID_CHARACTERS: &str = "Invalid characters";
pub const ENTITY_NOT_FOUND: &str = "The entity could not be found";

/// Fixed error-code taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorNumber {
    /// A string parameter exceeds its maximum length.
    ParameterTooLarge,
    /// The referenced container or file does not exist.
    EntityNotFound,
    /// The container name is below its minimum length.
    ParameterTooSmall,
    /// A required file payload is missing.
    MissingParameter,
    /// The container name violates the backend's naming rules.
    InvalidCharacters,
}

impl ErrorNumber {
    pub fn code(self) -> u32 {
        match self {
            ErrorNumber::ParameterTooLarge => 2,
            ErrorNumber::EntityNotFound => 4,
            ErrorNumber::ParameterTooSmall => 5,
            ErrorNumber::MissingParameter => 6,
            ErrorNumber::InvalidCharacters => 7,
        }
    }
}

/// Structured body of every 4xx response. Constructed once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[serde(rename = "errorNumber")]
    pub error_number: u32,
    #[serde(rename = "parameterName", skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    #[serde(rename = "parameterValue", skip_serializing_if = "Option::is_none")]
    pub parameter_value: Option<String>,
    #[serde(rename = "errorDescription")]
    pub error_description: String,
}

impl ErrorResponse {
    pub fn new(
        number: ErrorNumber,
        parameter_name: Option<&str>,
        parameter_value: Option<&str>,
        description: &str,
    ) -> Self {
        Self {
            error_number: number.code(),
            parameter_name: parameter_name.map(|name| name.to_string()),
            parameter_value: parameter_value.map(|value| truncate(value, MAX_PARAMETER_VALUE_LEN)),
            error_description: truncate(description, MAX_DESCRIPTION_LEN),
        }
    }

    pub fn entity_not_found(parameter_name: &str, parameter_value: &str) -> Self {
        Self::new(
            ErrorNumber::EntityNotFound,
            Some(parameter_name),
            Some(parameter_value),
            ENTITY_NOT_FOUND,
        )
    }
}

fn truncate(value: &str, max_len: usize) -> String {
    value.chars().take(max_len).collect()
}

/// List-response element exposing only the blob's name.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlobName {
    pub name: String,
}

#[derive(Debug)]
pub struct ContentFilesAPIError {
    status_code: StatusCode,
    message: String,
    error: Option<ErrorResponse>,
}

impl ContentFilesAPIError {
    pub fn bad_request(error: ErrorResponse) -> Self {
        Self {
            status_code: StatusCode::BAD_REQUEST,
            message: error.error_description.clone(),
            error: Some(error),
        }
    }

    pub fn not_found(error: ErrorResponse) -> Self {
        Self {
            status_code: StatusCode::NOT_FOUND,
            message: error.error_description.clone(),
            error: Some(error),
        }
    }

    pub fn container_not_found(container_name: &str) -> Self {
        Self::not_found(ErrorResponse::entity_not_found(
            "containername",
            container_name,
        ))
    }

    pub fn file_not_found(file_name: &str) -> Self {
        Self::not_found(ErrorResponse::entity_not_found("fileName", file_name))
    }

    pub fn internal_error(e: anyhow::Error) -> Self {
        Self::internal_error_str(e.to_string().as_str())
    }

    pub fn internal_error_str(e: &str) -> Self {
        Self {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
            error: None,
        }
    }
}

impl IntoResponse for ContentFilesAPIError {
    fn into_response(self) -> Response {
        error!("API Error: {} - {}", self.status_code, self.message);
        match self.error {
            Some(error) => (self.status_code, Json(error)).into_response(),
            None => (self.status_code, self.message).into_response(),
        }
    }
}
