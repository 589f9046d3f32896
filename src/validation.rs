use blob_store::validate_container_name;

use crate::http_objects::{
    ErrorNumber,
    ErrorResponse,
    INVALID_CHARACTERS,
    PARAMETER_CANNOT_BE_NULL,
    VALUE_TOO_LARGE,
    VALUE_TOO_SMALL,
};

pub const MAX_FILE_NAME_LEN: usize = 75;
pub const MIN_CONTAINER_NAME_LEN: usize = 3;
pub const MAX_CONTAINER_NAME_LEN: usize = 63;

/// Validates the request parameters and reports at most one violation.
///
/// The naming-rule check (code 7) runs first and short-circuits. The
/// remaining checks run in a fixed order and the last failing one wins:
/// missing payload (6), file name too long (2), container name too short (5),
/// container name too long (2). Callers that carry no upload payload pass
/// `missing_payload: false` so its absence is tolerated.
pub fn validate_request(
    container_name: &str,
    file_name: Option<&str>,
    missing_payload: bool,
) -> Result<(), ErrorResponse> {
    if !validate_container_name(container_name) {
        return Err(ErrorResponse::new(
            ErrorNumber::InvalidCharacters,
            Some("containername"),
            Some(container_name),
            INVALID_CHARACTERS,
        ));
    }

    let mut violation = None;
    if missing_payload {
        violation = Some(missing_file_payload());
    }
    if let Some(file_name) = file_name {
        if file_name.chars().count() > MAX_FILE_NAME_LEN {
            violation = Some(ErrorResponse::new(
                ErrorNumber::ParameterTooLarge,
                Some("fileName"),
                Some(file_name),
                VALUE_TOO_LARGE,
            ));
        }
    }
    if container_name.chars().count() < MIN_CONTAINER_NAME_LEN {
        violation = Some(ErrorResponse::new(
            ErrorNumber::ParameterTooSmall,
            Some("containername"),
            Some(container_name),
            VALUE_TOO_SMALL,
        ));
    }
    if container_name.chars().count() > MAX_CONTAINER_NAME_LEN {
        violation = Some(ErrorResponse::new(
            ErrorNumber::ParameterTooLarge,
            Some("containername"),
            Some(container_name),
            VALUE_TOO_LARGE,
        ));
    }

    match violation {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

pub fn missing_file_payload() -> ErrorResponse {
    ErrorResponse::new(
        ErrorNumber::MissingParameter,
        Some("fileData"),
        None,
        PARAMETER_CANNOT_BE_NULL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_passes() {
        validate_request("my-container", Some("readme.txt"), false).unwrap();
        validate_request("abc", None, false).unwrap();
    }

    #[test]
    fn naming_rules_win_over_length_checks() {
        // "A" is both too short and invalid; code 7 short-circuits.
        let error = validate_request("A", Some("x"), true).unwrap_err();
        assert_eq!(error.error_number, 7);
        assert_eq!(error.parameter_name.as_deref(), Some("containername"));

        let error = validate_request("two--hyphens", Some("x"), false).unwrap_err();
        assert_eq!(error.error_number, 7);
    }

    #[test]
    fn short_container_name() {
        let error = validate_request("ab", Some("x"), false).unwrap_err();
        assert_eq!(error.error_number, 5);
        assert_eq!(error.parameter_name.as_deref(), Some("containername"));
        assert_eq!(error.parameter_value.as_deref(), Some("ab"));
    }

    #[test]
    fn long_container_name() {
        let name = "a".repeat(64);
        let error = validate_request(&name, Some("x"), false).unwrap_err();
        assert_eq!(error.error_number, 2);
        assert_eq!(error.parameter_name.as_deref(), Some("containername"));
    }

    #[test]
    fn long_file_name() {
        let file_name = "f".repeat(76);
        let error = validate_request("abc", Some(&file_name), false).unwrap_err();
        assert_eq!(error.error_number, 2);
        assert_eq!(error.parameter_name.as_deref(), Some("fileName"));
    }

    #[test]
    fn missing_payload() {
        let error = validate_request("abc", Some("x"), true).unwrap_err();
        assert_eq!(error.error_number, 6);
        assert_eq!(error.parameter_name.as_deref(), Some("fileData"));
        assert!(error.parameter_value.is_none());
    }

    #[test]
    fn last_failing_check_wins() {
        // missing payload then long file name: file name check runs later
        let file_name = "f".repeat(76);
        let error = validate_request("abc", Some(&file_name), true).unwrap_err();
        assert_eq!(error.error_number, 2);
        assert_eq!(error.parameter_name.as_deref(), Some("fileName"));

        // long file name then short container: container check runs later
        let error = validate_request("ab", Some(&file_name), true).unwrap_err();
        assert_eq!(error.error_number, 5);
        assert_eq!(error.parameter_name.as_deref(), Some("containername"));
    }
}
