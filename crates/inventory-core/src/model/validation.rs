#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Empty { field: &'static str },
    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} must not be a nil UUID")]
    NilUuid { field: &'static str },
    #[error("{field} must be a valid URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
    #[error("{field} must not be empty")]
    EmptyData { field: &'static str },
    #[error("at least one of common or reporter representation must be present")]
    NoRepresentations,
    #[error("{side} data and {side} version must both be present or both be absent")]
    UnpairedVersion { side: &'static str },
    #[error("at least one of tuples to create or tuples to delete must be provided")]
    NoTuples,
    #[error("tuple event must carry a common version or a reporter representation version")]
    EmptyTupleEvent,
    #[error("unknown operation type '{0}'")]
    UnknownOperation(String),
    #[error("reporter representation {actual} is out of step with reporter resource {expected}")]
    VersionMismatch { expected: String, actual: String },
}

pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

pub(crate) fn require_max_len(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub(crate) fn require_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    url::Url::parse(value).map_err(|e| ValidationError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_rejected() {
        assert_eq!(
            require_non_blank("reporter_type", "  \t\n  "),
            Err(ValidationError::Empty {
                field: "reporter_type"
            })
        );
        assert!(require_non_blank("reporter_type", "hbi").is_ok());
    }

    #[test]
    fn length_is_counted_in_characters() {
        let value = "é".repeat(4);
        assert!(require_max_len("x", &value, 4).is_ok());
        assert!(require_max_len("x", &value, 3).is_err());
    }

    #[test]
    fn url_errors_carry_the_parser_reason() {
        let err = require_url("api_href", "not a url").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidUrl { field: "api_href", .. }));
        assert!(err.to_string().contains("api_href"));
    }
}
