//! Validation related error types

use thiserror::Error;

/// Validation and configuration errors
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A repair candidate carries fields beyond the identifier and the
    /// global-identifier field, so an automatic fix would be ambiguous
    #[error(
        "Repair candidate for {object_type} record {record_id} has unexpected shape: \
         expected exactly [{expected}], found [{found}]"
    )]
    UnexpectedCandidateShape {
        object_type: String,
        record_id: String,
        expected: String,
        found: String,
    },
}

impl ValidationError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(message: &str) -> Self {
        Self::InvalidConfiguration {
            message: message.to_string(),
        }
    }

    /// Create an unexpected candidate shape error
    pub fn unexpected_candidate_shape(
        object_type: &str,
        record_id: &str,
        expected: &[&str],
        found: &[&str],
    ) -> Self {
        Self::UnexpectedCandidateShape {
            object_type: object_type.to_string(),
            record_id: record_id.to_string(),
            expected: expected.join(", "),
            found: found.join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_error() {
        let error = ValidationError::invalid_configuration("bad config");
        assert!(error.to_string().contains("Invalid configuration"));
        assert!(error.to_string().contains("bad config"));
    }

    #[test]
    fn test_unexpected_candidate_shape_error() {
        let error = ValidationError::unexpected_candidate_shape(
            "Widget__c",
            "001xx0001",
            &["Id", "GlobalKey__c"],
            &["Id", "Name", "GlobalKey__c"],
        );
        assert!(error.to_string().contains("Widget__c"));
        assert!(error.to_string().contains("001xx0001"));
        assert!(error.to_string().contains("Id, GlobalKey__c"));
        assert!(error.to_string().contains("Id, Name, GlobalKey__c"));
    }
}
