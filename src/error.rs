//! Error types for payload normalization, configuration and ingestion.
use thiserror::Error;

/// Errors raised while turning a raw payload into canonical hex.
///
/// These are the only hard failures of the decoder core. A payload that
/// fails here is rejected before any decoding is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The payload matched none of the recognized encodings.
    #[error("Unsupported payload format")]
    UnsupportedFormat,

    /// A hex string with an odd number of digits.
    #[error("Hex payload length must be even (got {length} digits)")]
    OddLengthHex { length: usize },
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid tag '{0}': expected four hex digits like 'fe02'")]
    InvalidTag(String),

    #[error("Invalid length '{value}' for tag {tag}")]
    InvalidLength { tag: String, value: String },

    #[error("Tag {0} is a decoded sensor field and cannot be overridden")]
    ReservedTag(String),
}

/// Errors reported by an [`UplinkStore`](crate::ingest::UplinkStore) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors that abort a single ingestion attempt.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NormalizeError::OddLengthHex { length: 3 };
        assert!(err.to_string().contains("3 digits"));

        let err = ConfigError::InvalidLength {
            tag: "fe02".into(),
            value: "x".into(),
        };
        assert!(err.to_string().contains("fe02"));
    }

    #[test]
    fn test_ingest_error_wraps_normalize_error() {
        let err: IngestError = NormalizeError::UnsupportedFormat.into();
        assert_eq!(err.to_string(), "Unsupported payload format");
    }
}
