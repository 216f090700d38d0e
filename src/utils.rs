/// Utility functions for formatting replay output
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Format a timestamp for records and logs
///
/// Converts an OffsetDateTime to RFC 3339 (`2024-05-01T12:00:00Z`).
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}
