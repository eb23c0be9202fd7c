//! UUID utilities

use uuid::Uuid;

/// Parse a UUID column value, mapping failures to a corrupt-record error
pub fn parse_column(column: &str, value: &str) -> crate::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| crate::Error::Corrupt(format!("{} is not a UUID ({}): {}", column, value, e)))
}
