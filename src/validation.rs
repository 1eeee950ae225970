//! Configuration validation utilities.

use crate::types::{Error, Result};

/// Validate that a string is not empty.
pub fn validate_non_empty(s: &str, field: &str) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::config(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Validate that a value is positive.
pub fn validate_positive(n: f64, field: &str) -> Result<()> {
    if n <= 0.0 {
        return Err(Error::config(format!("{} must be positive", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validators() {
        assert!(validate_non_empty("x", "f").is_ok());
        assert!(validate_non_empty(" ", "f").is_err());
        assert!(validate_positive(0.5, "f").is_ok());
        assert!(validate_positive(0.0, "f").is_err());
    }
}
