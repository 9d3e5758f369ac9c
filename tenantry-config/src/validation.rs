// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display,
    {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {} (got {})",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a duration or count is not zero
    pub fn positive(value: u64, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a script template mentions every placeholder
    pub fn has_placeholders(template: &str, placeholders: &[&str], field: &str) -> Result<()> {
        let missing: Vec<&str> = placeholders
            .iter()
            .copied()
            .filter(|p| !template.contains(p))
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} is missing placeholders: {}",
                field,
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("  ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(5, 1, 10, "field").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());
        assert!(ConfigValidator::in_range(11, 1, 10, "field").is_err());
    }

    #[test]
    fn test_placeholder_validation() {
        let placeholders = ["<database>", "<user>"];
        assert!(
            ConfigValidator::has_placeholders("CREATE <database> <user>", &placeholders, "init")
                .is_ok()
        );

        let err = ConfigValidator::has_placeholders("CREATE <database>", &placeholders, "init")
            .unwrap_err();
        assert!(err.to_string().contains("<user>"));
    }
}
