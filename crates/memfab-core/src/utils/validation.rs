//! Validation Utilities
//!
//! Inputs are checked here before any tier is touched.

use crate::error::{FabricError, FabricResult};

/// Validate a user ID
///
/// User IDs name on-disk files and store keys, so they must be:
/// - 1-128 characters
/// - ASCII alphanumeric, '-', '_', '.' or '@'
/// - not "." or ".."
pub fn validate_user_id(user_id: &str) -> FabricResult<()> {
    if user_id.is_empty() {
        return Err(FabricError::invalid_input("user_id cannot be empty"));
    }

    if user_id.len() > 128 {
        return Err(FabricError::invalid_input(
            "user_id must be 128 characters or less",
        ));
    }

    if user_id == "." || user_id == ".." {
        return Err(FabricError::invalid_input("user_id cannot be a path component"));
    }

    for (i, c) in user_id.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.' | '@') {
            return Err(FabricError::invalid_input(format!(
                "invalid character '{}' at position {} in user_id",
                c, i
            )));
        }
    }

    Ok(())
}

/// Validate interaction or query text
pub fn validate_text(text: &str) -> FabricResult<()> {
    if text.trim().is_empty() {
        return Err(FabricError::invalid_input("text cannot be empty"));
    }
    Ok(())
}

/// Validate a caller-supplied significance score
pub fn validate_significance(significance: f64) -> FabricResult<()> {
    if !significance.is_finite() {
        return Err(FabricError::invalid_input(format!(
            "significance must be finite, got {}",
            significance
        )));
    }
    Ok(())
}

/// Validate a semantic-tier importance weight, which lives in (0, 1]
pub fn validate_importance(importance: f64) -> FabricResult<()> {
    if !importance.is_finite() || importance <= 0.0 || importance > 1.0 {
        return Err(FabricError::invalid_input(format!(
            "importance must be in (0, 1], got {}",
            importance
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_valid() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id("user-123").is_ok());
        assert!(validate_user_id("a.b_c@example.com").is_ok());
    }

    #[test]
    fn test_validate_user_id_invalid() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("..").is_err());
        assert!(validate_user_id("../etc").is_err()); // Path separator
        assert!(validate_user_id("a b").is_err()); // Space
        assert!(validate_user_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("hello").is_ok());
        assert!(validate_text("").is_err());
        assert!(validate_text("   \n").is_err());
    }

    #[test]
    fn test_validate_scores() {
        assert!(validate_significance(0.5).is_ok());
        assert!(validate_significance(-3.0).is_ok());
        assert!(validate_significance(f64::NAN).is_err());
        assert!(validate_significance(f64::INFINITY).is_err());

        assert!(validate_importance(1.0).is_ok());
        assert!(validate_importance(0.01).is_ok());
        assert!(validate_importance(0.0).is_err());
        assert!(validate_importance(1.5).is_err());
    }
}
