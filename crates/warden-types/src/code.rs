//! Permission code type.
//!
//! A [`PermissionCode`] names a single action in dotted `domain.action`
//! form, e.g. `workflow.approve` or `user.delete`. Codes are opaque to the
//! engine beyond equality — category expansion or wildcard matching on
//! codes, if any, happens before grants reach the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing a permission code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeError {
    /// The code was empty.
    #[error("permission code must not be empty")]
    Empty,

    /// The code contained an invalid segment or character.
    #[error("invalid permission code '{code}': {reason}")]
    Invalid {
        /// The rejected input.
        code: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// A validated permission code in dotted `domain.action` form.
///
/// # Format
///
/// - One or more non-empty segments separated by `.`
/// - Segments contain lowercase ASCII letters, digits, `_` or `-`
/// - No leading, trailing, or doubled dots
///
/// Codes compare by exact equality. The engine never expands categories or
/// wildcards inside a code; `*` appears only in delegation scopes, which
/// are a different type.
///
/// # Example
///
/// ```
/// use warden_types::PermissionCode;
///
/// let code = PermissionCode::parse("workflow.approve").unwrap();
/// assert_eq!(code.as_str(), "workflow.approve");
/// assert_eq!(code.domain(), "workflow");
///
/// assert!(PermissionCode::parse("").is_err());
/// assert!(PermissionCode::parse("Workflow.Approve").is_err());
/// assert!(PermissionCode::parse("workflow..approve").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(String);

impl PermissionCode {
    /// Parses and validates a permission code.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError`] if the input is empty or malformed.
    pub fn parse(code: &str) -> Result<Self, CodeError> {
        if code.is_empty() {
            return Err(CodeError::Empty);
        }
        for segment in code.split('.') {
            if segment.is_empty() {
                return Err(CodeError::Invalid {
                    code: code.to_string(),
                    reason: "empty segment",
                });
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            {
                return Err(CodeError::Invalid {
                    code: code.to_string(),
                    reason: "segments must be lowercase ascii, digits, '_' or '-'",
                });
            }
        }
        Ok(Self(code.to_string()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first dotted segment (the domain), e.g. `workflow`
    /// for `workflow.approve`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl TryFrom<&str> for PermissionCode {
    type Error = CodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl std::fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_codes() {
        for code in ["workflow.approve", "user.delete", "report.export", "org"] {
            let parsed = PermissionCode::parse(code).expect("valid code");
            assert_eq!(parsed.as_str(), code);
        }
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(PermissionCode::parse(""), Err(CodeError::Empty));
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(PermissionCode::parse(".approve").is_err());
        assert!(PermissionCode::parse("workflow.").is_err());
        assert!(PermissionCode::parse("workflow..approve").is_err());
    }

    #[test]
    fn parse_rejects_uppercase_and_spaces() {
        assert!(PermissionCode::parse("Workflow.approve").is_err());
        assert!(PermissionCode::parse("workflow approve").is_err());
        assert!(PermissionCode::parse("workflow.*").is_err());
    }

    #[test]
    fn domain_is_first_segment() {
        let code = PermissionCode::parse("workflow.approve").expect("valid code");
        assert_eq!(code.domain(), "workflow");

        let single = PermissionCode::parse("admin").expect("valid code");
        assert_eq!(single.domain(), "admin");
    }

    #[test]
    fn display_matches_input() {
        let code = PermissionCode::parse("user.delete").expect("valid code");
        assert_eq!(format!("{code}"), "user.delete");
    }

    #[test]
    fn serde_is_transparent() {
        let code = PermissionCode::parse("report.export").expect("valid code");
        let json = serde_json::to_string(&code).expect("serialize");
        assert_eq!(json, "\"report.export\"");

        let parsed: PermissionCode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, code);
    }
}
