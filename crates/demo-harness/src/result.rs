//! Result and error types for the demo harness.
//!
//! Errors fall into four classes. Structural and adapter failures abort a
//! run before any verdict exists; field-level failures are folded into the
//! verdict as unpopulated fields; plan failures are caught before a browser
//! is touched.

use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Coarse classification of a [`HarnessError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The demo or application is broken at a level scoring cannot describe
    Structural,
    /// A single field could not be read
    FieldLevel,
    /// The browser or its driver failed
    Adapter,
    /// The verification plan itself is invalid
    Plan,
}

impl FailureClass {
    /// Whether errors of this class abort a run
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::FieldLevel)
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Structural => "structural",
            Self::FieldLevel => "field-level",
            Self::Adapter => "adapter",
            Self::Plan => "plan",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while verifying a demo
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Entry page did not load or never reached network quiescence
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// The demo trigger control does not exist at the requested index
    #[error("Trigger {selector} #{index} not found ({matched} matching elements)")]
    TriggerNotFound {
        /// Trigger selector
        selector: String,
        /// Requested index among matches
        index: usize,
        /// Number of elements that did match
        matched: usize,
    },

    /// The post-trigger URL never matched the expected pattern
    #[error("URL did not match {pattern} within {timeout_ms}ms (last URL: {last_url})")]
    TransitionTimeout {
        /// Expected URL pattern
        pattern: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
        /// Last URL observed before giving up
        last_url: String,
    },

    /// Browser or driver failure (crash, disconnected CDP session)
    #[error("Driver failure during {operation}: {message}")]
    Driver {
        /// Operation that failed
        operation: String,
        /// Error message
        message: String,
    },

    /// Field element was not present in the page
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Selector that matched nothing
        selector: String,
    },

    /// Field element exists but its value could not be read
    #[error("Failed to read {selector}: {message}")]
    ElementRead {
        /// Selector that was read
        selector: String,
        /// Error message
        message: String,
    },

    /// A wait exceeded its bound
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Verification plan violates a precondition
    #[error("Invalid plan: {message}")]
    InvalidPlan {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HarnessError {
    /// Create a driver error for the named operation
    #[must_use]
    pub fn driver(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Driver {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid plan error
    #[must_use]
    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan {
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Navigation { .. }
            | Self::TriggerNotFound { .. }
            | Self::TransitionTimeout { .. } => FailureClass::Structural,
            Self::ElementNotFound { .. } | Self::ElementRead { .. } => FailureClass::FieldLevel,
            Self::Driver { .. } | Self::Timeout { .. } | Self::Io(_) => FailureClass::Adapter,
            Self::InvalidPlan { .. } | Self::Json(_) | Self::Yaml(_) => FailureClass::Plan,
        }
    }

    /// Whether this error aborts a run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.class().is_fatal()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_errors_are_fatal() {
        let errors = [
            HarnessError::Navigation {
                url: "http://localhost:3000/demo".into(),
                message: "network never idle".into(),
            },
            HarnessError::TriggerNotFound {
                selector: "button".into(),
                index: 0,
                matched: 0,
            },
            HarnessError::TransitionTimeout {
                pattern: "**/shipping".into(),
                timeout_ms: 10_000,
                last_url: "http://localhost:3000/demo".into(),
            },
        ];
        for err in errors {
            assert_eq!(err.class(), FailureClass::Structural);
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_field_errors_are_not_fatal() {
        let err = HarnessError::ElementNotFound {
            selector: "#origin-zip".into(),
        };
        assert_eq!(err.class(), FailureClass::FieldLevel);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_driver_error_is_adapter_class() {
        let err = HarnessError::driver("click", "target closed");
        assert_eq!(err.class(), FailureClass::Adapter);
        assert!(err.to_string().contains("click"));
        assert!(err.to_string().contains("target closed"));
    }

    #[test]
    fn test_trigger_not_found_message() {
        let err = HarnessError::TriggerNotFound {
            selector: "text=Start Demo".into(),
            index: 1,
            matched: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("#1"));
        assert!(msg.contains("1 matching"));
    }

    #[test]
    fn test_failure_class_display() {
        assert_eq!(FailureClass::Structural.to_string(), "structural");
        assert_eq!(FailureClass::FieldLevel.to_string(), "field-level");
        assert_eq!(FailureClass::Plan.to_string(), "plan");
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: HarnessError = io_err.into();
        assert_eq!(err.class(), FailureClass::Adapter);
    }
}
