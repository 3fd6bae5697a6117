//! Session-level error type.
//!
//! Every configuration problem in the biasing subsystem is fatal for the whole
//! session. Instead of terminating the process where the problem is found, the
//! core returns an `AppError` and the binary maps it to an exit status.
//!
//! Exit codes:
//! - `1` fatal configuration error (bad or missing parameter)
//! - `2` unreadable or malformed input file
//! - `4` internal failure (e.g. a poisoned shared store)

/// Exit code used for fatal configuration errors.
pub const EXIT_CONFIGURATION: u8 = 1;
/// Exit code used for input file problems.
pub const EXIT_INPUT: u8 = 2;
/// Exit code used for internal failures.
pub const EXIT_INTERNAL: u8 = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    parameter: Option<String>,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            parameter: None,
            message: message.into(),
        }
    }

    /// Fatal configuration error tied to a parameter name.
    pub fn quit(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exit_code: EXIT_CONFIGURATION,
            parameter: Some(parameter.into()),
            message: message.into(),
        }
    }

    /// Fatal configuration error not tied to a single parameter.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIGURATION, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EXIT_INTERNAL, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_configuration(&self) -> bool {
        self.exit_code == EXIT_CONFIGURATION
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.parameter {
            Some(parameter) => write!(
                f,
                "Exiting due to a serious error in variance reduction setup.\nParameter name: {parameter}\n{}",
                self.message
            ),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("parameter", &self.parameter)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_carries_parameter_and_exit_code() {
        let err = AppError::quit("Vr/Split/SplitNumber", "size does not match");
        assert_eq!(err.exit_code(), EXIT_CONFIGURATION);
        assert_eq!(err.parameter(), Some("Vr/Split/SplitNumber"));
        let text = err.to_string();
        assert!(text.contains("Parameter name: Vr/Split/SplitNumber"));
        assert!(text.contains("size does not match"));
    }

    #[test]
    fn plain_errors_print_message_only() {
        let err = AppError::input("Failed to open tracks");
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "Failed to open tracks");
    }
}
