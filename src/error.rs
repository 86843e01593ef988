// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Error messages for the command line.
//!
//! Library errors stay typed ([`ApiError`], [`StorageError`]); this module
//! turns them into a title, a list of likely causes and a list of things to
//! try.

use std::fmt;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Formats an error message with title, causes and fixes.
///
/// # Example
///
/// ```
/// use clinic_session::error::format_error;
///
/// let error = format_error(
///     "Could not reach the server",
///     &["Backend is asleep", "Wrong api_url in config"],
///     &["Wake it: clinic ping", "Check URL: clinic config show"],
/// );
/// assert!(error.starts_with("[✗] Could not reach the server"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = format!("[✗] {}\n", title);

    if !causes.is_empty() {
        output.push_str("\nPossible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
    }

    if !fixes.is_empty() {
        output.push_str("\nTry these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
    }

    output
}

/// Builder for constructing formatted error messages.
///
/// ```
/// use clinic_session::error::ErrorBuilder;
///
/// let error = ErrorBuilder::new("Login failed")
///     .cause("Wrong password")
///     .fix("Try again: clinic login")
///     .build();
/// assert!(error.contains("1. Try again: clinic login"));
/// ```
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

/// Causes and fixes for a failed backend call.
pub fn describe_api_error(error: &ApiError) -> ErrorBuilder {
    match error {
        ApiError::Credentials(msg) => ErrorBuilder::new(format!("Login failed: {}", msg))
            .cause("Wrong email or password")
            .fix("Try again: clinic login"),
        ApiError::TokenRejected => ErrorBuilder::new("Your session is no longer valid")
            .cause("The token expired or was revoked")
            .cause("The server was redeployed with a new signing key")
            .fix("Sign in again: clinic login"),
        ApiError::NotAuthenticated => {
            ErrorBuilder::new("Not signed in").fix("Sign in: clinic login")
        }
        ApiError::NotFound(what) => ErrorBuilder::new(format!("Not found: {}", what))
            .cause("The item was already deleted")
            .fix("Refresh the list and use a current id"),
        ApiError::Server { status, message } => {
            ErrorBuilder::new(format!("Server error ({})", status))
                .cause(message.clone())
                .fix("Retry in a moment")
                .fix("Check the backend logs")
        }
        ApiError::Network(detail) => ErrorBuilder::new("Could not reach the server")
            .cause(detail.clone())
            .cause("The backend host is asleep or restarting")
            .cause("Wrong api_url in config")
            .fix("Wake the backend: clinic ping")
            .fix("Check the URL: clinic config show"),
        ApiError::Decode(detail) => ErrorBuilder::new("Unexpected response from the server")
            .cause(detail.clone())
            .cause("api_url points at something that is not the practice backend")
            .fix("Check the URL: clinic config show"),
    }
}

/// Causes and fixes for a token file problem.
pub fn describe_storage_error(error: &StorageError) -> ErrorBuilder {
    match error {
        StorageError::Io { path, source } => {
            ErrorBuilder::new(format!("Could not access {}", path.display()))
                .cause(source.to_string())
                .fix("Check permissions on the ~/.clinic directory")
        }
        StorageError::Corrupt { path, .. } => {
            ErrorBuilder::new(format!("Session file is damaged: {}", path.display()))
                .cause("The file was edited by hand or truncated")
                .fix("Sign out to reset it: clinic logout")
        }
        StorageError::LockTimeout(waited) => {
            ErrorBuilder::new(format!("Session file is busy (waited {:?})", waited))
                .cause("Another clinic process is writing the session")
                .fix("Close other clinic windows and retry")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_format_error_sections() {
        let error = format_error("Title", &["cause one", "cause two"], &["fix one"]);
        assert!(error.starts_with("[✗] Title\n"));
        assert!(error.contains("Possible causes:\n  - cause one\n  - cause two\n"));
        assert!(error.contains("Try these fixes:\n  1. fix one\n"));
    }

    #[test]
    fn test_format_error_without_lists() {
        assert_eq!(format_error("Only a title", &[], &[]), "[✗] Only a title\n");
    }

    #[test]
    fn test_builder_matches_format() {
        let built = ErrorBuilder::new("T").cause("c").fix("f").build();
        assert_eq!(built, format_error("T", &["c"], &["f"]));
        assert_eq!(ErrorBuilder::new("T").cause("c").to_string(), format_error("T", &["c"], &[]));
    }

    #[test]
    fn test_describe_api_errors() {
        let text = describe_api_error(&ApiError::TokenRejected).build();
        assert!(text.contains("clinic login"));

        let text = describe_api_error(&ApiError::Network("connection refused".into())).build();
        assert!(text.contains("connection refused"));
        assert!(text.contains("clinic ping"));

        let text = describe_api_error(&ApiError::Credentials("Invalid credentials".into())).build();
        assert!(text.starts_with("[✗] Login failed: Invalid credentials"));
    }

    #[test]
    fn test_describe_storage_errors() {
        let text = describe_storage_error(&StorageError::LockTimeout(Duration::from_secs(5))).build();
        assert!(text.contains("busy"));

        let text = describe_storage_error(&StorageError::Corrupt {
            path: PathBuf::from("/tmp/session.json"),
            message: "expected value".into(),
        })
        .build();
        assert!(text.contains("/tmp/session.json"));
    }
}
