use std::fmt;
use thiserror::Error;

/// Classified identity-provider failure reasons, normalized from the
/// provider-specific codes returned by the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityErrorCode {
    Cancelled,
    PopupBlocked,
    Network,
    InvalidCredential,
    AccountExists,
    WeakPassword,
    TooManyRequests,
    Unknown,
}

impl IdentityErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::PopupBlocked => "popup_blocked",
            Self::Network => "network",
            Self::InvalidCredential => "invalid_credential",
            Self::AccountExists => "account_exists",
            Self::WeakPassword => "weak_password",
            Self::TooManyRequests => "too_many_requests",
            Self::Unknown => "unknown",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::Cancelled => "Sign-in was cancelled. Please try again.",
            Self::PopupBlocked => {
                "Pop-up was blocked by the browser. Please allow pop-ups for this site."
            }
            Self::Network => "A network error interrupted sign-in. Please try again.",
            Self::InvalidCredential => "Invalid email or password.",
            Self::AccountExists => "This email is already registered. Please sign in instead.",
            Self::WeakPassword => "Password is too weak. Please use a stronger password.",
            Self::TooManyRequests => "Too many failed attempts. Please try again later.",
            Self::Unknown => "Failed to sign in. Please try again.",
        }
    }
}

impl fmt::Display for IdentityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Identity provider error [{code}]: {message}")]
    Identity {
        code: IdentityErrorCode,
        message: String,
    },
    #[error("Calendar source error: {0}")]
    Calendar(String),
    #[error("calendar authorization expired; sign in again")]
    CalendarAuthExpired,
}

impl CoreError {
    /// The message shown to the user. Identity failures surface their fixed
    /// per-code copy; everything else surfaces the error text itself.
    pub fn user_message(&self) -> String {
        match self {
            Self::Identity { code, .. } => code.user_message().to_string(),
            other => other.to_string(),
        }
    }
}
