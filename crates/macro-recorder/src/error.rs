//! Structured errors for the recorder, player and session

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Global input hooks or synthesis are not available (missing permission or backend)
    InputUnavailable,
    /// Start requested on a recorder or player that is already running
    AlreadyActive,
    /// Stop requested when nothing is running
    NotActive,
    /// The session is in a mode that conflicts with the request
    Busy,
    LoadFailed,
    SaveFailed,
    /// A single action could not be synthesized during playback
    ActionFailed,
    InvalidConfig,
    Io,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn input_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InputUnavailable, reason).with_suggestions(vec![
            "On macOS grant Accessibility and Input Monitoring to the terminal".to_string(),
            "On Linux build with the `x11` feature and run inside an X11 session".to_string(),
        ])
    }

    pub fn already_active(what: &str) -> Self {
        Self::new(ErrorCode::AlreadyActive, format!("{} is already active", what))
    }

    pub fn not_active(what: &str) -> Self {
        Self::new(ErrorCode::NotActive, format!("{} is not active", what))
    }

    pub fn busy(mode: impl std::fmt::Display, request: &str) -> Self {
        Self::new(
            ErrorCode::Busy,
            format!("cannot {} while {}", request, mode),
        )
    }

    pub fn load_failed(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::LoadFailed,
            format!("error loading file {}: {}", path.display(), reason),
        )
    }

    pub fn save_failed(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::SaveFailed,
            format!("error saving file {}: {}", path.display(), reason),
        )
    }

    pub fn action_failed(action: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::ActionFailed,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, reason)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let e = Error::already_active("recorder");
        assert_eq!(e.to_string(), "[AlreadyActive] recorder is already active");
    }

    #[test]
    fn serializes_code_screaming_case() {
        let e = Error::not_active("player");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["code"], "NOT_ACTIVE");
        assert!(json.get("suggestions").is_none());
    }
}
