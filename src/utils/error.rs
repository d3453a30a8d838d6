//! Error types for htmlsync

use thiserror::Error;

/// Main error type for parsing and synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or empty markup handed to the parser or validator
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation referenced a shape with no sync state
    #[error("unknown shape: {0}")]
    UnknownShape(String),
    /// An override selector matched nothing in the bound DOM.
    ///
    /// Only ever logged or reported; mutating calls never return it.
    #[error("selector `{selector}` matched no elements")]
    SelectorMiss { selector: String },
    /// Selector text the matcher cannot understand
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for htmlsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Classification of upload/network failures reported by collaborators.
///
/// Raw transport errors are never shown to users; each kind maps to one
/// fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFailure {
    /// Storage quota or payload size exceeded
    QuotaExceeded,
    /// Credentials missing, expired or rejected
    Unauthorized,
    /// Timeouts, dropped connections, server-side hiccups
    Network,
    /// Anything else
    Unrecognized,
}

const QUOTA_PATTERNS: &[&str] = &["quota", "storage limit", "too large", "payload"];
const AUTH_PATTERNS: &[&str] = &["unauthorized", "forbidden", "token", "credential", "permission"];
const NETWORK_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "offline",
    "econnreset",
    "dns",
];

impl TransferFailure {
    /// Classify a failure from an optional HTTP status and its message
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        match status {
            Some(413) | Some(429) | Some(507) => return Self::QuotaExceeded,
            Some(401) | Some(403) => return Self::Unauthorized,
            Some(408) | Some(500..=599) => return Self::Network,
            _ => {}
        }

        let message = message.to_lowercase();
        let contains_any = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

        if contains_any(QUOTA_PATTERNS) {
            Self::QuotaExceeded
        } else if contains_any(AUTH_PATTERNS) {
            Self::Unauthorized
        } else if contains_any(NETWORK_PATTERNS) {
            Self::Network
        } else {
            Self::Unrecognized
        }
    }

    /// The fixed user-facing message for this kind of failure
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => {
                "Storage limit reached. Remove unused assets or upgrade your plan and try again."
            }
            Self::Unauthorized => "Your session has expired. Please sign in again.",
            Self::Network | Self::Unrecognized => {
                "Network error. Check your connection and try again."
            }
        }
    }
}
