use std::fmt;

/// The closed set of reasons a translation step can fail. Kept as a kind
/// rather than a type per variant so that status reporting can match on it
/// without downcasting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ReferenceNotPermitted,
    ReferenceNotFound,
    InvalidKind,
    InvalidTls,
    InvalidConfiguration,
    NotAllowedByListeners,
    NoMatchingParent,
    NoMatchingListenerHostname,
    TranslationError,
    PushWriteTimeout,
    StreamTerminalError,
}

impl ErrorKind {
    /// The Gateway API condition `reason` string for this kind.
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorKind::ReferenceNotPermitted => "RefNotPermitted",
            ErrorKind::ReferenceNotFound => "BackendNotFound",
            ErrorKind::InvalidKind => "InvalidKind",
            ErrorKind::InvalidTls => "InvalidCertificateRef",
            ErrorKind::InvalidConfiguration => "InvalidConfiguration",
            ErrorKind::NotAllowedByListeners => "NotAllowedByListeners",
            ErrorKind::NoMatchingParent => "NoMatchingParent",
            ErrorKind::NoMatchingListenerHostname => "NoMatchingListenerHostname",
            ErrorKind::TranslationError => "TranslationError",
            ErrorKind::PushWriteTimeout => "PushWriteTimeout",
            ErrorKind::StreamTerminalError => "StreamTerminalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// An error produced while translating a single source object. Carries
/// enough context to become a status condition without the caller needing
/// to know which translation step produced it.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TranslationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TranslationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
