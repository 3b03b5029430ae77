use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No match for pattern '{0}' in scanned region")]
    PatternNotFound(String),

    #[error("Invalid signature pattern: {0}")]
    InvalidPattern(String),

    #[error("Offset '{0}' is registered in neither the signature nor the hardcoded table")]
    UnresolvedSymbol(String),

    #[error("Failed to install hook '{name}': {message}")]
    HookInstallFailed { name: String, message: String },

    #[error("Hook '{0}' does not exist")]
    HookNotFound(String),

    #[error("Patch operation failed: {0}")]
    Patch(String),

    #[error("A camera track needs at least 2 nodes to play, got {0}")]
    InsufficientTrackNodes(usize),

    #[error("Track '{0}' has malformed node timestamps")]
    InvalidTrack(String),

    #[error("Failed to parse config: {0}")]
    ConfigParseFailed(String),

    #[error("Game window not found: {0}")]
    WindowNotFound(String),

    #[error("Game module not found: {0}")]
    ModuleNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors that must abort initialization before any hook is installed.
    /// Everything else degrades to "camera override has no effect".
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::WindowNotFound(_) | Error::ModuleNotFound(_))
    }
}
