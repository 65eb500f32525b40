use std::time::Duration;

/// Result alias that carries the custom [`AudioMagicError`] type.
pub type Result<T> = std::result::Result<T, AudioMagicError>;

/// Detail string the processing service uses for a remote link it cannot
/// resolve. It is the only server detail shown to the user as-is.
pub const LINK_MISSING_DETAIL: &str = "Link doesn't exist";

const GENERIC_FAILURE: &str = "Failed to process file.";

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AudioMagicError {
    /// Free-form message, mostly used by the command line front end.
    #[error("{0}")]
    Message(String),
    /// Input was rejected before any request was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A submitted request did not produce an artifact set.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// A single clip failed to load or play.
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl AudioMagicError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.user_message(),
            Self::Request(err) => err.user_message(),
            Self::Playback(err) => err.user_message().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<&str> for AudioMagicError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for AudioMagicError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Input problems detected synchronously. None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no input source selected")]
    NoSource,
    #[error("no processing mode selected")]
    NoMode,
    #[error("`{0}` is not a YouTube link")]
    InvalidLink(String),
    #[error("no file provided")]
    MissingFile,
    #[error("file is {size} bytes, limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("media type `{0}` is not audio")]
    NotAudio(String),
    #[error("{mode} is only available for uploaded files")]
    UnsupportedCombination { mode: &'static str },
    #[error("a submission is already in flight")]
    SubmissionInFlight,
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NoSource => "Please select a file or enter a YouTube link.".to_string(),
            Self::NoMode => "Please select a processing mode.".to_string(),
            Self::InvalidLink(_) => "Please enter a valid YouTube URL.".to_string(),
            Self::MissingFile => "Please select a file to upload.".to_string(),
            Self::FileTooLarge { limit, .. } => {
                format!("File size exceeds {}MB limit.", limit / (1024 * 1024))
            }
            Self::NotAudio(_) => "Please select an audio file.".to_string(),
            Self::UnsupportedCombination { mode } => {
                format!("{mode} is only available for uploaded audio files.")
            }
            Self::SubmissionInFlight => "Processing is already in progress.".to_string(),
        }
    }
}

/// Failure of the HTTP exchange itself or a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx status. `detail` is the server's `detail` field when the body
    /// could be parsed.
    #[error("server returned HTTP {status}")]
    Status { status: u16, detail: Option<String> },
    /// The upload payload could not be prepared, e.g. the file vanished.
    #[error("could not read upload: {0}")]
    Upload(String),
}

/// Terminal outcome of a submission that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RequestError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(TransportError::Status {
                detail: Some(detail),
                ..
            }) if detail == LINK_MISSING_DETAIL => detail.clone(),
            Self::Transport(TransportError::Status { .. }) => GENERIC_FAILURE.to_string(),
            Self::Transport(_) => "Something went wrong. Please try again.".to_string(),
            Self::Timeout(_) => "The request timed out. Please try again.".to_string(),
            Self::MalformedResponse(_) => {
                "Received an unexpected response from the server.".to_string()
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Clip-scoped failure. Never escalated beyond the owning controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("could not load `{url}`: {reason}")]
    Load { url: String, reason: String },
    #[error("could not start playback: {0}")]
    Play(String),
}

impl PlaybackError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Load { .. } => "This clip could not be loaded.",
            Self::Play(_) => "This clip could not be played.",
        }
    }
}
