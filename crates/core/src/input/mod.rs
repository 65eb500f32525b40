use std::{
    fmt,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    artifacts::ArtifactLayout,
    config::UploadConfig,
    preview::{PreviewRegistry, PreviewUrl},
    service::{ProcessRequest, Upload},
    Result, ValidationError,
};

/// Transformation requested from the processing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingMode {
    #[serde(rename = "Vocal and Music")]
    VocalAndMusic,
    #[serde(rename = "Cat Version")]
    CatVersion,
}

impl ProcessingMode {
    /// Value of the multipart `mode` field.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::VocalAndMusic => "Vocal and Music",
            Self::CatVersion => "Cat Version",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// An audio file on the local filesystem. The path is the handle used for the
/// upload; the bytes are only read when the request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
    pub path: PathBuf,
}

impl AudioFile {
    /// Reads size and media type of the file at `path`, which is stored in
    /// canonical form. The media type is declared from the extension; unknown
    /// extensions yield `application/octet-stream`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = std::fs::canonicalize(path.as_ref())?;
        let metadata = std::fs::metadata(&path)?;
        let media_type = media_type_for(&path).unwrap_or("application/octet-stream");
        Ok(Self::with_media_type(&path, metadata.len(), media_type))
    }

    pub fn with_media_type(path: impl AsRef<Path>, size_bytes: u64, media_type: &str) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self {
            name,
            size_bytes,
            media_type: media_type.to_string(),
            path: path.to_path_buf(),
        }
    }

    pub fn is_audio(&self) -> bool {
        self.media_type.starts_with("audio/")
    }
}

fn media_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match extension.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "weba" | "webm" => "audio/webm",
        "aif" | "aiff" => "audio/aiff",
        "mp4" => "video/mp4",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(media_type)
}

/// Returns true when `text` looks like a YouTube link: optional scheme,
/// optional `www.`, host `youtube.com` or `youtu.be`, then a path.
pub fn is_valid_remote_link(text: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(text.trim()))
}

/// A selected local file together with its preview reference.
#[derive(Debug)]
pub struct LocalFile {
    pub file: AudioFile,
    preview: PreviewUrl,
}

impl LocalFile {
    pub fn preview(&self) -> &PreviewUrl {
        &self.preview
    }
}

/// Mutually exclusive input source.
#[derive(Debug, Default)]
pub enum InputSource {
    #[default]
    None,
    LocalFile(LocalFile),
    RemoteLink(String),
}

impl InputSource {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Holds the input source and mode, and enforces the rules between them.
#[derive(Debug)]
pub struct InputSelector {
    source: InputSource,
    mode: Option<ProcessingMode>,
    link_text: String,
    limits: UploadConfig,
    previews: PreviewRegistry,
}

impl InputSelector {
    pub fn new(limits: UploadConfig, previews: PreviewRegistry) -> Self {
        Self {
            source: InputSource::None,
            mode: None,
            link_text: String::new(),
            limits,
            previews,
        }
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn mode(&self) -> Option<ProcessingMode> {
        self.mode
    }

    /// Raw link text as typed, which may differ from the accepted source.
    pub fn link_text(&self) -> &str {
        &self.link_text
    }

    pub fn preview(&self) -> Option<&PreviewUrl> {
        match &self.source {
            InputSource::LocalFile(local) => Some(local.preview()),
            _ => None,
        }
    }

    /// Accepts a local file. On rejection nothing changes.
    pub fn select_local_file(
        &mut self,
        file: Option<AudioFile>,
    ) -> std::result::Result<(), ValidationError> {
        let file = file.ok_or(ValidationError::MissingFile)?;
        if file.size_bytes > self.limits.max_file_bytes {
            return Err(ValidationError::FileTooLarge {
                size: file.size_bytes,
                limit: self.limits.max_file_bytes,
            });
        }
        if !file.is_audio() {
            return Err(ValidationError::NotAudio(file.media_type));
        }

        let preview = self.previews.acquire(&file.path);
        tracing::debug!(name = %file.name, size = file.size_bytes, "selected local file");
        // Replacing the source drops the previous preview.
        self.source = InputSource::LocalFile(LocalFile { file, preview });
        self.link_text.clear();
        self.mode = None;
        Ok(())
    }

    /// Stores the link text without validating its shape; that happens at
    /// submission.
    pub fn set_remote_link(&mut self, text: &str) {
        self.link_text = text.to_string();
        let trimmed = text.trim();

        if trimmed.is_empty() {
            if matches!(self.source, InputSource::RemoteLink(_)) {
                self.source = InputSource::None;
            }
            return;
        }

        self.source = InputSource::RemoteLink(trimmed.to_string());
        if self.mode == Some(ProcessingMode::CatVersion) {
            tracing::debug!("cleared cat version mode for remote link");
            self.mode = None;
        }
    }

    pub fn select_mode(&mut self, mode: ProcessingMode) -> std::result::Result<(), ValidationError> {
        if mode == ProcessingMode::CatVersion
            && !matches!(self.source, InputSource::LocalFile(_))
        {
            return Err(ValidationError::UnsupportedCombination {
                mode: mode.as_wire(),
            });
        }
        self.mode = Some(mode);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.source = InputSource::None;
        self.link_text.clear();
        self.mode = None;
    }

    /// Checks every submission precondition and returns the artifact layout
    /// the response must match.
    pub fn validate(&self) -> std::result::Result<ArtifactLayout, ValidationError> {
        let mode = match (&self.source, self.mode) {
            (InputSource::None, _) => return Err(ValidationError::NoSource),
            (_, None) => return Err(ValidationError::NoMode),
            (_, Some(mode)) => mode,
        };

        match (&self.source, mode) {
            (InputSource::RemoteLink(link), _) if !is_valid_remote_link(link) => {
                Err(ValidationError::InvalidLink(link.clone()))
            }
            (InputSource::RemoteLink(_), ProcessingMode::CatVersion) => {
                Err(ValidationError::UnsupportedCombination {
                    mode: mode.as_wire(),
                })
            }
            (InputSource::RemoteLink(_), ProcessingMode::VocalAndMusic) => {
                Ok(ArtifactLayout::RemoteSeparation)
            }
            (InputSource::LocalFile(_), ProcessingMode::VocalAndMusic) => {
                Ok(ArtifactLayout::LocalSeparation)
            }
            (InputSource::LocalFile(_), ProcessingMode::CatVersion) => Ok(ArtifactLayout::CatVersion),
            (InputSource::None, _) => Err(ValidationError::NoSource),
        }
    }

    /// Builds the multipart payload, borrowing the selected file.
    pub fn to_request(&self) -> std::result::Result<ProcessRequest<'_>, ValidationError> {
        self.validate()?;
        let mode = self.mode.ok_or(ValidationError::NoMode)?;
        let upload = match &self.source {
            InputSource::LocalFile(local) => Upload::File(&local.file),
            InputSource::RemoteLink(link) => Upload::Link(link),
            InputSource::None => return Err(ValidationError::NoSource),
        };
        Ok(ProcessRequest { upload, mode })
    }
}
