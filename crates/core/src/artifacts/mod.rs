use serde::{Deserialize, Serialize};

use crate::{config::ServiceConfig, service::HttpReply, RequestError, TransportError};

/// Which artifact fields a response must carry, fixed at submission time by
/// the source kind and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactLayout {
    /// Vocal and Music from an uploaded file.
    LocalSeparation,
    /// Vocal and Music from a remote link, with paired video renditions.
    RemoteSeparation,
    CatVersion,
}

impl ArtifactLayout {
    fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::LocalSeparation => &["vocals_link", "music_link"],
            Self::RemoteSeparation => &[
                "vocals_link",
                "music_link",
                "vocals_video",
                "music_video",
                "extracted_audio",
                "original_video",
            ],
            Self::CatVersion => &["final_meow_music"],
        }
    }
}

/// Download URLs produced by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSet {
    LocalSeparation {
        vocals_audio_url: String,
        music_audio_url: String,
    },
    RemoteSeparation {
        vocals_audio_url: String,
        music_audio_url: String,
        vocals_video_url: String,
        music_video_url: String,
        extracted_audio_url: String,
        original_video_url: String,
    },
    CatVersion {
        meow_audio_url: String,
    },
}

impl ArtifactSet {
    pub fn layout(&self) -> ArtifactLayout {
        match self {
            Self::LocalSeparation { .. } => ArtifactLayout::LocalSeparation,
            Self::RemoteSeparation { .. } => ArtifactLayout::RemoteSeparation,
            Self::CatVersion { .. } => ArtifactLayout::CatVersion,
        }
    }

    /// Every URL in the set, in presentation order.
    pub fn urls(&self) -> Vec<&str> {
        match self {
            Self::LocalSeparation {
                vocals_audio_url,
                music_audio_url,
            } => vec![vocals_audio_url.as_str(), music_audio_url.as_str()],
            Self::RemoteSeparation {
                vocals_audio_url,
                music_audio_url,
                vocals_video_url,
                music_video_url,
                extracted_audio_url,
                original_video_url,
            } => vec![
                original_video_url.as_str(),
                extracted_audio_url.as_str(),
                vocals_audio_url.as_str(),
                vocals_video_url.as_str(),
                music_audio_url.as_str(),
                music_video_url.as_str(),
            ],
            Self::CatVersion { meow_audio_url } => vec![meow_audio_url.as_str()],
        }
    }

    /// Classifies a raw reply into an artifact set for `layout`, or the error
    /// the submission fails with.
    pub fn from_reply(
        layout: ArtifactLayout,
        reply: &HttpReply,
        service: &ServiceConfig,
    ) -> Result<Self, RequestError> {
        if !reply.is_success() {
            return Err(TransportError::Status {
                status: reply.status,
                detail: error_detail(&reply.body),
            }
            .into());
        }

        let payload: ProcessPayload = serde_json::from_slice(&reply.body)
            .map_err(|e| RequestError::MalformedResponse(e.to_string()))?;
        Self::from_payload(layout, &payload, service)
    }

    fn from_payload(
        layout: ArtifactLayout,
        payload: &ProcessPayload,
        service: &ServiceConfig,
    ) -> Result<Self, RequestError> {
        let missing: Vec<&str> = layout
            .required_fields()
            .iter()
            .copied()
            .filter(|field| payload.get(field).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(RequestError::MalformedResponse(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        let url = |field: &str| {
            payload
                .get(field)
                .map(|identifier| service.download_url(identifier))
                .unwrap_or_default()
        };

        Ok(match layout {
            ArtifactLayout::LocalSeparation => Self::LocalSeparation {
                vocals_audio_url: url("vocals_link"),
                music_audio_url: url("music_link"),
            },
            ArtifactLayout::RemoteSeparation => Self::RemoteSeparation {
                vocals_audio_url: url("vocals_link"),
                music_audio_url: url("music_link"),
                vocals_video_url: url("vocals_video"),
                music_video_url: url("music_video"),
                extracted_audio_url: url("extracted_audio"),
                original_video_url: url("original_video"),
            },
            ArtifactLayout::CatVersion => Self::CatVersion {
                meow_audio_url: url("final_meow_music"),
            },
        })
    }
}

/// Success body as sent by the service. Which fields are present depends on
/// the request; the layout decides which ones are read.
#[derive(Debug, Default, Deserialize)]
struct ProcessPayload {
    vocals_link: Option<String>,
    music_link: Option<String>,
    vocals_video: Option<String>,
    music_video: Option<String>,
    extracted_audio: Option<String>,
    original_video: Option<String>,
    final_meow_music: Option<String>,
}

impl ProcessPayload {
    fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "vocals_link" => &self.vocals_link,
            "music_link" => &self.music_link,
            "vocals_video" => &self.vocals_video,
            "music_video" => &self.music_video,
            "extracted_audio" => &self.extracted_audio,
            "original_video" => &self.original_video,
            "final_meow_music" => &self.final_meow_music,
            _ => return None,
        };
        value.as_deref().filter(|identifier| !identifier.is_empty())
    }
}

/// Extracts a string `detail` from an error body, if there is one.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("detail")?.as_str().map(str::to_string)
}
