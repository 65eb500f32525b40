use serde::Serialize;

use crate::{
    artifacts::ArtifactSet,
    playback::{MediaBackend, PlaybackController},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClipKind {
    Audio,
    Video,
}

/// One playable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clip {
    pub label: String,
    pub url: String,
    pub kind: ClipKind,
}

impl Clip {
    fn audio(label: &str, url: &str) -> Self {
        Self {
            label: label.to_string(),
            url: url.to_string(),
            kind: ClipKind::Audio,
        }
    }

    fn video(label: &str, url: &str) -> Self {
        Self {
            kind: ClipKind::Video,
            ..Self::audio(label, url)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tab {
    pub title: String,
    pub clips: Vec<Clip>,
}

/// How an artifact set is laid out on screen: flat clips, or tabs when the
/// set pairs audio with video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub original: Option<Clip>,
    pub clips: Vec<Clip>,
    pub tabs: Vec<Tab>,
    pub active_tab: Option<usize>,
}

impl Presentation {
    /// Lays out `artifacts`. `original_preview` is the URL of the locally
    /// selected file, if any.
    pub fn from_artifacts(artifacts: &ArtifactSet, original_preview: Option<&str>) -> Self {
        let original = original_preview.map(|url| Clip::audio("Original", url));

        match artifacts {
            ArtifactSet::LocalSeparation {
                vocals_audio_url,
                music_audio_url,
            } => Self {
                original,
                clips: vec![
                    Clip::audio("Vocals", vocals_audio_url),
                    Clip::audio("Music", music_audio_url),
                ],
                tabs: Vec::new(),
                active_tab: None,
            },
            ArtifactSet::CatVersion { meow_audio_url } => Self {
                original,
                clips: vec![Clip::audio("Meow Version", meow_audio_url)],
                tabs: Vec::new(),
                active_tab: None,
            },
            ArtifactSet::RemoteSeparation {
                vocals_audio_url,
                music_audio_url,
                vocals_video_url,
                music_video_url,
                extracted_audio_url,
                original_video_url,
            } => Self {
                original,
                clips: Vec::new(),
                tabs: vec![
                    Tab {
                        title: "Original".to_string(),
                        clips: vec![
                            Clip::video("Original Video", original_video_url),
                            Clip::audio("Extracted Audio", extracted_audio_url),
                        ],
                    },
                    Tab {
                        title: "Vocals".to_string(),
                        clips: vec![
                            Clip::audio("Vocals", vocals_audio_url),
                            Clip::video("Vocals Video", vocals_video_url),
                        ],
                    },
                    Tab {
                        title: "Music".to_string(),
                        clips: vec![
                            Clip::audio("Music", music_audio_url),
                            Clip::video("Music Video", music_video_url),
                        ],
                    },
                ],
                active_tab: Some(0),
            },
        }
    }

    pub fn has_tabs(&self) -> bool {
        !self.tabs.is_empty()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.get(self.active_tab?)
    }

    /// Switches tabs by title. Unknown titles leave the selection unchanged.
    pub fn select_tab(&mut self, title: &str) -> bool {
        match self.tabs.iter().position(|tab| tab.title == title) {
            Some(index) => {
                self.active_tab = Some(index);
                true
            }
            None => false,
        }
    }

    /// Clips currently on screen: the original preview, then either the flat
    /// clips or the active tab's clips.
    pub fn visible_clips(&self) -> Vec<&Clip> {
        let body: Vec<&Clip> = match self.active_tab() {
            Some(tab) => tab.clips.iter().collect(),
            None => self.clips.iter().collect(),
        };
        self.original.iter().chain(body).collect()
    }

    /// Creates one controller per visible clip, each with its own backend.
    pub fn players<B, F>(&self, mut backend: F) -> Vec<(Clip, PlaybackController<B>)>
    where
        B: MediaBackend,
        F: FnMut(&Clip) -> B,
    {
        self.visible_clips()
            .into_iter()
            .map(|clip| {
                let mut player = PlaybackController::new(backend(clip));
                player.attach(&clip.url);
                (clip.clone(), player)
            })
            .collect()
    }
}
