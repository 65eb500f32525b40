//! Core library for Audio Magic.
//!
//! A user picks an audio source (a local file or a YouTube link) and a
//! processing mode; the [`Orchestrator`] submits it to the external
//! processing service and maps the reply into an [`ArtifactSet`]. Each
//! resulting clip is driven by its own [`PlaybackController`].

pub mod artifacts;
pub mod config;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod playback;
pub mod presenter;
pub mod preview;
pub mod service;

pub use artifacts::{ArtifactLayout, ArtifactSet};
pub use config::{AppConfig, ServiceConfig, UploadConfig};
pub use error::{
    AudioMagicError, PlaybackError, RequestError, Result, TransportError, ValidationError,
};
pub use input::{is_valid_remote_link, AudioFile, InputSelector, InputSource, ProcessingMode};
pub use orchestrator::{Orchestrator, RequestState, Ticket};
pub use playback::{format_time, MediaBackend, MediaEvent, PlaybackController, PlaybackState};
pub use presenter::{Clip, ClipKind, Presentation, Tab};
pub use preview::{PreviewRegistry, PreviewUrl};
pub use service::{HttpProcessingService, HttpReply, ProcessRequest, ProcessingService, Upload};
