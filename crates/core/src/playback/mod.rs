use serde::{Deserialize, Serialize};

use crate::PlaybackError;

/// Output device or element a [`PlaybackController`] drives. Loading is
/// asynchronous: results come back as [`MediaEvent`]s tagged with the
/// generation returned by [`PlaybackController::attach`].
pub trait MediaBackend {
    fn load(&mut self, url: &str) -> Result<(), PlaybackError>;
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    /// Audible level in `[0, 1]`, already accounting for mute.
    fn set_output_level(&mut self, level: f32);
}

/// Notifications emitted by the backend while a source loads and plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaEvent {
    LoadedMetadata { duration_seconds: f64 },
    TimeUpdate { position_seconds: f64 },
    CanPlay,
    Ended,
    Failed { reason: String },
}

/// Transport state of one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub source_url: Option<String>,
    pub is_playing: bool,
    pub current_time_seconds: f64,
    /// `None` until metadata arrives.
    pub duration_seconds: Option<f64>,
    pub volume: f32,
    pub is_muted: bool,
    pub is_ready: bool,
    pub error: Option<PlaybackError>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            source_url: None,
            is_playing: false,
            current_time_seconds: 0.0,
            duration_seconds: None,
            volume: 1.0,
            is_muted: false,
            is_ready: false,
            error: None,
        }
    }
}

/// Per-clip state machine for seeking, volume and time display.
#[derive(Debug)]
pub struct PlaybackController<B> {
    backend: B,
    state: PlaybackState,
    generation: u64,
    /// Level restored when unmuting after the slider was dragged to zero.
    last_audible_volume: f32,
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: PlaybackState::default(),
            generation: 0,
            last_audible_volume: 1.0,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Binds a new source. Playback stops and progress resets before the new
    /// resource starts loading, so no stale duration is ever displayed.
    pub fn attach(&mut self, url: &str) -> u64 {
        self.generation += 1;
        self.backend.pause();
        self.state.is_playing = false;
        self.state.current_time_seconds = 0.0;
        self.state.duration_seconds = None;
        self.state.is_ready = false;
        self.state.error = None;
        self.state.source_url = Some(url.to_string());

        if let Err(err) = self.backend.load(url) {
            tracing::warn!(url, error = %err, "clip failed to load");
            self.state.error = Some(err);
        }
        self.generation
    }

    /// Unbinds the current source, if any.
    pub fn detach(&mut self) {
        self.generation += 1;
        self.backend.pause();
        self.state = PlaybackState {
            volume: self.state.volume,
            is_muted: self.state.is_muted,
            ..PlaybackState::default()
        };
    }

    pub fn toggle_play(&mut self) -> Result<(), PlaybackError> {
        if self.state.source_url.is_none() {
            return Ok(());
        }

        if self.state.is_playing {
            self.backend.pause();
            self.state.is_playing = false;
            return Ok(());
        }

        self.state.is_playing = true;
        if let Err(err) = self.backend.play() {
            tracing::warn!(error = %err, "clip failed to play");
            self.state.is_playing = false;
            self.state.error = Some(err.clone());
            return Err(err);
        }
        self.state.error = None;
        Ok(())
    }

    /// Seeks to a normalised scrub-bar position. Ignored until the duration
    /// is known.
    pub fn seek_to(&mut self, fraction_of_width: f64) {
        let Some(duration) = self.state.duration_seconds else {
            return;
        };
        if fraction_of_width.is_nan() {
            return;
        }

        let position = fraction_of_width.clamp(0.0, 1.0) * duration;
        self.backend.seek(position);
        self.state.current_time_seconds = position;
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };

        self.state.volume = volume;
        self.state.is_muted = volume == 0.0;
        if volume > 0.0 {
            self.last_audible_volume = volume;
        }
        self.backend.set_output_level(volume);
    }

    /// Switches output between silence and the last audible level. The stored
    /// volume is left alone while muting.
    pub fn toggle_mute(&mut self) {
        if self.state.is_muted {
            if self.state.volume == 0.0 {
                self.state.volume = self.last_audible_volume;
            }
            self.state.is_muted = false;
            self.backend.set_output_level(self.state.volume);
        } else {
            self.state.is_muted = true;
            self.backend.set_output_level(0.0);
        }
    }

    /// Level the backend is currently asked to produce.
    pub fn effective_volume(&self) -> f32 {
        if self.state.is_muted {
            0.0
        } else {
            self.state.volume
        }
    }

    /// Applies a backend event. Events from an earlier generation are
    /// dropped and false is returned.
    pub fn handle_event(&mut self, generation: u64, event: MediaEvent) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "dropping stale media event");
            return false;
        }

        match event {
            MediaEvent::LoadedMetadata { duration_seconds } => {
                if duration_seconds.is_finite() && duration_seconds > 0.0 {
                    self.state.duration_seconds = Some(duration_seconds);
                    self.state.current_time_seconds =
                        self.state.current_time_seconds.min(duration_seconds);
                }
            }
            MediaEvent::TimeUpdate { position_seconds } => {
                if position_seconds.is_finite() {
                    let position = position_seconds.max(0.0);
                    self.state.current_time_seconds = match self.state.duration_seconds {
                        Some(duration) => position.min(duration),
                        None => position,
                    };
                }
            }
            MediaEvent::CanPlay => self.state.is_ready = true,
            MediaEvent::Ended => {
                self.state.is_playing = false;
                if let Some(duration) = self.state.duration_seconds {
                    self.state.current_time_seconds = duration;
                }
            }
            MediaEvent::Failed { reason } => {
                self.state.is_playing = false;
                self.state.is_ready = false;
                self.state.error = Some(PlaybackError::Load {
                    url: self.state.source_url.clone().unwrap_or_default(),
                    reason,
                });
            }
        }
        true
    }

    /// Fill fraction of the scrub bar.
    pub fn progress(&self) -> f64 {
        match self.state.duration_seconds {
            Some(duration) if duration > 0.0 => {
                (self.state.current_time_seconds / duration).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// `"elapsed / total"` as shown next to the scrub bar.
    pub fn time_display(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.state.current_time_seconds),
            format_time(self.state.duration_seconds.unwrap_or(f64::NAN))
        )
    }
}

/// Renders seconds as `m:ss`. Values that are not finite render as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
