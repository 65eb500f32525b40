//! Request orchestration: validate the selected input, run one submission at
//! a time against the processing service and classify the outcome.
//!
//! Every submission gets a fresh epoch. Results are only applied while the
//! orchestrator is still waiting on that same epoch, so a late reply from a
//! superseded or already timed-out request can never overwrite newer state.

use std::time::Duration;

use crate::{
    artifacts::{ArtifactLayout, ArtifactSet},
    config::AppConfig,
    input::{AudioFile, InputSelector, ProcessingMode},
    preview::PreviewRegistry,
    service::{HttpReply, ProcessRequest, ProcessingService},
    AudioMagicError, RequestError, Result, ValidationError,
};

/// Lifecycle of the current submission. Artifacts only exist inside
/// `Success`, so they can never be shown next to a pending request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    Submitting { epoch: u64 },
    Success(ArtifactSet),
    Failed(RequestError),
}

impl RequestState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }

    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        match self {
            Self::Success(set) => Some(set),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RequestError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Proof that a submission was started. Handed back with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub layout: ArtifactLayout,
}

#[derive(Debug)]
pub struct Orchestrator {
    config: AppConfig,
    selector: InputSelector,
    state: RequestState,
    epoch: u64,
}

impl Orchestrator {
    pub fn new(config: AppConfig) -> Self {
        Self::with_previews(config, PreviewRegistry::new())
    }

    pub fn with_previews(config: AppConfig, previews: PreviewRegistry) -> Self {
        let selector = InputSelector::new(config.upload.clone(), previews);
        Self {
            config,
            selector,
            state: RequestState::Idle,
            epoch: 0,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn selector(&self) -> &InputSelector {
        &self.selector
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Accepts a local file and drops any artifacts from an earlier run.
    pub fn select_local_file(
        &mut self,
        file: Option<AudioFile>,
    ) -> std::result::Result<(), ValidationError> {
        self.ensure_editable()?;
        self.selector.select_local_file(file)?;
        self.state = RequestState::Idle;
        Ok(())
    }

    pub fn set_remote_link(&mut self, text: &str) -> std::result::Result<(), ValidationError> {
        self.ensure_editable()?;
        self.selector.set_remote_link(text);
        Ok(())
    }

    pub fn select_mode(&mut self, mode: ProcessingMode) -> std::result::Result<(), ValidationError> {
        self.ensure_editable()?;
        self.selector.select_mode(mode)
    }

    /// The selector is frozen while a submission is in flight: the pending
    /// request and its ticket's layout are both read from it.
    fn ensure_editable(&self) -> std::result::Result<(), ValidationError> {
        if self.state.is_submitting() {
            tracing::debug!(epoch = self.epoch, "input change refused while submitting");
            return Err(ValidationError::SubmissionInFlight);
        }
        Ok(())
    }

    /// Validates the input and moves to `Submitting` under a new epoch. Prior
    /// artifacts and errors are cleared before anything is sent.
    pub fn begin_submit(&mut self) -> std::result::Result<Ticket, ValidationError> {
        if self.state.is_submitting() {
            return Err(ValidationError::SubmissionInFlight);
        }
        let layout = self.selector.validate()?;

        self.epoch += 1;
        self.state = RequestState::Submitting { epoch: self.epoch };
        tracing::info!(epoch = self.epoch, ?layout, "submitting");

        Ok(Ticket {
            epoch: self.epoch,
            layout,
        })
    }

    /// Payload for the submission in flight, if any.
    pub fn pending_request(&self) -> Option<ProcessRequest<'_>> {
        if !self.state.is_submitting() {
            return None;
        }
        self.selector.to_request().ok()
    }

    /// Applies the outcome of `ticket`'s exchange. Returns false, leaving the
    /// state untouched, when the ticket is no longer the one being awaited.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: std::result::Result<HttpReply, RequestError>,
    ) -> bool {
        match self.state {
            RequestState::Submitting { epoch } if epoch == ticket.epoch => {}
            _ => {
                tracing::debug!(
                    ticket = ticket.epoch,
                    current = self.epoch,
                    "discarding stale result"
                );
                return false;
            }
        }

        let resolved = outcome.and_then(|reply| {
            ArtifactSet::from_reply(ticket.layout, &reply, &self.config.service)
        });

        self.state = match resolved {
            Ok(set) => {
                tracing::info!(epoch = ticket.epoch, artifacts = set.urls().len(), "processing succeeded");
                RequestState::Success(set)
            }
            Err(err) => {
                tracing::warn!(epoch = ticket.epoch, error = %err, "processing failed");
                RequestState::Failed(err)
            }
        };
        true
    }

    /// Abandons whatever is in flight and returns to `Idle`.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.state = RequestState::Idle;
    }

    /// Runs one complete submission against `service`, bounded by the
    /// configured timeout.
    pub async fn submit<S: ProcessingService>(&mut self, service: &S) -> Result<&ArtifactSet> {
        let ticket = self.begin_submit()?;
        let timeout = self.config.service.request_timeout();

        let outcome = match self.selector.to_request() {
            Ok(request) => send_with_timeout(service, request, timeout).await,
            Err(err) => {
                self.reset();
                return Err(err.into());
            }
        };
        self.complete(ticket, outcome);

        match &self.state {
            RequestState::Success(set) => Ok(set),
            RequestState::Failed(err) => Err(err.clone().into()),
            other => Err(AudioMagicError::msg(format!(
                "submission ended in unexpected state {other:?}"
            ))),
        }
    }
}

/// Sends `request`, turning an elapsed deadline into [`RequestError::Timeout`]
/// even if the transport would eventually have answered.
pub async fn send_with_timeout<S: ProcessingService>(
    service: &S,
    request: ProcessRequest<'_>,
    timeout: Duration,
) -> std::result::Result<HttpReply, RequestError> {
    match tokio::time::timeout(timeout, service.process(request)).await {
        Ok(reply) => reply.map_err(RequestError::from),
        Err(_) => Err(RequestError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{service::Upload, TransportError};

    /// Replies with a canned outcome after an optional delay.
    struct FakeService {
        reply: std::result::Result<HttpReply, TransportError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeService {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(HttpReply::new(status, body)),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ProcessingService for FakeService {
        fn process<'a>(
            &'a self,
            _request: ProcessRequest<'a>,
        ) -> impl Future<Output = std::result::Result<HttpReply, TransportError>> + Send + 'a
        {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.reply.clone()
            }
        }
    }

    fn song() -> AudioFile {
        AudioFile::with_media_type("/music/song.mp3", 10 * 1024 * 1024, "audio/mpeg")
    }

    fn local_separation() -> Orchestrator {
        let mut orchestrator = Orchestrator::new(AppConfig::default());
        orchestrator.select_local_file(Some(song())).unwrap();
        orchestrator
            .select_mode(ProcessingMode::VocalAndMusic)
            .unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn invalid_inputs_never_reach_the_network() {
        let service = FakeService::replying(200, "{}");
        let mut orchestrator = Orchestrator::new(AppConfig::default());

        let err = orchestrator.submit(&service).await.unwrap_err();
        assert!(matches!(
            err,
            AudioMagicError::Validation(ValidationError::NoSource)
        ));

        orchestrator.set_remote_link("bad-url").unwrap();
        orchestrator
            .select_mode(ProcessingMode::VocalAndMusic)
            .unwrap();
        let err = orchestrator.submit(&service).await.unwrap_err();
        assert_eq!(err.user_message(), "Please enter a valid YouTube URL.");

        assert_eq!(service.calls(), 0);
        assert_eq!(orchestrator.state(), &RequestState::Idle);
    }

    #[tokio::test]
    async fn local_separation_exposes_two_audio_urls() {
        let service = FakeService::replying(200, r#"{"vocals_link":"v1","music_link":"m1"}"#);
        let mut orchestrator = local_separation();

        let set = orchestrator.submit(&service).await.unwrap().clone();
        assert_eq!(
            set,
            ArtifactSet::LocalSeparation {
                vocals_audio_url: "http://localhost:8000/download/v1".to_string(),
                music_audio_url: "http://localhost:8000/download/m1".to_string(),
            }
        );
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn server_detail_is_classified() {
        let service = FakeService::replying(404, r#"{"detail":"Link doesn't exist"}"#);
        let mut orchestrator = Orchestrator::new(AppConfig::default());
        orchestrator.set_remote_link("https://youtu.be/gone").unwrap();
        orchestrator
            .select_mode(ProcessingMode::VocalAndMusic)
            .unwrap();

        let err = orchestrator.submit(&service).await.unwrap_err();
        assert_eq!(err.user_message(), "Link doesn't exist");
        assert!(orchestrator.state().error().is_some());
    }

    #[tokio::test]
    async fn network_failures_get_a_generic_message() {
        let service = FakeService {
            reply: Err(TransportError::Network("connection refused".to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        };
        let mut orchestrator = local_separation();

        let err = orchestrator.submit(&service).await.unwrap_err();
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert!(!orchestrator.state().is_submitting());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_times_out() {
        let service = FakeService {
            reply: Ok(HttpReply::new(200, r#"{"vocals_link":"v","music_link":"m"}"#)),
            delay: Duration::from_secs(301),
            calls: AtomicUsize::new(0),
        };
        let mut orchestrator = local_separation();

        let err = orchestrator.submit(&service).await.unwrap_err();
        match err {
            AudioMagicError::Request(err) => assert!(err.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            orchestrator.state(),
            RequestState::Failed(RequestError::Timeout(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn service_just_inside_the_deadline_succeeds() {
        let service = FakeService {
            reply: Ok(HttpReply::new(200, r#"{"vocals_link":"v","music_link":"m"}"#)),
            delay: Duration::from_secs(299),
            calls: AtomicUsize::new(0),
        };
        let mut orchestrator = local_separation();

        assert!(orchestrator.submit(&service).await.is_ok());
    }

    #[test]
    fn only_one_submission_in_flight() {
        let mut orchestrator = local_separation();
        let ticket = orchestrator.begin_submit().unwrap();

        assert_eq!(
            orchestrator.begin_submit(),
            Err(ValidationError::SubmissionInFlight)
        );
        assert_eq!(orchestrator.epoch(), ticket.epoch);
    }

    #[test]
    fn begin_submit_clears_previous_artifacts() {
        let mut orchestrator = local_separation();
        let ticket = orchestrator.begin_submit().unwrap();
        orchestrator.complete(
            ticket,
            Ok(HttpReply::new(200, r#"{"vocals_link":"v","music_link":"m"}"#)),
        );
        assert!(orchestrator.state().artifacts().is_some());

        orchestrator.begin_submit().unwrap();
        assert!(orchestrator.state().artifacts().is_none());
        assert!(orchestrator.state().is_submitting());
    }

    #[test]
    fn late_results_from_superseded_requests_are_dropped() {
        let mut orchestrator = local_separation();
        let first = orchestrator.begin_submit().unwrap();
        assert!(orchestrator.complete(first, Err(RequestError::Timeout(Duration::from_secs(300)))));

        let second = orchestrator.begin_submit().unwrap();
        let stale = Ok(HttpReply::new(200, r#"{"vocals_link":"old","music_link":"old"}"#));
        assert!(!orchestrator.complete(first, stale));
        assert!(orchestrator.state().is_submitting());

        assert!(orchestrator.complete(
            second,
            Ok(HttpReply::new(200, r#"{"vocals_link":"new","music_link":"new"}"#)),
        ));
        let urls = orchestrator.state().artifacts().unwrap().urls();
        assert!(urls.iter().all(|url| url.ends_with("/new")));
    }

    #[test]
    fn a_ticket_resolves_only_once() {
        let mut orchestrator = local_separation();
        let ticket = orchestrator.begin_submit().unwrap();

        assert!(orchestrator.complete(ticket, Err(RequestError::Timeout(Duration::from_secs(300)))));
        assert!(!orchestrator.complete(
            ticket,
            Ok(HttpReply::new(200, r#"{"vocals_link":"v","music_link":"m"}"#)),
        ));
        assert!(matches!(orchestrator.state(), RequestState::Failed(_)));
    }

    #[test]
    fn reset_invalidates_the_pending_ticket() {
        let mut orchestrator = local_separation();
        let ticket = orchestrator.begin_submit().unwrap();
        orchestrator.reset();

        assert!(!orchestrator.complete(
            ticket,
            Ok(HttpReply::new(200, r#"{"vocals_link":"v","music_link":"m"}"#)),
        ));
        assert_eq!(orchestrator.state(), &RequestState::Idle);
    }

    #[test]
    fn pending_request_carries_the_selected_upload() {
        let mut orchestrator = Orchestrator::new(AppConfig::default());
        orchestrator
            .set_remote_link("https://www.youtube.com/watch?v=abc")
            .unwrap();
        orchestrator
            .select_mode(ProcessingMode::VocalAndMusic)
            .unwrap();
        assert!(orchestrator.pending_request().is_none());

        orchestrator.begin_submit().unwrap();
        let request = orchestrator.pending_request().unwrap();
        assert!(matches!(
            request.upload,
            Upload::Link("https://www.youtube.com/watch?v=abc")
        ));
        assert_eq!(request.mode, ProcessingMode::VocalAndMusic);
    }

    #[test]
    fn selecting_a_new_file_discards_artifacts() {
        let mut orchestrator = local_separation();
        let ticket = orchestrator.begin_submit().unwrap();
        orchestrator.complete(
            ticket,
            Ok(HttpReply::new(200, r#"{"vocals_link":"v","music_link":"m"}"#)),
        );

        orchestrator.select_local_file(Some(song())).unwrap();
        assert_eq!(orchestrator.state(), &RequestState::Idle);
        assert_eq!(orchestrator.selector().mode(), None);
    }

    #[test]
    fn typing_a_link_mid_flight_leaves_the_submission_alone() {
        let mut orchestrator = local_separation();
        let ticket = orchestrator.begin_submit().unwrap();

        assert_eq!(
            orchestrator.set_remote_link("https://youtu.be/xyz"),
            Err(ValidationError::SubmissionInFlight)
        );
        let request = orchestrator.pending_request().unwrap();
        assert!(matches!(request.upload, Upload::File(file) if file.name == "song.mp3"));
        assert_eq!(request.mode, ProcessingMode::VocalAndMusic);

        let six_fields = r#"{"vocals_link":"v","music_link":"m","vocals_video":"vv",
            "music_video":"mv","extracted_audio":"ea","original_video":"ov"}"#;
        assert!(orchestrator.complete(ticket, Ok(HttpReply::new(200, six_fields))));
        assert!(matches!(
            orchestrator.state().artifacts(),
            Some(ArtifactSet::LocalSeparation { .. })
        ));
    }

    #[test]
    fn replacing_the_file_mid_flight_is_refused() {
        let mut orchestrator = local_separation();
        let ticket = orchestrator.begin_submit().unwrap();

        let other = AudioFile::with_media_type("/music/other.wav", 1024, "audio/wav");
        assert_eq!(
            orchestrator.select_local_file(Some(other.clone())),
            Err(ValidationError::SubmissionInFlight)
        );
        assert_eq!(
            orchestrator.select_mode(ProcessingMode::CatVersion),
            Err(ValidationError::SubmissionInFlight)
        );
        assert!(orchestrator.state().is_submitting());
        let request = orchestrator.pending_request().unwrap();
        assert!(matches!(request.upload, Upload::File(file) if file.name == "song.mp3"));

        assert!(orchestrator.complete(
            ticket,
            Ok(HttpReply::new(200, r#"{"vocals_link":"v","music_link":"m"}"#)),
        ));
        orchestrator.select_local_file(Some(other)).unwrap();
        orchestrator.select_mode(ProcessingMode::CatVersion).unwrap();
        let next = orchestrator.begin_submit().unwrap();
        assert_eq!(next.layout, ArtifactLayout::CatVersion);
    }

    #[test]
    fn teardown_releases_the_preview() {
        let previews = PreviewRegistry::new();
        let mut orchestrator = Orchestrator::with_previews(AppConfig::default(), previews.clone());
        orchestrator.select_local_file(Some(song())).unwrap();
        assert_eq!(previews.live_count(), 1);

        drop(orchestrator);
        assert_eq!(previews.live_count(), 0);
    }
}
