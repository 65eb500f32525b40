//! HTTP seam towards the external processing service.

use std::future::Future;

use reqwest::multipart::{Form, Part};

use crate::{config::ServiceConfig, AudioFile, AudioMagicError, ProcessingMode, TransportError};

/// What gets uploaded: the selected file (borrowed, read at send time) or the
/// remote link text.
#[derive(Debug, Clone, Copy)]
pub enum Upload<'a> {
    File(&'a AudioFile),
    Link(&'a str),
}

/// Payload of a single `POST /process` call.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRequest<'a> {
    pub upload: Upload<'a>,
    pub mode: ProcessingMode,
}

/// Raw status and body of a completed exchange. Classification happens in
/// the orchestrator, not in the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything able to carry a [`ProcessRequest`] to the processing service.
pub trait ProcessingService {
    fn process<'a>(
        &'a self,
        request: ProcessRequest<'a>,
    ) -> impl Future<Output = Result<HttpReply, TransportError>> + Send + 'a;
}

/// reqwest-backed client for the real service.
#[derive(Debug, Clone)]
pub struct HttpProcessingService {
    client: reqwest::Client,
    process_url: String,
}

impl HttpProcessingService {
    pub fn new(config: &ServiceConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AudioMagicError::msg(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            client,
            process_url: config.process_url(),
        })
    }

    async fn send(&self, request: ProcessRequest<'_>) -> Result<HttpReply, TransportError> {
        let form = Self::build_form(request).await?;
        tracing::debug!(url = %self.process_url, mode = %request.mode, "sending process request");

        let response = self
            .client
            .post(&self.process_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpReply::new(status, body.to_vec()))
    }

    async fn build_form(request: ProcessRequest<'_>) -> Result<Form, TransportError> {
        let form = Form::new().text("mode", request.mode.as_wire());
        match request.upload {
            Upload::Link(link) => Ok(form.text("youtube_link", link.to_string())),
            Upload::File(file) => {
                let bytes = tokio::fs::read(&file.path)
                    .await
                    .map_err(|e| TransportError::Upload(e.to_string()))?;
                let part = Part::bytes(bytes)
                    .file_name(file.name.clone())
                    .mime_str(&file.media_type)
                    .map_err(|e| TransportError::Upload(e.to_string()))?;
                Ok(form.part("file", part))
            }
        }
    }
}

impl ProcessingService for HttpProcessingService {
    fn process<'a>(
        &'a self,
        request: ProcessRequest<'a>,
    ) -> impl Future<Output = Result<HttpReply, TransportError>> + Send + 'a {
        self.send(request)
    }
}
