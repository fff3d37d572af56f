use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{
    Artifact, ArtifactRequest, FrameRequest, ResourceRef, StateId, StillRequest, VideoRequest,
};
use crate::{RenderService, ServiceError};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub timeout: Option<Duration>,
}

impl ServiceConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            bail!("rendering service url must not be empty");
        }
        let base_url = Url::parse(trimmed)?;
        if base_url.cannot_be_a_base() {
            bail!("rendering service url '{trimmed}' cannot carry a path");
        }
        Ok(Self {
            base_url,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, operation: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid rendering service base url"))?
            .pop_if_empty()
            .push(operation);
        Ok(url)
    }
}

/// `RenderService` over HTTP: every operation is a JSON `POST` to
/// `{base_url}/{operation}`.
#[derive(Debug, Clone)]
pub struct HttpRenderService {
    http: Client,
    config: ServiceConfig,
}

impl HttpRenderService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn call<B, R>(&self, operation: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self
            .config
            .endpoint(operation)
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        debug!(%url, "calling rendering service");
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|err| ServiceError::Transport(format!("requesting {url}: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ServiceError::Transport(format!("reading {url}: {err}")))?;
        if !status.is_success() {
            // Error payloads may still carry a readable message.
            if let Ok(err) = serde_json::from_str::<ApiError>(&text) {
                return Err(ServiceError::Rejected(err.error));
            }
            return Err(ServiceError::Transport(format!(
                "{url} returned status {status}"
            )));
        }
        decode_reply(&text)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(alias = "Error")]
    error: String,
}

#[derive(Debug, Deserialize)]
struct StillReply {
    image: ResourceRef,
}

#[derive(Debug, Deserialize)]
struct ArtifactReply {
    image: ResourceRef,
    #[serde(default)]
    state_id: Option<StateId>,
}

#[derive(Debug, Deserialize)]
struct VideoReply {
    video: ResourceRef,
}

#[derive(Debug, Deserialize)]
struct FrameReply {
    frame: ResourceRef,
}

const SNIPPET_CHARS: usize = 200;

/// An explicit error field wins over any payload that arrives alongside it.
fn decode_reply<R: DeserializeOwned>(body: &str) -> Result<R, ServiceError> {
    if let Ok(err) = serde_json::from_str::<ApiError>(body) {
        return Err(ServiceError::Rejected(err.error));
    }
    if let Ok(reply) = serde_json::from_str::<R>(body) {
        return Ok(reply);
    }
    let snippet = body.chars().take(SNIPPET_CHARS).collect::<String>();
    Err(ServiceError::Protocol(format!(
        "could not decode reply. First {SNIPPET_CHARS} characters: {snippet}"
    )))
}

impl RenderService for HttpRenderService {
    async fn generate_still(&self, request: &StillRequest) -> Result<ResourceRef, ServiceError> {
        let reply: StillReply = self.call("generate_still", request).await?;
        Ok(reply.image)
    }

    async fn generate_artifact(&self, request: &ArtifactRequest) -> Result<Artifact, ServiceError> {
        let reply: ArtifactReply = self.call("generate_artifact", request).await?;
        Ok(Artifact {
            id: reply.state_id,
            image: reply.image,
        })
    }

    async fn generate_video(&self, request: &VideoRequest) -> Result<ResourceRef, ServiceError> {
        let reply: VideoReply = self.call("generate_video", request).await?;
        Ok(reply.video)
    }

    async fn generate_frame(&self, request: &FrameRequest) -> Result<ResourceRef, ServiceError> {
        let reply: FrameReply = self.call("generate_frame", request).await?;
        Ok(reply.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnimationParameters, TargetShape};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn endpoint_appends_operation_with_or_without_trailing_slash() {
        let with_slash = ServiceConfig::new("http://localhost:8000/api/").unwrap();
        assert_eq!(
            with_slash.endpoint("generate_frame").unwrap().as_str(),
            "http://localhost:8000/api/generate_frame"
        );
        let without = ServiceConfig::new("http://localhost:8000/api").unwrap();
        assert_eq!(
            without.endpoint("generate_video").unwrap().as_str(),
            "http://localhost:8000/api/generate_video"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(ServiceConfig::new("  ").is_err());
        assert!(ServiceConfig::new("not a url").is_err());
        assert!(ServiceConfig::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn decodes_artifact_with_numeric_state_id() {
        let reply: ArtifactReply =
            decode_reply(r#"{"image": "data:image/png;base64, AA==", "state_id": 42}"#).unwrap();
        assert_eq!(reply.state_id, Some(StateId::Number(42)));
        assert_eq!(reply.image.as_str(), "data:image/png;base64, AA==");
    }

    #[test]
    fn artifact_without_state_id_is_accepted() {
        let reply: ArtifactReply = decode_reply(r#"{"image": "data:,x"}"#).unwrap();
        assert!(reply.state_id.is_none());
    }

    #[test]
    fn error_field_is_reported_verbatim() {
        let err = decode_reply::<FrameReply>(r#"{"error": "render failed"}"#).unwrap_err();
        assert_eq!(err, ServiceError::Rejected("render failed".into()));
        assert_eq!(err.message(), "render failed");

        let err = decode_reply::<VideoReply>(r#"{"Error": "no ffmpeg"}"#).unwrap_err();
        assert_eq!(err.message(), "no ffmpeg");
    }

    #[test]
    fn unexpected_body_is_a_protocol_error() {
        let err = decode_reply::<VideoReply>(r#"{"status": "ok"}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Protocol(ref msg) if msg.contains("status")));
    }

    #[test]
    fn undecodable_body_is_cut_on_character_boundaries() {
        let body = "é".repeat(300);
        let err = decode_reply::<VideoReply>(&body).unwrap_err();
        let ServiceError::Protocol(message) = err else {
            panic!("expected a protocol error, got {err:?}");
        };
        let (prefix, snippet) = message.split_once(": ").unwrap();
        assert_eq!(prefix, "could not decode reply. First 200 characters");
        assert_eq!(snippet, "é".repeat(200));
    }

    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if received.len() >= split + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });
        (format!("http://{addr}/api/"), handle)
    }

    fn animation() -> AnimationParameters {
        AnimationParameters {
            speed: 20.0,
            zoom: 1.0,
            zoom_speed: 0.0,
            target: TargetShape {
                end_line_amount: 5,
                end_line_width: 1,
                end_line_width_variation: 0.0,
                end_padding: 1,
                end_border_width: 1,
            },
        }
    }

    #[tokio::test]
    async fn posts_frame_requests_as_json() {
        let (base, server) = serve_once("200 OK", r#"{"frame": "data:image/png;base64, AA=="}"#).await;
        let service = HttpRenderService::new(ServiceConfig::new(&base).unwrap()).unwrap();
        let request = FrameRequest::new(StateId::from(7), 0.5, &animation(), (0.0, 1.0));

        let frame = service.generate_frame(&request).await.unwrap();
        assert_eq!(frame.as_str(), "data:image/png;base64, AA==");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/generate_frame"));
        assert!(raw.contains("\"state_id\":7"));
        assert!(raw.contains("\"gyro_y\":1.0"));
    }

    #[tokio::test]
    async fn error_status_with_message_is_a_rejection() {
        let (base, server) = serve_once("500 Internal Server Error", r#"{"error": "boom"}"#).await;
        let service = HttpRenderService::new(ServiceConfig::new(&base).unwrap()).unwrap();
        let request = VideoRequest::new(StateId::from(1), &animation());

        let err = service.generate_video(&request).await.unwrap_err();
        assert_eq!(err, ServiceError::Rejected("boom".into()));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let service =
            HttpRenderService::new(ServiceConfig::new(&format!("http://{addr}/")).unwrap()).unwrap();
        let request = VideoRequest::new(StateId::from(1), &animation());

        let err = service.generate_video(&request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }
}
