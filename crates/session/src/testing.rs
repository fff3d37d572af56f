//! In-memory rendering service and display surface used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artservice::{
    Artifact, ArtifactRequest, FrameRequest, RenderService, ResourceRef, ServiceError,
    StillRequest, VideoRequest,
};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::surface::{FrameSurface, PresentedFrame};

#[derive(Debug, Clone)]
pub(crate) struct LoggedFrame {
    pub sent_at: Instant,
    pub replied_at: Option<Instant>,
    pub request: FrameRequest,
}

#[derive(Default)]
pub(crate) struct ScriptedService {
    frame_latency: Duration,
    frame_replies: Mutex<VecDeque<Result<ResourceRef, ServiceError>>>,
    frame_gate: Option<Semaphore>,
    frames: Mutex<Vec<LoggedFrame>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    artifact_replies: Mutex<VecDeque<(Duration, Result<Artifact, ServiceError>)>>,
    artifacts: Mutex<Vec<ArtifactRequest>>,
    video_latency: Duration,
    video_reply: Mutex<Option<Result<ResourceRef, ServiceError>>>,
    videos: Mutex<Vec<VideoRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_latency(mut self, latency: Duration) -> Self {
        self.frame_latency = latency;
        self
    }

    /// Frame requests block until `release_frames` hands out permits.
    pub fn with_gated_frames(mut self) -> Self {
        self.frame_gate = Some(Semaphore::new(0));
        self
    }

    pub fn with_video_latency(mut self, latency: Duration) -> Self {
        self.video_latency = latency;
        self
    }

    pub fn push_frame(&self, reply: Result<ResourceRef, ServiceError>) {
        self.frame_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_artifact(&self, delay: Duration, reply: Result<Artifact, ServiceError>) {
        self.artifact_replies
            .lock()
            .unwrap()
            .push_back((delay, reply));
    }

    pub fn set_video(&self, reply: Result<ResourceRef, ServiceError>) {
        *self.video_reply.lock().unwrap() = Some(reply);
    }

    pub fn release_frames(&self, count: usize) {
        if let Some(gate) = &self.frame_gate {
            gate.add_permits(count);
        }
    }

    pub fn frames(&self) -> Vec<LoggedFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn artifact_requests(&self) -> Vec<ArtifactRequest> {
        self.artifacts.lock().unwrap().clone()
    }

    pub fn video_requests(&self) -> Vec<VideoRequest> {
        self.videos.lock().unwrap().clone()
    }
}

impl RenderService for ScriptedService {
    async fn generate_still(&self, request: &StillRequest) -> Result<ResourceRef, ServiceError> {
        Ok(ResourceRef::new(format!("still-{}", request.size)))
    }

    async fn generate_artifact(&self, request: &ArtifactRequest) -> Result<Artifact, ServiceError> {
        let index = {
            let mut log = self.artifacts.lock().unwrap();
            log.push(request.clone());
            log.len() - 1
        };
        let scripted = self.artifact_replies.lock().unwrap().pop_front();
        match scripted {
            Some((delay, reply)) => {
                tokio::time::sleep(delay).await;
                reply
            }
            None => Ok(Artifact {
                id: Some((index as i64).into()),
                image: ResourceRef::new(format!("artifact-{index}")),
            }),
        }
    }

    async fn generate_video(&self, request: &VideoRequest) -> Result<ResourceRef, ServiceError> {
        self.videos.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.video_latency).await;
        self.video_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(ResourceRef::new("video")))
    }

    async fn generate_frame(&self, request: &FrameRequest) -> Result<ResourceRef, ServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let index = {
            let mut log = self.frames.lock().unwrap();
            log.push(LoggedFrame {
                sent_at: Instant::now(),
                replied_at: None,
                request: request.clone(),
            });
            log.len() - 1
        };

        if let Some(gate) = &self.frame_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        tokio::time::sleep(self.frame_latency).await;

        self.frames.lock().unwrap()[index].replied_at = Some(Instant::now());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.frame_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ResourceRef::new(format!("frame-{index}"))))
    }
}

/// Records every presented frame; optionally takes time to "decode".
#[derive(Clone, Default)]
pub(crate) struct RecordingSurface {
    presented: Arc<Mutex<Vec<(Instant, PresentedFrame)>>>,
    decode_time: Duration,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decode_time(mut self, decode_time: Duration) -> Self {
        self.decode_time = decode_time;
        self
    }

    pub fn presented(&self) -> Vec<(Instant, PresentedFrame)> {
        self.presented.lock().unwrap().clone()
    }
}

impl FrameSurface for RecordingSurface {
    async fn present(&mut self, frame: PresentedFrame) -> anyhow::Result<()> {
        tokio::time::sleep(self.decode_time).await;
        self.presented.lock().unwrap().push((Instant::now(), frame));
        Ok(())
    }
}
