use std::sync::Arc;

use artservice::{AnimationParameters, RenderService, ResourceRef, VideoRequest};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::SessionError;
use crate::selection::Selection;

/// Lifecycle of the most recent full-length video render.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum VideoJob {
    #[default]
    Idle,
    Requesting,
    Succeeded(ResourceRef),
    Failed(String),
}

impl VideoJob {
    pub fn is_requesting(&self) -> bool {
        matches!(self, Self::Requesting)
    }
}

/// Issues one video request at a time for the current selection.
///
/// The request task settles the job itself, so the state moves on as soon as
/// the service answers whether or not anyone is waiting.
pub struct VideoJobController<S> {
    service: Arc<S>,
    job: Arc<watch::Sender<VideoJob>>,
    pending: Option<JoinHandle<()>>,
}

impl<S: RenderService> VideoJobController<S> {
    pub fn new(service: Arc<S>) -> Self {
        let (job, _) = watch::channel(VideoJob::Idle);
        Self {
            service,
            job: Arc::new(job),
            pending: None,
        }
    }

    pub fn state(&self) -> VideoJob {
        self.job.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VideoJob> {
        self.job.subscribe()
    }

    /// Starts rendering a video of `selection` with a snapshot of `params`.
    ///
    /// Without a selection nothing is sent and the job state is left alone.
    pub fn request(
        &mut self,
        selection: Option<&Selection>,
        params: &AnimationParameters,
    ) -> Result<(), SessionError> {
        let selection = selection.ok_or(SessionError::NoSelection)?;
        if self.job.borrow().is_requesting() {
            return Err(SessionError::VideoInFlight);
        }

        let request = VideoRequest::new(selection.id.clone(), params);
        info!(id = %selection.id, "requesting video render");
        self.job.send_replace(VideoJob::Requesting);
        let service = Arc::clone(&self.service);
        let job = Arc::clone(&self.job);
        self.pending = Some(tokio::spawn(async move {
            let settled = match service.generate_video(&request).await {
                Ok(video) => {
                    info!(video = %video, "video ready");
                    VideoJob::Succeeded(video)
                }
                Err(err) => {
                    let message = err.message();
                    error!(%message, "video render failed");
                    VideoJob::Failed(message)
                }
            };
            job.send_replace(settled);
        }));
        Ok(())
    }

    /// Waits for the pending render, if any, and returns the settled state.
    pub async fn wait(&mut self) -> VideoJob {
        if let Some(pending) = self.pending.take() {
            if let Err(err) = pending.await {
                let message = format!("video task ended abnormally: {err}");
                error!(%message, "video render failed");
                self.job.send_replace(VideoJob::Failed(message));
            }
        }
        self.state()
    }
}

impl<S> Drop for VideoJobController<S> {
    fn drop(&mut self) {
        if let Some(pending) = &self.pending {
            pending.abort();
        }
    }
}
