//! The real-time preview loop.
//!
//! One spawned task per preview run. Each tick samples the phase clock, the
//! live animation parameters and the gyro vector, issues exactly one frame
//! request, waits for the display surface to accept the frame, then sleeps for
//! the minimum frame interval before the next tick. Requests therefore never
//! overlap and the cadence adapts to service latency.
//!
//! Stopping cancels the run's token. An in-flight request is left to finish;
//! its response is discarded when it arrives.

use std::sync::Arc;
use std::time::Duration;

use artservice::{AnimationParameters, FrameRequest, RenderService};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::clock::PreviewClock;
use crate::error::SessionError;
use crate::input::GyroVector;
use crate::selection::Selection;
use crate::surface::{FrameSurface, PresentedFrame};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSettings {
    /// Minimum delay between a frame becoming ready and the next request.
    pub frame_interval: Duration,
    /// Phase cycles per second.
    pub phase_rate: f64,
}

/// How a preview run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Stopped { frames: u64 },
    /// The selection disappeared (new gallery batch) while running.
    Deselected { frames: u64 },
    Failed { frames: u64, message: String },
}

impl StreamOutcome {
    pub fn frames(&self) -> u64 {
        match self {
            Self::Stopped { frames }
            | Self::Deselected { frames }
            | Self::Failed { frames, .. } => *frames,
        }
    }
}

/// Live inputs sampled on every tick.
#[derive(Debug, Clone)]
pub struct StreamInputs {
    pub selection: watch::Receiver<Option<Selection>>,
    pub animation: watch::Receiver<AnimationParameters>,
    pub gyro: watch::Receiver<GyroVector>,
}

struct ActiveStream {
    cancel: CancellationToken,
    task: JoinHandle<StreamOutcome>,
}

pub struct FrameStreamer<S> {
    service: Arc<S>,
    settings: StreamSettings,
    active: Option<ActiveStream>,
}

impl<S: RenderService> FrameStreamer<S> {
    pub fn new(service: Arc<S>, settings: StreamSettings) -> Self {
        Self {
            service,
            settings,
            active: None,
        }
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.cancel.is_cancelled() && !active.task.is_finished())
    }

    /// Starts a run and issues its first request immediately, or, after a
    /// `stop` whose run is still winding down, as soon as that run has ended.
    pub fn start<F: FrameSurface>(
        &mut self,
        inputs: StreamInputs,
        surface: F,
    ) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::PreviewRunning);
        }
        let selected = inputs.selection.borrow().clone();
        let Some(selected) = selected else {
            return Err(SessionError::NoSelection);
        };

        // A stopped run may still be waiting on its last request.
        let previous = self
            .active
            .take()
            .filter(|active| !active.task.is_finished())
            .map(|active| active.task);
        let cancel = CancellationToken::new();
        info!(
            id = %selected.id,
            interval_ms = self.settings.frame_interval.as_millis() as u64,
            after_previous = previous.is_some(),
            "starting preview"
        );
        let task = tokio::spawn(run_stream(
            Arc::clone(&self.service),
            self.settings,
            inputs,
            surface,
            cancel.clone(),
            previous,
        ));
        self.active = Some(ActiveStream { cancel, task });
        Ok(())
    }

    /// Clears the running flag. Returns false if nothing was running.
    pub fn stop(&mut self) -> bool {
        match &self.active {
            Some(active) if !active.cancel.is_cancelled() => {
                active.cancel.cancel();
                info!("preview stopped");
                true
            }
            _ => false,
        }
    }

    /// Waits for the last run to wind down, including any in-flight request.
    /// Cancel-safe: dropping the future keeps the run attached.
    pub async fn finished(&mut self) -> Option<StreamOutcome> {
        let active = self.active.as_mut()?;
        let joined = (&mut active.task).await;
        self.active = None;
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(err) => StreamOutcome::Failed {
                frames: 0,
                message: format!("preview task ended abnormally: {err}"),
            },
        };
        Some(outcome)
    }
}

impl<S> Drop for FrameStreamer<S> {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

async fn run_stream<S, F>(
    service: Arc<S>,
    settings: StreamSettings,
    inputs: StreamInputs,
    mut surface: F,
    cancel: CancellationToken,
    previous: Option<JoinHandle<StreamOutcome>>,
) -> StreamOutcome
where
    S: RenderService,
    F: FrameSurface,
{
    if let Some(previous) = previous {
        // Never overlap with the stopped run's in-flight request.
        if let Ok(outcome) = previous.await {
            debug!(frames = outcome.frames(), "previous preview run wound down");
        }
    }
    let clock = PreviewClock::new(Instant::now(), settings.phase_rate);
    let interval = settings.frame_interval;
    let mut frames = 0u64;
    loop {
        if cancel.is_cancelled() {
            return StreamOutcome::Stopped { frames };
        }
        let selected = inputs.selection.borrow().clone();
        let Some(selected) = selected else {
            cancel.cancel();
            info!(frames, "selection cleared; preview stopped");
            return StreamOutcome::Deselected { frames };
        };

        let phase = clock.phase(Instant::now());
        let animation = *inputs.animation.borrow();
        let gyro = *inputs.gyro.borrow();
        let request = FrameRequest::new(selected.id, phase, &animation, gyro.as_pair());
        debug!(
            sequence = frames,
            phase,
            gyro_x = gyro.x,
            gyro_y = gyro.y,
            "requesting preview frame"
        );

        let reply = service.generate_frame(&request).await;
        if cancel.is_cancelled() {
            debug!(sequence = frames, "discarding frame that arrived after stop");
            return StreamOutcome::Stopped { frames };
        }
        let frame = match reply {
            Ok(frame) => frame,
            Err(err) => {
                cancel.cancel();
                let message = err.message();
                error!(sequence = frames, %message, "preview frame request failed");
                return StreamOutcome::Failed { frames, message };
            }
        };

        let presented = PresentedFrame {
            sequence: frames,
            phase,
            gyro,
            frame,
        };
        if let Err(err) = surface.present(presented).await {
            if cancel.is_cancelled() {
                return StreamOutcome::Stopped { frames };
            }
            cancel.cancel();
            let message = format!("{err:#}");
            error!(sequence = frames, %message, "preview frame could not be displayed");
            return StreamOutcome::Failed { frames, message };
        }
        frames += 1;

        tokio::select! {
            _ = cancel.cancelled() => return StreamOutcome::Stopped { frames },
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
