use std::sync::Arc;

use artconfig::SessionConfig;
use artservice::{
    AnimationParameters, RenderService, ResourceRef, StillParameters, StillRequest, TargetShape,
};
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::SessionError;
use crate::gallery::{Gallery, GalleryGenerator, GalleryReport};
use crate::input::{GyroVector, HandleOffset, InputMapper, JoystickGeometry, PointerEvent};
use crate::selection::{Selection, SelectionState};
use crate::streamer::{FrameStreamer, StreamInputs, StreamOutcome, StreamSettings};
use crate::surface::FrameSurface;
use crate::video::{VideoJob, VideoJobController};

/// Everything a [`Session`] needs besides the rendering service.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub still: StillParameters,
    pub animation: AnimationParameters,
    pub joystick: JoystickGeometry,
    pub stream: StreamSettings,
    pub gallery_size: usize,
    pub gallery_seed: Option<u64>,
}

impl SessionOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        let still = &config.still;
        let animation = &config.animation;
        let target = &animation.target;
        Self {
            still: StillParameters {
                size: still.size,
                line_amount: still.line_amount,
                line_width: still.line_width,
                line_width_variation: still.line_width_variation,
                padding: still.padding,
                border_width: still.border_width,
            },
            animation: AnimationParameters {
                speed: animation.speed,
                zoom: animation.zoom,
                zoom_speed: animation.zoom_speed,
                target: TargetShape {
                    end_line_amount: target.end_line_amount,
                    end_line_width: target.end_line_width,
                    end_line_width_variation: target.end_line_width_variation,
                    end_padding: target.end_padding,
                    end_border_width: target.end_border_width,
                },
            },
            joystick: JoystickGeometry::local(
                config.joystick.control_size,
                config.joystick.handle_size,
            ),
            stream: StreamSettings {
                frame_interval: config.preview.frame_interval,
                phase_rate: config.preview.phase_rate,
            },
            gallery_size: config.gallery.size,
            gallery_seed: config.gallery.seed,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// One operator's interactive session against a rendering service.
///
/// Owns the selection, the gallery, the joystick state, the live animation
/// parameters, the preview loop and the video job. Every operator action is a
/// method here; the preview loop observes the shared pieces through watch
/// channels and picks up changes on its next tick.
pub struct Session<S> {
    service: Arc<S>,
    still: StillParameters,
    animation: watch::Sender<AnimationParameters>,
    input: InputMapper,
    selection: SelectionState,
    gallery: Gallery,
    generator: GalleryGenerator<S>,
    streamer: FrameStreamer<S>,
    videos: VideoJobController<S>,
}

impl<S: RenderService> Session<S> {
    pub fn new(service: S, options: SessionOptions) -> Self {
        Self::with_shared(Arc::new(service), options)
    }

    pub fn with_shared(service: Arc<S>, options: SessionOptions) -> Self {
        let (animation, _) = watch::channel(options.animation);
        Self {
            generator: GalleryGenerator::new(Arc::clone(&service), options.gallery_size)
                .with_seed(options.gallery_seed),
            streamer: FrameStreamer::new(Arc::clone(&service), options.stream),
            videos: VideoJobController::new(Arc::clone(&service)),
            service,
            still: options.still,
            animation,
            input: InputMapper::new(options.joystick),
            selection: SelectionState::new(),
            gallery: Gallery::default(),
        }
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Replaces the gallery with a fresh batch. Any selection is dropped, so a
    /// running preview winds down on its next tick.
    pub async fn generate_gallery(&mut self) -> GalleryReport {
        self.generator
            .generate(&self.still, &mut self.gallery, &mut self.selection)
            .await
    }

    /// Renders one display-only still. Selection and gallery are untouched.
    pub async fn generate_still(&self) -> Result<ResourceRef, SessionError> {
        let request = StillRequest::from(&self.still);
        info!(size = request.size, lines = request.line_amount, "generating still");
        self.service.generate_still(&request).await.map_err(|err| {
            error!(message = %err.message(), "still request failed");
            SessionError::from(err)
        })
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Selects the artifact at gallery `slot`.
    pub fn select(&mut self, slot: usize) -> Result<Selection, SessionError> {
        let item = self
            .gallery
            .get(slot)
            .ok_or(SessionError::UnknownSlot(slot))?;
        self.selection.select(slot, &item.artifact)?;
        self.selection.require()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection.current()
    }

    pub fn still_parameters(&self) -> &StillParameters {
        &self.still
    }

    pub fn update_still(&mut self, update: impl FnOnce(&mut StillParameters)) {
        update(&mut self.still);
    }

    pub fn animation(&self) -> AnimationParameters {
        *self.animation.borrow()
    }

    /// Edits the live animation parameters; a running preview uses them from
    /// its next request on.
    pub fn update_animation(&mut self, update: impl FnOnce(&mut AnimationParameters)) {
        self.animation.send_modify(update);
    }

    pub fn pointer(&mut self, event: PointerEvent) -> GyroVector {
        self.input.apply(event)
    }

    pub fn reset_pointer(&mut self) {
        self.input.reset();
    }

    pub fn gyro(&self) -> GyroVector {
        self.input.gyro()
    }

    pub fn handle_offset(&self) -> HandleOffset {
        self.input.handle_offset()
    }

    pub fn joystick(&self) -> &JoystickGeometry {
        self.input.geometry()
    }

    pub fn start_preview<F: FrameSurface>(&mut self, surface: F) -> Result<(), SessionError> {
        let inputs = StreamInputs {
            selection: self.selection.subscribe(),
            animation: self.animation.subscribe(),
            gyro: self.input.subscribe(),
        };
        self.streamer.start(inputs, surface)
    }

    pub fn stop_preview(&mut self) -> bool {
        self.streamer.stop()
    }

    pub fn is_previewing(&self) -> bool {
        self.streamer.is_running()
    }

    pub async fn preview_finished(&mut self) -> Option<StreamOutcome> {
        self.streamer.finished().await
    }

    /// Starts a full-length video render of the current selection using a
    /// snapshot of the live animation parameters.
    pub fn request_video(&mut self) -> Result<(), SessionError> {
        let selection = self.selection.current();
        let params = self.animation();
        self.videos.request(selection.as_ref(), &params)
    }

    pub async fn wait_video(&mut self) -> VideoJob {
        self.videos.wait().await
    }

    pub fn video(&self) -> VideoJob {
        self.videos.state()
    }
}
