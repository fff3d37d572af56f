use std::future::Future;

use anyhow::{anyhow, Context, Result};
use artservice::ResourceRef;
use image::DynamicImage;
use tokio::sync::mpsc;
use tracing::debug;

use crate::input::GyroVector;

/// A frame handed from the preview loop to whatever displays it.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedFrame {
    pub sequence: u64,
    pub phase: f64,
    pub gyro: GyroVector,
    pub frame: ResourceRef,
}

/// Display target for preview frames.
///
/// The preview loop schedules its next request only once `present` resolves,
/// so implementations should resolve when the frame is actually ready to show.
pub trait FrameSurface: Send + 'static {
    fn present(&mut self, frame: PresentedFrame) -> impl Future<Output = Result<()>> + Send;
}

/// A decoded preview frame ready for display.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub sequence: u64,
    pub phase: f64,
    pub gyro: GyroVector,
    pub image: DynamicImage,
}

/// Decodes data-URL frames off the async thread and forwards them to a
/// consumer. With a channel capacity of one, a frame counts as ready only
/// after the consumer has taken the previous one.
pub struct DecodingSurface {
    frames: mpsc::Sender<PreviewFrame>,
}

impl DecodingSurface {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PreviewFrame>) {
        let (frames, rx) = mpsc::channel(capacity.max(1));
        (Self { frames }, rx)
    }
}

pub fn decode_frame(resource: &ResourceRef) -> Result<DynamicImage> {
    let data = resource
        .decode_data_url()
        .with_context(|| format!("decoding frame locator {resource}"))?;
    image::load_from_memory(&data.bytes)
        .with_context(|| format!("decoding {} frame image", data.mime))
}

impl FrameSurface for DecodingSurface {
    async fn present(&mut self, frame: PresentedFrame) -> Result<()> {
        let resource = frame.frame;
        let image = tokio::task::spawn_blocking(move || decode_frame(&resource))
            .await
            .context("frame decoder task failed")??;
        debug!(
            sequence = frame.sequence,
            width = image.width(),
            height = image.height(),
            "decoded preview frame"
        );
        self.frames
            .send(PreviewFrame {
                sequence: frame.sequence,
                phase: frame.phase,
                gyro: frame.gyro,
                image,
            })
            .await
            .map_err(|_| anyhow!("preview display was closed"))
    }
}
